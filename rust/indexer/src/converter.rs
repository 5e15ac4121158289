use std::sync::Arc;

use tessera_config::registry::Injectable;
use tessera_error::{ErrorCodes, TesseraError};
use tessera_types::{
    Document, FieldValue, Row, DEFAULT_CONTENT_FIELD, DEFAULT_ID_FIELD, DEFAULT_METADATA_FIELD,
    DEFAULT_VECTOR_FIELD,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("got {actual} vectors for {expected} documents")]
    VectorCount { expected: usize, actual: usize },
    #[error("vector of document [{id}] has {actual} dimensions, expected {expected}")]
    Dimension {
        id: String,
        expected: usize,
        actual: usize,
    },
    #[error("failed to marshal metadata of document [{id}]: {source}")]
    Metadata {
        id: String,
        source: serde_json::Error,
    },
    #[error("{0}")]
    Other(String),
}

impl TesseraError for ConversionError {
    fn code(&self) -> ErrorCodes {
        ErrorCodes::InvalidArgument
    }
}

/// Maps documents and their vectors to the rows written to the store.
///
/// Any closure with the same shape as [`DocumentConverter::convert`] is a
/// converter, so a custom column layout does not need its own type.
pub trait DocumentConverter: Send + Sync {
    fn convert(
        &self,
        docs: &[Document],
        dim: usize,
        vectors: &[Vec<f64>],
    ) -> Result<Vec<Row>, ConversionError>;
}

impl<F> DocumentConverter for F
where
    F: Fn(&[Document], usize, &[Vec<f64>]) -> Result<Vec<Row>, ConversionError> + Send + Sync,
{
    fn convert(
        &self,
        docs: &[Document],
        dim: usize,
        vectors: &[Vec<f64>],
    ) -> Result<Vec<Row>, ConversionError> {
        self(docs, dim, vectors)
    }
}

/// Registry entry for a custom converter.
#[derive(Clone)]
pub struct ConverterHandle(pub Arc<dyn DocumentConverter>);

impl Injectable for ConverterHandle {}

/// Writes the default single-vector layout: `id`, `content`, `vector` (as
/// `f32`) and `metadata` (JSON, `{}` for documents without metadata).
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultDocumentConverter;

impl DocumentConverter for DefaultDocumentConverter {
    fn convert(
        &self,
        docs: &[Document],
        dim: usize,
        vectors: &[Vec<f64>],
    ) -> Result<Vec<Row>, ConversionError> {
        if docs.len() != vectors.len() {
            return Err(ConversionError::VectorCount {
                expected: docs.len(),
                actual: vectors.len(),
            });
        }

        docs.iter()
            .zip(vectors)
            .map(|(doc, vector)| {
                if vector.len() != dim {
                    return Err(ConversionError::Dimension {
                        id: doc.id.clone(),
                        expected: dim,
                        actual: vector.len(),
                    });
                }
                let metadata = match &doc.metadata {
                    Some(metadata) => serde_json::to_vec(metadata),
                    None => Ok(b"{}".to_vec()),
                }
                .map_err(|source| ConversionError::Metadata {
                    id: doc.id.clone(),
                    source,
                })?;

                Ok(Row::new()
                    .with(DEFAULT_ID_FIELD, FieldValue::VarChar(doc.id.clone()))
                    .with(DEFAULT_CONTENT_FIELD, FieldValue::VarChar(doc.content.clone()))
                    .with(
                        DEFAULT_VECTOR_FIELD,
                        FieldValue::FloatVector(vector.iter().map(|v| *v as f32).collect()),
                    )
                    .with(DEFAULT_METADATA_FIELD, FieldValue::Json(metadata)))
            })
            .collect()
    }
}
