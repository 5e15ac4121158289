use crate::DataType;
use serde::{Deserialize, Serialize};
use tessera_error::{ErrorCodes, TesseraError};
use thiserror::Error;

/// Similarity metric of a vector index.
/// # Variants
/// - `L2` - Euclidean distance, float vectors.
/// - `Ip` - Inner product, float vectors.
/// - `Cosine` - Cosine similarity, float vectors.
/// - `Hamming` - Hamming distance, binary vectors.
/// - `Jaccard` - Jaccard distance, binary vectors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricType {
    #[default]
    #[serde(rename = "L2")]
    L2,
    #[serde(rename = "IP")]
    Ip,
    #[serde(rename = "COSINE")]
    Cosine,
    #[serde(rename = "HAMMING")]
    Hamming,
    #[serde(rename = "JACCARD")]
    Jaccard,
}

#[derive(Error, Debug)]
pub enum MetricTypeError {
    #[error("Invalid metric type `{0}`")]
    Unknown(String),
}

impl TesseraError for MetricTypeError {
    fn code(&self) -> ErrorCodes {
        match self {
            MetricTypeError::Unknown(_) => ErrorCodes::InvalidArgument,
        }
    }
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::L2 => "L2",
            MetricType::Ip => "IP",
            MetricType::Cosine => "COSINE",
            MetricType::Hamming => "HAMMING",
            MetricType::Jaccard => "JACCARD",
        }
    }

    /// Whether an index with this metric can be built over a column of `data_type`.
    pub fn supports(&self, data_type: DataType) -> bool {
        match self {
            MetricType::L2 | MetricType::Ip | MetricType::Cosine => {
                matches!(data_type, DataType::FloatVector | DataType::Float16Vector)
            }
            MetricType::Hamming | MetricType::Jaccard => data_type == DataType::BinaryVector,
        }
    }
}

impl std::str::FromStr for MetricType {
    type Err = MetricTypeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_uppercase().as_str() {
            "L2" => Ok(MetricType::L2),
            "IP" => Ok(MetricType::Ip),
            "COSINE" => Ok(MetricType::Cosine),
            "HAMMING" => Ok(MetricType::Hamming),
            "JACCARD" => Ok(MetricType::Jaccard),
            _ => Err(MetricTypeError::Unknown(value.to_string())),
        }
    }
}

impl std::fmt::Display for MetricType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexType {
    #[default]
    #[serde(rename = "AUTOINDEX")]
    AutoIndex,
    #[serde(rename = "FLAT")]
    Flat,
    #[serde(rename = "IVF_FLAT")]
    IvfFlat,
    #[serde(rename = "HNSW")]
    Hnsw,
}

/// A vector index that exists (or is to be created) on one field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub field_name: String,
    pub index_name: String,
    pub index_type: IndexType,
    pub metric_type: MetricType,
}

impl IndexDescriptor {
    /// Index named after its field, which is what stores do when no name is given.
    pub fn for_field(field_name: impl Into<String>, index_type: IndexType, metric_type: MetricType) -> Self {
        let field_name = field_name.into();
        IndexDescriptor {
            index_name: field_name.clone(),
            field_name,
            index_type,
            metric_type,
        }
    }
}
