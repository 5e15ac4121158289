use tessera_error::{ErrorCodes, TesseraError};
use tessera_types::{DataType, MetricType};
use thiserror::Error;

use crate::client::RemoteOperation;
use crate::converter::ConversionError;

/// Problems with the indexer setup or a store call's options. None of these
/// reach the remote store.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("the vector store client is not set")]
    MissingClient,
    #[error("the dimension of the vector must be greater than 0 and fit in 32 bits, got {dim}")]
    InvalidDimension { dim: i64 },
    #[error("the collection name is empty")]
    EmptyCollectionName,
    #[error("the partition name is empty")]
    EmptyPartitionName,
    #[error("vector field [{0}] is not part of the collection schema")]
    MissingVectorField(String),
    #[error("vector field [{field}] has dimension {field_dim} but the collection dimension is {dim}")]
    VectorDimensionMismatch {
        field: String,
        field_dim: u32,
        dim: u32,
    },
    #[error("load polling needs at least one attempt, got max_attempts = 0")]
    ZeroLoadAttempts,
    #[error("embedding is not set")]
    MissingEmbedder,
    #[error(
        "partition [{partition}] cannot be chosen while partition key mode is on (partition_num = {partition_num})"
    )]
    PartitionWithPartitionKey {
        partition: String,
        partition_num: u32,
    },
}

impl TesseraError for ConfigurationError {
    fn code(&self) -> ErrorCodes {
        ErrorCodes::InvalidArgument
    }
}

/// Every failure of collection preparation and of `store`.
///
/// The message starts with the phase that failed, in brackets, so a caller
/// can tell where in the sequence an error came from without matching on the
/// variant.
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("[indexer_config] {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("[ensure_collection] metric type {metric} cannot index {data_type} field [{field}]")]
    InvalidMetricType {
        metric: MetricType,
        data_type: DataType,
        field: String,
    },
    #[error("[ensure_collection] collection [{collection}] exists with a different schema")]
    SchemaMismatch { collection: String },
    #[error("[ensure_collection] collection [{collection}] does not exist anymore")]
    CollectionVanished { collection: String },
    #[error(
        "[ensure_collection] collection [{collection}] still loading after {attempts} polls, progress {progress}%"
    )]
    LoadTimedOut {
        collection: String,
        progress: u8,
        attempts: usize,
    },
    #[error("[{}] {operation} failed: {source}", .operation.phase())]
    Remote {
        operation: RemoteOperation,
        source: Box<dyn TesseraError>,
    },
    #[error("[store] failed to embed documents: {0}")]
    Embedding(#[source] Box<dyn TesseraError>),
    #[error("[store] failed to convert documents: {0}")]
    Conversion(#[from] ConversionError),
    #[error("[store] embedding returned {actual} vectors, expected {expected}")]
    CountMismatch { expected: usize, actual: usize },
}

impl IndexerError {
    pub(crate) fn remote(operation: RemoteOperation) -> impl FnOnce(Box<dyn TesseraError>) -> Self {
        move |source| IndexerError::Remote { operation, source }
    }
}

impl TesseraError for IndexerError {
    fn code(&self) -> ErrorCodes {
        match self {
            IndexerError::Configuration(err) => err.code(),
            IndexerError::InvalidMetricType { .. } => ErrorCodes::InvalidArgument,
            IndexerError::SchemaMismatch { .. } => ErrorCodes::FailedPrecondition,
            IndexerError::CollectionVanished { .. } => ErrorCodes::NotFound,
            IndexerError::LoadTimedOut { .. } => ErrorCodes::DeadlineExceeded,
            IndexerError::Remote { source, .. } => source.code(),
            IndexerError::Embedding(source) => source.code(),
            IndexerError::Conversion(err) => err.code(),
            IndexerError::CountMismatch { .. } => ErrorCodes::Internal,
        }
    }
}
