//! The vector database as seen by the indexer.
//!
//! [`VectorStoreClient`] is the only way the crate talks to a remote store. It
//! carries no wire protocol: an SDK adapter implements it, and
//! [`crate::in_memory::InMemoryVectorStore`] implements it for tests and local runs.

use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tessera_config::registry::Injectable;
use tessera_error::TesseraError;
use tessera_types::{CollectionDescriptor, CollectionInfo, IndexDescriptor, LoadState, Row};

/// Every remote call the indexer can issue.
///
/// Used to label remote failures, metrics and the call log of the in-memory store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteOperation {
    HasCollection,
    DescribeCollection,
    CreateCollection,
    DescribeIndexes,
    CreateIndex,
    LoadCollection,
    GetLoadState,
    GetLoadProgress,
    HasPartition,
    CreatePartition,
    LoadPartitions,
    Insert,
    Upsert,
}

impl RemoteOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteOperation::HasCollection => "has_collection",
            RemoteOperation::DescribeCollection => "describe_collection",
            RemoteOperation::CreateCollection => "create_collection",
            RemoteOperation::DescribeIndexes => "describe_indexes",
            RemoteOperation::CreateIndex => "create_index",
            RemoteOperation::LoadCollection => "load_collection",
            RemoteOperation::GetLoadState => "get_load_state",
            RemoteOperation::GetLoadProgress => "get_load_progress",
            RemoteOperation::HasPartition => "has_partition",
            RemoteOperation::CreatePartition => "create_partition",
            RemoteOperation::LoadPartitions => "load_partitions",
            RemoteOperation::Insert => "insert",
            RemoteOperation::Upsert => "upsert",
        }
    }

    /// The indexer phase that issues this call, used as the error prefix.
    pub fn phase(&self) -> &'static str {
        match self {
            RemoteOperation::HasCollection
            | RemoteOperation::DescribeCollection
            | RemoteOperation::CreateCollection
            | RemoteOperation::DescribeIndexes
            | RemoteOperation::CreateIndex
            | RemoteOperation::LoadCollection
            | RemoteOperation::GetLoadState
            | RemoteOperation::GetLoadProgress => "ensure_collection",
            RemoteOperation::HasPartition
            | RemoteOperation::CreatePartition
            | RemoteOperation::LoadPartitions => "ensure_partition",
            RemoteOperation::Insert | RemoteOperation::Upsert => "store",
        }
    }
}

impl std::fmt::Display for RemoteOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remote vector database operations needed to prepare a collection and
/// write rows into it.
///
/// Implementations must be cheap to share: the indexer holds one behind an
/// `Arc` and calls it from `&self`. Errors are passed through untouched and
/// wrapped by the caller with the operation that produced them; no method is
/// retried by the indexer.
#[async_trait]
pub trait VectorStoreClient: Send + Sync + Debug {
    async fn has_collection(&self, collection: &str) -> Result<bool, Box<dyn TesseraError>>;

    async fn describe_collection(
        &self,
        collection: &str,
    ) -> Result<CollectionInfo, Box<dyn TesseraError>>;

    /// Creates the collection with `descriptor.resolved_fields()`.
    ///
    /// Must fail with an `AlreadyExists` code when the name is taken.
    async fn create_collection(
        &self,
        descriptor: &CollectionDescriptor,
    ) -> Result<(), Box<dyn TesseraError>>;

    /// Indexes on `field_name`; empty when the field has none.
    async fn describe_indexes(
        &self,
        collection: &str,
        field_name: &str,
    ) -> Result<Vec<IndexDescriptor>, Box<dyn TesseraError>>;

    async fn create_index(
        &self,
        collection: &str,
        index: &IndexDescriptor,
    ) -> Result<(), Box<dyn TesseraError>>;

    /// Asks the store to load the collection into serving memory. With
    /// `wait` the call returns once loading finished, otherwise as soon as the
    /// store accepted the request.
    async fn load_collection(&self, collection: &str, wait: bool)
        -> Result<(), Box<dyn TesseraError>>;

    async fn get_load_state(&self, collection: &str) -> Result<LoadState, Box<dyn TesseraError>>;

    /// Load progress in percent, `0..=100`.
    async fn get_load_progress(&self, collection: &str) -> Result<u8, Box<dyn TesseraError>>;

    async fn has_partition(
        &self,
        collection: &str,
        partition: &str,
    ) -> Result<bool, Box<dyn TesseraError>>;

    async fn create_partition(
        &self,
        collection: &str,
        partition: &str,
    ) -> Result<(), Box<dyn TesseraError>>;

    async fn load_partitions(
        &self,
        collection: &str,
        partitions: &[String],
    ) -> Result<(), Box<dyn TesseraError>>;

    /// Writes new rows; returns the number of rows written.
    async fn insert(
        &self,
        collection: &str,
        partition: &str,
        rows: Vec<Row>,
    ) -> Result<u64, Box<dyn TesseraError>>;

    /// Writes rows, replacing existing rows with the same primary key.
    async fn upsert(
        &self,
        collection: &str,
        partition: &str,
        rows: Vec<Row>,
    ) -> Result<u64, Box<dyn TesseraError>>;
}

/// Registry entry for the vector store client.
#[derive(Clone, Debug)]
pub struct VectorStoreHandle(pub Arc<dyn VectorStoreClient>);

impl Injectable for VectorStoreHandle {}

impl VectorStoreHandle {
    pub fn new(client: impl VectorStoreClient + 'static) -> Self {
        VectorStoreHandle(Arc::new(client))
    }
}
