//! A [`VectorStoreClient`] that keeps everything in process.
//!
//! It behaves like a small vector database for the calls the indexer makes
//! and additionally records every call, so tests can assert on the exact
//! remote sequence. Failures and load progress can be scripted per operation
//! and per collection.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap, VecDeque},
    sync::Arc,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use tessera_error::{ErrorCodes, TesseraError};
use tessera_types::{
    CollectionDescriptor, CollectionInfo, FieldSchema, FieldValue, IndexDescriptor, LoadState,
    Row,
};
use thiserror::Error;

use crate::{
    client::{RemoteOperation, VectorStoreClient},
    readiness::DEFAULT_PARTITION,
};

#[derive(Clone, Debug, Error)]
pub enum InMemoryStoreError {
    #[error("collection [{0}] not found")]
    CollectionNotFound(String),
    #[error("collection [{0}] already exists")]
    CollectionAlreadyExists(String),
    #[error("field [{field}] of collection [{collection}] already has an index")]
    IndexAlreadyExists { collection: String, field: String },
    #[error("field [{field}] not found in collection [{collection}]")]
    FieldNotFound { collection: String, field: String },
    #[error("partition [{partition}] not found in collection [{collection}]")]
    PartitionNotFound {
        collection: String,
        partition: String,
    },
    #[error("partition [{partition}] already exists in collection [{collection}]")]
    PartitionAlreadyExists {
        collection: String,
        partition: String,
    },
    #[error("row {row} has no value for column [{column}]")]
    MissingColumn { row: usize, column: String },
    #[error("row {row} has an unusable primary key")]
    InvalidPrimaryKey { row: usize },
    #[error("primary key [{0}] already exists")]
    DuplicatePrimaryKey(String),
    #[error("{message}")]
    Injected { code: ErrorCodes, message: String },
}

impl TesseraError for InMemoryStoreError {
    fn code(&self) -> ErrorCodes {
        match self {
            InMemoryStoreError::CollectionNotFound(_)
            | InMemoryStoreError::FieldNotFound { .. }
            | InMemoryStoreError::PartitionNotFound { .. } => ErrorCodes::NotFound,
            InMemoryStoreError::CollectionAlreadyExists(_)
            | InMemoryStoreError::IndexAlreadyExists { .. }
            | InMemoryStoreError::PartitionAlreadyExists { .. }
            | InMemoryStoreError::DuplicatePrimaryKey(_) => ErrorCodes::AlreadyExists,
            InMemoryStoreError::MissingColumn { .. }
            | InMemoryStoreError::InvalidPrimaryKey { .. } => ErrorCodes::InvalidArgument,
            InMemoryStoreError::Injected { code, .. } => *code,
        }
    }
}

#[derive(Debug)]
struct StoredCollection {
    info: CollectionInfo,
    state: LoadState,
    indexes: Vec<IndexDescriptor>,
    partitions: BTreeSet<String>,
    // Primary key to (partition, row).
    rows: BTreeMap<String, (String, Row)>,
}

impl StoredCollection {
    fn new(info: CollectionInfo, state: LoadState) -> Self {
        StoredCollection {
            info,
            state,
            indexes: Vec::new(),
            partitions: BTreeSet::from([DEFAULT_PARTITION.to_string()]),
            rows: BTreeMap::new(),
        }
    }

    fn primary_key(&self) -> Option<&FieldSchema> {
        self.info.fields.iter().find(|f| f.is_primary_key)
    }
}

#[derive(Debug, Default)]
struct Inner {
    collections: HashMap<String, StoredCollection>,
    calls: Vec<RemoteOperation>,
    failures: HashMap<RemoteOperation, InMemoryStoreError>,
    load_progress: HashMap<String, VecDeque<u8>>,
    // One-shot drops fired by the next call of an operation.
    pending_drops: HashMap<RemoteOperation, String>,
}

impl Inner {
    /// Logs the call and returns the injected failure for it, if any.
    fn record(&mut self, operation: RemoteOperation) -> Result<(), Box<dyn TesseraError>> {
        self.calls.push(operation);
        if let Some(collection) = self.pending_drops.remove(&operation) {
            self.collections.remove(&collection);
        }
        match self.failures.get(&operation) {
            Some(err) => Err(err.clone().boxed()),
            None => Ok(()),
        }
    }

    fn collection(&mut self, name: &str) -> Result<&mut StoredCollection, Box<dyn TesseraError>> {
        self.collections
            .get_mut(name)
            .ok_or_else(|| InMemoryStoreError::CollectionNotFound(name.to_string()).boxed())
    }

    fn write(
        &mut self,
        collection: &str,
        partition: &str,
        rows: Vec<Row>,
        replace: bool,
    ) -> Result<u64, Box<dyn TesseraError>> {
        let stored = self.collection(collection)?;
        if !stored.partitions.contains(partition) {
            return Err(InMemoryStoreError::PartitionNotFound {
                collection: collection.to_string(),
                partition: partition.to_string(),
            }
            .boxed());
        }

        let pk_name = stored.primary_key().map(|f| f.name.clone());
        let required: Vec<String> = stored
            .info
            .fields
            .iter()
            .filter(|f| !f.auto_id)
            .map(|f| f.name.clone())
            .collect();

        // Validate everything first so a bad batch writes nothing.
        let mut keyed = Vec::with_capacity(rows.len());
        for (i, row) in rows.into_iter().enumerate() {
            if let Some(column) = required.iter().find(|c| row.get(c).is_none()) {
                return Err(InMemoryStoreError::MissingColumn {
                    row: i,
                    column: column.clone(),
                }
                .boxed());
            }
            let key = match pk_name.as_deref().and_then(|pk| row.get(pk)) {
                Some(FieldValue::VarChar(s)) => s.clone(),
                Some(FieldValue::Int64(n)) => n.to_string(),
                Some(_) => return Err(InMemoryStoreError::InvalidPrimaryKey { row: i }.boxed()),
                // Auto id or no primary key at all: append.
                None => (stored.rows.len() + keyed.len()).to_string(),
            };
            if !replace
                && (stored.rows.contains_key(&key) || keyed.iter().any(|(k, _)| *k == key))
            {
                return Err(InMemoryStoreError::DuplicatePrimaryKey(key).boxed());
            }
            keyed.push((key, row));
        }

        let written = keyed.len() as u64;
        for (key, row) in keyed {
            stored.rows.insert(key, (partition.to_string(), row));
        }
        Ok(written)
    }
}

/// In-process vector store.
///
/// Clones share the same state, so a test can keep one handle for assertions
/// while the indexer owns another.
#[derive(Clone, Debug, Default)]
pub struct InMemoryVectorStore {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a collection as if some earlier process had created it.
    pub fn add_collection(&self, info: CollectionInfo, state: LoadState) {
        let mut inner = self.inner.lock();
        inner
            .collections
            .insert(info.name.clone(), StoredCollection::new(info, state));
    }

    pub fn add_index(&self, collection: &str, index: IndexDescriptor) {
        if let Some(stored) = self.inner.lock().collections.get_mut(collection) {
            stored.indexes.push(index);
        }
    }

    /// Removes a collection without recording a call, as another client would.
    pub fn drop_collection(&self, collection: &str) {
        self.inner.lock().collections.remove(collection);
    }

    /// Drops `collection` right before the next call of `operation` is
    /// served, as a concurrent client racing the caller would.
    pub fn drop_collection_before(&self, operation: RemoteOperation, collection: &str) {
        self.inner
            .lock()
            .pending_drops
            .insert(operation, collection.to_string());
    }

    pub fn set_load_state(&self, collection: &str, state: LoadState) {
        if let Some(stored) = self.inner.lock().collections.get_mut(collection) {
            stored.state = state;
        }
    }

    /// Progress values handed out by successive `get_load_progress` calls.
    /// A non-empty script also makes a non-waiting `load_collection` leave the
    /// collection in [`LoadState::Loading`]. Once the script runs out the
    /// collection reports 100.
    pub fn script_load_progress(&self, collection: &str, progress: impl IntoIterator<Item = u8>) {
        self.inner
            .lock()
            .load_progress
            .insert(collection.to_string(), progress.into_iter().collect());
    }

    /// Makes every subsequent call of `operation` fail until cleared.
    pub fn fail_on(&self, operation: RemoteOperation, code: ErrorCodes, message: impl Into<String>) {
        self.inner.lock().failures.insert(
            operation,
            InMemoryStoreError::Injected {
                code,
                message: message.into(),
            },
        );
    }

    pub fn clear_failures(&self) {
        self.inner.lock().failures.clear();
    }

    /// Every remote call received so far, in order.
    pub fn calls(&self) -> Vec<RemoteOperation> {
        self.inner.lock().calls.clone()
    }

    pub fn count_calls(&self, operation: RemoteOperation) -> usize {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|op| **op == operation)
            .count()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }

    pub fn load_state(&self, collection: &str) -> LoadState {
        self.inner
            .lock()
            .collections
            .get(collection)
            .map(|stored| stored.state)
            .unwrap_or(LoadState::NotExist)
    }

    pub fn indexes(&self, collection: &str) -> Vec<IndexDescriptor> {
        self.inner
            .lock()
            .collections
            .get(collection)
            .map(|stored| stored.indexes.clone())
            .unwrap_or_default()
    }

    pub fn partitions(&self, collection: &str) -> Vec<String> {
        self.inner
            .lock()
            .collections
            .get(collection)
            .map(|stored| stored.partitions.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Stored rows of one partition, ordered by primary key.
    pub fn rows(&self, collection: &str, partition: &str) -> Vec<Row> {
        self.inner
            .lock()
            .collections
            .get(collection)
            .map(|stored| {
                stored
                    .rows
                    .values()
                    .filter(|(p, _)| p == partition)
                    .map(|(_, row)| row.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl VectorStoreClient for InMemoryVectorStore {
    async fn has_collection(&self, collection: &str) -> Result<bool, Box<dyn TesseraError>> {
        let mut inner = self.inner.lock();
        inner.record(RemoteOperation::HasCollection)?;
        Ok(inner.collections.contains_key(collection))
    }

    async fn describe_collection(
        &self,
        collection: &str,
    ) -> Result<CollectionInfo, Box<dyn TesseraError>> {
        let mut inner = self.inner.lock();
        inner.record(RemoteOperation::DescribeCollection)?;
        Ok(inner.collection(collection)?.info.clone())
    }

    async fn create_collection(
        &self,
        descriptor: &CollectionDescriptor,
    ) -> Result<(), Box<dyn TesseraError>> {
        let mut inner = self.inner.lock();
        inner.record(RemoteOperation::CreateCollection)?;
        if inner.collections.contains_key(&descriptor.name) {
            return Err(InMemoryStoreError::CollectionAlreadyExists(descriptor.name.clone()).boxed());
        }
        inner.collections.insert(
            descriptor.name.clone(),
            StoredCollection::new(CollectionInfo::from(descriptor), LoadState::NotLoaded),
        );
        Ok(())
    }

    async fn describe_indexes(
        &self,
        collection: &str,
        field_name: &str,
    ) -> Result<Vec<IndexDescriptor>, Box<dyn TesseraError>> {
        let mut inner = self.inner.lock();
        inner.record(RemoteOperation::DescribeIndexes)?;
        Ok(inner
            .collection(collection)?
            .indexes
            .iter()
            .filter(|index| index.field_name == field_name)
            .cloned()
            .collect())
    }

    async fn create_index(
        &self,
        collection: &str,
        index: &IndexDescriptor,
    ) -> Result<(), Box<dyn TesseraError>> {
        let mut inner = self.inner.lock();
        inner.record(RemoteOperation::CreateIndex)?;
        let stored = inner.collection(collection)?;
        if !stored.info.fields.iter().any(|f| f.name == index.field_name) {
            return Err(InMemoryStoreError::FieldNotFound {
                collection: collection.to_string(),
                field: index.field_name.clone(),
            }
            .boxed());
        }
        if stored.indexes.iter().any(|i| i.field_name == index.field_name) {
            return Err(InMemoryStoreError::IndexAlreadyExists {
                collection: collection.to_string(),
                field: index.field_name.clone(),
            }
            .boxed());
        }
        stored.indexes.push(index.clone());
        Ok(())
    }

    async fn load_collection(
        &self,
        collection: &str,
        wait: bool,
    ) -> Result<(), Box<dyn TesseraError>> {
        let mut inner = self.inner.lock();
        inner.record(RemoteOperation::LoadCollection)?;
        let scripted = inner
            .load_progress
            .get(collection)
            .is_some_and(|progress| !progress.is_empty());
        let stored = inner.collection(collection)?;
        stored.state = if wait || !scripted {
            LoadState::Loaded
        } else {
            LoadState::Loading
        };
        Ok(())
    }

    async fn get_load_state(&self, collection: &str) -> Result<LoadState, Box<dyn TesseraError>> {
        let mut inner = self.inner.lock();
        inner.record(RemoteOperation::GetLoadState)?;
        Ok(inner
            .collections
            .get(collection)
            .map(|stored| stored.state)
            .unwrap_or(LoadState::NotExist))
    }

    async fn get_load_progress(&self, collection: &str) -> Result<u8, Box<dyn TesseraError>> {
        let mut inner = self.inner.lock();
        inner.record(RemoteOperation::GetLoadProgress)?;
        let progress = inner
            .load_progress
            .get_mut(collection)
            .and_then(|progress| progress.pop_front())
            .unwrap_or(100)
            .min(100);
        let stored = inner.collection(collection)?;
        if progress == 100 {
            stored.state = LoadState::Loaded;
        }
        Ok(progress)
    }

    async fn has_partition(
        &self,
        collection: &str,
        partition: &str,
    ) -> Result<bool, Box<dyn TesseraError>> {
        let mut inner = self.inner.lock();
        inner.record(RemoteOperation::HasPartition)?;
        Ok(inner.collection(collection)?.partitions.contains(partition))
    }

    async fn create_partition(
        &self,
        collection: &str,
        partition: &str,
    ) -> Result<(), Box<dyn TesseraError>> {
        let mut inner = self.inner.lock();
        inner.record(RemoteOperation::CreatePartition)?;
        let stored = inner.collection(collection)?;
        if !stored.partitions.insert(partition.to_string()) {
            return Err(InMemoryStoreError::PartitionAlreadyExists {
                collection: collection.to_string(),
                partition: partition.to_string(),
            }
            .boxed());
        }
        Ok(())
    }

    async fn load_partitions(
        &self,
        collection: &str,
        partitions: &[String],
    ) -> Result<(), Box<dyn TesseraError>> {
        let mut inner = self.inner.lock();
        inner.record(RemoteOperation::LoadPartitions)?;
        let stored = inner.collection(collection)?;
        if let Some(missing) = partitions.iter().find(|p| !stored.partitions.contains(*p)) {
            return Err(InMemoryStoreError::PartitionNotFound {
                collection: collection.to_string(),
                partition: missing.clone(),
            }
            .boxed());
        }
        Ok(())
    }

    async fn insert(
        &self,
        collection: &str,
        partition: &str,
        rows: Vec<Row>,
    ) -> Result<u64, Box<dyn TesseraError>> {
        let mut inner = self.inner.lock();
        inner.record(RemoteOperation::Insert)?;
        inner.write(collection, partition, rows, false)
    }

    async fn upsert(
        &self,
        collection: &str,
        partition: &str,
        rows: Vec<Row>,
    ) -> Result<u64, Box<dyn TesseraError>> {
        let mut inner = self.inner.lock();
        inner.record(RemoteOperation::Upsert)?;
        inner.write(collection, partition, rows, true)
    }
}
