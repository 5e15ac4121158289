use serde::{Deserialize, Serialize};
use tessera_types::{
    CollectionDescriptor, ConsistencyLevel, FieldSchema, IndexType, MetricType,
    DEFAULT_VECTOR_FIELD,
};

use crate::{
    errors::ConfigurationError,
    readiness::{validate_descriptor, LoadPollPolicy, DEFAULT_PARTITION},
};

const DEFAULT_CONFIG_PATH: &str = "./tessera_config.yaml";
const ENV_PREFIX: &str = "TESSERA_";

pub const DEFAULT_COLLECTION: &str = "tessera_collection";
pub const DEFAULT_DESCRIPTION: &str = "the collection for tessera";

#[derive(Deserialize, Serialize, Debug, Clone)]
/// # Description
/// The root of the tessera config file. Wraps the indexer config so the same
/// file can carry settings of other components. Values can also come from
/// environment variables prefixed with `TESSERA_`, with `__` between nesting
/// levels (`TESSERA_INDEXER__DIM=768`); they take precedence over the file.
pub struct RootConfig {
    pub indexer: IndexerConfig,
}

impl RootConfig {
    /// Loads `./tessera_config.yaml` merged with the environment.
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    pub fn load_from_path(path: &str) -> Result<Self, figment::Error> {
        tessera_config::load_from_path(path, ENV_PREFIX)
    }
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

fn default_partition() -> String {
    DEFAULT_PARTITION.to_string()
}

fn default_description() -> String {
    DEFAULT_DESCRIPTION.to_string()
}

fn default_vector_field() -> String {
    DEFAULT_VECTOR_FIELD.to_string()
}

fn default_shards() -> u32 {
    1
}

/// Where and how the indexer stores documents.
///
/// Only `dim` is required. Leaving `fields` empty selects the default
/// `id`/`content`/`vector`/`metadata` layout written by
/// [`crate::DefaultDocumentConverter`].
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct IndexerConfig {
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_partition")]
    pub partition: String,
    #[serde(default = "default_description")]
    pub description: String,
    pub dim: i64,
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
    #[serde(default)]
    pub metric_type: MetricType,
    #[serde(default)]
    pub index_type: IndexType,
    #[serde(default = "default_vector_field")]
    pub vector_field: String,
    #[serde(default = "default_shards")]
    pub shards: u32,
    #[serde(default)]
    pub consistency_level: ConsistencyLevel,
    #[serde(default)]
    pub enable_dynamic_field: bool,
    /// Partition-key mode when greater than zero. Rows are then spread over
    /// partitions by the store and no partition may be named.
    #[serde(default)]
    pub partition_num: u32,
    #[serde(default)]
    pub load_poll: LoadPollPolicy,
}

impl IndexerConfig {
    pub fn new(dim: i64) -> Self {
        IndexerConfig {
            collection: default_collection(),
            partition: default_partition(),
            description: default_description(),
            dim,
            fields: Vec::new(),
            metric_type: MetricType::default(),
            index_type: IndexType::default(),
            vector_field: default_vector_field(),
            shards: default_shards(),
            consistency_level: ConsistencyLevel::default(),
            enable_dynamic_field: false,
            partition_num: 0,
            load_poll: LoadPollPolicy::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.to_descriptor().map(|_| ())
    }

    /// Validates the config and turns it into the descriptor used to create
    /// and prepare the collection.
    pub fn to_descriptor(&self) -> Result<CollectionDescriptor, ConfigurationError> {
        if self.collection.is_empty() {
            return Err(ConfigurationError::EmptyCollectionName);
        }
        if self.partition.is_empty() {
            return Err(ConfigurationError::EmptyPartitionName);
        }
        let dim = u32::try_from(self.dim)
            .ok()
            .filter(|dim| *dim > 0)
            .ok_or(ConfigurationError::InvalidDimension { dim: self.dim })?;
        if self.partition_num > 0 && self.partition != DEFAULT_PARTITION {
            return Err(ConfigurationError::PartitionWithPartitionKey {
                partition: self.partition.clone(),
                partition_num: self.partition_num,
            });
        }

        let descriptor = CollectionDescriptor::builder()
            .name(self.collection.as_str())
            .description(self.description.as_str())
            .fields(self.fields.clone())
            .dim(dim)
            .shards(self.shards)
            .consistency_level(self.consistency_level)
            .enable_dynamic_field(self.enable_dynamic_field)
            .partition_num(self.partition_num)
            .vector_field(self.vector_field.as_str())
            .index_type(self.index_type)
            .metric_type(self.metric_type)
            .build();
        validate_descriptor(&descriptor)?;
        self.load_poll.validate()?;
        Ok(descriptor)
    }
}
