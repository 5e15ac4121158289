use crate::{default_fields, FieldSchema, IndexDescriptor, IndexType, MetricType, DEFAULT_VECTOR_FIELD};
use bon::Builder;
use serde::{Deserialize, Serialize};

/// Whether a collection is resident in the store's serving memory.
///
/// Always read fresh from the store; a value is only meaningful for the
/// readiness check that fetched it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadState {
    NotExist,
    NotLoaded,
    Loading,
    Loaded,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsistencyLevel {
    Strong,
    Session,
    #[default]
    Bounded,
    Eventually,
}

/// Everything needed to create a collection and its default vector index.
///
/// An empty `fields` list stands for the default single-vector layout of
/// [`default_fields`], sized by `dim`.
#[derive(Clone, Debug, PartialEq, Builder, Serialize, Deserialize)]
pub struct CollectionDescriptor {
    #[builder(into)]
    pub name: String,
    #[builder(into, default)]
    pub description: String,
    #[builder(default)]
    pub fields: Vec<FieldSchema>,
    pub dim: u32,
    #[builder(default = 1)]
    pub shards: u32,
    #[builder(default)]
    pub consistency_level: ConsistencyLevel,
    #[builder(default)]
    pub enable_dynamic_field: bool,
    /// Number of partitions when partition-key mode is on; zero turns it off.
    #[builder(default)]
    pub partition_num: u32,
    #[builder(into, default = DEFAULT_VECTOR_FIELD.to_string())]
    pub vector_field: String,
    #[builder(default)]
    pub index_type: IndexType,
    #[builder(default)]
    pub metric_type: MetricType,
}

impl CollectionDescriptor {
    /// The fields the collection is created with.
    pub fn resolved_fields(&self) -> Vec<FieldSchema> {
        if self.fields.is_empty() {
            default_fields(self.dim)
        } else {
            self.fields.clone()
        }
    }

    pub fn vector_field_schema(&self) -> Option<FieldSchema> {
        self.resolved_fields()
            .into_iter()
            .find(|field| field.name == self.vector_field)
    }

    pub fn partition_key_enabled(&self) -> bool {
        self.partition_num > 0
    }

    /// The index created on first load when the collection has none.
    pub fn default_index(&self) -> IndexDescriptor {
        IndexDescriptor::for_field(&self.vector_field, self.index_type, self.metric_type)
    }
}

/// What a store reports back about an existing collection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub fields: Vec<FieldSchema>,
}

impl From<&CollectionDescriptor> for CollectionInfo {
    fn from(descriptor: &CollectionDescriptor) -> Self {
        CollectionInfo {
            name: descriptor.name.clone(),
            description: descriptor.description.clone(),
            fields: descriptor.resolved_fields(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DataType;

    #[test]
    fn test_builder_defaults() {
        let descriptor = CollectionDescriptor::builder().name("docs").dim(8).build();
        assert_eq!(descriptor.shards, 1);
        assert_eq!(descriptor.consistency_level, ConsistencyLevel::Bounded);
        assert_eq!(descriptor.vector_field, "vector");
        assert_eq!(descriptor.metric_type, MetricType::L2);
        assert_eq!(descriptor.index_type, IndexType::AutoIndex);
        assert!(!descriptor.partition_key_enabled());
        assert_eq!(descriptor.resolved_fields(), default_fields(8));
    }

    #[test]
    fn test_explicit_fields_win_over_default_layout() {
        let fields = vec![
            FieldSchema::new("pk", DataType::Int64).primary_key(),
            FieldSchema::new("embedding", DataType::BinaryVector).with_dim(64),
        ];
        let descriptor = CollectionDescriptor::builder()
            .name("bits")
            .dim(64)
            .fields(fields.clone())
            .vector_field("embedding")
            .metric_type(MetricType::Hamming)
            .build();
        assert_eq!(descriptor.resolved_fields(), fields);
        assert_eq!(
            descriptor.vector_field_schema().map(|f| f.data_type),
            Some(DataType::BinaryVector)
        );
        let index = descriptor.default_index();
        assert_eq!(index.field_name, "embedding");
        assert_eq!(index.metric_type, MetricType::Hamming);
    }

    #[test]
    fn test_missing_vector_field() {
        let descriptor = CollectionDescriptor::builder()
            .name("docs")
            .dim(4)
            .vector_field("nope")
            .build();
        assert!(descriptor.vector_field_schema().is_none());
    }

    #[test]
    fn test_info_from_descriptor() {
        let descriptor = CollectionDescriptor::builder()
            .name("docs")
            .description("my docs")
            .dim(4)
            .build();
        let info = CollectionInfo::from(&descriptor);
        assert_eq!(info.name, "docs");
        assert_eq!(info.description, "my docs");
        assert_eq!(info.fields.len(), 4);
    }
}
