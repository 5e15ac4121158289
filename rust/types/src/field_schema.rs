use serde::{Deserialize, Serialize};

pub const DEFAULT_ID_FIELD: &str = "id";
pub const DEFAULT_CONTENT_FIELD: &str = "content";
pub const DEFAULT_VECTOR_FIELD: &str = "vector";
pub const DEFAULT_METADATA_FIELD: &str = "metadata";

const DEFAULT_ID_MAX_LENGTH: u32 = 255;
const DEFAULT_CONTENT_MAX_LENGTH: u32 = 8192;

/// Column types understood by the vector store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Float,
    Double,
    VarChar,
    Json,
    Array,
    FloatVector,
    BinaryVector,
    Float16Vector,
    SparseFloatVector,
}

impl DataType {
    pub fn is_vector(&self) -> bool {
        matches!(
            self,
            DataType::FloatVector
                | DataType::BinaryVector
                | DataType::Float16Vector
                | DataType::SparseFloatVector
        )
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// One column of a collection schema.
///
/// Only `name` and `data_type` take part in schema compatibility checks; the
/// remaining attributes are creation hints and are often normalised or
/// omitted when a remote store describes an existing collection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    pub data_type: DataType,
    #[serde(default)]
    pub is_primary_key: bool,
    #[serde(default)]
    pub auto_id: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dim: Option<u32>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        FieldSchema {
            name: name.into(),
            data_type,
            is_primary_key: false,
            auto_id: false,
            max_length: None,
            dim: None,
            description: String::new(),
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self
    }

    pub fn with_max_length(mut self, max_length: u32) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn with_dim(mut self, dim: u32) -> Self {
        self.dim = Some(dim);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// The single-vector layout written by the default document converter:
/// `id`, `content`, `vector`, `metadata`, in that order.
pub fn default_fields(dim: u32) -> Vec<FieldSchema> {
    vec![
        FieldSchema::new(DEFAULT_ID_FIELD, DataType::VarChar)
            .primary_key()
            .with_max_length(DEFAULT_ID_MAX_LENGTH)
            .with_description("the unique id of the document"),
        FieldSchema::new(DEFAULT_CONTENT_FIELD, DataType::VarChar)
            .with_max_length(DEFAULT_CONTENT_MAX_LENGTH)
            .with_description("the content of the document"),
        FieldSchema::new(DEFAULT_VECTOR_FIELD, DataType::FloatVector)
            .with_dim(dim)
            .with_description("the vector of the document"),
        FieldSchema::new(DEFAULT_METADATA_FIELD, DataType::Json)
            .with_description("the metadata of the document"),
    ]
}
