use serde::{Deserialize, Serialize};

/// A single cell of a storage row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Bool(bool),
    Int64(i64),
    Double(f64),
    VarChar(String),
    /// Serialized JSON document.
    Json(Vec<u8>),
    FloatVector(Vec<f32>),
}

/// One record as written to the store: column name and value pairs in
/// column order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    columns: Vec<(String, FieldValue)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.push(name, value);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, value: FieldValue) {
        self.columns.push((name.into(), value));
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Value of the named column when it holds a string.
    pub fn varchar(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(FieldValue::VarChar(s)) => Some(s.as_str()),
            _ => None,
        }
    }
}
