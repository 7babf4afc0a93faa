use std::collections::HashMap;
use std::fmt;
use serde::{Serialize, Deserialize};
use crate::key::sort_key::SortKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

impl From<u64> for ObjectId {
    fn from(id: u64) -> Self {
        ObjectId(id)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Null,
    Text(String),
    Number(f64),
    Bytes(Vec<u8>),
    Key(SortKey),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_key(&self) -> Option<&SortKey> {
        match self {
            FieldValue::Key(key) => Some(key),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<SortKey> for FieldValue {
    fn from(key: SortKey) -> Self {
        FieldValue::Key(key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: ObjectId,
    pub fields: HashMap<String, FieldValue>,
}

impl Document {
    pub fn new(id: ObjectId) -> Self {
        Document {
            id,
            fields: HashMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn add_field(&mut self, name: String, value: FieldValue) {
        self.fields.insert(name, value);
    }

    /// Missing fields read as `None`; explicit nulls read as `Some(Null)`
    pub fn get_field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn sort_key(&self, field: &str) -> Option<&SortKey> {
        self.get_field(field).and_then(FieldValue::as_key)
    }
}

/// Identifies one maintained ordering: `collection::source::sort`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupId(pub String);

impl GroupId {
    pub fn new(collection: &str, source_field: &str, sort_field: &str) -> Self {
        GroupId(format!("{}::{}::{}", collection, source_field, sort_field))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GroupId {
    fn from(value: &str) -> Self {
        GroupId(value.to_string())
    }
}
