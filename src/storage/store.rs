use crate::core::error::Result;
use crate::core::types::{Document, FieldValue, ObjectId};
use crate::key::sort_key::SortKey;

/// Document selection understood by every store adapter
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    All,
    /// Field is absent or null
    Missing(String),
    /// Field is present and non-null
    Present(String),
    Equals(String, FieldValue),
    Ids(Vec<ObjectId>),
}

impl Filter {
    pub fn missing(field: &str) -> Self {
        Filter::Missing(field.to_string())
    }

    pub fn present(field: &str) -> Self {
        Filter::Present(field.to_string())
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::Missing(field) => doc.get_field(field).map_or(true, FieldValue::is_null),
            Filter::Present(field) => doc.get_field(field).map_or(false, |v| !v.is_null()),
            Filter::Equals(field, value) => doc.get_field(field) == Some(value),
            Filter::Ids(ids) => ids.contains(&doc.id),
        }
    }
}

/// Fields to return; the object id is always returned
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    pub fields: Vec<String>,
}

impl Projection {
    pub fn of(fields: &[&str]) -> Self {
        Projection {
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }

    pub fn ids_only() -> Self {
        Projection::default()
    }

    pub fn apply(&self, doc: &Document) -> Document {
        let mut projected = Document::new(doc.id);
        for field in &self.fields {
            if let Some(value) = doc.get_field(field) {
                projected.add_field(field.clone(), value.clone());
            }
        }
        projected
    }
}

/// Result of a conditional key write
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    Written,
    /// Another document already holds the key
    Collision { holder: ObjectId },
    /// Target document no longer exists
    Missing,
}

/// Backing store adapter.
///
/// Sorting by `sort_field` compares `FieldValue::Key` values; documents whose
/// sort field is absent or null are expected to be excluded by the filter.
pub trait DocumentStore: Send + Sync {
    fn count(&self, filter: &Filter) -> Result<usize>;

    /// Rank-based point lookup, equivalent to `skip(rank).limit(1)`
    fn find_at(
        &self,
        filter: &Filter,
        projection: &Projection,
        sort_field: &str,
        ascending: bool,
        rank: usize,
    ) -> Result<Option<Document>>;

    fn find_all(&self, filter: &Filter, projection: &Projection) -> Result<Vec<Document>>;

    fn update_field(&self, id: ObjectId, field: &str, value: FieldValue) -> Result<()>;

    /// Writes `key` unless a different document already holds it
    fn set_key_if_unclaimed(&self, id: ObjectId, sort_field: &str, key: &SortKey) -> Result<WriteOutcome>;
}
