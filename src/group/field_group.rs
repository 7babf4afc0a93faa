use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use crate::core::config::{Config, GroupOptions};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{Document, FieldValue, GroupId, ObjectId};
use crate::group::comparator::Comparator;
use crate::key::arithmetic::KeySpace;

/// One maintained ordering: a source field mirrored into a sort field
pub struct FieldGroup {
    pub id: GroupId,
    pub collection: String,
    pub source_field: String,
    pub sort_field: String,
    pub comparator: Arc<dyn Comparator>,
    pub case_insensitive: bool,
    pub keys: KeySpace,
}

/// Decrypted projection used while locating and rebuilding
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRef {
    pub id: ObjectId,
    pub value: String,
}

impl FieldGroup {
    pub fn new(
        collection: &str,
        source_field: &str,
        sort_field: &str,
        comparator: Arc<dyn Comparator>,
        config: &Config,
        options: &GroupOptions,
    ) -> Result<Self> {
        for (what, name) in [("collection", collection), ("source field", source_field), ("sort field", sort_field)] {
            if name.trim().is_empty() {
                return Err(Error::new(ErrorKind::Registration, format!("{} name is empty", what)));
            }
        }
        if source_field == sort_field {
            return Err(Error::new(
                ErrorKind::Registration,
                format!("sort field '{}' cannot mirror itself", sort_field),
            ));
        }

        let keys = KeySpace::new(
            config.radix,
            options.initial_key_length.unwrap_or(config.initial_key_length),
            options.saturation_growth_step.unwrap_or(config.saturation_growth_step),
        )
        .map_err(|e| Error::new(ErrorKind::Registration, e.context))?;

        Ok(FieldGroup {
            id: GroupId::new(collection, source_field, sort_field),
            collection: collection.to_string(),
            source_field: source_field.to_string(),
            sort_field: sort_field.to_string(),
            comparator,
            case_insensitive: options.case_insensitive.unwrap_or(config.case_insensitive),
            keys,
        })
    }

    pub fn normalize(&self, value: String) -> String {
        if self.case_insensitive {
            value.to_lowercase()
        } else {
            value
        }
    }

    /// Decrypts and normalizes a raw source value
    pub fn plaintext(&self, raw: &FieldValue) -> Result<String> {
        Ok(self.normalize(self.comparator.decrypt(raw)?))
    }

    /// Missing source fields read as empty strings
    pub fn document_ref(&self, doc: &Document) -> Result<DocumentRef> {
        let raw = doc.get_field(&self.source_field).unwrap_or(&FieldValue::Null);
        Ok(DocumentRef {
            id: doc.id,
            value: self.plaintext(raw)?,
        })
    }

    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        self.comparator.compare(a, b)
    }

    /// Resolved options match; comparators are not comparable and are ignored
    pub fn same_settings(&self, other: &FieldGroup) -> bool {
        self.case_insensitive == other.case_insensitive && self.keys == other.keys
    }
}

impl fmt::Debug for FieldGroup {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("FieldGroup")
            .field("id", &self.id)
            .field("case_insensitive", &self.case_insensitive)
            .field("keys", &self.keys)
            .finish()
    }
}
