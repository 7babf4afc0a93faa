use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use parking_lot::RwLock;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{Document, FieldValue, ObjectId};
use crate::key::sort_key::SortKey;
use crate::storage::store::{DocumentStore, Filter, Projection, WriteOutcome};

/// In-process document store
pub struct MemoryStore {
    pub documents: RwLock<BTreeMap<ObjectId, Document>>,
    pub point_reads: AtomicUsize,
    pub writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            documents: RwLock::new(BTreeMap::new()),
            point_reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn insert(&self, doc: Document) {
        self.documents.write().insert(doc.id, doc);
    }

    pub fn get(&self, id: ObjectId) -> Option<Document> {
        self.documents.read().get(&id).cloned()
    }

    pub fn remove(&self, id: ObjectId) -> Option<Document> {
        self.documents.write().remove(&id)
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }

    /// Keyed documents in sort key order, ties broken by object id
    pub fn ordered_by(&self, sort_field: &str) -> Vec<Document> {
        let documents = self.documents.read();
        let mut keyed: Vec<Document> = documents
            .values()
            .filter(|doc| doc.sort_key(sort_field).is_some())
            .cloned()
            .collect();
        keyed.sort_by(|a, b| a.sort_key(sort_field).cmp(&b.sort_key(sort_field)));
        keyed
    }

    pub fn point_reads(&self) -> usize {
        self.point_reads.load(Ordering::Relaxed)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for MemoryStore {
    fn count(&self, filter: &Filter) -> Result<usize> {
        Ok(self.documents.read().values().filter(|doc| filter.matches(doc)).count())
    }

    fn find_at(
        &self,
        filter: &Filter,
        projection: &Projection,
        sort_field: &str,
        ascending: bool,
        rank: usize,
    ) -> Result<Option<Document>> {
        self.point_reads.fetch_add(1, Ordering::Relaxed);
        let documents = self.documents.read();
        let mut matching: Vec<&Document> = documents.values().filter(|doc| filter.matches(doc)).collect();
        // BTreeMap iteration is id-ordered, so the stable sort breaks key ties by id
        matching.sort_by(|a, b| {
            let order = a.sort_key(sort_field).cmp(&b.sort_key(sort_field));
            if ascending { order } else { order.reverse() }
        });
        Ok(matching.get(rank).map(|doc| projection.apply(doc)))
    }

    fn find_all(&self, filter: &Filter, projection: &Projection) -> Result<Vec<Document>> {
        Ok(self
            .documents
            .read()
            .values()
            .filter(|doc| filter.matches(doc))
            .map(|doc| projection.apply(doc))
            .collect())
    }

    fn update_field(&self, id: ObjectId, field: &str, value: FieldValue) -> Result<()> {
        let mut documents = self.documents.write();
        let doc = documents.get_mut(&id).ok_or_else(|| {
            Error::new(ErrorKind::NotFound, format!("document {} not found", id))
        })?;
        doc.fields.insert(field.to_string(), value);
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn set_key_if_unclaimed(&self, id: ObjectId, sort_field: &str, key: &SortKey) -> Result<WriteOutcome> {
        let mut documents = self.documents.write();
        if let Some(holder) = documents
            .values()
            .find(|doc| doc.id != id && doc.sort_key(sort_field) == Some(key))
        {
            return Ok(WriteOutcome::Collision { holder: holder.id });
        }
        match documents.get_mut(&id) {
            Some(doc) => {
                doc.fields.insert(sort_field.to_string(), FieldValue::Key(key.clone()));
                self.writes.fetch_add(1, Ordering::Relaxed);
                Ok(WriteOutcome::Written)
            }
            None => Ok(WriteOutcome::Missing),
        }
    }
}
