use std::cmp::Ordering;
use std::collections::HashMap;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::Document;
use crate::group::field_group::FieldGroup;
use crate::key::sort_key::SortKey;
use crate::storage::store::{DocumentStore, Filter, Projection};

/// Neighbour keys around the position a value belongs at
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    pub predecessor: Option<SortKey>,
    pub successor: Option<SortKey>,
    /// A keyed document holds an equal value; both bounds are its key
    pub exact: bool,
    /// Documents decrypted during the search
    pub probes: usize,
}

impl Bounds {
    fn open() -> Self {
        Bounds { predecessor: None, successor: None, exact: false, probes: 0 }
    }
}

/// Binary search over the keyed documents of one field group.
///
/// Only documents with a non-null sort key take part; each step fetches one
/// document by rank and decrypts only that document.
pub struct Locator<'a> {
    store: &'a dyn DocumentStore,
    group: &'a FieldGroup,
    filter: Filter,
    projection: Projection,
    keys: HashMap<usize, SortKey>,
    probes: usize,
}

impl<'a> Locator<'a> {
    pub fn new(store: &'a dyn DocumentStore, group: &'a FieldGroup) -> Self {
        Locator {
            store,
            group,
            filter: Filter::present(&group.sort_field),
            projection: Projection::of(&[group.source_field.as_str(), group.sort_field.as_str()]),
            keys: HashMap::new(),
            probes: 0,
        }
    }

    /// `target` must already be normalized for the group
    pub fn locate(mut self, target: &str) -> Result<Bounds> {
        let n = self.store.count(&self.filter)?;
        if n == 0 {
            return Ok(Bounds::open());
        }

        let (mut lo, mut hi) = (0, n);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let doc = self.fetch(mid)?;
            let value = self.group.document_ref(&doc)?.value;
            self.probes += 1;

            match self.group.compare(target, &value) {
                Ordering::Equal => {
                    let key = self.key_at(mid)?;
                    return Ok(Bounds {
                        predecessor: Some(key.clone()),
                        successor: Some(key),
                        exact: true,
                        probes: self.probes,
                    });
                }
                Ordering::Less => hi = mid,
                Ordering::Greater => lo = mid + 1,
            }
        }

        // `lo` is the rank of the first keyed document sorting after `target`
        let predecessor = if lo == 0 { None } else { Some(self.key_at(lo - 1)?) };
        let successor = if lo == n { None } else { Some(self.key_at(lo)?) };
        Ok(Bounds { predecessor, successor, exact: false, probes: self.probes })
    }

    fn fetch(&mut self, rank: usize) -> Result<Document> {
        let doc = self
            .store
            .find_at(&self.filter, &self.projection, &self.group.sort_field, true, rank)?
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::InvalidState,
                    format!("{}: no keyed document at rank {}, collection changed mid-search", self.group.id, rank),
                )
            })?;
        let key = doc.sort_key(&self.group.sort_field).cloned().ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidState,
                format!("{}: document {} at rank {} has no sort key", self.group.id, doc.id, rank),
            )
        })?;
        self.keys.insert(rank, key);
        Ok(doc)
    }

    fn key_at(&mut self, rank: usize) -> Result<SortKey> {
        if let Some(key) = self.keys.get(&rank) {
            return Ok(key.clone());
        }
        self.fetch(rank)?;
        self.keys
            .get(&rank)
            .cloned()
            .ok_or_else(|| Error::new(ErrorKind::Internal, "rank cache miss after fetch"))
    }
}

pub fn locate(store: &dyn DocumentStore, group: &FieldGroup, target: &str) -> Result<Bounds> {
    Locator::new(store, group).locate(target)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use super::*;
    use crate::core::config::{Config, GroupOptions};
    use crate::core::types::{FieldValue, ObjectId};
    use crate::group::comparator::PlainText;
    use crate::storage::memory_store::MemoryStore;

    fn group(case_insensitive: bool) -> FieldGroup {
        let options = GroupOptions::default().case_insensitive(case_insensitive);
        FieldGroup::new("users", "name", "nameSort", Arc::new(PlainText), &Config::default(), &options).unwrap()
    }

    fn key(d: u16) -> SortKey {
        SortKey::from_digits(vec![d])
    }

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        for (id, name, k) in [(1, "bob", 20), (2, "dave", 40), (3, "alice", 10), (4, "carl", 30)] {
            store.insert(
                Document::new(ObjectId(id))
                    .with_field("name", name)
                    .with_field("nameSort", key(k)),
            );
        }
        // Unkeyed documents never anchor the search
        store.insert(Document::new(ObjectId(9)).with_field("name", "aaron").with_field("nameSort", FieldValue::Null));
        store
    }

    #[test]
    fn empty_group_has_open_bounds() {
        let store = MemoryStore::new();
        let bounds = locate(&store, &group(false), "x").unwrap();
        assert_eq!(bounds, Bounds::open());
    }

    #[test]
    fn straddling_pair() {
        let store = seeded();
        let bounds = locate(&store, &group(false), "bz").unwrap();
        assert_eq!(bounds.predecessor, Some(key(20)));
        assert_eq!(bounds.successor, Some(key(30)));
        assert!(!bounds.exact);
    }

    #[test]
    fn outside_the_keyed_range() {
        let store = seeded();
        let low = locate(&store, &group(false), "aa").unwrap();
        assert_eq!((low.predecessor, low.successor), (None, Some(key(10))));
        let high = locate(&store, &group(false), "zed").unwrap();
        assert_eq!((high.predecessor, high.successor), (Some(key(40)), None));
    }

    #[test]
    fn equal_value_reuses_key() {
        let store = seeded();
        let bounds = locate(&store, &group(false), "carl").unwrap();
        assert!(bounds.exact);
        assert_eq!(bounds.predecessor, Some(key(30)));
        assert_eq!(bounds.successor, Some(key(30)));
    }

    #[test]
    fn case_insensitive_groups_compare_lowercased() {
        let store = MemoryStore::new();
        store.insert(Document::new(ObjectId(1)).with_field("name", "Bob").with_field("nameSort", key(20)));
        let g = group(true);
        let bounds = locate(&store, &g, &g.normalize("BOB".to_string())).unwrap();
        assert!(bounds.exact);
    }

    #[test]
    fn decrypts_logarithmically() {
        let store = MemoryStore::new();
        for i in 0..1024u16 {
            store.insert(
                Document::new(ObjectId(u64::from(i)))
                    .with_field("name", format!("{:05}", i * 2))
                    .with_field("nameSort", SortKey::from_digits(vec![i])),
            );
        }
        let bounds = locate(&store, &group(false), "00777").unwrap();
        assert!(bounds.probes <= 11, "probes = {}", bounds.probes);
        // Neighbour keys not touched by the search cost at most two extra reads
        assert!(store.point_reads() <= bounds.probes + 2);
        assert_eq!(bounds.predecessor, Some(SortKey::from_digits(vec![388])));
        assert_eq!(bounds.successor, Some(SortKey::from_digits(vec![389])));
    }
}
