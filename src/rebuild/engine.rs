use std::cmp::Ordering;
use std::time::{Duration, Instant};
use rayon::prelude::*;
use crate::core::error::Result;
use crate::core::types::FieldValue;
use crate::group::field_group::{DocumentRef, FieldGroup};
use crate::key::arithmetic::KeySpace;
use crate::key::sort_key::SortKey;
use crate::storage::store::{DocumentStore, Filter, Projection};

#[derive(Debug, Clone)]
pub struct RebuildReport {
    pub documents: usize,
    pub distinct_keys: usize,
    pub step: Option<SortKey>,
    pub elapsed: Duration,
}

/// Gap between consecutive rebuilt keys.
///
/// The maximum key is halved `ceil(log2 n) + 1` times so `n` steps span at most
/// half of the key range at the initial length.
pub fn spacing(keys: &KeySpace, n: usize) -> Result<SortKey> {
    let halvings = ceil_log2(n.max(1)) + 1;
    let mut step = keys.max_key(keys.initial_key_length());
    for _ in 0..halvings {
        step = keys.half(&step)?;
    }
    Ok(step)
}

fn ceil_log2(n: usize) -> u32 {
    usize::BITS - (n - 1).leading_zeros()
}

/// Replaces every sort key of the group in one sorted pass
pub fn rebuild_all(store: &dyn DocumentStore, group: &FieldGroup) -> Result<RebuildReport> {
    let started = Instant::now();
    let documents = store.find_all(&Filter::All, &Projection::of(&[group.source_field.as_str()]))?;

    let mut refs: Vec<DocumentRef> = documents
        .par_iter()
        .map(|doc| group.document_ref(doc))
        .collect::<Result<Vec<_>>>()?;
    refs.par_sort_by(|a, b| group.compare(&a.value, &b.value));

    if refs.is_empty() {
        return Ok(RebuildReport { documents: 0, distinct_keys: 0, step: None, elapsed: started.elapsed() });
    }

    let step = spacing(&group.keys, refs.len())?;
    let mut current = group.keys.min_key(group.keys.initial_key_length());
    let mut distinct_keys = 0;
    let mut previous: Option<&str> = None;

    for doc in &refs {
        let collapses = previous.map_or(false, |p| group.compare(p, &doc.value) == Ordering::Equal);
        if !collapses {
            current = group.keys.add(&current, &step)?;
            distinct_keys += 1;
        }
        store.update_field(doc.id, &group.sort_field, FieldValue::Key(current.clone()))?;
        previous = Some(doc.value.as_str());
    }

    Ok(RebuildReport {
        documents: refs.len(),
        distinct_keys,
        step: Some(step),
        elapsed: started.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use super::*;
    use crate::core::config::{Config, GroupOptions};
    use crate::core::types::{Document, ObjectId};
    use crate::group::comparator::PlainText;
    use crate::storage::memory_store::MemoryStore;

    fn group(config: &Config) -> FieldGroup {
        FieldGroup::new("users", "name", "nameSort", Arc::new(PlainText), config, &GroupOptions::default()).unwrap()
    }

    #[test]
    fn ceil_log2_matches_definition() {
        assert_eq!(ceil_log2(1), 0);
        assert_eq!(ceil_log2(2), 1);
        assert_eq!(ceil_log2(3), 2);
        assert_eq!(ceil_log2(4), 2);
        assert_eq!(ceil_log2(150), 8);
    }

    #[test]
    fn keys_follow_value_order_and_collapse_duplicates() {
        let store = MemoryStore::new();
        for (id, name) in [(1, "carl"), (2, "alice"), (3, "bob"), (4, "alice")] {
            store.insert(Document::new(ObjectId(id)).with_field("name", name));
        }
        let g = group(&Config::default());
        let report = rebuild_all(&store, &g).unwrap();
        assert_eq!(report.documents, 4);
        assert_eq!(report.distinct_keys, 3);

        let key = |id| store.get(ObjectId(id)).unwrap().sort_key("nameSort").cloned().unwrap();
        assert_eq!(key(2), key(4));
        assert!(key(2) < key(3));
        assert!(key(3) < key(1));
    }

    #[test]
    fn small_radix_grows_precision_instead_of_overflowing() {
        let config = Config { radix: 16, initial_key_length: 1, ..Config::default() };
        let store = MemoryStore::new();
        for id in 0..150u64 {
            store.insert(Document::new(ObjectId(id)).with_field("name", format!("{:04}", 149 - id)));
        }
        let report = rebuild_all(&store, &group(&config)).unwrap();
        assert_eq!(report.distinct_keys, 150);

        let ordered: Vec<u64> = store.ordered_by("nameSort").iter().map(|d| d.id.0).collect();
        let expected: Vec<u64> = (0..150u64).rev().collect();
        assert_eq!(ordered, expected);
    }

    #[test]
    fn empty_collection_writes_nothing() {
        let store = MemoryStore::new();
        let report = rebuild_all(&store, &group(&Config::default())).unwrap();
        assert_eq!(report.documents, 0);
        assert_eq!(store.writes(), 0);
    }
}
