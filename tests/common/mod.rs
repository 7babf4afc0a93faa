#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use sortfield::core::error::{Error, ErrorKind};
use sortfield::queue::memory_queue::MemoryGroupQueue;
use sortfield::storage::memory_store::MemoryStore;
use sortfield::{Comparator, Config, Document, FieldValue, SortService};

pub const MASK: u8 = 0x5a;

/// Toy cipher standing in for real field encryption
pub fn encrypt(plain: &str) -> FieldValue {
    FieldValue::Bytes(plain.bytes().map(|b| b ^ MASK).collect())
}

pub fn decrypt(raw: &FieldValue) -> sortfield::Result<String> {
    match raw {
        FieldValue::Null => Ok(String::new()),
        FieldValue::Bytes(bytes) => String::from_utf8(bytes.iter().map(|b| b ^ MASK).collect())
            .map_err(|e| Error::new(ErrorKind::Decrypt, e.to_string())),
        other => Err(Error::new(ErrorKind::Decrypt, format!("unexpected value {:?}", other))),
    }
}

pub fn decrypting_comparator() -> Arc<dyn Comparator> {
    Arc::new(decrypt)
}

pub fn test_config() -> Config {
    Config {
        poll_interval_ms: 5,
        quiet: true,
        ..Config::default()
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub queue: Arc<MemoryGroupQueue>,
    pub service: SortService,
}

pub fn harness(config: Config) -> Harness {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let store = Arc::new(MemoryStore::new());
    let queue = Arc::new(MemoryGroupQueue::from_config(&config));
    let service = SortService::new(config, store.clone(), queue.clone()).unwrap();
    Harness { store, queue, service }
}

/// Insert a document whose `field` holds `plain` encrypted
pub fn insert(store: &MemoryStore, id: u64, field: &str, plain: &str) -> Document {
    let doc = Document::new(sortfield::ObjectId(id)).with_field(field, encrypt(plain));
    store.insert(doc.clone());
    doc
}

/// Decrypted source values in sort key order
pub fn decrypted_order(store: &MemoryStore, source: &str, sort: &str) -> Vec<String> {
    store
        .ordered_by(sort)
        .iter()
        .map(|doc| decrypt(doc.get_field(source).unwrap_or(&FieldValue::Null)).unwrap())
        .collect()
}

/// Checks keys against values pairwise: strict order for distinct values, shared keys for equal ones
pub fn assert_consistent(store: &MemoryStore, source: &str, sort: &str) {
    let docs = store.ordered_by(sort);
    assert_eq!(docs.len(), store.len(), "every document should carry a key");
    for pair in docs.windows(2) {
        let a = decrypt(pair[0].get_field(source).unwrap()).unwrap();
        let b = decrypt(pair[1].get_field(source).unwrap()).unwrap();
        let ka = pair[0].sort_key(sort).unwrap();
        let kb = pair[1].sort_key(sort).unwrap();
        assert!(a <= b, "values out of order: {:?} before {:?}", a, b);
        if a == b {
            assert_eq!(ka, kb, "equal values {:?} should share a key", a);
        } else {
            assert!(ka < kb, "distinct values {:?} / {:?} need distinct keys", a, b);
        }
    }
}

pub const DRAIN: Duration = Duration::from_secs(30);
