/// Sortfield walkthrough
///
/// Registers a field group over an "encrypted" name field, inserts users one at a
/// time, renames one of them and prints the resulting sort order.

use sortfield::queue::memory_queue::MemoryGroupQueue;
use sortfield::storage::memory_store::MemoryStore;
use sortfield::{Config, Document, Error, ErrorKind, FieldValue, FieldWrite, GroupOptions, ObjectId, SortService};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const MASK: u8 = 0x2f;

fn seal(plain: &str) -> FieldValue {
    FieldValue::Bytes(plain.bytes().map(|b| b ^ MASK).collect())
}

fn open(raw: &FieldValue) -> sortfield::Result<String> {
    match raw {
        FieldValue::Null => Ok(String::new()),
        FieldValue::Bytes(bytes) => String::from_utf8(bytes.iter().map(|b| b ^ MASK).collect())
            .map_err(|e| Error::new(ErrorKind::Decrypt, e.to_string())),
        other => Err(Error::new(ErrorKind::Decrypt, format!("not a sealed value: {:?}", other))),
    }
}

fn print_order(store: &MemoryStore) -> sortfield::Result<()> {
    for doc in store.ordered_by("nameSort") {
        let name = open(doc.get_field("name").unwrap_or(&FieldValue::Null))?;
        let key = doc.sort_key("nameSort").map(|k| k.to_string()).unwrap_or_default();
        println!("  {:>3}  {:<8} {}", doc.id.0, name, key);
    }
    println!();
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("\n╔═══════════════════════════════════════════════╗");
    println!("║   Sortfield - Encrypted Field Ordering Demo   ║");
    println!("╚═══════════════════════════════════════════════╝\n");

    let config = Config { poll_interval_ms: 10, ..Config::default() };
    let store = Arc::new(MemoryStore::new());
    let queue = Arc::new(MemoryGroupQueue::from_config(&config));
    let service = SortService::new(config, store.clone(), queue)?;

    let group = service.register_field_group(
        "users",
        "name",
        "nameSort",
        Arc::new(open),
        GroupOptions::default().case_insensitive(true),
    )?;
    println!("Registered {}\n", group);

    let workers = service.start()?;

    println!("Step 1: INSERT - one user at a time...");
    for (id, name) in [(1, "Bob"), (2, "alice"), (3, "Carl"), (4, "dave"), (5, "Eve")] {
        let doc = Document::new(ObjectId(id)).with_field("name", seal(name));
        store.insert(doc.clone());
        service.on_document_created("users", &doc)?;
    }
    service.wait_idle(Duration::from_secs(10))?;
    print_order(&store)?;

    println!("Step 2: UPDATE - renaming Eve to Aaron...");
    if let Some(mut doc) = store.get(ObjectId(5)) {
        doc.add_field("name".to_string(), seal("Aaron"));
        store.insert(doc);
        service.on_update(&group, ObjectId(5), true, FieldWrite::Source(seal("Aaron")))?;
    }
    service.wait_idle(Duration::from_secs(10))?;
    print_order(&store)?;

    // Synchronous rebuilds must not race the consumers
    workers.shutdown();

    println!("Step 3: REBUILD - respacing every key...");
    let report = service.rebuild_now(&group)?;
    println!("  {} documents, {} distinct keys in {:?}", report.documents, report.distinct_keys, report.elapsed);
    print_order(&store)?;

    let stats = service.stats()?;
    println!("Stats:\n{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
