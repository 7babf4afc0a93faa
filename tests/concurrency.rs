mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use common::*;
use rand::seq::SliceRandom;
use rand::Rng;
use sortfield::core::error::{Error, ErrorKind};
use sortfield::{Config, FieldValue, GroupOptions, ObjectId, PendingJob};

fn random_word(rng: &mut impl Rng) -> String {
    let len = rng.gen_range(1..6);
    (0..len).map(|_| rng.gen_range(b'a'..=b'f') as char).collect()
}

#[test]
fn shuffled_inserts_converge_across_workers() {
    let config = Config { consumer_concurrency: 4, ..test_config() };
    let h = harness(config);
    let mut rng = rand::thread_rng();

    let first = h
        .service
        .register_field_group("users", "first", "firstSort", decrypting_comparator(), GroupOptions::default())
        .unwrap();
    let last = h
        .service
        .register_field_group("users", "last", "lastSort", decrypting_comparator(), GroupOptions::default())
        .unwrap();
    assert_ne!(first, last);

    let workers = h.service.start().unwrap();
    assert_eq!(workers.worker_count(), 4);

    let mut ids: Vec<u64> = (0..200).collect();
    ids.shuffle(&mut rng);
    for oid in ids {
        let doc = sortfield::Document::new(ObjectId(oid))
            .with_field("first", encrypt(&random_word(&mut rng)))
            .with_field("last", encrypt(&random_word(&mut rng)));
        h.store.insert(doc.clone());
        assert_eq!(h.service.on_document_created("users", &doc).unwrap(), 2);
    }

    assert!(h.service.wait_idle(DRAIN).unwrap());
    workers.shutdown();

    assert_consistent(&h.store, "first", "firstSort");
    assert_consistent(&h.store, "last", "lastSort");
    let stats = h.service.stats().unwrap();
    assert_eq!(stats.scheduler.processed, 400);
    assert_eq!(stats.scheduler.failed, 0);
}

#[test]
fn repeated_job_keeps_order_consistent() {
    let h = harness(test_config());
    let id = h
        .service
        .register_field_group("users", "name", "nameSort", decrypting_comparator(), GroupOptions::default())
        .unwrap();
    for (oid, name) in [(1, "ant"), (2, "bee"), (3, "cat"), (4, "dog")] {
        insert(&h.store, oid, "name", name);
    }
    h.service.rebuild_now(&id).unwrap();

    let orchestrator = h.service.group(&id).unwrap();
    let job = PendingJob::assign(ObjectId(3), encrypt("cat"));
    orchestrator.handle(job.clone()).unwrap();
    let once = h.store.get(ObjectId(3)).unwrap().sort_key("nameSort").cloned();
    orchestrator.handle(job).unwrap();
    let twice = h.store.get(ObjectId(3)).unwrap().sort_key("nameSort").cloned();

    assert!(once.is_some());
    assert_eq!(once, twice);
    assert_eq!(decrypted_order(&h.store, "name", "nameSort"), vec!["ant", "bee", "cat", "dog"]);
}

#[test]
fn failed_job_is_redelivered_and_completes() {
    let h = harness(test_config());
    let failures = Arc::new(AtomicUsize::new(0));
    let seen = failures.clone();
    let flaky = move |raw: &FieldValue| -> sortfield::Result<String> {
        if seen.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(Error::new(ErrorKind::Decrypt, "key service unavailable"));
        }
        decrypt(raw)
    };
    let id = h
        .service
        .register_field_group("users", "name", "nameSort", Arc::new(flaky), GroupOptions::default())
        .unwrap();

    insert(&h.store, 1, "name", "zoe");
    h.service.on_create(&id, ObjectId(1), encrypt("zoe")).unwrap();
    let workers = h.service.start().unwrap();
    assert!(h.service.wait_idle(DRAIN).unwrap());
    workers.shutdown();

    assert!(h.store.get(ObjectId(1)).unwrap().sort_key("nameSort").is_some());
    let stats = h.service.stats().unwrap();
    assert_eq!(stats.scheduler.failed, 1);
    assert_eq!(stats.scheduler.processed, 1);
}
