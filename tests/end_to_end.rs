mod common;

use common::*;
use sortfield::queue::group_queue::GroupQueue;
use sortfield::queue::job::JobEnvelope;
use sortfield::{Document, FieldValue, GroupOptions, ObjectId, ReconcilePlan, SortKey};

#[test]
fn encrypted_names_sort_in_plaintext_order() {
    let h = harness(test_config());
    let id = h
        .service
        .register_field_group("users", "name", "nameSort", decrypting_comparator(), GroupOptions::default())
        .unwrap();
    let workers = h.service.start().unwrap();

    for (oid, name) in [(1, "Bob"), (2, "Alice"), (3, "Carl")] {
        insert(&h.store, oid, "name", name);
        h.service.on_create(&id, ObjectId(oid), encrypt(name)).unwrap();
        assert!(h.service.wait_idle(DRAIN).unwrap());
    }
    workers.shutdown();

    assert_eq!(decrypted_order(&h.store, "name", "nameSort"), vec!["Alice", "Bob", "Carl"]);
    let stats = h.service.stats().unwrap();
    assert_eq!(stats.scheduler.processed, 3);
    assert_eq!(stats.groups[0].keys_assigned, 3);
}

#[test]
fn case_insensitive_group_ignores_letter_case() {
    let h = harness(test_config());
    let id = h
        .service
        .register_field_group(
            "users",
            "name",
            "nameSort",
            decrypting_comparator(),
            GroupOptions::default().case_insensitive(true),
        )
        .unwrap();

    for (oid, name) in [(1, "bob"), (2, "Alice"), (3, "carl"), (4, "BOB")] {
        insert(&h.store, oid, "name", name);
        h.service.on_create(&id, ObjectId(oid), encrypt(name)).unwrap();
    }
    let workers = h.service.start().unwrap();
    assert!(h.service.wait_idle(DRAIN).unwrap());
    workers.shutdown();

    let order: Vec<String> = decrypted_order(&h.store, "name", "nameSort")
        .into_iter()
        .map(|n| n.to_lowercase())
        .collect();
    assert_eq!(order, vec!["alice", "bob", "bob", "carl"]);

    let bob = h.store.get(ObjectId(1)).unwrap();
    let shouting = h.store.get(ObjectId(4)).unwrap();
    assert_eq!(bob.sort_key("nameSort"), shouting.sort_key("nameSort"));
}

#[test]
fn mostly_unkeyed_collection_reconciles_with_a_single_rebuild() {
    let h = harness(test_config());
    let id = h
        .service
        .register_field_group("users", "name", "nameSort", decrypting_comparator(), GroupOptions::default())
        .unwrap();

    // 150 documents, 30 of them carrying keys from an earlier run
    let mut names: Vec<String> = (0..150).map(|i| format!("user-{:03}", (i * 37) % 150)).collect();
    names.sort();
    for (i, name) in names.iter().enumerate() {
        let mut doc = Document::new(ObjectId(i as u64)).with_field("name", encrypt(name));
        if i % 5 == 0 {
            doc.add_field("nameSort".to_string(), FieldValue::Key(SortKey::from_digits(vec![0, i as u16 + 1])));
        }
        h.store.insert(doc);
    }

    let plans = h.service.reconcile_all().unwrap();
    assert_eq!(plans, vec![(id.clone(), ReconcilePlan::Rebuild { purged: 0 })]);
    assert_eq!(h.queue.pending_count().unwrap(), 1);

    let delivery = h.queue.receive(DRAIN).unwrap().unwrap();
    let envelope = JobEnvelope::decode(&delivery.payload).unwrap();
    assert!(envelope.job.is_rebuild());
    assert_eq!(envelope.group, id);
    h.queue.release(&delivery).unwrap();

    let workers = h.service.start().unwrap();
    assert!(h.service.wait_idle(DRAIN).unwrap());
    workers.shutdown();

    assert_consistent(&h.store, "name", "nameSort");
    let stats = h.service.group(&id).unwrap().stats();
    assert_eq!(stats.rebuilds, 1);
    assert_eq!(stats.keys_assigned, 0);
}

#[test]
fn reconcile_purges_jobs_queued_before_a_rebuild() {
    let h = harness(test_config());
    let id = h
        .service
        .register_field_group("users", "name", "nameSort", decrypting_comparator(), GroupOptions::default())
        .unwrap();
    for oid in 0..5 {
        let doc = insert(&h.store, oid, "name", &format!("n{}", oid));
        h.service.on_document_created("users", &doc).unwrap();
    }
    assert_eq!(h.queue.pending_count().unwrap(), 5);

    // Below the count floor, so a rebuild wins
    let plan = h.service.group(&id).unwrap().reconcile().unwrap();
    assert_eq!(plan, ReconcilePlan::Rebuild { purged: 5 });
    assert_eq!(h.queue.pending_count().unwrap(), 1);
}

#[test]
fn mostly_keyed_collection_backfills_incrementally() {
    let config = sortfield::Config { rebuild_count_floor: 10, ..test_config() };
    let h = harness(config);
    let id = h
        .service
        .register_field_group("users", "name", "nameSort", decrypting_comparator(), GroupOptions::default())
        .unwrap();

    for oid in 0..40 {
        insert(&h.store, oid, "name", &format!("name-{:02}", (oid * 7) % 40));
    }
    h.service.rebuild_now(&id).unwrap();
    for oid in 40..45 {
        insert(&h.store, oid, "name", &format!("name-{:02}b", oid - 40));
    }

    let plans = h.service.reconcile_all().unwrap();
    assert_eq!(plans, vec![(id.clone(), ReconcilePlan::Incremental { enqueued: 5 })]);

    let workers = h.service.start().unwrap();
    assert!(h.service.wait_idle(DRAIN).unwrap());
    workers.shutdown();

    assert_consistent(&h.store, "name", "nameSort");
    assert_eq!(h.service.group(&id).unwrap().stats().keys_assigned, 5);
}
