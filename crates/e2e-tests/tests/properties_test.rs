//! Queue invariants checked over sequences of operations.

use std::sync::{Arc, Barrier};
use std::thread;

use pretty_assertions::assert_eq;

use e2e_tests::{TestHarness, NOW, SITE_ROOT};
use queue_engine::PageParameters;
use queue_storage::QueueItemStore;
use queue_types::{ItemStatus, Record};

#[test]
fn test_repeated_updates_keep_one_item_per_triple() {
    let harness = TestHarness::new();
    harness.add_article(1, NOW - 600, &[SITE_ROOT]);

    for round in 0..5 {
        harness.source.set_field("article", 1, "tstamp", NOW - 600 + round);
        harness.queue.update_item("article", 1, 0).unwrap();
        harness.queue.update_item("article", 1, NOW - 10).unwrap();
    }

    assert_eq!(harness.queue.get_items("article", 1).unwrap().len(), 1);
    assert_eq!(harness.queue.get_all_items_count().unwrap(), 1);
}

#[test]
fn test_parallel_updates_of_one_item_converge() {
    let harness = TestHarness::new();
    harness.add_article(1, NOW - 600, &[SITE_ROOT]);
    harness.add_article(2, NOW - 300, &[SITE_ROOT]);
    let barrier = Arc::new(Barrier::new(12));

    let handles: Vec<_> = (0..12u64)
        .map(|n| {
            let queue = harness.queue.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                queue.update_item("article", 1 + n % 2, 0)
            })
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap().is_ok());
    }

    assert_eq!(harness.queue.get_all_items_count().unwrap(), 2);
    for (uid, changed) in [(1, NOW - 600), (2, NOW - 300)] {
        let item = harness.item("article", uid);
        assert_eq!(item.changed, changed);
        assert!(!item.has_errors());
    }
}

#[test]
fn test_refresh_without_change_is_idempotent() {
    let harness = TestHarness::new();
    harness.add_article(1, NOW - 600, &[SITE_ROOT]);
    harness.queue.update_item("article", 1, 0).unwrap();
    let before = harness.item("article", 1);

    harness.queue.update_item("article", 1, 0).unwrap();
    harness.queue.update_item("article", 1, 0).unwrap();

    let after = harness.item("article", 1);
    assert_eq!(after, before);
    assert_eq!(after.errors, "");
}

#[test]
fn test_forced_change_time_never_moves_backwards() {
    let harness = TestHarness::new();
    harness.add_article(1, NOW - 600, &[SITE_ROOT]);
    harness.queue.update_item("article", 1, 0).unwrap();

    harness.queue.update_item("article", 1, NOW - 86_400).unwrap();
    assert_eq!(harness.item("article", 1).changed, NOW - 600);

    harness.queue.update_item("article", 1, NOW + 120).unwrap();
    assert_eq!(harness.item("article", 1).changed, NOW + 120);

    // a later computed time below the forced one keeps the forced one
    harness.queue.update_item("article", 1, 0).unwrap();
    assert_eq!(harness.item("article", 1).changed, NOW + 120);
}

#[test]
fn test_statistics_partition_every_item_once() {
    let harness = TestHarness::new();
    for uid in 1..=6 {
        harness.add_article(uid, NOW - 600, &[SITE_ROOT]);
        harness.queue.update_item("article", uid, 0).unwrap();
    }
    harness.add_page(30, 1, NOW - 600, &[SITE_ROOT]);
    harness.queue.update_item("pages", 30, 0).unwrap();

    // 1, 2 indexed; 3 failed; 4 indexed then failed
    for uid in [1, 2, 4] {
        let item = harness.item("article", uid);
        harness.queue.update_index_time_by_item(&item).unwrap();
    }
    for uid in [3, 4] {
        let item = harness.item("article", uid);
        harness.queue.mark_item_as_failed(&item, "boom").unwrap();
    }

    let stats = harness
        .queue
        .get_statistics_by_site(&harness.site, None)
        .unwrap();
    assert_eq!(stats.success_count, 2);
    assert_eq!(stats.failed_count, 2);
    assert_eq!(stats.pending_count, 3);
    assert_eq!(stats.total_count(), harness.queue.get_all_items_count().unwrap());

    let articles = harness
        .queue
        .get_statistics_by_site(&harness.site, Some("articles"))
        .unwrap();
    assert_eq!(articles.total_count(), 6);
    assert_eq!(articles.pending_count, 2);

    let items = harness
        .storage
        .find_items_by_root(SITE_ROOT, Some("articles"))
        .unwrap();
    let failed = items
        .iter()
        .filter(|item| item.status() == ItemStatus::Failed)
        .count();
    assert_eq!(failed as u64, articles.failed_count);
}

#[test]
fn test_failed_items_never_selected() {
    let harness = TestHarness::new();
    for uid in 1..=10 {
        harness.add_article(uid, NOW - 600 + uid as i64, &[SITE_ROOT]);
        harness.queue.update_item("article", uid, 0).unwrap();
        if uid % 3 == 0 {
            let item = harness.item("article", uid);
            harness.queue.mark_item_as_failed(&item, "").unwrap();
        }
    }

    let due = harness.queue.get_items_to_index(&harness.site, 100).unwrap();
    assert_eq!(due.len(), 7);
    assert!(due.iter().all(|item| !item.has_errors()));
    assert_eq!(harness.queue.get_errors_by_site(&harness.site).unwrap().len(), 3);

    assert_eq!(harness.due_uids(3), vec![1, 2, 4]);
}

#[test]
fn test_canonical_page_follows_source_content() {
    let harness = TestHarness::new();
    harness.add_page(10, 1, NOW - 900, &[SITE_ROOT]);
    harness.source.insert_record(
        Record::new("pages", 11)
            .with_field("pid", SITE_ROOT)
            .with_field("doktype", 1)
            .with_field("tstamp", NOW - 800)
            .with_field("content_from_pid", 10),
        &[SITE_ROOT],
    );
    harness.source.set_page_content_changed(10, NOW - 100);

    harness.queue.update_item("pages", 11, 0).unwrap();
    assert_eq!(harness.item("pages", 11).changed, NOW - 100);

    harness.queue.initialize(&harness.site, Some("pages")).unwrap();
    let canonical = harness.item("pages", 11);
    assert_eq!(canonical.changed, NOW - 100);
    let parameters = PageParameters::from_json(
        canonical
            .serialized_parameters
            .as_deref()
            .expect("canonical page carries parameters"),
    )
    .unwrap();
    assert_eq!(parameters.content_from_pid, 10);
    assert_eq!(harness.item("pages", 10).serialized_parameters, None);
}
