//! Draining the queue through an indexer, scheduled re-indexing and
//! post-initialization observers.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;

use e2e_tests::{RecordingIndexer, TestHarness, NOW, SITE_ROOT};
use queue_engine::{
    EngineError, IndexWorker, InitializationObserver, ReIndexTask, RootlineResolver, WorkerConfig,
};
use queue_types::{ItemStatus, Record, Site};

fn worker(harness: &TestHarness, indexer: &RecordingIndexer) -> IndexWorker {
    IndexWorker::new(harness.queue.clone(), Box::new(indexer.clone()))
        .with_config(WorkerConfig::default().with_batch_size(10))
}

#[test]
fn test_drain_indexes_due_items_once() {
    let harness = TestHarness::new();
    for uid in 1..=3 {
        harness.add_article(uid, NOW - 600 + uid as i64, &[SITE_ROOT]);
        harness.queue.update_item("article", uid, 0).unwrap();
    }
    let indexer = RecordingIndexer::new();
    let worker = worker(&harness, &indexer);

    let result = worker.drain_site(&harness.site).unwrap();
    assert_eq!(result.indexed, 3);
    assert_eq!(indexer.seen(), vec![1, 2, 3]);

    let again = worker.drain_site(&harness.site).unwrap();
    assert_eq!(again.selected, 0);
    assert_eq!(harness.queue.get_last_index_time(SITE_ROOT).unwrap(), NOW);

    // a later change makes the item due again
    harness.clock.advance(60);
    harness.source.set_field("article", 2, "tstamp", NOW + 30);
    harness.queue.update_item("article", 2, 0).unwrap();
    let result = worker.drain_site(&harness.site).unwrap();
    assert_eq!(result.indexed, 1);
    assert_eq!(indexer.seen(), vec![1, 2, 3, 2]);
}

#[test]
fn test_failed_item_waits_for_change_or_retry() {
    let harness = TestHarness::new();
    harness.add_article(1, NOW - 600, &[SITE_ROOT]);
    harness.add_article(2, NOW - 500, &[SITE_ROOT]);
    harness.queue.update_item("article", 1, 0).unwrap();
    harness.queue.update_item("article", 2, 0).unwrap();

    let indexer = RecordingIndexer::new();
    indexer.fail_for(1);
    let worker = worker(&harness, &indexer);

    let result = worker.drain_site(&harness.site).unwrap();
    assert_eq!((result.indexed, result.failed), (1, 1));
    let failed = harness.item("article", 1);
    assert_eq!(failed.errors, "Indexer error: connection refused");
    assert_eq!(failed.status(), ItemStatus::Failed);

    // still failing: nothing due, retry keeps the error
    assert_eq!(worker.drain_site(&harness.site).unwrap().selected, 0);
    assert_eq!(worker.retry_failed(&harness.site).unwrap().failed, 1);

    indexer.recover();
    let result = worker.retry_failed(&harness.site).unwrap();
    assert_eq!(result.indexed, 1);
    let recovered = harness.item("article", 1);
    assert_eq!(recovered.status(), ItemStatus::Success);
    assert_eq!(recovered.indexed, NOW);

    let stats = harness
        .queue
        .get_statistics_by_site(&harness.site, None)
        .unwrap();
    assert_eq!(stats.success_count, 2);
    assert_eq!(stats.success_percentage(), 100.0);
}

#[test]
fn test_reset_errors_by_site_makes_items_due() {
    let harness = TestHarness::new();
    harness.add_article(1, NOW - 600, &[SITE_ROOT]);
    harness.queue.update_item("article", 1, 0).unwrap();
    let item = harness.item("article", 1);
    harness.queue.mark_item_as_failed(&item, "boom").unwrap();
    assert!(harness.due_uids(10).is_empty());

    assert_eq!(harness.queue.reset_errors_by_site(&harness.site).unwrap(), 1);
    assert_eq!(harness.due_uids(10), vec![1]);
    assert_eq!(harness.queue.reset_all_errors().unwrap(), 0);
}

#[test]
fn test_reindex_task_requeues_site() {
    let harness = TestHarness::new();
    for uid in 1..=2 {
        harness.add_article(uid, NOW - 600, &[SITE_ROOT]);
        harness.queue.update_item("article", uid, 0).unwrap();
    }
    let indexer = RecordingIndexer::new();
    worker(&harness, &indexer).drain_site(&harness.site).unwrap();
    assert!(harness.due_uids(10).is_empty());

    let task = ReIndexTask::new(harness.site.clone()).with_configurations(["articles"]);
    assert_eq!(
        task.additional_information(),
        "Site: Main, Indexing Configurations: articles"
    );
    assert!(task.execute(&harness.queue).unwrap());
    assert_eq!(harness.due_uids(10), vec![1, 2]);
}

struct CountingObserver {
    runs: Arc<Mutex<Vec<(u64, Vec<String>, bool)>>>,
}

impl InitializationObserver for CountingObserver {
    fn post_process_initialization(
        &self,
        site: &Site,
        configuration_names: &[String],
        status: &BTreeMap<String, bool>,
    ) -> Result<(), EngineError> {
        self.runs.lock().unwrap().push((
            site.root_page_id,
            configuration_names.to_vec(),
            status.values().all(|ok| *ok),
        ));
        Ok(())
    }

    fn name(&self) -> &str {
        "counting"
    }
}

#[test]
fn test_observers_see_every_initialization() {
    let mut harness = TestHarness::new();
    let runs = Arc::new(Mutex::new(Vec::new()));
    let observer = CountingObserver { runs: runs.clone() };
    harness.rebuild_queue(|queue| queue.with_observer(Box::new(observer)));
    harness.add_article(1, NOW - 600, &[SITE_ROOT]);

    harness.queue.initialize(&harness.site, None).unwrap();
    ReIndexTask::new(harness.site.clone())
        .with_configurations(["pages"])
        .execute(&harness.queue)
        .unwrap();

    assert_eq!(
        runs.lock().unwrap().clone(),
        vec![
            (
                SITE_ROOT,
                vec!["articles".to_string(), "pages".to_string()],
                true
            ),
            (SITE_ROOT, vec!["pages".to_string()], true),
        ]
    );
}

#[test]
fn test_rootline_resolution_end_to_end() {
    let mut harness = TestHarness::new();
    let source = harness.source.clone();
    let roots = harness.sites.iter().map(|site| site.root_page_id).collect::<Vec<_>>();
    harness.rebuild_queue(move |queue| {
        // resolve owners through the page tree instead of stored root lists
        let resolver = RootlineResolver::new(source, roots);
        queue.with_root_resolver(Arc::new(resolver))
    });

    harness.source.insert_record(
        Record::new("pages", SITE_ROOT).with_field("pid", 0).with_field("doktype", 1),
        &[],
    );
    harness.source.insert_record(
        Record::new("pages", 3).with_field("pid", SITE_ROOT).with_field("doktype", 254),
        &[],
    );
    harness.add_article(42, NOW - 600, &[]);
    harness.add_article(43, NOW - 600, &[]);
    harness.source.set_field("article", 43, "pid", 999);

    harness.queue.update_item("article", 42, 0).unwrap();
    harness.queue.update_item("article", 43, 0).unwrap();

    assert!(harness
        .queue
        .contains_item_with_root_page_id("article", 42, SITE_ROOT)
        .unwrap());
    assert!(!harness.queue.contains_item("article", 43).unwrap());
}
