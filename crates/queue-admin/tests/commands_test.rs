//! Admin commands against a real store.

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use queue_admin::{execute, Commands};
use queue_storage::{QueueItemStore, Storage};
use queue_types::{NewQueueItem, Settings, Site};

fn create_test_storage() -> (Storage, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let storage = Storage::open(temp_dir.path()).unwrap();
    (storage, temp_dir)
}

fn settings() -> Settings {
    Settings {
        sites: vec![Site::new(1, "Main")],
        ..Settings::default()
    }
}

fn run(storage: &Storage, command: Commands) -> String {
    let mut out = Vec::new();
    execute(storage, &settings(), &command, &mut out).unwrap();
    String::from_utf8(out).unwrap()
}

fn seed(storage: &Storage) {
    for uid in 1..=3 {
        storage
            .add(NewQueueItem::new("tx_news", uid, 1, "news", 1_000 + uid as i64))
            .unwrap();
    }
    storage
        .add(NewQueueItem::new("pages", 9, 2, "pages", 1_000))
        .unwrap();
}

#[test]
fn test_count_and_stats() {
    let (storage, _temp) = create_test_storage();
    seed(&storage);
    storage.mark_item_as_failed(1, "timeout").unwrap();

    assert_eq!(run(&storage, Commands::Count), "4\n");

    let output = run(
        &storage,
        Commands::Stats {
            site: 1,
            configuration: None,
        },
    );
    assert!(output.starts_with("Site: Main (1)\n"));
    assert!(output.contains("Pending: 2 (66.67%)"));
    assert!(output.contains("Failed:  1 (33.33%)"));
    assert!(output.contains("Total:   3"));
}

#[test]
fn test_errors_and_reset() {
    let (storage, _temp) = create_test_storage();
    seed(&storage);
    storage.mark_item_as_failed(2, "connection refused").unwrap();
    storage.mark_item_as_failed(4, "boom").unwrap();

    let output = run(&storage, Commands::Errors { site: 1, json: false });
    assert!(output.contains("tx_news:2"));
    assert!(output.contains("error: connection refused"));
    assert!(!output.contains("boom"));

    let output = run(&storage, Commands::ResetErrors { site: Some(1) });
    assert_eq!(output, "Cleared errors on 1 item(s)\n");
    assert_eq!(storage.find_errors_by_root(2).unwrap().len(), 1);

    let output = run(&storage, Commands::ResetErrors { site: None });
    assert_eq!(output, "Cleared errors on 1 item(s)\n");
}

#[test]
fn test_list_json_is_due_order() {
    let (storage, _temp) = create_test_storage();
    seed(&storage);

    let output = run(
        &storage,
        Commands::List {
            site: 1,
            limit: 2,
            json: true,
        },
    );
    let items: Vec<serde_json::Value> = serde_json::from_str(&output).unwrap();
    let uids: Vec<u64> = items
        .iter()
        .map(|item| item["item_uid"].as_u64().unwrap())
        .collect();
    assert_eq!(uids, vec![1, 2]);

    // listing has no side effects
    assert_eq!(storage.find_items_to_index(1, i64::MAX, 10).unwrap().len(), 3);
}

#[test]
fn test_last_indexed() {
    let (storage, _temp) = create_test_storage();
    seed(&storage);

    let output = run(&storage, Commands::LastIndexed { site: 1 });
    assert_eq!(output, "Site Main (1) was never indexed\n");

    storage.update_index_time(3, 1_700_000_000).unwrap();
    let output = run(&storage, Commands::LastIndexed { site: 1 });
    assert!(output.starts_with("Last indexed: 2023-11-14T22:13:20+00:00\n"));
    assert!(output.contains("tx_news:3"));
}

#[test]
fn test_delete_commands() {
    let (storage, _temp) = create_test_storage();
    seed(&storage);

    let output = run(
        &storage,
        Commands::DeleteSite {
            site: 2,
            configuration: None,
        },
    );
    assert_eq!(output, "Deleted 1 item(s)\n");

    let output = run(
        &storage,
        Commands::DeleteType {
            item_type: "tx_news".to_string(),
        },
    );
    assert_eq!(output, "Deleted 3 item(s)\n");
    assert_eq!(run(&storage, Commands::DeleteAll), "Deleted 0 item(s)\n");
}

#[test]
fn test_compact_reports_stats() {
    let (storage, _temp) = create_test_storage();
    seed(&storage);

    let output = run(&storage, Commands::Compact);
    assert!(output.starts_with("Compaction complete: 4 item(s)"));
}
