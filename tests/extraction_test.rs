//! End-to-end extraction runs against in-memory collaborators

mod common;

use common::{key, no_shutdown, row, scenario_rows, MemoryFetcher, Workspace};
use pagefold::adapters::database::CheckpointStorage;
use pagefold::core::export::{PageState, RunOutcome};
use pagefold::core::state::Checkpoint;
use std::collections::BTreeSet;
use std::sync::Arc;

#[tokio::test]
async fn test_end_to_end_scenario() {
    let ws = Workspace::new();
    let config = ws.config("");
    let fetcher = Arc::new(MemoryFetcher::new(scenario_rows()));
    let (_tx, rx) = no_shutdown();

    let summary = ws.coordinator(&config, fetcher.clone(), rx).run().await.unwrap();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.exit_code(), 0);
    assert_eq!(summary.total_rows, 23);
    assert_eq!(summary.total_pages, 3);
    assert_eq!(summary.pages_succeeded, 3);
    assert_eq!(summary.records_processed, 23);
    assert_eq!(summary.rows_produced, 5);
    assert_eq!(summary.downloaded, 5);
    assert_eq!(summary.converted, 5);
    assert_eq!(summary.resume_page, 3);
    assert!(summary.page_states.values().all(|s| *s == PageState::Succeeded));
    assert_eq!(fetcher.fetched_pages(), vec![0, 1, 2]);

    let rows = ws.table_rows();
    assert_eq!(rows.len(), 5);
    for r in &rows {
        let expected = if r["parent_id"] == "P1" {
            "CT chest | follow-up"
        } else {
            "MRI knee | normal"
        };
        assert_eq!(r["report_value"], expected, "item {}", r["item_id"]);
        assert_eq!(r["downloaded"], "true");
        assert_eq!(r["converted"], "true");
    }
    let items: BTreeSet<_> = rows.iter().map(|r| r["item_id"].clone()).collect();
    assert_eq!(items.len(), 5);

    let checkpoint = ws.checkpoint_storage().load_checkpoint().await.unwrap().unwrap();
    assert_eq!(checkpoint.resume_page, 3);
    let keys: BTreeSet<_> = checkpoint.processed_keys.keys().map(str::to_string).collect();
    let expected: BTreeSet<_> = [
        key("P1", "I1"),
        key("P1", "I2"),
        key("P1", "I3"),
        key("P2", "I4"),
        key("P2", "I5"),
    ]
    .into_iter()
    .collect();
    assert_eq!(keys, expected);

    assert!(ws.output_dir().join("artifacts").join("I1.dcm").exists());
    assert!(ws.output_dir().join("converted").join("I5.jpg").exists());
    assert_eq!(summary.table_checksum.as_ref().map(String::len), Some(64));
}

#[tokio::test]
async fn test_second_run_with_nothing_left_is_a_no_op() {
    let ws = Workspace::new();
    let config = ws.config("");
    let (_tx, rx) = no_shutdown();

    ws.coordinator(&config, Arc::new(MemoryFetcher::new(scenario_rows())), rx.clone())
        .run()
        .await
        .unwrap();

    let fetcher = Arc::new(MemoryFetcher::new(scenario_rows()));
    let summary = ws.coordinator(&config, fetcher.clone(), rx).run().await.unwrap();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.pages_dispatched, 0);
    assert!(fetcher.fetched_pages().is_empty());
    assert_eq!(ws.table_rows().len(), 5);
}

#[tokio::test]
async fn test_resume_emits_only_new_keys() {
    let ws = Workspace::new();
    let config = ws.config("");

    let mut seeded = Checkpoint::new("default");
    seeded.merge_keys(vec![key("P1", "I1")], chrono::Utc::now());
    ws.checkpoint_storage().save_checkpoint(&seeded, false).await.unwrap();

    let rows = vec![
        row("P1", "I1", 1, Some("CT chest"), 0),
        row("P1", "I1", 1, None, 1),
        row("P1", "I2", 2, Some("CT chest"), 2),
    ];
    let (_tx, rx) = no_shutdown();
    let summary = ws
        .coordinator(&config, Arc::new(MemoryFetcher::new(rows)), rx)
        .run()
        .await
        .unwrap();

    assert_eq!(summary.rows_produced, 1);
    assert_eq!(summary.new_keys, 1);
    let table = ws.table_rows();
    assert_eq!(table.len(), 1);
    assert_eq!(table[0]["item_id"], "I2");

    let checkpoint = ws.checkpoint_storage().load_checkpoint().await.unwrap().unwrap();
    assert_eq!(checkpoint.processed_keys.len(), 2);
}

#[tokio::test]
async fn test_partial_failure_then_resume() {
    let ws = Workspace::new();
    let config = ws.config("");
    let (_tx, rx) = no_shutdown();

    // First run: page 1 cannot be read
    let broken = Arc::new(MemoryFetcher::new(scenario_rows()).failing(1));
    let first = ws.coordinator(&config, broken.clone(), rx.clone()).run().await.unwrap();

    assert_eq!(first.outcome, RunOutcome::Partial);
    assert_eq!(first.exit_code(), 1);
    assert_eq!(first.pages_succeeded, 2);
    assert_eq!(first.pages_failed, 1);
    assert_eq!(first.resume_page, 1);
    assert_eq!(first.page_states.get(&1), Some(&PageState::FailedFinal));
    assert!(first.errors.iter().any(|e| e.contains("page 1 is unreadable")));
    assert_eq!(ws.table_rows().len(), 3);

    let checkpoint = ws.checkpoint_storage().load_checkpoint().await.unwrap().unwrap();
    assert_eq!(checkpoint.resume_page, 1);
    assert!(checkpoint.processed_keys.contains(&key("P2", "I5")));

    // Second run: page 2 is fetched again but its key is already in the ledger
    let healthy = Arc::new(MemoryFetcher::new(scenario_rows()));
    let second = ws.coordinator(&config, healthy.clone(), rx).run().await.unwrap();

    assert_eq!(second.outcome, RunOutcome::Completed);
    assert_eq!(healthy.fetched_pages(), vec![1, 2]);
    assert_eq!(second.rows_produced, 2);
    assert_eq!(second.resume_page, 3);

    let rows = ws.table_rows();
    assert_eq!(rows.len(), 5);
    let keys: BTreeSet<_> = rows.iter().map(|r| r["key"].clone()).collect();
    assert_eq!(keys.len(), 5);
}

#[tokio::test]
async fn test_undecodable_row_does_not_hold_back_resume() {
    let ws = Workspace::new();
    let config = ws.config("");
    let (_tx, rx) = no_shutdown();

    let fetcher = Arc::new(MemoryFetcher::new(scenario_rows()).with_bad_row(1));
    let summary = ws.coordinator(&config, fetcher, rx).run().await.unwrap();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.pages_failed, 0);
    assert_eq!(summary.resume_page, 3);
    assert_eq!(ws.table_rows().len(), 5);
    assert!(summary.errors.iter().any(|e| e.contains("item_id is NULL")));
}

#[tokio::test]
async fn test_crash_after_first_page_resumes_without_duplicates() {
    let ws = Workspace::new();
    let config = ws.config("");
    let (_tx, rx) = no_shutdown();

    // Only page 0 completes and is merged
    let crashed = Arc::new(MemoryFetcher::new(scenario_rows()).failing(1).failing(2));
    let first = ws.coordinator(&config, crashed, rx.clone()).run().await.unwrap();
    assert_eq!(first.resume_page, 1);
    assert_eq!(ws.table_rows().len(), 2);

    let restarted = Arc::new(MemoryFetcher::new(scenario_rows()));
    ws.coordinator(&config, restarted.clone(), rx).run().await.unwrap();

    assert_eq!(restarted.fetched_pages(), vec![1, 2]);
    let rows = ws.table_rows();
    assert_eq!(rows.len(), 5);
    let i1 = rows.iter().filter(|r| r["item_id"] == "I1").count();
    assert_eq!(i1, 1);
}

#[tokio::test]
async fn test_dry_run_writes_table_only() {
    let ws = Workspace::new();
    let config = ws.config("[application]\ndry_run = true\n");
    let (_tx, rx) = no_shutdown();

    let summary = ws
        .coordinator(&config, Arc::new(MemoryFetcher::new(scenario_rows())), rx)
        .run()
        .await
        .unwrap();

    assert!(summary.dry_run);
    assert_eq!(summary.rows_produced, 5);
    assert_eq!(summary.downloaded, 0);
    assert!(!ws.checkpoint_path().exists());
    assert!(!ws.output_dir().join("artifacts").exists());
    assert!(!ws.table_path().exists());

    let dry_table = ws.output_dir().join("extraction.dry-run.csv");
    assert_eq!(summary.table_path.as_deref(), Some(dry_table.as_path()));
    assert_eq!(csv::Reader::from_path(&dry_table).unwrap().records().count(), 5);
}

#[tokio::test]
async fn test_real_run_after_dry_run_emits_each_key_once() {
    let ws = Workspace::new();
    let (_tx, rx) = no_shutdown();

    let dry = ws.config("[application]\ndry_run = true\n");
    ws.coordinator(&dry, Arc::new(MemoryFetcher::new(scenario_rows())), rx.clone())
        .run()
        .await
        .unwrap();

    let real = ws.config("");
    let summary = ws
        .coordinator(&real, Arc::new(MemoryFetcher::new(scenario_rows())), rx)
        .run()
        .await
        .unwrap();

    assert_eq!(summary.rows_produced, 5);
    let rows = ws.table_rows();
    assert_eq!(rows.len(), 5);
    let keys: BTreeSet<_> = rows.iter().map(|r| r["key"].clone()).collect();
    assert_eq!(keys.len(), 5);
}

#[tokio::test]
async fn test_replacing_table_keeps_only_the_latest_run() {
    let ws = Workspace::new();
    let mut config = ws.config("");
    config.output.append_existing = false;
    let (_tx, rx) = no_shutdown();

    let crashed = Arc::new(MemoryFetcher::new(scenario_rows()).failing(1).failing(2));
    ws.coordinator(&config, crashed, rx.clone()).run().await.unwrap();
    ws.coordinator(&config, Arc::new(MemoryFetcher::new(scenario_rows())), rx)
        .run()
        .await
        .unwrap();

    let mut items: Vec<String> = ws.table_rows().iter().map(|r| r["item_id"].clone()).collect();
    items.sort();
    assert_eq!(items, vec!["I3", "I4", "I5"]);
}
