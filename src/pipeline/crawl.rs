// src/pipeline/crawl.rs

//! Crawl, aggregate and diff entry points.
//!
//! Every entry point that produces a new snapshot goes through the same
//! reconcile step: the previous snapshot is loaded before anything is written,
//! then the new dataset is aggregated, diffed, saved and summarized.

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::error::{AppError, Result};
use crate::models::{Config, Dataset, RunStats, StateCode, StateReport, StateStatus};
use crate::pipeline::aggregate::aggregate;
use crate::pipeline::diff::{ChangeSummary, calculate_diff};
use crate::services::{CrawlOutcome, ShopCrawler, ShopDirectory};
use crate::storage::{ShopStorage, SnapshotWrite, table};
use crate::utils::log::{header, step, summary};

/// Result of a run that wrote a new snapshot.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub stats: RunStats,
    pub changes: ChangeSummary,
    pub snapshot: SnapshotWrite,
}

/// Crawl every state, then reconcile against the previous snapshot.
pub async fn run_crawler(
    config: &Config,
    directory: &dyn ShopDirectory,
    storage: &dyn ShopStorage,
    resume: bool,
) -> Result<RunReport> {
    let start_time = Utc::now();
    header("Fair price shop crawl");

    step(1, 3, "Loading previous snapshot");
    let previous = storage.load_previous().await;

    step(2, 3, "Fetching shops state by state");
    let outcome = ShopCrawler::new(config, directory, storage)
        .with_resume(resume)
        .fetch_all()
        .await;

    step(3, 3, "Aggregating and comparing");
    reconcile(storage, previous, outcome, start_time).await
}

/// Crawl one state and persist its artifact. The snapshot is left untouched.
pub async fn run_state(
    config: &Config,
    directory: &dyn ShopDirectory,
    storage: &dyn ShopStorage,
    state: &StateCode,
) -> StateReport {
    header(&format!("Crawling state {}", state));
    let (_, report) = ShopCrawler::new(config, directory, storage)
        .fetch_state(state)
        .await;

    summary(
        &format!("State {}", state),
        &[
            ("Status", format!("{:?}", report.status)),
            ("Tehsils", report.tehsil_count.to_string()),
            ("Failed tehsils", report.failed_tehsils.to_string()),
            ("Rejected tehsils", report.rejected_tehsils.to_string()),
            ("Rejected records", report.rejected_records.to_string()),
            ("Shops", report.shop_count.to_string()),
        ],
    );
    report
}

/// Rebuild the snapshot from the saved per-state artifacts without fetching.
pub async fn run_aggregate(storage: &dyn ShopStorage) -> Result<RunReport> {
    let start_time = Utc::now();
    header("Rebuilding snapshot from saved states");

    step(1, 3, "Loading previous snapshot");
    let previous = storage.load_previous().await;

    step(2, 3, "Loading state artifacts");
    let mut outcome = CrawlOutcome::default();
    for state in StateCode::all() {
        match storage.load_state_shops(&state).await {
            Ok(Some(batch)) => {
                let mut report = StateReport::new(state, StateStatus::Resumed);
                report.rejected_records = batch.rejected;
                report.shop_count = batch.records.len();
                outcome.push(batch.records, report);
            }
            Ok(None) => {
                log::warn!("State {}: no saved artifact", state);
                outcome.push(Vec::new(), StateReport::new(state, StateStatus::Missing));
            }
            Err(e) => {
                log::warn!("State {}: saved artifact unreadable: {}", state, e);
                outcome.push(Vec::new(), StateReport::new(state, StateStatus::Missing));
            }
        }
    }

    step(3, 3, "Aggregating and comparing");
    reconcile(storage, previous, outcome, start_time).await
}

/// Compare two snapshot files without touching storage.
///
/// A missing or unreadable previous file counts as "no previous data"; the
/// current file must exist and be readable.
pub async fn run_diff(previous_path: &Path, current_path: &Path) -> Result<ChangeSummary> {
    let previous = match table::read_dataset(previous_path).await {
        Ok(Some(dataset)) => Some(dataset),
        Ok(None) => {
            log::info!(
                "{} not found; every current shop counts as added",
                previous_path.display()
            );
            None
        }
        Err(e) => {
            log::warn!("Ignoring unreadable previous snapshot: {}", e);
            None
        }
    };

    let current = table::read_dataset(current_path)
        .await?
        .ok_or_else(|| AppError::snapshot(current_path, "file not found"))?;

    let changes = calculate_diff(previous.as_ref(), &current);
    log_changes(&changes);
    Ok(changes)
}

async fn reconcile(
    storage: &dyn ShopStorage,
    previous: Option<Dataset>,
    outcome: CrawlOutcome,
    start_time: DateTime<Utc>,
) -> Result<RunReport> {
    let state_failures = outcome.state_failures();
    let tehsil_total = outcome.tehsil_total();
    let tehsil_failures = outcome.tehsil_failures();
    let rejected_tehsils = outcome.rejected_tehsils();
    let rejected_records = outcome.rejected_records();
    let CrawlOutcome { batches, states } = outcome;

    let aggregated = aggregate(batches);
    let changes = calculate_diff(previous.as_ref(), &aggregated.dataset);
    let snapshot = storage.save_current(&aggregated.dataset).await?;

    let stats = RunStats {
        start_time,
        end_time: Utc::now(),
        states,
        state_failures,
        tehsil_total,
        tehsil_failures,
        rejected_tehsils,
        rejected_records,
        raw_record_count: aggregated.input_rows,
        duplicates_removed: aggregated.duplicates_removed,
        conflicting_keys: aggregated.conflicting_keys,
        shop_count: snapshot.row_count,
        had_previous: previous.is_some(),
        changes: changes.counts(),
        dataset_sha256: snapshot.sha256.clone(),
    };

    if let Err(e) = storage.write_stats(&stats).await {
        log::warn!("Failed to save run statistics: {}", e);
    }

    summary(
        "Run",
        &[
            ("Snapshot", snapshot.location.clone()),
            ("Shops", stats.shop_count.to_string()),
            ("Duplicates removed", stats.duplicates_removed.to_string()),
            ("Conflicting keys", stats.conflicting_keys.len().to_string()),
            ("Failed states", stats.state_failures.to_string()),
            (
                "Failed tehsils",
                format!("{}/{}", stats.tehsil_failures, stats.tehsil_total),
            ),
            ("Rejected tehsils", stats.rejected_tehsils.to_string()),
            ("Rejected records", stats.rejected_records.to_string()),
            ("SHA-256", snapshot.sha256.clone()),
            (
                "Duration",
                format!("{}s", (stats.end_time - stats.start_time).num_seconds()),
            ),
        ],
    );
    log_changes(&changes);

    Ok(RunReport {
        stats,
        changes,
        snapshot,
    })
}

fn log_changes(changes: &ChangeSummary) {
    summary(
        "Changes",
        &[
            ("Added", changes.added.len().to_string()),
            ("Removed", changes.removed.len().to_string()),
            ("Updated", changes.updated.len().to_string()),
            ("Unchanged", changes.unchanged.to_string()),
        ],
    );
    for shop in &changes.updated {
        for change in &shop.changes {
            log::debug!(
                "  {} {}: {:?} -> {:?}",
                shop.fps_code(),
                change.column,
                change.old,
                change.new
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::models::{PathsConfig, ShopBatch, ShopRecord, TehsilDescriptor, TehsilListing};
    use crate::storage::LocalStorage;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serves one tehsil in state 09 whose shops can be swapped between runs.
    #[derive(Default)]
    struct ScriptedDirectory {
        shops: Mutex<Vec<ShopRecord>>,
        fail_shops: bool,
    }

    #[async_trait]
    impl ShopDirectory for ScriptedDirectory {
        async fn list_tehsils(
            &self,
            state: &StateCode,
        ) -> std::result::Result<TehsilListing, FetchError> {
            if state.as_str() != "09" {
                return Ok(TehsilListing::default());
            }
            Ok(TehsilListing {
                tehsils: vec![TehsilDescriptor {
                    state_code: state.clone(),
                    district_code: "118".into(),
                    tehsil_code: "00712".into(),
                    tehsil_name: "Lucknow".into(),
                }],
                rejected: 1,
            })
        }

        async fn list_shops(
            &self,
            tehsil: &TehsilDescriptor,
        ) -> std::result::Result<ShopBatch, FetchError> {
            if self.fail_shops {
                return Err(FetchError::Timeout {
                    url: format!("fake://{}", tehsil.tehsil_code),
                });
            }
            Ok(ShopBatch {
                records: self.shops.lock().unwrap().clone(),
                rejected: 0,
            })
        }
    }

    fn shop(code: &str, address: &str) -> ShopRecord {
        ShopRecord {
            fps_code: code.into(),
            fps_name: format!("Shop {code}"),
            address: address.into(),
            state_code: "09".into(),
            tehsil_code: "00712".into(),
            ..ShopRecord::default()
        }
    }

    #[tokio::test]
    async fn test_two_runs_report_changes() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path(), PathsConfig::default());
        let config = Config::default();
        let directory = ScriptedDirectory::default();

        *directory.shops.lock().unwrap() = vec![shop("A1", "X"), shop("A2", "Y")];
        let first = run_crawler(&config, &directory, &storage, false)
            .await
            .unwrap();
        assert!(!first.stats.had_previous);
        assert_eq!(first.changes.added.len(), 2);
        assert!(!first.snapshot.rotated);

        *directory.shops.lock().unwrap() = vec![shop("A1", "Moved"), shop("B1", "Z")];
        let second = run_crawler(&config, &directory, &storage, false)
            .await
            .unwrap();
        assert!(second.stats.had_previous);
        assert!(second.snapshot.rotated);
        assert_eq!(second.changes.render(), "Added Shops: 1\nRemoved Shops: 1\nUpdated Shops: 1");
        assert_eq!(second.stats.shop_count, 2);
        assert_eq!(second.stats.states.len(), 38);
        assert_eq!(second.stats.rejected_tehsils, 1);

        let stats = storage.load_stats().await.unwrap().unwrap();
        assert_eq!(stats.changes, second.changes.counts());
        assert_eq!(stats.dataset_sha256, second.snapshot.sha256);

        let standalone = run_diff(&storage.previous_path(), &storage.current_path())
            .await
            .unwrap();
        assert_eq!(standalone, second.changes);
    }

    #[tokio::test]
    async fn test_failed_tehsils_still_produce_snapshot() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path(), PathsConfig::default());
        let config = Config::default();
        let directory = ScriptedDirectory {
            fail_shops: true,
            ..ScriptedDirectory::default()
        };

        let report = run_crawler(&config, &directory, &storage, false)
            .await
            .unwrap();
        assert_eq!(report.stats.tehsil_failures, 1);
        assert_eq!(report.stats.shop_count, 0);
        assert!(storage.current_path().exists());
    }

    #[tokio::test]
    async fn test_aggregate_rebuilds_from_artifacts() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path(), PathsConfig::default());

        storage
            .write_state_shops(&"02".parse().unwrap(), &[shop("B1", ""), shop("B1", "")])
            .await
            .unwrap();
        storage
            .write_state_shops(&"01".parse().unwrap(), &[shop("A1", "")])
            .await
            .unwrap();

        let report = run_aggregate(&storage).await.unwrap();
        assert_eq!(report.stats.shop_count, 2);
        assert_eq!(report.stats.duplicates_removed, 1);
        assert_eq!(report.stats.states[0].status, StateStatus::Resumed);
        assert_eq!(report.stats.states[2].status, StateStatus::Missing);

        let saved = table::read_dataset(&storage.current_path())
            .await
            .unwrap()
            .unwrap();
        let codes: Vec<_> = saved.iter().map(|s| s.fps_code.as_str()).collect();
        assert_eq!(codes, vec!["A1", "B1"]);
    }

    #[tokio::test]
    async fn test_aggregate_twice_over_raw_artifact_is_stable() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path(), PathsConfig::default());
        std::fs::create_dir_all(tmp.path().join("states")).unwrap();
        std::fs::write(
            tmp.path().join("states/state_01_shops.json"),
            r#"[{"fpsName":"no key"},{"fpsCode":"A1"}]"#,
        )
        .unwrap();

        let first = run_aggregate(&storage).await.unwrap();
        let added: Vec<_> = first.changes.added.iter().map(|s| s.fps_code.as_str()).collect();
        assert_eq!(added, vec!["A1"]);
        assert_eq!(first.stats.shop_count, 1);
        assert_eq!(first.stats.rejected_records, 1);
        assert_eq!(first.stats.states[0].rejected_records, 1);

        let second = run_aggregate(&storage).await.unwrap();
        assert!(!second.changes.has_changes());
        assert_eq!(second.changes.unchanged, 1);
    }

    #[tokio::test]
    async fn test_run_state_writes_only_artifact() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path(), PathsConfig::default());
        let config = Config::default();
        let directory = ScriptedDirectory::default();
        *directory.shops.lock().unwrap() = vec![shop("A1", "X")];

        let report = run_state(&config, &directory, &storage, &"9".parse().unwrap()).await;
        assert_eq!(report.status, StateStatus::Fetched);
        assert_eq!(report.shop_count, 1);
        assert!(tmp.path().join("states/state_09_shops.json").exists());
        assert!(!storage.current_path().exists());
    }

    #[tokio::test]
    async fn test_diff_requires_current_file() {
        let tmp = TempDir::new().unwrap();
        let result = run_diff(&tmp.path().join("a.csv"), &tmp.path().join("b.csv")).await;
        assert!(matches!(result, Err(AppError::Snapshot { .. })));
    }

    #[tokio::test]
    async fn test_diff_without_previous_counts_all_added() {
        let tmp = TempDir::new().unwrap();
        let current = tmp.path().join("current.csv");
        let dataset = Dataset::from_records(vec![shop("A1", "X")]);
        std::fs::write(&current, table::encode(&dataset).unwrap()).unwrap();

        let changes = run_diff(&tmp.path().join("missing.csv"), &current)
            .await
            .unwrap();
        assert_eq!(changes.added.len(), 1);
    }
}
