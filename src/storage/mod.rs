//! Storage abstractions for shop persistence.
//!
//! Two kinds of data live in storage:
//! - Per-state artifacts: the raw shops of one state as fetched
//! - Snapshots: the consolidated CSV, kept for exactly two generations
//!
//! ## Directory Structure
//!
//! ```text
//! storage/
//! ├── config.toml                      # Crawler configuration
//! ├── ConsolidatedShops.csv            # Latest snapshot
//! ├── previous_ConsolidatedShops.csv   # The snapshot before it
//! ├── stats.json                       # Statistics of the latest run
//! └── states/
//!     ├── state_01_shops.json
//!     └── state_38_shops.json
//! ```

pub mod local;
pub mod table;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Dataset, RunStats, ShopBatch, ShopRecord, StateCode};

// Re-export for convenience
pub use local::LocalStorage;

/// Metadata about a snapshot write.
#[derive(Debug, Clone)]
pub struct SnapshotWrite {
    /// Where the snapshot was written
    pub location: String,
    /// Number of rows written
    pub row_count: usize,
    /// SHA-256 of the written bytes, hex encoded
    pub sha256: String,
    /// Whether an older snapshot was kept as the previous generation
    pub rotated: bool,
}

/// Trait for shop storage backends.
#[async_trait]
pub trait ShopStorage: Send + Sync {
    /// Persist one state's shops, replacing any earlier artifact.
    async fn write_state_shops(&self, state: &StateCode, shops: &[ShopRecord]) -> Result<()>;

    /// Load one state's shops, validating every entry. `Ok(None)` if the
    /// state was never written.
    async fn load_state_shops(&self, state: &StateCode) -> Result<Option<ShopBatch>>;

    /// Read the latest snapshot. `Ok(None)` if none exists; `Err` if it exists
    /// but cannot be read.
    async fn read_snapshot(&self) -> Result<Option<Dataset>>;

    /// Write `dataset` as the latest snapshot, keeping the one it replaces as
    /// the previous generation.
    async fn save_current(&self, dataset: &Dataset) -> Result<SnapshotWrite>;

    /// Persist run statistics.
    async fn write_stats(&self, stats: &RunStats) -> Result<()>;

    /// Load the snapshot left by the last run, degrading every failure to
    /// "no previous data".
    ///
    /// Must be called before [`ShopStorage::save_current`] in a run.
    async fn load_previous(&self) -> Option<Dataset> {
        match self.read_snapshot().await {
            Ok(Some(dataset)) => {
                log::info!("Previous snapshot: {} shops", dataset.len());
                Some(dataset)
            }
            Ok(None) => {
                log::info!("No previous snapshot found; treating this as the first run");
                None
            }
            Err(e) => {
                log::warn!(
                    "Previous snapshot is unreadable, treating this as the first run: {}",
                    e
                );
                None
            }
        }
    }
}
