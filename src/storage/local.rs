//! Local filesystem storage implementation.
//!
//! All writes go to a temporary sibling file first and are then renamed over
//! the target, so a crash never leaves a half-written artifact or snapshot.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{Dataset, PathsConfig, RunStats, ShopBatch, ShopRecord, StateCode};
use crate::storage::{ShopStorage, SnapshotWrite, table};

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
    paths: PathsConfig,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>, paths: PathsConfig) -> Self {
        Self {
            root_dir: root_dir.into(),
            paths,
        }
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Path of the latest snapshot.
    pub fn current_path(&self) -> PathBuf {
        self.path(&self.paths.dataset_file)
    }

    /// Path of the previous-generation snapshot.
    pub fn previous_path(&self) -> PathBuf {
        self.path(&self.paths.previous_dataset_file)
    }

    /// Relative key of a state's artifact.
    fn state_key(&self, state: &StateCode) -> String {
        format!("{}/state_{}_shops.json", self.paths.states_dir, state)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized + Sync>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Decode a CSV snapshot stored under `key`.
    async fn read_csv(&self, key: &str) -> Result<Option<Dataset>> {
        let path = self.path(key);
        match self
            .read_bytes(key)
            .await
            .map_err(|e| AppError::snapshot(&path, e))?
        {
            Some(bytes) => Ok(Some(table::decode(&bytes, &path)?)),
            None => Ok(None),
        }
    }

    /// Read the previous-generation snapshot.
    pub async fn read_previous(&self) -> Result<Option<Dataset>> {
        self.read_csv(&self.paths.previous_dataset_file).await
    }

    /// Load statistics of the last run, if any.
    pub async fn load_stats(&self) -> Result<Option<RunStats>> {
        self.read_json(&self.paths.stats_file).await
    }
}

#[async_trait]
impl ShopStorage for LocalStorage {
    async fn write_state_shops(&self, state: &StateCode, shops: &[ShopRecord]) -> Result<()> {
        let key = self.state_key(state);
        self.write_json(&key, shops).await?;
        log::debug!("State {}: {} shops written to {}", state, shops.len(), key);
        Ok(())
    }

    async fn load_state_shops(&self, state: &StateCode) -> Result<Option<ShopBatch>> {
        let Some(items) = self.read_json::<Vec<Value>>(&self.state_key(state)).await? else {
            return Ok(None);
        };

        let batch = ShopBatch::from_values(items, &format!("State {} artifact", state));
        if batch.rejected > 0 {
            log::warn!(
                "State {}: {} unusable entries in saved artifact",
                state,
                batch.rejected
            );
        }
        Ok(Some(batch))
    }

    async fn read_snapshot(&self) -> Result<Option<Dataset>> {
        self.read_csv(&self.paths.dataset_file).await
    }

    async fn save_current(&self, dataset: &Dataset) -> Result<SnapshotWrite> {
        let current = self.current_path();
        let previous = self.previous_path();

        let rotated = if tokio::fs::try_exists(&current).await? {
            self.ensure_dir(&previous).await?;
            tokio::fs::copy(&current, &previous).await?;
            log::info!(
                "Kept previous snapshot as {}",
                self.paths.previous_dataset_file
            );
            true
        } else {
            false
        };

        let bytes = table::encode(dataset)?;
        let sha256 = hex::encode(Sha256::digest(&bytes));
        self.write_bytes(&self.paths.dataset_file, &bytes).await?;

        Ok(SnapshotWrite {
            location: current.display().to_string(),
            row_count: dataset.len(),
            sha256,
            rotated,
        })
    }

    async fn write_stats(&self, stats: &RunStats) -> Result<()> {
        self.write_json(&self.paths.stats_file, stats).await
    }
}
