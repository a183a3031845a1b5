//! Per-run statistics persisted next to the snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::StateCode;

/// How a state's shops were obtained in this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateStatus {
    /// Tehsils discovered and shops fetched
    Fetched,
    /// Loaded from an existing per-state artifact
    Resumed,
    /// Tehsil discovery failed; no shops for this state
    Failed,
    /// No artifact found when rebuilding from saved states
    Missing,
}

/// Outcome of one state's traversal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateReport {
    pub state_code: StateCode,
    pub status: StateStatus,
    pub tehsil_count: usize,
    pub failed_tehsils: usize,
    /// Tehsil listing entries without a district or tehsil code
    #[serde(default)]
    pub rejected_tehsils: usize,
    pub rejected_records: usize,
    pub shop_count: usize,
}

impl StateReport {
    pub fn new(state_code: StateCode, status: StateStatus) -> Self {
        Self {
            state_code,
            status,
            tehsil_count: 0,
            failed_tehsils: 0,
            rejected_tehsils: 0,
            rejected_records: 0,
            shop_count: 0,
        }
    }
}

/// Added/removed/updated totals of one diff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeCounts {
    pub added: usize,
    pub removed: usize,
    pub updated: usize,
    pub unchanged: usize,
}

/// Everything recorded about a reconcile run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStats {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub states: Vec<StateReport>,
    pub state_failures: usize,
    pub tehsil_total: usize,
    pub tehsil_failures: usize,
    #[serde(default)]
    pub rejected_tehsils: usize,
    pub rejected_records: usize,
    pub raw_record_count: usize,
    pub duplicates_removed: usize,
    pub conflicting_keys: Vec<String>,
    pub shop_count: usize,
    pub had_previous: bool,
    pub changes: ChangeCounts,
    /// SHA-256 of the written consolidated CSV
    pub dataset_sha256: String,
}
