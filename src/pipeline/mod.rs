//! Pipeline entry points for crawler operations.
//!
//! - `run_crawler`: Fetch every state and reconcile against the last snapshot
//! - `run_state`: Fetch a single state's artifact
//! - `run_aggregate`: Rebuild the snapshot from saved state artifacts
//! - `run_diff`: Compare two snapshot files

pub mod aggregate;
pub mod crawl;
pub mod diff;

pub use aggregate::{Aggregated, aggregate};
pub use crawl::{RunReport, run_aggregate, run_crawler, run_diff, run_state};
pub use diff::{ChangeSummary, DiffCalculator, FieldChange, UpdatedShop, calculate_diff};
