//! Merge per-state shop batches into the canonical dataset.

use crate::models::{Dataset, ShopRecord};

/// The canonical dataset plus what had to be done to produce it.
#[derive(Debug, Clone, Default)]
pub struct Aggregated {
    pub dataset: Dataset,
    /// Number of input rows before deduplication
    pub input_rows: usize,
    /// Rows dropped because an identical row was already present
    pub duplicates_removed: usize,
    /// Keys carried by more than one distinct row, sorted
    pub conflicting_keys: Vec<String>,
}

/// Concatenate batches, drop exact duplicate rows and sort by the hierarchy key.
///
/// Rows sharing an `fpsCode` but differing elsewhere are all kept and their
/// keys reported in [`Aggregated::conflicting_keys`].
pub fn aggregate<I>(batches: I) -> Aggregated
where
    I: IntoIterator<Item = Vec<ShopRecord>>,
{
    let mut shops: Vec<ShopRecord> = batches.into_iter().flatten().collect();
    let input_rows = shops.len();

    // Identical rows are adjacent under the total order.
    shops.sort_by(ShopRecord::canonical_cmp);
    shops.dedup_by(|a, b| a.canonical_cmp(b).is_eq());
    let duplicates_removed = input_rows - shops.len();

    let conflicting_keys = conflicting_keys(&shops);

    if duplicates_removed > 0 {
        log::info!("Removed {} duplicate rows", duplicates_removed);
    }
    if !conflicting_keys.is_empty() {
        log::warn!(
            "{} fpsCode values appear on more than one distinct row (e.g. {}); kept as-is",
            conflicting_keys.len(),
            conflicting_keys[..conflicting_keys.len().min(5)].join(", ")
        );
    }

    Aggregated {
        dataset: Dataset::from_records(shops),
        input_rows,
        duplicates_removed,
        conflicting_keys,
    }
}

fn conflicting_keys(shops: &[ShopRecord]) -> Vec<String> {
    let mut keys: Vec<&str> = shops.iter().map(|s| s.fps_code.as_str()).collect();
    keys.sort_unstable();

    let mut conflicts: Vec<String> = keys
        .windows(2)
        .filter(|pair| pair[0] == pair[1])
        .map(|pair| pair[0].to_string())
        .collect();
    conflicts.dedup();
    conflicts
}
