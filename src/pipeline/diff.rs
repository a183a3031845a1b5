//! Diff calculation between two snapshots.
//!
//! Full outer join on `fpsCode`: keys only in the current snapshot are added,
//! keys only in the previous one are removed, and keys in both are updated
//! when any other column differs.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::models::{COLUMNS, ChangeCounts, Dataset, KEY_COLUMN, ShopRecord};

/// One column that differs between two versions of a shop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldChange {
    pub column: &'static str,
    pub old: String,
    pub new: String,
}

/// A shop present in both snapshots with at least one changed column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdatedShop {
    pub previous: ShopRecord,
    pub current: ShopRecord,
    pub changes: Vec<FieldChange>,
}

impl UpdatedShop {
    pub fn fps_code(&self) -> &str {
        &self.current.fps_code
    }
}

/// Classified differences between two snapshots. Every list is ordered by
/// `fpsCode`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChangeSummary {
    pub added: Vec<ShopRecord>,
    pub removed: Vec<ShopRecord>,
    pub updated: Vec<UpdatedShop>,
    /// Keys present in both snapshots with identical rows
    pub unchanged: usize,
}

impl ChangeSummary {
    /// Check if there are any changes.
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.updated.is_empty() || !self.removed.is_empty()
    }

    /// Get the total number of changes.
    pub fn change_count(&self) -> usize {
        self.added.len() + self.updated.len() + self.removed.len()
    }

    pub fn counts(&self) -> ChangeCounts {
        ChangeCounts {
            added: self.added.len(),
            removed: self.removed.len(),
            updated: self.updated.len(),
            unchanged: self.unchanged,
        }
    }

    /// Human-readable report handed to whatever publishes the run result.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ChangeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Added Shops: {}", self.added.len())?;
        writeln!(f, "Removed Shops: {}", self.removed.len())?;
        write!(f, "Updated Shops: {}", self.updated.len())
    }
}

/// Calculator for computing diffs between snapshots.
#[derive(Debug, Clone, Default)]
pub struct DiffCalculator;

impl DiffCalculator {
    /// Create a new diff calculator.
    pub fn new() -> Self {
        Self
    }

    /// Calculate the diff between previous and current snapshots.
    ///
    /// With no previous snapshot every current shop is added. When a snapshot
    /// holds several rows for one key, the first in row order is compared.
    pub fn calculate(&self, previous: Option<&Dataset>, current: &Dataset) -> ChangeSummary {
        let prev_map = previous.map(index_by_key).unwrap_or_default();
        let curr_map = index_by_key(current);

        let mut summary = ChangeSummary::default();

        for (key, curr) in &curr_map {
            match prev_map.get(key) {
                None => summary.added.push((*curr).clone()),
                Some(prev) => {
                    let changes = field_changes(prev, curr);
                    if changes.is_empty() {
                        summary.unchanged += 1;
                    } else {
                        summary.updated.push(UpdatedShop {
                            previous: (*prev).clone(),
                            current: (*curr).clone(),
                            changes,
                        });
                    }
                }
            }
        }

        summary.removed = prev_map
            .iter()
            .filter(|(key, _)| !curr_map.contains_key(*key))
            .map(|(_, prev)| (*prev).clone())
            .collect();

        summary
    }
}

fn index_by_key(dataset: &Dataset) -> BTreeMap<&str, &ShopRecord> {
    let mut map = BTreeMap::new();
    let mut repeated = 0usize;
    for shop in dataset {
        if map.contains_key(shop.fps_code.as_str()) {
            repeated += 1;
        } else {
            map.insert(shop.fps_code.as_str(), shop);
        }
    }
    if repeated > 0 {
        log::warn!(
            "{} rows repeat an fpsCode already seen; only the first row per key is compared",
            repeated
        );
    }
    map
}

/// Compare every non-key column, in column order.
fn field_changes(previous: &ShopRecord, current: &ShopRecord) -> Vec<FieldChange> {
    let old = previous.to_row();
    let new = current.to_row();

    COLUMNS
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != KEY_COLUMN && old[*i] != new[*i])
        .map(|(i, column)| FieldChange {
            column: *column,
            old: old[i].clone(),
            new: new[i].clone(),
        })
        .collect()
}

/// Convenience function to calculate diff.
pub fn calculate_diff(previous: Option<&Dataset>, current: &Dataset) -> ChangeSummary {
    DiffCalculator::new().calculate(previous, current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn make_shop(code: &str, address: &str) -> ShopRecord {
        ShopRecord {
            fps_code: code.to_string(),
            fps_name: format!("Shop {code}"),
            address: address.to_string(),
            state_code: "09".into(),
            ..ShopRecord::default()
        }
    }

    fn dataset(shops: Vec<ShopRecord>) -> Dataset {
        Dataset::from_records(shops)
    }

    fn keys(shops: &[ShopRecord]) -> Vec<&str> {
        shops.iter().map(|s| s.fps_code.as_str()).collect()
    }

    #[test]
    fn test_no_changes() {
        let prev = dataset(vec![make_shop("001", "X"), make_shop("002", "Y")]);
        let curr = prev.clone();

        let result = calculate_diff(Some(&prev), &curr);
        assert!(!result.has_changes());
        assert_eq!(result.change_count(), 0);
        assert_eq!(result.unchanged, 2);
    }

    #[test]
    fn test_first_run_everything_added() {
        let curr = dataset(vec![make_shop("001", "X"), make_shop("002", "Y")]);

        let result = calculate_diff(None, &curr);
        assert_eq!(keys(&result.added), vec!["001", "002"]);
        assert!(result.removed.is_empty());
        assert!(result.updated.is_empty());
        assert_eq!(result.unchanged, 0);
    }

    #[test]
    fn test_added_and_updated() {
        let prev = dataset(vec![make_shop("A1", "X")]);
        let curr = dataset(vec![make_shop("A1", "Y"), make_shop("B2", "Z")]);

        let result = calculate_diff(Some(&prev), &curr);
        assert_eq!(keys(&result.added), vec!["B2"]);
        assert!(result.removed.is_empty());
        assert_eq!(result.updated.len(), 1);

        let updated = &result.updated[0];
        assert_eq!(updated.fps_code(), "A1");
        assert_eq!(
            updated.changes,
            vec![FieldChange {
                column: "address",
                old: "X".into(),
                new: "Y".into(),
            }]
        );
    }

    #[test]
    fn test_removals() {
        let prev = dataset(vec![make_shop("A1", ""), make_shop("A2", "")]);
        let curr = dataset(vec![make_shop("A1", "")]);

        let result = calculate_diff(Some(&prev), &curr);
        assert_eq!(keys(&result.removed), vec!["A2"]);
        assert!(result.added.is_empty());
        assert!(result.updated.is_empty());
    }

    #[test]
    fn test_coordinate_change_is_update() {
        let prev = dataset(vec![make_shop("A1", "X")]);
        let mut moved = make_shop("A1", "X");
        moved.latitude = Some(26.85);
        let curr = dataset(vec![moved]);

        let result = calculate_diff(Some(&prev), &curr);
        assert_eq!(result.updated.len(), 1);
        assert_eq!(result.updated[0].changes[0].column, "latitude");
        assert_eq!(result.updated[0].changes[0].old, "");
        assert_eq!(result.updated[0].changes[0].new, "26.85");
    }

    #[test]
    fn test_multiple_columns_reported_in_order() {
        let prev = dataset(vec![make_shop("A1", "X")]);
        let mut changed = make_shop("A1", "Y");
        changed.fps_name = "Renamed".into();
        changed.state_name = "Uttar Pradesh".into();
        let curr = dataset(vec![changed]);

        let result = calculate_diff(Some(&prev), &curr);
        let columns: Vec<_> = result.updated[0].changes.iter().map(|c| c.column).collect();
        assert_eq!(columns, vec!["fpsName", "address", "stateName"]);
    }

    #[test]
    fn test_mixed_changes_partition_keys() {
        let prev = dataset(vec![
            make_shop("001", "Keep"),
            make_shop("002", "Update Me"),
            make_shop("003", "Remove Me"),
        ]);
        let curr = dataset(vec![
            make_shop("001", "Keep"),
            make_shop("002", "Updated"),
            make_shop("004", "New Shop"),
        ]);

        let result = calculate_diff(Some(&prev), &curr);
        assert_eq!(keys(&result.added), vec!["004"]);
        assert_eq!(
            result.updated.iter().map(|u| u.fps_code()).collect::<Vec<_>>(),
            vec!["002"]
        );
        assert_eq!(keys(&result.removed), vec!["003"]);
        assert_eq!(result.unchanged, 1);

        let all: BTreeSet<&str> = ["001", "002", "003", "004"].into_iter().collect();
        let mut seen = BTreeSet::new();
        for key in keys(&result.added)
            .into_iter()
            .chain(keys(&result.removed))
            .chain(result.updated.iter().map(|u| u.fps_code()))
        {
            assert!(seen.insert(key), "{key} classified twice");
        }
        assert_eq!(seen.len() + result.unchanged, all.len());
    }

    #[test]
    fn test_full_to_empty() {
        let prev = dataset(vec![make_shop("001", "Last")]);
        let curr = dataset(vec![]);

        let result = calculate_diff(Some(&prev), &curr);
        assert!(result.added.is_empty());
        assert_eq!(result.removed.len(), 1);
    }

    #[test]
    fn test_repeated_key_compares_first_row() {
        let prev = dataset(vec![make_shop("A1", "X")]);
        let curr = dataset(vec![make_shop("A1", "X"), make_shop("A1", "Other")]);

        let result = calculate_diff(Some(&prev), &curr);
        assert!(!result.has_changes());
        assert_eq!(result.unchanged, 1);
    }

    #[test]
    fn test_render() {
        let prev = dataset(vec![make_shop("A1", "X"), make_shop("A2", "")]);
        let curr = dataset(vec![make_shop("A1", "Y"), make_shop("B2", "Z")]);

        let result = calculate_diff(Some(&prev), &curr);
        assert_eq!(
            result.render(),
            "Added Shops: 1\nRemoved Shops: 1\nUpdated Shops: 1"
        );
        assert_eq!(
            result.counts(),
            ChangeCounts {
                added: 1,
                removed: 1,
                updated: 1,
                unchanged: 0,
            }
        );
    }
}
