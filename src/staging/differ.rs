//! Keyed reconciliation of child collections
//!
//! Brings a destination collection in line with a source collection without
//! replacing records that survive: matching records are updated in place,
//! missing ones are removed, new ones are appended.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// A record with a stable derived key
pub trait KeyedRecord {
    type Key: Eq + Hash + Clone;

    fn key(&self) -> Self::Key;
}

/// In-place field copy from a (possibly different) record kind
pub trait MergeFrom<S: ?Sized> {
    /// Copy every field from `source`, keeping this record's identity.
    /// Returns true if any field changed.
    fn merge_from(&mut self, source: &S) -> bool;
}

/// Counts produced by [`reconcile`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub added: usize,
    pub removed: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl ReconcileReport {
    pub fn is_changed(&self) -> bool {
        self.added > 0 || self.removed > 0 || self.updated > 0
    }
}

/// Reconcile `dest` against `source` by key
///
/// Surviving records keep their prior relative order; new records follow in
/// source order. When the source repeats a key, the last occurrence wins.
pub fn reconcile<D, S>(dest: &mut Vec<D>, source: &[S]) -> ReconcileReport
where
    D: KeyedRecord + MergeFrom<S> + Default,
    S: KeyedRecord<Key = D::Key>,
{
    let mut report = ReconcileReport::default();

    let source_keys: HashSet<D::Key> = source.iter().map(KeyedRecord::key).collect();

    let before = dest.len();
    dest.retain(|record| source_keys.contains(&record.key()));
    report.removed = before - dest.len();

    let mut index: HashMap<D::Key, usize> = dest
        .iter()
        .enumerate()
        .map(|(i, record)| (record.key(), i))
        .collect();

    // Records touched by a duplicate source key count once
    let mut touched: HashSet<usize> = HashSet::new();
    let mut changed: HashSet<usize> = HashSet::new();

    for record in source {
        let key = record.key();
        match index.get(&key) {
            Some(&i) => {
                if dest[i].merge_from(record) {
                    changed.insert(i);
                }
                touched.insert(i);
            }
            None => {
                let mut fresh = D::default();
                fresh.merge_from(record);
                dest.push(fresh);
                index.insert(key, dest.len() - 1);
                report.added += 1;
            }
        }
    }

    let survivors = before - report.removed;
    report.updated = changed.iter().filter(|&&i| i < survivors).count();
    report.unchanged = touched.iter().filter(|&&i| i < survivors).count() - report.updated;
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default)]
    struct Row {
        id: u32,
        name: String,
        value: i64,
    }

    impl KeyedRecord for Row {
        type Key = String;

        fn key(&self) -> String {
            self.name.clone()
        }
    }

    impl MergeFrom<Row> for Row {
        fn merge_from(&mut self, source: &Row) -> bool {
            let changed = self.name != source.name || self.value != source.value;
            self.name = source.name.clone();
            self.value = source.value;
            changed
        }
    }

    fn row(id: u32, name: &str, value: i64) -> Row {
        Row {
            id,
            name: name.to_string(),
            value,
        }
    }

    fn keys(rows: &[Row]) -> Vec<String> {
        rows.iter().map(|r| r.name.clone()).collect()
    }

    #[test]
    fn test_reconcile_add_remove_update() {
        let mut dest = vec![row(1, "A", 1), row(2, "B", 2), row(3, "C", 3)];
        let source = vec![row(0, "B", 20), row(0, "C", 3), row(0, "D", 4)];

        let report = reconcile(&mut dest, &source);

        assert_eq!(keys(&dest), vec!["B", "C", "D"]);
        // B keeps its identity with updated values
        assert_eq!(dest[0].id, 2);
        assert_eq!(dest[0].value, 20);
        assert_eq!(dest[1].id, 3);
        // D is freshly constructed
        assert_eq!(dest[2].id, 0);
        assert_eq!(
            report,
            ReconcileReport {
                added: 1,
                removed: 1,
                updated: 1,
                unchanged: 1,
            }
        );
        assert!(report.is_changed());
    }

    #[test]
    fn test_survivors_keep_order_new_records_appended() {
        let mut dest = vec![row(1, "C", 3), row(2, "A", 1)];
        let source = vec![row(0, "Z", 9), row(0, "A", 1), row(0, "C", 3), row(0, "M", 5)];

        reconcile(&mut dest, &source);

        assert_eq!(keys(&dest), vec!["C", "A", "Z", "M"]);
    }

    #[test]
    fn test_empty_source_empties_destination() {
        let mut dest = vec![row(1, "A", 1), row(2, "B", 2)];
        let report = reconcile::<Row, Row>(&mut dest, &[]);

        assert!(dest.is_empty());
        assert_eq!(report.removed, 2);
    }

    #[test]
    fn test_duplicate_source_keys_last_wins() {
        let mut dest = vec![row(1, "A", 1)];
        let source = vec![row(0, "A", 5), row(0, "A", 6), row(0, "B", 1), row(0, "B", 2)];

        let report = reconcile(&mut dest, &source);

        assert_eq!(keys(&dest), vec!["A", "B"]);
        assert_eq!(dest[0].id, 1);
        assert_eq!(dest[0].value, 6);
        assert_eq!(dest[1].value, 2);
        assert_eq!(report.added, 1);
        assert_eq!(report.updated, 1);
    }

    #[test]
    fn test_identical_collections_report_no_change() {
        let mut dest = vec![row(1, "A", 1), row(2, "B", 2)];
        let source = dest.clone();

        let report = reconcile(&mut dest, &source);

        assert!(!report.is_changed());
        assert_eq!(report.unchanged, 2);
    }
}
