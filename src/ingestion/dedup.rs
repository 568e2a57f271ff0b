//! Deduplicator - folds rows into one record per normalized vessel name
//!
//! Scoped to a single source; cross-source convergence is left to the
//! registry's conflict-resolving upsert.

use crate::vessel::{RawRow, VesselRecord};
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct VesselSnapshot {
    records: BTreeMap<String, VesselRecord>,
    rows_folded: u64,
}

impl VesselSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold rows in arrival order; a later row for the same name replaces
    /// the earlier one entirely.
    pub fn fold(&mut self, rows: impl IntoIterator<Item = RawRow>) {
        for row in rows {
            self.rows_folded += 1;
            let record = row.into_record();
            self.records.insert(record.name.clone(), record);
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn rows_folded(&self) -> u64 {
        self.rows_folded
    }

    pub fn get(&self, name: &str) -> Option<&VesselRecord> {
        self.records.get(name)
    }

    /// Records ordered by name.
    pub fn into_records(self) -> Vec<VesselRecord> {
        self.records.into_values().collect()
    }
}
