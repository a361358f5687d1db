//! Record preprocessing: coordinate matrix + LocationKey lookup.
//!
//! Row `i` of the coordinate matrix always belongs to `records[i]`, so the
//! analyzer can join by row index. The LocationKey index is kept for the
//! legacy join; keys collide when two posts round to the same location and
//! the later record wins.

use std::collections::HashMap;
use tracing::debug;

use crate::types::{LocationKey, PostRecord};

/// Preprocessed records for one job.
#[derive(Debug, Clone, Default)]
pub struct PreparedRecords {
    records: Vec<PostRecord>,
    coordinates: Vec<[f64; 2]>,
    location_index: HashMap<LocationKey, usize>,
    collisions: usize,
}

/// Build the coordinate matrix and LocationKey index.
///
/// Retrieval order is preserved.
pub fn prepare(records: Vec<PostRecord>) -> PreparedRecords {
    let mut coordinates = Vec::with_capacity(records.len());
    let mut location_index = HashMap::with_capacity(records.len());
    let mut collisions = 0;

    for (row, record) in records.iter().enumerate() {
        coordinates.push(record.location.as_row());
        let key = record.location_key();
        if let Some(previous) = location_index.insert(key, row) {
            collisions += 1;
            debug!(
                key = %key,
                replaced = %records[previous].id,
                by = %record.id,
                "LocationKey collision, last write wins"
            );
        }
    }

    PreparedRecords {
        records,
        coordinates,
        location_index,
        collisions,
    }
}

impl PreparedRecords {
    /// No rows. The pipeline skips the partitioner.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn coordinates(&self) -> &[[f64; 2]] {
        &self.coordinates
    }

    pub fn records(&self) -> &[PostRecord] {
        &self.records
    }

    pub fn record(&self, row: usize) -> Option<&PostRecord> {
        self.records.get(row)
    }

    /// Resolve a LocationKey to the row of the record that owns it.
    pub fn lookup(&self, key: &LocationKey) -> Option<usize> {
        self.location_index.get(key).copied()
    }

    pub fn location_count(&self) -> usize {
        self.location_index.len()
    }

    /// Number of records whose LocationKey was overwritten by a later one.
    pub fn collisions(&self) -> usize {
        self.collisions
    }
}
