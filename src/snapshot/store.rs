//! Snapshot storage

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One captured input/output vector pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: u32,
    pub captured_at: chrono::DateTime<chrono::Utc>,
    pub inputs: Vec<f32>,
    pub outputs: Vec<f32>,
}

/// Append-only list of snapshots, newest first
#[derive(Debug, Default)]
pub struct SnapshotStore {
    snapshots: VecDeque<Snapshot>,
    next_id: u32,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a completed capture under the next id
    pub fn commit(
        &mut self,
        captured_at: chrono::DateTime<chrono::Utc>,
        inputs: Vec<f32>,
        outputs: Vec<f32>,
    ) -> &Snapshot {
        let id = self.next_id;
        self.next_id += 1;
        self.snapshots.push_front(Snapshot {
            id,
            captured_at,
            inputs,
            outputs,
        });
        &self.snapshots[0]
    }

    /// Discard every snapshot and restart ids at zero. Returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.snapshots.len();
        self.snapshots.clear();
        self.next_id = 0;
        dropped
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.snapshots.front()
    }

    pub fn get(&self, id: u32) -> Option<&Snapshot> {
        self.snapshots.iter().find(|s| s.id == id)
    }

    /// Newest first
    pub fn iter(&self) -> impl Iterator<Item = &Snapshot> {
        self.snapshots.iter()
    }
}
