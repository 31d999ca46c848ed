//! Snapshot capture for training pairs
//!
//! A snapshot pairs the input vector with the output vector at one instant.
//! Captures are driven by [`SnapshotCoordinator`] and kept in a
//! [`SnapshotStore`] until the layout changes or the host clears them.

pub mod coordinator;
pub mod store;

pub use coordinator::{CaptureState, CompletedCapture, SnapshotCoordinator, DEFAULT_QUERY_TIMEOUT};
pub use store::{Snapshot, SnapshotStore};
