//! Flat-vector layout
//!
//! - [`OffsetTable`] - sorted, rebuilt-on-change slot assignment per direction
//! - [`FlatVector`] - the capacity-bounded cells those slots live in

pub mod offset_table;
pub mod vector;

pub use offset_table::{LayoutChange, LayoutSignal, OffsetEntry, OffsetTable};
pub use vector::{FlatVector, WriteOutcome};

/// Default number of cells per direction
pub const DEFAULT_CAPACITY: usize = 256;
