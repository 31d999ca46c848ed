//! Fixed-capacity flat vector of float cells
//!
//! A cell has no meaning of its own; the current offset table decides which
//! signal element it holds. The storage grows on demand up to the capacity
//! and is reused in place across topology changes.

/// Result of a write into the flat vector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Cells actually written
    pub written: usize,
    /// Cells dropped because they fell past the capacity
    pub truncated: usize,
}

impl WriteOutcome {
    pub fn is_truncated(&self) -> bool {
        self.truncated > 0
    }
}

/// Capacity-bounded cell storage
#[derive(Debug, Clone)]
pub struct FlatVector {
    cells: Vec<f32>,
    capacity: usize,
}

impl FlatVector {
    pub fn new(capacity: usize) -> Self {
        Self {
            cells: Vec::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Write `values` starting at `offset`, dropping anything past the capacity
    pub fn write(&mut self, offset: usize, values: &[f32]) -> WriteOutcome {
        let end = offset.saturating_add(values.len()).min(self.capacity);
        let written = end.saturating_sub(offset);
        if end > self.cells.len() {
            self.cells.resize(end, 0.0);
        }
        if written > 0 {
            self.cells[offset..end].copy_from_slice(&values[..written]);
        }
        WriteOutcome {
            written,
            truncated: values.len() - written,
        }
    }

    /// Zero `length` cells starting at `offset`
    pub fn fill_zero(&mut self, offset: usize, length: usize) -> WriteOutcome {
        let zeros = vec![0.0; length];
        self.write(offset, &zeros)
    }

    /// Zero every cell
    pub fn reset(&mut self) {
        self.cells.clear();
    }

    /// Read `length` cells starting at `offset`; unwritten cells read as zero
    pub fn read(&self, offset: usize, length: usize) -> Vec<f32> {
        (offset..offset.saturating_add(length))
            .take_while(|&i| i < self.capacity)
            .map(|i| self.cells.get(i).copied().unwrap_or(0.0))
            .collect()
    }

    /// The first `size` cells, zero-padded
    pub fn as_vec(&self, size: usize) -> Vec<f32> {
        self.read(0, size.min(self.capacity))
    }
}
