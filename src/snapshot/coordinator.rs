//! Snapshot capture coordination
//!
//! Inputs are known locally and copied at once; outputs are only known to the
//! remote ends they drive, so each one is queried and the capture waits for
//! the answers. The capture completes when every dispatched query has been
//! answered, or when the deadline passes, whichever comes first.
//!
//! ```text
//! Idle --begin--> Awaiting --all answered--> Idle (complete)
//!                    |
//!                    +--deadline passed--> Idle (partial)
//! Idle --begin, zero queries--> Idle (complete)
//! ```

use crate::error::{ImplicitMapError, Result};
use std::time::{Duration, Instant};

/// Default time to wait for query answers
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_millis(1000);

/// Coarse coordinator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    AwaitingResponses,
}

/// A capture that is finished and ready to be stored
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedCapture {
    pub captured_at: chrono::DateTime<chrono::Utc>,
    pub inputs: Vec<f32>,
    pub outputs: Vec<f32>,
    /// Queries that never answered (non-zero only after a timeout)
    pub missing: usize,
}

#[derive(Debug, Clone)]
struct InFlight {
    captured_at: chrono::DateTime<chrono::Utc>,
    inputs: Vec<f32>,
    outputs: Vec<f32>,
}

/// Request/response capture state machine
#[derive(Debug)]
pub struct SnapshotCoordinator {
    timeout: Duration,
    pending: usize,
    deadline: Option<Instant>,
    capture: Option<InFlight>,
}

impl Default for SnapshotCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_QUERY_TIMEOUT)
    }
}

impl SnapshotCoordinator {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            pending: 0,
            deadline: None,
            capture: None,
        }
    }

    pub fn state(&self) -> CaptureState {
        if self.pending > 0 {
            CaptureState::AwaitingResponses
        } else {
            CaptureState::Idle
        }
    }

    /// Outstanding query count
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// When the armed timeout fires, if armed
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Start a capture with the current input vector and a zeroed output
    /// vector of `output_size` cells.
    pub fn begin(&mut self, inputs: Vec<f32>, output_size: usize) -> Result<()> {
        if self.pending > 0 {
            return Err(ImplicitMapError::Busy {
                pending: self.pending,
            });
        }
        self.capture = Some(InFlight {
            captured_at: chrono::Utc::now(),
            inputs,
            outputs: vec![0.0; output_size],
        });
        self.deadline = None;
        Ok(())
    }

    /// Record how many queries went out. With none, the capture completes
    /// immediately; otherwise the timeout is armed from `now`.
    pub fn dispatched(&mut self, count: usize, now: Instant) -> Option<CompletedCapture> {
        self.capture.as_ref()?;
        if count == 0 {
            return self.complete(0);
        }
        self.pending = count;
        self.deadline = Some(now + self.timeout);
        None
    }

    /// Store one answer at `offset` in the output vector. `None` (the peer
    /// had no value) writes zeros. Returns the capture when it was the last
    /// outstanding answer.
    pub fn record_response(
        &mut self,
        offset: usize,
        length: usize,
        values: Option<&[f32]>,
    ) -> Option<CompletedCapture> {
        if self.pending == 0 {
            tracing::debug!("Ignoring query response with no capture in flight");
            return None;
        }
        let capture = self.capture.as_mut()?;

        let end = offset.saturating_add(length).min(capture.outputs.len());
        if offset + length > capture.outputs.len() {
            tracing::warn!("implicitmap: Maximum vector length exceeded!");
        }
        for (i, cell) in (offset..end).enumerate() {
            capture.outputs[cell] = values.and_then(|v| v.get(i)).copied().unwrap_or(0.0);
        }

        self.pending -= 1;
        if self.pending == 0 {
            self.complete(0)
        } else {
            None
        }
    }

    /// Fire the timeout if it is armed and `now` has reached the deadline
    pub fn expire(&mut self, now: Instant) -> Option<CompletedCapture> {
        match self.deadline {
            Some(deadline) if now >= deadline => self.force_timeout(),
            _ => None,
        }
    }

    /// Fire the timeout regardless of the deadline
    pub fn force_timeout(&mut self) -> Option<CompletedCapture> {
        self.capture.as_ref()?;
        let missing = self.pending;
        if missing > 0 {
            let err = ImplicitMapError::QueryTimeout {
                outstanding: missing,
            };
            tracing::warn!("{}; setting query count to 0 and outputting current values", err);
        }
        self.complete(missing)
    }

    /// Drop the in-flight capture without completing it
    pub fn abandon(&mut self) -> bool {
        let had = self.capture.take().is_some();
        self.pending = 0;
        self.deadline = None;
        had
    }

    fn complete(&mut self, missing: usize) -> Option<CompletedCapture> {
        self.pending = 0;
        self.deadline = None;
        self.capture.take().map(|c| CompletedCapture {
            captured_at: c.captured_at,
            inputs: c.inputs,
            outputs: c.outputs,
            missing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_queries_completes_immediately() {
        let mut coord = SnapshotCoordinator::default();
        coord.begin(vec![1.0, 2.0], 0).unwrap();
        let done = coord.dispatched(0, Instant::now()).unwrap();
        assert_eq!(done.inputs, vec![1.0, 2.0]);
        assert_eq!(coord.state(), CaptureState::Idle);
    }

    #[test]
    fn test_all_responses_complete_and_disarm() {
        let mut coord = SnapshotCoordinator::default();
        let now = Instant::now();
        coord.begin(vec![], 3).unwrap();
        assert!(coord.dispatched(2, now).is_none());
        assert_eq!(coord.deadline(), Some(now + DEFAULT_QUERY_TIMEOUT));

        assert!(coord.record_response(0, 2, Some(&[0.25, 0.5])).is_none());
        let done = coord.record_response(2, 1, None).unwrap();
        assert_eq!(done.outputs, vec![0.25, 0.5, 0.0]);
        assert_eq!(done.missing, 0);
        assert_eq!(coord.deadline(), None);
        assert!(coord.expire(now + Duration::from_secs(5)).is_none());
    }

    #[test]
    fn test_busy_while_awaiting() {
        let mut coord = SnapshotCoordinator::default();
        coord.begin(vec![], 1).unwrap();
        coord.dispatched(1, Instant::now());
        assert!(matches!(
            coord.begin(vec![], 1),
            Err(ImplicitMapError::Busy { pending: 1 })
        ));
    }

    #[test]
    fn test_timeout_emits_partial() {
        let mut coord = SnapshotCoordinator::default();
        let now = Instant::now();
        coord.begin(vec![], 2).unwrap();
        coord.dispatched(2, now);
        coord.record_response(0, 1, Some(&[0.75]));

        assert!(coord.expire(now + Duration::from_millis(999)).is_none());
        let done = coord.expire(now + Duration::from_millis(1000)).unwrap();
        assert_eq!(done.outputs, vec![0.75, 0.0]);
        assert_eq!(done.missing, 1);
        assert_eq!(coord.pending(), 0);
        assert!(coord.begin(vec![], 2).is_ok());
    }

    #[test]
    fn test_late_response_ignored() {
        let mut coord = SnapshotCoordinator::default();
        let now = Instant::now();
        coord.begin(vec![], 1).unwrap();
        coord.dispatched(1, now);
        coord.force_timeout().unwrap();
        assert!(coord.record_response(0, 1, Some(&[1.0])).is_none());
        assert_eq!(coord.pending(), 0);
    }

    #[test]
    fn test_response_past_vector_end_truncated() {
        let mut coord = SnapshotCoordinator::default();
        coord.begin(vec![], 2).unwrap();
        coord.dispatched(1, Instant::now());
        let done = coord.record_response(1, 3, Some(&[1.0, 2.0, 3.0])).unwrap();
        assert_eq!(done.outputs, vec![0.0, 1.0]);
    }

    #[test]
    fn test_abandon_resets() {
        let mut coord = SnapshotCoordinator::default();
        coord.begin(vec![], 1).unwrap();
        coord.dispatched(1, Instant::now());
        assert!(coord.abandon());
        assert_eq!(coord.state(), CaptureState::Idle);
        assert!(coord.force_timeout().is_none());
    }
}
