//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

#[cfg(feature = "mock-network")]
pub mod builders;
pub mod mock_helpers;

use implicitmap::HostMessage;
use std::time::Duration;

/// Create a test timeout duration
pub fn test_timeout() -> Duration {
    Duration::from_millis(100)
}

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f32, b: f32, epsilon: f32) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}

/// Selectors of a batch of host messages, in order
pub fn selectors(messages: &[HostMessage]) -> Vec<&'static str> {
    messages.iter().map(|m| m.selector()).collect()
}
