//! Error handling for implicitmap
//!
//! This module defines the error taxonomy of the mapping node and a Result
//! alias for use throughout the crate. Every variant except [`DeviceInit`]
//! is recovered locally: the caller logs it and carries on.
//!
//! [`DeviceInit`]: ImplicitMapError::DeviceInit

use crate::types::Direction;
use thiserror::Error;

/// Main error type for implicitmap operations
#[derive(Error, Debug)]
pub enum ImplicitMapError {
    /// The signal registry for a direction is full
    #[error("Max {direction} signals reached ({capacity})")]
    CapacityExceeded { direction: Direction, capacity: usize },

    /// A host list did not match the current output vector size
    #[error("vector size mismatch: expected {expected}, got {actual}")]
    VectorSizeMismatch { expected: usize, actual: usize },

    /// A snapshot was requested while another is still waiting for responses
    #[error("still waiting for last snapshot ({pending} queries outstanding)")]
    Busy { pending: usize },

    /// Remote queries did not all answer before the deadline
    #[error("query timeout: {outstanding} responses missing")]
    QueryTimeout { outstanding: usize },

    /// A mapping connected a device to itself
    #[error("self-mapping rejected: {source_path} -> {destination_path}")]
    SelfMapping {
        source_path: String,
        destination_path: String,
    },

    /// A signal extends past the end of the flat vector
    #[error("Maximum vector length exceeded for '{signal}' (offset {offset}, length {length}, capacity {capacity})")]
    MaxVectorLengthExceeded {
        signal: String,
        offset: usize,
        length: usize,
        capacity: usize,
    },

    /// The network identity could not be allocated
    #[error("Error initializing device: {0}")]
    DeviceInit(String),

    /// Errors reported by the mapping network
    #[error("Network error: {0}")]
    Network(String),

    /// A network handle that this device does not know about
    #[error("Unknown signal handle {0}")]
    UnknownSignal(u64),

    /// The device has not registered on the network yet
    #[error("device not ready")]
    NotReady,

    /// A host message that could not be understood
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ImplicitMapError>,
    },
}

impl ImplicitMapError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ImplicitMapError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// Result type alias for implicitmap operations
pub type Result<T> = std::result::Result<T, ImplicitMapError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ImplicitMapError::VectorSizeMismatch {
            expected: 3,
            actual: 2,
        };
        assert_eq!(err.to_string(), "vector size mismatch: expected 3, got 2");
    }

    #[test]
    fn test_capacity_display_names_direction() {
        let err = ImplicitMapError::CapacityExceeded {
            direction: Direction::Outgoing,
            capacity: 256,
        };
        assert_eq!(err.to_string(), "Max output signals reached (256)");
    }

    #[test]
    fn test_error_with_context() {
        let err = ImplicitMapError::Network("socket closed".to_string());
        let with_ctx = err.with_context("Failed to push map");
        assert!(with_ctx.to_string().contains("Failed to push map"));
        assert!(with_ctx.to_string().contains("socket closed"));
    }

    #[test]
    fn test_result_ext_lazy_context() {
        let res: Result<()> = Err(ImplicitMapError::NotReady);
        let err = res.with_context(|| "snapshot".to_string()).unwrap_err();
        assert_eq!(err.to_string(), "snapshot: device not ready");
    }
}
