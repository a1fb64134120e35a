//! Error types for store operations.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
///
/// Transport failures are fatal for the current operation; no retry
/// happens at this layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The connection to the backing store failed.
    #[error("connection error: {message}")]
    Connection {
        /// Description of the transport failure.
        message: String,
    },

    /// The store returned a reply the adapter could not interpret.
    #[error("protocol error: {message}")]
    Protocol {
        /// Description of the unexpected reply.
        message: String,
    },
}

impl StoreError {
    /// Creates a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }
}

#[cfg(feature = "redis-backend")]
impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        Self::Connection {
            message: err.to_string(),
        }
    }
}
