//! Error types for the LED matrix server.

use std::io;
use thiserror::Error;

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors recognized by the core. No variant here terminates the process;
/// the controller logs, resets the offending component, and keeps running.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error occurred (connect, send, read).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A wire frame could not be parsed (short buffer, bad magic).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Configuration could not be loaded or described an invalid entity.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A requested canvas, feature, or socket id does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A caller passed an invalid argument (negative dimensions, duplicate id).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A Socket Channel's outbound queue reached `MAX_QUEUE_DEPTH`. Recovered
    /// locally by shedding (drop the incoming frame, drain the queue,
    /// force-close the socket) and is logged, never propagated to a caller.
    #[error("queue overflow: {0}")]
    Overflow(String),
}
