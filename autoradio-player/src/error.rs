//! Error types for autoradio-player
//!
//! Defines module-specific error types using thiserror for clear error propagation.
//! Pipeline and transport failures have their own enums so the engine can
//! tell "retry" failures apart from "skip" failures.

use thiserror::Error;

pub use crate::playback::pipeline::PipelineError;
pub use crate::transport::TransportError;

/// Main error type for autoradio-player
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No playable source found for a track (skip, never retried)
    #[error("Resolution failed: {0}")]
    Resolution(String),

    /// Decode pipeline unusable (retried)
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Voice transport errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Queue and catalog both empty
    #[error("Queue exhausted: no tracks available after refill")]
    QueueExhausted,

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Invalid request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation interrupted by skip/stop
    #[error("Operation cancelled")]
    Cancelled,

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<autoradio_common::Error> for Error {
    fn from(err: autoradio_common::Error) -> Self {
        match err {
            autoradio_common::Error::Io(e) => Error::Io(e),
            autoradio_common::Error::Config(msg) => Error::Config(msg),
            autoradio_common::Error::NotFound(msg) => Error::NotFound(msg),
            autoradio_common::Error::InvalidInput(msg) => Error::BadRequest(msg),
            autoradio_common::Error::Internal(msg) => Error::Internal(msg),
        }
    }
}

/// Convenience Result type using autoradio-player Error
pub type Result<T> = std::result::Result<T, Error>;
