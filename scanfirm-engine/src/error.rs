//! Error types for scanfirm-engine
//!
//! Defines module-specific error types using thiserror for clear error
//! propagation. Only fatal conditions live here: per-frame decode noise and
//! validation rejections are session feedback, not errors.

use thiserror::Error;

/// Main error type for the scanfirm engine
#[derive(Error, Debug)]
pub enum Error {
    /// Frame source denied, busy, or lost mid-session
    #[error("Frame source error: {0}")]
    Resource(String),

    /// Neither decoding backend probed as available
    #[error("No decoding backend available")]
    BackendUnavailable,

    /// Configuration file loading or parameter validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid caller input (manual entry gate, malformed arguments)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<scanfirm_common::Error> for Error {
    fn from(err: scanfirm_common::Error) -> Self {
        match err {
            scanfirm_common::Error::Io(e) => Error::Io(e),
            scanfirm_common::Error::Config(msg) => Error::Config(msg),
            scanfirm_common::Error::InvalidInput(msg) => Error::InvalidInput(msg),
            scanfirm_common::Error::Internal(msg) => Error::Internal(msg),
        }
    }
}

/// Convenience Result type using the engine Error
pub type Result<T> = std::result::Result<T, Error>;
