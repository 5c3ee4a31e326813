//! Common error types for LMIA tools

use thiserror::Error;

/// Common result type for LMIA operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the LMIA crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Cache or bogon store could not be read or written
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
