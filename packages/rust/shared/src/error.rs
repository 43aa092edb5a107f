//! Error types for Letterpress.
//!
//! Library crates use [`LetterpressError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Letterpress operations.
#[derive(Debug, thiserror::Error)]
pub enum LetterpressError {
    /// Configuration loading or validation error, including "no usable providers".
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error talking to an external collaborator.
    #[error("network error: {0}")]
    Network(String),

    /// A single provider call failed.
    #[error("provider error: {0}")]
    Provider(String),

    /// Every provider in a fallback chain failed.
    #[error("all providers exhausted: {0}")]
    Exhausted(String),

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Structured output (plan JSON, stored records) could not be parsed.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad request fields, illegal transitions, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LetterpressError>;

impl LetterpressError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
