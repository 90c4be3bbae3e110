//! Error types for MorningBrief.
//!
//! Library crates use [`BriefError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! The variants double as the failure taxonomy of the enrichment pipeline:
//! [`BriefError::Transient`] and [`BriefError::RateLimited`] are retried,
//! [`BriefError::NotFound`] downgrades a resolution tier, [`BriefError::Config`]
//! fails one attendee (or the whole run when it is global) and
//! [`BriefError::CalendarUnavailable`] aborts the run.

use std::path::PathBuf;
use std::time::Duration;

/// Top-level error type for all MorningBrief operations.
#[derive(Debug, thiserror::Error)]
pub enum BriefError {
    /// Configuration loading/validation error, missing credentials or a
    /// malformed identity.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network failure or 5xx response from an external service.
    #[error("transient external error: {0}")]
    Transient(String),

    /// 429-class response from an external service.
    #[error("rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    /// A well-formed empty result. Not retried.
    #[error("not found: {0}")]
    NotFound(String),

    /// The calendar source could not produce any events.
    #[error("calendar unavailable: {0}")]
    CalendarUnavailable(String),

    /// Summarization service error (API or response parsing).
    #[error("summarization error: {0}")]
    Summarization(String),

    /// A deadline elapsed before the operation finished.
    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Response or file parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (schema mismatch, invalid format, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BriefError>;

impl BriefError {
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

    /// Create a rate-limit error, optionally carrying the server's `Retry-After`.
    pub fn rate_limited(msg: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self::RateLimited {
            message: msg.into(),
            retry_after,
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether a retry with backoff may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::RateLimited { .. })
    }

    /// Whether the error is a 429-class response.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Server-provided retry hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}
