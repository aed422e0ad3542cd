//! Unified error types for evtlog.
//!
//! This module provides a flat error type that wraps engine errors
//! and presents a consistent interface to users.

use thiserror::Error;

/// All evtlog errors.
///
/// Three outcomes are distinguishable without looking at codes: the end of
/// a stream ([`Error::EndOfStream`], [`Error::Timeout`]), caller mistakes
/// ([`Error::is_invalid_input`]), and real failures.
#[derive(Debug, Error)]
pub enum Error {
    /// A string could not be passed to the platform
    #[error("cannot encode {input:?}: {reason}")]
    Encoding {
        /// The offending input
        input: String,
        /// Why it was rejected
        reason: String,
    },

    /// Broken precondition (empty path list, empty server name)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Query produced no usable result set
    #[error("invalid query {query:?} on {path:?}")]
    InvalidQuery {
        /// Channel or file path
        path: String,
        /// Query expression
        query: String,
    },

    /// No more events
    #[error("end of stream")]
    EndOfStream,

    /// Subscription saw no events within the timeout
    #[error("timed out after {timeout_ms}ms")]
    Timeout {
        /// The timeout that elapsed
        timeout_ms: u32,
    },

    /// A rendered value carried an unknown type tag
    #[error("unknown variant type tag {0:#x}")]
    UnknownVariantType(u32),

    /// Platform call failed
    #[error("{call} failed with code {code}: {message}")]
    Platform {
        /// Failing call
        call: &'static str,
        /// Native status code
        code: u32,
        /// Diagnostic message
        message: String,
    },

    /// Handle used after it was closed
    #[error("{0} handle used after close")]
    HandleClosed(&'static str),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for evtlog operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this is the end-of-stream signal.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Error::EndOfStream)
    }

    /// Check if this is a subscription timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Check if the caller supplied malformed input.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Error::Encoding { .. } | Error::InvalidInput(_) | Error::InvalidQuery { .. }
        )
    }

    /// Native code of a platform failure.
    pub fn platform_code(&self) -> Option<u32> {
        match self {
            Error::Platform { code, .. } => Some(*code),
            _ => None,
        }
    }
}

// Convert from engine errors
impl From<evtlog_core::Error> for Error {
    fn from(e: evtlog_core::Error) -> Self {
        use evtlog_core::Error as CoreError;
        match e {
            CoreError::Encoding { input, reason } => Error::Encoding { input, reason },
            CoreError::InvalidArgument(msg) => Error::InvalidInput(msg),
            CoreError::InvalidQuery { path, query } => Error::InvalidQuery { path, query },
            CoreError::EndOfStream => Error::EndOfStream,
            CoreError::Timeout { timeout_ms } => Error::Timeout { timeout_ms },
            CoreError::UnknownVariantType { tag } => Error::UnknownVariantType(tag),
            CoreError::Platform { call, source } => Error::Platform {
                call,
                code: source.code,
                message: source.message,
            },
            CoreError::HandleClosed { kind } => Error::HandleClosed(kind),
        }
    }
}

// Convert from TOML parse errors
impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}
