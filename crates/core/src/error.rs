//! Error types for the event log access layer
//!
//! [`Error`] is the single error type returned by every operation in the
//! engine. Callers must be able to tell three situations apart without
//! inspecting codes:
//!
//! - "no more data": [`Error::EndOfStream`] (and [`Error::Timeout`] for subscriptions)
//! - "malformed input": [`Error::Encoding`], [`Error::InvalidArgument`]
//! - "real failure": everything else, with [`Error::Platform`] carrying the native code

use thiserror::Error;

/// Platform status: no more items in the result set.
pub const ERROR_NO_MORE_ITEMS: u32 = 259;

/// Platform status: wait timed out.
pub const ERROR_TIMEOUT: u32 = 1460;

/// Platform status: output buffer too small.
pub const ERROR_INSUFFICIENT_BUFFER: u32 = 122;

/// Platform status: invalid parameter.
pub const ERROR_INVALID_PARAMETER: u32 = 87;

/// Platform status: data is malformed.
pub const ERROR_INVALID_DATA: u32 = 13;

/// Platform status: handle is not valid.
pub const ERROR_INVALID_HANDLE: u32 = 6;

/// Platform status: malformed query expression.
pub const ERROR_EVT_INVALID_QUERY: u32 = 15001;

/// Platform status: channel does not exist.
pub const ERROR_EVT_CHANNEL_NOT_FOUND: u32 = 15007;

/// A failure reported by the underlying platform call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("platform error {code}: {message}")]
pub struct PlatformError {
    /// Native status code
    pub code: u32,
    /// Diagnostic message
    pub message: String,
}

impl PlatformError {
    /// Create a platform error with an explicit message
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Create a platform error, deriving the message from the OS
    pub fn from_code(code: u32) -> Self {
        let message = match code {
            ERROR_NO_MORE_ITEMS => "no more data is available".to_string(),
            ERROR_TIMEOUT => "this operation returned because the timeout period expired".to_string(),
            ERROR_INSUFFICIENT_BUFFER => "the data area passed to a system call is too small".to_string(),
            ERROR_EVT_INVALID_QUERY => "the specified query is invalid".to_string(),
            ERROR_EVT_CHANNEL_NOT_FOUND => "the specified channel could not be found".to_string(),
            _ => std::io::Error::from_raw_os_error(code as i32).to_string(),
        };
        Self { code, message }
    }
}

/// Errors from event log operations
#[derive(Debug, Error)]
pub enum Error {
    /// A caller-supplied string could not be transcoded for the platform
    #[error("cannot encode {input:?} for the platform: {reason}")]
    Encoding {
        /// The offending input
        input: String,
        /// Why it was rejected
        reason: String,
    },

    /// The query call reported success but produced an unusable handle
    #[error("invalid query {query:?} on {path:?}")]
    InvalidQuery {
        /// Channel or file path
        path: String,
        /// Query expression
        query: String,
    },

    /// The result set has no more events
    #[error("end of stream")]
    EndOfStream,

    /// No event arrived within the timeout (subscriptions)
    #[error("timed out after {timeout_ms}ms waiting for events")]
    Timeout {
        /// The timeout that elapsed
        timeout_ms: u32,
    },

    /// A rendered value carried a tag outside the known set
    #[error("unknown variant type tag {tag:#x}")]
    UnknownVariantType {
        /// Raw tag
        tag: u32,
    },

    /// Any other failure from the platform
    #[error("{call} failed: {source}")]
    Platform {
        /// Platform primitive that failed
        call: &'static str,
        /// Native error
        #[source]
        source: PlatformError,
    },

    /// Caller violated an operation precondition
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Handle used after it was closed
    #[error("{kind} handle used after close")]
    HandleClosed {
        /// Handle kind name
        kind: &'static str,
    },
}

/// Result type for event log operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wrap a platform failure for `call`
    pub fn platform(call: &'static str, source: PlatformError) -> Self {
        Error::Platform { call, source }
    }

    /// Check if this is the end-of-stream signal
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Error::EndOfStream)
    }

    /// Check if this is a subscription timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Check if the caller supplied malformed input
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Error::Encoding { .. } | Error::InvalidArgument(_) | Error::InvalidQuery { .. }
        )
    }

    /// Native platform code, if this wraps a platform failure
    pub fn platform_code(&self) -> Option<u32> {
        match self {
            Error::Platform { source, .. } => Some(source.code),
            _ => None,
        }
    }
}
