//! The platform seam
//!
//! Everything this crate knows about the native event log service goes
//! through [`EvtApi`]. Implementations:
//!
//! - [`crate::sim::SimulatedPlatform`]: in-memory, used by tests and examples
//! - `crate::windows::WindowsPlatform`: `wevtapi.dll`, Windows only
//!
//! ## Raw Layout
//!
//! Rendered values come back as an array of [`RawVariant`] (16 bytes each:
//! 8-byte payload, element count, type tag) at the start of a
//! [`RenderBuffer`]. Pointer payloads reference memory later in the same
//! buffer, so the buffer must stay borrowed until decoding has copied
//! everything out.

use evtlog_core::{Error, PlatformError, Result};

/// Native handle value
pub type RawHandle = isize;

/// The zero handle ("no session", "never acquired")
pub const NULL_HANDLE: RawHandle = 0;

/// The platform's invalid-handle sentinel
pub const INVALID_HANDLE: RawHandle = -1;

/// Check whether a raw value can refer to a live resource
pub const fn is_usable(raw: RawHandle) -> bool {
    raw != NULL_HANDLE && raw != INVALID_HANDLE
}

/// Render context flag: explicit value paths
pub const RENDER_CONTEXT_VALUES: u32 = 0;
/// Render context flag: all system properties
pub const RENDER_CONTEXT_SYSTEM: u32 = 1;
/// Render context flag: all user properties
pub const RENDER_CONTEXT_USER: u32 = 2;

/// One rendered value as laid out by the platform
///
/// `value` is the 8-byte payload union: an inline scalar, or a pointer to
/// the data (strings, arrays, GUIDs, SIDs, calendar times).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct RawVariant {
    /// Payload union bits
    pub value: u64,
    /// Element count (arrays, binary blobs)
    pub count: u32,
    /// Type tag
    pub kind: u32,
}

/// Size of one [`RawVariant`] in bytes
pub const RAW_VARIANT_SIZE: usize = std::mem::size_of::<RawVariant>();

const _: () = assert!(RAW_VARIANT_SIZE == 16);

/// 8-byte aligned scratch buffer filled by the platform's render call
pub struct RenderBuffer {
    words: Vec<u64>,
}

impl RenderBuffer {
    /// Create a zeroed buffer of at least `bytes` bytes
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            words: vec![0; (bytes + 7) / 8],
        }
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.words.len() * 8
    }

    /// Check if the buffer has no room at all
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Grow to at least `bytes` bytes; never shrinks
    pub fn grow_to(&mut self, bytes: usize) {
        let words = (bytes + 7) / 8;
        if words > self.words.len() {
            self.words.resize(words, 0);
        }
    }

    /// Start of the buffer for the platform to write into
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.words.as_mut_ptr() as *mut u8
    }

    /// Start of the buffer
    pub fn as_ptr(&self) -> *const u8 {
        self.words.as_ptr() as *const u8
    }

    /// The whole buffer as bytes
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        let len = self.len();
        // SAFETY: u64 storage reinterpreted as u8 of the same total length.
        unsafe { std::slice::from_raw_parts_mut(self.as_mut_ptr(), len) }
    }

    /// The first `count` rendered values
    ///
    /// Fails if the platform claims more values than the buffer can hold.
    pub fn header(&self, count: usize) -> Result<&[RawVariant]> {
        let needed = count
            .checked_mul(RAW_VARIANT_SIZE)
            .ok_or_else(|| Error::InvalidArgument(format!("value count {} overflows", count)))?;
        if needed > self.len() {
            return Err(Error::platform(
                "EvtRender",
                PlatformError::new(
                    evtlog_core::error::ERROR_INVALID_DATA,
                    format!(
                        "{} values need {} bytes, buffer holds {}",
                        count,
                        needed,
                        self.len()
                    ),
                ),
            ));
        }
        // SAFETY: the storage is u64-aligned (RawVariant needs 8), `needed`
        // bytes are in bounds, and RawVariant is plain old data.
        Ok(unsafe { std::slice::from_raw_parts(self.as_ptr() as *const RawVariant, count) })
    }
}

impl std::fmt::Debug for RenderBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderBuffer").field("len", &self.len()).finish()
    }
}

/// Result of a render call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// `count` values were written at the start of the buffer
    Rendered {
        /// Number of values
        count: usize,
    },
    /// Nothing was written; the platform needs `required` bytes
    InsufficientBuffer {
        /// Required buffer size in bytes
        required: usize,
    },
}

/// Primitive calls of the platform event log service
///
/// All wide-string arguments are NUL-terminated UTF-16.
///
/// # Safety
///
/// Implementors guarantee that when [`EvtApi::render_values`] returns
/// [`RenderOutcome::Rendered`], the first `count` [`RawVariant`]s in the
/// buffer are well formed: every pointer payload is either null (only with a
/// zero count) or points to readable memory of the size implied by its tag
/// and count, strings are NUL-terminated, and all of it stays valid until the
/// buffer is next mutably borrowed or dropped. The decoder relies on this
/// without further checks.
pub unsafe trait EvtApi: Send + Sync {
    /// Open a session to a remote server
    fn open_session(&self, server: &[u16]) -> std::result::Result<RawHandle, PlatformError>;

    /// Create a render context over `paths` (explicit mode) or a flag-selected set
    fn create_render_context(
        &self,
        paths: &[&[u16]],
        flags: u32,
    ) -> std::result::Result<RawHandle, PlatformError>;

    /// Run a query against a channel or log file
    fn query(
        &self,
        session: RawHandle,
        path: &[u16],
        query: &[u16],
        flags: u32,
    ) -> std::result::Result<RawHandle, PlatformError>;

    /// Open a pull subscription on a channel
    fn subscribe(
        &self,
        session: RawHandle,
        channel: &[u16],
        query: &[u16],
        flags: u32,
    ) -> std::result::Result<RawHandle, PlatformError>;

    /// Retrieve up to `events.len()` event handles, returning how many were written
    ///
    /// On error, any non-null entries already written are owned by the caller.
    fn next(
        &self,
        result_set: RawHandle,
        events: &mut [RawHandle],
        timeout_ms: u32,
    ) -> std::result::Result<usize, PlatformError>;

    /// Render the values selected by `context` for `event` into `buffer`
    fn render_values(
        &self,
        context: RawHandle,
        event: RawHandle,
        buffer: &mut RenderBuffer,
    ) -> std::result::Result<RenderOutcome, PlatformError>;

    /// Render an event as XML
    fn render_xml(&self, event: RawHandle) -> std::result::Result<String, PlatformError>;

    /// Release a handle; must tolerate null, invalid and already-released values
    fn close(&self, handle: RawHandle);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_buffer_rounds_up_to_words() {
        let buf = RenderBuffer::with_capacity(17);
        assert_eq!(buf.len(), 24);
        assert_eq!(buf.as_ptr() as usize % 8, 0);
    }

    #[test]
    fn test_render_buffer_grow_never_shrinks() {
        let mut buf = RenderBuffer::with_capacity(64);
        buf.grow_to(16);
        assert_eq!(buf.len(), 64);
        buf.grow_to(100);
        assert_eq!(buf.len(), 104);
    }

    #[test]
    fn test_header_bounds_checked() {
        let buf = RenderBuffer::with_capacity(32);
        assert_eq!(buf.header(2).unwrap().len(), 2);
        let err = buf.header(3).unwrap_err();
        assert_eq!(err.platform_code(), Some(evtlog_core::error::ERROR_INVALID_DATA));
    }

    #[test]
    fn test_handle_usability() {
        assert!(!is_usable(NULL_HANDLE));
        assert!(!is_usable(INVALID_HANDLE));
        assert!(is_usable(0x100));
    }
}
