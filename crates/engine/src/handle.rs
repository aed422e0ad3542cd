//! Owned platform handles
//!
//! A [`Handle`] pairs a raw platform value with the [`EvtApi`] that must
//! release it. Release happens exactly once: explicitly through
//! [`Handle::close`], or on drop.
//!
//! ## Invariants
//!
//! - `close` is idempotent; only the first call reaches the platform
//! - the null handle and the invalid sentinel are never passed to `close`
//! - after close, [`Handle::raw`] fails with [`Error::HandleClosed`]
//! - `Send` but not `Sync`: ownership may move between threads, sharing may not

use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use evtlog_core::{Error, Result};
use tracing::debug;

use crate::platform::{is_usable, EvtApi, RawHandle, NULL_HANDLE};

/// What a handle refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    /// Remote session
    Session,
    /// Render context
    RenderContext,
    /// Query or subscription result set
    ResultSet,
    /// Single event
    Event,
}

impl HandleKind {
    /// Human-readable name
    pub const fn name(&self) -> &'static str {
        match self {
            HandleKind::Session => "session",
            HandleKind::RenderContext => "render context",
            HandleKind::ResultSet => "result set",
            HandleKind::Event => "event",
        }
    }
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An owned platform handle
pub struct Handle {
    raw: RawHandle,
    api: Arc<dyn EvtApi>,
    kind: HandleKind,
    closed: bool,
    // Cell<()> is Send + !Sync
    _not_sync: PhantomData<Cell<()>>,
}

impl Handle {
    /// Take ownership of `raw`
    pub fn new(api: Arc<dyn EvtApi>, raw: RawHandle, kind: HandleKind) -> Self {
        debug!(kind = kind.name(), raw, "acquired handle");
        Self {
            raw,
            api,
            kind,
            closed: false,
            _not_sync: PhantomData,
        }
    }

    /// The zero handle of `kind`; closing it is a no-op
    pub fn null(api: Arc<dyn EvtApi>, kind: HandleKind) -> Self {
        Self {
            raw: NULL_HANDLE,
            api,
            kind,
            closed: false,
            _not_sync: PhantomData,
        }
    }

    /// Raw value for passing to the platform
    pub fn raw(&self) -> Result<RawHandle> {
        if self.closed {
            return Err(Error::HandleClosed {
                kind: self.kind.name(),
            });
        }
        Ok(self.raw)
    }

    /// What this handle refers to
    pub fn kind(&self) -> HandleKind {
        self.kind
    }

    /// Check if this handle was closed
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Check if this is the zero handle
    pub fn is_null(&self) -> bool {
        self.raw == NULL_HANDLE
    }

    /// The platform this handle belongs to
    pub fn api(&self) -> &Arc<dyn EvtApi> {
        &self.api
    }

    /// Release the handle; later calls do nothing
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if is_usable(self.raw) {
            self.api.close(self.raw);
            debug!(kind = self.kind.name(), raw = self.raw, "released handle");
        }
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("kind", &self.kind)
            .field("raw", &self.raw)
            .field("closed", &self.closed)
            .finish()
    }
}
