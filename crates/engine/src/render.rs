//! Render contexts and the buffer-reusing renderer
//!
//! A [`RenderContext`] names which values to extract from an event. A
//! [`Renderer`] owns the scratch buffer the platform renders into and grows
//! it on demand; decoded values never borrow that buffer.

use std::sync::Arc;

use evtlog_core::error::ERROR_INSUFFICIENT_BUFFER;
use evtlog_core::{Error, PlatformError, Result, Variant};
use tracing::{trace, warn};

use crate::batch::Event;
use crate::decode::{decode_values, malformed};
use crate::handle::{Handle, HandleKind};
use crate::platform::{
    is_usable, EvtApi, RawHandle, RenderBuffer, RenderOutcome, RENDER_CONTEXT_SYSTEM,
    RENDER_CONTEXT_USER, RENDER_CONTEXT_VALUES,
};
use crate::wide::to_wide;

/// Default initial render buffer size in bytes
pub const DEFAULT_RENDER_BUFFER_BYTES: usize = 4096;

/// Default cap on render buffer growth in bytes
pub const DEFAULT_MAX_RENDER_BUFFER_BYTES: usize = 16 * 1024 * 1024;

/// Which values a render context extracts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderContextKind {
    /// Every system property, in platform order
    System,
    /// Every user property, in platform order
    User,
    /// One value per path, in path order; unmatched paths render as `Null`
    Values(Vec<String>),
}

impl RenderContextKind {
    fn flags(&self) -> u32 {
        match self {
            RenderContextKind::System => RENDER_CONTEXT_SYSTEM,
            RenderContextKind::User => RENDER_CONTEXT_USER,
            RenderContextKind::Values(_) => RENDER_CONTEXT_VALUES,
        }
    }
}

/// A reusable selection of values to render
#[derive(Debug)]
pub struct RenderContext {
    handle: Handle,
    kind: RenderContextKind,
}

impl RenderContext {
    /// Create a render context
    ///
    /// `Values` with no paths is rejected; every path must be free of
    /// interior NULs.
    pub fn create(api: Arc<dyn EvtApi>, kind: RenderContextKind) -> Result<Self> {
        let wide_paths = match &kind {
            RenderContextKind::Values(paths) if paths.is_empty() => {
                return Err(Error::InvalidArgument(
                    "explicit render context needs at least one path".to_string(),
                ))
            }
            RenderContextKind::Values(paths) => {
                paths.iter().map(|p| to_wide(p)).collect::<Result<Vec<_>>>()?
            }
            RenderContextKind::System | RenderContextKind::User => Vec::new(),
        };
        let path_refs: Vec<&[u16]> = wide_paths.iter().map(Vec::as_slice).collect();

        let raw = api
            .create_render_context(&path_refs, kind.flags())
            .map_err(|e| Error::platform("EvtCreateRenderContext", e))?;
        if !is_usable(raw) {
            return Err(Error::platform(
                "EvtCreateRenderContext",
                PlatformError::new(
                    evtlog_core::error::ERROR_INVALID_HANDLE,
                    "returned an unusable handle",
                ),
            ));
        }
        Ok(Self {
            handle: Handle::new(api, raw, HandleKind::RenderContext),
            kind,
        })
    }

    /// What this context extracts
    pub fn kind(&self) -> &RenderContextKind {
        &self.kind
    }

    /// Explicit paths; empty for `System` and `User`
    pub fn paths(&self) -> &[String] {
        match &self.kind {
            RenderContextKind::Values(paths) => paths.as_slice(),
            _ => &[],
        }
    }

    /// Raw value for passing to the platform
    pub fn raw(&self) -> Result<RawHandle> {
        self.handle.raw()
    }

    /// Render `event` with a one-off buffer
    ///
    /// Use a [`Renderer`] to reuse the buffer across many events.
    pub fn render(&self, event: &Event<'_>) -> Result<Vec<Variant>> {
        Renderer::new().render(self, event)
    }

    /// Release the context
    pub fn close(mut self) {
        self.handle.close();
    }
}

/// Renders events through a reusable, growable buffer
#[derive(Debug)]
pub struct Renderer {
    buffer: RenderBuffer,
    max_bytes: usize,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    /// Renderer with default sizes
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_RENDER_BUFFER_BYTES, DEFAULT_MAX_RENDER_BUFFER_BYTES)
    }

    /// Renderer starting at `initial_bytes`, never growing past `max_bytes`
    pub fn with_limits(initial_bytes: usize, max_bytes: usize) -> Self {
        Self {
            buffer: RenderBuffer::with_capacity(initial_bytes.min(max_bytes)),
            max_bytes,
        }
    }

    /// Current buffer size in bytes
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Render the values `context` selects from `event`
    ///
    /// Both must come from the same platform. A `Values` context yields
    /// exactly one value per path.
    pub fn render(&mut self, context: &RenderContext, event: &Event<'_>) -> Result<Vec<Variant>> {
        let ctx_raw = context.raw()?;
        let evt_raw = event.raw()?;
        let api = event.handle().api();
        if !same_platform(context.handle.api(), api) {
            return Err(Error::InvalidArgument(
                "render context and event belong to different platforms".to_string(),
            ));
        }

        loop {
            let outcome = api
                .render_values(ctx_raw, evt_raw, &mut self.buffer)
                .map_err(|e| Error::platform("EvtRender", e))?;
            match outcome {
                RenderOutcome::Rendered { count } => {
                    let header = self.buffer.header(count)?;
                    // SAFETY: `header` came from a successful render into
                    // `self.buffer`, which stays borrowed until decoding ends.
                    let values = unsafe { decode_values(header)? };
                    let expected = context.paths().len();
                    if expected > 0 && values.len() != expected {
                        return Err(malformed(format!(
                            "rendered {} values for {} paths",
                            values.len(),
                            expected
                        )));
                    }
                    trace!(raw = evt_raw, count, "rendered event values");
                    return Ok(values);
                }
                RenderOutcome::InsufficientBuffer { required } => {
                    if required <= self.buffer.len() {
                        return Err(malformed(format!(
                            "asked for {} bytes with {} available",
                            required,
                            self.buffer.len()
                        )));
                    }
                    if required > self.max_bytes {
                        warn!(
                            required,
                            max = self.max_bytes,
                            "render buffer would exceed its cap"
                        );
                        return Err(Error::platform(
                            "EvtRender",
                            PlatformError::new(
                                ERROR_INSUFFICIENT_BUFFER,
                                format!("{} bytes required, cap is {}", required, self.max_bytes),
                            ),
                        ));
                    }
                    trace!(from = self.buffer.len(), to = required, "growing render buffer");
                    self.buffer.grow_to(required);
                }
            }
        }
    }
}

fn same_platform(a: &Arc<dyn EvtApi>, b: &Arc<dyn EvtApi>) -> bool {
    // Data pointers only; vtable addresses are not unique.
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}
