//! Event log engine for evtlog
//!
//! This crate owns every interaction with the platform event log service:
//! - [`EvtApi`]: the platform seam, with simulated and Windows implementations
//! - [`Handle`]: owned handles with idempotent release
//! - [`Session`], [`ResultSet`], [`EventBatch`], [`Event`]: the ownership chain
//! - [`RenderContext`], [`Renderer`]: value extraction and variant decoding
//!
//! Children borrow their parents (`ResultSet<'s>` borrows its session,
//! `EventBatch<'r>` its result set), so release order is enforced at
//! compile time.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod decode;
pub mod handle;
pub mod platform;
pub mod query;
pub mod render;
pub mod session;
pub mod sim;
pub mod wide;
#[cfg(windows)]
pub mod windows;

pub use batch::{Event, EventBatch};
pub use handle::{Handle, HandleKind};
pub use platform::{EvtApi, RawHandle, RawVariant, RenderBuffer, RenderOutcome};
pub use query::{Batches, QueryFlags, ResultSet, ResultSetKind, SubscribeFrom, DEFAULT_TIMEOUT};
pub use render::{RenderContext, RenderContextKind, Renderer};
pub use session::Session;
pub use sim::SimulatedPlatform;
#[cfg(windows)]
pub use windows::WindowsPlatform;
