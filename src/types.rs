//! Public types for the evtlog API.
//!
//! This module re-exports types from internal crates with a clean public interface.

// Rendered values
pub use evtlog_core::{Variant, VariantArray};
pub use evtlog_core::{VariantTag, VariantType};

// Structured payloads
pub use evtlog_core::{FileTime, Guid, Sid, SystemTime};

// Handles and the ownership chain
pub use evtlog_engine::{Event, EventBatch, Handle, HandleKind, ResultSet, Session};

// Query and subscription options
pub use evtlog_engine::{Batches, QueryFlags, ResultSetKind, SubscribeFrom, DEFAULT_TIMEOUT};

// Rendering
pub use evtlog_engine::{RenderContext, RenderContextKind, Renderer};

// Platform
pub use evtlog_engine::EvtApi;
pub use evtlog_engine::sim::{Misuse, SimCall, SimEvent, SimulatedPlatform};
#[cfg(windows)]
pub use evtlog_engine::WindowsPlatform;
