//! # evtlog
//!
//! Typed, leak-proof access to the platform event log service.
//!
//! evtlog queries channels and log files, pulls events in batches, follows
//! live channels through pull subscriptions, and renders events into owned
//! [`Variant`] values or XML. Every platform handle is owned exactly once and
//! released exactly once.
//!
//! ## Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use evtlog::prelude::*;
//!
//! let sim = Arc::new(SimulatedPlatform::new());
//! sim.add_channel("Application", (1..=4).map(|id| SimEvent::record("Application", id)));
//!
//! let log = EventLog::simulated(sim.clone())?;
//! let context = log.render_context(RenderContextKind::System)?;
//! let result_set = log.query(None, "Application", "*", QueryFlags::CHANNEL_PATH)?;
//!
//! for batch in log.batches(&result_set) {
//!     for event in &batch? {
//!         let values = log.render(&context, event)?;
//!         assert_eq!(values.len(), 8);
//!     }
//! }
//!
//! drop(result_set);
//! drop(context);
//! assert_eq!(sim.open_handles(), 0);
//! # Ok::<(), evtlog::Error>(())
//! ```
//!
//! ## Ownership
//!
//! - [`Session`] owns a remote connection
//! - [`ResultSet`] borrows its session and yields [`EventBatch`]es
//! - [`EventBatch`] borrows its result set and owns its [`Event`]s
//! - [`RenderContext`] is independent of any result set
//!
//! The borrow checker rejects closing a parent while a child is alive.

#![warn(missing_docs)]

mod config;
mod error;
mod event_log;
mod types;

pub mod prelude;

// Re-export main entry points
pub use config::Config;
pub use error::{Error, Result};
pub use event_log::{EventLog, EventLogBuilder};

// Re-export types
pub use types::*;
