//! Convenient imports for evtlog.
//!
//! ```
//! use evtlog::prelude::*;
//!
//! let flags = QueryFlags::CHANNEL_PATH | QueryFlags::REVERSE_DIRECTION;
//! assert!(flags.contains(QueryFlags::REVERSE_DIRECTION));
//! ```

// Main entry point
pub use crate::config::Config;
pub use crate::event_log::{EventLog, EventLogBuilder};

// Error handling
pub use crate::error::{Error, Result};

// Handles
pub use crate::types::{Event, EventBatch, RenderContext, ResultSet, Session};

// Options
pub use crate::types::{QueryFlags, RenderContextKind, SubscribeFrom};

// Values
pub use crate::types::{FileTime, Guid, Sid, SystemTime, Variant, VariantArray, VariantType};

// Simulation
pub use crate::types::{SimEvent, SimulatedPlatform};
