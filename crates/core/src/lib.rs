//! Core types for evtlog
//!
//! This crate defines the platform-independent half of the event log access
//! layer:
//! - [`Variant`] / [`VariantArray`]: the closed, owned model of a rendered field
//! - [`VariantType`] / [`VariantTag`]: the platform's numeric type tags
//! - [`FileTime`], [`SystemTime`], [`Guid`], [`Sid`]: structured payloads
//! - [`Error`] / [`PlatformError`]: the error taxonomy shared by every layer

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod types;
pub mod value;
pub mod variant_type;

pub use error::{Error, PlatformError, Result};
pub use types::{FileTime, Guid, Sid, SystemTime};
pub use value::{Variant, VariantArray};
pub use variant_type::{VariantTag, VariantType, ARRAY_FLAG, TYPE_MASK};
