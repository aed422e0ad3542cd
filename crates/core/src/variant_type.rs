//! Variant type tags
//!
//! Every value the platform renders carries a numeric type tag. The low seven
//! bits name the base kind; bit 7 marks an array of that kind.
//!
//! ## Tag Codes
//!
//! | Kind | Code | Array form |
//! |------|------|------------|
//! | Null | 0 | no |
//! | String | 1 | yes |
//! | AnsiString | 2 | yes |
//! | SByte | 3 | yes |
//! | Byte | 4 | yes |
//! | Int16 | 5 | yes |
//! | UInt16 | 6 | yes |
//! | Int32 | 7 | yes |
//! | UInt32 | 8 | yes |
//! | Int64 | 9 | yes |
//! | UInt64 | 10 | yes |
//! | Single | 11 | yes |
//! | Double | 12 | yes |
//! | Boolean | 13 | yes |
//! | Binary | 14 | no |
//! | Guid | 15 | yes |
//! | SizeT | 16 | yes |
//! | FileTime | 17 | yes |
//! | SysTime | 18 | yes |
//! | Sid | 19 | yes |
//! | HexInt32 | 20 | yes |
//! | HexInt64 | 21 | yes |
//! | EvtHandle | 32 | no |
//! | EvtXml | 35 | yes |

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Bit set on a tag when the value is an array.
pub const ARRAY_FLAG: u32 = 0x80;

/// Mask selecting the base kind out of a tag.
pub const TYPE_MASK: u32 = 0x7f;

/// Base kind of a rendered value
///
/// This enum is exhaustive over the kinds the platform can render. Anything
/// else is reported as [`Error::UnknownVariantType`], never coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariantType {
    /// No value (unmatched path)
    Null,
    /// UTF-16 string
    String,
    /// Narrow (code page) string
    AnsiString,
    /// Signed 8-bit integer
    SByte,
    /// Unsigned 8-bit integer
    Byte,
    /// Signed 16-bit integer
    Int16,
    /// Unsigned 16-bit integer
    UInt16,
    /// Signed 32-bit integer
    Int32,
    /// Unsigned 32-bit integer
    UInt32,
    /// Signed 64-bit integer
    Int64,
    /// Unsigned 64-bit integer
    UInt64,
    /// 32-bit float
    Single,
    /// 64-bit float
    Double,
    /// 32-bit boolean
    Boolean,
    /// Byte blob
    Binary,
    /// 128-bit GUID
    Guid,
    /// Pointer-sized unsigned integer
    SizeT,
    /// 100ns ticks since 1601
    FileTime,
    /// Broken-down calendar time
    SysTime,
    /// Security identifier
    Sid,
    /// 32-bit integer displayed as hex
    HexInt32,
    /// 64-bit integer displayed as hex
    HexInt64,
    /// Nested platform handle
    EvtHandle,
    /// XML fragment
    EvtXml,
}

impl VariantType {
    /// All kinds (for iteration)
    pub const ALL: [VariantType; 24] = [
        VariantType::Null,
        VariantType::String,
        VariantType::AnsiString,
        VariantType::SByte,
        VariantType::Byte,
        VariantType::Int16,
        VariantType::UInt16,
        VariantType::Int32,
        VariantType::UInt32,
        VariantType::Int64,
        VariantType::UInt64,
        VariantType::Single,
        VariantType::Double,
        VariantType::Boolean,
        VariantType::Binary,
        VariantType::Guid,
        VariantType::SizeT,
        VariantType::FileTime,
        VariantType::SysTime,
        VariantType::Sid,
        VariantType::HexInt32,
        VariantType::HexInt64,
        VariantType::EvtHandle,
        VariantType::EvtXml,
    ];

    /// Numeric base code as used by the platform
    pub const fn code(&self) -> u32 {
        match self {
            VariantType::Null => 0,
            VariantType::String => 1,
            VariantType::AnsiString => 2,
            VariantType::SByte => 3,
            VariantType::Byte => 4,
            VariantType::Int16 => 5,
            VariantType::UInt16 => 6,
            VariantType::Int32 => 7,
            VariantType::UInt32 => 8,
            VariantType::Int64 => 9,
            VariantType::UInt64 => 10,
            VariantType::Single => 11,
            VariantType::Double => 12,
            VariantType::Boolean => 13,
            VariantType::Binary => 14,
            VariantType::Guid => 15,
            VariantType::SizeT => 16,
            VariantType::FileTime => 17,
            VariantType::SysTime => 18,
            VariantType::Sid => 19,
            VariantType::HexInt32 => 20,
            VariantType::HexInt64 => 21,
            VariantType::EvtHandle => 32,
            VariantType::EvtXml => 35,
        }
    }

    /// Parse a base code (array flag already stripped)
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.code() == code)
    }

    /// Human-readable name
    pub const fn name(&self) -> &'static str {
        match self {
            VariantType::Null => "Null",
            VariantType::String => "String",
            VariantType::AnsiString => "AnsiString",
            VariantType::SByte => "SByte",
            VariantType::Byte => "Byte",
            VariantType::Int16 => "Int16",
            VariantType::UInt16 => "UInt16",
            VariantType::Int32 => "Int32",
            VariantType::UInt32 => "UInt32",
            VariantType::Int64 => "Int64",
            VariantType::UInt64 => "UInt64",
            VariantType::Single => "Single",
            VariantType::Double => "Double",
            VariantType::Boolean => "Boolean",
            VariantType::Binary => "Binary",
            VariantType::Guid => "Guid",
            VariantType::SizeT => "SizeT",
            VariantType::FileTime => "FileTime",
            VariantType::SysTime => "SysTime",
            VariantType::Sid => "Sid",
            VariantType::HexInt32 => "HexInt32",
            VariantType::HexInt64 => "HexInt64",
            VariantType::EvtHandle => "EvtHandle",
            VariantType::EvtXml => "EvtXml",
        }
    }

    /// Whether the platform can deliver an array of this kind
    pub const fn has_array_form(&self) -> bool {
        !matches!(
            self,
            VariantType::Null | VariantType::Binary | VariantType::EvtHandle
        )
    }
}

impl std::fmt::Display for VariantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A full type tag: base kind plus the array flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariantTag {
    /// Base kind
    pub kind: VariantType,
    /// Whether the value is an array of `kind`
    pub array: bool,
}

impl VariantTag {
    /// Scalar tag
    pub const fn scalar(kind: VariantType) -> Self {
        Self { kind, array: false }
    }

    /// Array tag
    pub const fn array_of(kind: VariantType) -> Self {
        Self { kind, array: true }
    }

    /// Decode a raw tag as found in a rendered value
    ///
    /// Bits outside `TYPE_MASK | ARRAY_FLAG`, unknown base codes, and the
    /// array flag on a kind with no array form all fail.
    pub fn from_code(code: u32) -> Result<Self> {
        if code & !(TYPE_MASK | ARRAY_FLAG) != 0 {
            return Err(Error::UnknownVariantType { tag: code });
        }
        let kind =
            VariantType::from_code(code & TYPE_MASK).ok_or(Error::UnknownVariantType { tag: code })?;
        let array = code & ARRAY_FLAG != 0;
        if array && !kind.has_array_form() {
            return Err(Error::UnknownVariantType { tag: code });
        }
        Ok(Self { kind, array })
    }

    /// Encode back to the raw tag
    pub const fn code(&self) -> u32 {
        if self.array {
            self.kind.code() | ARRAY_FLAG
        } else {
            self.kind.code()
        }
    }
}

impl std::fmt::Display for VariantTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.array {
            write!(f, "{}[]", self.kind.name())
        } else {
            write!(f, "{}", self.kind.name())
        }
    }
}
