//! Decoded field values
//!
//! This module defines [`Variant`], the owned, strongly-typed form of one
//! rendered event field.
//!
//! ## Contract
//!
//! - The payload shape is fully determined by the tag: one enum variant per
//!   scalar kind, plus [`Variant::Array`] wrapping one [`VariantArray`]
//!   variant per array kind
//! - No implicit coercions: `Int32(1)` != `UInt32(1)`, `String` != `AnsiString`
//! - A Variant owns all of its data; nothing points back into platform memory

use crate::types::{FileTime, Guid, Sid, SystemTime};
use crate::variant_type::{VariantTag, VariantType};
use serde::{Deserialize, Serialize};

/// One decoded event field
///
/// ## Equality Rules
///
/// - Different kinds are NEVER equal
/// - Floats use IEEE-754 equality: `NaN != NaN`, `-0.0 == 0.0`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Variant {
    /// No value; a requested path did not match
    Null,
    /// UTF-16 string, transcoded
    String(String),
    /// Narrow string, transcoded
    AnsiString(String),
    /// Signed 8-bit integer
    SByte(i8),
    /// Unsigned 8-bit integer
    Byte(u8),
    /// Signed 16-bit integer
    Int16(i16),
    /// Unsigned 16-bit integer
    UInt16(u16),
    /// Signed 32-bit integer
    Int32(i32),
    /// Unsigned 32-bit integer
    UInt32(u32),
    /// Signed 64-bit integer
    Int64(i64),
    /// Unsigned 64-bit integer
    UInt64(u64),
    /// 32-bit float
    Single(f32),
    /// 64-bit float
    Double(f64),
    /// Boolean
    Boolean(bool),
    /// Byte blob
    Binary(Vec<u8>),
    /// GUID
    Guid(Guid),
    /// Pointer-sized unsigned integer, widened
    SizeT(u64),
    /// 100ns ticks since 1601
    FileTime(FileTime),
    /// Calendar time
    SysTime(SystemTime),
    /// Security identifier
    Sid(Sid),
    /// 32-bit integer displayed as hex
    HexInt32(u32),
    /// 64-bit integer displayed as hex
    HexInt64(u64),
    /// Raw value of a nested platform handle
    ///
    /// The handle is owned by the platform and is not released by this crate.
    EvtHandle(i64),
    /// XML fragment
    EvtXml(String),
    /// Array of one kind
    Array(VariantArray),
}

/// Owned array payloads, one per array-capable kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VariantArray {
    /// Array of strings
    String(Vec<String>),
    /// Array of narrow strings
    AnsiString(Vec<String>),
    /// Array of signed bytes
    SByte(Vec<i8>),
    /// Array of bytes
    Byte(Vec<u8>),
    /// Array of i16
    Int16(Vec<i16>),
    /// Array of u16
    UInt16(Vec<u16>),
    /// Array of i32
    Int32(Vec<i32>),
    /// Array of u32
    UInt32(Vec<u32>),
    /// Array of i64
    Int64(Vec<i64>),
    /// Array of u64
    UInt64(Vec<u64>),
    /// Array of f32
    Single(Vec<f32>),
    /// Array of f64
    Double(Vec<f64>),
    /// Array of booleans
    Boolean(Vec<bool>),
    /// Array of GUIDs
    Guid(Vec<Guid>),
    /// Array of pointer-sized integers
    SizeT(Vec<u64>),
    /// Array of file times
    FileTime(Vec<FileTime>),
    /// Array of calendar times
    SysTime(Vec<SystemTime>),
    /// Array of SIDs
    Sid(Vec<Sid>),
    /// Array of hex u32
    HexInt32(Vec<u32>),
    /// Array of hex u64
    HexInt64(Vec<u64>),
    /// Array of XML fragments
    EvtXml(Vec<String>),
}

impl VariantArray {
    /// Element kind
    pub fn kind(&self) -> VariantType {
        match self {
            VariantArray::String(_) => VariantType::String,
            VariantArray::AnsiString(_) => VariantType::AnsiString,
            VariantArray::SByte(_) => VariantType::SByte,
            VariantArray::Byte(_) => VariantType::Byte,
            VariantArray::Int16(_) => VariantType::Int16,
            VariantArray::UInt16(_) => VariantType::UInt16,
            VariantArray::Int32(_) => VariantType::Int32,
            VariantArray::UInt32(_) => VariantType::UInt32,
            VariantArray::Int64(_) => VariantType::Int64,
            VariantArray::UInt64(_) => VariantType::UInt64,
            VariantArray::Single(_) => VariantType::Single,
            VariantArray::Double(_) => VariantType::Double,
            VariantArray::Boolean(_) => VariantType::Boolean,
            VariantArray::Guid(_) => VariantType::Guid,
            VariantArray::SizeT(_) => VariantType::SizeT,
            VariantArray::FileTime(_) => VariantType::FileTime,
            VariantArray::SysTime(_) => VariantType::SysTime,
            VariantArray::Sid(_) => VariantType::Sid,
            VariantArray::HexInt32(_) => VariantType::HexInt32,
            VariantArray::HexInt64(_) => VariantType::HexInt64,
            VariantArray::EvtXml(_) => VariantType::EvtXml,
        }
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        match self {
            VariantArray::String(v) | VariantArray::AnsiString(v) | VariantArray::EvtXml(v) => {
                v.len()
            }
            VariantArray::SByte(v) => v.len(),
            VariantArray::Byte(v) => v.len(),
            VariantArray::Int16(v) => v.len(),
            VariantArray::UInt16(v) => v.len(),
            VariantArray::Int32(v) => v.len(),
            VariantArray::UInt32(v) | VariantArray::HexInt32(v) => v.len(),
            VariantArray::Int64(v) => v.len(),
            VariantArray::UInt64(v) | VariantArray::SizeT(v) | VariantArray::HexInt64(v) => {
                v.len()
            }
            VariantArray::Single(v) => v.len(),
            VariantArray::Double(v) => v.len(),
            VariantArray::Boolean(v) => v.len(),
            VariantArray::Guid(v) => v.len(),
            VariantArray::FileTime(v) => v.len(),
            VariantArray::SysTime(v) => v.len(),
            VariantArray::Sid(v) => v.len(),
        }
    }

    /// Check if the array has no elements
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Variant {
    /// The tag this value was decoded from (or would encode to)
    pub fn tag(&self) -> VariantTag {
        let kind = match self {
            Variant::Null => VariantType::Null,
            Variant::String(_) => VariantType::String,
            Variant::AnsiString(_) => VariantType::AnsiString,
            Variant::SByte(_) => VariantType::SByte,
            Variant::Byte(_) => VariantType::Byte,
            Variant::Int16(_) => VariantType::Int16,
            Variant::UInt16(_) => VariantType::UInt16,
            Variant::Int32(_) => VariantType::Int32,
            Variant::UInt32(_) => VariantType::UInt32,
            Variant::Int64(_) => VariantType::Int64,
            Variant::UInt64(_) => VariantType::UInt64,
            Variant::Single(_) => VariantType::Single,
            Variant::Double(_) => VariantType::Double,
            Variant::Boolean(_) => VariantType::Boolean,
            Variant::Binary(_) => VariantType::Binary,
            Variant::Guid(_) => VariantType::Guid,
            Variant::SizeT(_) => VariantType::SizeT,
            Variant::FileTime(_) => VariantType::FileTime,
            Variant::SysTime(_) => VariantType::SysTime,
            Variant::Sid(_) => VariantType::Sid,
            Variant::HexInt32(_) => VariantType::HexInt32,
            Variant::HexInt64(_) => VariantType::HexInt64,
            Variant::EvtHandle(_) => VariantType::EvtHandle,
            Variant::EvtXml(_) => VariantType::EvtXml,
            Variant::Array(a) => return VariantTag::array_of(a.kind()),
        };
        VariantTag::scalar(kind)
    }

    /// Base kind, ignoring the array flag
    pub fn kind(&self) -> VariantType {
        self.tag().kind
    }

    /// Element count as the platform reports it
    ///
    /// Scalars report 1, arrays their length, binary blobs their byte length.
    pub fn count(&self) -> usize {
        match self {
            Variant::Array(a) => a.len(),
            Variant::Binary(b) => b.len(),
            _ => 1,
        }
    }

    /// Check if this value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Variant::Null)
    }

    /// Check if this value is an array
    pub fn is_array(&self) -> bool {
        matches!(self, Variant::Array(_))
    }

    /// Try to get as a string slice (String, AnsiString and EvtXml)
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Variant::String(s) | Variant::AnsiString(s) | Variant::EvtXml(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Variant::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get any signed integer kind, widened to i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Variant::SByte(v) => Some(i64::from(*v)),
            Variant::Int16(v) => Some(i64::from(*v)),
            Variant::Int32(v) => Some(i64::from(*v)),
            Variant::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get any unsigned integer kind, widened to u64
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Variant::Byte(v) => Some(u64::from(*v)),
            Variant::UInt16(v) => Some(u64::from(*v)),
            Variant::UInt32(v) | Variant::HexInt32(v) => Some(u64::from(*v)),
            Variant::UInt64(v) | Variant::HexInt64(v) | Variant::SizeT(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as f64 (Single is widened)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Variant::Single(v) => Some(f64::from(*v)),
            Variant::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as bytes slice
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Variant::Binary(b) => Some(b),
            _ => None,
        }
    }

    /// Try to get as a GUID
    pub fn as_guid(&self) -> Option<&Guid> {
        match self {
            Variant::Guid(g) => Some(g),
            _ => None,
        }
    }

    /// Try to get as a file time
    pub fn as_filetime(&self) -> Option<FileTime> {
        match self {
            Variant::FileTime(t) => Some(*t),
            _ => None,
        }
    }

    /// Try to get as a calendar time
    pub fn as_systime(&self) -> Option<&SystemTime> {
        match self {
            Variant::SysTime(t) => Some(t),
            _ => None,
        }
    }

    /// Try to get as a SID
    pub fn as_sid(&self) -> Option<&Sid> {
        match self {
            Variant::Sid(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as an array
    pub fn as_array(&self) -> Option<&VariantArray> {
        match self {
            Variant::Array(a) => Some(a),
            _ => None,
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Variant::Null => write!(f, "null"),
            Variant::String(s) | Variant::AnsiString(s) | Variant::EvtXml(s) => write!(f, "{}", s),
            Variant::SByte(v) => write!(f, "{}", v),
            Variant::Byte(v) => write!(f, "{}", v),
            Variant::Int16(v) => write!(f, "{}", v),
            Variant::UInt16(v) => write!(f, "{}", v),
            Variant::Int32(v) => write!(f, "{}", v),
            Variant::UInt32(v) => write!(f, "{}", v),
            Variant::Int64(v) => write!(f, "{}", v),
            Variant::UInt64(v) | Variant::SizeT(v) => write!(f, "{}", v),
            Variant::Single(v) => write!(f, "{}", v),
            Variant::Double(v) => write!(f, "{}", v),
            Variant::Boolean(v) => write!(f, "{}", v),
            Variant::Binary(b) => {
                for byte in b {
                    write!(f, "{:02X}", byte)?;
                }
                Ok(())
            }
            Variant::Guid(g) => write!(f, "{}", g),
            Variant::FileTime(t) => match t.to_datetime() {
                Some(dt) => write!(f, "{}", dt.to_rfc3339()),
                None => write!(f, "{}", t.ticks()),
            },
            Variant::SysTime(t) => match t.to_naive() {
                Some(dt) => write!(f, "{}", dt),
                None => write!(f, "{:?}", t),
            },
            Variant::Sid(s) => write!(f, "{}", s),
            Variant::HexInt32(v) => write!(f, "{:#x}", v),
            Variant::HexInt64(v) => write!(f, "{:#x}", v),
            Variant::EvtHandle(h) => write!(f, "handle({:#x})", h),
            Variant::Array(a) => write!(f, "{}[{}]", a.kind(), a.len()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_scalars() -> Vec<Variant> {
        vec![
            Variant::Null,
            Variant::String("Security".into()),
            Variant::AnsiString("narrow".into()),
            Variant::SByte(-3),
            Variant::Byte(4),
            Variant::Int16(-5),
            Variant::UInt16(6),
            Variant::Int32(-7),
            Variant::UInt32(8),
            Variant::Int64(-9),
            Variant::UInt64(10),
            Variant::Single(1.5),
            Variant::Double(2.5),
            Variant::Boolean(true),
            Variant::Binary(vec![0xde, 0xad]),
            Variant::Guid(Guid::default()),
            Variant::SizeT(16),
            Variant::FileTime(FileTime(0)),
            Variant::SysTime(SystemTime::default()),
            Variant::Sid("S-1-5-18".parse().unwrap()),
            Variant::HexInt32(0x20),
            Variant::HexInt64(0x21),
            Variant::EvtHandle(0x22),
            Variant::EvtXml("<Event/>".into()),
        ]
    }

    mod tag_tests {
        use super::*;

        #[test]
        fn test_every_scalar_kind_has_distinct_tag() {
            let mut kinds: Vec<VariantType> = sample_scalars().iter().map(|v| v.kind()).collect();
            assert_eq!(kinds.len(), VariantType::ALL.len());
            kinds.dedup();
            assert_eq!(kinds.len(), VariantType::ALL.len());
        }

        #[test]
        fn test_scalar_tags_are_not_arrays() {
            for v in sample_scalars() {
                assert!(!v.tag().array, "{:?}", v);
                assert!(!v.is_array());
            }
        }

        #[test]
        fn test_array_tag_carries_element_kind() {
            let v = Variant::Array(VariantArray::UInt16(vec![1, 2, 3]));
            assert_eq!(v.tag(), VariantTag::array_of(VariantType::UInt16));
            assert_eq!(v.tag().code(), 6 | 0x80);
            assert_eq!(v.count(), 3);
        }

        #[test]
        fn test_hex_arrays_keep_their_kind() {
            let v = Variant::Array(VariantArray::HexInt64(vec![1]));
            assert_eq!(v.kind(), VariantType::HexInt64);
        }
    }

    mod accessor_tests {
        use super::*;

        #[test]
        fn test_as_str_covers_text_kinds() {
            assert_eq!(Variant::String("a".into()).as_str(), Some("a"));
            assert_eq!(Variant::AnsiString("b".into()).as_str(), Some("b"));
            assert_eq!(Variant::EvtXml("<c/>".into()).as_str(), Some("<c/>"));
            assert_eq!(Variant::Int32(1).as_str(), None);
        }

        #[test]
        fn test_integer_widening() {
            assert_eq!(Variant::SByte(-1).as_i64(), Some(-1));
            assert_eq!(Variant::Int16(i16::MIN).as_i64(), Some(i64::from(i16::MIN)));
            assert_eq!(Variant::UInt32(u32::MAX).as_u64(), Some(u64::from(u32::MAX)));
            assert_eq!(Variant::HexInt32(7).as_u64(), Some(7));
            assert_eq!(Variant::UInt32(1).as_i64(), None);
            assert_eq!(Variant::Int32(1).as_u64(), None);
        }

        #[test]
        fn test_binary_count_is_byte_length() {
            assert_eq!(Variant::Binary(vec![1, 2, 3, 4]).count(), 4);
            assert_eq!(Variant::UInt64(1).count(), 1);
        }

        #[test]
        fn test_is_null() {
            assert!(Variant::Null.is_null());
            assert!(!Variant::String(String::new()).is_null());
        }
    }

    mod equality_tests {
        use super::*;

        #[test]
        fn test_no_cross_kind_equality() {
            assert_ne!(Variant::Int32(1), Variant::UInt32(1));
            assert_ne!(Variant::UInt32(1), Variant::HexInt32(1));
            assert_ne!(Variant::String("a".into()), Variant::AnsiString("a".into()));
            assert_ne!(Variant::Null, Variant::String(String::new()));
        }

        #[test]
        fn test_nan_not_equal() {
            assert_ne!(Variant::Double(f64::NAN), Variant::Double(f64::NAN));
            assert_eq!(Variant::Double(-0.0), Variant::Double(0.0));
        }

        #[test]
        fn test_empty_array_not_null() {
            assert_ne!(Variant::Array(VariantArray::Int32(vec![])), Variant::Null);
        }
    }

    mod display_tests {
        use super::*;

        #[test]
        fn test_display_formats() {
            assert_eq!(Variant::HexInt32(255).to_string(), "0xff");
            assert_eq!(Variant::Binary(vec![0xde, 0xad]).to_string(), "DEAD");
            assert_eq!(Variant::Null.to_string(), "null");
            assert_eq!(
                Variant::FileTime(FileTime(116_444_736_000_000_000)).to_string(),
                "1970-01-01T00:00:00+00:00"
            );
            assert_eq!(
                Variant::Array(VariantArray::String(vec!["a".into()])).to_string(),
                "String[1]"
            );
        }
    }

    mod serde_tests {
        use super::*;

        #[test]
        fn test_json_roundtrip_preserves_kind() {
            for v in sample_scalars() {
                let json = serde_json::to_string(&v).unwrap();
                let back: Variant = serde_json::from_str(&json).unwrap();
                assert_eq!(back.tag(), v.tag());
            }
        }
    }
}
