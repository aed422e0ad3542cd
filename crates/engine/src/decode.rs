//! Decoding rendered values into [`Variant`]s
//!
//! The tag is decoded first and selects exactly one payload shape; no other
//! interpretation of the payload union is ever read. Every pointer payload is
//! copied into owned memory here, so nothing returned borrows the render
//! buffer.
//!
//! ## Payload Shapes
//!
//! | Kind | Scalar | Array element |
//! |------|--------|---------------|
//! | integers, floats, hex, `FileTime` | inline bits | contiguous values |
//! | `Boolean` | inline 32-bit BOOL | contiguous 32-bit BOOLs |
//! | `SizeT` | inline pointer-width | contiguous pointer-width |
//! | `String`, `EvtXml` | `*const u16` | table of `*const u16` |
//! | `AnsiString` | `*const c_char` | table of `*const c_char` |
//! | `Guid`, `SysTime` | pointer to struct | contiguous structs |
//! | `Sid` | pointer to binary SID | table of SID pointers |
//! | `Binary` | pointer, `count` bytes | (none) |

use std::ffi::{c_char, CStr};
use std::ptr;

use evtlog_core::error::ERROR_INVALID_DATA;
use evtlog_core::types::SID_MAX_SUB_AUTHORITIES;
use evtlog_core::{
    Error, FileTime, Guid, PlatformError, Result, Sid, SystemTime, Variant, VariantArray,
    VariantTag, VariantType,
};

use crate::platform::RawVariant;

/// Decode a run of rendered values, preserving order
///
/// # Safety
///
/// Every pointer payload in `raw` must satisfy the [`crate::EvtApi`] render
/// contract: readable for the size implied by its tag and count, strings
/// NUL-terminated, valid for the duration of this call.
pub unsafe fn decode_values(raw: &[RawVariant]) -> Result<Vec<Variant>> {
    raw.iter().map(|r| decode_variant(r)).collect()
}

/// Decode one rendered value
///
/// # Safety
///
/// As for [`decode_values`].
pub unsafe fn decode_variant(raw: &RawVariant) -> Result<Variant> {
    let tag = VariantTag::from_code(raw.kind)?;
    if tag.array {
        return decode_array(tag, raw).map(Variant::Array);
    }

    let bits = raw.value;
    let value = match tag.kind {
        VariantType::Null => Variant::Null,
        VariantType::String => Variant::String(read_wide(payload(raw, tag)?)),
        VariantType::AnsiString => Variant::AnsiString(read_ansi(payload(raw, tag)?)),
        VariantType::SByte => Variant::SByte(bits as u8 as i8),
        VariantType::Byte => Variant::Byte(bits as u8),
        VariantType::Int16 => Variant::Int16(bits as u16 as i16),
        VariantType::UInt16 => Variant::UInt16(bits as u16),
        VariantType::Int32 => Variant::Int32(bits as u32 as i32),
        VariantType::UInt32 => Variant::UInt32(bits as u32),
        VariantType::Int64 => Variant::Int64(bits as i64),
        VariantType::UInt64 => Variant::UInt64(bits),
        VariantType::Single => Variant::Single(f32::from_bits(bits as u32)),
        VariantType::Double => Variant::Double(f64::from_bits(bits)),
        VariantType::Boolean => Variant::Boolean(bits as u32 != 0),
        VariantType::Binary => Variant::Binary(elements::<u8>(raw, tag)?),
        VariantType::Guid => Variant::Guid(read_guid(payload(raw, tag)?)),
        VariantType::SizeT => Variant::SizeT(bits as usize as u64),
        VariantType::FileTime => Variant::FileTime(FileTime::from_ticks(bits)),
        VariantType::SysTime => {
            Variant::SysTime(ptr::read_unaligned(payload::<SystemTime>(raw, tag)?))
        }
        VariantType::Sid => Variant::Sid(read_sid(payload(raw, tag)?, tag)?),
        VariantType::HexInt32 => Variant::HexInt32(bits as u32),
        VariantType::HexInt64 => Variant::HexInt64(bits),
        VariantType::EvtHandle => Variant::EvtHandle(bits as usize as isize as i64),
        VariantType::EvtXml => Variant::EvtXml(read_wide(payload(raw, tag)?)),
    };
    Ok(value)
}

unsafe fn decode_array(tag: VariantTag, raw: &RawVariant) -> Result<VariantArray> {
    let array = match tag.kind {
        VariantType::String => VariantArray::String(wide_table(raw, tag)?),
        VariantType::EvtXml => VariantArray::EvtXml(wide_table(raw, tag)?),
        VariantType::AnsiString => VariantArray::AnsiString(
            elements::<*const c_char>(raw, tag)?
                .into_iter()
                .map(|p| non_null(p, tag).map(|p| read_ansi(p)))
                .collect::<Result<_>>()?,
        ),
        VariantType::SByte => VariantArray::SByte(elements(raw, tag)?),
        VariantType::Byte => VariantArray::Byte(elements(raw, tag)?),
        VariantType::Int16 => VariantArray::Int16(elements(raw, tag)?),
        VariantType::UInt16 => VariantArray::UInt16(elements(raw, tag)?),
        VariantType::Int32 => VariantArray::Int32(elements(raw, tag)?),
        VariantType::UInt32 => VariantArray::UInt32(elements(raw, tag)?),
        VariantType::Int64 => VariantArray::Int64(elements(raw, tag)?),
        VariantType::UInt64 => VariantArray::UInt64(elements(raw, tag)?),
        VariantType::Single => VariantArray::Single(elements(raw, tag)?),
        VariantType::Double => VariantArray::Double(elements(raw, tag)?),
        VariantType::Boolean => VariantArray::Boolean(
            elements::<i32>(raw, tag)?.into_iter().map(|b| b != 0).collect(),
        ),
        VariantType::Guid => VariantArray::Guid(
            elements::<[u8; 16]>(raw, tag)?
                .iter()
                .map(Guid::from_le_bytes)
                .collect(),
        ),
        VariantType::SizeT => VariantArray::SizeT(
            elements::<usize>(raw, tag)?
                .into_iter()
                .map(|v| v as u64)
                .collect(),
        ),
        VariantType::FileTime => VariantArray::FileTime(
            elements::<u64>(raw, tag)?
                .into_iter()
                .map(FileTime::from_ticks)
                .collect(),
        ),
        VariantType::SysTime => VariantArray::SysTime(elements(raw, tag)?),
        VariantType::Sid => VariantArray::Sid(
            elements::<*const u8>(raw, tag)?
                .into_iter()
                .map(|p| read_sid(non_null(p, tag)?, tag))
                .collect::<Result<_>>()?,
        ),
        VariantType::HexInt32 => VariantArray::HexInt32(elements(raw, tag)?),
        VariantType::HexInt64 => VariantArray::HexInt64(elements(raw, tag)?),
        // VariantTag::from_code never sets the array flag on these
        VariantType::Null | VariantType::Binary | VariantType::EvtHandle => {
            return Err(Error::UnknownVariantType { tag: raw.kind })
        }
    };
    Ok(array)
}

/// Error for a render buffer that breaks the platform's layout rules
pub(crate) fn malformed(detail: impl Into<String>) -> Error {
    Error::platform(
        "EvtRender",
        PlatformError::new(ERROR_INVALID_DATA, detail.into()),
    )
}

fn non_null<T>(p: *const T, tag: VariantTag) -> Result<*const T> {
    if p.is_null() {
        Err(malformed(format!("{} value has a null payload pointer", tag)))
    } else {
        Ok(p)
    }
}

fn payload<T>(raw: &RawVariant, tag: VariantTag) -> Result<*const T> {
    non_null(raw.value as usize as *const T, tag)
}

/// Copy `raw.count` contiguous elements out of the payload
unsafe fn elements<T: Copy>(raw: &RawVariant, tag: VariantTag) -> Result<Vec<T>> {
    let count = raw.count as usize;
    if count == 0 {
        return Ok(Vec::new());
    }
    let base = payload::<T>(raw, tag)?;
    Ok((0..count).map(|i| ptr::read_unaligned(base.add(i))).collect())
}

unsafe fn wide_table(raw: &RawVariant, tag: VariantTag) -> Result<Vec<String>> {
    elements::<*const u16>(raw, tag)?
        .into_iter()
        .map(|p| non_null(p, tag).map(|p| read_wide(p)))
        .collect()
}

unsafe fn read_wide(p: *const u16) -> String {
    let mut units = Vec::new();
    loop {
        let unit = ptr::read_unaligned(p.add(units.len()));
        if unit == 0 {
            break;
        }
        units.push(unit);
    }
    String::from_utf16_lossy(&units)
}

unsafe fn read_ansi(p: *const c_char) -> String {
    CStr::from_ptr(p).to_string_lossy().into_owned()
}

unsafe fn read_guid(p: *const [u8; 16]) -> Guid {
    Guid::from_le_bytes(&ptr::read_unaligned(p))
}

unsafe fn read_sid(p: *const u8, tag: VariantTag) -> Result<Sid> {
    let header = std::slice::from_raw_parts(p, 8);
    let count = Sid::sub_authority_count(header).unwrap_or(0);
    if count > SID_MAX_SUB_AUTHORITIES {
        return Err(malformed(format!(
            "{} value has {} sub-authorities",
            tag, count
        )));
    }
    let bytes = std::slice::from_raw_parts(p, Sid::byte_len_for(count));
    Sid::from_bytes(bytes).map_err(|e| malformed(e.to_string()))
}
