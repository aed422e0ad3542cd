//! Platform value types
//!
//! This module defines the structured payloads a rendered value can carry:
//! - [`FileTime`]: 100ns ticks since 1601-01-01 UTC
//! - [`SystemTime`]: broken-down calendar time
//! - [`Guid`]: 128-bit identifier in platform field layout
//! - [`Sid`]: variable-length security identifier

use crate::error::{Error, Result};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Seconds between 1601-01-01 and 1970-01-01
const EPOCH_DIFFERENCE_SECS: i64 = 11_644_473_600;

/// Ticks (100ns) per second
const TICKS_PER_SECOND: u64 = 10_000_000;

/// Time as 100-nanosecond ticks since 1601-01-01 UTC
///
/// # Examples
///
/// ```
/// use evtlog_core::FileTime;
///
/// let ft = FileTime::from_ticks(116_444_736_000_000_000);
/// assert_eq!(ft.to_datetime().unwrap().timestamp(), 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileTime(pub u64);

impl FileTime {
    /// Wrap raw ticks
    pub const fn from_ticks(ticks: u64) -> Self {
        FileTime(ticks)
    }

    /// Raw ticks
    pub const fn ticks(&self) -> u64 {
        self.0
    }

    /// Convert to a UTC timestamp
    ///
    /// Returns `None` when the value falls outside chrono's range.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        let secs = (self.0 / TICKS_PER_SECOND) as i64 - EPOCH_DIFFERENCE_SECS;
        let nanos = ((self.0 % TICKS_PER_SECOND) * 100) as u32;
        DateTime::from_timestamp(secs, nanos)
    }

    /// Convert from a UTC timestamp
    ///
    /// Returns `None` for instants before 1601.
    pub fn from_datetime(dt: DateTime<Utc>) -> Option<Self> {
        let secs = dt.timestamp().checked_add(EPOCH_DIFFERENCE_SECS)?;
        if secs < 0 {
            return None;
        }
        let ticks = (secs as u64)
            .checked_mul(TICKS_PER_SECOND)?
            .checked_add(u64::from(dt.timestamp_subsec_nanos()) / 100)?;
        Some(FileTime(ticks))
    }
}

/// Broken-down calendar time, as laid out by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(C)]
pub struct SystemTime {
    /// Year (1601..=30827)
    pub year: u16,
    /// Month (1..=12)
    pub month: u16,
    /// Day of week (0 = Sunday)
    pub day_of_week: u16,
    /// Day of month (1..=31)
    pub day: u16,
    /// Hour (0..=23)
    pub hour: u16,
    /// Minute (0..=59)
    pub minute: u16,
    /// Second (0..=59)
    pub second: u16,
    /// Milliseconds (0..=999)
    pub milliseconds: u16,
}

impl SystemTime {
    /// Convert to a naive calendar timestamp
    ///
    /// `day_of_week` is ignored. Returns `None` for out-of-range fields.
    pub fn to_naive(&self) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(i32::from(self.year), u32::from(self.month), u32::from(self.day))?
            .and_hms_milli_opt(
                u32::from(self.hour),
                u32::from(self.minute),
                u32::from(self.second),
                u32::from(self.milliseconds),
            )
    }
}

/// 128-bit GUID in platform field layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(C)]
pub struct Guid {
    /// First 32 bits
    pub data1: u32,
    /// Next 16 bits
    pub data2: u16,
    /// Next 16 bits
    pub data3: u16,
    /// Final 64 bits as bytes
    pub data4: [u8; 8],
}

impl Guid {
    /// Parse the 16-byte in-memory (little-endian fields) form
    pub fn from_le_bytes(bytes: &[u8; 16]) -> Self {
        let mut data4 = [0u8; 8];
        data4.copy_from_slice(&bytes[8..16]);
        Guid {
            data1: LittleEndian::read_u32(&bytes[0..4]),
            data2: LittleEndian::read_u16(&bytes[4..6]),
            data3: LittleEndian::read_u16(&bytes[6..8]),
            data4,
        }
    }

    /// The 16-byte in-memory form
    pub fn to_le_bytes(&self) -> [u8; 16] {
        let mut bytes = [0u8; 16];
        LittleEndian::write_u32(&mut bytes[0..4], self.data1);
        LittleEndian::write_u16(&mut bytes[4..6], self.data2);
        LittleEndian::write_u16(&mut bytes[6..8], self.data3);
        bytes[8..16].copy_from_slice(&self.data4);
        bytes
    }

    /// Convert to a [`Uuid`]
    pub fn to_uuid(&self) -> Uuid {
        Uuid::from_fields(self.data1, self.data2, self.data3, &self.data4)
    }

    /// Convert from a [`Uuid`]
    pub fn from_uuid(uuid: Uuid) -> Self {
        let (data1, data2, data3, d4) = uuid.as_fields();
        Guid {
            data1,
            data2,
            data3,
            data4: *d4,
        }
    }
}

impl std::fmt::Display for Guid {
    /// Registry format: `{XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX}`
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{{:X}}}", self.to_uuid().hyphenated())
    }
}

/// Maximum sub-authorities in a SID
pub const SID_MAX_SUB_AUTHORITIES: usize = 15;

/// Security identifier
///
/// # Examples
///
/// ```
/// use evtlog_core::Sid;
///
/// let sid: Sid = "S-1-5-18".parse().unwrap();
/// assert_eq!(sid.to_string(), "S-1-5-18");
/// assert_eq!(Sid::from_bytes(&sid.to_bytes()).unwrap(), sid);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sid {
    /// Revision (always 1 in practice)
    pub revision: u8,
    /// 48-bit identifier authority, big-endian
    pub authority: [u8; 6],
    /// Sub-authority values
    pub sub_authorities: Vec<u32>,
}

impl Sid {
    /// Byte length of a binary SID with `count` sub-authorities
    pub const fn byte_len_for(count: usize) -> usize {
        8 + 4 * count
    }

    /// Byte length of this SID's binary form
    pub fn byte_len(&self) -> usize {
        Self::byte_len_for(self.sub_authorities.len())
    }

    /// Read the sub-authority count out of a binary SID header
    pub fn sub_authority_count(header: &[u8]) -> Option<usize> {
        header.get(1).map(|c| usize::from(*c))
    }

    /// Parse the binary form
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 8 {
            return Err(Error::InvalidArgument(format!(
                "sid needs at least 8 bytes, got {}",
                bytes.len()
            )));
        }
        let count = usize::from(bytes[1]);
        if count > SID_MAX_SUB_AUTHORITIES {
            return Err(Error::InvalidArgument(format!(
                "sid has {} sub-authorities (max {})",
                count, SID_MAX_SUB_AUTHORITIES
            )));
        }
        let needed = Self::byte_len_for(count);
        if bytes.len() < needed {
            return Err(Error::InvalidArgument(format!(
                "sid needs {} bytes, got {}",
                needed,
                bytes.len()
            )));
        }
        let mut authority = [0u8; 6];
        authority.copy_from_slice(&bytes[2..8]);
        let sub_authorities = bytes[8..needed]
            .chunks_exact(4)
            .map(LittleEndian::read_u32)
            .collect();
        Ok(Sid {
            revision: bytes[0],
            authority,
            sub_authorities,
        })
    }

    /// The binary form
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.byte_len());
        out.push(self.revision);
        out.push(self.sub_authorities.len() as u8);
        out.extend_from_slice(&self.authority);
        for sub in &self.sub_authorities {
            let mut b = [0u8; 4];
            LittleEndian::write_u32(&mut b, *sub);
            out.extend_from_slice(&b);
        }
        out
    }

    /// Identifier authority as an integer
    pub fn authority_value(&self) -> u64 {
        BigEndian::read_u48(&self.authority)
    }
}

impl std::fmt::Display for Sid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let authority = self.authority_value();
        if authority >= 1 << 32 {
            write!(f, "S-{}-{:#014X}", self.revision, authority)?;
        } else {
            write!(f, "S-{}-{}", self.revision, authority)?;
        }
        for sub in &self.sub_authorities {
            write!(f, "-{}", sub)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for Sid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidArgument(format!("malformed sid string {:?}", s));
        let mut parts = s.split('-');
        if parts.next() != Some("S") {
            return Err(invalid());
        }
        let revision: u8 = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
        let authority_str = parts.next().ok_or_else(invalid)?;
        let authority_value = match authority_str.strip_prefix("0x").or_else(|| authority_str.strip_prefix("0X")) {
            Some(hex) => u64::from_str_radix(hex, 16).map_err(|_| invalid())?,
            None => authority_str.parse::<u64>().map_err(|_| invalid())?,
        };
        if authority_value >= 1 << 48 {
            return Err(invalid());
        }
        let mut authority = [0u8; 6];
        BigEndian::write_u48(&mut authority, authority_value);
        let sub_authorities = parts
            .map(|p| p.parse::<u32>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>>>()?;
        if sub_authorities.len() > SID_MAX_SUB_AUTHORITIES {
            return Err(invalid());
        }
        Ok(Sid {
            revision,
            authority,
            sub_authorities,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_filetime_unix_epoch() {
        let ft = FileTime::from_ticks(116_444_736_000_000_000);
        let dt = ft.to_datetime().unwrap();
        assert_eq!(dt.timestamp(), 0);
        assert_eq!(FileTime::from_datetime(dt), Some(ft));
    }

    #[test]
    fn test_filetime_sub_second_precision() {
        let ft = FileTime::from_ticks(116_444_736_000_000_000 + 1_234_567);
        let dt = ft.to_datetime().unwrap();
        assert_eq!(dt.timestamp_subsec_nanos(), 123_456_700);
        assert_eq!(FileTime::from_datetime(dt), Some(ft));
    }

    #[test]
    fn test_filetime_zero_is_1601() {
        let dt = FileTime::from_ticks(0).to_datetime().unwrap();
        assert_eq!(dt.year(), 1601);
        assert_eq!(dt.month(), 1);
        assert_eq!(dt.day(), 1);
    }

    #[test]
    fn test_systemtime_to_naive() {
        let st = SystemTime {
            year: 2021,
            month: 3,
            day_of_week: 2,
            day: 9,
            hour: 13,
            minute: 5,
            second: 7,
            milliseconds: 250,
        };
        let naive = st.to_naive().unwrap();
        assert_eq!(naive.year(), 2021);
        assert_eq!(naive.hour(), 13);
        assert_eq!(naive.nanosecond(), 250_000_000);
    }

    #[test]
    fn test_systemtime_invalid_fields() {
        let st = SystemTime {
            month: 13,
            ..SystemTime::default()
        };
        assert!(st.to_naive().is_none());
    }

    #[test]
    fn test_guid_bytes_roundtrip() {
        let guid = Guid {
            data1: 0x54849625,
            data2: 0x5478,
            data3: 0x4994,
            data4: [0xa5, 0xba, 0x3e, 0x3b, 0x03, 0x28, 0xc3, 0x0d],
        };
        assert_eq!(Guid::from_le_bytes(&guid.to_le_bytes()), guid);
        assert_eq!(guid.to_le_bytes()[0], 0x25);
    }

    #[test]
    fn test_guid_display_and_uuid() {
        let guid = Guid {
            data1: 0x54849625,
            data2: 0x5478,
            data3: 0x4994,
            data4: [0xa5, 0xba, 0x3e, 0x3b, 0x03, 0x28, 0xc3, 0x0d],
        };
        assert_eq!(guid.to_string(), "{54849625-5478-4994-A5BA-3E3B0328C30D}");
        assert_eq!(Guid::from_uuid(guid.to_uuid()), guid);
    }

    #[test]
    fn test_sid_parse_and_display() {
        let sid: Sid = "S-1-5-21-1004336348-1177238915-682003330-512".parse().unwrap();
        assert_eq!(sid.revision, 1);
        assert_eq!(sid.authority_value(), 5);
        assert_eq!(sid.sub_authorities.len(), 5);
        assert_eq!(sid.to_string(), "S-1-5-21-1004336348-1177238915-682003330-512");
    }

    #[test]
    fn test_sid_binary_roundtrip() {
        let sid: Sid = "S-1-5-18".parse().unwrap();
        let bytes = sid.to_bytes();
        assert_eq!(bytes, vec![1, 1, 0, 0, 0, 0, 0, 5, 18, 0, 0, 0]);
        assert_eq!(Sid::from_bytes(&bytes).unwrap(), sid);
    }

    #[test]
    fn test_sid_large_authority_displays_hex() {
        let sid = Sid {
            revision: 1,
            authority: [0x01, 0, 0, 0, 0, 0x05],
            sub_authorities: vec![],
        };
        assert!(sid.to_string().starts_with("S-1-0x"));
        assert_eq!(sid.to_string().parse::<Sid>().unwrap(), sid);
    }

    #[test]
    fn test_sid_truncated_bytes_rejected() {
        assert!(Sid::from_bytes(&[1, 2, 0, 0, 0, 0, 0, 5, 18, 0, 0, 0]).is_err());
        assert!(Sid::from_bytes(&[1]).is_err());
    }

    #[test]
    fn test_sid_malformed_strings_rejected() {
        assert!("X-1-5".parse::<Sid>().is_err());
        assert!("S-1".parse::<Sid>().is_err());
        assert!("S-1-5-abc".parse::<Sid>().is_err());
    }
}
