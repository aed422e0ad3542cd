//! UTF-16 transcoding for platform string arguments

use evtlog_core::{Error, Result};

/// Encode `s` as NUL-terminated UTF-16
///
/// An interior NUL would silently truncate the argument on the platform side,
/// so it is rejected with [`Error::Encoding`].
pub fn to_wide(s: &str) -> Result<Vec<u16>> {
    if let Some(pos) = s.find('\0') {
        return Err(Error::Encoding {
            input: s.to_string(),
            reason: format!("interior NUL at byte {}", pos),
        });
    }
    let mut wide: Vec<u16> = s.encode_utf16().collect();
    wide.push(0);
    Ok(wide)
}

/// Decode UTF-16 up to the first NUL (or the end), replacing invalid units
pub fn from_wide(units: &[u16]) -> String {
    let end = units.iter().position(|&u| u == 0).unwrap_or(units.len());
    String::from_utf16_lossy(&units[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_wide_terminates() {
        assert_eq!(to_wide("Ab").unwrap(), vec![0x41, 0x62, 0]);
        assert_eq!(to_wide("").unwrap(), vec![0]);
    }

    #[test]
    fn test_to_wide_rejects_interior_nul() {
        let err = to_wide("Event/\0System").unwrap_err();
        match err {
            Error::Encoding { input, .. } => assert_eq!(input, "Event/\0System"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_non_bmp_round_trip() {
        let s = "Log \u{1F600}";
        let wide = to_wide(s).unwrap();
        assert_eq!(from_wide(&wide), s);
    }

    #[test]
    fn test_from_wide_stops_at_nul() {
        assert_eq!(from_wide(&[0x61, 0, 0x62]), "a");
        assert_eq!(from_wide(&[0x61, 0x62]), "ab");
    }
}
