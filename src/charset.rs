//! Text transcoding for record fields.
//!
//! Legacy databases store their text in ISO-8859-1. Newer ones declare UTF-8.
//! Either way the caller gets a UTF-8 `str`.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::GeoIpError;

/// Character set the text fields of a database are stored in.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Charset {
    /// ISO-8859-1 (Latin-1), the historical default.
    #[default]
    #[serde(rename = "iso-8859-1", alias = "latin1", alias = "iso8859-1")]
    Iso8859_1,
    /// UTF-8.
    #[serde(rename = "utf-8", alias = "utf8")]
    Utf8,
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Charset::Iso8859_1 => "iso-8859-1",
            Charset::Utf8 => "utf-8",
        })
    }
}

impl FromStr for Charset {
    type Err = GeoIpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "iso-8859-1" | "iso8859-1" | "latin1" => Ok(Charset::Iso8859_1),
            "utf-8" | "utf8" => Ok(Charset::Utf8),
            _ => Err(GeoIpError::encoding(format!("unknown charset {s:?}"))),
        }
    }
}

#[cfg(feature = "simdutf8")]
fn validate_utf8(bytes: &[u8]) -> Option<&str> {
    simdutf8::basic::from_utf8(bytes).ok()
}

#[cfg(not(feature = "simdutf8"))]
fn validate_utf8(bytes: &[u8]) -> Option<&str> {
    std::str::from_utf8(bytes).ok()
}

/// Converts a raw text field to UTF-8, never failing.
///
/// Input that is already valid UTF-8 is returned untouched, so running the
/// output through again changes nothing. Otherwise ISO-8859-1 bytes map to
/// the code points of the same value, and invalid UTF-8 sequences are
/// replaced with U+FFFD.
///
/// ```
/// use geoip::{transcode, Charset};
///
/// assert_eq!(transcode(b"Jundia\xed", Charset::Iso8859_1), "Jundiaí");
/// assert_eq!(transcode("Jundiaí".as_bytes(), Charset::Iso8859_1), "Jundiaí");
/// ```
pub fn transcode(bytes: &[u8], charset: Charset) -> Cow<'_, str> {
    if let Some(text) = validate_utf8(bytes) {
        return Cow::Borrowed(text);
    }
    match charset {
        Charset::Iso8859_1 => encoding_rs::mem::decode_latin1(bytes),
        Charset::Utf8 => {
            debug!("replacing invalid UTF-8 in {bytes:?}");
            String::from_utf8_lossy(bytes)
        }
    }
}

/// Converts a raw text field to UTF-8, failing on undecodable input.
///
/// Every byte string is valid ISO-8859-1, so only UTF-8 declared text can
/// fail here.
pub fn transcode_strict(bytes: &[u8], charset: Charset) -> Result<Cow<'_, str>, GeoIpError> {
    if let Some(text) = validate_utf8(bytes) {
        return Ok(Cow::Borrowed(text));
    }
    match charset {
        Charset::Iso8859_1 => Ok(encoding_rs::mem::decode_latin1(bytes)),
        Charset::Utf8 => {
            let valid_up_to = std::str::from_utf8(bytes)
                .err()
                .map_or(bytes.len(), |e| e.valid_up_to());
            Err(GeoIpError::encoding(format!(
                "invalid UTF-8 at byte {valid_up_to} of {bytes:?}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latin1_to_utf8() {
        assert_eq!(transcode(b"Jundia\xed", Charset::Iso8859_1), "Jundiaí");
        assert_eq!(transcode(b"M\xfcnchen", Charset::Iso8859_1), "München");
        assert_eq!(transcode(b"S\xe3o Paulo", Charset::Iso8859_1), "São Paulo");
    }

    #[test]
    fn test_ascii_borrowed() {
        assert!(matches!(
            transcode(b"Ithaca", Charset::Iso8859_1),
            Cow::Borrowed("Ithaca")
        ));
    }

    #[test]
    fn test_idempotent_on_utf8() {
        for text in ["Jundiaí", "München", "Zürich", "東京", ""] {
            for charset in [Charset::Iso8859_1, Charset::Utf8] {
                let once = transcode(text.as_bytes(), charset);
                assert_eq!(once, text);
                let twice = transcode(once.as_bytes(), charset);
                assert_eq!(twice, once);
            }
        }
    }

    #[test]
    fn test_malformed_utf8_is_replaced() {
        let bytes = b"Bogot\xe1 \xff\xfe";
        let first = transcode(bytes, Charset::Utf8);
        assert_eq!(first, "Bogot\u{fffd} \u{fffd}\u{fffd}");
        assert_eq!(transcode(bytes, Charset::Utf8), first);
    }

    #[test]
    fn test_strict() {
        assert_eq!(
            transcode_strict(b"Jundia\xed", Charset::Iso8859_1).unwrap(),
            "Jundiaí"
        );
        assert_eq!(transcode_strict(b"Ithaca", Charset::Utf8).unwrap(), "Ithaca");
        match transcode_strict(b"Bogot\xe1", Charset::Utf8) {
            Err(GeoIpError::Encoding { message }) => assert!(message.contains("byte 5")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_charset_names() {
        assert_eq!("ISO-8859-1".parse::<Charset>().unwrap(), Charset::Iso8859_1);
        assert_eq!("latin1".parse::<Charset>().unwrap(), Charset::Iso8859_1);
        assert_eq!("utf8".parse::<Charset>().unwrap(), Charset::Utf8);
        assert!("ebcdic".parse::<Charset>().is_err());
        assert_eq!(Charset::Utf8.to_string(), "utf-8");
        assert_eq!(
            serde_json::from_str::<Charset>("\"latin1\"").unwrap(),
            Charset::Iso8859_1
        );
    }
}
