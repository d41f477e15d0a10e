//! Frame classification and telemetry codec
//!
//! # Wire format
//!
//! Radio frames are plain text, no length prefix and no type field. Three
//! shapes exist on the wire, distinguished by content inspection:
//!
//! | Shape | Content |
//! |-------|---------|
//! | Ack request | `"ack " + <sender address text>` |
//! | Sentinel | the literal `"end"` (end-of-batch marker) |
//! | Telemetry | JSON object with at least `hive_name` |
//!
//! Content-based classification is fragile, so it is isolated here in a
//! single [`classify`] function; the exact textual markers are preserved for
//! compatibility with existing radio peers using this wire shape.
//!
//! Numeric telemetry fields travel as decimal strings with two fractional
//! digits (`"21.50"`), produced by [`fixed2`]. Inbound payloads are decoded
//! with a strict, non-executing JSON parser; anything that is not a
//! well-formed object with the expected keys is a [`Error::Decode`] and the
//! frame is dropped by the receiver.

use crate::error::{Error, Result};
use crate::link::PeerAddress;
use serde::{Deserialize, Serialize};

/// End-of-batch sentinel frame
pub const SENTINEL: &[u8] = b"end";

/// Marker substring identifying an ack-request frame
const ACK_MARKER: &[u8] = b"ack ";

/// Logical frame kinds, decided by content inspection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Handshake opener carrying the sender's own address
    AckRequest,
    /// End-of-batch marker
    Sentinel,
    /// JSON-object-shaped telemetry payload
    Telemetry,
}

/// Classify an inbound frame by its content
///
/// Anything that is neither the sentinel nor carries the ack marker is
/// treated as telemetry; whether it actually decodes is the caller's
/// problem.
pub fn classify(frame: &[u8]) -> FrameKind {
    if frame == SENTINEL {
        FrameKind::Sentinel
    } else if contains(frame, ACK_MARKER) {
        FrameKind::AckRequest
    } else {
        FrameKind::Telemetry
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Build the ack-request frame announcing `own` to the gateway
pub fn ack_request(own: PeerAddress) -> Vec<u8> {
    format!("ack {own}").into_bytes()
}

/// One sensor sample
///
/// `temperature` (and the optional fields) are decimal strings with two
/// fractional digits, exactly as they travel on the wire. Unknown extra keys
/// are preserved through decode and relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub hive_name: String,
    pub temperature: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pressure: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Reading {
    /// A reading with only the two mandatory fields
    pub fn new(hive_name: impl Into<String>, temperature: f64) -> Self {
        Self {
            hive_name: hive_name.into(),
            temperature: fixed2(temperature),
            humidity: None,
            pressure: None,
            extra: serde_json::Map::new(),
        }
    }
}

/// Format a measurement as a decimal string with two fractional digits
pub fn fixed2(value: f64) -> String {
    format!("{value:.2}")
}

/// Serialize a reading to a telemetry frame
pub fn encode_reading(reading: &Reading) -> Result<Vec<u8>> {
    serde_json::to_vec(reading).map_err(|e| Error::Serialization(e.to_string()))
}

/// Strictly decode a telemetry frame
///
/// Fails closed on malformed text: no partial record ever escapes. The
/// payload is never evaluated, only parsed.
pub fn decode_telemetry(frame: &[u8]) -> Result<Reading> {
    serde_json::from_slice(frame).map_err(|e| Error::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_sentinel_exactly() {
        assert_eq!(classify(b"end"), FrameKind::Sentinel);
        // An "end" substring inside a payload is not a sentinel
        assert_eq!(classify(b"{\"hive_name\":\"end\"}"), FrameKind::Telemetry);
    }

    #[test]
    fn classifies_ack_by_marker_substring() {
        let own = PeerAddress::new([0x0c, 0xdc, 0x7e, 0x3c, 0x1b, 0xf0]);
        assert_eq!(classify(&ack_request(own)), FrameKind::AckRequest);
        assert_eq!(classify(b"ack 0c:dc:7e:3c:1b:f0"), FrameKind::AckRequest);
    }

    #[test]
    fn classifies_object_text_as_telemetry() {
        assert_eq!(
            classify(br#"{"hive_name":"Christine","temperature":"21.50"}"#),
            FrameKind::Telemetry
        );
    }

    #[test]
    fn ack_request_carries_own_address() {
        let own = PeerAddress::new([0xe0, 0x5a, 0x1b, 0x0c, 0xc6, 0x1c]);
        assert_eq!(ack_request(own), b"ack e0:5a:1b:0c:c6:1c".to_vec());
    }

    #[test]
    fn fixed2_keeps_two_fractional_digits() {
        assert_eq!(fixed2(21.5), "21.50");
        assert_eq!(fixed2(0.0), "0.00");
        assert_eq!(fixed2(-3.456), "-3.46");
    }

    #[test]
    fn reading_round_trips_with_two_digit_temperature() {
        let reading = Reading::new("Christine", 21.5);
        let frame = encode_reading(&reading).unwrap();
        let decoded = decode_telemetry(&frame).unwrap();
        assert_eq!(decoded.hive_name, "Christine");
        assert_eq!(decoded.temperature, "21.50");
        assert_eq!(decoded.humidity, None);
    }

    #[test]
    fn optional_fields_absent_keys_stay_absent() {
        let reading = Reading::new("Elisabeth", 34.0);
        let text = String::from_utf8(encode_reading(&reading).unwrap()).unwrap();
        assert!(!text.contains("humidity"));
        assert!(!text.contains("pressure"));
    }

    #[test]
    fn extra_keys_survive_decode() {
        let frame = br#"{"hive_name":"A","temperature":"20.00","battery":"3.91"}"#;
        let decoded = decode_telemetry(frame).unwrap();
        assert_eq!(decoded.extra["battery"], "3.91");
    }

    #[test]
    fn malformed_payload_fails_closed() {
        // Missing closing delimiter
        assert!(decode_telemetry(b"{\"hive_name\":\"A\"").is_err());
        // Not an object
        assert!(decode_telemetry(b"[1,2,3]").is_err());
        // Missing mandatory keys
        assert!(decode_telemetry(b"{\"temperature\":\"20.00\"}").is_err());
        // Not even text
        assert!(decode_telemetry(&[0xff, 0xfe, 0x00]).is_err());
    }
}
