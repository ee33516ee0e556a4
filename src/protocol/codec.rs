//! Newline-delimited JSON codec
//!
//! `encode` turns a value into a ready-to-send wire message. `FrameDecoder`
//! accumulates arbitrary read chunks and yields complete frames from the
//! front of its buffer, keeping any trailing partial segment for the next
//! read.

use bytes::{Bytes, BytesMut};
use serde::Serialize;

use super::Frame;

/// Message delimiter
pub const DELIMITER: u8 = b'\n';

/// Default upper bound for a single undelimited segment (16MB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Error produced while splitting or decoding the byte stream
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// A complete segment was not a valid JSON object
    #[error("malformed frame {raw:?}: {source}")]
    Decode {
        /// The offending segment, lossily converted to text
        raw: String,
        #[source]
        source: serde_json::Error,
    },

    /// The buffer outgrew the limit before a delimiter arrived
    #[error("frame exceeds {limit} bytes without a delimiter ({size} buffered)")]
    FrameTooLarge { size: usize, limit: usize },
}

/// Error produced while turning a value into a wire message
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error(transparent)]
    Serialize(#[from] serde_json::Error),

    /// Frames are JSON objects; anything else would be undecodable
    #[error("frame must serialize to a JSON object, got {found}")]
    NotAnObject { found: &'static str },
}

/// Encode a value as a delimiter-terminated wire message
///
/// The result is reference counted, so one encoding can be written to any
/// number of connections.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Bytes, EncodeError> {
    let mut buf = serde_json::to_vec(value)?;

    // Compact output starts with the value's first token
    let found = match buf.first() {
        Some(b'{') => None,
        Some(b'[') => Some("array"),
        Some(b'"') => Some("string"),
        Some(b't') | Some(b'f') => Some("boolean"),
        Some(b'n') => Some("null"),
        _ => Some("number"),
    };
    if let Some(found) = found {
        return Err(EncodeError::NotAnObject { found });
    }

    buf.push(DELIMITER);
    Ok(Bytes::from(buf))
}

/// Incremental decoder for the newline-delimited stream
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: BytesMut,
    /// Prefix of `buffer` already known to hold no delimiter
    scanned: usize,
    max_frame_size: usize,
}

impl FrameDecoder {
    /// Create a decoder with the default frame size limit
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Create a decoder with a custom frame size limit
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            scanned: 0,
            max_frame_size,
        }
    }

    /// Append a chunk read from the socket
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Number of bytes waiting for a delimiter
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Pull the next complete frame out of the buffer
    ///
    /// Returns `None` when no complete segment is buffered. Blank segments
    /// are skipped. A malformed segment is consumed and reported, so the
    /// caller can keep calling to reach the segments behind it.
    pub fn decode_next(&mut self) -> Option<Result<Frame, CodecError>> {
        loop {
            let found = self.buffer[self.scanned..]
                .iter()
                .position(|b| *b == DELIMITER);

            let Some(offset) = found else {
                self.scanned = self.buffer.len();
                if self.buffer.len() > self.max_frame_size {
                    let size = self.buffer.len();
                    self.buffer.clear();
                    self.scanned = 0;
                    return Some(Err(CodecError::FrameTooLarge {
                        size,
                        limit: self.max_frame_size,
                    }));
                }
                return None;
            };

            let pos = self.scanned + offset;
            let line = self.buffer.split_to(pos + 1);
            self.scanned = 0;

            let segment = line[..pos].trim_ascii();
            if segment.is_empty() {
                continue;
            }

            return Some(serde_json::from_slice::<Frame>(segment).map_err(|source| {
                CodecError::Decode {
                    raw: String::from_utf8_lossy(segment).into_owned(),
                    source,
                }
            }));
        }
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame(value: serde_json::Value) -> Frame {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_encode_appends_single_delimiter() {
        let bytes = encode(&json!({"lap": 1, "speed": 301.4})).unwrap();

        assert_eq!(&bytes[..], b"{\"lap\":1,\"speed\":301.4}\n");
    }

    #[test]
    fn test_encode_escapes_embedded_newlines() {
        let bytes = encode(&json!({"note": "line one\nline two\r\n"})).unwrap();

        // Only the trailing delimiter may be a raw newline
        let newlines = bytes.iter().filter(|b| **b == DELIMITER).count();
        assert_eq!(newlines, 1);
        assert_eq!(bytes.last(), Some(&DELIMITER));
    }

    #[test]
    fn test_encode_rejects_non_object_values() {
        assert!(matches!(
            encode(&json!([1, 2, 3])),
            Err(EncodeError::NotAnObject { found: "array" })
        ));
        assert!(matches!(
            encode(&json!("lap")),
            Err(EncodeError::NotAnObject { found: "string" })
        ));
        assert!(matches!(
            encode(&json!(null)),
            Err(EncodeError::NotAnObject { found: "null" })
        ));
        assert!(matches!(
            encode(&-3.5),
            Err(EncodeError::NotAnObject { found: "number" })
        ));
    }

    #[test]
    fn test_floats_round_trip_bit_exact() {
        let mut values = vec![
            1.0715660391465826e-75,
            0.1,
            301.4,
            -0.0,
            f64::MIN_POSITIVE,
            f64::MAX,
            f64::MIN,
            f64::EPSILON,
            5e-324,
            2.2250738585072009e-308,
            1.7976931348623157e308,
            9007199254740993.0,
        ];

        // Deterministic spread of bit patterns across the exponent range
        let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
        while values.len() < 5000 {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let value = f64::from_bits(state);
            if value.is_finite() {
                values.push(value);
            }
        }

        let mut decoder = FrameDecoder::new();
        for value in values {
            decoder.extend(&encode(&json!({ "v": value })).unwrap());
            let decoded = decoder.decode_next().unwrap().unwrap();
            let back = decoded["v"].as_f64().unwrap();
            assert_eq!(back.to_bits(), value.to_bits(), "{:e} came back as {:e}", value, back);
        }
    }

    #[test]
    fn test_large_frame_in_small_chunks() {
        let payload = "x".repeat(64 * 1024);
        let bytes = encode(&json!({ "blob": payload })).unwrap();

        let mut decoder = FrameDecoder::new();
        let mut frames = Vec::new();
        for chunk in bytes.chunks(100) {
            decoder.extend(chunk);
            while let Some(result) = decoder.decode_next() {
                frames.push(result.unwrap());
            }
        }

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["blob"].as_str().map(str::len), Some(64 * 1024));
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_decode_nested_values() {
        let original = frame(json!({
            "driver": "VER",
            "position": {"x": 1.5, "y": -2.25},
            "sectors": [31.2, 40.01, null],
            "pit": false,
            "note": "multi\nline"
        }));

        let mut decoder = FrameDecoder::new();
        decoder.extend(&encode(&original).unwrap());

        let decoded = decoder.decode_next().unwrap().unwrap();
        assert_eq!(decoded, original);
        assert!(decoder.decode_next().is_none());
    }

    #[test]
    fn test_partial_segment_stays_buffered() {
        let mut decoder = FrameDecoder::new();

        decoder.extend(b"{\"lap\":");
        assert!(decoder.decode_next().is_none());
        assert_eq!(decoder.buffered(), 7);

        decoder.extend(b"3}\n{\"lap\"");
        let first = decoder.decode_next().unwrap().unwrap();
        assert_eq!(first["lap"], json!(3));
        assert!(decoder.decode_next().is_none());

        decoder.extend(b":4}\n");
        let second = decoder.decode_next().unwrap().unwrap();
        assert_eq!(second["lap"], json!(4));
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_multibyte_utf8_split_across_chunks() {
        let bytes = encode(&json!({"driver": "Pérez"})).unwrap();
        // Split inside the two-byte 'é'
        let split = bytes.iter().position(|b| *b == 0xC3).unwrap() + 1;

        let mut decoder = FrameDecoder::new();
        decoder.extend(&bytes[..split]);
        assert!(decoder.decode_next().is_none());
        decoder.extend(&bytes[split..]);

        let decoded = decoder.decode_next().unwrap().unwrap();
        assert_eq!(decoded["driver"], json!("Pérez"));
    }

    #[test]
    fn test_malformed_segment_does_not_block_next() {
        let mut decoder = FrameDecoder::new();
        decoder.extend(b"{not json}\n{\"lap\":5}\n");

        match decoder.decode_next() {
            Some(Err(CodecError::Decode { raw, .. })) => assert_eq!(raw, "{not json}"),
            other => panic!("expected decode error, got {:?}", other),
        }

        let next = decoder.decode_next().unwrap().unwrap();
        assert_eq!(next["lap"], json!(5));
    }

    #[test]
    fn test_non_object_json_is_rejected() {
        let mut decoder = FrameDecoder::new();
        decoder.extend(b"[1,2,3]\n");

        assert!(matches!(
            decoder.decode_next(),
            Some(Err(CodecError::Decode { .. }))
        ));
    }

    #[test]
    fn test_blank_segments_are_skipped() {
        let mut decoder = FrameDecoder::new();
        decoder.extend(b"\n  \r\n{\"lap\":6}\r\n");

        let decoded = decoder.decode_next().unwrap().unwrap();
        assert_eq!(decoded["lap"], json!(6));
        assert!(decoder.decode_next().is_none());
    }

    #[test]
    fn test_oversized_segment_is_reported_and_cleared() {
        let mut decoder = FrameDecoder::with_max_frame_size(8);
        decoder.extend(b"{\"telemetry\":");

        match decoder.decode_next() {
            Some(Err(CodecError::FrameTooLarge { size, limit })) => {
                assert_eq!(size, 13);
                assert_eq!(limit, 8);
            }
            other => panic!("expected frame too large, got {:?}", other),
        }
        assert_eq!(decoder.buffered(), 0);
    }
}
