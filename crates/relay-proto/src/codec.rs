//! Newline-delimited JSON codec for tokio.
//!
//! One JSON document per `\n`-terminated line (`\r\n` is accepted). Lines
//! that are valid UTF-8 but do not hold a JSON object are surfaced as
//! [`Decoded::Malformed`] so the caller can drop them without tearing down
//! the connection. Oversized lines are fatal.

use bytes::{BufMut, BytesMut};
use serde_json::Value;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

use crate::error::CodecError;
use crate::outbound::Outbound;
use crate::record::Record;

/// Default maximum line length (64 KiB).
pub const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024;

/// Result of decoding one line.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// A JSON object.
    Record(Record),
    /// A line that is not a JSON object, with a short description.
    Malformed(String),
}

/// Codec turning lines into [`Decoded`] items and [`Outbound`] frames into
/// lines.
#[derive(Debug, Clone)]
pub struct JsonLineCodec {
    lines: LinesCodec,
    max_len: usize,
}

impl JsonLineCodec {
    /// Create a codec with the default line limit.
    pub fn new() -> Self {
        Self::with_max_length(DEFAULT_MAX_LINE_LENGTH)
    }

    /// Create a codec with a custom line limit in bytes.
    pub fn with_max_length(max_len: usize) -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(max_len),
            max_len,
        }
    }

    /// Maximum accepted line length in bytes.
    pub fn max_length(&self) -> usize {
        self.max_len
    }

    fn parse_line(line: &str) -> Option<Decoded> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        Some(match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(map)) => Decoded::Record(map),
            Ok(_) => Decoded::Malformed("payload is not a JSON object".to_string()),
            Err(e) => Decoded::Malformed(e.to_string()),
        })
    }

    fn map_err(&self, err: LinesCodecError) -> CodecError {
        match err {
            LinesCodecError::MaxLineLengthExceeded => CodecError::LineTooLong { max: self.max_len },
            LinesCodecError::Io(e) => CodecError::Io(e),
        }
    }
}

impl Default for JsonLineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for JsonLineCodec {
    type Item = Decoded;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Decoded>, CodecError> {
        loop {
            let line = match self.lines.decode(src) {
                Ok(Some(line)) => line,
                Ok(None) => return Ok(None),
                Err(e) => return Err(self.map_err(e)),
            };
            if let Some(decoded) = Self::parse_line(&line) {
                return Ok(Some(decoded));
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Decoded>, CodecError> {
        loop {
            let line = match self.lines.decode_eof(src) {
                Ok(Some(line)) => line,
                Ok(None) => return Ok(None),
                Err(e) => return Err(self.map_err(e)),
            };
            if let Some(decoded) = Self::parse_line(&line) {
                return Ok(Some(decoded));
            }
        }
    }
}

impl Encoder<Outbound> for JsonLineCodec {
    type Error = CodecError;

    fn encode(&mut self, frame: Outbound, dst: &mut BytesMut) -> Result<(), CodecError> {
        let encoded = serde_json::to_vec(&frame)?;
        dst.reserve(encoded.len() + 1);
        dst.put_slice(&encoded);
        dst.put_u8(b'\n');
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode_all(codec: &mut JsonLineCodec, input: &str) -> Vec<Decoded> {
        let mut buf = BytesMut::from(input);
        let mut out = Vec::new();
        while let Some(item) = codec.decode(&mut buf).expect("decode") {
            out.push(item);
        }
        out
    }

    #[test]
    fn decodes_objects_per_line() {
        let mut codec = JsonLineCodec::new();
        let items = decode_all(
            &mut codec,
            "{\"type\":\"login\",\"username\":\"a\"}\r\n{\"type\":\"message\"}\n",
        );
        assert_eq!(items.len(), 2);
        match &items[0] {
            Decoded::Record(r) => assert_eq!(r["username"], "a"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn waits_for_terminator() {
        let mut codec = JsonLineCodec::new();
        let mut buf = BytesMut::from("{\"type\":");
        assert!(codec.decode(&mut buf).expect("decode").is_none());
        buf.extend_from_slice(b"\"login\"}\n");
        assert!(matches!(codec.decode(&mut buf).expect("decode"), Some(Decoded::Record(_))));
    }

    #[test]
    fn skips_blank_lines() {
        let mut codec = JsonLineCodec::new();
        let items = decode_all(&mut codec, "\n   \r\n{}\n");
        assert_eq!(items, vec![Decoded::Record(Record::new())]);
    }

    #[test]
    fn non_objects_are_malformed_not_fatal() {
        let mut codec = JsonLineCodec::new();
        let items = decode_all(&mut codec, "[1,2]\nnot json\n\"str\"\n{}\n");
        assert_eq!(items.len(), 4);
        assert!(matches!(items[0], Decoded::Malformed(_)));
        assert!(matches!(items[1], Decoded::Malformed(_)));
        assert!(matches!(items[2], Decoded::Malformed(_)));
        assert!(matches!(items[3], Decoded::Record(_)));
    }

    #[test]
    fn oversized_line_is_an_error() {
        let mut codec = JsonLineCodec::with_max_length(16);
        let mut buf = BytesMut::from("{\"text\":\"aaaaaaaaaaaaaaaaaaaaaaaa\"}\n");
        let err = codec.decode(&mut buf).expect_err("line too long");
        assert!(matches!(err, CodecError::LineTooLong { max: 16 }));
    }

    #[test]
    fn decode_eof_accepts_unterminated_last_line() {
        let mut codec = JsonLineCodec::new();
        let mut buf = BytesMut::from("{\"type\":\"login\"}");
        assert!(codec.decode(&mut buf).expect("decode").is_none());
        assert!(matches!(
            codec.decode_eof(&mut buf).expect("decode"),
            Some(Decoded::Record(_))
        ));
    }

    #[test]
    fn encodes_one_line_per_frame() {
        let mut codec = JsonLineCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(Outbound::login_ok(), &mut buf).expect("encode");
        codec.encode(Outbound::new_user("bob"), &mut buf).expect("encode");
        let text = std::str::from_utf8(&buf).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: Value = serde_json::from_str(lines[1]).expect("json");
        assert_eq!(second, json!({"type": "newuser", "username": "bob"}));
    }
}
