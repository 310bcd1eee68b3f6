//! Line codec for the chat wire protocol
//!
//! Frames are newline-terminated UTF-8 text lines. A trailing `\r` is
//! tolerated on decode so telnet-style clients work unchanged.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::messages::ServerLine;
use crate::MAX_LINE_LENGTH;

/// Protocol codec error
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Line too long: {len} bytes (max {max})")]
    LineTooLong { len: usize, max: usize },

    #[error("Line is not valid UTF-8")]
    InvalidUtf8,
}

/// Codec for ServerLine (encoding) and raw client lines (decoding)
/// Used by the server side
pub struct ServerCodec;

impl ServerCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ServerCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ServerCodec {
    type Item = String;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        decode_line(src, false)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        decode_line(src, true)
    }
}

impl Encoder<ServerLine> for ServerCodec {
    type Error = CodecError;

    fn encode(&mut self, item: ServerLine, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_line(&item.to_string(), dst)
    }
}

/// Codec for raw client lines (encoding) and ServerLine (decoding)
/// Used by the client side
pub struct ClientCodec;

impl ClientCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ClientCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ClientCodec {
    type Item = ServerLine;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        Ok(decode_line(src, false)?.map(|line| ServerLine::parse(&line)))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        Ok(decode_line(src, true)?.map(|line| ServerLine::parse(&line)))
    }
}

impl Encoder<String> for ClientCodec {
    type Error = CodecError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_line(&item, dst)
    }
}

/// Decode one newline-terminated line; at EOF the final unterminated
/// line (if any) is delivered as-is.
fn decode_line(src: &mut BytesMut, eof: bool) -> Result<Option<String>, CodecError> {
    let newline = src.iter().position(|b| *b == b'\n');

    let raw = match newline {
        Some(pos) => {
            if pos > MAX_LINE_LENGTH {
                return Err(CodecError::LineTooLong {
                    len: pos,
                    max: MAX_LINE_LENGTH,
                });
            }
            let mut frame = src.split_to(pos + 1);
            frame.truncate(pos);
            frame
        }
        None if src.len() > MAX_LINE_LENGTH => {
            return Err(CodecError::LineTooLong {
                len: src.len(),
                max: MAX_LINE_LENGTH,
            });
        }
        None if eof && !src.is_empty() => src.split(),
        None => return Ok(None),
    };

    let line = match raw.last() {
        Some(b'\r') => &raw[..raw.len() - 1],
        _ => &raw[..],
    };

    std::str::from_utf8(line)
        .map(|s| Some(s.to_string()))
        .map_err(|_| CodecError::InvalidUtf8)
}

/// Encode a line with its `\n` terminator
fn encode_line(line: &str, dst: &mut BytesMut) -> Result<(), CodecError> {
    if line.len() > MAX_LINE_LENGTH {
        return Err(CodecError::LineTooLong {
            len: line.len(),
            max: MAX_LINE_LENGTH,
        });
    }

    dst.reserve(line.len() + 1);
    dst.put_slice(line.as_bytes());
    dst.put_u8(b'\n');
    Ok(())
}
