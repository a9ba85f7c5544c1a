//! Incremental RESP encoder and decoder.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::proto::error::{Error, Result};
use crate::proto::frame::Frame;

const DEFAULT_MAX_FRAME_SIZE: usize = 512 * 1024 * 1024; // 512 MB default

/// Encodes [`Frame`]s into an internal buffer.
///
/// # Example
///
/// ```
/// use clustermap::proto::codec::Encoder;
/// use clustermap::proto::Frame;
///
/// let mut encoder = Encoder::new();
/// encoder.encode(&Frame::SimpleString(b"OK".to_vec()));
/// assert_eq!(&encoder.take()[..], b"+OK\r\n");
/// ```
#[derive(Debug, Default)]
pub struct Encoder {
    buf: BytesMut,
}

impl Encoder {
    /// Creates a new encoder with an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the RESP encoding of `frame` to the buffer.
    pub fn encode(&mut self, frame: &Frame) {
        match frame {
            Frame::SimpleString(s) => self.put_line(b'+', s),
            Frame::Error(e) => self.put_line(b'-', e),
            Frame::Integer(n) => self.put_line(b':', n.to_string().as_bytes()),
            Frame::BulkString(None) => self.put_line(b'$', b"-1"),
            Frame::BulkString(Some(data)) => {
                self.put_line(b'$', data.len().to_string().as_bytes());
                self.buf.extend_from_slice(data);
                self.buf.extend_from_slice(b"\r\n");
            }
            Frame::Array(items) => {
                self.put_line(b'*', items.len().to_string().as_bytes());
                for item in items {
                    self.encode(item);
                }
            }
            Frame::Null => self.put_line(b'*', b"-1"),
        }
    }

    /// Takes the encoded bytes, leaving the buffer empty.
    pub fn take(&mut self) -> Bytes {
        self.buf.split().freeze()
    }

    fn put_line(&mut self, prefix: u8, body: &[u8]) {
        self.buf.put_u8(prefix);
        self.buf.extend_from_slice(body);
        self.buf.extend_from_slice(b"\r\n");
    }
}

/// Decodes [`Frame`]s from bytes arriving in arbitrary chunks.
///
/// Call [`append`](Decoder::append) with new data and then
/// [`decode`](Decoder::decode) until it returns `Ok(None)`. A frame is only
/// consumed from the buffer once it is complete.
///
/// # Example
///
/// ```
/// use clustermap::proto::codec::Decoder;
/// use clustermap::proto::Frame;
///
/// let mut decoder = Decoder::new();
/// decoder.append(b"$5\r\nhel");
/// assert!(decoder.decode().unwrap().is_none());
/// decoder.append(b"lo\r\n");
/// assert_eq!(decoder.decode().unwrap(), Some(Frame::bulk("hello")));
/// ```
#[derive(Debug)]
pub struct Decoder {
    buf: BytesMut,
    max_frame_size: usize,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder {
    /// Creates a new decoder with an empty buffer.
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Creates a new decoder rejecting frames larger than `max_frame_size` bytes.
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            max_frame_size,
        }
    }

    /// Appends raw bytes received from the network.
    pub fn append(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Number of bytes buffered but not yet decoded.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Attempts to decode one frame.
    ///
    /// Returns `Ok(None)` when more data is needed.
    pub fn decode(&mut self) -> Result<Option<Frame>> {
        if self.buf.is_empty() {
            return Ok(None);
        }
        match self.parse(0)? {
            Some((frame, consumed)) => {
                self.buf.advance(consumed);
                Ok(Some(frame))
            }
            None if self.buf.len() > self.max_frame_size => Err(protocol(
                "buffered frame exceeds maximum frame size".to_string(),
            )),
            None => Ok(None),
        }
    }

    /// Parses the frame starting at `pos`, returning it with the position
    /// just past its end.
    fn parse(&self, pos: usize) -> Result<Option<(Frame, usize)>> {
        let Some(&prefix) = self.buf.get(pos) else {
            return Ok(None);
        };
        let Some((line, next)) = self.line(pos + 1) else {
            return Ok(None);
        };

        match prefix {
            b'+' => Ok(Some((Frame::SimpleString(line.to_vec()), next))),
            b'-' => Ok(Some((Frame::Error(line.to_vec()), next))),
            b':' => Ok(Some((Frame::Integer(parse_int(line)?), next))),
            b'$' => {
                let len = parse_int(line)?;
                if len < 0 {
                    return Ok(Some((Frame::BulkString(None), next)));
                }
                let len = len as usize;
                if len > self.max_frame_size {
                    return Err(protocol(format!(
                        "bulk string of {} bytes exceeds maximum frame size",
                        len
                    )));
                }
                let end = next + len;
                if self.buf.len() < end + 2 {
                    return Ok(None);
                }
                if &self.buf[end..end + 2] != b"\r\n" {
                    return Err(protocol("bulk string not terminated by CRLF".to_string()));
                }
                let data = Bytes::copy_from_slice(&self.buf[next..end]);
                Ok(Some((Frame::BulkString(Some(data)), end + 2)))
            }
            b'*' => {
                let len = parse_int(line)?;
                if len < 0 {
                    return Ok(Some((Frame::Null, next)));
                }
                let len = len as usize;
                // every element needs at least 3 bytes ("+\r\n")
                if len > self.max_frame_size / 3 {
                    return Err(protocol(format!("array of {} elements is too large", len)));
                }
                let mut items = Vec::with_capacity(len.min(1024));
                let mut cursor = next;
                for _ in 0..len {
                    match self.parse(cursor)? {
                        Some((item, after)) => {
                            items.push(item);
                            cursor = after;
                        }
                        None => return Ok(None),
                    }
                }
                Ok(Some((Frame::Array(items), cursor)))
            }
            other => Err(protocol(format!("unknown frame type byte 0x{:02x}", other))),
        }
    }

    /// Returns the bytes up to the next CRLF at or after `start`, and the
    /// position following the CRLF.
    fn line(&self, start: usize) -> Option<(&[u8], usize)> {
        let rest = self.buf.get(start..)?;
        let offset = rest.windows(2).position(|w| w == b"\r\n")?;
        Some((&rest[..offset], start + offset + 2))
    }
}

fn parse_int(line: &[u8]) -> Result<i64> {
    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| protocol(format!("invalid integer '{}'", String::from_utf8_lossy(line))))
}

fn protocol(message: String) -> Error {
    Error::Protocol { message }
}
