//! RESP frame values.

use bytes::Bytes;

use crate::proto::error::{Error, Result};

/// A RESP (Redis Serialization Protocol) frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Simple string (+OK).
    SimpleString(Vec<u8>),
    /// Error (-ERR).
    Error(Vec<u8>),
    /// Integer (:1000).
    Integer(i64),
    /// Bulk string ($6\r\nfoobar).
    BulkString(Option<Bytes>),
    /// Array (*2\r\n...).
    Array(Vec<Frame>),
    /// Null array (*-1).
    Null,
}

impl Frame {
    /// Creates a bulk string frame from anything convertible to [`Bytes`].
    pub fn bulk(data: impl Into<Bytes>) -> Self {
        Frame::BulkString(Some(data.into()))
    }

    /// Converts a textual reply into an owned string.
    ///
    /// Error replies become [`Error::Server`]; non-text replies are a
    /// protocol error. Introspection commands such as `CLUSTER NODES`
    /// answer with a bulk string, `CONFIG SET` with `+OK`.
    pub fn into_text(self) -> Result<String> {
        match self {
            Frame::SimpleString(data) => Ok(String::from_utf8_lossy(&data).into_owned()),
            Frame::BulkString(Some(data)) => Ok(String::from_utf8_lossy(&data).into_owned()),
            Frame::Error(data) => Err(Error::Server {
                message: String::from_utf8_lossy(&data).into_owned(),
            }),
            other => Err(Error::Protocol {
                message: format!("expected a text reply, got {}", other.kind()),
            }),
        }
    }

    /// Short name of the frame type, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::SimpleString(_) => "simple string",
            Frame::Error(_) => "error",
            Frame::Integer(_) => "integer",
            Frame::BulkString(Some(_)) => "bulk string",
            Frame::BulkString(None) => "null bulk string",
            Frame::Array(_) => "array",
            Frame::Null => "null",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_text_bulk() {
        let frame = Frame::bulk("abc 127.0.0.1:7000@17000 master - 0 0 1 connected 0-100\n");
        assert_eq!(
            frame.into_text().unwrap(),
            "abc 127.0.0.1:7000@17000 master - 0 0 1 connected 0-100\n"
        );
    }

    #[test]
    fn test_into_text_simple() {
        let frame = Frame::SimpleString(b"OK".to_vec());
        assert_eq!(frame.into_text().unwrap(), "OK");
    }

    #[test]
    fn test_into_text_error_reply() {
        let frame = Frame::Error(b"ERR Unsupported CONFIG parameter: foo".to_vec());
        match frame.into_text() {
            Err(Error::Server { message }) => {
                assert_eq!(message, "ERR Unsupported CONFIG parameter: foo")
            }
            other => panic!("Expected Server error, got {:?}", other),
        }
    }

    #[test]
    fn test_into_text_unexpected_type() {
        assert!(matches!(
            Frame::Integer(1).into_text(),
            Err(Error::Protocol { .. })
        ));
        assert!(matches!(
            Frame::BulkString(None).into_text(),
            Err(Error::Protocol { .. })
        ));
    }
}
