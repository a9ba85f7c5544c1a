use std::fmt;

use bytes::Bytes;

use crate::proto::error::{Error, Result};
use crate::proto::frame::Frame;

/// A command ready to be sent to a node.
///
/// Commands are built with the builder pattern and turned into a RESP array
/// for transmission.
///
/// # Example
///
/// ```
/// use clustermap::core::command::{config_set, Cmd};
///
/// let cmd = Cmd::new("CLUSTER").arg("NODES");
/// assert_eq!(cmd.to_string(), "CLUSTER NODES");
/// assert_eq!(config_set("maxmemory", "1048576").to_string(), "CONFIG SET maxmemory");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Cmd {
    args: Vec<Bytes>,
}

impl Cmd {
    /// Creates a new command with the given name.
    #[inline]
    pub fn new(name: impl Into<Bytes>) -> Self {
        Self {
            args: vec![name.into()],
        }
    }

    /// Appends an argument to the command.
    #[inline]
    pub fn arg<T: Into<Bytes>>(mut self, arg: T) -> Self {
        self.args.push(arg.into());
        self
    }

    /// The command name and arguments.
    pub fn args(&self) -> &[Bytes] {
        &self.args
    }

    /// Converts the command to a RESP array frame.
    #[inline]
    pub fn into_frame(self) -> Frame {
        Frame::Array(self.args.into_iter().map(|b| Frame::BulkString(Some(b))).collect())
    }
}

/// Renders the command for logs and error context. Only the command name
/// and, for container commands, the subcommand and key are shown, so
/// passwords and configuration values stay out of logs.
impl fmt::Display for Cmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = match self.args.first().map(|a| &a[..]) {
            Some(b"CONFIG") => 3,
            Some(b"CLUSTER") => 2,
            _ => 1,
        };
        for (i, arg) in self.args.iter().take(shown).enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(&String::from_utf8_lossy(arg))?;
        }
        Ok(())
    }
}

/// Creates a PING command.
#[inline]
pub fn ping() -> Cmd {
    Cmd::new("PING")
}

/// Creates an AUTH command.
#[inline]
pub fn auth(password: impl Into<Bytes>) -> Cmd {
    Cmd::new("AUTH").arg(password)
}

/// Creates a CONFIG SET command for a single parameter.
#[inline]
pub fn config_set(key: impl Into<Bytes>, value: impl Into<Bytes>) -> Cmd {
    Cmd::new("CONFIG").arg("SET").arg(key).arg(value)
}

/// Checks that a reply is `+OK`.
pub fn expect_ok(frame: Frame) -> Result<()> {
    match frame {
        Frame::SimpleString(s) if s == b"OK" => Ok(()),
        Frame::Error(e) => Err(Error::Server {
            message: String::from_utf8_lossy(&e).into_owned(),
        }),
        other => Err(Error::Protocol {
            message: format!("expected +OK, got {}", other.kind()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cmd_into_frame() {
        let frame = config_set("maxmemory", "100").into_frame();
        assert_eq!(
            frame,
            Frame::Array(vec![
                Frame::bulk("CONFIG"),
                Frame::bulk("SET"),
                Frame::bulk("maxmemory"),
                Frame::bulk("100"),
            ])
        );
    }

    #[test]
    fn test_cmd_display_hides_values() {
        assert_eq!(auth("secret").to_string(), "AUTH");
        assert_eq!(config_set("maxmemory", "100").to_string(), "CONFIG SET maxmemory");
        assert_eq!(ping().to_string(), "PING");
    }

    #[test]
    fn test_expect_ok() {
        assert!(expect_ok(Frame::SimpleString(b"OK".to_vec())).is_ok());
        assert!(matches!(
            expect_ok(Frame::Error(b"ERR nope".to_vec())),
            Err(Error::Server { .. })
        ));
        assert!(matches!(
            expect_ok(Frame::Integer(1)),
            Err(Error::Protocol { .. })
        ));
    }
}
