use std::io;

use thiserror::Error;

/// Result type alias for clustermap operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to callers of the topology model and admin facade.
///
/// Malformed introspection text never produces an `Error`; it degrades into
/// [`ParseError`] diagnostics instead. Only lookups and transport problems
/// are propagated.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// An IO error occurred.
    #[error("IO error: {source}")]
    Io {
        /// The underlying IO error.
        #[from]
        source: io::Error,
    },

    /// The peer sent bytes that are not valid RESP, or an unexpected reply type.
    #[error("protocol error: {message}")]
    Protocol {
        /// Description of the error.
        message: String,
    },

    /// The server answered with an error reply.
    #[error("server error: {message}")]
    Server {
        /// Error message from server.
        message: String,
    },

    /// Authentication failed.
    #[error("authentication failed")]
    Auth,

    /// Invalid argument provided.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of invalid argument.
        message: String,
    },

    /// A lookup on a node collection matched nothing.
    #[error("node not found: {what}")]
    NotFound {
        /// What was searched for.
        what: String,
    },

    /// An RPC to a cluster member failed.
    #[error("{context}: {source}")]
    Transport {
        /// The operation that was being performed.
        context: String,
        /// The underlying failure.
        #[source]
        source: Box<Error>,
    },

    /// The connection was closed by its owner.
    #[error("connection closed")]
    Closed,
}

impl Error {
    /// Wraps `source` as a transport failure of the operation described by `context`.
    pub fn transport(context: impl Into<String>, source: Error) -> Self {
        Error::Transport {
            context: context.into(),
            source: Box::new(source),
        }
    }

    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        Error::NotFound { what: what.into() }
    }

    /// Returns true for [`Error::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

/// A localized, non-fatal decoding failure.
///
/// These are collected as diagnostics by the decoders and logged by the
/// admin facade. They never abort decoding of the remaining input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// A slot token from a node line could not be decoded.
    #[error("invalid slot token '{token}'")]
    InvalidSlotToken {
        /// The offending token.
        token: String,
    },

    /// The `ip:port` part of a node address could not be split.
    #[error("invalid address '{address}': {reason}")]
    InvalidAddress {
        /// The raw address field.
        address: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A numeric field could not be parsed.
    #[error("invalid {field} value '{value}'")]
    InvalidNumber {
        /// Name of the field.
        field: &'static str,
        /// The raw value.
        value: String,
    },

    /// A node line had fewer positional fields than required.
    #[error("expected at least {expected} fields, got {found}")]
    TooFewFields {
        /// Minimum number of fields.
        expected: usize,
        /// Number of fields present.
        found: usize,
    },

    /// A memory-size configuration value could not be converted to bytes.
    #[error("invalid memory size '{value}'")]
    InvalidSize {
        /// The raw value.
        value: String,
    },

    /// A node line repeats the id of an earlier line.
    #[error("duplicate node id '{id}'")]
    DuplicateId {
        /// The repeated id.
        id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_io() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused");
        let error = Error::Io { source: io_err };
        assert!(error.to_string().contains("IO error"));
    }

    #[test]
    fn test_error_display_not_found() {
        let error = Error::not_found("id abcd");
        assert_eq!(error.to_string(), "node not found: id abcd");
        assert!(error.is_not_found());
    }

    #[test]
    fn test_error_display_transport() {
        let error = Error::transport(
            "CLUSTER NODES",
            Error::Server {
                message: "ERR This instance has cluster support disabled".to_string(),
            },
        );
        assert_eq!(
            error.to_string(),
            "CLUSTER NODES: server error: ERR This instance has cluster support disabled"
        );
        assert!(!error.is_not_found());
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::Other, "test");
        let error: Error = io_err.into();
        assert!(matches!(error, Error::Io { .. }));
    }

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::InvalidNumber {
            field: "config epoch",
            value: "x1".to_string(),
        };
        assert_eq!(err.to_string(), "invalid config epoch value 'x1'");

        let err = ParseError::TooFewFields {
            expected: 8,
            found: 3,
        };
        assert_eq!(err.to_string(), "expected at least 8 fields, got 3");
    }
}
