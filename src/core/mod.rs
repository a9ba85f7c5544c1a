//! # Transport core
//!
//! The network side of the admin facade: command construction, the
//! [`Transport`](transport::Transport) boundary, a TCP implementation of it
//! and the builder that configures everything.
//!
//! ## Modules
//!
//! - [`builder`] - Admin builder and resolved configuration
//! - [`command`] - Command builders
//! - [`connection`] - RESP connection and single-node transport
//! - [`transport`] - Transport traits
//!

pub use crate::proto::error::{Error, Result};

/// Admin builder configuration.
pub mod builder;
/// Command construction helpers.
pub mod command;
/// Low-level connection management.
pub mod connection;
/// Transport traits.
pub mod transport;
