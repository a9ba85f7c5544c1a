//! RESP wire support for the admin transports.
//!
//! Only the RESP2 subset that introspection and `CONFIG SET` traffic needs
//! is implemented: simple strings, errors, integers, bulk strings and arrays.
//!
//! ## Modules
//!
//! - [`codec`] - Incremental encoder and decoder
//! - [`error`] - Crate error types
//! - [`frame`] - The [`Frame`](frame::Frame) value type

pub mod codec;
/// Error types.
pub mod error;
pub mod frame;

pub use frame::Frame;
