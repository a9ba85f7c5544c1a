//! The RPC boundary between the admin facade and the network.

use std::future::Future;

use crate::cluster::Role;
use crate::core::command::Cmd;
use crate::proto::error::Result;
use crate::proto::frame::Frame;

/// A single-node request/response channel.
///
/// Implementations do not retry; a failed request is reported as is.
pub trait Transport: Send + Sync {
    /// Address of the peer, for logs and error context.
    fn address(&self) -> &str;

    /// Sends one command and waits for its reply.
    fn send(&self, cmd: Cmd) -> impl Future<Output = Result<Frame>> + Send;

    /// Releases the connection. Later calls to `send` fail with
    /// [`Error::Closed`](crate::Error::Closed).
    fn close(&self) -> impl Future<Output = Result<()>> + Send;
}

/// Access to every member of a cluster.
pub trait ClusterTransport: Send + Sync {
    /// Transport to one member.
    type Member: Transport;

    /// Live members with the given role: no `fail`/`fail?` flag and a
    /// connected cluster-bus link.
    fn members(&self, role: Role) -> impl Future<Output = Result<Vec<Self::Member>>> + Send;

    /// Releases every member connection.
    fn close(&self) -> impl Future<Output = Result<()>> + Send;
}
