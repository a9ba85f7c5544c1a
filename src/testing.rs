//! In-memory transports for tests.
//!
//! [`MockNode`] answers commands from a handler and records what it was
//! sent; [`MockCluster`] hands out mock members per role. Both honor
//! `close()` the way the TCP transports do.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::cluster::Role;
use crate::core::command::Cmd;
use crate::core::transport::{ClusterTransport, Transport};
use crate::proto::error::{Error, Result};
use crate::proto::frame::Frame;

type Handler = dyn Fn(&Cmd) -> Result<Frame> + Send + Sync;

/// A scripted single-node transport.
#[derive(Clone)]
pub struct MockNode {
    address: Arc<str>,
    handler: Arc<Handler>,
    sent: Arc<Mutex<Vec<Cmd>>>,
    closed: Arc<AtomicBool>,
}

impl MockNode {
    /// Creates a node answering every command with `handler`.
    pub fn new<F>(address: &str, handler: F) -> Self
    where
        F: Fn(&Cmd) -> Result<Frame> + Send + Sync + 'static,
    {
        Self {
            address: Arc::from(address),
            handler: Arc::new(handler),
            sent: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A node answering every command with the bulk string `text`.
    pub fn with_text(address: &str, text: &str) -> Self {
        let text = text.to_string();
        Self::new(address, move |_| Ok(Frame::bulk(text.clone())))
    }

    /// A node answering every command with `+OK`.
    pub fn ok(address: &str) -> Self {
        Self::new(address, |_| Ok(Frame::SimpleString(b"OK".to_vec())))
    }

    /// A node whose every request fails at the transport level.
    pub fn unreachable(address: &str) -> Self {
        Self::new(address, |_| {
            Err(Error::Io {
                source: std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer"),
            })
        })
    }

    /// Commands received so far, oldest first.
    pub fn sent(&self) -> Vec<Cmd> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Returns true once `close` was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for MockNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockNode")
            .field("address", &self.address)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Transport for MockNode {
    fn address(&self) -> &str {
        &self.address
    }

    async fn send(&self, cmd: Cmd) -> Result<Frame> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        let reply = (self.handler)(&cmd);
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(cmd);
        }
        // let concurrently dispatched requests interleave
        tokio::task::yield_now().await;
        reply
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// A scripted cluster of [`MockNode`]s.
#[derive(Debug, Clone, Default)]
pub struct MockCluster {
    members: HashMap<Role, Vec<MockNode>>,
    lookups: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
}

impl MockCluster {
    /// Creates a cluster without members.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a live member with the given role.
    pub fn with_member(mut self, role: Role, node: MockNode) -> Self {
        self.members.entry(role).or_default().push(node);
        self
    }

    /// Number of `members` calls so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Returns true once `close` was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl ClusterTransport for MockCluster {
    type Member = MockNode;

    async fn members(&self, role: Role) -> Result<Vec<MockNode>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.is_closed() {
            return Err(Error::Closed);
        }
        Ok(self.members.get(&role).cloned().unwrap_or_default())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        for node in self.members.values().flatten() {
            node.close().await?;
        }
        Ok(())
    }
}
