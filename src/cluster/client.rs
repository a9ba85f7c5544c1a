//! Whole-cluster transport.
//!
//! [`ClusterConnection`] discovers the members of a cluster from its seed
//! addresses with `CLUSTER NODES` and hands out pooled connections to the
//! live ones.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, instrument, trace, warn};

use crate::core::builder::AdminConfig;
use crate::core::connection::NodeConnection;
use crate::core::transport::{ClusterTransport, Transport};
use crate::proto::error::{Error, Result};

use super::commands::cluster_nodes;
use super::decode::decode_nodes;
use super::node::{FailStatus, LinkState, Node, Role};
use super::nodes::Nodes;
use super::pool::ConnectionPool;

/// Returns true if `node` can be reached: no `fail` or `fail?` flag, a
/// connected link and a known address.
pub fn is_live(node: &Node) -> bool {
    !node.has_fail_status(FailStatus::Fail)
        && !node.has_fail_status(FailStatus::PossibleFail)
        && node.link_state() == Some(LinkState::Connected)
        && !node.ip.is_empty()
}

/// Connections to every member of a cluster.
///
/// Members are rediscovered on each [`members`](ClusterTransport::members)
/// call; connections are created lazily and reused across calls, and the
/// connections of nodes that left the cluster or stopped being live are
/// closed. Clones share the pool.
#[derive(Debug, Clone)]
pub struct ClusterConnection {
    config: Arc<AdminConfig>,
    pool: Arc<ConnectionPool>,
    closed: Arc<AtomicBool>,
}

impl ClusterConnection {
    /// Creates a cluster transport over the seeds of `config`. Nothing is
    /// connected until members are requested.
    pub fn new(config: AdminConfig) -> Self {
        Self {
            config: Arc::new(config),
            pool: Arc::new(ConnectionPool::new()),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Fetches the topology from the first seed that answers.
    ///
    /// # Errors
    ///
    /// Returns the error of the last seed tried when none answers.
    pub async fn discover(&self) -> Result<Nodes> {
        let mut last_error = None;
        for seed in &self.config.seeds {
            match self.fetch_nodes(seed).await {
                Ok(nodes) => return Ok(nodes),
                Err(e) => {
                    warn!(seed = %seed, error = %e, "topology discovery failed");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| Error::InvalidArgument {
            message: "no seed address configured".to_string(),
        }))
    }

    async fn fetch_nodes(&self, seed: &str) -> Result<Nodes> {
        let conn = NodeConnection::connect(seed, &self.config).await?;
        let reply = conn.send(cluster_nodes()).await;
        conn.close().await?;

        let decoded = decode_nodes(&reply?.into_text()?);
        for diagnostic in &decoded.diagnostics {
            trace!(seed, %diagnostic, "skipped while discovering members");
        }
        Ok(decoded.value)
    }

    /// Number of members with an open pooled connection.
    pub async fn pooled(&self) -> usize {
        self.pool.len().await
    }
}

impl ClusterTransport for ClusterConnection {
    type Member = NodeConnection;

    #[instrument(skip(self), level = "debug")]
    async fn members(&self, role: Role) -> Result<Vec<NodeConnection>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Closed);
        }

        let nodes = self.discover().await?;
        let reachable: HashSet<&str> = nodes
            .iter()
            .filter(|n| is_live(n))
            .map(|n| n.id.as_str())
            .collect();
        let evicted = self.pool.retain(|id| reachable.contains(id)).await;

        let live = nodes.filter(|n| n.role() == role && is_live(n));
        debug!(known = nodes.len(), selected = live.len(), evicted, "resolved members");

        let mut members = Vec::with_capacity(live.len());
        for node in &live {
            let conn = self
                .pool
                .get_or_connect(&node.id, &node.ip_port(), &self.config)
                .await?;
            members.push(conn);
        }
        Ok(members)
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.pool.close_all().await
    }
}
