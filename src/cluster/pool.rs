//! Connection pooling for cluster members.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::core::builder::AdminConfig;
use crate::core::connection::NodeConnection;
use crate::core::transport::Transport;
use crate::proto::error::Result;

/// Connections to cluster members keyed by node id.
///
/// A node that comes back on a different address gets a fresh connection.
#[derive(Debug, Default)]
pub struct ConnectionPool {
    connections: RwLock<HashMap<String, NodeConnection>>,
}

impl ConnectionPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the pooled connection for `node_id`, connecting to `address`
    /// when there is none or the node moved.
    pub async fn get_or_connect(
        &self,
        node_id: &str,
        address: &str,
        config: &AdminConfig,
    ) -> Result<NodeConnection> {
        {
            let conns = self.connections.read().await;
            if let Some(conn) = conns.get(node_id) {
                if conn.address() == address {
                    return Ok(conn.clone());
                }
            }
        }

        let conn = NodeConnection::connect(address, config).await?;
        let mut conns = self.connections.write().await;
        // another caller may have connected while this one was connecting
        let raced = conns
            .get(node_id)
            .filter(|current| current.address() == address)
            .cloned();
        if let Some(current) = raced {
            drop(conns);
            if let Err(e) = conn.close().await {
                warn!(node_id, error = %e, "closing spare connection failed");
            }
            return Ok(current);
        }
        let previous = conns.insert(node_id.to_string(), conn.clone());
        drop(conns);

        if let Some(previous) = previous {
            debug!(node_id, old = previous.address(), new = address, "node moved");
            previous.close().await?;
        }
        Ok(conn)
    }

    /// Closes and forgets the connections of nodes for which `keep` returns
    /// false. Returns how many were evicted.
    pub async fn retain<F>(&self, keep: F) -> usize
    where
        F: Fn(&str) -> bool,
    {
        let evicted: Vec<(String, NodeConnection)> = {
            let mut conns = self.connections.write().await;
            let gone: Vec<String> = conns.keys().filter(|id| !keep(id)).cloned().collect();
            gone.into_iter()
                .filter_map(|id| conns.remove_entry(&id))
                .collect()
        };

        let count = evicted.len();
        for (node_id, conn) in evicted {
            debug!(node_id = %node_id, address = conn.address(), "evicting departed node");
            if let Err(e) = conn.close().await {
                warn!(node_id = %node_id, error = %e, "closing evicted connection failed");
            }
        }
        count
    }

    /// Number of pooled connections.
    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Returns true if the pool holds no connection.
    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }

    /// Closes and forgets every connection.
    pub async fn close_all(&self) -> Result<()> {
        let drained: Vec<NodeConnection> = self
            .connections
            .write()
            .await
            .drain()
            .map(|(_, conn)| conn)
            .collect();
        for conn in drained {
            conn.close().await?;
        }
        Ok(())
    }
}
