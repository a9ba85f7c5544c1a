//! # Admin facade
//!
//! [`Admin`] issues introspection and configuration commands through two
//! independently owned transports: one node used for introspection and
//! the whole cluster used for fan-out. Replies are handed to the decoders
//! in [`crate::cluster`].

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use futures::stream::{self, StreamExt};
use tracing::{debug, error, instrument, warn};

use crate::cluster::commands::{cluster_info, cluster_nodes};
use crate::cluster::{
    decode_nodes, decode_status, ClusterConnection, ClusterSummary, Nodes, Role, Slot,
};
use crate::core::builder::AdminConfig;
use crate::core::command::{config_set, expect_ok};
use crate::core::connection::NodeConnection;
use crate::core::transport::{ClusterTransport, Transport};
use crate::proto::error::{Error, Result};

mod memsize;

pub use memsize::{is_size_valued, parse_memory_size, SIZE_VALUED_KEYS};

/// Cluster administration over a node transport `N` and a cluster
/// transport `C`.
///
/// Use [`AdminBuilder`](crate::AdminBuilder) to connect to a live cluster,
/// or [`Admin::new`] to supply your own transports.
#[derive(Debug)]
pub struct Admin<N = NodeConnection, C = ClusterConnection> {
    node: N,
    cluster: C,
    config: AdminConfig,
}

impl<N, C> Admin<N, C>
where
    N: Transport,
    C: ClusterTransport,
{
    /// Creates a facade over the given transports. Only `max_in_flight` and
    /// `hash_max_slot` are read from `config`.
    pub fn new(node: N, cluster: C, config: AdminConfig) -> Self {
        Self {
            node,
            cluster,
            config,
        }
    }

    /// The introspection transport.
    pub fn node(&self) -> &N {
        &self.node
    }

    /// The fan-out transport.
    pub fn cluster(&self) -> &C {
        &self.cluster
    }

    /// Highest slot number of the cluster.
    pub fn hash_max_slot(&self) -> Slot {
        self.config.hash_max_slot
    }

    /// Fetches and decodes `CLUSTER NODES`.
    ///
    /// Lines and fields that cannot be decoded are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the command fails.
    #[instrument(skip(self), fields(address = %self.node.address()))]
    pub async fn get_topology(&self) -> Result<Nodes> {
        let cmd = cluster_nodes();
        let context = cmd.to_string();
        let text = self
            .node
            .send(cmd)
            .await
            .and_then(|frame| frame.into_text())
            .map_err(|e| Error::transport(context, e))?;

        let decoded = decode_nodes(&text);
        for diagnostic in &decoded.diagnostics {
            warn!(%diagnostic, "skipping malformed topology data");
        }
        debug!(nodes = decoded.value.len(), "topology decoded");
        Ok(decoded.value)
    }

    /// Fetches and decodes `CLUSTER INFO` into a flat map.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the command fails.
    #[instrument(skip(self), fields(address = %self.node.address()))]
    pub async fn get_status_map(&self) -> Result<HashMap<String, String>> {
        let cmd = cluster_info();
        let context = cmd.to_string();
        let text = self
            .node
            .send(cmd)
            .await
            .and_then(|frame| frame.into_text())
            .map_err(|e| Error::transport(context, e))?;
        Ok(decode_status(&text).into_value())
    }

    /// Summarizes the current topology.
    pub async fn cluster_summary(&self) -> Result<ClusterSummary> {
        let nodes = self.get_topology().await?;
        Ok(ClusterSummary::from_nodes(&nodes))
    }

    /// Applies `settings` with `CONFIG SET` on every live member with
    /// `role`.
    ///
    /// Values of [size-valued keys](SIZE_VALUED_KEYS) are converted to a
    /// byte count first; a value that does not parse is logged and that
    /// key is skipped. Keys are sent in sorted order. At most
    /// `max_in_flight` members are contacted at once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] unless `role` is master or slave.
    /// The first transport failure stops the fan-out: members not yet
    /// contacted are skipped, requests in flight complete, and that first
    /// error is returned as [`Error::Transport`].
    #[instrument(skip(self, settings), fields(keys = settings.len()))]
    pub async fn apply_config(&self, role: Role, settings: &HashMap<String, String>) -> Result<()> {
        if role == Role::Unknown {
            return Err(Error::InvalidArgument {
                message: "configuration can only target masters or slaves".to_string(),
            });
        }

        let settings = normalize_settings(settings);
        let members = self
            .cluster
            .members(role)
            .await
            .map_err(|e| Error::transport(format!("list {} members", role), e))?;
        debug!(members = members.len(), "applying configuration");

        let aborted = AtomicBool::new(false);
        let mut results = stream::iter(&members)
            .map(|member| apply_to_member(member, &settings, &aborted))
            .buffer_unordered(self.config.max_in_flight.max(1));

        let mut first_error = None;
        while let Some(result) = results.next().await {
            if let Err(e) = result {
                aborted.store(true, Ordering::SeqCst);
                error!(error = %e, "configuration fan-out failed");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Closes the introspection transport.
    pub async fn close_node(&self) -> Result<()> {
        self.node.close().await
    }

    /// Closes the fan-out transport.
    pub async fn close_cluster(&self) -> Result<()> {
        self.cluster.close().await
    }

    /// Closes both transports. Both are closed even if the first fails;
    /// the first error is returned.
    pub async fn close(&self) -> Result<()> {
        let node = self.close_node().await;
        let cluster = self.close_cluster().await;
        node.and(cluster)
    }
}

/// Sorts the settings and converts size values, dropping those that do not
/// parse.
fn normalize_settings(settings: &HashMap<String, String>) -> BTreeMap<String, String> {
    let mut normalized = BTreeMap::new();
    for (key, value) in settings {
        if !is_size_valued(key) {
            normalized.insert(key.clone(), value.clone());
            continue;
        }
        match parse_memory_size(value) {
            Ok(bytes) => {
                normalized.insert(key.clone(), bytes.to_string());
            }
            Err(e) => error!(key = %key, error = %e, "skipping configuration key"),
        }
    }
    normalized
}

async fn apply_to_member<T: Transport>(
    member: &T,
    settings: &BTreeMap<String, String>,
    aborted: &AtomicBool,
) -> Result<()> {
    for (key, value) in settings {
        if aborted.load(Ordering::SeqCst) {
            debug!(address = member.address(), "fan-out aborted, skipping member");
            return Ok(());
        }
        let cmd = config_set(key.clone(), value.clone());
        let context = format!("{} on {}", cmd, member.address());
        let reply = member.send(cmd).await.and_then(expect_ok);
        if let Err(e) = reply {
            aborted.store(true, Ordering::SeqCst);
            return Err(Error::transport(context, e));
        }
    }
    Ok(())
}
