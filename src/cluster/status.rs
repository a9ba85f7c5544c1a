//! Health summary of a decoded topology.

use std::collections::{HashMap, HashSet};
use std::fmt;

use super::node::{FailStatus, Role};
use super::nodes::{is_master_with_slots, Nodes};
use super::slot::{Slot, SLOT_COUNT};

/// Overall state of a cluster as seen by an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub enum ClusterStatus {
    /// Every slot served, nothing moving.
    #[cfg_attr(feature = "json", serde(rename = "OK"))]
    Ok,
    /// Slots unowned, doubly owned, in flight, or a node failed.
    #[cfg_attr(feature = "json", serde(rename = "KO"))]
    Ko,
    /// Nodes are being added or removed.
    Scaling,
    /// A slot rebalancing plan is being computed.
    #[cfg_attr(feature = "json", serde(rename = "Calculating Rebalancing"))]
    CalculatingRebalancing,
    /// Slots are being moved.
    Rebalancing,
    /// Nodes are being restarted one at a time.
    RollingUpdate,
}

impl ClusterStatus {
    /// Display spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            ClusterStatus::Ok => "OK",
            ClusterStatus::Ko => "KO",
            ClusterStatus::Scaling => "Scaling",
            ClusterStatus::CalculatingRebalancing => "Calculating Rebalancing",
            ClusterStatus::Rebalancing => "Rebalancing",
            ClusterStatus::RollingUpdate => "RollingUpdate",
        }
    }
}

impl fmt::Display for ClusterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How masters are spread over hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub enum NodesPlacement {
    /// At least two slot-owning masters share a host.
    BestEffort,
    /// One slot-owning master per host.
    Optimal,
}

impl fmt::Display for NodesPlacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodesPlacement::BestEffort => f.write_str("BestEffort"),
            NodesPlacement::Optimal => f.write_str("Optimal"),
        }
    }
}

/// One row of a [`ClusterSummary`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct NodeSummary {
    /// Node id.
    pub id: String,
    /// Effective role.
    pub role: Role,
    /// Host.
    pub ip: String,
    /// Client port.
    pub port: u16,
    /// Owned slots as range tokens.
    pub slots: Vec<String>,
    /// Replicated master id, empty for masters.
    pub master_ref: String,
    /// External resource the node runs in, if known.
    pub bound_resource: Option<String>,
}

/// Snapshot-level figures derived from a [`Nodes`] collection.
///
/// ```
/// use clustermap::cluster::{decode_nodes, ClusterStatus, ClusterSummary};
///
/// let nodes = decode_nodes(
///     "a 10.0.0.1:6379@16379 master - 0 0 1 connected 0-16383\n\
///      b 10.0.0.2:6379@16379 slave a 0 0 1 connected\n",
/// )
/// .into_value();
/// let summary = ClusterSummary::from_nodes(&nodes);
/// assert_eq!(summary.status, ClusterStatus::Ok);
/// assert_eq!(summary.number_of_masters, 1);
/// assert_eq!(summary.min_replication_factor, 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct ClusterSummary {
    /// [`ClusterStatus::Ok`] or [`ClusterStatus::Ko`].
    pub status: ClusterStatus,
    /// Masters owning at least one slot.
    pub number_of_masters: usize,
    /// Fewest replicas of any slot-owning master.
    pub min_replication_factor: usize,
    /// Most replicas of any slot-owning master.
    pub max_replication_factor: usize,
    /// Spread of slot-owning masters over hosts.
    pub nodes_placement: NodesPlacement,
    /// Per-node rows in collection order.
    pub nodes: Vec<NodeSummary>,
}

impl ClusterSummary {
    /// Summarizes `nodes`.
    pub fn from_nodes(nodes: &Nodes) -> Self {
        let masters = nodes.filter(is_master_with_slots);

        let factors: Vec<usize> = masters
            .iter()
            .map(|m| nodes.replicas_of(&m.id).len())
            .collect();
        let min_replication_factor = factors.iter().copied().min().unwrap_or(0);
        let max_replication_factor = factors.iter().copied().max().unwrap_or(0);

        let mut hosts = HashSet::new();
        let nodes_placement = if masters.iter().all(|m| hosts.insert(m.ip.as_str())) {
            NodesPlacement::Optimal
        } else {
            NodesPlacement::BestEffort
        };

        let rows = nodes
            .iter()
            .map(|n| NodeSummary {
                id: n.id.clone(),
                role: n.role(),
                ip: n.ip.clone(),
                port: n.port,
                slots: n.slot_ranges().tokens(),
                master_ref: n.master_referent().to_string(),
                bound_resource: n.bound_resource.clone(),
            })
            .collect();

        Self {
            status: health(nodes),
            number_of_masters: masters.len(),
            min_replication_factor,
            max_replication_factor,
            nodes_placement,
            nodes: rows,
        }
    }

    /// Renders the summary as JSON.
    #[cfg(feature = "json")]
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

fn health(nodes: &Nodes) -> ClusterStatus {
    let failed = nodes.iter().any(|n| n.has_fail_status(FailStatus::Fail));
    let moving = nodes
        .iter()
        .any(|n| !n.migrating_slots.is_empty() || !n.importing_slots.is_empty());
    if failed || moving {
        return ClusterStatus::Ko;
    }

    let mut owners: HashMap<Slot, usize> = HashMap::with_capacity(SLOT_COUNT as usize);
    for node in nodes.iter().filter(|n| n.role() == Role::Master) {
        for slot in &node.slots {
            *owners.entry(*slot).or_default() += 1;
        }
    }
    if owners.len() == SLOT_COUNT as usize && owners.values().all(|count| *count == 1) {
        ClusterStatus::Ok
    } else {
        ClusterStatus::Ko
    }
}
