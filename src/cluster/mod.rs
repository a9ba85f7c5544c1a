//! # Cluster topology
//!
//! The in-memory model of a Redis Cluster as reported by the cluster
//! itself, and the transport that reaches every member.
//!
//! ## Overview
//!
//! - **Slot algebra** ([`Slot`], [`SlotRange`], [`SlotToken`]): hash slots,
//!   ranges and migration markers
//! - **Node model** ([`Node`]): one member with its role, link state,
//!   failure flags and slots
//! - **Node collection** ([`Nodes`]): search, filter and sort over a
//!   topology snapshot
//! - **Decoders** ([`decode_nodes`], [`decode_status`]): best-effort parsing
//!   of `CLUSTER NODES` and `CLUSTER INFO` replies
//! - **Summary** ([`ClusterSummary`]): slot coverage and replication figures
//!
//! ## Example
//!
//! ```
//! use clustermap::cluster::{decode_nodes, is_master_with_slots, is_slave, Order};
//!
//! let raw = "\
//! e7d1 127.0.0.1:30001@31001 myself,master - 0 0 1 connected 0-5460
//! 67ed 127.0.0.1:30002@31002 master - 0 1426238316232 2 connected 5461-10922
//! 292f 127.0.0.1:30003@31003 master - 0 1426238318243 3 connected 10923-16383
//! 07c3 127.0.0.1:30004@31004 slave e7d1 0 1426238317239 4 connected
//! ";
//! let nodes = decode_nodes(raw).into_value();
//!
//! assert_eq!(nodes.find_all(is_master_with_slots)?.len(), 3);
//! assert_eq!(nodes.count(is_slave), 1);
//! assert_eq!(nodes.sort_by_id(Order::Ascending).iter().next().unwrap().id, "07c3");
//! # Ok::<(), clustermap::Error>(())
//! ```

mod client;
pub mod commands;
mod decode;
mod node;
mod nodes;
mod pool;
mod slot;
mod status;

pub use client::{is_live, ClusterConnection};
pub use decode::{decode_nodes, decode_status, Decoded, Diagnostic, NODE_LINE_FIELDS};
pub use node::{FailStatus, LinkState, Node, Role, DEFAULT_PORT};
pub use nodes::{
    is_master_with_slots, is_master_without_slots, is_slave, less_by_id, more_by_id, Nodes, Order,
};
pub use pool::ConnectionPool;
pub use slot::{key_slot, Slot, SlotRange, SlotRanges, SlotToken, SLOT_COUNT};
pub use status::{ClusterStatus, ClusterSummary, NodeSummary, NodesPlacement};
