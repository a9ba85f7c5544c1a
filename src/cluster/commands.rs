//! Redis Cluster introspection command builders.

use crate::core::command::Cmd;

/// Creates a CLUSTER NODES command.
///
/// The reply is a bulk string with one line per node: id, address, flags,
/// master, ping/pong times, config epoch, link state and served slots.
/// See [`decode_nodes`](super::decode_nodes).
pub fn cluster_nodes() -> Cmd {
    Cmd::new("CLUSTER").arg("NODES")
}

/// Creates a CLUSTER INFO command.
///
/// The reply is a bulk string of `key:value` lines, including:
/// - cluster_state (ok/fail)
/// - cluster_slots_assigned
/// - cluster_slots_ok
/// - cluster_slots_pfail
/// - cluster_slots_fail
/// - cluster_known_nodes
/// - cluster_size
///
/// See [`decode_status`](super::decode_status).
pub fn cluster_info() -> Cmd {
    Cmd::new("CLUSTER").arg("INFO")
}
