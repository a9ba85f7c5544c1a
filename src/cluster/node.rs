//! A single cluster member as reported by `CLUSTER NODES`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use chrono::{DateTime, Utc};

use super::slot::{Slot, SlotRanges};

/// Port assumed when a node address does not carry one.
pub const DEFAULT_PORT: u16 = 6379;

/// Role of a cluster node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "json", derive(serde::Serialize), serde(rename_all = "lowercase"))]
pub enum Role {
    /// Node owns slots and serves writes for them.
    Master,
    /// Node replicates a master.
    Slave,
    /// Neither flagged nor inferable; displayed as `none`.
    #[cfg_attr(feature = "json", serde(rename = "none"))]
    Unknown,
}

impl Role {
    /// Wire spelling of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Master => "master",
            Role::Slave => "slave",
            Role::Unknown => "none",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of the cluster-bus link to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "json", derive(serde::Serialize), serde(rename_all = "lowercase"))]
pub enum LinkState {
    /// Link is up.
    Connected,
    /// Link is down.
    Disconnected,
}

impl LinkState {
    /// Wire spelling of the link state.
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkState::Connected => "connected",
            LinkState::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkState {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "connected" => Ok(LinkState::Connected),
            "disconnected" => Ok(LinkState::Disconnected),
            _ => Err(()),
        }
    }
}

/// Failure-related flags a node may carry, several at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "json", derive(serde::Serialize), serde(rename_all = "lowercase"))]
pub enum FailStatus {
    /// `fail`: the majority of masters agreed the node is unreachable.
    Fail,
    /// `fail?`: unreachable from the reporting node only (PFAIL).
    #[cfg_attr(feature = "json", serde(rename = "fail?"))]
    PossibleFail,
    /// `handshake`: untrusted node, handshake in progress.
    Handshake,
    /// `noaddr`: no address known for the node.
    NoAddr,
    /// `noflags`: no flags at all.
    NoFlags,
}

impl FailStatus {
    /// Wire spelling of the flag.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailStatus::Fail => "fail",
            FailStatus::PossibleFail => "fail?",
            FailStatus::Handshake => "handshake",
            FailStatus::NoAddr => "noaddr",
            FailStatus::NoFlags => "noflags",
        }
    }
}

impl fmt::Display for FailStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fail" => Ok(FailStatus::Fail),
            "fail?" => Ok(FailStatus::PossibleFail),
            "handshake" => Ok(FailStatus::Handshake),
            "noaddr" => Ok(FailStatus::NoAddr),
            "noflags" => Ok(FailStatus::NoFlags),
            _ => Err(()),
        }
    }
}

/// One member of the cluster.
///
/// Nodes are plain values: the decoder builds them through the `set_*`
/// mutators and callers treat them as read-only afterwards. Each setter
/// resets the field before applying the new flags, so decoding the same
/// line twice yields the same node.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct Node {
    /// Node id, unique within a cluster and stable across restarts.
    pub id: String,
    /// Host part of the client address; empty when unknown.
    pub ip: String,
    /// Client port.
    pub port: u16,
    /// Ping sent timestamp as reported.
    pub ping_sent: i64,
    /// Pong received timestamp as reported.
    pub pong_received: i64,
    /// Configuration epoch as reported.
    pub config_epoch: i64,
    /// Owned slots.
    pub slots: BTreeSet<Slot>,
    /// Slots this node is handing over, keyed to the destination node id.
    pub migrating_slots: BTreeMap<Slot, String>,
    /// Slots this node is receiving, keyed to the source node id.
    pub importing_slots: BTreeMap<Slot, String>,
    /// When the server process started, if known.
    pub server_start_time: Option<DateTime<Utc>>,
    /// Key of the external object (for instance `namespace/pod`) this
    /// node runs in. An association only; the node does not own it.
    pub bound_resource: Option<String>,
    role: Option<Role>,
    link_state: Option<LinkState>,
    master_referent: String,
    fail_status: Vec<FailStatus>,
    myself: bool,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            id: String::new(),
            ip: String::new(),
            port: DEFAULT_PORT,
            ping_sent: 0,
            pong_received: 0,
            config_epoch: 0,
            slots: BTreeSet::new(),
            migrating_slots: BTreeMap::new(),
            importing_slots: BTreeMap::new(),
            server_start_time: None,
            bound_resource: None,
            role: None,
            link_state: None,
            master_referent: String::new(),
            fail_status: Vec::new(),
            myself: false,
        }
    }
}

impl Node {
    /// Creates a node with the default port and no slots.
    pub fn new(
        id: impl Into<String>,
        ip: impl Into<String>,
        bound_resource: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            ip: ip.into(),
            bound_resource,
            ..Self::default()
        }
    }

    /// Sets the explicit role from a comma-separated flags field.
    ///
    /// The last of `master`/`slave` wins; without either the explicit role
    /// is cleared. `myself` is recorded separately.
    pub fn set_role(&mut self, flags: &str) {
        self.role = None;
        self.myself = false;
        for flag in flags.split(',') {
            match flag {
                "master" => self.role = Some(Role::Master),
                "slave" => self.role = Some(Role::Slave),
                "myself" => self.myself = true,
                _ => {}
            }
        }
    }

    /// Sets the link state; anything other than `connected`/`disconnected`
    /// clears it.
    pub fn set_link_status(&mut self, status: &str) {
        self.link_state = status.parse().ok();
    }

    /// Sets the failure flags from a comma-separated flags field.
    ///
    /// Unrecognized flags are ignored and duplicates collapse.
    pub fn set_failure_status(&mut self, flags: &str) {
        self.fail_status.clear();
        for status in flags.split(',').filter_map(|f| f.parse::<FailStatus>().ok()) {
            if !self.fail_status.contains(&status) {
                self.fail_status.push(status);
            }
        }
    }

    /// Sets the id of the master this node replicates; `-` means none.
    pub fn set_referent_master(&mut self, referent: &str) {
        self.master_referent.clear();
        if referent != "-" {
            self.master_referent.push_str(referent);
        }
    }

    /// The role given by the flags, if any.
    pub fn flag_role(&self) -> Option<Role> {
        self.role
    }

    /// The effective role.
    ///
    /// Explicit flags win. Otherwise a node with a master referent is a
    /// slave, a node owning slots is a master, and anything else is
    /// [`Role::Unknown`].
    pub fn role(&self) -> Role {
        match self.role {
            Some(role) => role,
            None if !self.master_referent.is_empty() => Role::Slave,
            None if !self.slots.is_empty() => Role::Master,
            None => Role::Unknown,
        }
    }

    /// Id of the replicated master, empty if none.
    pub fn master_referent(&self) -> &str {
        &self.master_referent
    }

    /// Link state, `None` when unknown.
    pub fn link_state(&self) -> Option<LinkState> {
        self.link_state
    }

    /// Failure flags in the order they were reported.
    pub fn fail_status(&self) -> &[FailStatus] {
        &self.fail_status
    }

    /// Returns true if the node carries `status`.
    pub fn has_fail_status(&self, status: FailStatus) -> bool {
        self.fail_status.contains(&status)
    }

    /// Returns true if the node is the one that answered `CLUSTER NODES`.
    pub fn is_myself(&self) -> bool {
        self.myself
    }

    /// Number of owned slots.
    pub fn total_slots(&self) -> usize {
        self.slots.len()
    }

    /// Owned slots compacted into ranges.
    pub fn slot_ranges(&self) -> SlotRanges {
        SlotRanges::compact(self.slots.iter().copied())
    }

    /// Address as `host:port`, bracketing IPv6 hosts.
    pub fn ip_port(&self) -> String {
        match self.ip.parse::<IpAddr>() {
            Ok(ip) => SocketAddr::new(ip, self.port).to_string(),
            Err(_) if self.ip.contains(':') => format!("[{}]:{}", self.ip, self.port),
            Err(_) => format!("{}:{}", self.ip, self.port),
        }
    }

    /// Drops the association with the external resource.
    pub fn clear(&mut self) {
        self.bound_resource = None;
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let link = self.link_state.map(|l| l.as_str()).unwrap_or("");
        let status: Vec<&str> = self.fail_status.iter().map(FailStatus::as_str).collect();
        write!(
            f,
            "{{id: {}, role: {}, master: {}, link: {}, status: [{}], addr: {}, slots: {}, migrating: {}, importing: {}",
            self.id,
            self.role(),
            self.master_referent,
            link,
            status.join(","),
            self.ip_port(),
            self.slot_ranges(),
            self.migrating_slots.len(),
            self.importing_slots.len(),
        )?;
        if let Some(started) = self.server_start_time {
            write!(f, ", started: {}", started.format("%Y-%m-%d %H:%M:%S"))?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn slot(n: u16) -> Slot {
        Slot::new(n).unwrap()
    }

    #[test]
    fn test_new_node_defaults() {
        let node = Node::new("abcd", "1.2.3.1", Some("ns/pod1".to_string()));
        assert_eq!(node.port, DEFAULT_PORT);
        assert_eq!(node.bound_resource.as_deref(), Some("ns/pod1"));
        assert!(node.slots.is_empty());
        assert_eq!(node.role(), Role::Unknown);
        assert_eq!(node.link_state(), None);
    }

    #[test]
    fn test_set_role_master() {
        let mut node = Node::default();
        node.set_role("master");
        assert_eq!(node.flag_role(), Some(Role::Master));
    }

    #[test]
    fn test_set_role_multiple_flags() {
        let mut node = Node::default();
        node.set_role("myself,slave");
        assert_eq!(node.flag_role(), Some(Role::Slave));
        assert!(node.is_myself());
    }

    #[test]
    fn test_set_role_unknown_clears() {
        let mut node = Node::default();
        node.set_role("myself,slave");
        node.set_role("king");
        assert_eq!(node.flag_role(), None);
        assert!(!node.is_myself());
    }

    #[test]
    fn test_set_link_status() {
        let mut node = Node::default();
        node.set_link_status("connected");
        assert_eq!(node.link_state(), Some(LinkState::Connected));
        node.set_link_status("disconnected");
        assert_eq!(node.link_state(), Some(LinkState::Disconnected));
        node.set_link_status("blabla");
        assert_eq!(node.link_state(), None);
    }

    #[test]
    fn test_set_failure_status() {
        let mut node = Node::default();
        node.set_failure_status("master,myself,fail");
        assert!(node.has_fail_status(FailStatus::Fail));
        assert!(!node.has_fail_status(FailStatus::PossibleFail));

        node.set_failure_status("master,myself,fail?");
        assert!(node.has_fail_status(FailStatus::PossibleFail));
        assert!(!node.has_fail_status(FailStatus::Fail));

        node.set_failure_status("master,myself");
        assert!(node.fail_status().is_empty());
    }

    #[test]
    fn test_set_failure_status_dedups() {
        let mut node = Node::default();
        node.set_failure_status("noaddr,handshake,noaddr,bogus");
        assert_eq!(
            node.fail_status(),
            &[FailStatus::NoAddr, FailStatus::Handshake]
        );
    }

    #[test]
    fn test_set_referent_master() {
        let mut node = Node::default();
        node.set_referent_master("899809809808343434342323");
        assert_eq!(node.master_referent(), "899809809808343434342323");
        node.set_referent_master("-");
        assert_eq!(node.master_referent(), "");
    }

    #[test]
    fn test_role_inference() {
        let mut node = Node::default();
        assert_eq!(node.role(), Role::Unknown);
        assert_eq!(node.role().to_string(), "none");

        node.slots.insert(slot(1));
        assert_eq!(node.role(), Role::Master);

        node.set_referent_master("abcd");
        assert_eq!(node.role(), Role::Slave);

        node.set_role("master");
        assert_eq!(node.role(), Role::Master);
    }

    #[test]
    fn test_total_slots() {
        let mut node = Node::default();
        node.slots.extend([0, 1, 4, 10].map(slot));
        assert_eq!(node.total_slots(), 4);
        assert_eq!(node.slot_ranges().to_string(), "0-1,4,10");
    }

    #[test]
    fn test_ip_port() {
        let mut node = Node::new("a", "10.0.0.1", None);
        node.port = 7000;
        assert_eq!(node.ip_port(), "10.0.0.1:7000");

        node.ip = "::1".to_string();
        assert_eq!(node.ip_port(), "[::1]:7000");

        node.ip = "redis-0.redis".to_string();
        assert_eq!(node.ip_port(), "redis-0.redis:7000");
    }

    #[test]
    fn test_display_without_start_time() {
        let mut node = Node::new("abcd", "1.2.3.4", None);
        node.set_role("master");
        node.set_link_status("connected");
        node.slots.extend((0..=100).map(slot));
        node.migrating_slots.insert(slot(50), "efgh".to_string());

        assert_eq!(
            node.to_string(),
            "{id: abcd, role: master, master: , link: connected, status: [], addr: 1.2.3.4:6379, slots: 0-100, migrating: 1, importing: 0}"
        );
    }

    #[test]
    fn test_display_with_start_time() {
        let mut node = Node::new("abcd", "1.2.3.4", None);
        node.set_referent_master("efgh");
        node.set_failure_status("slave,fail?");
        node.server_start_time = Some(Utc.with_ymd_and_hms(2021, 3, 4, 5, 6, 7).unwrap());

        let rendered = node.to_string();
        assert!(rendered.contains("role: slave"));
        assert!(rendered.contains("master: efgh"));
        assert!(rendered.contains("status: [fail?]"));
        assert!(rendered.ends_with(", started: 2021-03-04 05:06:07}"));
    }

    #[test]
    fn test_clear_drops_bound_resource() {
        let mut node = Node::new("abcd", "1.2.3.4", Some("ns/pod".to_string()));
        node.clear();
        assert!(node.bound_resource.is_none());
    }
}
