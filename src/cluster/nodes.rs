//! Ordered, queryable collection of cluster nodes.

use std::cmp::Ordering;
use std::fmt;

use crate::proto::error::{Error, Result};

use super::node::{Node, Role};
use super::slot::Slot;

/// Sort direction for [`Nodes::sort_by_id`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    /// Smallest id first.
    #[default]
    Ascending,
    /// Largest id first.
    Descending,
}

/// Matches masters that own at least one slot.
pub fn is_master_with_slots(node: &Node) -> bool {
    node.role() == Role::Master && node.total_slots() > 0
}

/// Matches masters that own no slot.
pub fn is_master_without_slots(node: &Node) -> bool {
    node.role() == Role::Master && node.total_slots() == 0
}

/// Matches replicas.
pub fn is_slave(node: &Node) -> bool {
    node.role() == Role::Slave
}

/// Orders nodes by ascending id.
pub fn less_by_id(a: &Node, b: &Node) -> Ordering {
    a.id.cmp(&b.id)
}

/// Orders nodes by descending id.
pub fn more_by_id(a: &Node, b: &Node) -> Ordering {
    b.id.cmp(&a.id)
}

/// The nodes of one topology snapshot, in decode order unless sorted.
///
/// Every query borrows the snapshot; operations producing a collection
/// return a new one and leave `self` untouched.
///
/// # Example
///
/// ```
/// use clustermap::cluster::{decode_nodes, is_slave, Order};
///
/// let raw = "b 10.0.0.2:6379@16379 slave a 0 0 1 connected\n\
///            a 10.0.0.1:6379@16379 master - 0 0 1 connected 0-16383\n";
/// let nodes = decode_nodes(raw).into_value().sort_by_id(Order::Ascending);
///
/// assert_eq!(nodes.iter().next().unwrap().id, "a");
/// assert_eq!(nodes.count(is_slave), 1);
/// assert!(nodes.by_id("c").is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "json", derive(serde::Serialize), serde(transparent))]
pub struct Nodes(Vec<Node>);

impl Nodes {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a node.
    pub fn push(&mut self, node: Node) {
        self.0.push(node);
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the collection holds no node.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates the nodes in collection order.
    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        self.0.iter()
    }

    /// The nodes as a slice.
    pub fn as_slice(&self) -> &[Node] {
        &self.0
    }

    /// Returns the nodes matching `predicate`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when nothing matches. Use
    /// [`filter`](Nodes::filter) when an empty result is acceptable.
    pub fn find_all<P>(&self, predicate: P) -> Result<Nodes>
    where
        P: Fn(&Node) -> bool,
    {
        let found = self.filter(predicate);
        if found.is_empty() {
            return Err(Error::not_found("no node matches the predicate"));
        }
        Ok(found)
    }

    /// Returns the nodes matching `predicate`, possibly none.
    pub fn filter<P>(&self, predicate: P) -> Nodes
    where
        P: Fn(&Node) -> bool,
    {
        self.0.iter().filter(|n| predicate(n)).cloned().collect()
    }

    /// Counts the nodes matching `predicate`.
    pub fn count<P>(&self, predicate: P) -> usize
    where
        P: Fn(&Node) -> bool,
    {
        self.0.iter().filter(|n| predicate(n)).count()
    }

    /// Looks a node up by id.
    pub fn by_id(&self, id: &str) -> Result<&Node> {
        self.0
            .iter()
            .find(|n| n.id == id)
            .ok_or_else(|| Error::not_found(format!("id {}", id)))
    }

    /// Returns the first node replicating the master `id`.
    pub fn by_master_id(&self, id: &str) -> Result<&Node> {
        self.0
            .iter()
            .find(|n| n.master_referent() == id)
            .ok_or_else(|| Error::not_found(format!("replica of {}", id)))
    }

    /// Looks a node up by its `host:port` address.
    pub fn by_address(&self, address: &str) -> Result<&Node> {
        self.0
            .iter()
            .find(|n| n.ip_port() == address)
            .ok_or_else(|| Error::not_found(format!("address {}", address)))
    }

    /// Returns a copy sorted by id. The sort is stable.
    pub fn sort_by_id(&self, order: Order) -> Nodes {
        match order {
            Order::Ascending => self.sort_by(less_by_id),
            Order::Descending => self.sort_by(more_by_id),
        }
    }

    /// Returns a copy sorted with `compare`. The sort is stable.
    pub fn sort_by<F>(&self, compare: F) -> Nodes
    where
        F: Fn(&Node, &Node) -> Ordering,
    {
        let mut sorted = self.0.clone();
        sorted.sort_by(|a, b| compare(a, b));
        Nodes(sorted)
    }

    /// Masters, flagged or inferred.
    pub fn masters(&self) -> Nodes {
        self.filter(|n| n.role() == Role::Master)
    }

    /// Replicas of the master `master_id`, possibly none.
    pub fn replicas_of(&self, master_id: &str) -> Nodes {
        self.filter(|n| n.master_referent() == master_id)
    }

    /// Sum of owned slots over all nodes.
    pub fn total_slots(&self) -> usize {
        self.0.iter().map(Node::total_slots).sum()
    }

    /// The node owning `slot`.
    pub fn owner_of(&self, slot: Slot) -> Result<&Node> {
        self.0
            .iter()
            .find(|n| n.slots.contains(&slot))
            .ok_or_else(|| Error::not_found(format!("owner of slot {}", slot)))
    }

    /// The node that produced the listing (`myself` flag).
    pub fn myself(&self) -> Result<&Node> {
        self.0
            .iter()
            .find(|n| n.is_myself())
            .ok_or_else(|| Error::not_found("myself"))
    }
}

impl FromIterator<Node> for Nodes {
    fn from_iter<I: IntoIterator<Item = Node>>(iter: I) -> Self {
        Nodes(iter.into_iter().collect())
    }
}

impl IntoIterator for Nodes {
    type Item = Node;
    type IntoIter = std::vec::IntoIter<Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Nodes {
    type Item = &'a Node;
    type IntoIter = std::slice::Iter<'a, Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl From<Vec<Node>> for Nodes {
    fn from(nodes: Vec<Node>) -> Self {
        Nodes(nodes)
    }
}

impl fmt::Display for Nodes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, node) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", node)?;
        }
        Ok(())
    }
}
