//! Decoders for cluster introspection text.
//!
//! [`decode_nodes`] turns a `CLUSTER NODES` reply into a [`Nodes`]
//! collection and [`decode_status`] turns a `CLUSTER INFO` reply into a flat
//! map. Both are best effort: malformed input degrades single fields or
//! lines and is reported through [`Diagnostic`]s instead of failing the
//! whole batch.

use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::proto::error::ParseError;

use super::node::Node;
use super::nodes::Nodes;
use super::slot::SlotToken;

/// Number of positional fields before the slot tokens of a node line.
pub const NODE_LINE_FIELDS: usize = 8;

/// A non-fatal decoding failure and the 1-based input line it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// 1-based line number in the decoded text.
    pub line: usize,
    /// What went wrong.
    pub error: ParseError,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.error)
    }
}

/// The best value a decoder could build plus what it had to skip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded<T> {
    /// The decoded value.
    pub value: T,
    /// Failures that were skipped over, in input order.
    pub diagnostics: Vec<Diagnostic>,
}

impl<T> Decoded<T> {
    /// Discards the diagnostics.
    pub fn into_value(self) -> T {
        self.value
    }

    /// Returns true if nothing had to be skipped.
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Decodes a `CLUSTER NODES` reply.
///
/// Each line is `id addr flags master ping-sent pong-recv config-epoch
/// link-state [slot ...]`. Lines with fewer than eight fields are skipped;
/// the trailing empty line of a reply is skipped silently. A line repeating
/// an earlier node id is skipped. Nodes keep the order of their lines.
///
/// # Example
///
/// ```
/// use clustermap::cluster::{decode_nodes, Role};
///
/// let decoded = decode_nodes("abc 1.2.3.4:6379@16379 master - 0 0 1 connected 0-100\n");
/// assert!(decoded.is_clean());
///
/// let node = decoded.value.by_id("abc").unwrap();
/// assert_eq!(node.role(), Role::Master);
/// assert_eq!(node.total_slots(), 101);
/// ```
pub fn decode_nodes(input: &str) -> Decoded<Nodes> {
    let mut nodes = Nodes::new();
    let mut diagnostics = Vec::new();
    let mut seen = HashSet::new();

    for (index, line) in input.lines().enumerate() {
        let line_no = index + 1;
        let fields: Vec<&str> = line.split_ascii_whitespace().collect();
        if fields.len() < NODE_LINE_FIELDS {
            trace!(line = line_no, "skipping node line with {} fields: '{}'", fields.len(), line);
            if !fields.is_empty() {
                diagnostics.push(Diagnostic {
                    line: line_no,
                    error: ParseError::TooFewFields {
                        expected: NODE_LINE_FIELDS,
                        found: fields.len(),
                    },
                });
            }
            continue;
        }

        if !seen.insert(fields[0]) {
            trace!(line = line_no, id = fields[0], "skipping duplicate node id");
            diagnostics.push(Diagnostic {
                line: line_no,
                error: ParseError::DuplicateId {
                    id: fields[0].to_string(),
                },
            });
            continue;
        }

        let mut report = |error: ParseError| diagnostics.push(Diagnostic { line: line_no, error });
        nodes.push(decode_node_line(&fields, &mut report));
    }

    Decoded {
        value: nodes,
        diagnostics,
    }
}

fn decode_node_line(fields: &[&str], report: &mut impl FnMut(ParseError)) -> Node {
    let mut node = Node::new(fields[0], "", None);

    // the cluster bus port after '@' is not a client address
    let address = fields[1].split('@').next().unwrap_or_default();
    match split_host_port(address) {
        Ok((ip, port)) => {
            node.ip = ip.to_string();
            node.port = port;
        }
        Err(reason) => report(ParseError::InvalidAddress {
            address: fields[1].to_string(),
            reason,
        }),
    }

    node.set_role(fields[2]);
    node.set_failure_status(fields[2]);
    node.set_referent_master(fields[3]);
    node.ping_sent = parse_i64("ping sent", fields[4], report);
    node.pong_received = parse_i64("pong received", fields[5], report);
    node.config_epoch = parse_i64("config epoch", fields[6], report);
    node.set_link_status(fields[7]);

    for token in &fields[NODE_LINE_FIELDS..] {
        match SlotToken::decode(token) {
            Ok(SlotToken::Owned(range)) => node.slots.extend(range.iter()),
            Ok(SlotToken::Migrating { slot, to }) => {
                node.migrating_slots.insert(slot, to);
            }
            Ok(SlotToken::Importing { slot, from }) => {
                node.importing_slots.insert(slot, from);
            }
            Err(err) => report(err),
        }
    }
    node
}

fn parse_i64(field: &'static str, value: &str, report: &mut impl FnMut(ParseError)) -> i64 {
    value.parse().unwrap_or_else(|_| {
        report(ParseError::InvalidNumber {
            field,
            value: value.to_string(),
        });
        0
    })
}

/// Splits `host:port` or `[host]:port` into its parts.
fn split_host_port(address: &str) -> Result<(&str, u16), String> {
    let (host, port) = if let Some(rest) = address.strip_prefix('[') {
        let (host, rest) = rest
            .split_once(']')
            .ok_or_else(|| "missing ']' in address".to_string())?;
        let port = rest
            .strip_prefix(':')
            .ok_or_else(|| "missing port in address".to_string())?;
        (host, port)
    } else {
        let (host, port) = address
            .rsplit_once(':')
            .ok_or_else(|| "missing port in address".to_string())?;
        if host.contains(':') {
            return Err("too many colons in address".to_string());
        }
        (host, port)
    };

    let port = port
        .parse::<u16>()
        .map_err(|_| format!("invalid port '{}'", port))?;
    Ok((host, port))
}

/// Decodes `key:value` lines such as a `CLUSTER INFO` reply.
///
/// Only the first `:` separates key from value. Lines without a `:` are
/// skipped. A later duplicate key overwrites an earlier one.
///
/// ```
/// use clustermap::cluster::decode_status;
///
/// let status = decode_status("cluster_state:ok\r\ncluster_slots_assigned:16384\r\n").into_value();
/// assert_eq!(status["cluster_state"], "ok");
/// assert_eq!(status["cluster_slots_assigned"], "16384");
/// ```
pub fn decode_status(input: &str) -> Decoded<HashMap<String, String>> {
    let mut status = HashMap::new();
    for (index, line) in input.lines().enumerate() {
        match line.split_once(':') {
            Some((key, value)) => {
                status.insert(key.to_string(), value.to_string());
            }
            None => trace!(line = index + 1, "skipping status line without ':': '{}'", line),
        }
    }
    Decoded {
        value: status,
        diagnostics: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::node::{FailStatus, LinkState, Role};
    use crate::cluster::slot::Slot;

    fn slot(n: u16) -> Slot {
        Slot::new(n).unwrap()
    }

    const THREE_MASTERS: &str = "\
07c37dfeb235213a872192d90877d0cd55635b91 127.0.0.1:30004@31004 slave e7d1eecce10fd6bb5eb35b9f99a514335d9ba9ca 0 1426238317239 4 connected
67ed2db8d677e59ec4a4cefb06858cf2a1a89fa1 127.0.0.1:30002@31002 master - 0 1426238316232 2 connected 5461-10922
292f8b365bb7edb5e285caf0b7e6ddc7265d2f4f 127.0.0.1:30003@31003 master - 0 1426238318243 3 connected 10923-16383
6ec23923021cf3ffec47632106199cb7f496ce01 127.0.0.1:30005@31005 slave 67ed2db8d677e59ec4a4cefb06858cf2a1a89fa1 0 1426238316232 5 connected
824fe116063bc5fcf9f4ffd895bc17aee7731ac3 127.0.0.1:30006@31006 slave 292f8b365bb7edb5e285caf0b7e6ddc7265d2f4f 0 1426238317741 6 connected
e7d1eecce10fd6bb5eb35b9f99a514335d9ba9ca 127.0.0.1:30001@31001 myself,master - 0 0 1 connected 0-5460
";

    #[test]
    fn test_decode_single_master() {
        let decoded = decode_nodes("abcd 1.2.3.4:6379@16379 master - 0 0 1 connected 0-100");
        assert!(decoded.is_clean());
        let nodes = decoded.into_value();
        assert_eq!(nodes.len(), 1);

        let node = nodes.by_id("abcd").unwrap();
        assert_eq!(node.role(), Role::Master);
        assert_eq!(node.total_slots(), 101);
        assert!(node.slots.contains(&slot(0)));
        assert!(node.slots.contains(&slot(100)));
        assert_eq!(node.master_referent(), "");
        assert_eq!(node.link_state(), Some(LinkState::Connected));
        assert_eq!(node.ip, "1.2.3.4");
        assert_eq!(node.port, 6379);
        assert_eq!(node.config_epoch, 1);
    }

    #[test]
    fn test_decode_three_masters() {
        let decoded = decode_nodes(THREE_MASTERS);
        assert!(decoded.is_clean(), "{:?}", decoded.diagnostics);
        let nodes = decoded.value;

        assert_eq!(nodes.len(), 6);
        assert_eq!(nodes.masters().len(), 3);
        assert_eq!(nodes.total_slots(), 16384);
        assert_eq!(nodes.myself().unwrap().port, 30001);
        assert_eq!(
            nodes.by_master_id("292f8b365bb7edb5e285caf0b7e6ddc7265d2f4f").unwrap().id,
            "824fe116063bc5fcf9f4ffd895bc17aee7731ac3"
        );
        // line order kept
        assert_eq!(
            nodes.iter().next().unwrap().id,
            "07c37dfeb235213a872192d90877d0cd55635b91"
        );
        assert_eq!(
            nodes.by_id("67ed2db8d677e59ec4a4cefb06858cf2a1a89fa1").unwrap().pong_received,
            1426238316232
        );
    }

    #[test]
    fn test_decode_migrating_marker_not_owned() {
        let nodes = decode_nodes("a 10.0.0.1:6379@16379 master - 0 0 1 connected 0-49 51-100 [50->-nodeX]")
            .into_value();
        let node = nodes.by_id("a").unwrap();
        assert_eq!(node.migrating_slots.get(&slot(50)).map(String::as_str), Some("nodeX"));
        assert!(!node.slots.contains(&slot(50)));
        assert_eq!(node.total_slots(), 100);
    }

    #[test]
    fn test_decode_importing_marker() {
        let nodes = decode_nodes("b 10.0.0.2:6379@16379 master - 0 0 2 connected [50-<-nodeA] [60-<-nodeC]")
            .into_value();
        let node = nodes.by_id("b").unwrap();
        assert_eq!(node.importing_slots.len(), 2);
        assert_eq!(node.importing_slots[&slot(60)], "nodeC");
        assert_eq!(node.total_slots(), 0);
    }

    #[test]
    fn test_decode_skips_short_lines() {
        let input = "\nshort line here\na 10.0.0.1:6379@16379 master - 0 0 1 connected 0-10\n\n";
        let decoded = decode_nodes(input);
        assert_eq!(decoded.value.len(), 1);
        assert_eq!(
            decoded.diagnostics,
            vec![Diagnostic {
                line: 2,
                error: ParseError::TooFewFields {
                    expected: 8,
                    found: 3
                }
            }]
        );
    }

    #[test]
    fn test_decode_duplicate_id_keeps_first() {
        let input = "\
a 10.0.0.1:6379@16379 master - 0 0 1 connected 0-10
b 10.0.0.2:6379@16379 slave a 0 0 1 connected
a 10.0.0.9:6379@16379 master - 0 0 7 connected 11-20
";
        let decoded = decode_nodes(input);
        let ids: Vec<&str> = decoded.value.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(decoded.value.by_id("a").unwrap().ip, "10.0.0.1");
        assert_eq!(decoded.value.total_slots(), 11);
        assert_eq!(
            decoded.diagnostics,
            vec![Diagnostic {
                line: 3,
                error: ParseError::DuplicateId {
                    id: "a".to_string()
                }
            }]
        );
    }

    #[test]
    fn test_decode_bad_slot_token_keeps_others() {
        let decoded = decode_nodes("a 10.0.0.1:6379@16379 master - 0 0 1 connected 0-10 bogus 20 [5->-]");
        let node = decoded.value.by_id("a").unwrap();
        assert_eq!(node.total_slots(), 12);
        assert_eq!(decoded.diagnostics.len(), 2);
        assert!(decoded
            .diagnostics
            .iter()
            .all(|d| matches!(d.error, ParseError::InvalidSlotToken { .. })));
    }

    #[test]
    fn test_decode_bad_address_keeps_node() {
        let decoded = decode_nodes("a not-an-address master - 0 0 1 connected 0-10");
        let node = decoded.value.by_id("a").unwrap();
        assert_eq!(node.ip, "");
        assert_eq!(node.port, 6379);
        assert_eq!(node.total_slots(), 11);
        assert!(matches!(
            decoded.diagnostics[0].error,
            ParseError::InvalidAddress { .. }
        ));
    }

    #[test]
    fn test_decode_numeric_failures_default_to_zero() {
        let decoded = decode_nodes("a 10.0.0.1:6379 master - x 12 y connected");
        let node = decoded.value.by_id("a").unwrap();
        assert_eq!(node.ping_sent, 0);
        assert_eq!(node.pong_received, 12);
        assert_eq!(node.config_epoch, 0);
        assert_eq!(decoded.diagnostics.len(), 2);
        assert_eq!(
            decoded.diagnostics[1].error,
            ParseError::InvalidNumber {
                field: "config epoch",
                value: "y".to_string()
            }
        );
    }

    #[test]
    fn test_decode_failure_flags_and_noaddr() {
        let nodes = decode_nodes(
            "a :0@0 master,fail?,noaddr - 0 0 0 disconnected\nb [::1]:7000@17000 slave,fail a 0 0 0 connected\n",
        )
        .into_value();

        let a = nodes.by_id("a").unwrap();
        assert_eq!(a.ip, "");
        assert_eq!(a.port, 0);
        assert!(a.has_fail_status(FailStatus::PossibleFail));
        assert!(a.has_fail_status(FailStatus::NoAddr));
        assert_eq!(a.link_state(), Some(LinkState::Disconnected));

        let b = nodes.by_id("b").unwrap();
        assert_eq!(b.ip, "::1");
        assert_eq!(b.port, 7000);
        assert_eq!(b.ip_port(), "[::1]:7000");
        assert!(b.has_fail_status(FailStatus::Fail));
        assert_eq!(b.role(), Role::Slave);
    }

    #[test]
    fn test_decode_crlf_and_extra_spaces() {
        let nodes = decode_nodes("a  10.0.0.1:6379@16379 master -  0 0 1 connected   0-1\r\n").into_value();
        let node = nodes.by_id("a").unwrap();
        assert_eq!(node.total_slots(), 2);
        assert_eq!(node.link_state(), Some(LinkState::Connected));
    }

    #[test]
    fn test_split_host_port() {
        assert_eq!(split_host_port("1.2.3.4:6379"), Ok(("1.2.3.4", 6379)));
        assert_eq!(split_host_port("redis-0:7000"), Ok(("redis-0", 7000)));
        assert_eq!(split_host_port("[fe80::1]:7000"), Ok(("fe80::1", 7000)));
        assert!(split_host_port("fe80::1:7000").is_err());
        assert!(split_host_port("1.2.3.4").is_err());
        assert!(split_host_port("1.2.3.4:99999").is_err());
        assert!(split_host_port("[::1]7000").is_err());
    }

    #[test]
    fn test_decode_status() {
        let input = "cluster_state:ok\r\ncluster_slots_assigned:16384\r\ncluster_my_epoch:2\r\n\r\n";
        let status = decode_status(input).into_value();
        assert_eq!(status.len(), 3);
        assert_eq!(status["cluster_state"], "ok");
        assert_eq!(status["cluster_my_epoch"], "2");
    }

    #[test]
    fn test_decode_status_splits_on_first_colon() {
        let status = decode_status("addr:10.0.0.1:6379\nempty:\nnocolon\n").into_value();
        assert_eq!(status["addr"], "10.0.0.1:6379");
        assert_eq!(status["empty"], "");
        assert!(!status.contains_key("nocolon"));
    }
}
