//! Hash slot algebra.
//!
//! A Redis Cluster partitions its key space into 16384 hash slots. This
//! module provides the [`Slot`] type, contiguous [`SlotRange`]s, the slot
//! tokens found at the end of `CLUSTER NODES` lines (plain ranges and
//! migrating/importing markers) and the inverse operation that compacts a
//! set of slots back into ranges.

use std::fmt;
use std::str::FromStr;

use crc::{Crc, CRC_16_XMODEM};

use crate::proto::error::ParseError;

/// Number of hash slots in Redis Cluster.
pub const SLOT_COUNT: u16 = 16384;

/// CRC-16/XMODEM algorithm used by Redis.
const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// A hash slot identifier in `0..=16383`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "json", derive(serde::Serialize), serde(transparent))]
pub struct Slot(u16);

impl Slot {
    /// The highest slot number.
    pub const MAX: Slot = Slot(SLOT_COUNT - 1);

    /// Creates a slot, returning `None` when `value` is above [`Slot::MAX`].
    pub const fn new(value: u16) -> Option<Self> {
        if value < SLOT_COUNT {
            Some(Slot(value))
        } else {
            None
        }
    }

    /// Returns the numeric slot value.
    pub const fn get(self) -> u16 {
        self.0
    }

    /// Iterates every slot from 0 to [`Slot::MAX`].
    pub fn all() -> impl Iterator<Item = Slot> {
        (0..SLOT_COUNT).map(Slot)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u16> for Slot {
    type Error = ParseError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Slot::new(value).ok_or_else(|| invalid(value.to_string()))
    }
}

impl FromStr for Slot {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // u16::from_str accepts a leading '+', the wire format never carries one
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid(s));
        }
        s.parse::<u16>()
            .ok()
            .and_then(Slot::new)
            .ok_or_else(|| invalid(s))
    }
}

/// An inclusive, non-empty range of slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct SlotRange {
    start: Slot,
    end: Slot,
}

impl SlotRange {
    /// Creates the range `start..=end`, or `None` if `start > end`.
    pub fn new(start: Slot, end: Slot) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// Creates a range holding exactly one slot.
    pub fn single(slot: Slot) -> Self {
        Self {
            start: slot,
            end: slot,
        }
    }

    /// First slot of the range.
    pub fn start(&self) -> Slot {
        self.start
    }

    /// Last slot of the range (inclusive).
    pub fn end(&self) -> Slot {
        self.end
    }

    /// Number of slots in the range.
    pub fn len(&self) -> usize {
        (self.end.0 - self.start.0) as usize + 1
    }

    /// Always false; ranges hold at least one slot.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Returns true if `slot` lies within the range.
    pub fn contains(&self, slot: Slot) -> bool {
        self.start <= slot && slot <= self.end
    }

    /// Iterates the slots of the range in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = Slot> {
        (self.start.0..=self.end.0).map(Slot)
    }
}

impl fmt::Display for SlotRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

impl FromStr for SlotRange {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('-') {
            Some((start, end)) => {
                let start = start.parse::<Slot>().map_err(|_| invalid(s))?;
                let end = end.parse::<Slot>().map_err(|_| invalid(s))?;
                SlotRange::new(start, end).ok_or_else(|| invalid(s))
            }
            None => s.parse::<Slot>().map(SlotRange::single),
        }
    }
}

/// One slot token from a `CLUSTER NODES` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotToken {
    /// `N` or `N-M`: slots owned by the node.
    Owned(SlotRange),
    /// `[N->-id]`: the node is handing slot `N` over to node `to`.
    Migrating {
        /// The slot being moved.
        slot: Slot,
        /// Destination node id.
        to: String,
    },
    /// `[N-<-id]`: the node is receiving slot `N` from node `from`.
    Importing {
        /// The slot being moved.
        slot: Slot,
        /// Source node id.
        from: String,
    },
}

impl SlotToken {
    /// Decodes a single slot token.
    ///
    /// # Examples
    ///
    /// ```
    /// use clustermap::cluster::{Slot, SlotToken};
    ///
    /// let token = SlotToken::decode("[50->-nodeX]").unwrap();
    /// assert_eq!(
    ///     token,
    ///     SlotToken::Migrating { slot: Slot::new(50).unwrap(), to: "nodeX".to_string() }
    /// );
    /// ```
    pub fn decode(token: &str) -> Result<Self, ParseError> {
        let Some(marker) = token.strip_prefix('[') else {
            return token.parse::<SlotRange>().map(SlotToken::Owned);
        };
        let marker = marker.strip_suffix(']').ok_or_else(|| invalid(token))?;

        if let Some((slot, to)) = marker.split_once("->-") {
            let slot = slot.parse::<Slot>().map_err(|_| invalid(token))?;
            if to.is_empty() {
                return Err(invalid(token));
            }
            return Ok(SlotToken::Migrating {
                slot,
                to: to.to_string(),
            });
        }
        if let Some((slot, from)) = marker.split_once("-<-") {
            let slot = slot.parse::<Slot>().map_err(|_| invalid(token))?;
            if from.is_empty() {
                return Err(invalid(token));
            }
            return Ok(SlotToken::Importing {
                slot,
                from: from.to_string(),
            });
        }
        Err(invalid(token))
    }
}

impl fmt::Display for SlotToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotToken::Owned(range) => write!(f, "{}", range),
            SlotToken::Migrating { slot, to } => write!(f, "[{}->-{}]", slot, to),
            SlotToken::Importing { slot, from } => write!(f, "[{}-<-{}]", slot, from),
        }
    }
}

/// An ordered list of disjoint, non-adjacent slot ranges.
///
/// Built by [`SlotRanges::compact`]; renders as the comma-separated range
/// tokens, e.g. `0-100,200,300-301`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "json", derive(serde::Serialize), serde(transparent))]
pub struct SlotRanges(Vec<SlotRange>);

impl SlotRanges {
    /// Compacts arbitrary slots (any order, duplicates allowed) into the
    /// minimal list of ascending ranges.
    pub fn compact<I>(slots: I) -> Self
    where
        I: IntoIterator<Item = Slot>,
    {
        let mut sorted: Vec<Slot> = slots.into_iter().collect();
        sorted.sort_unstable();
        sorted.dedup();

        let mut ranges: Vec<SlotRange> = Vec::new();
        for slot in sorted {
            match ranges.last_mut() {
                Some(last) if last.end.0 + 1 == slot.0 => last.end = slot,
                _ => ranges.push(SlotRange::single(slot)),
            }
        }
        SlotRanges(ranges)
    }

    /// The ranges, ascending.
    pub fn as_slice(&self) -> &[SlotRange] {
        &self.0
    }

    /// Total number of slots covered.
    pub fn slot_count(&self) -> usize {
        self.0.iter().map(SlotRange::len).sum()
    }

    /// Range tokens as they appear on a `CLUSTER NODES` line.
    pub fn tokens(&self) -> Vec<String> {
        self.0.iter().map(ToString::to_string).collect()
    }
}

impl fmt::Display for SlotRanges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, range) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", range)?;
        }
        Ok(())
    }
}

/// Calculates the Redis Cluster slot for a given key.
///
/// If the key contains a non-empty `{...}` section, only its content is
/// hashed, so keys sharing a hash tag land on the same slot.
///
/// ```
/// use clustermap::cluster::key_slot;
///
/// assert_eq!(key_slot("{user1000}.following"), key_slot("{user1000}.followers"));
/// assert_eq!(key_slot("foo").get(), 12182);
/// ```
pub fn key_slot(key: &str) -> Slot {
    let crc = CRC16.checksum(hash_tag(key).as_bytes());
    Slot(crc % SLOT_COUNT)
}

fn hash_tag(key: &str) -> &str {
    if let Some(start) = key.find('{') {
        if let Some(len) = key[start + 1..].find('}') {
            if len > 0 {
                return &key[start + 1..start + 1 + len];
            }
        }
    }
    key
}

fn invalid(token: impl Into<String>) -> ParseError {
    ParseError::InvalidSlotToken {
        token: token.into(),
    }
}
