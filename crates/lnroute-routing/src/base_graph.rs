use std::collections::BTreeMap;

use lnroute_core::{forwarding_fee, CoreError, Msat, NodeId, ShortChannelId, ShortChannelIdDir};
use serde::{Deserialize, Serialize};

use crate::error::RoutingError;

fn default_true() -> bool {
    true
}

/// Forwarding policy of one channel direction, as announced in gossip or
/// declared by a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelHalf {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub htlc_minimum_msat: Msat,
    pub htlc_maximum_msat: Msat,
    pub fee_base_msat: Msat,
    pub fee_proportional_millionths: u32,
    pub cltv_expiry_delta: u32,
}

impl ChannelHalf {
    /// A free, enabled direction that can forward up to `capacity`.
    pub fn open(capacity: Msat) -> Self {
        Self {
            enabled: true,
            htlc_minimum_msat: Msat::ZERO,
            htlc_maximum_msat: capacity,
            fee_base_msat: Msat::ZERO,
            fee_proportional_millionths: 0,
            cltv_expiry_delta: 0,
        }
    }

    /// Fee the source of this direction charges to forward `amount` over it.
    pub fn fee_for(&self, amount: Msat) -> Result<Msat, CoreError> {
        forwarding_fee(amount, self.fee_base_msat, self.fee_proportional_millionths)
    }
}

/// A channel between two nodes. `node_one` is always the smaller id, so
/// `halves[0]` forwards `node_one -> node_two`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub scid: ShortChannelId,
    pub node_one: NodeId,
    pub node_two: NodeId,
    pub capacity_msat: Msat,
    #[serde(default)]
    pub halves: [Option<ChannelHalf>; 2],
}

impl Channel {
    /// Build a channel between two nodes in either order; the endpoints are
    /// normalised to BOLT 7 ordering.
    pub fn new(scid: ShortChannelId, a: NodeId, b: NodeId, capacity: Msat) -> Self {
        let (node_one, node_two) = if a < b { (a, b) } else { (b, a) };
        Self {
            scid,
            node_one,
            node_two,
            capacity_msat: capacity,
            halves: [None, None],
        }
    }

    /// `(source, destination)` of a direction of this channel.
    pub fn endpoints(&self, dir: u8) -> (NodeId, NodeId) {
        if dir == 0 {
            (self.node_one, self.node_two)
        } else {
            (self.node_two, self.node_one)
        }
    }

    pub fn half(&self, dir: u8) -> Option<&ChannelHalf> {
        self.halves.get(usize::from(dir)).and_then(Option::as_ref)
    }

    fn validate(&self) -> Result<(), RoutingError> {
        if self.node_one >= self.node_two {
            return Err(RoutingError::InvalidRequest(format!(
                "channel {} endpoints must be distinct and ordered",
                self.scid
            )));
        }
        Ok(())
    }
}

/// Serialized form of a base graph, as handed over by gossip ingestion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub channels: Vec<Channel>,
}

/// The observed public topology. Read-only to everything in this crate;
/// a fresh graph replaces the old one wholesale.
#[derive(Debug, Clone, Default)]
pub struct BaseGraph {
    channels: BTreeMap<ShortChannelId, Channel>,
}

impl BaseGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: GraphSnapshot) -> Result<Self, RoutingError> {
        let mut graph = Self::new();
        for channel in snapshot.channels {
            if graph.insert_channel(channel)?.is_some() {
                tracing::warn!("duplicate channel in graph snapshot, keeping the last one");
            }
        }
        Ok(graph)
    }

    pub fn to_snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            channels: self.channels.values().cloned().collect(),
        }
    }

    /// Insert or overwrite a channel. Returns any previous channel with the
    /// same short channel id.
    pub fn insert_channel(&mut self, channel: Channel) -> Result<Option<Channel>, RoutingError> {
        channel.validate()?;
        Ok(self.channels.insert(channel.scid, channel))
    }

    /// Set the forwarding policy of one direction of a known channel.
    pub fn set_half(&mut self, scidd: ShortChannelIdDir, half: ChannelHalf) -> Result<(), RoutingError> {
        let channel = self
            .channels
            .get_mut(&scidd.scid)
            .ok_or(RoutingError::EdgeNotFound(scidd))?;
        channel.halves[usize::from(scidd.dir())] = Some(half);
        Ok(())
    }

    pub fn channel(&self, scid: &ShortChannelId) -> Option<&Channel> {
        self.channels.get(scid)
    }

    pub fn contains_channel(&self, scid: &ShortChannelId) -> bool {
        self.channels.contains_key(scid)
    }

    /// True if the direction exists with an announced policy.
    pub fn contains_edge(&self, scidd: &ShortChannelIdDir) -> bool {
        self.channel(&scidd.scid)
            .and_then(|c| c.half(scidd.dir()))
            .is_some()
    }

    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
