use lnroute_core::{Msat, NodeId, ShortChannelId, ShortChannelIdDir, NODE_ID_LEN};

use crate::base_graph::{Channel, ChannelHalf};

/// A valid node id whose bytes sort by `b`.
pub fn node(b: u8) -> NodeId {
    let mut bytes = [b; NODE_ID_LEN];
    bytes[0] = 0x02;
    NodeId::from_bytes(bytes).expect("valid prefix")
}

pub fn scid(s: &str) -> ShortChannelId {
    s.parse().expect("valid scid")
}

pub fn scidd(s: &str) -> ShortChannelIdDir {
    s.parse().expect("valid scidd")
}

pub fn msat(v: u64) -> Msat {
    Msat::from_msat(v)
}

pub fn policy(capacity: u64, base_fee: u64, ppm: u32, cltv_delta: u32) -> ChannelHalf {
    ChannelHalf {
        fee_base_msat: msat(base_fee),
        fee_proportional_millionths: ppm,
        cltv_expiry_delta: cltv_delta,
        ..ChannelHalf::open(msat(capacity))
    }
}

/// A channel between `node(a)` and `node(b)` with the same policy both ways.
pub fn channel(id: &str, a: u8, b: u8, capacity: u64, half: ChannelHalf) -> Channel {
    let mut channel = Channel::new(scid(id), node(a), node(b), msat(capacity));
    channel.halves = [Some(half), Some(half)];
    channel
}
