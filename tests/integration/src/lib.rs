//! Shared fixtures for the lnroute integration tests.

use lnroute_core::{Msat, NodeId, RouterConfig, ShortChannelId, ShortChannelIdDir, NODE_ID_LEN};
use lnroute_routing::{BaseGraph, Channel, ChannelHalf, GetRoutesRequest, GraphSnapshot, RouteService};

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

pub fn service(channels: Vec<Channel>) -> RouteService {
    let graph = BaseGraph::from_snapshot(GraphSnapshot { channels }).expect("valid graph");
    RouteService::new(RouterConfig::default(), graph)
}

/// Two paths from node 1 to node 4: a cheap one through node 2 and a
/// dearer one through node 3.
///
/// ```text
///   1 --1x1x0-- 2 --2x1x0-- 4
///   1 --3x1x0-- 3 --4x1x0-- 4
/// ```
pub fn diamond() -> RouteService {
    let cap = 10_000_000;
    service(vec![
        channel("1x1x0", 1, 2, cap, policy(cap, 1, 100, 6)),
        channel("2x1x0", 2, 4, cap, policy(cap, 1, 100, 6)),
        channel("3x1x0", 1, 3, cap, policy(cap, 10, 1_000, 6)),
        channel("4x1x0", 3, 4, cap, policy(cap, 10, 1_000, 6)),
    ])
}

pub fn request(from: u8, to: u8, amount: u64, layers: &[&str]) -> GetRoutesRequest {
    GetRoutesRequest {
        source: node(from),
        destination: node(to),
        amount_msat: msat(amount),
        layers: layers.iter().map(|l| l.to_string()).collect(),
        maxfee_msat: None,
        final_cltv: None,
        maxdelay: None,
    }
}
