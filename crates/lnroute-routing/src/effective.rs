use std::collections::{BTreeMap, BTreeSet, HashMap};

use lnroute_core::{Msat, NodeId, ShortChannelIdDir};

use crate::base_graph::{BaseGraph, ChannelHalf};
use crate::layer::Layer;

/// An edge-direction as one search sees it, after all layers and
/// reservations have been folded in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeView {
    pub scidd: ShortChannelIdDir,
    pub source: NodeId,
    pub destination: NodeId,
    pub capacity: Msat,
    pub half: ChannelHalf,
    /// Largest learned minimum across layers.
    pub known_min: Msat,
    /// Smallest learned maximum across layers.
    pub known_max: Option<Msat>,
    /// Accumulated bias, in millionths of the amount.
    pub bias: i64,
    /// Capacity held by in-flight reservations.
    pub reserved: Msat,
}

impl EdgeView {
    fn new(
        scidd: ShortChannelIdDir,
        source: NodeId,
        destination: NodeId,
        capacity: Msat,
        half: ChannelHalf,
    ) -> Self {
        Self {
            scidd,
            source,
            destination,
            capacity,
            half,
            known_min: Msat::ZERO,
            known_max: None,
            bias: 0,
            reserved: Msat::ZERO,
        }
    }

    /// Highest amount the edge is believed to still hold, after
    /// reservations.
    pub fn liquidity_ceiling(&self) -> Msat {
        let believed = self
            .known_max
            .map_or(self.capacity, |max| max.min(self.capacity));
        believed.saturating_sub(self.reserved)
    }

    /// Amount the edge is known to carry, after reservations.
    pub fn liquidity_floor(&self) -> Msat {
        let believed = self
            .known_max
            .map_or(self.capacity, |max| max.min(self.capacity));
        self.known_min.min(believed).saturating_sub(self.reserved)
    }

    /// Whether `amount` may cross this edge given `used` already assigned to
    /// it by the same search.
    pub fn can_forward(&self, amount: Msat, used: Msat) -> bool {
        if !self.half.enabled
            || amount < self.half.htlc_minimum_msat
            || amount > self.half.htlc_maximum_msat
        {
            return false;
        }
        match used.checked_add(amount) {
            Ok(total) => total <= self.liquidity_ceiling(),
            Err(_) => false,
        }
    }
}

/// Base graph plus an ordered list of layers minus reservations, built fresh
/// for every search and never shared.
#[derive(Debug, Clone, Default)]
pub struct EffectiveGraph {
    edges: BTreeMap<ShortChannelIdDir, EdgeView>,
    incoming: HashMap<NodeId, Vec<ShortChannelIdDir>>,
    disabled_nodes: BTreeSet<NodeId>,
}

impl EffectiveGraph {
    /// Compose the graph.
    ///
    /// Layers apply in order: created channels, then policy overrides, then
    /// disabled channels, so a later layer's `enabled` override can re-enable
    /// what an earlier layer disabled. Constraints, biases and disabled nodes
    /// are then folded in from every layer.
    pub fn compose(
        base: &BaseGraph,
        layers: &[Layer],
        reserved: &BTreeMap<ShortChannelIdDir, Msat>,
    ) -> Self {
        let mut edges = BTreeMap::new();
        for channel in base.channels() {
            for dir in 0..=1u8 {
                let Some(half) = channel.half(dir) else {
                    continue;
                };
                let Ok(scidd) = ShortChannelIdDir::new(channel.scid, dir) else {
                    continue;
                };
                let (source, destination) = channel.endpoints(dir);
                edges.insert(
                    scidd,
                    EdgeView::new(scidd, source, destination, channel.capacity_msat, *half),
                );
            }
        }

        for layer in layers {
            for created in layer.created_channels.values() {
                let scidd = created.scidd();
                edges.insert(
                    scidd,
                    EdgeView::new(
                        scidd,
                        created.source,
                        created.destination,
                        created.capacity_msat,
                        ChannelHalf::open(created.capacity_msat),
                    ),
                );
            }
            for (scidd, update) in &layer.channel_updates {
                if let Some(edge) = edges.get_mut(scidd) {
                    update.apply_to(&mut edge.half);
                }
            }
            for scidd in &layer.disabled_channels {
                if let Some(edge) = edges.get_mut(scidd) {
                    edge.half.enabled = false;
                }
            }
        }

        let mut disabled_nodes = BTreeSet::new();
        for layer in layers {
            for (scidd, constraint) in &layer.constraints {
                if let Some(edge) = edges.get_mut(scidd) {
                    if let Some(min) = constraint.minimum_msat() {
                        edge.known_min = edge.known_min.max(min);
                    }
                    if let Some(max) = constraint.maximum_msat() {
                        edge.known_max = Some(edge.known_max.map_or(max, |m| m.min(max)));
                    }
                }
            }
            for (scidd, bias) in &layer.biases {
                if let Some(edge) = edges.get_mut(scidd) {
                    edge.bias = edge.bias.saturating_add(bias.bias);
                }
            }
            disabled_nodes.extend(layer.disabled_nodes.iter().copied());
        }

        let mut incoming: HashMap<NodeId, Vec<ShortChannelIdDir>> = HashMap::new();
        for (scidd, edge) in edges.iter_mut() {
            // Layers may disagree; the ceiling wins.
            if let Some(max) = edge.known_max {
                edge.known_min = edge.known_min.min(max);
            }
            edge.reserved = reserved.get(scidd).copied().unwrap_or_default();
            incoming.entry(edge.destination).or_default().push(*scidd);
        }

        Self {
            edges,
            incoming,
            disabled_nodes,
        }
    }

    pub fn edge(&self, scidd: &ShortChannelIdDir) -> Option<&EdgeView> {
        self.edges.get(scidd)
    }

    pub fn is_node_disabled(&self, node: &NodeId) -> bool {
        self.disabled_nodes.contains(node)
    }

    /// Enabled edges arriving at `node`, skipping any that touch a disabled
    /// node. Ordered by edge-direction.
    pub fn incoming(&self, node: &NodeId) -> impl Iterator<Item = &EdgeView> {
        let blocked = self.is_node_disabled(node);
        self.incoming
            .get(node)
            .into_iter()
            .flatten()
            .filter(move |_| !blocked)
            .filter_map(move |scidd| self.edges.get(scidd))
            .filter(move |edge| edge.half.enabled && !self.is_node_disabled(&edge.source))
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base_graph::Channel;
    use crate::constraint::{Constraint, ConstraintBound};
    use crate::layer::{Bias, ChannelUpdate, CreatedChannel};
    use crate::test_util::{node, scid, scidd};

    fn msat(v: u64) -> Msat {
        Msat::from_msat(v)
    }

    fn base() -> BaseGraph {
        let mut base = BaseGraph::new();
        let mut c = Channel::new(scid("1x1x0"), node(1), node(2), msat(1_000));
        c.halves = [Some(ChannelHalf::open(msat(1_000))), Some(ChannelHalf::open(msat(1_000)))];
        base.insert_channel(c).unwrap();
        base
    }

    #[test]
    fn test_base_only() {
        let g = EffectiveGraph::compose(&base(), &[], &BTreeMap::new());
        assert_eq!(g.len(), 2);
        assert_eq!(g.incoming(&node(2)).count(), 1);
        assert_eq!(g.incoming(&node(1)).count(), 1);
    }

    #[test]
    fn test_later_layer_overrides_earlier() {
        let edge = scidd("1x1x0/0");
        let mut first = Layer::new("first", false);
        first.channel_updates.insert(
            edge,
            ChannelUpdate {
                fee_base_msat: Some(msat(5)),
                cltv_expiry_delta: Some(10),
                ..Default::default()
            },
        );
        first.disabled_channels.insert(edge);
        let mut second = Layer::new("second", false);
        second.channel_updates.insert(
            edge,
            ChannelUpdate {
                enabled: Some(true),
                fee_base_msat: Some(msat(7)),
                ..Default::default()
            },
        );

        let g = EffectiveGraph::compose(&base(), &[first.clone(), second.clone()], &BTreeMap::new());
        let view = g.edge(&edge).unwrap();
        assert!(view.half.enabled);
        assert_eq!(view.half.fee_base_msat, msat(7));
        assert_eq!(view.half.cltv_expiry_delta, 10);

        let g = EffectiveGraph::compose(&base(), &[second, first], &BTreeMap::new());
        let view = g.edge(&edge).unwrap();
        assert!(!view.half.enabled);
        assert_eq!(view.half.fee_base_msat, msat(5));
        assert_eq!(g.incoming(&node(2)).count(), 0);
    }

    #[test]
    fn test_created_channel_and_disabled_node() {
        let mut layer = Layer::new("L", false);
        layer.created_channels.insert(
            scid("2x2x0"),
            CreatedChannel {
                source: node(2),
                destination: node(3),
                short_channel_id: scid("2x2x0"),
                capacity_msat: msat(500),
            },
        );
        let g = EffectiveGraph::compose(&base(), std::slice::from_ref(&layer), &BTreeMap::new());
        assert_eq!(g.incoming(&node(3)).count(), 1);

        layer.disabled_nodes.insert(node(2));
        let g = EffectiveGraph::compose(&base(), &[layer], &BTreeMap::new());
        assert_eq!(g.incoming(&node(3)).count(), 0);
        assert_eq!(g.incoming(&node(2)).count(), 0);
        assert_eq!(g.incoming(&node(1)).count(), 0);
    }

    #[test]
    fn test_constraints_biases_and_reservations() {
        let edge = scidd("1x1x0/0");
        let bound = |amount| ConstraintBound {
            amount_msat: msat(amount),
            timestamp: 1,
        };
        let mut a = Layer::new("a", false);
        a.constraints.insert(
            edge,
            Constraint {
                short_channel_id_dir: edge,
                minimum: Some(bound(100)),
                maximum: Some(bound(800)),
            },
        );
        a.biases.insert(
            edge,
            Bias {
                short_channel_id_dir: edge,
                bias: 3,
                description: None,
                timestamp: 1,
            },
        );
        let mut b = Layer::new("b", false);
        b.constraints.insert(
            edge,
            Constraint {
                short_channel_id_dir: edge,
                minimum: Some(bound(300)),
                maximum: Some(bound(900)),
            },
        );
        b.biases.insert(
            edge,
            Bias {
                short_channel_id_dir: edge,
                bias: 4,
                description: None,
                timestamp: 1,
            },
        );
        let reserved = BTreeMap::from([(edge, msat(50))]);

        let g = EffectiveGraph::compose(&base(), &[a, b], &reserved);
        let view = g.edge(&edge).unwrap();
        assert_eq!(view.known_min, msat(300));
        assert_eq!(view.known_max, Some(msat(800)));
        assert_eq!(view.bias, 7);
        assert_eq!(view.liquidity_ceiling(), msat(750));
        assert_eq!(view.liquidity_floor(), msat(250));
        assert!(view.can_forward(msat(700), msat(50)));
        assert!(!view.can_forward(msat(701), msat(50)));
    }

    #[test]
    fn test_can_forward_respects_htlc_limits() {
        let mut half = ChannelHalf::open(msat(1_000));
        half.htlc_minimum_msat = msat(10);
        half.htlc_maximum_msat = msat(100);
        let view = EdgeView::new(scidd("1x1x0/0"), node(1), node(2), msat(1_000), half);
        assert!(!view.can_forward(msat(9), Msat::ZERO));
        assert!(view.can_forward(msat(10), Msat::ZERO));
        assert!(!view.can_forward(msat(101), Msat::ZERO));
    }
}
