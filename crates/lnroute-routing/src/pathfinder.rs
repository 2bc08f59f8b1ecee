use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, HashMap};

use lnroute_core::{Msat, NodeId, RouterConfig, ShortChannelIdDir};
use serde::{Deserialize, Serialize};

use crate::effective::{EdgeView, EffectiveGraph};
use crate::error::RoutingError;
use crate::probability::{edge_success_probability, to_ppm};
use crate::route::{Route, RouteHop, RouteSet};

/// What one search is asked to deliver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteQuery {
    pub source: NodeId,
    pub destination: NodeId,
    pub amount: Msat,
    /// Upper bound on the fees of the whole route set.
    pub max_fee: Option<Msat>,
    pub final_cltv: u32,
    /// Upper bound on the CLTV expiry of the first hop of every route.
    pub max_delay: Option<u32>,
}

/// The PathFinder computes payment routes over an [`EffectiveGraph`].
///
/// Search runs Dijkstra backward from the destination so that the amount
/// and CLTV each hop needs are known exactly as the frontier grows: the
/// label of a node is what must arrive at it for the destination to receive
/// the requested amount. When no single route carries the whole amount the
/// payment is split into parts, each the largest amount a path still admits.
pub struct PathFinder {
    config: RouterConfig,
}

/// Labels a node may expand before the search stops growing from it.
const MAX_LABELS_PER_NODE: usize = 8;

/// One way of reaching the destination from a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Label {
    node: NodeId,
    /// Fees plus bias cost from this node to the destination.
    cost: u128,
    /// CLTV expiry of the HTLC arriving at this node.
    delay: u32,
    /// Edges between this node and the destination.
    hops: usize,
    /// Amount that must arrive at this node.
    amount: Msat,
    /// The edge taken out of this node and the label it leads to.
    via: Option<(ShortChannelIdDir, usize)>,
}

impl Label {
    /// True when `self` is no worse than `other` on every criterion the
    /// limits of a search can cut on. Exact ties go to the lower edge id.
    fn beats(&self, other: &Label) -> bool {
        self.cost <= other.cost
            && self.delay <= other.delay
            && self.amount <= other.amount
            && self.hops <= other.hops
            && self.key() <= other.key()
    }

    fn key(&self) -> (u128, u32, usize, Msat, Option<ShortChannelIdDir>) {
        (
            self.cost,
            self.delay,
            self.hops,
            self.amount,
            self.via.map(|(scidd, _)| scidd),
        )
    }
}

/// Internal node representation for the priority queue.
#[derive(Debug, Clone, Copy)]
struct SearchNode {
    id: usize,
    label: Label,
}

impl SearchNode {
    fn rank(&self) -> (u128, u32, usize, &NodeId, Option<ShortChannelIdDir>, usize) {
        (
            self.label.cost,
            self.label.delay,
            self.label.hops,
            &self.label.node,
            self.label.via.map(|(scidd, _)| scidd),
            self.id,
        )
    }
}

impl PartialEq for SearchNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SearchNode {}

impl PartialOrd for SearchNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SearchNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; the cheapest label must come out first.
        other.rank().cmp(&self.rank())
    }
}

/// Every label created during one search, indexed by id.
#[derive(Default)]
struct LabelArena {
    labels: Vec<Label>,
    stale: Vec<bool>,
    /// Labels at each node not beaten by another label at that node.
    frontier: HashMap<NodeId, Vec<usize>>,
    expanded: HashMap<NodeId, usize>,
}

impl LabelArena {
    /// Store `label` unless a label already at its node beats it. Labels the
    /// newcomer beats are retired.
    fn insert(&mut self, label: Label) -> Option<usize> {
        let frontier = self.frontier.entry(label.node).or_default();
        if frontier.iter().any(|&id| self.labels[id].beats(&label)) {
            return None;
        }
        let id = self.labels.len();
        let labels = &self.labels;
        let stale = &mut self.stale;
        frontier.retain(|&other| {
            let beaten = label.beats(&labels[other]);
            if beaten {
                stale[other] = true;
            }
            !beaten
        });
        frontier.push(id);
        self.labels.push(label);
        self.stale.push(false);
        Some(id)
    }

    /// Whether the path from label `id` to the destination passes `node`.
    fn visits(&self, id: usize, node: &NodeId) -> bool {
        let mut current = Some(id);
        while let Some(at) = current {
            let label = &self.labels[at];
            if label.node == *node {
                return true;
            }
            current = label.via.map(|(_, next)| next);
        }
        false
    }

    /// Count one more expansion at `node`; false once its quota is spent.
    fn try_expand(&mut self, node: NodeId) -> bool {
        let count = self.expanded.entry(node).or_default();
        if *count >= MAX_LABELS_PER_NODE {
            return false;
        }
        *count += 1;
        true
    }
}

/// Per-search restrictions carried through one Dijkstra run.
#[derive(Clone, Copy)]
struct SearchLimits<'a> {
    /// Amount the destination receives.
    delivered: Msat,
    fee_budget: Option<Msat>,
    /// Capacity already assigned to earlier parts of the same payment.
    used: &'a BTreeMap<ShortChannelIdDir, Msat>,
    /// Edges to leave out altogether.
    avoid: Option<&'a BTreeSet<ShortChannelIdDir>>,
}

impl PathFinder {
    pub fn new(config: RouterConfig) -> Self {
        Self { config }
    }

    /// Create a PathFinder with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(RouterConfig::default())
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Find a set of routes delivering exactly `query.amount`.
    ///
    /// A single route is returned when one path can carry everything.
    /// Otherwise up to `max_parts` routes are combined; if even that leaves
    /// part of the amount unplaced the result is [`RoutingError::NoRouteFound`].
    pub fn find_routes(
        &self,
        graph: &EffectiveGraph,
        query: &RouteQuery,
    ) -> Result<RouteSet, RoutingError> {
        if query.amount.is_zero() {
            return Err(RoutingError::InvalidRequest(
                "amount must be greater than zero".into(),
            ));
        }
        if query.source == query.destination {
            return Err(RoutingError::InvalidRequest(
                "source and destination are the same node".into(),
            ));
        }

        let mut used = BTreeMap::new();
        let whole = SearchLimits {
            delivered: query.amount,
            fee_budget: query.max_fee,
            used: &used,
            avoid: None,
        };
        if let Some(path) = self.find_path(graph, query, &whole) {
            let (route, probability) = Self::assemble(graph, query, query.amount, path, &used);
            tracing::debug!(
                source = %query.source,
                destination = %query.destination,
                amount_msat = query.amount.msat(),
                hops = route.hop_count(),
                "found single route"
            );
            return Ok(RouteSet {
                probability_ppm: to_ppm(probability).max(1),
                routes: vec![route],
            });
        }

        let mut remaining = query.amount;
        let mut fee_spent = Msat::ZERO;
        let mut probability = 1.0;
        let mut routes = Vec::new();

        while !remaining.is_zero() && routes.len() < self.config.max_parts {
            let fee_budget = query.max_fee.map(|max| max.saturating_sub(fee_spent));
            let avoid: BTreeSet<ShortChannelIdDir> = used.keys().copied().collect();
            let fresh = SearchLimits {
                delivered: remaining,
                fee_budget,
                used: &used,
                avoid: Some(&avoid),
            };
            let shared = SearchLimits { avoid: None, ..fresh };
            let part = self
                .largest_part(graph, query, fresh)
                .or_else(|| self.largest_part(graph, query, shared));
            let Some((amount, path)) = part else {
                break;
            };

            let (route, p) = Self::assemble(graph, query, amount, path, &used);
            for hop in &route.path {
                let entry = used.entry(hop.short_channel_id_dir).or_insert(Msat::ZERO);
                *entry = entry.checked_add(hop.amount_msat)?;
            }
            fee_spent = fee_spent.checked_add(route.total_fee())?;
            remaining = remaining.checked_sub(amount)?;
            probability *= p;
            tracing::debug!(
                part = routes.len(),
                amount_msat = amount.msat(),
                remaining_msat = remaining.msat(),
                "placed route part"
            );
            routes.push(route);
        }

        if !remaining.is_zero() {
            tracing::debug!(
                source = %query.source,
                destination = %query.destination,
                amount_msat = query.amount.msat(),
                unplaced_msat = remaining.msat(),
                parts = routes.len(),
                "no route found"
            );
            return Err(RoutingError::NoRouteFound {
                from: query.source,
                to: query.destination,
                amount: query.amount,
            });
        }

        Ok(RouteSet {
            probability_ppm: to_ppm(probability).max(1),
            routes,
        })
    }

    /// Largest amount in `[min_part, delivered]` a single path can carry, and
    /// that path. Binary search over the amount; feasibility is re-checked by
    /// a full search at every step.
    fn largest_part(
        &self,
        graph: &EffectiveGraph,
        query: &RouteQuery,
        limits: SearchLimits<'_>,
    ) -> Option<(Msat, Vec<RouteHop>)> {
        let remaining = limits.delivered;
        let attempt = |amount: Msat| {
            let trial = SearchLimits {
                delivered: amount,
                ..limits
            };
            self.find_path(graph, query, &trial)
        };

        if let Some(path) = attempt(remaining) {
            return Some((remaining, path));
        }
        let floor = remaining.min(Msat::from_msat(self.config.min_part_msat.max(1)));
        let mut best = (floor, attempt(floor)?);

        let mut lo = floor.msat();
        let mut hi = remaining.msat();
        while hi - lo > 1 {
            let mid = lo + (hi - lo) / 2;
            match attempt(Msat::from_msat(mid)) {
                Some(path) => {
                    lo = mid;
                    best = (Msat::from_msat(mid), path);
                }
                None => hi = mid,
            }
        }
        Some(best)
    }

    /// One backward multi-label Dijkstra run.
    ///
    /// A node keeps every label no other label at that node beats on cost,
    /// delay, amount and hops, so a cheaper label that later breaks a limit
    /// cannot hide a dearer one that fits. The first label popped at the
    /// source is the cheapest path within all limits.
    fn find_path(
        &self,
        graph: &EffectiveGraph,
        query: &RouteQuery,
        limits: &SearchLimits<'_>,
    ) -> Option<Vec<RouteHop>> {
        if query.max_delay.is_some_and(|max| query.final_cltv > max) {
            return None;
        }

        let mut arena = LabelArena::default();
        let mut heap = BinaryHeap::new();
        let start = Label {
            node: query.destination,
            cost: 0,
            delay: query.final_cltv,
            hops: 0,
            amount: limits.delivered,
            via: None,
        };
        let id = arena.insert(start)?;
        heap.push(SearchNode { id, label: start });

        while let Some(SearchNode { id, label }) = heap.pop() {
            if arena.stale[id] {
                continue;
            }
            if label.node == query.source {
                return Self::trace_path(&arena, id);
            }
            if label.hops >= self.config.max_hops || !arena.try_expand(label.node) {
                continue;
            }

            for edge in graph.incoming(&label.node) {
                if limits.avoid.is_some_and(|avoid| avoid.contains(&edge.scidd)) {
                    continue;
                }
                if arena.visits(id, &edge.source) {
                    continue;
                }
                let used = limits.used.get(&edge.scidd).copied().unwrap_or_default();
                if !edge.can_forward(label.amount, used) {
                    continue;
                }
                let Some(next) = Self::relax(query, limits, edge, id, &label) else {
                    continue;
                };
                if let Some(next_id) = arena.insert(next) {
                    heap.push(SearchNode {
                        id: next_id,
                        label: next,
                    });
                }
            }
        }
        None
    }

    /// Label of `edge.source` when it forwards `downstream.amount` over
    /// `edge`, or `None` if a limit rules the edge out.
    fn relax(
        query: &RouteQuery,
        limits: &SearchLimits<'_>,
        edge: &EdgeView,
        downstream_id: usize,
        downstream: &Label,
    ) -> Option<Label> {
        let hops = downstream.hops + 1;
        let via = Some((edge.scidd, downstream_id));
        let bias_cost =
            i128::from(downstream.amount.msat()) * i128::from(edge.bias) / 1_000_000;

        // The payer does not charge itself a fee or a delta.
        if edge.source == query.source {
            let cost = downstream.cost + u128::try_from(bias_cost.max(0)).unwrap_or_default();
            return Some(Label {
                node: edge.source,
                cost,
                delay: downstream.delay,
                hops,
                amount: downstream.amount,
                via,
            });
        }

        let fee = edge.half.fee_for(downstream.amount).ok()?;
        let amount = downstream.amount.checked_add(fee).ok()?;
        if let Some(budget) = limits.fee_budget {
            if amount.saturating_sub(limits.delivered) > budget {
                return None;
            }
        }
        let delay = downstream.delay.checked_add(edge.half.cltv_expiry_delta)?;
        if query.max_delay.is_some_and(|max| delay > max) {
            return None;
        }
        let edge_cost = (i128::from(fee.msat()) + bias_cost).max(0);
        Some(Label {
            node: edge.source,
            cost: downstream.cost + u128::try_from(edge_cost).unwrap_or_default(),
            delay,
            hops,
            amount,
            via,
        })
    }

    /// Walk the label chain from the source to the destination.
    fn trace_path(arena: &LabelArena, source: usize) -> Option<Vec<RouteHop>> {
        let mut path = Vec::new();
        let mut current = arena.labels.get(source)?;
        while let Some((scidd, next)) = current.via {
            let downstream = arena.labels.get(next)?;
            path.push(RouteHop {
                short_channel_id_dir: scidd,
                next_node_id: downstream.node,
                amount_msat: downstream.amount,
                delay: downstream.delay,
            });
            if path.len() > arena.labels.len() {
                return None;
            }
            current = downstream;
        }
        Some(path)
    }

    /// Attach the success estimate to a found path.
    fn assemble(
        graph: &EffectiveGraph,
        query: &RouteQuery,
        amount: Msat,
        path: Vec<RouteHop>,
        used: &BTreeMap<ShortChannelIdDir, Msat>,
    ) -> (Route, f64) {
        let probability: f64 = path
            .iter()
            .map(|hop| {
                let already = used.get(&hop.short_channel_id_dir).copied().unwrap_or_default();
                graph
                    .edge(&hop.short_channel_id_dir)
                    .map_or(0.0, |edge| edge_success_probability(edge, hop.amount_msat, already))
            })
            .product();
        // A returned route always has some chance; zero is reserved for "no route".
        let route = Route {
            probability_ppm: to_ppm(probability).max(1),
            amount_msat: amount,
            final_cltv: query.final_cltv,
            path,
        };
        (route, probability)
    }
}
