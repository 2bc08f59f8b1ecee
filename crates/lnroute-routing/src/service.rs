use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{Duration, Utc};
use lnroute_core::{Msat, NodeId, RouterConfig, ShortChannelId, ShortChannelIdDir};
use serde::{Deserialize, Serialize};

use crate::base_graph::BaseGraph;
use crate::constraint::{Constraint, InformKind};
use crate::effective::EffectiveGraph;
use crate::error::RoutingError;
use crate::layer::{Bias, ChannelUpdate, CreatedChannel, InformEvent, Layer, LayerStore};
use crate::pathfinder::{PathFinder, RouteQuery};
use crate::reserve::{ReservationInfo, ReservationLedger, ReserveHop};
use crate::route::RouteSet;

/// Parameters of a route request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetRoutesRequest {
    pub source: NodeId,
    pub destination: NodeId,
    pub amount_msat: Msat,
    /// Layers to apply, in order.
    #[serde(default)]
    pub layers: Vec<String>,
    #[serde(default)]
    pub maxfee_msat: Option<Msat>,
    #[serde(default)]
    pub final_cltv: Option<u32>,
    #[serde(default)]
    pub maxdelay: Option<u32>,
}

/// Counters for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStats {
    pub channels: usize,
    pub layers: usize,
    pub reservations: usize,
}

/// Current UNIX time in seconds.
pub fn unix_now() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or_default()
}

/// Shared entry point to every routing operation.
///
/// Safe to share across threads behind an `Arc`. Locks are always taken in
/// the order base graph, layers, ledger; a route search works on a snapshot
/// and never holds a lock while searching.
pub struct RouteService {
    base: RwLock<Arc<BaseGraph>>,
    layers: RwLock<LayerStore>,
    ledger: ReservationLedger,
    pathfinder: PathFinder,
}

impl RouteService {
    pub fn new(config: RouterConfig, base: BaseGraph) -> Self {
        let tolerance = Msat::from_msat(config.unreserve_tolerance_msat);
        Self {
            base: RwLock::new(Arc::new(base)),
            layers: RwLock::new(LayerStore::new()),
            ledger: ReservationLedger::new(tolerance),
            pathfinder: PathFinder::new(config),
        }
    }

    pub fn config(&self) -> &RouterConfig {
        self.pathfinder.config()
    }

    fn read_layers(&self) -> RwLockReadGuard<'_, LayerStore> {
        self.layers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_layers(&self) -> RwLockWriteGuard<'_, LayerStore> {
        self.layers.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// The current base graph.
    pub fn base_graph(&self) -> Arc<BaseGraph> {
        Arc::clone(&self.base.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Swap in a fresh base graph. Searches already running keep the old one.
    pub fn replace_base_graph(&self, graph: BaseGraph) -> usize {
        let channels = graph.len();
        *self.base.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(graph);
        tracing::info!(channels, "base graph replaced");
        channels
    }

    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            channels: self.base_graph().len(),
            layers: self.read_layers().len(),
            reservations: self.ledger.len(),
        }
    }

    // ---- layers ----

    pub fn create_layer(&self, name: &str, persistent: bool) -> Result<Layer, RoutingError> {
        let layer = self.write_layers().create_layer(name, persistent)?;
        tracing::info!(layer = %name, persistent, "layer created");
        Ok(layer)
    }

    pub fn remove_layer(&self, name: &str) -> Result<Layer, RoutingError> {
        let layer = self.write_layers().remove_layer(name)?;
        tracing::info!(layer = %name, "layer removed");
        Ok(layer)
    }

    pub fn list_layers(&self, name: Option<&str>) -> Result<Vec<Layer>, RoutingError> {
        self.read_layers().list(name)
    }

    pub fn has_layer(&self, name: &str) -> bool {
        self.read_layers().contains(name)
    }

    /// A copy of `name` if it exists and is persistent.
    pub fn persistent_layer(&self, name: &str) -> Option<Layer> {
        self.read_layers()
            .get(name)
            .ok()
            .filter(|l| l.persistent)
            .cloned()
    }

    pub fn persistent_layers(&self) -> Vec<Layer> {
        self.read_layers().persistent_layers()
    }

    /// Re-insert layers loaded from storage; returns how many were added.
    pub fn restore_layers(&self, layers: Vec<Layer>) -> usize {
        let restored = self.write_layers().restore(layers);
        tracing::info!(restored, "layers restored");
        restored
    }

    pub fn disable_node(&self, layer: &str, node: NodeId) -> Result<(), RoutingError> {
        self.write_layers().disable_node(layer, node)?;
        tracing::info!(layer = %layer, node = %node, "node disabled");
        Ok(())
    }

    pub fn disable_channel(&self, layer: &str, scidd: ShortChannelIdDir) -> Result<(), RoutingError> {
        self.write_layers().disable_channel(layer, scidd)?;
        tracing::info!(layer = %layer, scidd = %scidd, "channel disabled");
        Ok(())
    }

    pub fn create_channel(
        &self,
        layer: &str,
        source: NodeId,
        destination: NodeId,
        scid: ShortChannelId,
        capacity: Msat,
    ) -> Result<CreatedChannel, RoutingError> {
        let base = self.base_graph();
        let created =
            self.write_layers()
                .create_channel(&base, layer, source, destination, scid, capacity)?;
        tracing::info!(
            layer = %layer,
            scidd = %created.scidd(),
            capacity_msat = capacity.msat(),
            "channel created"
        );
        Ok(created)
    }

    pub fn update_channel(
        &self,
        layer: &str,
        scidd: ShortChannelIdDir,
        update: &ChannelUpdate,
    ) -> Result<ChannelUpdate, RoutingError> {
        let base = self.base_graph();
        let merged = self.write_layers().update_channel(&base, layer, scidd, update)?;
        tracing::info!(layer = %layer, scidd = %scidd, "channel updated");
        Ok(merged)
    }

    pub fn bias_channel(
        &self,
        layer: &str,
        scidd: ShortChannelIdDir,
        bias: i64,
        description: Option<String>,
        relative: bool,
    ) -> Result<Vec<Bias>, RoutingError> {
        let biases = self.write_layers().bias_channel(
            layer,
            scidd,
            bias,
            description,
            relative,
            unix_now(),
        )?;
        tracing::info!(layer = %layer, scidd = %scidd, bias, relative, "channel biased");
        Ok(biases)
    }

    // ---- constraints ----

    pub fn inform_channel(
        &self,
        layer: &str,
        scidd: ShortChannelIdDir,
        amount: Msat,
        inform: InformKind,
    ) -> Result<Vec<Constraint>, RoutingError> {
        self.inform_channel_at(layer, scidd, amount, inform, unix_now())
    }

    /// Like [`Self::inform_channel`] with an explicit observation time.
    pub fn inform_channel_at(
        &self,
        layer: &str,
        scidd: ShortChannelIdDir,
        amount: Msat,
        inform: InformKind,
        timestamp: u64,
    ) -> Result<Vec<Constraint>, RoutingError> {
        let event = InformEvent {
            short_channel_id_dir: scidd,
            amount_msat: amount,
            inform,
        };
        let constraints = self
            .write_layers()
            .inform_channels(layer, &[event], timestamp)?;
        tracing::info!(
            layer = %layer,
            scidd = %scidd,
            amount_msat = amount.msat(),
            inform = %inform,
            "channel informed"
        );
        Ok(constraints)
    }

    /// Apply several observations to one layer under a single lock.
    pub fn inform_channels(
        &self,
        layer: &str,
        events: &[InformEvent],
    ) -> Result<Vec<Constraint>, RoutingError> {
        let constraints = self
            .write_layers()
            .inform_channels(layer, events, unix_now())?;
        tracing::info!(layer = %layer, events = events.len(), "channels informed");
        Ok(constraints)
    }

    /// Drop constraint bounds in `layer` observed before `cutoff`.
    pub fn age(&self, layer: &str, cutoff: u64) -> Result<usize, RoutingError> {
        let removed = self.write_layers().age(layer, cutoff)?;
        tracing::info!(layer = %layer, cutoff, removed, "layer aged");
        Ok(removed)
    }

    // ---- reservations ----

    /// Reserve every hop of `path`; returns the owner it was filed under.
    pub fn reserve(&self, path: &[ReserveHop], owner: Option<String>) -> Result<String, RoutingError> {
        let base = self.base_graph();
        let layers = self.read_layers();
        self.ledger
            .reserve(path, owner, |scidd| layers.believed_maximum(&base, scidd))
    }

    pub fn unreserve(&self, path: &[ReserveHop]) -> Result<(), RoutingError> {
        self.ledger.unreserve(path)
    }

    pub fn list_reservations(&self) -> Vec<ReservationInfo> {
        self.ledger.list()
    }

    pub fn stale_reservations(&self, max_age: Duration) -> Vec<ReservationInfo> {
        self.ledger.stale(max_age)
    }

    // ---- routes ----

    /// Compute routes for `request` over the base graph and the named
    /// layers, net of current reservations.
    pub fn get_routes(&self, request: &GetRoutesRequest) -> Result<RouteSet, RoutingError> {
        let base = self.base_graph();
        let (layers, reserved) = {
            let store = self.read_layers();
            let layers = request
                .layers
                .iter()
                .map(|name| store.get(name).cloned())
                .collect::<Result<Vec<_>, _>>()?;
            (layers, self.ledger.totals()?)
        };

        let graph = EffectiveGraph::compose(&base, &layers, &reserved);
        let query = RouteQuery {
            source: request.source,
            destination: request.destination,
            amount: request.amount_msat,
            max_fee: request.maxfee_msat,
            final_cltv: request
                .final_cltv
                .unwrap_or(self.config().default_final_cltv),
            max_delay: request.maxdelay,
        };
        tracing::debug!(
            source = %query.source,
            destination = %query.destination,
            amount_msat = query.amount.msat(),
            layers = ?request.layers,
            edges = graph.len(),
            "route search"
        );
        self.pathfinder.find_routes(&graph, &query)
    }
}

impl Default for RouteService {
    fn default() -> Self {
        Self::new(RouterConfig::default(), BaseGraph::new())
    }
}
