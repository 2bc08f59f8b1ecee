use std::collections::{BTreeMap, BTreeSet};

use lnroute_core::{Msat, NodeId, ShortChannelId, ShortChannelIdDir};
use serde::{Deserialize, Serialize};

use crate::base_graph::{BaseGraph, ChannelHalf};
use crate::constraint::{Constraint, InformKind};
use crate::error::RoutingError;

/// Partial override of a channel direction's forwarding policy. Unset fields
/// leave whatever an earlier layer or the base graph says.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub htlc_minimum_msat: Option<Msat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub htlc_maximum_msat: Option<Msat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_base_msat: Option<Msat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_proportional_millionths: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cltv_expiry_delta: Option<u32>,
}

impl ChannelUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overlay `newer` on top of `self`, field by field.
    pub fn merge(&mut self, newer: &ChannelUpdate) {
        self.enabled = newer.enabled.or(self.enabled);
        self.htlc_minimum_msat = newer.htlc_minimum_msat.or(self.htlc_minimum_msat);
        self.htlc_maximum_msat = newer.htlc_maximum_msat.or(self.htlc_maximum_msat);
        self.fee_base_msat = newer.fee_base_msat.or(self.fee_base_msat);
        self.fee_proportional_millionths = newer
            .fee_proportional_millionths
            .or(self.fee_proportional_millionths);
        self.cltv_expiry_delta = newer.cltv_expiry_delta.or(self.cltv_expiry_delta);
    }

    pub fn apply_to(&self, half: &mut ChannelHalf) {
        if let Some(enabled) = self.enabled {
            half.enabled = enabled;
        }
        if let Some(v) = self.htlc_minimum_msat {
            half.htlc_minimum_msat = v;
        }
        if let Some(v) = self.htlc_maximum_msat {
            half.htlc_maximum_msat = v;
        }
        if let Some(v) = self.fee_base_msat {
            half.fee_base_msat = v;
        }
        if let Some(v) = self.fee_proportional_millionths {
            half.fee_proportional_millionths = v;
        }
        if let Some(v) = self.cltv_expiry_delta {
            half.cltv_expiry_delta = v;
        }
    }
}

/// A channel that exists only inside a layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedChannel {
    pub source: NodeId,
    pub destination: NodeId,
    pub short_channel_id: ShortChannelId,
    pub capacity_msat: Msat,
}

impl CreatedChannel {
    /// The single direction this channel can be traversed in.
    pub fn scidd(&self) -> ShortChannelIdDir {
        ShortChannelIdDir::between(self.short_channel_id, &self.source, &self.destination)
    }
}

/// A soft cost adjustment, in millionths of the amount crossing the edge.
/// Positive values make the edge less attractive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bias {
    pub short_channel_id_dir: ShortChannelIdDir,
    pub bias: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub timestamp: u64,
}

/// A named overlay on top of the base graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    pub name: String,
    pub persistent: bool,
    #[serde(default)]
    pub disabled_nodes: BTreeSet<NodeId>,
    #[serde(default)]
    pub disabled_channels: BTreeSet<ShortChannelIdDir>,
    #[serde(default)]
    pub created_channels: BTreeMap<ShortChannelId, CreatedChannel>,
    #[serde(default)]
    pub channel_updates: BTreeMap<ShortChannelIdDir, ChannelUpdate>,
    #[serde(default)]
    pub constraints: BTreeMap<ShortChannelIdDir, Constraint>,
    #[serde(default)]
    pub biases: BTreeMap<ShortChannelIdDir, Bias>,
}

impl Layer {
    pub fn new(name: impl Into<String>, persistent: bool) -> Self {
        Self {
            name: name.into(),
            persistent,
            disabled_nodes: BTreeSet::new(),
            disabled_channels: BTreeSet::new(),
            created_channels: BTreeMap::new(),
            channel_updates: BTreeMap::new(),
            constraints: BTreeMap::new(),
            biases: BTreeMap::new(),
        }
    }

    fn creates(&self, scidd: &ShortChannelIdDir) -> bool {
        self.created_channels
            .get(&scidd.scid)
            .is_some_and(|c| c.scidd() == *scidd)
    }

    /// Fold one observation into this layer's constraint for `scidd`.
    fn inform(&mut self, scidd: ShortChannelIdDir, amount: Msat, kind: InformKind, timestamp: u64) {
        let constraint = self
            .constraints
            .entry(scidd)
            .or_insert_with(|| Constraint::new(scidd));
        constraint.apply(kind, amount, timestamp);
        if constraint.is_empty() {
            self.constraints.remove(&scidd);
        }
    }
}

/// One observation to fold into a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InformEvent {
    pub short_channel_id_dir: ShortChannelIdDir,
    pub amount_msat: Msat,
    pub inform: InformKind,
}

/// All layers, addressed by name, kept in creation order.
///
/// Every mutation validates first and applies second, so a failed call leaves
/// the store untouched.
#[derive(Debug, Clone, Default)]
pub struct LayerStore {
    layers: Vec<Layer>,
}

impl LayerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.layers.iter().any(|l| l.name == name)
    }

    pub fn get(&self, name: &str) -> Result<&Layer, RoutingError> {
        self.layers
            .iter()
            .find(|l| l.name == name)
            .ok_or_else(|| RoutingError::LayerNotFound(name.to_string()))
    }

    fn get_mut(&mut self, name: &str) -> Result<&mut Layer, RoutingError> {
        self.layers
            .iter_mut()
            .find(|l| l.name == name)
            .ok_or_else(|| RoutingError::LayerNotFound(name.to_string()))
    }

    pub fn create_layer(&mut self, name: &str, persistent: bool) -> Result<Layer, RoutingError> {
        if name.trim().is_empty() {
            return Err(RoutingError::InvalidRequest("layer name is empty".into()));
        }
        if self.contains(name) {
            return Err(RoutingError::LayerExists(name.to_string()));
        }
        let layer = Layer::new(name, persistent);
        self.layers.push(layer.clone());
        Ok(layer)
    }

    /// Remove a layer and everything it declared.
    pub fn remove_layer(&mut self, name: &str) -> Result<Layer, RoutingError> {
        let idx = self
            .layers
            .iter()
            .position(|l| l.name == name)
            .ok_or_else(|| RoutingError::LayerNotFound(name.to_string()))?;
        Ok(self.layers.remove(idx))
    }

    /// All layers sorted by name, or just the named one.
    pub fn list(&self, name: Option<&str>) -> Result<Vec<Layer>, RoutingError> {
        match name {
            Some(name) => Ok(vec![self.get(name)?.clone()]),
            None => {
                let mut layers = self.layers.clone();
                layers.sort_by(|a, b| a.name.cmp(&b.name));
                Ok(layers)
            }
        }
    }

    pub fn disable_node(&mut self, layer: &str, node: NodeId) -> Result<(), RoutingError> {
        self.get_mut(layer)?.disabled_nodes.insert(node);
        Ok(())
    }

    pub fn disable_channel(&mut self, layer: &str, scidd: ShortChannelIdDir) -> Result<(), RoutingError> {
        self.get_mut(layer)?.disabled_channels.insert(scidd);
        Ok(())
    }

    /// Add a layer-local channel from `source` to `destination`.
    pub fn create_channel(
        &mut self,
        base: &BaseGraph,
        layer: &str,
        source: NodeId,
        destination: NodeId,
        scid: ShortChannelId,
        capacity: Msat,
    ) -> Result<CreatedChannel, RoutingError> {
        if source == destination {
            return Err(RoutingError::InvalidRequest(format!(
                "channel {scid} cannot loop back to {source}"
            )));
        }
        self.get(layer)?;
        if base.contains_channel(&scid) {
            return Err(RoutingError::DuplicateEdge(scid));
        }
        if self
            .layers
            .iter()
            .any(|l| l.name != layer && l.created_channels.contains_key(&scid))
        {
            return Err(RoutingError::DuplicateEdge(scid));
        }

        let created = CreatedChannel {
            source,
            destination,
            short_channel_id: scid,
            capacity_msat: capacity,
        };
        let target = self.get_mut(layer)?;
        if let Some(existing) = target.created_channels.get(&scid) {
            if existing.source != source || existing.destination != destination {
                return Err(RoutingError::DuplicateEdge(scid));
            }
        }
        target.created_channels.insert(scid, created.clone());
        Ok(created)
    }

    /// Merge `update` over the layer's previous override for `scidd` and
    /// return the combined override.
    pub fn update_channel(
        &mut self,
        base: &BaseGraph,
        layer: &str,
        scidd: ShortChannelIdDir,
        update: &ChannelUpdate,
    ) -> Result<ChannelUpdate, RoutingError> {
        // Check the layer first so a missing layer wins over a missing edge.
        self.get(layer)?;
        if !self.edge_exists(base, &scidd) {
            return Err(RoutingError::EdgeNotFound(scidd));
        }
        let target = self.get_mut(layer)?;
        let merged = target.channel_updates.entry(scidd).or_default();
        merged.merge(update);
        Ok(merged.clone())
    }

    /// Set (or, with `relative`, add to) the layer's bias on `scidd`. A bias
    /// that ends up at zero is removed.
    pub fn bias_channel(
        &mut self,
        layer: &str,
        scidd: ShortChannelIdDir,
        bias: i64,
        description: Option<String>,
        relative: bool,
        timestamp: u64,
    ) -> Result<Vec<Bias>, RoutingError> {
        let target = self.get_mut(layer)?;
        let value = match target.biases.get(&scidd) {
            Some(existing) if relative => existing.bias.checked_add(bias).ok_or_else(|| {
                RoutingError::InvalidRequest(format!("bias on {scidd} overflows"))
            })?,
            _ => bias,
        };

        if value == 0 {
            target.biases.remove(&scidd);
            return Ok(Vec::new());
        }
        let entry = Bias {
            short_channel_id_dir: scidd,
            bias: value,
            description,
            timestamp,
        };
        target.biases.insert(scidd, entry.clone());
        Ok(vec![entry])
    }

    /// Apply a batch of observations to one layer. The batch is rejected as
    /// a whole if the layer does not exist.
    pub fn inform_channels(
        &mut self,
        layer: &str,
        events: &[InformEvent],
        timestamp: u64,
    ) -> Result<Vec<Constraint>, RoutingError> {
        let target = self.get_mut(layer)?;
        let mut touched = BTreeSet::new();
        for event in events {
            target.inform(
                event.short_channel_id_dir,
                event.amount_msat,
                event.inform,
                timestamp,
            );
            touched.insert(event.short_channel_id_dir);
        }
        Ok(touched
            .iter()
            .filter_map(|scidd| target.constraints.get(scidd).cloned())
            .collect())
    }

    /// Drop constraint bounds in `layer` observed before `cutoff`.
    pub fn age(&mut self, layer: &str, cutoff: u64) -> Result<usize, RoutingError> {
        let target = self.get_mut(layer)?;
        let mut removed = 0;
        target.constraints.retain(|_, c| {
            removed += c.age(cutoff);
            !c.is_empty()
        });
        Ok(removed)
    }

    /// True if the direction is announced in the base graph or created by a
    /// layer.
    pub fn edge_exists(&self, base: &BaseGraph, scidd: &ShortChannelIdDir) -> bool {
        base.contains_edge(scidd) || self.layers.iter().any(|l| l.creates(scidd))
    }

    /// Nominal capacity of the channel behind `scidd`: the base graph's if it
    /// knows the edge, otherwise that of the oldest layer creating it.
    pub fn nominal_capacity(&self, base: &BaseGraph, scidd: &ShortChannelIdDir) -> Option<Msat> {
        if base.contains_edge(scidd) {
            return base.channel(&scidd.scid).map(|c| c.capacity_msat);
        }
        self.layers
            .iter()
            .filter(|l| l.creates(scidd))
            .find_map(|l| l.created_channels.get(&scidd.scid))
            .map(|c| c.capacity_msat)
    }

    /// The highest amount `scidd` is believed able to carry, counting every
    /// layer's learned maximum.
    pub fn believed_maximum(&self, base: &BaseGraph, scidd: &ShortChannelIdDir) -> Option<Msat> {
        let nominal = self.nominal_capacity(base, scidd)?;
        let learned = self
            .layers
            .iter()
            .filter_map(|l| l.constraints.get(scidd))
            .filter_map(Constraint::maximum_msat)
            .min();
        Some(learned.map_or(nominal, |max| max.min(nominal)))
    }

    /// Persistent layers, for writing to storage.
    pub fn persistent_layers(&self) -> Vec<Layer> {
        self.layers.iter().filter(|l| l.persistent).cloned().collect()
    }

    /// Re-insert layers loaded from storage, skipping names already present.
    pub fn restore(&mut self, layers: Vec<Layer>) -> usize {
        let mut restored = 0;
        for layer in layers {
            if self.contains(&layer.name) {
                tracing::warn!(layer = %layer.name, "skipping stored layer, name already in use");
                continue;
            }
            self.layers.push(layer);
            restored += 1;
        }
        restored
    }
}
