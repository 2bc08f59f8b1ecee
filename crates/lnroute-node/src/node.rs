//! The lnroute node orchestrator.
//!
//! Loads the base graph and the stored layers, serves the HTTP API, and
//! periodically sweeps reservations whose owners never came back.

use anyhow::Result;
use lnroute_routing::{BaseGraph, GraphSnapshot, ReserveHop, RouteService};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use crate::config::NodeConfig;
use crate::state::NodeState;
use crate::storage::Storage;

/// The lnroute node.
pub struct LnrouteNode {
    /// Node configuration.
    config: NodeConfig,
    /// Shared state accessible from HTTP handlers (set by `start`).
    state: Option<Arc<NodeState>>,
}

impl LnrouteNode {
    pub fn new(config: NodeConfig) -> Self {
        Self {
            config,
            state: None,
        }
    }

    /// Initialize and start the node: storage, base graph, HTTP API.
    pub async fn start(&mut self) -> Result<()> {
        tracing::info!("starting lnroute node");

        let state = build_state(&self.config)?;

        let api_addr: SocketAddr = self.config.api_addr().parse()?;
        let api_state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = crate::api::start_api_server(api_addr, api_state).await {
                tracing::error!(error = %e, "HTTP API server error");
            }
        });

        self.state = Some(state);
        Ok(())
    }

    /// Run the stale reservation sweeper until the task is dropped.
    pub async fn run(&self) -> Result<()> {
        let state = self
            .state
            .clone()
            .ok_or_else(|| anyhow::anyhow!("node not started"))?;
        let settings = self.config.reservations.clone();
        let max_age = max_age(settings.max_age_secs);
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(
            settings.sweep_interval_secs.max(1),
        ));

        tracing::info!(
            max_age_secs = settings.max_age_secs,
            interval_secs = settings.sweep_interval_secs,
            "reservation sweeper running"
        );
        loop {
            ticker.tick().await;
            sweep_stale(&state.service, max_age, settings.release_stale);
        }
    }

    /// Gracefully shut down the node, flushing persistent layers.
    pub async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("shutting down lnroute node");
        if let Some(state) = self.state.take() {
            let written = state.persist_all();
            tracing::info!(layers = written, "persistent layers flushed");
        }
        Ok(())
    }
}

/// Open storage, load the base graph and restore stored layers.
pub fn build_state(config: &NodeConfig) -> Result<Arc<NodeState>> {
    let storage = Storage::open(&config.storage.data_dir)?;
    tracing::info!(path = %config.storage.data_dir.display(), "storage initialized");

    let graph = match &config.graph.path {
        Some(path) => load_graph(path)?,
        None => {
            tracing::warn!("no base graph configured, starting empty");
            BaseGraph::new()
        }
    };
    let service = Arc::new(RouteService::new(config.router.clone(), graph));
    service.restore_layers(storage.load_layers()?);

    Ok(Arc::new(NodeState::new(service, Some(storage))))
}

/// Read a JSON graph snapshot from disk.
pub fn load_graph(path: &Path) -> Result<BaseGraph> {
    let contents = std::fs::read_to_string(path)?;
    let snapshot: GraphSnapshot = serde_json::from_str(&contents)?;
    let graph = BaseGraph::from_snapshot(snapshot)?;
    tracing::info!(path = %path.display(), channels = graph.len(), "base graph loaded");
    Ok(graph)
}

fn max_age(secs: u64) -> chrono::Duration {
    let secs = i64::try_from(secs).unwrap_or(i64::MAX).min(i64::MAX / 1_000);
    chrono::Duration::seconds(secs)
}

/// Report, and optionally release, reservations older than `max_age`.
/// Returns how many were found.
pub fn sweep_stale(service: &RouteService, max_age: chrono::Duration, release: bool) -> usize {
    let stale = service.stale_reservations(max_age);
    for info in &stale {
        tracing::warn!(
            scidd = %info.short_channel_id_dir,
            amount_msat = info.amount_msat.msat(),
            owner = %info.owner,
            age_secs = info.age_secs,
            "stale reservation"
        );
        if !release {
            continue;
        }
        let hop = ReserveHop {
            short_channel_id_dir: info.short_channel_id_dir,
            amount_msat: info.amount_msat,
        };
        if let Err(e) = service.unreserve(&[hop]) {
            tracing::warn!(error = %e, "failed to release stale reservation");
        }
    }
    stale.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lnroute_core::{Msat, NodeId, RouterConfig};
    use lnroute_routing::{Channel, ChannelHalf};
    use std::path::PathBuf;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("lnroute-node-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn node(b: u8) -> NodeId {
        format!("02{}", format!("{b:02x}").repeat(32)).parse().unwrap()
    }

    fn snapshot() -> GraphSnapshot {
        let capacity = Msat::from_msat(1_000_000);
        let mut channel = Channel::new("1x1x0".parse().unwrap(), node(1), node(2), capacity);
        channel.halves[0] = Some(ChannelHalf::open(capacity));
        GraphSnapshot {
            channels: vec![channel],
        }
    }

    #[test]
    fn test_load_graph_from_file() {
        let dir = temp_dir();
        let path = dir.join("graph.json");
        std::fs::write(&path, serde_json::to_string(&snapshot()).unwrap()).unwrap();

        let graph = load_graph(&path).unwrap();
        assert_eq!(graph.len(), 1);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_graph_rejects_garbage() {
        let dir = temp_dir();
        let path = dir.join("graph.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(load_graph(&path).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_persistent_layers_survive_restart() {
        let dir = temp_dir();
        let mut config = NodeConfig::default();
        config.storage.data_dir = dir.join("db");

        {
            let state = build_state(&config).unwrap();
            state.service.create_layer("keep", true).unwrap();
            state.service.create_layer("scratch", false).unwrap();
            state.service.disable_node("keep", node(7)).unwrap();
            state.persist_layer("keep");
            state.persist_layer("scratch");
        }

        let state = build_state(&config).unwrap();
        let layers = state.service.list_layers(None).unwrap();
        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].name, "keep");
        assert!(layers[0].disabled_nodes.contains(&node(7)));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_sweep_releases_stale_reservations() {
        let graph = BaseGraph::from_snapshot(snapshot()).unwrap();
        let service = RouteService::new(RouterConfig::default(), graph);
        let hop = ReserveHop {
            short_channel_id_dir: "1x1x0/0".parse().unwrap(),
            amount_msat: Msat::from_msat(1_000),
        };
        service.reserve(&[hop], None).unwrap();

        assert_eq!(sweep_stale(&service, max_age(3600), true), 0);
        assert_eq!(service.list_reservations().len(), 1);

        assert_eq!(sweep_stale(&service, chrono::Duration::seconds(-1), false), 1);
        assert_eq!(service.list_reservations().len(), 1);

        assert_eq!(sweep_stale(&service, chrono::Duration::seconds(-1), true), 1);
        assert!(service.list_reservations().is_empty());
    }

    #[test]
    fn test_max_age_clamps() {
        assert_eq!(max_age(60), chrono::Duration::seconds(60));
        assert!(max_age(u64::MAX) > chrono::Duration::days(365));
    }
}
