//! Shared node state for the HTTP handlers and background tasks.

use lnroute_routing::RouteService;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use crate::storage::Storage;

/// Shared state for the running node, accessible from HTTP handlers.
pub struct NodeState {
    /// The routing core.
    pub service: Arc<RouteService>,
    /// When the node started.
    pub start_time: Instant,
    /// Where persistent layers are written; `None` runs purely in memory.
    storage: Option<Storage>,
    /// Serialises snapshot-and-write so the last write is the latest state.
    persist_lock: Mutex<()>,
}

impl NodeState {
    pub fn new(service: Arc<RouteService>, storage: Option<Storage>) -> Self {
        Self {
            service,
            start_time: Instant::now(),
            storage,
            persist_lock: Mutex::new(()),
        }
    }

    /// Write `layer` to storage if it is persistent. Failures are logged; the
    /// in-memory state stays authoritative.
    pub fn persist_layer(&self, layer: &str) {
        let Some(storage) = &self.storage else {
            return;
        };
        let _guard = self.persist_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(snapshot) = self.service.persistent_layer(layer) else {
            return;
        };
        if let Err(e) = storage.put_layer(&snapshot) {
            tracing::warn!(layer = %layer, error = %e, "failed to persist layer");
        }
    }

    /// Remove a layer's stored copy, if any.
    pub fn forget_layer(&self, layer: &str) {
        let Some(storage) = &self.storage else {
            return;
        };
        let _guard = self.persist_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = storage.delete_layer(layer) {
            tracing::warn!(layer = %layer, error = %e, "failed to delete stored layer");
        }
    }

    /// Write every persistent layer, e.g. on shutdown.
    pub fn persist_all(&self) -> usize {
        let Some(storage) = &self.storage else {
            return 0;
        };
        let _guard = self.persist_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut written = 0;
        for layer in self.service.persistent_layers() {
            match storage.put_layer(&layer) {
                Ok(()) => written += 1,
                Err(e) => {
                    tracing::warn!(layer = %layer.name, error = %e, "failed to persist layer");
                }
            }
        }
        written
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
