//! RocksDB storage backend for the lnroute node.

use anyhow::Result;
use lnroute_routing::Layer;
use rocksdb::{ColumnFamilyDescriptor, IteratorMode, Options, DB};
use std::path::Path;

/// Persistent layers, keyed by name, JSON values.
const CF_LAYERS: &str = "layers";

/// RocksDB-backed storage for the lnroute node.
pub struct Storage {
    db: DB,
}

impl Storage {
    /// Open or create a RocksDB database at the given path with column families.
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors = vec![ColumnFamilyDescriptor::new(CF_LAYERS, Options::default())];

        let db = DB::open_cf_descriptors(&opts, path, cf_descriptors)?;

        Ok(Self { db })
    }

    fn cf(&self, cf_name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(cf_name)
            .ok_or_else(|| anyhow::anyhow!("column family '{}' not found", cf_name))
    }

    /// Write a layer, replacing any stored copy with the same name.
    pub fn put_layer(&self, layer: &Layer) -> Result<()> {
        let value = serde_json::to_vec(layer)?;
        self.db.put_cf(self.cf(CF_LAYERS)?, layer.name.as_bytes(), value)?;
        Ok(())
    }

    /// Get a stored layer by name.
    pub fn get_layer(&self, name: &str) -> Result<Option<Layer>> {
        match self.db.get_cf(self.cf(CF_LAYERS)?, name.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn delete_layer(&self, name: &str) -> Result<()> {
        self.db.delete_cf(self.cf(CF_LAYERS)?, name.as_bytes())?;
        Ok(())
    }

    /// Every stored layer, in key order. Entries that no longer decode are
    /// skipped with a warning.
    pub fn load_layers(&self) -> Result<Vec<Layer>> {
        let mut layers = Vec::new();
        for item in self.db.iterator_cf(self.cf(CF_LAYERS)?, IteratorMode::Start) {
            let (key, value) = item?;
            match serde_json::from_slice::<Layer>(&value) {
                Ok(layer) => layers.push(layer),
                Err(e) => {
                    tracing::warn!(
                        key = %String::from_utf8_lossy(&key),
                        error = %e,
                        "skipping undecodable stored layer"
                    );
                }
            }
        }
        Ok(layers)
    }
}
