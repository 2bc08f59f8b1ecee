use serde::{Deserialize, Serialize};

/// Tunables for route search and the reservation ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Maximum number of hops in a single route.
    #[serde(default = "default_max_hops")]
    pub max_hops: usize,
    /// Maximum number of routes a payment may be split into.
    #[serde(default = "default_max_parts")]
    pub max_parts: usize,
    /// CLTV delta required by the recipient when the caller gives none.
    #[serde(default = "default_final_cltv")]
    pub default_final_cltv: u32,
    /// Smallest amount worth sending as a separate part when splitting.
    #[serde(default = "default_min_part_msat")]
    pub min_part_msat: u64,
    /// Allowed difference between an unreserve amount and the reserved one.
    #[serde(default)]
    pub unreserve_tolerance_msat: u64,
}

fn default_max_hops() -> usize {
    20
}
fn default_max_parts() -> usize {
    16
}
fn default_final_cltv() -> u32 {
    18
}
fn default_min_part_msat() -> u64 {
    1_000
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_hops: default_max_hops(),
            max_parts: default_max_parts(),
            default_final_cltv: default_final_cltv(),
            min_part_msat: default_min_part_msat(),
            unreserve_tolerance_msat: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RouterConfig::default();
        assert_eq!(config.max_hops, 20);
        assert_eq!(config.max_parts, 16);
        assert_eq!(config.default_final_cltv, 18);
        assert_eq!(config.unreserve_tolerance_msat, 0);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: RouterConfig = toml::from_str("max_parts = 4\n").expect("parse");
        assert_eq!(config.max_parts, 4);
        assert_eq!(config.max_hops, 20);
        assert_eq!(config.min_part_msat, 1_000);
    }
}
