//! `lnroute init`: write a default node configuration.

use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Directory to initialize (defaults to current directory).
    #[arg(default_value = ".")]
    pub dir: PathBuf,
}

const DEFAULT_CONFIG: &str = r#"# lnroute node configuration

[api]
listen_addr = "127.0.0.1"
port = 9737

[storage]
data_dir = "./data"

[graph]
# JSON graph snapshot loaded at start-up.
# path = "./graph.json"

[router]
max_hops = 20
max_parts = 16
default_final_cltv = 18
min_part_msat = 1000
unreserve_tolerance_msat = 0

[reservations]
max_age_secs = 3600
sweep_interval_secs = 60
release_stale = true

[logging]
level = "info"
format = "text"
"#;

pub fn run(args: &InitArgs) -> anyhow::Result<()> {
    let config_path = args.dir.join("lnroute.toml");

    if config_path.exists() {
        anyhow::bail!("configuration file already exists at {}", config_path.display());
    }

    std::fs::create_dir_all(args.dir.join("data"))?;
    std::fs::write(&config_path, DEFAULT_CONFIG)?;

    println!("Initialized lnroute node at {}", config_path.display());
    println!("Set [graph].path to a graph snapshot, then run:");
    println!("  lnroute-node --config {}", config_path.display());

    Ok(())
}
