//! `lnroute inform`: record an observation about an edge's liquidity.

use clap::Args;
use lnroute_core::{Msat, ShortChannelIdDir};
use lnroute_routing::{Constraint, InformKind};
use serde_json::json;

use crate::client::ApiClient;

#[derive(Args, Debug)]
pub struct InformArgs {
    /// Layer that records the observation.
    pub layer: String,

    pub short_channel_id_dir: ShortChannelIdDir,

    /// Amount the observation is about, in millisatoshi.
    pub amount_msat: u64,

    /// CONSTRAINED, UNCONSTRAINED or SUCCEEDED.
    pub inform: InformKind,

    /// Observation time (UNIX seconds); defaults to now on the node.
    #[arg(long)]
    pub timestamp: Option<u64>,
}

fn describe(c: &Constraint) -> String {
    let min = c
        .minimum
        .map(|b| b.amount_msat.to_string())
        .unwrap_or_else(|| "-".into());
    let max = c
        .maximum
        .map(|b| b.amount_msat.to_string())
        .unwrap_or_else(|| "-".into());
    format!("{}: min {} max {}", c.short_channel_id_dir, min, max)
}

pub async fn run(api: &ApiClient, args: &InformArgs) -> anyhow::Result<()> {
    let constraints: Vec<Constraint> = api
        .post(
            &format!("/api/v1/layers/{}/inform", args.layer),
            &json!({
                "short_channel_id_dir": args.short_channel_id_dir,
                "amount_msat": Msat::from_msat(args.amount_msat),
                "inform": args.inform,
                "timestamp": args.timestamp,
            }),
        )
        .await?;

    if constraints.is_empty() {
        println!("No constraint left on {}", args.short_channel_id_dir);
    }
    for c in &constraints {
        println!("{}", describe(c));
    }
    Ok(())
}
