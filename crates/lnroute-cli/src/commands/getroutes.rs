//! `lnroute getroutes`: compute routes between two nodes.

use clap::Args;
use lnroute_core::{Msat, NodeId};
use lnroute_routing::{GetRoutesRequest, RouteSet};

use crate::client::ApiClient;

#[derive(Args, Debug)]
pub struct GetRoutesArgs {
    /// Paying node.
    pub source: NodeId,

    /// Receiving node.
    pub destination: NodeId,

    /// Amount to deliver, in millisatoshi.
    pub amount_msat: u64,

    /// Layer to apply; repeat for several, applied in order.
    #[arg(short, long = "layer")]
    pub layers: Vec<String>,

    /// Fee budget across all routes, in millisatoshi.
    #[arg(long)]
    pub maxfee_msat: Option<u64>,

    /// CLTV delta required by the destination.
    #[arg(long)]
    pub final_cltv: Option<u32>,

    /// Upper bound on the total delay of any route.
    #[arg(long)]
    pub maxdelay: Option<u32>,

    /// Print the raw JSON route set.
    #[arg(long)]
    pub json: bool,
}

impl GetRoutesArgs {
    fn to_request(&self) -> GetRoutesRequest {
        GetRoutesRequest {
            source: self.source,
            destination: self.destination,
            amount_msat: Msat::from_msat(self.amount_msat),
            layers: self.layers.clone(),
            maxfee_msat: self.maxfee_msat.map(Msat::from_msat),
            final_cltv: self.final_cltv,
            maxdelay: self.maxdelay,
        }
    }
}

pub async fn run(api: &ApiClient, args: &GetRoutesArgs) -> anyhow::Result<()> {
    let set: RouteSet = api.post("/api/v1/getroutes", &args.to_request()).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&set)?);
        return Ok(());
    }
    if set.is_empty() {
        println!("No route found.");
        return Ok(());
    }

    println!(
        "{} route(s), success probability {} ppm, total fee {}",
        set.routes.len(),
        set.probability_ppm,
        set.total_fee()?
    );
    for (i, route) in set.routes.iter().enumerate() {
        println!();
        println!(
            "Route #{}: delivers {}, fee {}, delay {}, probability {} ppm",
            i + 1,
            route.amount_msat,
            route.total_fee(),
            route.total_delay(),
            route.probability_ppm
        );
        for hop in &route.path {
            println!(
                "  {:<20} -> {}  {} (delay {})",
                hop.short_channel_id_dir.to_string(),
                hop.next_node_id,
                hop.amount_msat,
                hop.delay
            );
        }
    }
    Ok(())
}
