//! `lnroute status`: query the status of a running node.

use serde::Deserialize;

use crate::client::ApiClient;

#[derive(Deserialize)]
struct StatusResponse {
    version: String,
    uptime_secs: u64,
    channels: usize,
    layers: usize,
    reservations: usize,
}

pub async fn run(api: &ApiClient) -> anyhow::Result<()> {
    let status: StatusResponse = api.get("/api/v1/status").await?;
    println!("Node Status:");
    println!("  Version:       {}", status.version);
    println!("  Uptime:        {}s", status.uptime_secs);
    println!("  Channels:      {}", status.channels);
    println!("  Layers:        {}", status.layers);
    println!("  Reservations:  {}", status.reservations);
    Ok(())
}
