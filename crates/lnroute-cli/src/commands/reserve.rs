//! `lnroute reserve`, `unreserve` and `reservations`.

use clap::Args;
use lnroute_core::Msat;
use lnroute_routing::{ReservationInfo, ReserveHop};
use serde::Deserialize;
use serde_json::json;

use crate::client::ApiClient;

/// Parse `SCIDD=AMOUNT_MSAT`, e.g. `103x1x0/1=50000`.
pub fn parse_hop(s: &str) -> Result<ReserveHop, String> {
    let (scidd, amount) = s
        .split_once('=')
        .ok_or_else(|| format!("expected SCIDD=AMOUNT_MSAT, got '{s}'"))?;
    let short_channel_id_dir = scidd.parse().map_err(|e| format!("{e}"))?;
    let amount: u64 = amount
        .parse()
        .map_err(|_| format!("invalid amount '{amount}'"))?;
    Ok(ReserveHop {
        short_channel_id_dir,
        amount_msat: Msat::from_msat(amount),
    })
}

#[derive(Args, Debug)]
pub struct ReserveArgs {
    /// Path hops as SCIDD=AMOUNT_MSAT, in path order.
    #[arg(required = true, value_parser = parse_hop)]
    pub hops: Vec<ReserveHop>,

    /// Label shown in the reservation list.
    #[arg(long)]
    pub owner: Option<String>,
}

#[derive(Args, Debug)]
pub struct UnreserveArgs {
    /// Path hops as SCIDD=AMOUNT_MSAT, exactly as reserved.
    #[arg(required = true, value_parser = parse_hop)]
    pub hops: Vec<ReserveHop>,
}

#[derive(Deserialize)]
struct ReserveResponse {
    owner: String,
}

#[derive(Deserialize)]
struct UnreserveResponse {
    released: usize,
}

pub async fn run_reserve(api: &ApiClient, args: &ReserveArgs) -> anyhow::Result<()> {
    let resp: ReserveResponse = api
        .post(
            "/api/v1/reservations",
            &json!({ "path": args.hops, "owner": args.owner }),
        )
        .await?;
    println!("Reserved {} hop(s) as {}", args.hops.len(), resp.owner);
    Ok(())
}

pub async fn run_unreserve(api: &ApiClient, args: &UnreserveArgs) -> anyhow::Result<()> {
    let resp: UnreserveResponse = api
        .post("/api/v1/reservations/release", &json!({ "path": args.hops }))
        .await?;
    println!("Released {} hop(s)", resp.released);
    Ok(())
}

pub async fn run_list(api: &ApiClient) -> anyhow::Result<()> {
    let list: Vec<ReservationInfo> = api.get("/api/v1/reservations").await?;
    if list.is_empty() {
        println!("No reservations.");
        return Ok(());
    }
    for r in &list {
        println!(
            "{:<20} {:>16}  {:>6}s  {}",
            r.short_channel_id_dir.to_string(),
            r.amount_msat.to_string(),
            r.age_secs,
            r.owner
        );
    }
    Ok(())
}
