//! `lnroute feedback`: report how a payment attempt ended.

use clap::{Args, ValueEnum};
use lnroute_core::{Msat, ShortChannelIdDir};
use lnroute_routing::{AttemptOutcome, FeedbackReport, ReserveHop};
use serde::Serialize;

use super::reserve::parse_hop;
use crate::client::ApiClient;

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Outcome {
    Succeeded,
    Failed,
    Abandoned,
}

#[derive(Args, Debug)]
pub struct FeedbackArgs {
    /// Layer that learns from the outcome.
    pub layer: String,

    #[arg(value_enum)]
    pub outcome: Outcome,

    /// Path hops as SCIDD=AMOUNT_MSAT, as reserved.
    #[arg(required = true, value_parser = parse_hop)]
    pub hops: Vec<ReserveHop>,

    /// Edge that returned the failure (required with `failed`).
    #[arg(long)]
    pub failed_at: Option<ShortChannelIdDir>,

    /// Amount the failing edge was asked to forward; defaults to that hop's amount.
    #[arg(long)]
    pub failed_amount_msat: Option<u64>,
}

#[derive(Serialize)]
struct FeedbackRequest<'a> {
    layer: &'a str,
    path: &'a [ReserveHop],
    #[serde(flatten)]
    outcome: AttemptOutcome,
}

impl FeedbackArgs {
    fn attempt_outcome(&self) -> anyhow::Result<AttemptOutcome> {
        match self.outcome {
            Outcome::Succeeded => Ok(AttemptOutcome::Succeeded),
            Outcome::Abandoned => Ok(AttemptOutcome::Abandoned),
            Outcome::Failed => {
                let scidd = self
                    .failed_at
                    .ok_or_else(|| anyhow::anyhow!("--failed-at is required for a failed attempt"))?;
                let amount = match self.failed_amount_msat {
                    Some(msat) => Msat::from_msat(msat),
                    None => self
                        .hops
                        .iter()
                        .find(|h| h.short_channel_id_dir == scidd)
                        .map(|h| h.amount_msat)
                        .ok_or_else(|| anyhow::anyhow!("{scidd} is not on the path"))?,
                };
                Ok(AttemptOutcome::Failed {
                    short_channel_id_dir: scidd,
                    amount_msat: amount,
                })
            }
        }
    }
}

pub async fn run(api: &ApiClient, args: &FeedbackArgs) -> anyhow::Result<()> {
    let body = FeedbackRequest {
        layer: &args.layer,
        path: &args.hops,
        outcome: args.attempt_outcome()?,
    };
    let report: FeedbackReport = api.post("/api/v1/feedback", &body).await?;
    println!("Updated {} constraint(s)", report.constraints.len());
    if report.released {
        println!("Released {} reserved hop(s)", args.hops.len());
    }
    if let Some(conflict) = report.conflict {
        println!("Warning: {conflict}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(outcome: Outcome, failed_at: Option<&str>) -> FeedbackArgs {
        FeedbackArgs {
            layer: "learned".into(),
            outcome,
            hops: vec![
                parse_hop("1x1x0/0=1010").unwrap(),
                parse_hop("2x1x0/1=1000").unwrap(),
            ],
            failed_at: failed_at.map(|s| s.parse().unwrap()),
            failed_amount_msat: None,
        }
    }

    #[test]
    fn test_failed_defaults_to_hop_amount() {
        let outcome = args(Outcome::Failed, Some("2x1x0/1"))
            .attempt_outcome()
            .unwrap();
        assert_eq!(
            outcome,
            AttemptOutcome::Failed {
                short_channel_id_dir: "2x1x0/1".parse().unwrap(),
                amount_msat: Msat::from_msat(1000),
            }
        );
    }

    #[test]
    fn test_failed_requires_edge() {
        assert!(args(Outcome::Failed, None).attempt_outcome().is_err());
        assert!(args(Outcome::Failed, Some("9x9x9/0")).attempt_outcome().is_err());
        assert_eq!(
            args(Outcome::Succeeded, None).attempt_outcome().unwrap(),
            AttemptOutcome::Succeeded
        );
    }
}
