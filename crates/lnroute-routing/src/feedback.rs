use lnroute_core::{Msat, ShortChannelIdDir};
use serde::{Deserialize, Serialize};

use crate::constraint::{Constraint, InformKind};
use crate::error::RoutingError;
use crate::layer::InformEvent;
use crate::reserve::ReserveHop;
use crate::service::RouteService;

/// How a payment attempt over a reserved path ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Succeeded,
    /// The attempt failed at `short_channel_id_dir` while forwarding
    /// `amount_msat`.
    Failed {
        short_channel_id_dir: ShortChannelIdDir,
        amount_msat: Msat,
    },
    /// The attempt was given up before anything was learned.
    Abandoned,
}

/// What applying an outcome changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackReport {
    /// Constraint records touched, one per informed edge-direction.
    pub constraints: Vec<Constraint>,
    /// Whether the path's reservations were released.
    pub released: bool,
    /// Set when the path did not match the ledger; the reservations are left
    /// in place for the sweeper.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict: Option<String>,
}

/// Turn the outcome of an attempt into constraint updates in `layer` and
/// release the path's reservations.
///
/// The outcome is validated before anything changes. A mismatch between the
/// path and the ledger is reported in the result rather than returned as an
/// error, since the constraints have already been learned by then.
pub fn apply_outcome(
    service: &RouteService,
    layer: &str,
    path: &[ReserveHop],
    outcome: &AttemptOutcome,
) -> Result<FeedbackReport, RoutingError> {
    if path.is_empty() {
        return Err(RoutingError::InvalidRequest("feedback path is empty".into()));
    }
    if !service.has_layer(layer) {
        return Err(RoutingError::LayerNotFound(layer.to_string()));
    }

    let events = outcome_events(path, outcome)?;
    let constraints = if events.is_empty() {
        Vec::new()
    } else {
        service.inform_channels(layer, &events)?
    };

    let mut report = FeedbackReport {
        constraints,
        ..FeedbackReport::default()
    };
    match service.unreserve(path) {
        Ok(()) => report.released = true,
        Err(err @ RoutingError::ReservationConflict { .. }) => {
            report.conflict = Some(err.to_string());
        }
        Err(err) => return Err(err),
    }

    tracing::info!(
        layer = %layer,
        hops = path.len(),
        outcome = ?outcome,
        released = report.released,
        "attempt outcome applied"
    );
    Ok(report)
}

/// Observations implied by `outcome` for each hop of `path`.
fn outcome_events(
    path: &[ReserveHop],
    outcome: &AttemptOutcome,
) -> Result<Vec<InformEvent>, RoutingError> {
    let event = |hop: &ReserveHop, inform| InformEvent {
        short_channel_id_dir: hop.short_channel_id_dir,
        amount_msat: hop.amount_msat,
        inform,
    };

    match outcome {
        AttemptOutcome::Succeeded => Ok(path
            .iter()
            .map(|hop| event(hop, InformKind::Succeeded))
            .collect()),
        AttemptOutcome::Failed {
            short_channel_id_dir,
            amount_msat,
        } => {
            let idx = path
                .iter()
                .position(|hop| hop.short_channel_id_dir == *short_channel_id_dir)
                .ok_or_else(|| {
                    RoutingError::InvalidRequest(format!(
                        "failing channel {short_channel_id_dir} is not on the path"
                    ))
                })?;
            let mut events: Vec<InformEvent> = path[..idx]
                .iter()
                .map(|hop| event(hop, InformKind::Unconstrained))
                .collect();
            events.push(InformEvent {
                short_channel_id_dir: *short_channel_id_dir,
                amount_msat: *amount_msat,
                inform: InformKind::Constrained,
            });
            Ok(events)
        }
        AttemptOutcome::Abandoned => Ok(Vec::new()),
    }
}
