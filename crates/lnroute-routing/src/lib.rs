//! lnroute routing: the route-computation core.
//!
//! This crate provides:
//! - [`BaseGraph`] the observed public topology, replaced wholesale on refresh.
//! - [`LayerStore`] named overlays of disabled nodes, extra channels, policy
//!   overrides, learned [`Constraint`]s and [`Bias`]es.
//! - [`ReservationLedger`] atomic capacity holds shared by concurrent attempts.
//! - [`PathFinder`] backward Dijkstra over an [`EffectiveGraph`], splitting
//!   the amount into several routes when no single one carries it.
//! - [`RouteService`] the thread-safe facade over all of the above.
//! - [`apply_outcome`] turns attempt results into constraint updates.

pub mod base_graph;
pub mod constraint;
pub mod effective;
pub mod error;
pub mod feedback;
pub mod layer;
pub mod pathfinder;
pub mod probability;
pub mod reserve;
pub mod route;
pub mod service;

#[cfg(test)]
mod test_util;

// Re-exports for convenience.
pub use base_graph::{BaseGraph, Channel, ChannelHalf, GraphSnapshot};
pub use constraint::{Constraint, ConstraintBound, InformKind};
pub use effective::{EdgeView, EffectiveGraph};
pub use error::RoutingError;
pub use feedback::{apply_outcome, AttemptOutcome, FeedbackReport};
pub use layer::{Bias, ChannelUpdate, CreatedChannel, InformEvent, Layer, LayerStore};
pub use pathfinder::{PathFinder, RouteQuery};
pub use reserve::{Reservation, ReservationInfo, ReservationLedger, ReserveHop};
pub use route::{Route, RouteHop, RouteSet};
pub use service::{unix_now, GetRoutesRequest, RouteService, ServiceStats};
