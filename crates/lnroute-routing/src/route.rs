use lnroute_core::{CoreError, Msat, NodeId, ShortChannelIdDir};
use serde::{Deserialize, Serialize};

use crate::reserve::ReserveHop;

/// One hop of a route, as handed to onion construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteHop {
    pub short_channel_id_dir: ShortChannelIdDir,
    /// Node at the far end of this edge-direction.
    pub next_node_id: NodeId,
    /// Amount crossing this edge: the delivered amount plus every fee charged
    /// further along the route.
    pub amount_msat: Msat,
    /// CLTV expiry required at this hop: the final CLTV plus every delta
    /// further along the route.
    pub delay: u32,
}

/// A single path from source to destination delivering `amount_msat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub probability_ppm: u32,
    pub amount_msat: Msat,
    pub final_cltv: u32,
    /// Ordered hops from the source toward the destination.
    pub path: Vec<RouteHop>,
}

impl Route {
    /// Number of hops in this route.
    pub fn hop_count(&self) -> usize {
        self.path.len()
    }

    /// What the source has to send into the first hop.
    pub fn sent_amount(&self) -> Msat {
        self.path.first().map_or(self.amount_msat, |hop| hop.amount_msat)
    }

    /// Sum of the forwarding fees paid along the route.
    pub fn total_fee(&self) -> Msat {
        self.sent_amount().saturating_sub(self.amount_msat)
    }

    /// CLTV expiry of the first HTLC.
    pub fn total_delay(&self) -> u32 {
        self.path.first().map_or(self.final_cltv, |hop| hop.delay)
    }

    /// The hops of this route in the form the reservation ledger takes.
    pub fn to_reserve_hops(&self) -> Vec<ReserveHop> {
        self.path
            .iter()
            .map(|hop| ReserveHop {
                short_channel_id_dir: hop.short_channel_id_dir,
                amount_msat: hop.amount_msat,
            })
            .collect()
    }
}

/// The answer to a route request: routes whose delivered amounts add up to
/// the requested amount.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RouteSet {
    /// Joint success estimate of every route, in parts per million.
    pub probability_ppm: u32,
    pub routes: Vec<Route>,
}

impl RouteSet {
    /// No routes, probability zero.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Sum of the delivered amounts.
    pub fn total_amount(&self) -> Result<Msat, CoreError> {
        Msat::checked_sum(self.routes.iter().map(|r| r.amount_msat))
    }

    /// Sum of the fees across every route.
    pub fn total_fee(&self) -> Result<Msat, CoreError> {
        Msat::checked_sum(self.routes.iter().map(Route::total_fee))
    }
}
