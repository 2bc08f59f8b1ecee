use lnroute_core::{CoreError, Msat, NodeId, ShortChannelId, ShortChannelIdDir};

/// Errors that can occur within the routing layer.
///
/// Every error is scoped to the request that produced it; none leaves shared
/// state partially updated.
#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    #[error("unknown layer: {0}")]
    LayerNotFound(String),

    #[error("layer already exists: {0}")]
    LayerExists(String),

    #[error("channel {0} already exists")]
    DuplicateEdge(ShortChannelId),

    #[error("unknown channel direction: {0}")]
    EdgeNotFound(ShortChannelIdDir),

    #[error("no route found from {from} to {to} for {amount}")]
    NoRouteFound {
        from: NodeId,
        to: NodeId,
        amount: Msat,
    },

    #[error("insufficient capacity on {scidd}: requested {requested}, available {available}")]
    InsufficientCapacity {
        scidd: ShortChannelIdDir,
        requested: Msat,
        available: Msat,
    },

    #[error("no reservation on {scidd} matching {amount}")]
    ReservationConflict {
        scidd: ShortChannelIdDir,
        amount: Msat,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl RoutingError {
    /// Outcomes a caller is expected to retry with different parameters
    /// rather than treat as a failure.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NoRouteFound { .. }
                | Self::InsufficientCapacity { .. }
                | Self::ReservationConflict { .. }
        )
    }

    /// True for arithmetic bound violations on msat amounts.
    pub fn is_amount_overflow(&self) -> bool {
        matches!(self, Self::Core(CoreError::AmountOverflow(_)))
    }
}
