use std::fmt;
use std::str::FromStr;

use lnroute_core::{Msat, ShortChannelIdDir};
use serde::{Deserialize, Serialize};

use crate::error::RoutingError;

/// What an attempt taught us about an edge-direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InformKind {
    /// The edge failed to forward the amount.
    Constrained,
    /// The edge forwarded the amount but the attempt did not settle.
    Unconstrained,
    /// The edge forwarded the amount and the payment succeeded.
    Succeeded,
}

impl fmt::Display for InformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constrained => write!(f, "CONSTRAINED"),
            Self::Unconstrained => write!(f, "UNCONSTRAINED"),
            Self::Succeeded => write!(f, "SUCCEEDED"),
        }
    }
}

impl FromStr for InformKind {
    type Err = RoutingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CONSTRAINED" => Ok(Self::Constrained),
            "UNCONSTRAINED" => Ok(Self::Unconstrained),
            "SUCCEEDED" => Ok(Self::Succeeded),
            _ => Err(RoutingError::InvalidRequest(format!("unknown inform kind: {s}"))),
        }
    }
}

/// One learned bound and when it was observed (UNIX seconds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintBound {
    pub amount_msat: Msat,
    pub timestamp: u64,
}

/// Learned capacity bounds of one edge-direction within one layer.
///
/// `minimum` and `maximum` age independently. The record never holds a
/// minimum above its maximum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    pub short_channel_id_dir: ShortChannelIdDir,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<ConstraintBound>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<ConstraintBound>,
}

impl Constraint {
    pub fn new(scidd: ShortChannelIdDir) -> Self {
        Self {
            short_channel_id_dir: scidd,
            minimum: None,
            maximum: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.minimum.is_none() && self.maximum.is_none()
    }

    pub fn minimum_msat(&self) -> Option<Msat> {
        self.minimum.map(|b| b.amount_msat)
    }

    pub fn maximum_msat(&self) -> Option<Msat> {
        self.maximum.map(|b| b.amount_msat)
    }

    /// Fold one observation into the record. Returns `true` if anything
    /// changed.
    pub fn apply(&mut self, kind: InformKind, amount: Msat, timestamp: u64) -> bool {
        match kind {
            InformKind::Succeeded => self.raise_minimum(amount, timestamp),
            InformKind::Constrained => self.lower_maximum(amount.saturating_sub(Msat::from_msat(1)), timestamp),
            InformKind::Unconstrained => self.clear_stale_maximum(amount, timestamp),
        }
    }

    fn raise_minimum(&mut self, amount: Msat, timestamp: u64) -> bool {
        if let Some(current) = self.minimum {
            if timestamp < current.timestamp || amount < current.amount_msat {
                return false;
            }
            if amount == current.amount_msat && timestamp == current.timestamp {
                return false;
            }
        }
        if let Some(max) = self.maximum {
            if amount > max.amount_msat {
                // Equal timestamps keep the maximum.
                if timestamp <= max.timestamp {
                    return false;
                }
                self.maximum = None;
            }
        }
        self.minimum = Some(ConstraintBound {
            amount_msat: amount,
            timestamp,
        });
        true
    }

    fn lower_maximum(&mut self, amount: Msat, timestamp: u64) -> bool {
        if let Some(current) = self.maximum {
            if timestamp < current.timestamp || amount > current.amount_msat {
                return false;
            }
            if amount == current.amount_msat && timestamp == current.timestamp {
                return false;
            }
        }
        if let Some(min) = self.minimum {
            if amount < min.amount_msat {
                if timestamp < min.timestamp {
                    return false;
                }
                self.minimum = None;
            }
        }
        self.maximum = Some(ConstraintBound {
            amount_msat: amount,
            timestamp,
        });
        true
    }

    fn clear_stale_maximum(&mut self, amount: Msat, timestamp: u64) -> bool {
        match self.maximum {
            Some(max) if max.amount_msat <= amount && timestamp >= max.timestamp => {
                self.maximum = None;
                true
            }
            _ => false,
        }
    }

    /// Drop bounds observed strictly before `cutoff`; returns how many were
    /// dropped.
    pub fn age(&mut self, cutoff: u64) -> usize {
        let mut removed = 0;
        if self.minimum.is_some_and(|b| b.timestamp < cutoff) {
            self.minimum = None;
            removed += 1;
        }
        if self.maximum.is_some_and(|b| b.timestamp < cutoff) {
            self.maximum = None;
            removed += 1;
        }
        removed
    }
}
