use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use lnroute_core::{Msat, ShortChannelIdDir};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RoutingError;

/// One edge-direction of a path to reserve or release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveHop {
    pub short_channel_id_dir: ShortChannelIdDir,
    pub amount_msat: Msat,
}

/// A hold on part of an edge-direction's capacity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub short_channel_id_dir: ShortChannelIdDir,
    pub amount_msat: Msat,
    pub created_at: DateTime<Utc>,
    pub owner: String,
}

/// A reservation as reported to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationInfo {
    pub short_channel_id_dir: ShortChannelIdDir,
    pub amount_msat: Msat,
    pub age_secs: u64,
    pub created_at: DateTime<Utc>,
    pub owner: String,
}

impl ReservationInfo {
    fn from_reservation(r: &Reservation, now: DateTime<Utc>) -> Self {
        let age = now.signed_duration_since(r.created_at).num_seconds().max(0);
        Self {
            short_channel_id_dir: r.short_channel_id_dir,
            amount_msat: r.amount_msat,
            age_secs: age as u64,
            created_at: r.created_at,
            owner: r.owner.clone(),
        }
    }
}

/// Ledger of in-flight capacity holds.
///
/// Reserve and unreserve each run entirely under one lock: either every hop
/// of a path is applied or none is. The ledger never expires entries on its
/// own.
pub struct ReservationLedger {
    entries: Mutex<BTreeMap<ShortChannelIdDir, Vec<Reservation>>>,
    tolerance: Msat,
}

impl ReservationLedger {
    /// Create an empty ledger. `tolerance` is how far an unreserve amount may
    /// differ from the reserved one and still match.
    pub fn new(tolerance: Msat) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            tolerance,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<ShortChannelIdDir, Vec<Reservation>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reserve every hop of `path` or nothing.
    ///
    /// `believed_max` yields the highest amount an edge is currently believed
    /// to carry; `None` means the edge is unknown. Returns the owner the
    /// reservations were filed under (a fresh UUID if none was given).
    pub fn reserve<F>(
        &self,
        path: &[ReserveHop],
        owner: Option<String>,
        believed_max: F,
    ) -> Result<String, RoutingError>
    where
        F: Fn(&ShortChannelIdDir) -> Option<Msat>,
    {
        if path.is_empty() {
            return Err(RoutingError::InvalidRequest("cannot reserve an empty path".into()));
        }
        let owner = owner.unwrap_or_else(|| Uuid::now_v7().to_string());
        let mut entries = self.lock();

        let mut requested: BTreeMap<ShortChannelIdDir, Msat> = BTreeMap::new();
        for hop in path {
            let scidd = hop.short_channel_id_dir;
            let max = believed_max(&scidd).ok_or(RoutingError::EdgeNotFound(scidd))?;
            let held = Msat::checked_sum(
                entries
                    .get(&scidd)
                    .into_iter()
                    .flatten()
                    .map(|r| r.amount_msat),
            )?;
            let wanted = requested.entry(scidd).or_default();
            *wanted = wanted.checked_add(hop.amount_msat)?;

            let available = max.saturating_sub(held);
            if *wanted > available {
                tracing::debug!(
                    scidd = %scidd,
                    requested_msat = wanted.msat(),
                    available_msat = available.msat(),
                    "reservation refused"
                );
                return Err(RoutingError::InsufficientCapacity {
                    scidd,
                    requested: *wanted,
                    available,
                });
            }
        }

        let now = Utc::now();
        for hop in path {
            entries
                .entry(hop.short_channel_id_dir)
                .or_default()
                .push(Reservation {
                    short_channel_id_dir: hop.short_channel_id_dir,
                    amount_msat: hop.amount_msat,
                    created_at: now,
                    owner: owner.clone(),
                });
        }
        tracing::info!(owner = %owner, hops = path.len(), "path reserved");
        Ok(owner)
    }

    /// Release the reservations matching every hop of `path`, or nothing.
    ///
    /// A hop with no matching entry yields `ReservationConflict` and the
    /// ledger is left as it was.
    pub fn unreserve(&self, path: &[ReserveHop]) -> Result<(), RoutingError> {
        let mut entries = self.lock();

        let mut claimed: BTreeMap<ShortChannelIdDir, Vec<usize>> = BTreeMap::new();
        for hop in path {
            let scidd = hop.short_channel_id_dir;
            let taken = claimed.entry(scidd).or_default();
            let candidates = entries.get(&scidd).map(Vec::as_slice).unwrap_or_default();
            let diff = |r: &Reservation| {
                r.amount_msat
                    .saturating_sub(hop.amount_msat)
                    .max(hop.amount_msat.saturating_sub(r.amount_msat))
            };
            // Oldest exact match first, then the closest one within tolerance.
            let found = candidates
                .iter()
                .enumerate()
                .filter(|&(idx, r)| !taken.contains(&idx) && diff(r) <= self.tolerance)
                .min_by_key(|&(idx, r)| (diff(r), idx))
                .map(|(idx, _)| idx);

            match found {
                Some(idx) => taken.push(idx),
                None => {
                    tracing::warn!(
                        scidd = %scidd,
                        amount_msat = hop.amount_msat.msat(),
                        "unreserve found no matching reservation"
                    );
                    return Err(RoutingError::ReservationConflict {
                        scidd,
                        amount: hop.amount_msat,
                    });
                }
            }
        }

        for (scidd, mut indices) in claimed {
            if let Some(list) = entries.get_mut(&scidd) {
                indices.sort_unstable_by(|a, b| b.cmp(a));
                for idx in indices {
                    list.remove(idx);
                }
                if list.is_empty() {
                    entries.remove(&scidd);
                }
            }
        }
        tracing::info!(hops = path.len(), "path unreserved");
        Ok(())
    }

    /// Every active reservation, ordered by edge-direction then age.
    pub fn list(&self) -> Vec<ReservationInfo> {
        let now = Utc::now();
        self.lock()
            .values()
            .flatten()
            .map(|r| ReservationInfo::from_reservation(r, now))
            .collect()
    }

    /// Reservations older than `max_age`, for an external sweeper to release.
    pub fn stale(&self, max_age: Duration) -> Vec<ReservationInfo> {
        let now = Utc::now();
        self.lock()
            .values()
            .flatten()
            .filter(|r| now.signed_duration_since(r.created_at) > max_age)
            .map(|r| ReservationInfo::from_reservation(r, now))
            .collect()
    }

    /// Sum of held amounts per edge-direction.
    pub fn totals(&self) -> Result<BTreeMap<ShortChannelIdDir, Msat>, RoutingError> {
        let entries = self.lock();
        let mut totals = BTreeMap::new();
        for (scidd, list) in entries.iter() {
            totals.insert(*scidd, Msat::checked_sum(list.iter().map(|r| r.amount_msat))?);
        }
        Ok(totals)
    }

    pub fn len(&self) -> usize {
        self.lock().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ReservationLedger {
    fn default() -> Self {
        Self::new(Msat::ZERO)
    }
}
