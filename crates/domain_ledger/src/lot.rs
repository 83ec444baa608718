//! Earn lots derived from positive ledger entries
//!
//! A lot is a positive entry plus its running consumption. Lots are a
//! view, not a table: `allocated` is the sum of allocation rows against
//! the entry, and `remaining` is derived from it.

use chrono::{DateTime, Duration, Utc};
use core_kernel::{CustomerId, LedgerEntryId, Points, ServiceId};
use serde::{Deserialize, Serialize};

/// A positive entry viewed as a consumable lot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarnLot {
    /// The positive entry backing this lot
    pub entry_id: LedgerEntryId,
    /// Account holder
    pub customer_id: CustomerId,
    /// Service that earned the lot, when there is one
    pub service_id: Option<ServiceId>,
    /// Original size of the lot
    pub points: Points,
    /// Points already drawn by allocations
    pub allocated: Points,
    /// Business time the lot was earned
    pub occurs_at: DateTime<Utc>,
    /// When the lot dies
    pub expires_at: DateTime<Utc>,
}

impl EarnLot {
    /// Points still available in this lot
    pub fn remaining(&self) -> Points {
        self.points - self.allocated
    }

    /// Returns true if the lot is dead at the given instant
    ///
    /// Expiry is exclusive of the boundary: a lot expiring exactly at
    /// `as_of` is already dead.
    pub fn is_expired(&self, as_of: DateTime<Utc>) -> bool {
        self.expires_at <= as_of
    }

    /// Returns true if the lot is alive at `as_of` but dies within the
    /// horizon
    pub fn expires_within(&self, as_of: DateTime<Utc>, horizon: Duration) -> bool {
        !self.is_expired(as_of) && self.expires_at <= as_of + horizon
    }
}

/// A lot about to expire, for "use them or lose them" views
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpiringLot {
    pub entry_id: LedgerEntryId,
    pub service_id: Option<ServiceId>,
    pub remaining: Points,
    pub expires_at: DateTime<Utc>,
}

impl From<&EarnLot> for ExpiringLot {
    fn from(lot: &EarnLot) -> Self {
        Self {
            entry_id: lot.entry_id,
            service_id: lot.service_id,
            remaining: lot.remaining(),
            expires_at: lot.expires_at,
        }
    }
}
