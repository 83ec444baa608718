//! Immutable ledger entries
//!
//! An entry is one signed movement of points. Entries are never updated
//! or deleted; every correction is a new compensating entry.

use chrono::{DateTime, Utc};
use core_kernel::{ActorId, CustomerId, LedgerEntryId, OrgId, Points, ServiceId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// What caused a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntrySource {
    /// Points earned from a spend (positive delta, opens a lot)
    Earn,
    /// Points redeemed for a reward (negative delta)
    Redeem,
    /// Points expired by the sweep (negative delta)
    Expire,
    /// Manual correction, either sign
    Adjust,
    /// Reversal of an earn (negative delta, or zero if nothing remained)
    Reversal,
}

impl EntrySource {
    /// Returns the wire representation of the source
    pub fn as_str(&self) -> &'static str {
        match self {
            EntrySource::Earn => "EARN",
            EntrySource::Redeem => "REDEEM",
            EntrySource::Expire => "EXPIRE",
            EntrySource::Adjust => "ADJUST",
            EntrySource::Reversal => "REVERSAL",
        }
    }
}

impl std::fmt::Display for EntrySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One immutable movement of points
///
/// `source_id` points at the record that caused the entry: the earn
/// transaction, the redemption, the expired lot's entry, or the reversed
/// earn's entry. Positive entries carry `expires_at` and act as lots;
/// negative entries leave it empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique identifier (time-ordered)
    pub id: LedgerEntryId,
    /// Owning organization
    pub org_id: OrgId,
    /// Account holder
    pub customer_id: CustomerId,
    /// Service involved, when the source has one
    pub service_id: Option<ServiceId>,
    /// What caused this entry
    pub source: EntrySource,
    /// Identifier of the causing record
    pub source_id: Uuid,
    /// Signed point movement
    pub points_delta: Points,
    /// Business time of the movement
    pub occurs_at: DateTime<Utc>,
    /// When the points die, for positive entries
    pub expires_at: Option<DateTime<Utc>>,
    /// Open key-value bag for display (spend amount, reward name,
    /// operator reason). No balance or allocation rule reads it.
    pub metadata: Option<Value>,
    /// Who triggered the entry
    pub created_by: ActorId,
    /// When the entry was recorded
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Returns true if this entry opens a lot (non-negative delta with
    /// an expiry date)
    pub fn is_lot(&self) -> bool {
        !self.points_delta.is_negative() && self.expires_at.is_some()
    }

    /// Returns true if this entry consumes from lots
    pub fn is_consuming(&self) -> bool {
        self.points_delta.is_negative()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(delta: i64, expires: bool) -> LedgerEntry {
        LedgerEntry {
            id: LedgerEntryId::new_v7(),
            org_id: OrgId::new(),
            customer_id: CustomerId::new(),
            service_id: None,
            source: if delta >= 0 {
                EntrySource::Earn
            } else {
                EntrySource::Redeem
            },
            source_id: Uuid::new_v4(),
            points_delta: Points::new(delta),
            occurs_at: Utc::now(),
            expires_at: expires.then(Utc::now),
            metadata: None,
            created_by: ActorId::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_positive_entry_with_expiry_is_lot() {
        assert!(entry(10, true).is_lot());
    }

    #[test]
    fn test_zero_point_earn_is_still_a_lot() {
        assert!(entry(0, true).is_lot());
    }

    #[test]
    fn test_negative_entry_is_consuming() {
        let e = entry(-5, false);
        assert!(e.is_consuming());
        assert!(!e.is_lot());
    }

    #[test]
    fn test_source_serializes_screaming_snake() {
        let json = serde_json::to_string(&EntrySource::Reversal).unwrap();
        assert_eq!(json, "\"REVERSAL\"");
    }
}
