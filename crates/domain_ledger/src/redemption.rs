//! Redemptions and lot allocations
//!
//! A redemption is the business record of spending points on a reward.
//! Lot allocations are the ledger's receipts: each one says "this
//! consuming entry took this many points from this lot".

use chrono::{DateTime, Utc};
use core_kernel::{ActorId, AllocationId, CustomerId, LedgerEntryId, OrgId, Points, RedemptionId};
use serde::{Deserialize, Serialize};

/// A spend of points on a reward
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Redemption {
    /// Unique identifier
    pub id: RedemptionId,
    /// Owning organization
    pub org_id: OrgId,
    /// Who redeemed
    pub customer_id: CustomerId,
    /// Whole points spent
    pub points_redeemed: Points,
    /// Business time of the redemption
    pub redeemed_at: DateTime<Utc>,
    /// What the points bought
    pub reward_name: Option<String>,
    /// Free-form note
    pub note: Option<String>,
    /// Who recorded the redemption
    pub created_by: ActorId,
    /// When the record was written
    pub created_at: DateTime<Utc>,
}

/// A draw of points from one lot by one consuming entry
///
/// Every negative ledger entry is fully covered by allocation rows:
/// their `points_used` sum to the entry's absolute delta. Redemption
/// draws carry the redemption id; expirations, debit adjustments, and
/// reversals leave it empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotAllocation {
    /// Unique identifier
    pub id: AllocationId,
    /// The consuming (negative) entry
    pub entry_id: LedgerEntryId,
    /// The lot (positive entry) drawn from
    pub earn_entry_id: LedgerEntryId,
    /// Points taken from the lot, always positive
    pub points_used: Points,
    /// Redemption behind the draw, when there is one
    pub redemption_id: Option<RedemptionId>,
    /// When the allocation was written
    pub created_at: DateTime<Utc>,
}
