//! Earn transactions
//!
//! The business record of a spend that earned points. The corresponding
//! ledger entry carries the point movement; this record keeps the spend
//! amount, the rule that priced it, and the receipt reference.

use chrono::{DateTime, Utc};
use core_kernel::{ActorId, CustomerId, EarnTransactionId, OrgId, Points, RuleId, ServiceId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A recorded spend and the points it earned
///
/// Zero-point transactions are recorded too: a spend under the rule's
/// minimum still shows up in the customer's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarnTransaction {
    /// Unique identifier
    pub id: EarnTransactionId,
    /// Owning organization
    pub org_id: OrgId,
    /// Who spent
    pub customer_id: CustomerId,
    /// What they spent on
    pub service_id: ServiceId,
    /// Rule that priced the spend
    pub rule_id: RuleId,
    /// Spend amount in the org's currency
    pub spend_amount: Decimal,
    /// Whole points earned after rounding
    pub points_earned: Points,
    /// Business time of the spend
    pub occurs_at: DateTime<Utc>,
    /// When the earned points die
    pub expires_at: DateTime<Utc>,
    /// External receipt or POS reference, not unique
    pub reference_no: Option<String>,
    /// Free-form note
    pub note: Option<String>,
    /// Who recorded the spend
    pub created_by: ActorId,
    /// When the record was written
    pub created_at: DateTime<Utc>,
}
