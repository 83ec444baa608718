//! Ledger command DTOs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{
    CustomerId, EarnTransactionId, LedgerEntryId, Points, RedemptionId, RuleId, ServiceId,
};
use domain_ledger::{
    AdjustReceipt, AdjustRequest, AllocationLine, EarnReceipt, EarnRequest, RedeemReceipt,
    RedeemRequest, ReversalReceipt, SweepOutcome,
};

#[derive(Debug, Deserialize)]
pub struct RecordEarnRequest {
    pub customer_id: CustomerId,
    pub service_id: ServiceId,
    pub spend_amount: Decimal,
    pub occurs_at: Option<DateTime<Utc>>,
    pub reference_no: Option<String>,
    pub note: Option<String>,
}

impl From<RecordEarnRequest> for EarnRequest {
    fn from(request: RecordEarnRequest) -> Self {
        EarnRequest {
            customer_id: request.customer_id,
            service_id: request.service_id,
            spend_amount: request.spend_amount,
            occurs_at: request.occurs_at,
            reference_no: request.reference_no,
            note: request.note,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EarnReceiptResponse {
    pub transaction_id: EarnTransactionId,
    pub entry_id: LedgerEntryId,
    pub customer_id: CustomerId,
    pub service_id: ServiceId,
    pub rule_id: RuleId,
    pub spend_amount: Decimal,
    pub points_earned: Points,
    pub occurs_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<EarnReceipt> for EarnReceiptResponse {
    fn from(receipt: EarnReceipt) -> Self {
        Self {
            transaction_id: receipt.transaction_id,
            entry_id: receipt.entry_id,
            customer_id: receipt.customer_id,
            service_id: receipt.service_id,
            rule_id: receipt.rule_id,
            spend_amount: receipt.spend_amount,
            points_earned: receipt.points_earned,
            occurs_at: receipt.occurs_at,
            expires_at: receipt.expires_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AllocationLineResponse {
    pub earn_entry_id: LedgerEntryId,
    pub points_used: Points,
}

impl From<AllocationLine> for AllocationLineResponse {
    fn from(line: AllocationLine) -> Self {
        Self {
            earn_entry_id: line.earn_entry_id,
            points_used: line.points_used,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RecordRedemptionRequest {
    pub customer_id: CustomerId,
    pub points: Points,
    pub redeemed_at: Option<DateTime<Utc>>,
    pub reward_name: Option<String>,
    pub note: Option<String>,
}

impl From<RecordRedemptionRequest> for RedeemRequest {
    fn from(request: RecordRedemptionRequest) -> Self {
        RedeemRequest {
            customer_id: request.customer_id,
            points: request.points,
            redeemed_at: request.redeemed_at,
            reward_name: request.reward_name,
            note: request.note,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RedemptionReceiptResponse {
    pub redemption_id: RedemptionId,
    pub customer_id: CustomerId,
    pub points_redeemed: Points,
    pub redeemed_at: DateTime<Utc>,
    pub allocations: Vec<AllocationLineResponse>,
}

impl From<RedeemReceipt> for RedemptionReceiptResponse {
    fn from(receipt: RedeemReceipt) -> Self {
        Self {
            redemption_id: receipt.redemption_id,
            customer_id: receipt.customer_id,
            points_redeemed: receipt.points_redeemed,
            redeemed_at: receipt.redeemed_at,
            allocations: receipt.allocations.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RecordAdjustmentRequest {
    pub customer_id: CustomerId,
    /// Positive credits a new lot, negative consumes existing lots
    pub delta: Points,
    pub occurs_at: Option<DateTime<Utc>>,
    pub reason: Option<String>,
}

impl From<RecordAdjustmentRequest> for AdjustRequest {
    fn from(request: RecordAdjustmentRequest) -> Self {
        AdjustRequest {
            customer_id: request.customer_id,
            delta: request.delta,
            occurs_at: request.occurs_at,
            reason: request.reason,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AdjustmentReceiptResponse {
    pub entry_id: LedgerEntryId,
    pub customer_id: CustomerId,
    pub points_delta: Points,
    pub expires_at: Option<DateTime<Utc>>,
    pub allocations: Vec<AllocationLineResponse>,
}

impl From<AdjustReceipt> for AdjustmentReceiptResponse {
    fn from(receipt: AdjustReceipt) -> Self {
        Self {
            entry_id: receipt.entry_id,
            customer_id: receipt.customer_id,
            points_delta: receipt.points_delta,
            expires_at: receipt.expires_at,
            allocations: receipt.allocations.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ReverseEarnRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReversalReceiptResponse {
    pub entry_id: LedgerEntryId,
    pub transaction_id: EarnTransactionId,
    pub points_reversed: Points,
}

impl From<ReversalReceipt> for ReversalReceiptResponse {
    fn from(receipt: ReversalReceipt) -> Self {
        Self {
            entry_id: receipt.entry_id,
            transaction_id: receipt.transaction_id,
            points_reversed: receipt.points_reversed,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct SweepRequest {
    pub as_of: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct SweepResponse {
    pub lots_swept: u64,
    pub points_expired: Points,
}

impl From<SweepOutcome> for SweepResponse {
    fn from(outcome: SweepOutcome) -> Self {
        Self {
            lots_swept: outcome.lots_swept,
            points_expired: outcome.points_expired,
        }
    }
}
