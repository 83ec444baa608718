//! Ledger Store Port
//!
//! This module defines the storage interface for the ledger domain,
//! enabling swappable implementations (Postgres, in-memory, mock).
//!
//! # Architecture
//!
//! The `LedgerStore` trait defines every persistence operation the
//! engine needs. Two adapters implement it:
//!
//! - **Postgres Store** (infra_db): row locks and serializable conflicts
//! - **Memory Store** (this crate): one mutex, for tests and demos
//!
//! Mutating operations are transactional in the store: either every row
//! of a command lands or none does. The engine retries commands that
//! fail with `StoreError::Conflict`.
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_ledger::ports::LedgerStore;
//! use std::sync::Arc;
//!
//! pub struct PointsEngine {
//!     store: Arc<dyn LedgerStore>,
//! }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use core_kernel::{CustomerId, EarnTransactionId, Points, RequestContext, RuleId, ServiceId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use domain_rules::rule::EarningRule;
use domain_rules::service::Service;

use crate::allocation::InsufficientPoints;
use crate::customer::Customer;
use crate::entry::LedgerEntry;
use crate::lot::EarnLot;
use crate::redemption::{LotAllocation, Redemption};
use crate::transaction::EarnTransaction;

/// Errors returned by ledger stores
#[derive(Debug, Error)]
pub enum StoreError {
    /// Referenced record does not exist in this org
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A uniqueness constraint was hit
    #[error("Duplicate {entity}: {detail}")]
    Duplicate { entity: &'static str, detail: String },

    /// The lots could not cover a consumption
    #[error(transparent)]
    Insufficient(#[from] InsufficientPoints),

    /// A rule's validity window collides with an existing rule
    #[error("Rule validity overlaps an existing rule for the service")]
    RuleOverlap { existing: Option<RuleId> },

    /// A foreign key or check constraint rejected the write
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// Concurrent transactions collided; the command can be retried
    #[error("Concurrent update conflict: {0}")]
    Conflict(String),

    /// The store is unreachable
    #[error("Storage connection error: {0}")]
    Connection(String),

    /// Anything else
    #[error("Internal storage error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn duplicate(entity: &'static str, detail: impl Into<String>) -> Self {
        StoreError::Duplicate {
            entity,
            detail: detail.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        StoreError::Internal(message.into())
    }

    /// Returns true if retrying the same command may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Fully-priced earn, ready to persist
///
/// The engine resolves the rule and computes the points before handing
/// the record to the store; the store writes the transaction and its
/// ledger entry atomically.
#[derive(Debug, Clone)]
pub struct EarnRecord {
    pub customer_id: CustomerId,
    pub service_id: ServiceId,
    pub rule_id: RuleId,
    pub spend_amount: Decimal,
    pub points: Points,
    pub occurs_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub reference_no: Option<String>,
    pub note: Option<String>,
}

/// A redemption to allocate and persist
#[derive(Debug, Clone)]
pub struct RedemptionRecord {
    pub customer_id: CustomerId,
    pub points: Points,
    pub redeemed_at: DateTime<Utc>,
    pub reward_name: Option<String>,
    pub note: Option<String>,
}

/// A manual correction to persist
///
/// Credits (`delta > 0`) open a lot and must carry `expires_at`.
/// Debits (`delta < 0`) consume lots like a redemption does.
#[derive(Debug, Clone)]
pub struct AdjustmentRecord {
    pub customer_id: CustomerId,
    pub delta: Points,
    pub occurs_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub reason: Option<String>,
}

/// Which lots a query should return
#[derive(Debug, Clone, Copy)]
pub enum LotScope {
    /// Unexpired lots with points remaining
    Available,
    /// Unexpired lots with points remaining that die within the horizon
    ExpiringWithin(Duration),
    /// Every lot, including expired and drained ones
    All,
}

/// Query parameters for fetching a customer's lots
#[derive(Debug, Clone, Copy)]
pub struct LotQuery {
    /// Instant at which expiry is judged
    pub as_of: DateTime<Utc>,
    pub scope: LotScope,
}

impl LotQuery {
    /// Lots spendable at the given instant
    pub fn available_at(as_of: DateTime<Utc>) -> Self {
        Self {
            as_of,
            scope: LotScope::Available,
        }
    }

    /// Spendable lots that die within `horizon` of the given instant
    pub fn expiring_within(as_of: DateTime<Utc>, horizon: Duration) -> Self {
        Self {
            as_of,
            scope: LotScope::ExpiringWithin(horizon),
        }
    }

    /// Every lot the customer ever earned
    pub fn all(as_of: DateTime<Utc>) -> Self {
        Self {
            as_of,
            scope: LotScope::All,
        }
    }
}

/// Filter for ledger history queries
#[derive(Debug, Clone, Copy, Default)]
pub struct HistoryFilter {
    /// Only entries for this service
    pub service_id: Option<ServiceId>,
    /// Only entries occurring at or after this instant
    pub occurred_since: Option<DateTime<Utc>>,
    /// Only entries occurring strictly before this instant
    pub occurred_before: Option<DateTime<Utc>>,
}

/// One page of results, 1-based
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 20,
        }
    }
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }

    /// Row offset of this page
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }
}

/// A page of items plus the total count across all pages
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u64 {
        if self.page_size == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(self.page_size))
    }
}

/// Result of one expiration sweep pass
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SweepOutcome {
    /// Lots that received an expiration entry
    pub lots_swept: u64,
    /// Total points written off
    pub points_expired: Points,
}

/// The storage port for the ledger domain
///
/// Every method is scoped by the org in `ctx`; no implementation may
/// return or modify another org's rows. Mutating methods are atomic and
/// stamp `ctx.actor_id` on the rows they create.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    // ========================================================================
    // Reference Data
    // ========================================================================

    /// Persists a new customer
    ///
    /// # Errors
    ///
    /// `StoreError::Duplicate` if the customer code is taken within the
    /// org.
    async fn register_customer(
        &self,
        ctx: &RequestContext,
        customer: Customer,
    ) -> Result<Customer, StoreError>;

    /// Fetches a customer by id
    async fn customer(
        &self,
        ctx: &RequestContext,
        id: CustomerId,
    ) -> Result<Customer, StoreError>;

    /// Persists a new service
    async fn register_service(
        &self,
        ctx: &RequestContext,
        service: Service,
    ) -> Result<Service, StoreError>;

    /// Fetches a service by id
    async fn service(&self, ctx: &RequestContext, id: ServiceId) -> Result<Service, StoreError>;

    /// Persists a new earning rule after checking for validity overlap
    ///
    /// # Errors
    ///
    /// `StoreError::RuleOverlap` if the rule's window collides with an
    /// existing rule for the same service.
    async fn create_rule(
        &self,
        ctx: &RequestContext,
        rule: EarningRule,
    ) -> Result<EarningRule, StoreError>;

    /// Every rule attached to a service
    async fn rules_for_service(
        &self,
        ctx: &RequestContext,
        service_id: ServiceId,
    ) -> Result<Vec<EarningRule>, StoreError>;

    // ========================================================================
    // Ledger Commands (each atomic)
    // ========================================================================

    /// Writes an earn transaction and its EARN ledger entry
    async fn append_earn(
        &self,
        ctx: &RequestContext,
        record: EarnRecord,
    ) -> Result<(EarnTransaction, LedgerEntry), StoreError>;

    /// Plans FIFO draws against the customer's live lots and writes the
    /// redemption, its REDEEM entry, and the allocation rows
    ///
    /// The candidate lots are read under locks appropriate to the
    /// implementation, so two concurrent redemptions cannot both spend
    /// the same points.
    ///
    /// # Errors
    ///
    /// `StoreError::Insufficient` when the lots cannot cover the
    /// request; nothing is written in that case.
    async fn allocate_redemption(
        &self,
        ctx: &RequestContext,
        record: RedemptionRecord,
    ) -> Result<(Redemption, Vec<LotAllocation>), StoreError>;

    /// Writes an ADJUST entry; debits also write covering allocations
    async fn append_adjustment(
        &self,
        ctx: &RequestContext,
        record: AdjustmentRecord,
    ) -> Result<(LedgerEntry, Vec<LotAllocation>), StoreError>;

    /// Writes a REVERSAL entry zeroing whatever remains of an earn
    ///
    /// Already-consumed points stay consumed; the reversal covers only
    /// the lot's current remainder, which may be zero.
    async fn reverse_earn(
        &self,
        ctx: &RequestContext,
        transaction_id: EarnTransactionId,
        reason: Option<String>,
    ) -> Result<(LedgerEntry, Vec<LotAllocation>), StoreError>;

    /// Expires one batch of dead lots with remaining points
    ///
    /// Writes an EXPIRE entry and covering allocation per lot. Returns
    /// how many lots were swept; callers loop until a pass sweeps fewer
    /// than `batch_size`.
    async fn sweep_expired(
        &self,
        ctx: &RequestContext,
        as_of: DateTime<Utc>,
        batch_size: u32,
    ) -> Result<SweepOutcome, StoreError>;

    // ========================================================================
    // Ledger Queries
    // ========================================================================

    /// The customer's lots under the given scope
    async fn earn_lots(
        &self,
        ctx: &RequestContext,
        customer_id: CustomerId,
        query: LotQuery,
    ) -> Result<Vec<EarnLot>, StoreError>;

    /// One page of the customer's entries, newest first
    async fn ledger_entries(
        &self,
        ctx: &RequestContext,
        customer_id: CustomerId,
        filter: HistoryFilter,
        page: PageRequest,
    ) -> Result<Page<LedgerEntry>, StoreError>;

    /// Sum of every entry delta for the customer
    async fn ledger_sum(
        &self,
        ctx: &RequestContext,
        customer_id: CustomerId,
    ) -> Result<Points, StoreError>;

    /// Every entry and allocation for the customer, for consistency
    /// verification
    async fn ledger_snapshot(
        &self,
        ctx: &RequestContext,
        customer_id: CustomerId,
    ) -> Result<(Vec<LedgerEntry>, Vec<LotAllocation>), StoreError>;

    // ========================================================================
    // Liveness
    // ========================================================================

    /// Cheap reachability check for readiness probes
    async fn ping(&self) -> Result<(), StoreError>;
}
