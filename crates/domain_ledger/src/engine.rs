//! Points Engine
//!
//! The engine is the single entry point for loyalty operations. It owns
//! the policy that stores should not: rule resolution against the org's
//! business calendar, point calculation, retention stamping, and retry
//! of commands that lose a concurrency race. Stores stay mechanical;
//! everything a handler needs lives here.
//!
//! # Command Flow
//!
//! ```text
//! EarnRequest -> resolve rule -> calculate points -> EarnRecord -> store
//! RedeemRequest -> RedemptionRecord -> store (plans FIFO draws inside)
//! ```
//!
//! Commands that fail with `StoreError::Conflict` are retried up to
//! `EngineConfig::max_retries` total attempts before surfacing
//! `EngineError::RetryExhausted`.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use core_kernel::{
    CustomerId, EarnTransactionId, LedgerEntryId, OrgTimezone, Points, RedemptionId,
    RequestContext, RuleId, ServiceId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use domain_rules::calculator::points_for_rule;
use domain_rules::error::RuleError;
use domain_rules::resolver::{resolve_rule, Resolution};
use domain_rules::rule::{EarningRule, NewEarningRule, RoundingMode};
use domain_rules::service::{NewService, Service};

use crate::audit::{self, ConsistencyReport};
use crate::customer::{Customer, NewCustomer};
use crate::entry::LedgerEntry;
use crate::error::EngineError;
use crate::lot::{EarnLot, ExpiringLot};
use crate::ports::{
    AdjustmentRecord, EarnRecord, HistoryFilter, LedgerStore, LotQuery, Page, PageRequest,
    RedemptionRecord, StoreError, SweepOutcome,
};

/// Tunable policy for the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Days an earned lot stays spendable
    pub retention_days: u32,
    /// Default horizon for "expiring soon" queries
    pub expiring_horizon_days: u32,
    /// Total attempts per command when the store reports conflicts
    pub max_retries: u32,
    /// Lots expired per sweep pass
    pub sweep_batch_size: u32,
    /// Page size when a history query does not name one
    pub default_page_size: u32,
    /// Upper bound on requested page sizes
    pub max_page_size: u32,
    /// Business calendar used for rule resolution and date filters
    pub timezone: OrgTimezone,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retention_days: 365,
            expiring_horizon_days: 90,
            max_retries: 3,
            sweep_batch_size: 500,
            default_page_size: 20,
            max_page_size: 100,
            timezone: OrgTimezone::default(),
        }
    }
}

/// A spend event to convert into points
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarnRequest {
    pub customer_id: CustomerId,
    pub service_id: ServiceId,
    pub spend_amount: Decimal,
    /// When the spend happened; defaults to now
    pub occurs_at: Option<DateTime<Utc>>,
    pub reference_no: Option<String>,
    pub note: Option<String>,
}

/// A request to spend points
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedeemRequest {
    pub customer_id: CustomerId,
    pub points: Points,
    /// When the redemption happened; defaults to now
    pub redeemed_at: Option<DateTime<Utc>>,
    pub reward_name: Option<String>,
    pub note: Option<String>,
}

/// A manual correction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustRequest {
    pub customer_id: CustomerId,
    /// Positive credits a new lot, negative consumes existing lots
    pub delta: Points,
    pub occurs_at: Option<DateTime<Utc>>,
    pub reason: Option<String>,
}

/// Filters and paging for ledger history
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryQuery {
    pub service_id: Option<ServiceId>,
    /// First local calendar date to include
    pub date_from: Option<NaiveDate>,
    /// Last local calendar date to include
    pub date_to: Option<NaiveDate>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// Outcome of a recorded earn
#[derive(Debug, Clone, Serialize)]
pub struct EarnReceipt {
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

/// Dry-run earn calculation, nothing persisted
#[derive(Debug, Clone, Serialize)]
pub struct EarnPreview {
    pub service_id: ServiceId,
    pub rule_id: RuleId,
    pub on_date: NaiveDate,
    pub spend_amount: Decimal,
    pub points: Points,
    pub rounding: RoundingMode,
    /// True when the spend fell under the rule's minimum
    pub min_spend_applied: bool,
}

/// One lot drawn against by a consumption
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AllocationLine {
    pub earn_entry_id: LedgerEntryId,
    pub points_used: Points,
}

/// Outcome of a redemption
#[derive(Debug, Clone, Serialize)]
pub struct RedeemReceipt {
    pub redemption_id: RedemptionId,
    pub customer_id: CustomerId,
    pub points_redeemed: Points,
    pub redeemed_at: DateTime<Utc>,
    pub allocations: Vec<AllocationLine>,
}

/// Outcome of a manual adjustment
#[derive(Debug, Clone, Serialize)]
pub struct AdjustReceipt {
    pub entry_id: LedgerEntryId,
    pub customer_id: CustomerId,
    pub points_delta: Points,
    pub expires_at: Option<DateTime<Utc>>,
    pub allocations: Vec<AllocationLine>,
}

/// Outcome of reversing an earn
#[derive(Debug, Clone, Serialize)]
pub struct ReversalReceipt {
    pub entry_id: LedgerEntryId,
    pub transaction_id: EarnTransactionId,
    /// Points actually clawed back; zero if the lot was fully spent
    pub points_reversed: Points,
}

/// A customer's balance at an instant
#[derive(Debug, Clone, Serialize)]
pub struct BalanceSummary {
    pub customer_id: CustomerId,
    pub as_of: DateTime<Utc>,
    pub available: Points,
    /// Points dying within the horizon
    pub expiring_soon: Points,
    pub horizon_days: u32,
}

fn lines(allocations: &[crate::redemption::LotAllocation]) -> Vec<AllocationLine> {
    allocations
        .iter()
        .map(|a| AllocationLine {
            earn_entry_id: a.earn_entry_id,
            points_used: a.points_used,
        })
        .collect()
}

/// Loyalty operations over a pluggable store
pub struct PointsEngine {
    store: Arc<dyn LedgerStore>,
    config: EngineConfig,
}

impl PointsEngine {
    pub fn new(store: Arc<dyn LedgerStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs a store command, retrying while it reports conflicts
    async fn with_retry<T, F, Fut>(
        &self,
        operation: &'static str,
        mut call: F,
    ) -> Result<T, EngineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut attempt: u32 = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.config.max_retries => {
                    warn!(operation, attempt, error = %err, "Retrying after conflict");
                    attempt += 1;
                }
                Err(err) if err.is_retryable() => {
                    warn!(operation, attempts = attempt, "Conflict retries exhausted");
                    return Err(EngineError::RetryExhausted { attempts: attempt });
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn effective_page(&self, page: Option<u32>, page_size: Option<u32>) -> PageRequest {
        let size = page_size
            .map(|s| s.clamp(1, self.config.max_page_size))
            .unwrap_or(self.config.default_page_size);
        PageRequest::new(page.unwrap_or(1).max(1), size)
    }

    // ========================================================================
    // Reference Data
    // ========================================================================

    pub async fn register_customer(
        &self,
        ctx: &RequestContext,
        new: NewCustomer,
    ) -> Result<Customer, EngineError> {
        let customer = Customer::create(ctx.org_id, new)?;
        let customer = self
            .with_retry("register_customer", || {
                self.store.register_customer(ctx, customer.clone())
            })
            .await?;
        info!(customer_id = %customer.id, code = %customer.code, "Registered customer");
        Ok(customer)
    }

    pub async fn customer(
        &self,
        ctx: &RequestContext,
        id: CustomerId,
    ) -> Result<Customer, EngineError> {
        Ok(self.store.customer(ctx, id).await?)
    }

    pub async fn register_service(
        &self,
        ctx: &RequestContext,
        new: NewService,
    ) -> Result<Service, EngineError> {
        let service = Service::create(ctx.org_id, new)?;
        let service = self
            .with_retry("register_service", || {
                self.store.register_service(ctx, service.clone())
            })
            .await?;
        info!(service_id = %service.id, name = %service.name, "Registered service");
        Ok(service)
    }

    pub async fn service(
        &self,
        ctx: &RequestContext,
        id: ServiceId,
    ) -> Result<Service, EngineError> {
        Ok(self.store.service(ctx, id).await?)
    }

    /// Creates an earning rule after validating its validity window
    ///
    /// # Errors
    ///
    /// `EngineError::RuleOverlap` when the window collides with an
    /// existing rule for the same service.
    pub async fn create_rule(
        &self,
        ctx: &RequestContext,
        new: NewEarningRule,
    ) -> Result<EarningRule, EngineError> {
        let rule = EarningRule::create(ctx.org_id, new)?;
        let rule = self
            .with_retry("create_rule", || self.store.create_rule(ctx, rule.clone()))
            .await?;
        info!(rule_id = %rule.id, service_id = %rule.service_id, "Created earning rule");
        Ok(rule)
    }

    pub async fn rules_for_service(
        &self,
        ctx: &RequestContext,
        service_id: ServiceId,
    ) -> Result<Vec<EarningRule>, EngineError> {
        Ok(self.store.rules_for_service(ctx, service_id).await?)
    }

    /// Resolves which rule governs a service on a local calendar date
    ///
    /// Defaults to today in the org's timezone.
    pub async fn resolve_active_rule(
        &self,
        ctx: &RequestContext,
        service_id: ServiceId,
        on: Option<NaiveDate>,
    ) -> Result<Resolution, EngineError> {
        let on = on.unwrap_or_else(|| self.config.timezone.local_date(Utc::now()));
        let service = self.store.service(ctx, service_id).await?;
        if !service.is_active {
            return Err(RuleError::NoApplicableRule { service_id, on }.into());
        }
        let rules = self.store.rules_for_service(ctx, service_id).await?;
        Ok(resolve_rule(service_id, &rules, on)?)
    }

    // ========================================================================
    // Ledger Commands
    // ========================================================================

    /// Converts a spend into points and appends the earn to the ledger
    ///
    /// The rule is resolved on the spend's local calendar date. A spend
    /// below the rule's minimum still records a transaction, with zero
    /// points. The lot expires `retention_days` after the spend.
    ///
    /// # Errors
    ///
    /// `EngineError::Rule(NoApplicableRule)` when the service is
    /// inactive or no rule covers the date.
    pub async fn earn(
        &self,
        ctx: &RequestContext,
        request: EarnRequest,
    ) -> Result<EarnReceipt, EngineError> {
        if request.spend_amount <= Decimal::ZERO {
            return Err(EngineError::InvalidRequest(
                "spend amount must be positive".to_string(),
            ));
        }

        let occurs_at = request.occurs_at.unwrap_or_else(Utc::now);
        let on = self.config.timezone.local_date(occurs_at);

        let service = self.store.service(ctx, request.service_id).await?;
        if !service.is_active {
            return Err(RuleError::NoApplicableRule {
                service_id: request.service_id,
                on,
            }
            .into());
        }

        let rules = self.store.rules_for_service(ctx, request.service_id).await?;
        let resolution = resolve_rule(request.service_id, &rules, on)?;
        let points = points_for_rule(&resolution.rule, request.spend_amount)?;
        let expires_at = occurs_at + Duration::days(i64::from(self.config.retention_days));

        let record = EarnRecord {
            customer_id: request.customer_id,
            service_id: request.service_id,
            rule_id: resolution.rule.id,
            spend_amount: request.spend_amount,
            points,
            occurs_at,
            expires_at,
            reference_no: request.reference_no,
            note: request.note,
        };
        let (transaction, entry) = self
            .with_retry("append_earn", || {
                self.store.append_earn(ctx, record.clone())
            })
            .await?;

        info!(
            customer_id = %transaction.customer_id,
            service_id = %transaction.service_id,
            points = %transaction.points_earned,
            "Recorded earn transaction"
        );

        Ok(EarnReceipt {
            transaction_id: transaction.id,
            entry_id: entry.id,
            customer_id: transaction.customer_id,
            service_id: transaction.service_id,
            rule_id: transaction.rule_id,
            spend_amount: transaction.spend_amount,
            points_earned: transaction.points_earned,
            occurs_at: transaction.occurs_at,
            expires_at: transaction.expires_at,
        })
    }

    /// Calculates what a spend would earn without persisting anything
    pub async fn preview_earn(
        &self,
        ctx: &RequestContext,
        service_id: ServiceId,
        spend_amount: Decimal,
        on: Option<NaiveDate>,
    ) -> Result<EarnPreview, EngineError> {
        if spend_amount <= Decimal::ZERO {
            return Err(EngineError::InvalidRequest(
                "spend amount must be positive".to_string(),
            ));
        }

        let on = on.unwrap_or_else(|| self.config.timezone.local_date(Utc::now()));
        let resolution = self.resolve_active_rule(ctx, service_id, Some(on)).await?;
        let min_spend_applied = !resolution.rule.meets_min_spend(spend_amount);
        let points = points_for_rule(&resolution.rule, spend_amount)?;

        Ok(EarnPreview {
            service_id,
            rule_id: resolution.rule.id,
            on_date: on,
            spend_amount,
            points,
            rounding: resolution.rule.rounding,
            min_spend_applied,
        })
    }

    /// Spends points against the customer's live lots, FIFO by expiry
    ///
    /// # Errors
    ///
    /// `EngineError::Insufficient` when live lots cannot cover the
    /// request; the ledger is untouched in that case.
    pub async fn redeem(
        &self,
        ctx: &RequestContext,
        request: RedeemRequest,
    ) -> Result<RedeemReceipt, EngineError> {
        if !request.points.is_positive() {
            return Err(EngineError::InvalidRequest(
                "redemption points must be positive".to_string(),
            ));
        }

        let record = RedemptionRecord {
            customer_id: request.customer_id,
            points: request.points,
            redeemed_at: request.redeemed_at.unwrap_or_else(Utc::now),
            reward_name: request.reward_name,
            note: request.note,
        };
        let (redemption, allocations) = self
            .with_retry("allocate_redemption", || {
                self.store.allocate_redemption(ctx, record.clone())
            })
            .await?;

        info!(
            customer_id = %redemption.customer_id,
            points = %redemption.points_redeemed,
            lots = allocations.len(),
            "Redeemed points"
        );

        Ok(RedeemReceipt {
            redemption_id: redemption.id,
            customer_id: redemption.customer_id,
            points_redeemed: redemption.points_redeemed,
            redeemed_at: redemption.redeemed_at,
            allocations: lines(&allocations),
        })
    }

    /// Appends a manual correction to the ledger
    ///
    /// Credits open a lot expiring `retention_days` out; debits consume
    /// live lots exactly like a redemption.
    pub async fn adjust(
        &self,
        ctx: &RequestContext,
        request: AdjustRequest,
    ) -> Result<AdjustReceipt, EngineError> {
        if request.delta.is_zero() {
            return Err(EngineError::InvalidRequest(
                "adjustment delta must not be zero".to_string(),
            ));
        }

        let occurs_at = request.occurs_at.unwrap_or_else(Utc::now);
        let expires_at = request
            .delta
            .is_positive()
            .then(|| occurs_at + Duration::days(i64::from(self.config.retention_days)));

        let record = AdjustmentRecord {
            customer_id: request.customer_id,
            delta: request.delta,
            occurs_at,
            expires_at,
            reason: request.reason,
        };
        let (entry, allocations) = self
            .with_retry("append_adjustment", || {
                self.store.append_adjustment(ctx, record.clone())
            })
            .await?;

        info!(
            customer_id = %entry.customer_id,
            delta = %entry.points_delta,
            "Recorded manual adjustment"
        );

        Ok(AdjustReceipt {
            entry_id: entry.id,
            customer_id: entry.customer_id,
            points_delta: entry.points_delta,
            expires_at: entry.expires_at,
            allocations: lines(&allocations),
        })
    }

    /// Claws back whatever remains of an earn transaction
    ///
    /// Already-spent points stay spent; the reversal entry covers only
    /// the lot's remainder, which may be zero.
    pub async fn reverse_earn(
        &self,
        ctx: &RequestContext,
        transaction_id: EarnTransactionId,
        reason: Option<String>,
    ) -> Result<ReversalReceipt, EngineError> {
        let (entry, _) = self
            .with_retry("reverse_earn", || {
                self.store.reverse_earn(ctx, transaction_id, reason.clone())
            })
            .await?;

        let points_reversed = entry.points_delta.abs();
        info!(
            transaction_id = %transaction_id,
            points = %points_reversed,
            "Reversed earn transaction"
        );

        Ok(ReversalReceipt {
            entry_id: entry.id,
            transaction_id,
            points_reversed,
        })
    }

    /// Expires every dead lot with points remaining, in batches
    ///
    /// Idempotent: lots already swept have nothing remaining and are
    /// skipped on the next pass.
    pub async fn sweep_expired(
        &self,
        ctx: &RequestContext,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<SweepOutcome, EngineError> {
        let as_of = as_of.unwrap_or_else(Utc::now);
        let batch = self.config.sweep_batch_size.max(1);

        let mut total = SweepOutcome::default();
        loop {
            let pass = self
                .with_retry("sweep_expired", || {
                    self.store.sweep_expired(ctx, as_of, batch)
                })
                .await?;
            total.lots_swept += pass.lots_swept;
            total.points_expired = total.points_expired + pass.points_expired;
            if pass.lots_swept < u64::from(batch) {
                break;
            }
        }

        info!(
            lots = total.lots_swept,
            points = %total.points_expired,
            "Expiration sweep complete"
        );
        Ok(total)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Points the customer can spend at an instant
    pub async fn available_balance(
        &self,
        ctx: &RequestContext,
        customer_id: CustomerId,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<Points, EngineError> {
        let as_of = as_of.unwrap_or_else(Utc::now);
        let lots = self
            .store
            .earn_lots(ctx, customer_id, LotQuery::available_at(as_of))
            .await?;
        Ok(Points::total(lots.iter().map(EarnLot::remaining))?)
    }

    /// Portion of the available balance that dies within the horizon
    pub async fn expiring_balance(
        &self,
        ctx: &RequestContext,
        customer_id: CustomerId,
        as_of: Option<DateTime<Utc>>,
        horizon_days: Option<u32>,
    ) -> Result<Points, EngineError> {
        let as_of = as_of.unwrap_or_else(Utc::now);
        let horizon = Duration::days(i64::from(
            horizon_days.unwrap_or(self.config.expiring_horizon_days),
        ));
        let lots = self
            .store
            .earn_lots(ctx, customer_id, LotQuery::expiring_within(as_of, horizon))
            .await?;
        Ok(Points::total(lots.iter().map(EarnLot::remaining))?)
    }

    /// Live lots dying within the horizon, soonest first
    pub async fn expiring_lots(
        &self,
        ctx: &RequestContext,
        customer_id: CustomerId,
        as_of: Option<DateTime<Utc>>,
        horizon_days: Option<u32>,
    ) -> Result<Vec<ExpiringLot>, EngineError> {
        let as_of = as_of.unwrap_or_else(Utc::now);
        let horizon = Duration::days(i64::from(
            horizon_days.unwrap_or(self.config.expiring_horizon_days),
        ));
        let lots = self
            .store
            .earn_lots(ctx, customer_id, LotQuery::expiring_within(as_of, horizon))
            .await?;
        Ok(lots.iter().map(ExpiringLot::from).collect())
    }

    /// Available balance plus how much of it dies within the horizon
    pub async fn balance_summary(
        &self,
        ctx: &RequestContext,
        customer_id: CustomerId,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<BalanceSummary, EngineError> {
        let as_of = as_of.unwrap_or_else(Utc::now);
        let horizon = Duration::days(i64::from(self.config.expiring_horizon_days));
        let lots = self
            .store
            .earn_lots(ctx, customer_id, LotQuery::available_at(as_of))
            .await?;

        let available = Points::total(lots.iter().map(EarnLot::remaining))?;
        let expiring_soon = Points::total(
            lots.iter()
                .filter(|lot| lot.expires_within(as_of, horizon))
                .map(EarnLot::remaining),
        )?;

        Ok(BalanceSummary {
            customer_id,
            as_of,
            available,
            expiring_soon,
            horizon_days: self.config.expiring_horizon_days,
        })
    }

    /// One page of the customer's ledger history, newest first
    ///
    /// Date filters are local calendar dates in the org's timezone;
    /// `date_to` is inclusive.
    pub async fn ledger_history(
        &self,
        ctx: &RequestContext,
        customer_id: CustomerId,
        query: HistoryQuery,
    ) -> Result<Page<LedgerEntry>, EngineError> {
        let filter = HistoryFilter {
            service_id: query.service_id,
            occurred_since: query
                .date_from
                .map(|d| self.config.timezone.start_of_day(d)),
            occurred_before: query
                .date_to
                .map(|d| self.config.timezone.start_of_next_day(d)),
        };
        let page = self.effective_page(query.page, query.page_size);
        Ok(self
            .store
            .ledger_entries(ctx, customer_id, filter, page)
            .await?)
    }

    /// Net sum of every entry delta for the customer
    pub async fn ledger_sum(
        &self,
        ctx: &RequestContext,
        customer_id: CustomerId,
    ) -> Result<Points, EngineError> {
        Ok(self.store.ledger_sum(ctx, customer_id).await?)
    }

    /// Checks the customer's ledger against the accounting invariants
    pub async fn verify_consistency(
        &self,
        ctx: &RequestContext,
        customer_id: CustomerId,
    ) -> Result<ConsistencyReport, EngineError> {
        let (entries, allocations) = self.store.ledger_snapshot(ctx, customer_id).await?;
        let report = audit::verify(&entries, &allocations);
        if !report.is_clean() {
            error!(
                customer_id = %customer_id,
                violations = report.violations.len(),
                "Ledger consistency check failed"
            );
        }
        Ok(report)
    }

    /// Store reachability, for readiness probes
    pub async fn ping_store(&self) -> Result<(), EngineError> {
        Ok(self.store.ping().await?)
    }
}
