//! PostgreSQL ledger store
//!
//! This module implements the `LedgerStore` port on PostgreSQL. Each
//! command runs inside one transaction. Consuming commands lock the
//! candidate lot rows with `SELECT ... FOR UPDATE` before planning
//! draws, so two concurrent consumptions cannot spend the same points;
//! the expiration sweep locks with `SKIP LOCKED` so parallel sweepers
//! share the backlog instead of blocking each other.
//!
//! Allocation sums are always read after the lot locks are held. A
//! competing consumer commits its allocation rows before releasing its
//! locks, so the sums this store plans against are never stale.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::{debug, instrument};
use uuid::Uuid;

use core_kernel::{
    AllocationId, CustomerId, EarnTransactionId, LedgerEntryId, OrgId, Points, RedemptionId,
    RequestContext, ServiceId, ValidityWindow,
};
use domain_ledger::allocation::{plan, LotDraw};
use domain_ledger::customer::Customer;
use domain_ledger::entry::{EntrySource, LedgerEntry};
use domain_ledger::lot::EarnLot;
use domain_ledger::ports::{
    AdjustmentRecord, EarnRecord, HistoryFilter, LedgerStore, LotQuery, LotScope, Page,
    PageRequest, RedemptionRecord, StoreError, SweepOutcome,
};
use domain_ledger::redemption::{LotAllocation, Redemption};
use domain_ledger::transaction::EarnTransaction;
use domain_rules::error::RuleError;
use domain_rules::resolver::validate_no_overlap;
use domain_rules::rule::{EarningRule, RoundingMode};
use domain_rules::service::{Service, ServiceCategory};

use crate::error::DatabaseError;

/// PostgreSQL-backed implementation of the `LedgerStore` trait
///
/// The store owns no state beyond the connection pool; every operation
/// is scoped by the org in the request context it receives.
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    /// Creates a new store over the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns the underlying pool, for maintenance queries and tests
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    async fn require_customer(
        tx: &mut Transaction<'_, Postgres>,
        org_id: OrgId,
        id: CustomerId,
    ) -> Result<(), StoreError> {
        let found: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM customers WHERE org_id = $1 AND id = $2)",
        )
        .bind(Uuid::from(org_id))
        .bind(Uuid::from(id))
        .fetch_one(&mut **tx)
        .await
        .map_err(db_error)?;

        if found {
            Ok(())
        } else {
            Err(StoreError::not_found("customer", id))
        }
    }

    async fn require_service(
        tx: &mut Transaction<'_, Postgres>,
        org_id: OrgId,
        id: ServiceId,
    ) -> Result<(), StoreError> {
        let found: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM services WHERE org_id = $1 AND id = $2)",
        )
        .bind(Uuid::from(org_id))
        .bind(Uuid::from(id))
        .fetch_one(&mut **tx)
        .await
        .map_err(db_error)?;

        if found {
            Ok(())
        } else {
            Err(StoreError::not_found("service", id))
        }
    }

    /// Sums existing draws per lot for the given lot entry ids
    async fn allocated_by_lot(
        conn: &mut PgConnection,
        lot_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, i64>, StoreError> {
        if lot_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<(Uuid, i64)> = sqlx::query_as(
            "SELECT earn_entry_id, SUM(points_used)::BIGINT \
             FROM lot_allocations \
             WHERE earn_entry_id = ANY($1) \
             GROUP BY earn_entry_id",
        )
        .bind(lot_ids)
        .fetch_all(conn)
        .await
        .map_err(db_error)?;

        Ok(rows.into_iter().collect())
    }

    /// Locks the customer's live lots and returns them in FIFO order
    ///
    /// Live means unexpired at `as_of` with points remaining. The lock
    /// is taken before the allocation sums are read, so the remainders
    /// reflect every committed draw.
    async fn lock_live_lots(
        tx: &mut Transaction<'_, Postgres>,
        org_id: OrgId,
        customer_id: CustomerId,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<EarnLot>, StoreError> {
        let rows: Vec<LockedLotRow> = sqlx::query_as(
            "SELECT id, service_id, points_delta, occurs_at, expires_at \
             FROM point_ledger \
             WHERE org_id = $1 AND customer_id = $2 \
               AND points_delta >= 0 AND expires_at IS NOT NULL \
               AND expires_at > $3 \
             ORDER BY expires_at, occurs_at, id \
             FOR UPDATE",
        )
        .bind(Uuid::from(org_id))
        .bind(Uuid::from(customer_id))
        .bind(as_of)
        .fetch_all(&mut **tx)
        .await
        .map_err(db_error)?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let allocated = Self::allocated_by_lot(&mut **tx, &ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| EarnLot {
                entry_id: row.id.into(),
                customer_id,
                service_id: row.service_id.map(Into::into),
                points: Points::new(row.points_delta),
                allocated: Points::new(allocated.get(&row.id).copied().unwrap_or(0)),
                occurs_at: row.occurs_at,
                expires_at: row.expires_at,
            })
            .filter(|lot| lot.remaining().is_positive())
            .collect())
    }

    async fn insert_entry(
        tx: &mut Transaction<'_, Postgres>,
        entry: &LedgerEntry,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO point_ledger \
                 (id, org_id, customer_id, service_id, source, source_id, \
                  points_delta, occurs_at, expires_at, metadata, created_by, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(Uuid::from(entry.id))
        .bind(Uuid::from(entry.org_id))
        .bind(Uuid::from(entry.customer_id))
        .bind(entry.service_id.map(Uuid::from))
        .bind(entry.source.as_str())
        .bind(entry.source_id)
        .bind(entry.points_delta.value())
        .bind(entry.occurs_at)
        .bind(entry.expires_at)
        .bind(&entry.metadata)
        .bind(Uuid::from(entry.created_by))
        .bind(entry.created_at)
        .execute(&mut **tx)
        .await
        .map_err(db_error)?;

        Ok(())
    }

    /// Writes one allocation row per draw against the consuming entry
    async fn insert_allocations(
        tx: &mut Transaction<'_, Postgres>,
        entry_id: LedgerEntryId,
        draws: &[LotDraw],
        redemption_id: Option<RedemptionId>,
        now: DateTime<Utc>,
    ) -> Result<Vec<LotAllocation>, StoreError> {
        let mut rows = Vec::with_capacity(draws.len());
        for draw in draws {
            let allocation = LotAllocation {
                id: AllocationId::new_v7(),
                entry_id,
                earn_entry_id: draw.earn_entry_id,
                points_used: draw.points_used,
                redemption_id,
                created_at: now,
            };

            sqlx::query(
                "INSERT INTO lot_allocations \
                     (id, entry_id, earn_entry_id, points_used, redemption_id, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(Uuid::from(allocation.id))
            .bind(Uuid::from(allocation.entry_id))
            .bind(Uuid::from(allocation.earn_entry_id))
            .bind(allocation.points_used.value())
            .bind(allocation.redemption_id.map(Uuid::from))
            .bind(allocation.created_at)
            .execute(&mut **tx)
            .await
            .map_err(db_error)?;

            rows.push(allocation);
        }
        Ok(rows)
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    // ========================================================================
    // Reference Data
    // ========================================================================

    #[instrument(skip(self, ctx, customer), fields(org = %ctx.org_id, customer = %customer.id))]
    async fn register_customer(
        &self,
        ctx: &RequestContext,
        customer: Customer,
    ) -> Result<Customer, StoreError> {
        debug!("Inserting customer");

        sqlx::query(
            "INSERT INTO customers \
                 (id, org_id, code, full_name, phone, email, birth_date, notes, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(Uuid::from(customer.id))
        .bind(Uuid::from(ctx.org_id))
        .bind(&customer.code)
        .bind(&customer.full_name)
        .bind(&customer.phone)
        .bind(&customer.email)
        .bind(customer.birth_date)
        .bind(&customer.notes)
        .bind(customer.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DatabaseError::from(&e) {
            DatabaseError::DuplicateEntry(_) => {
                StoreError::duplicate("customer", customer.code.clone())
            }
            other => store_error(other),
        })?;

        Ok(customer)
    }

    #[instrument(skip(self, ctx), fields(org = %ctx.org_id, customer = %id))]
    async fn customer(
        &self,
        ctx: &RequestContext,
        id: CustomerId,
    ) -> Result<Customer, StoreError> {
        let row: Option<CustomerRow> = sqlx::query_as(
            "SELECT id, org_id, code, full_name, phone, email, birth_date, notes, created_at \
             FROM customers \
             WHERE org_id = $1 AND id = $2",
        )
        .bind(Uuid::from(ctx.org_id))
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.map(Customer::from)
            .ok_or_else(|| StoreError::not_found("customer", id))
    }

    #[instrument(skip(self, ctx, service), fields(org = %ctx.org_id, service = %service.id))]
    async fn register_service(
        &self,
        ctx: &RequestContext,
        service: Service,
    ) -> Result<Service, StoreError> {
        debug_assert_eq!(service.org_id, ctx.org_id);
        debug!("Inserting service");

        sqlx::query(
            "INSERT INTO services (id, org_id, name, category, is_active, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(Uuid::from(service.id))
        .bind(Uuid::from(ctx.org_id))
        .bind(&service.name)
        .bind(service.category.as_str())
        .bind(service.is_active)
        .bind(service.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(service)
    }

    #[instrument(skip(self, ctx), fields(org = %ctx.org_id, service = %id))]
    async fn service(&self, ctx: &RequestContext, id: ServiceId) -> Result<Service, StoreError> {
        let row: Option<ServiceRow> = sqlx::query_as(
            "SELECT id, org_id, name, category, is_active, created_at \
             FROM services \
             WHERE org_id = $1 AND id = $2",
        )
        .bind(Uuid::from(ctx.org_id))
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.ok_or_else(|| StoreError::not_found("service", id))?
            .try_into()
            .map_err(store_error)
    }

    #[instrument(skip(self, ctx, rule), fields(org = %ctx.org_id, service = %rule.service_id))]
    async fn create_rule(
        &self,
        ctx: &RequestContext,
        rule: EarningRule,
    ) -> Result<EarningRule, StoreError> {
        debug!("Inserting earning rule");

        let mut tx = self.pool.begin().await.map_err(db_error)?;
        Self::require_service(&mut tx, ctx.org_id, rule.service_id).await?;

        // Overlap pre-check names the colliding rule; the exclusion
        // constraint below stays authoritative under concurrency.
        let existing = fetch_rules(&mut *tx, ctx.org_id, rule.service_id).await?;
        validate_no_overlap(&existing, &rule).map_err(|err| match err {
            RuleError::OverlappingValidity { existing } => StoreError::RuleOverlap {
                existing: Some(existing),
            },
            other => StoreError::internal(other.to_string()),
        })?;

        sqlx::query(
            "INSERT INTO earning_rules \
                 (id, org_id, service_id, spend_amount, earn_points, rounding, \
                  min_spend, valid_from, valid_to, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(Uuid::from(rule.id))
        .bind(Uuid::from(ctx.org_id))
        .bind(Uuid::from(rule.service_id))
        .bind(rule.spend_amount)
        .bind(rule.earn_points.value())
        .bind(rule.rounding.as_str())
        .bind(rule.min_spend)
        .bind(rule.validity.from)
        .bind(rule.validity.to)
        .bind(rule.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match DatabaseError::from(&e) {
            DatabaseError::WindowOverlap(_) => StoreError::RuleOverlap { existing: None },
            other => store_error(other),
        })?;

        tx.commit().await.map_err(db_error)?;
        Ok(rule)
    }

    #[instrument(skip(self, ctx), fields(org = %ctx.org_id, service = %service_id))]
    async fn rules_for_service(
        &self,
        ctx: &RequestContext,
        service_id: ServiceId,
    ) -> Result<Vec<EarningRule>, StoreError> {
        let found: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM services WHERE org_id = $1 AND id = $2)",
        )
        .bind(Uuid::from(ctx.org_id))
        .bind(Uuid::from(service_id))
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;
        if !found {
            return Err(StoreError::not_found("service", service_id));
        }

        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        fetch_rules(&mut conn, ctx.org_id, service_id).await
    }

    // ========================================================================
    // Ledger Commands
    // ========================================================================

    #[instrument(
        skip(self, ctx, record),
        fields(org = %ctx.org_id, customer = %record.customer_id, points = %record.points)
    )]
    async fn append_earn(
        &self,
        ctx: &RequestContext,
        record: EarnRecord,
    ) -> Result<(EarnTransaction, LedgerEntry), StoreError> {
        if record.points.is_negative() {
            return Err(StoreError::InvalidReference(
                "earn points must not be negative".to_string(),
            ));
        }
        debug!("Writing earn transaction and entry");

        let mut tx = self.pool.begin().await.map_err(db_error)?;
        Self::require_customer(&mut tx, ctx.org_id, record.customer_id).await?;
        Self::require_service(&mut tx, ctx.org_id, record.service_id).await?;

        let rule_found: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM earning_rules WHERE org_id = $1 AND id = $2)",
        )
        .bind(Uuid::from(ctx.org_id))
        .bind(Uuid::from(record.rule_id))
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error)?;
        if !rule_found {
            return Err(StoreError::InvalidReference(format!(
                "unknown rule {}",
                record.rule_id
            )));
        }

        let now = Utc::now();
        let transaction = EarnTransaction {
            id: EarnTransactionId::new_v7(),
            org_id: ctx.org_id,
            customer_id: record.customer_id,
            service_id: record.service_id,
            rule_id: record.rule_id,
            spend_amount: record.spend_amount,
            points_earned: record.points,
            occurs_at: record.occurs_at,
            expires_at: record.expires_at,
            reference_no: record.reference_no,
            note: record.note,
            created_by: ctx.actor_id,
            created_at: now,
        };
        let entry = LedgerEntry {
            id: LedgerEntryId::new_v7(),
            org_id: ctx.org_id,
            customer_id: record.customer_id,
            service_id: Some(record.service_id),
            source: EntrySource::Earn,
            source_id: transaction.id.into(),
            points_delta: record.points,
            occurs_at: record.occurs_at,
            expires_at: Some(record.expires_at),
            metadata: Some(json!({ "spend_amount": record.spend_amount })),
            created_by: ctx.actor_id,
            created_at: now,
        };

        sqlx::query(
            "INSERT INTO earn_transactions \
                 (id, org_id, customer_id, service_id, rule_id, spend_amount, points_earned, \
                  occurs_at, expires_at, reference_no, note, created_by, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(Uuid::from(transaction.id))
        .bind(Uuid::from(transaction.org_id))
        .bind(Uuid::from(transaction.customer_id))
        .bind(Uuid::from(transaction.service_id))
        .bind(Uuid::from(transaction.rule_id))
        .bind(transaction.spend_amount)
        .bind(transaction.points_earned.value())
        .bind(transaction.occurs_at)
        .bind(transaction.expires_at)
        .bind(&transaction.reference_no)
        .bind(&transaction.note)
        .bind(Uuid::from(transaction.created_by))
        .bind(transaction.created_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        Self::insert_entry(&mut tx, &entry).await?;
        tx.commit().await.map_err(db_error)?;

        Ok((transaction, entry))
    }

    #[instrument(
        skip(self, ctx, record),
        fields(org = %ctx.org_id, customer = %record.customer_id, points = %record.points)
    )]
    async fn allocate_redemption(
        &self,
        ctx: &RequestContext,
        record: RedemptionRecord,
    ) -> Result<(Redemption, Vec<LotAllocation>), StoreError> {
        if !record.points.is_positive() {
            return Err(StoreError::InvalidReference(
                "redemption points must be positive".to_string(),
            ));
        }
        debug!("Planning redemption draws");

        let mut tx = self.pool.begin().await.map_err(db_error)?;
        Self::require_customer(&mut tx, ctx.org_id, record.customer_id).await?;

        let lots =
            Self::lock_live_lots(&mut tx, ctx.org_id, record.customer_id, record.redeemed_at)
                .await?;
        // Insufficient funds abort here; the open transaction rolls
        // back on drop with nothing written.
        let draws = plan(&lots, record.points)?;

        let now = Utc::now();
        let redemption = Redemption {
            id: RedemptionId::new_v7(),
            org_id: ctx.org_id,
            customer_id: record.customer_id,
            points_redeemed: record.points,
            redeemed_at: record.redeemed_at,
            reward_name: record.reward_name,
            note: record.note,
            created_by: ctx.actor_id,
            created_at: now,
        };
        let entry = LedgerEntry {
            id: LedgerEntryId::new_v7(),
            org_id: ctx.org_id,
            customer_id: record.customer_id,
            service_id: None,
            source: EntrySource::Redeem,
            source_id: redemption.id.into(),
            points_delta: -record.points,
            occurs_at: record.redeemed_at,
            expires_at: None,
            metadata: redemption.reward_name.as_ref().map(|r| json!({ "reward": r })),
            created_by: ctx.actor_id,
            created_at: now,
        };

        sqlx::query(
            "INSERT INTO redemptions \
                 (id, org_id, customer_id, points_redeemed, redeemed_at, reward_name, note, \
                  created_by, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(Uuid::from(redemption.id))
        .bind(Uuid::from(redemption.org_id))
        .bind(Uuid::from(redemption.customer_id))
        .bind(redemption.points_redeemed.value())
        .bind(redemption.redeemed_at)
        .bind(&redemption.reward_name)
        .bind(&redemption.note)
        .bind(Uuid::from(redemption.created_by))
        .bind(redemption.created_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        Self::insert_entry(&mut tx, &entry).await?;
        let rows =
            Self::insert_allocations(&mut tx, entry.id, &draws, Some(redemption.id), now).await?;
        tx.commit().await.map_err(db_error)?;

        Ok((redemption, rows))
    }

    #[instrument(
        skip(self, ctx, record),
        fields(org = %ctx.org_id, customer = %record.customer_id, delta = %record.delta)
    )]
    async fn append_adjustment(
        &self,
        ctx: &RequestContext,
        record: AdjustmentRecord,
    ) -> Result<(LedgerEntry, Vec<LotAllocation>), StoreError> {
        if record.delta.is_zero() {
            return Err(StoreError::InvalidReference(
                "adjustment delta must not be zero".to_string(),
            ));
        }
        if record.delta.is_positive() && record.expires_at.is_none() {
            return Err(StoreError::InvalidReference(
                "credit adjustments must carry an expiry".to_string(),
            ));
        }
        debug!("Writing adjustment entry");

        let mut tx = self.pool.begin().await.map_err(db_error)?;
        Self::require_customer(&mut tx, ctx.org_id, record.customer_id).await?;

        let draws = if record.delta.is_negative() {
            let lots =
                Self::lock_live_lots(&mut tx, ctx.org_id, record.customer_id, record.occurs_at)
                    .await?;
            plan(&lots, record.delta.abs())?
        } else {
            Vec::new()
        };

        let now = Utc::now();
        let entry_id = LedgerEntryId::new_v7();
        let entry = LedgerEntry {
            id: entry_id,
            org_id: ctx.org_id,
            customer_id: record.customer_id,
            service_id: None,
            source: EntrySource::Adjust,
            source_id: entry_id.into(),
            points_delta: record.delta,
            occurs_at: record.occurs_at,
            expires_at: if record.delta.is_positive() {
                record.expires_at
            } else {
                None
            },
            metadata: record.reason.map(|r| json!({ "reason": r })),
            created_by: ctx.actor_id,
            created_at: now,
        };

        Self::insert_entry(&mut tx, &entry).await?;
        let rows = Self::insert_allocations(&mut tx, entry.id, &draws, None, now).await?;
        tx.commit().await.map_err(db_error)?;

        Ok((entry, rows))
    }

    #[instrument(skip(self, ctx, reason), fields(org = %ctx.org_id, transaction = %transaction_id))]
    async fn reverse_earn(
        &self,
        ctx: &RequestContext,
        transaction_id: EarnTransactionId,
        reason: Option<String>,
    ) -> Result<(LedgerEntry, Vec<LotAllocation>), StoreError> {
        debug!("Reversing earn transaction");

        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let found: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM earn_transactions WHERE org_id = $1 AND id = $2)",
        )
        .bind(Uuid::from(ctx.org_id))
        .bind(Uuid::from(transaction_id))
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error)?;
        if !found {
            return Err(StoreError::not_found("earn transaction", transaction_id));
        }

        let original: Option<EntryRow> = sqlx::query_as(
            "SELECT id, org_id, customer_id, service_id, source, source_id, points_delta, \
                    occurs_at, expires_at, metadata, created_by, created_at \
             FROM point_ledger \
             WHERE org_id = $1 AND source = 'EARN' AND source_id = $2 \
             FOR UPDATE",
        )
        .bind(Uuid::from(ctx.org_id))
        .bind(Uuid::from(transaction_id))
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error)?;
        let original: LedgerEntry = original
            .ok_or_else(|| {
                StoreError::internal(format!(
                    "earn transaction {transaction_id} has no ledger entry"
                ))
            })?
            .try_into()
            .map_err(store_error)?;

        let allocated = Self::allocated_by_lot(&mut tx, &[original.id.into()]).await?;
        let remaining =
            original.points_delta - Points::new(allocated.values().copied().sum::<i64>());

        let now = Utc::now();
        let entry = LedgerEntry {
            id: LedgerEntryId::new_v7(),
            org_id: ctx.org_id,
            customer_id: original.customer_id,
            service_id: original.service_id,
            source: EntrySource::Reversal,
            source_id: original.id.into(),
            points_delta: -remaining,
            occurs_at: now,
            expires_at: None,
            metadata: reason.map(|r| json!({ "reason": r })),
            created_by: ctx.actor_id,
            created_at: now,
        };

        Self::insert_entry(&mut tx, &entry).await?;
        let rows = if remaining.is_positive() {
            let draws = vec![LotDraw {
                earn_entry_id: original.id,
                points_used: remaining,
            }];
            Self::insert_allocations(&mut tx, entry.id, &draws, None, now).await?
        } else {
            Vec::new()
        };
        tx.commit().await.map_err(db_error)?;

        Ok((entry, rows))
    }

    #[instrument(skip(self, ctx), fields(org = %ctx.org_id, batch_size))]
    async fn sweep_expired(
        &self,
        ctx: &RequestContext,
        as_of: DateTime<Utc>,
        batch_size: u32,
    ) -> Result<SweepOutcome, StoreError> {
        debug!("Sweeping expired lots");

        let mut tx = self.pool.begin().await.map_err(db_error)?;

        // Lots another sweeper or an in-flight consumption holds are
        // skipped; the next pass picks them up.
        let rows: Vec<SweepLotRow> = sqlx::query_as(
            "SELECT l.id, l.customer_id, l.service_id, l.points_delta \
             FROM point_ledger l \
             WHERE l.org_id = $1 \
               AND l.points_delta >= 0 AND l.expires_at IS NOT NULL \
               AND l.expires_at <= $2 \
               AND l.points_delta > COALESCE(( \
                   SELECT SUM(a.points_used) FROM lot_allocations a \
                   WHERE a.earn_entry_id = l.id), 0) \
             ORDER BY l.expires_at, l.id \
             LIMIT $3 \
             FOR UPDATE SKIP LOCKED",
        )
        .bind(Uuid::from(ctx.org_id))
        .bind(as_of)
        .bind(i64::from(batch_size))
        .fetch_all(&mut *tx)
        .await
        .map_err(db_error)?;

        // Remainders are recomputed under the locks; a draw committed
        // between the scan's snapshot and the lock is caught here.
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let allocated = Self::allocated_by_lot(&mut tx, &ids).await?;

        let now = Utc::now();
        let mut outcome = SweepOutcome::default();
        for row in rows {
            let remaining =
                Points::new(row.points_delta - allocated.get(&row.id).copied().unwrap_or(0));
            if !remaining.is_positive() {
                continue;
            }

            let lot_entry_id = LedgerEntryId::from(row.id);
            let entry = LedgerEntry {
                id: LedgerEntryId::new_v7(),
                org_id: ctx.org_id,
                customer_id: row.customer_id.into(),
                service_id: row.service_id.map(Into::into),
                source: EntrySource::Expire,
                source_id: row.id,
                points_delta: -remaining,
                occurs_at: as_of,
                expires_at: None,
                metadata: None,
                created_by: ctx.actor_id,
                created_at: now,
            };
            let draws = vec![LotDraw {
                earn_entry_id: lot_entry_id,
                points_used: remaining,
            }];

            Self::insert_entry(&mut tx, &entry).await?;
            Self::insert_allocations(&mut tx, entry.id, &draws, None, now).await?;

            outcome.lots_swept += 1;
            outcome.points_expired = outcome.points_expired + remaining;
        }
        tx.commit().await.map_err(db_error)?;

        Ok(outcome)
    }

    // ========================================================================
    // Ledger Queries
    // ========================================================================

    #[instrument(skip(self, ctx, query), fields(org = %ctx.org_id, customer = %customer_id))]
    async fn earn_lots(
        &self,
        ctx: &RequestContext,
        customer_id: CustomerId,
        query: LotQuery,
    ) -> Result<Vec<EarnLot>, StoreError> {
        self.customer(ctx, customer_id).await?;

        let rows: Vec<LotRow> = sqlx::query_as(
            "SELECT l.id, l.customer_id, l.service_id, l.points_delta, \
                    COALESCE(( \
                        SELECT SUM(a.points_used) FROM lot_allocations a \
                        WHERE a.earn_entry_id = l.id), 0)::BIGINT AS allocated, \
                    l.occurs_at, l.expires_at \
             FROM point_ledger l \
             WHERE l.org_id = $1 AND l.customer_id = $2 \
               AND l.points_delta >= 0 AND l.expires_at IS NOT NULL \
             ORDER BY l.expires_at, l.occurs_at, l.id",
        )
        .bind(Uuid::from(ctx.org_id))
        .bind(Uuid::from(customer_id))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let lots = rows.into_iter().map(EarnLot::from);
        Ok(match query.scope {
            LotScope::Available => lots
                .filter(|lot| !lot.is_expired(query.as_of) && lot.remaining().is_positive())
                .collect(),
            LotScope::ExpiringWithin(horizon) => lots
                .filter(|lot| {
                    lot.expires_within(query.as_of, horizon) && lot.remaining().is_positive()
                })
                .collect(),
            LotScope::All => lots.collect(),
        })
    }

    #[instrument(skip(self, ctx, filter, page), fields(org = %ctx.org_id, customer = %customer_id))]
    async fn ledger_entries(
        &self,
        ctx: &RequestContext,
        customer_id: CustomerId,
        filter: HistoryFilter,
        page: PageRequest,
    ) -> Result<Page<LedgerEntry>, StoreError> {
        self.customer(ctx, customer_id).await?;

        let service_id = filter.service_id.map(Uuid::from);
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM point_ledger \
             WHERE org_id = $1 AND customer_id = $2 \
               AND ($3::uuid IS NULL OR service_id = $3) \
               AND ($4::timestamptz IS NULL OR occurs_at >= $4) \
               AND ($5::timestamptz IS NULL OR occurs_at < $5)",
        )
        .bind(Uuid::from(ctx.org_id))
        .bind(Uuid::from(customer_id))
        .bind(service_id)
        .bind(filter.occurred_since)
        .bind(filter.occurred_before)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;

        let rows: Vec<EntryRow> = sqlx::query_as(
            "SELECT id, org_id, customer_id, service_id, source, source_id, points_delta, \
                    occurs_at, expires_at, metadata, created_by, created_at \
             FROM point_ledger \
             WHERE org_id = $1 AND customer_id = $2 \
               AND ($3::uuid IS NULL OR service_id = $3) \
               AND ($4::timestamptz IS NULL OR occurs_at >= $4) \
               AND ($5::timestamptz IS NULL OR occurs_at < $5) \
             ORDER BY occurs_at DESC, id DESC \
             LIMIT $6 OFFSET $7",
        )
        .bind(Uuid::from(ctx.org_id))
        .bind(Uuid::from(customer_id))
        .bind(service_id)
        .bind(filter.occurred_since)
        .bind(filter.occurred_before)
        .bind(i64::from(page.page_size))
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let items = rows
            .into_iter()
            .map(LedgerEntry::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map_err(store_error)?;

        Ok(Page {
            items,
            total: total as u64,
            page: page.page,
            page_size: page.page_size,
        })
    }

    #[instrument(skip(self, ctx), fields(org = %ctx.org_id, customer = %customer_id))]
    async fn ledger_sum(
        &self,
        ctx: &RequestContext,
        customer_id: CustomerId,
    ) -> Result<Points, StoreError> {
        self.customer(ctx, customer_id).await?;

        let sum: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(points_delta), 0)::BIGINT \
             FROM point_ledger \
             WHERE org_id = $1 AND customer_id = $2",
        )
        .bind(Uuid::from(ctx.org_id))
        .bind(Uuid::from(customer_id))
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(Points::new(sum))
    }

    #[instrument(skip(self, ctx), fields(org = %ctx.org_id, customer = %customer_id))]
    async fn ledger_snapshot(
        &self,
        ctx: &RequestContext,
        customer_id: CustomerId,
    ) -> Result<(Vec<LedgerEntry>, Vec<LotAllocation>), StoreError> {
        self.customer(ctx, customer_id).await?;

        let entry_rows: Vec<EntryRow> = sqlx::query_as(
            "SELECT id, org_id, customer_id, service_id, source, source_id, points_delta, \
                    occurs_at, expires_at, metadata, created_by, created_at \
             FROM point_ledger \
             WHERE org_id = $1 AND customer_id = $2 \
             ORDER BY occurs_at, id",
        )
        .bind(Uuid::from(ctx.org_id))
        .bind(Uuid::from(customer_id))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let allocation_rows: Vec<AllocationRow> = sqlx::query_as(
            "SELECT a.id, a.entry_id, a.earn_entry_id, a.points_used, a.redemption_id, \
                    a.created_at \
             FROM lot_allocations a \
             JOIN point_ledger l ON l.id = a.entry_id \
             WHERE l.org_id = $1 AND l.customer_id = $2",
        )
        .bind(Uuid::from(ctx.org_id))
        .bind(Uuid::from(customer_id))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let entries = entry_rows
            .into_iter()
            .map(LedgerEntry::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map_err(store_error)?;
        let allocations = allocation_rows.into_iter().map(LotAllocation::from).collect();

        Ok((entries, allocations))
    }

    // ========================================================================
    // Liveness
    // ========================================================================

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(())
    }
}

/// Loads every rule attached to a service, oldest window first
async fn fetch_rules(
    conn: &mut PgConnection,
    org_id: OrgId,
    service_id: ServiceId,
) -> Result<Vec<EarningRule>, StoreError> {
    let rows: Vec<RuleRow> = sqlx::query_as(
        "SELECT id, org_id, service_id, spend_amount, earn_points, rounding, min_spend, \
                valid_from, valid_to, created_at \
         FROM earning_rules \
         WHERE org_id = $1 AND service_id = $2 \
         ORDER BY valid_from, created_at",
    )
    .bind(Uuid::from(org_id))
    .bind(Uuid::from(service_id))
    .fetch_all(conn)
    .await
    .map_err(db_error)?;

    rows.into_iter()
        .map(EarningRule::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(store_error)
}

// =============================================================================
// Error Translation
// =============================================================================

/// Translates classified database failures into port errors
fn store_error(err: DatabaseError) -> StoreError {
    match err {
        DatabaseError::SerializationConflict(msg) => StoreError::Conflict(msg),
        DatabaseError::ForeignKeyViolation(msg) | DatabaseError::ConstraintViolation(msg) => {
            StoreError::InvalidReference(msg)
        }
        DatabaseError::WindowOverlap(_) => StoreError::RuleOverlap { existing: None },
        DatabaseError::DuplicateEntry(msg) => StoreError::duplicate("record", msg),
        DatabaseError::NotFound(msg) => StoreError::NotFound {
            entity: "record",
            id: msg,
        },
        DatabaseError::ConnectionFailed(msg) => StoreError::Connection(msg),
        DatabaseError::PoolExhausted => {
            StoreError::Connection("connection pool exhausted".to_string())
        }
        other => StoreError::internal(other.to_string()),
    }
}

fn db_error(err: sqlx::Error) -> StoreError {
    store_error(DatabaseError::from(&err))
}

// =============================================================================
// Row Types and Conversions
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: Uuid,
    org_id: Uuid,
    code: String,
    full_name: String,
    phone: Option<String>,
    email: Option<String>,
    birth_date: Option<NaiveDate>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Customer {
            id: row.id.into(),
            org_id: row.org_id.into(),
            code: row.code,
            full_name: row.full_name,
            phone: row.phone,
            email: row.email,
            birth_date: row.birth_date,
            notes: row.notes,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ServiceRow {
    id: Uuid,
    org_id: Uuid,
    name: String,
    category: String,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<ServiceRow> for Service {
    type Error = DatabaseError;

    fn try_from(row: ServiceRow) -> Result<Self, Self::Error> {
        Ok(Service {
            id: row.id.into(),
            org_id: row.org_id.into(),
            name: row.name,
            category: parse_category(&row.category)?,
            is_active: row.is_active,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RuleRow {
    id: Uuid,
    org_id: Uuid,
    service_id: Uuid,
    spend_amount: Decimal,
    earn_points: i64,
    rounding: String,
    min_spend: Option<Decimal>,
    valid_from: NaiveDate,
    valid_to: Option<NaiveDate>,
    created_at: DateTime<Utc>,
}

impl TryFrom<RuleRow> for EarningRule {
    type Error = DatabaseError;

    fn try_from(row: RuleRow) -> Result<Self, Self::Error> {
        let validity = ValidityWindow::new(row.valid_from, row.valid_to)
            .map_err(|e| DatabaseError::DecodeFailed(e.to_string()))?;
        Ok(EarningRule {
            id: row.id.into(),
            org_id: row.org_id.into(),
            service_id: row.service_id.into(),
            spend_amount: row.spend_amount,
            earn_points: Points::new(row.earn_points),
            rounding: parse_rounding(&row.rounding)?,
            min_spend: row.min_spend,
            validity,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EntryRow {
    id: Uuid,
    org_id: Uuid,
    customer_id: Uuid,
    service_id: Option<Uuid>,
    source: String,
    source_id: Uuid,
    points_delta: i64,
    occurs_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    metadata: Option<serde_json::Value>,
    created_by: Uuid,
    created_at: DateTime<Utc>,
}

impl TryFrom<EntryRow> for LedgerEntry {
    type Error = DatabaseError;

    fn try_from(row: EntryRow) -> Result<Self, Self::Error> {
        Ok(LedgerEntry {
            id: row.id.into(),
            org_id: row.org_id.into(),
            customer_id: row.customer_id.into(),
            service_id: row.service_id.map(Into::into),
            source: parse_source(&row.source)?,
            source_id: row.source_id,
            points_delta: Points::new(row.points_delta),
            occurs_at: row.occurs_at,
            expires_at: row.expires_at,
            metadata: row.metadata,
            created_by: row.created_by.into(),
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AllocationRow {
    id: Uuid,
    entry_id: Uuid,
    earn_entry_id: Uuid,
    points_used: i64,
    redemption_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl From<AllocationRow> for LotAllocation {
    fn from(row: AllocationRow) -> Self {
        LotAllocation {
            id: row.id.into(),
            entry_id: row.entry_id.into(),
            earn_entry_id: row.earn_entry_id.into(),
            points_used: Points::new(row.points_used),
            redemption_id: row.redemption_id.map(Into::into),
            created_at: row.created_at,
        }
    }
}

/// A lot entry with its draws already summed, for unlocked reads
#[derive(Debug, sqlx::FromRow)]
struct LotRow {
    id: Uuid,
    customer_id: Uuid,
    service_id: Option<Uuid>,
    points_delta: i64,
    allocated: i64,
    occurs_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl From<LotRow> for EarnLot {
    fn from(row: LotRow) -> Self {
        EarnLot {
            entry_id: row.id.into(),
            customer_id: row.customer_id.into(),
            service_id: row.service_id.map(Into::into),
            points: Points::new(row.points_delta),
            allocated: Points::new(row.allocated),
            occurs_at: row.occurs_at,
            expires_at: row.expires_at,
        }
    }
}

/// A lot entry read under `FOR UPDATE`; draw sums come separately
#[derive(Debug, sqlx::FromRow)]
struct LockedLotRow {
    id: Uuid,
    service_id: Option<Uuid>,
    points_delta: i64,
    occurs_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct SweepLotRow {
    id: Uuid,
    customer_id: Uuid,
    service_id: Option<Uuid>,
    points_delta: i64,
}

fn parse_category(value: &str) -> Result<ServiceCategory, DatabaseError> {
    match value {
        "HOTEL" => Ok(ServiceCategory::Hotel),
        "RESTAURANT" => Ok(ServiceCategory::Restaurant),
        "CAFE" => Ok(ServiceCategory::Cafe),
        "RETAIL" => Ok(ServiceCategory::Retail),
        "OTHER" => Ok(ServiceCategory::Other),
        other => Err(DatabaseError::DecodeFailed(format!(
            "unknown service category '{other}'"
        ))),
    }
}

fn parse_rounding(value: &str) -> Result<RoundingMode, DatabaseError> {
    match value {
        "FLOOR" => Ok(RoundingMode::Floor),
        "ROUND" => Ok(RoundingMode::Round),
        "CEIL" => Ok(RoundingMode::Ceil),
        other => Err(DatabaseError::DecodeFailed(format!(
            "unknown rounding mode '{other}'"
        ))),
    }
}

fn parse_source(value: &str) -> Result<EntrySource, DatabaseError> {
    match value {
        "EARN" => Ok(EntrySource::Earn),
        "REDEEM" => Ok(EntrySource::Redeem),
        "EXPIRE" => Ok(EntrySource::Expire),
        "ADJUST" => Ok(EntrySource::Adjust),
        "REVERSAL" => Ok(EntrySource::Reversal),
        other => Err(DatabaseError::DecodeFailed(format!(
            "unknown entry source '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_functions_invert_as_str() {
        for category in [
            ServiceCategory::Hotel,
            ServiceCategory::Restaurant,
            ServiceCategory::Cafe,
            ServiceCategory::Retail,
            ServiceCategory::Other,
        ] {
            assert_eq!(parse_category(category.as_str()).unwrap(), category);
        }
        for rounding in [RoundingMode::Floor, RoundingMode::Round, RoundingMode::Ceil] {
            assert_eq!(parse_rounding(rounding.as_str()).unwrap(), rounding);
        }
        for source in [
            EntrySource::Earn,
            EntrySource::Redeem,
            EntrySource::Expire,
            EntrySource::Adjust,
            EntrySource::Reversal,
        ] {
            assert_eq!(parse_source(source.as_str()).unwrap(), source);
        }
    }

    #[test]
    fn test_unknown_source_is_a_decode_error() {
        let err = parse_source("SPLIT").unwrap_err();
        assert!(matches!(err, DatabaseError::DecodeFailed(_)));
    }

    #[test]
    fn test_window_overlap_becomes_rule_overlap() {
        let err = store_error(DatabaseError::WindowOverlap("rules".to_string()));
        assert!(matches!(
            err,
            StoreError::RuleOverlap { existing: None }
        ));
    }

    #[test]
    fn test_serialization_conflict_becomes_retryable() {
        let err = store_error(DatabaseError::SerializationConflict("40001".to_string()));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_foreign_key_becomes_invalid_reference() {
        let err = store_error(DatabaseError::ForeignKeyViolation("fk".to_string()));
        assert!(matches!(err, StoreError::InvalidReference(_)));
    }

    #[test]
    fn test_lot_row_conversion() {
        let row = LotRow {
            id: Uuid::now_v7(),
            customer_id: Uuid::new_v4(),
            service_id: None,
            points_delta: 10,
            allocated: 4,
            occurs_at: Utc::now(),
            expires_at: Utc::now(),
        };
        let lot = EarnLot::from(row);
        assert_eq!(lot.remaining(), Points::new(6));
    }
}
