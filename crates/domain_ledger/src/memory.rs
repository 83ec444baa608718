//! In-memory ledger store
//!
//! A complete `LedgerStore` behind one `RwLock`. Commands hold the
//! write lock from candidate read to final insert, so the store is
//! serializable by construction and never returns
//! `StoreError::Conflict`. Used by tests, demos, and anywhere a
//! database is overkill.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_kernel::{
    AllocationId, CustomerId, EarnTransactionId, LedgerEntryId, OrgId, Points, RedemptionId,
    RequestContext, ServiceId,
};
use serde_json::json;
use tokio::sync::RwLock;
use uuid::Uuid;

use domain_rules::error::RuleError;
use domain_rules::resolver::validate_no_overlap;
use domain_rules::rule::EarningRule;
use domain_rules::service::Service;

use crate::allocation::{plan, LotDraw};
use crate::customer::Customer;
use crate::entry::{EntrySource, LedgerEntry};
use crate::lot::EarnLot;
use crate::ports::{
    AdjustmentRecord, EarnRecord, HistoryFilter, LedgerStore, LotQuery, LotScope, Page,
    PageRequest, RedemptionRecord, StoreError, SweepOutcome,
};
use crate::redemption::{LotAllocation, Redemption};
use crate::transaction::EarnTransaction;

#[derive(Debug, Default)]
struct Book {
    customers: HashMap<CustomerId, Customer>,
    services: HashMap<ServiceId, Service>,
    rules: Vec<EarningRule>,
    transactions: HashMap<EarnTransactionId, EarnTransaction>,
    entries: Vec<LedgerEntry>,
    redemptions: Vec<Redemption>,
    allocations: Vec<LotAllocation>,
}

impl Book {
    fn customer(&self, org_id: OrgId, id: CustomerId) -> Result<&Customer, StoreError> {
        self.customers
            .get(&id)
            .filter(|c| c.org_id == org_id)
            .ok_or_else(|| StoreError::not_found("customer", id))
    }

    fn service(&self, org_id: OrgId, id: ServiceId) -> Result<&Service, StoreError> {
        self.services
            .get(&id)
            .filter(|s| s.org_id == org_id)
            .ok_or_else(|| StoreError::not_found("service", id))
    }

    fn allocated_against(&self, lot_entry_id: LedgerEntryId) -> Points {
        self.allocations
            .iter()
            .filter(|a| a.earn_entry_id == lot_entry_id)
            .map(|a| a.points_used)
            .sum()
    }

    fn lot_from(&self, entry: &LedgerEntry) -> EarnLot {
        EarnLot {
            entry_id: entry.id,
            customer_id: entry.customer_id,
            service_id: entry.service_id,
            points: entry.points_delta,
            allocated: self.allocated_against(entry.id),
            occurs_at: entry.occurs_at,
            expires_at: entry.expires_at.unwrap_or(entry.occurs_at),
        }
    }

    fn lots_of(&self, org_id: OrgId, customer_id: CustomerId) -> Vec<EarnLot> {
        let mut lots: Vec<EarnLot> = self
            .entries
            .iter()
            .filter(|e| e.org_id == org_id && e.customer_id == customer_id && e.is_lot())
            .map(|e| self.lot_from(e))
            .collect();
        lots.sort_by(|a, b| {
            a.expires_at
                .cmp(&b.expires_at)
                .then(a.occurs_at.cmp(&b.occurs_at))
                .then(a.entry_id.cmp(&b.entry_id))
        });
        lots
    }

    fn push_draws(
        &mut self,
        entry_id: LedgerEntryId,
        draws: &[LotDraw],
        redemption_id: Option<RedemptionId>,
        now: DateTime<Utc>,
    ) -> Vec<LotAllocation> {
        let rows: Vec<LotAllocation> = draws
            .iter()
            .map(|draw| LotAllocation {
                id: AllocationId::new_v7(),
                entry_id,
                earn_entry_id: draw.earn_entry_id,
                points_used: draw.points_used,
                redemption_id,
                created_at: now,
            })
            .collect();
        self.allocations.extend(rows.clone());
        rows
    }
}

/// `LedgerStore` over process memory
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    state: RwLock<Book>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn register_customer(
        &self,
        ctx: &RequestContext,
        customer: Customer,
    ) -> Result<Customer, StoreError> {
        let mut book = self.state.write().await;
        let duplicate = book
            .customers
            .values()
            .any(|c| c.org_id == ctx.org_id && c.code == customer.code);
        if duplicate {
            return Err(StoreError::duplicate("customer", customer.code));
        }
        book.customers.insert(customer.id, customer.clone());
        Ok(customer)
    }

    async fn customer(
        &self,
        ctx: &RequestContext,
        id: CustomerId,
    ) -> Result<Customer, StoreError> {
        let book = self.state.read().await;
        book.customer(ctx.org_id, id).cloned()
    }

    async fn register_service(
        &self,
        ctx: &RequestContext,
        service: Service,
    ) -> Result<Service, StoreError> {
        debug_assert_eq!(service.org_id, ctx.org_id);
        let mut book = self.state.write().await;
        book.services.insert(service.id, service.clone());
        Ok(service)
    }

    async fn service(&self, ctx: &RequestContext, id: ServiceId) -> Result<Service, StoreError> {
        let book = self.state.read().await;
        book.service(ctx.org_id, id).cloned()
    }

    async fn create_rule(
        &self,
        ctx: &RequestContext,
        rule: EarningRule,
    ) -> Result<EarningRule, StoreError> {
        let mut book = self.state.write().await;
        book.service(ctx.org_id, rule.service_id)?;

        let existing: Vec<EarningRule> = book
            .rules
            .iter()
            .filter(|r| r.org_id == ctx.org_id && r.service_id == rule.service_id)
            .cloned()
            .collect();
        validate_no_overlap(&existing, &rule).map_err(|err| match err {
            RuleError::OverlappingValidity { existing } => StoreError::RuleOverlap {
                existing: Some(existing),
            },
            other => StoreError::internal(other.to_string()),
        })?;

        book.rules.push(rule.clone());
        Ok(rule)
    }

    async fn rules_for_service(
        &self,
        ctx: &RequestContext,
        service_id: ServiceId,
    ) -> Result<Vec<EarningRule>, StoreError> {
        let book = self.state.read().await;
        book.service(ctx.org_id, service_id)?;
        Ok(book
            .rules
            .iter()
            .filter(|r| r.org_id == ctx.org_id && r.service_id == service_id)
            .cloned()
            .collect())
    }

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

        let mut book = self.state.write().await;
        book.customer(ctx.org_id, record.customer_id)?;
        book.service(ctx.org_id, record.service_id)?;
        if !book
            .rules
            .iter()
            .any(|r| r.org_id == ctx.org_id && r.id == record.rule_id)
        {
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

        book.transactions.insert(transaction.id, transaction.clone());
        book.entries.push(entry.clone());
        Ok((transaction, entry))
    }

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

        let mut book = self.state.write().await;
        book.customer(ctx.org_id, record.customer_id)?;

        let lots: Vec<EarnLot> = book
            .lots_of(ctx.org_id, record.customer_id)
            .into_iter()
            .filter(|lot| !lot.is_expired(record.redeemed_at) && lot.remaining().is_positive())
            .collect();
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

        let rows = book.push_draws(entry.id, &draws, Some(redemption.id), now);
        book.redemptions.push(redemption.clone());
        book.entries.push(entry);
        Ok((redemption, rows))
    }

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

        let mut book = self.state.write().await;
        book.customer(ctx.org_id, record.customer_id)?;

        let now = Utc::now();
        let entry_id = LedgerEntryId::new_v7();

        let rows = if record.delta.is_negative() {
            let lots: Vec<EarnLot> = book
                .lots_of(ctx.org_id, record.customer_id)
                .into_iter()
                .filter(|lot| !lot.is_expired(record.occurs_at) && lot.remaining().is_positive())
                .collect();
            let draws = plan(&lots, record.delta.abs())?;
            book.push_draws(entry_id, &draws, None, now)
        } else {
            Vec::new()
        };

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
        book.entries.push(entry.clone());
        Ok((entry, rows))
    }

    async fn reverse_earn(
        &self,
        ctx: &RequestContext,
        transaction_id: EarnTransactionId,
        reason: Option<String>,
    ) -> Result<(LedgerEntry, Vec<LotAllocation>), StoreError> {
        let mut book = self.state.write().await;

        let transaction = book
            .transactions
            .get(&transaction_id)
            .filter(|t| t.org_id == ctx.org_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("earn transaction", transaction_id))?;

        let source_id: Uuid = transaction.id.into();
        let original = book
            .entries
            .iter()
            .find(|e| e.source == EntrySource::Earn && e.source_id == source_id)
            .cloned()
            .ok_or_else(|| {
                StoreError::internal(format!(
                    "earn transaction {transaction_id} has no ledger entry"
                ))
            })?;

        let remaining = original.points_delta - book.allocated_against(original.id);
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

        let rows = if remaining.is_positive() {
            let draws = vec![LotDraw {
                earn_entry_id: original.id,
                points_used: remaining,
            }];
            book.push_draws(entry.id, &draws, None, now)
        } else {
            Vec::new()
        };

        book.entries.push(entry.clone());
        Ok((entry, rows))
    }

    async fn sweep_expired(
        &self,
        ctx: &RequestContext,
        as_of: DateTime<Utc>,
        batch_size: u32,
    ) -> Result<SweepOutcome, StoreError> {
        let mut book = self.state.write().await;

        let mut dead: Vec<EarnLot> = book
            .entries
            .iter()
            .filter(|e| e.org_id == ctx.org_id && e.is_lot())
            .map(|e| book.lot_from(e))
            .filter(|lot| lot.is_expired(as_of) && lot.remaining().is_positive())
            .collect();
        dead.sort_by(|a, b| {
            a.expires_at
                .cmp(&b.expires_at)
                .then(a.entry_id.cmp(&b.entry_id))
        });
        dead.truncate(batch_size as usize);

        let now = Utc::now();
        let mut outcome = SweepOutcome::default();
        for lot in dead {
            let remaining = lot.remaining();
            let entry = LedgerEntry {
                id: LedgerEntryId::new_v7(),
                org_id: ctx.org_id,
                customer_id: lot.customer_id,
                service_id: lot.service_id,
                source: EntrySource::Expire,
                source_id: lot.entry_id.into(),
                points_delta: -remaining,
                occurs_at: as_of,
                expires_at: None,
                metadata: None,
                created_by: ctx.actor_id,
                created_at: now,
            };
            let draws = vec![LotDraw {
                earn_entry_id: lot.entry_id,
                points_used: remaining,
            }];
            book.push_draws(entry.id, &draws, None, now);
            book.entries.push(entry);

            outcome.lots_swept += 1;
            outcome.points_expired = outcome.points_expired + remaining;
        }

        Ok(outcome)
    }

    async fn earn_lots(
        &self,
        ctx: &RequestContext,
        customer_id: CustomerId,
        query: LotQuery,
    ) -> Result<Vec<EarnLot>, StoreError> {
        let book = self.state.read().await;
        book.customer(ctx.org_id, customer_id)?;

        let lots = book.lots_of(ctx.org_id, customer_id);
        Ok(match query.scope {
            LotScope::Available => lots
                .into_iter()
                .filter(|lot| !lot.is_expired(query.as_of) && lot.remaining().is_positive())
                .collect(),
            LotScope::ExpiringWithin(horizon) => lots
                .into_iter()
                .filter(|lot| {
                    lot.expires_within(query.as_of, horizon) && lot.remaining().is_positive()
                })
                .collect(),
            LotScope::All => lots,
        })
    }

    async fn ledger_entries(
        &self,
        ctx: &RequestContext,
        customer_id: CustomerId,
        filter: HistoryFilter,
        page: PageRequest,
    ) -> Result<Page<LedgerEntry>, StoreError> {
        let book = self.state.read().await;
        book.customer(ctx.org_id, customer_id)?;

        let mut matching: Vec<LedgerEntry> = book
            .entries
            .iter()
            .filter(|e| e.org_id == ctx.org_id && e.customer_id == customer_id)
            .filter(|e| filter.service_id.map_or(true, |s| e.service_id == Some(s)))
            .filter(|e| filter.occurred_since.map_or(true, |t| e.occurs_at >= t))
            .filter(|e| filter.occurred_before.map_or(true, |t| e.occurs_at < t))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.occurs_at.cmp(&a.occurs_at).then(b.id.cmp(&a.id)));

        let total = matching.len() as u64;
        let items: Vec<LedgerEntry> = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.page_size as usize)
            .collect();

        Ok(Page {
            items,
            total,
            page: page.page,
            page_size: page.page_size,
        })
    }

    async fn ledger_sum(
        &self,
        ctx: &RequestContext,
        customer_id: CustomerId,
    ) -> Result<Points, StoreError> {
        let book = self.state.read().await;
        book.customer(ctx.org_id, customer_id)?;

        Points::total(
            book.entries
                .iter()
                .filter(|e| e.org_id == ctx.org_id && e.customer_id == customer_id)
                .map(|e| e.points_delta),
        )
        .map_err(|e| StoreError::internal(e.to_string()))
    }

    async fn ledger_snapshot(
        &self,
        ctx: &RequestContext,
        customer_id: CustomerId,
    ) -> Result<(Vec<LedgerEntry>, Vec<LotAllocation>), StoreError> {
        let book = self.state.read().await;
        book.customer(ctx.org_id, customer_id)?;

        let entries: Vec<LedgerEntry> = book
            .entries
            .iter()
            .filter(|e| e.org_id == ctx.org_id && e.customer_id == customer_id)
            .cloned()
            .collect();
        let entry_ids: Vec<LedgerEntryId> = entries.iter().map(|e| e.id).collect();
        let allocations: Vec<LotAllocation> = book
            .allocations
            .iter()
            .filter(|a| entry_ids.contains(&a.entry_id))
            .cloned()
            .collect();

        Ok((entries, allocations))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
