//! Customer DTOs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use core_kernel::{CustomerId, LedgerEntryId, Points, ServiceId};
use domain_ledger::{
    BalanceSummary, ConsistencyViolation, Customer, ExpiringLot, LedgerEntry, NewCustomer, Page,
};

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterCustomerRequest {
    #[validate(length(min = 1, max = 64))]
    pub code: String,
    #[validate(length(min = 1, max = 128))]
    pub full_name: String,
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

impl From<RegisterCustomerRequest> for NewCustomer {
    fn from(request: RegisterCustomerRequest) -> Self {
        NewCustomer {
            code: request.code,
            full_name: request.full_name,
            phone: request.phone,
            email: request.email,
            birth_date: request.birth_date,
            notes: request.notes,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CustomerResponse {
    pub id: CustomerId,
    pub code: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl From<Customer> for CustomerResponse {
    fn from(customer: Customer) -> Self {
        Self {
            id: customer.id,
            code: customer.code,
            full_name: customer.full_name,
            phone: customer.phone,
            email: customer.email,
            birth_date: customer.birth_date,
            created_at: customer.created_at,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct AsOfQuery {
    pub as_of: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub customer_id: CustomerId,
    pub as_of: DateTime<Utc>,
    pub available: Points,
    pub expiring_soon: Points,
    pub horizon_days: u32,
}

impl From<BalanceSummary> for BalanceResponse {
    fn from(summary: BalanceSummary) -> Self {
        Self {
            customer_id: summary.customer_id,
            as_of: summary.as_of,
            available: summary.available,
            expiring_soon: summary.expiring_soon,
            horizon_days: summary.horizon_days,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct ExpiringLotsQuery {
    pub as_of: Option<DateTime<Utc>>,
    pub horizon_days: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ExpiringLotResponse {
    pub entry_id: LedgerEntryId,
    pub service_id: Option<ServiceId>,
    pub remaining: Points,
    pub expires_at: DateTime<Utc>,
}

impl From<ExpiringLot> for ExpiringLotResponse {
    fn from(lot: ExpiringLot) -> Self {
        Self {
            entry_id: lot.entry_id,
            service_id: lot.service_id,
            remaining: lot.remaining,
            expires_at: lot.expires_at,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct LedgerHistoryParams {
    pub service_id: Option<ServiceId>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct LedgerEntryResponse {
    pub id: LedgerEntryId,
    pub source: String,
    pub source_id: uuid::Uuid,
    pub service_id: Option<ServiceId>,
    pub points_delta: Points,
    pub occurs_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
}

impl From<LedgerEntry> for LedgerEntryResponse {
    fn from(entry: LedgerEntry) -> Self {
        Self {
            id: entry.id,
            source: entry.source.to_string(),
            source_id: entry.source_id,
            service_id: entry.service_id,
            points_delta: entry.points_delta,
            occurs_at: entry.occurs_at,
            expires_at: entry.expires_at,
            metadata: entry.metadata,
            created_at: entry.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LedgerPageResponse {
    pub items: Vec<LedgerEntryResponse>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u64,
}

impl From<Page<LedgerEntry>> for LedgerPageResponse {
    fn from(page: Page<LedgerEntry>) -> Self {
        let total_pages = page.total_pages();
        Self {
            items: page.items.into_iter().map(Into::into).collect(),
            total: page.total,
            page: page.page,
            page_size: page.page_size,
            total_pages,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ConsistencyResponse {
    pub customer_id: CustomerId,
    pub clean: bool,
    pub violations: Vec<ConsistencyViolation>,
}
