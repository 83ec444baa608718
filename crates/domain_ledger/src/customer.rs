//! Loyalty program members
//!
//! Customers are the account holders of the ledger. The `code` is an
//! org-scoped external identifier (membership number, phone-derived
//! code, or whatever the org uses at the till).

use chrono::{DateTime, NaiveDate, Utc};
use core_kernel::{CustomerId, OrgId};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// A loyalty program member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    /// Unique identifier
    pub id: CustomerId,
    /// Owning organization
    pub org_id: OrgId,
    /// Org-unique external code
    pub code: String,
    /// Display name
    pub full_name: String,
    /// Contact phone
    pub phone: Option<String>,
    /// Contact email
    pub email: Option<String>,
    /// Birth date, for birthday promotions
    pub birth_date: Option<NaiveDate>,
    /// Free-form operator notes
    pub notes: Option<String>,
    /// When the customer was registered
    pub created_at: DateTime<Utc>,
}

/// Input for registering a new customer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCustomer {
    pub code: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

impl Customer {
    /// Creates a customer from registration input
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidRequest` if the code or name is
    /// blank.
    pub fn create(org_id: OrgId, new: NewCustomer) -> Result<Self, EngineError> {
        if new.code.trim().is_empty() {
            return Err(EngineError::InvalidRequest(
                "customer code must not be blank".to_string(),
            ));
        }
        if new.full_name.trim().is_empty() {
            return Err(EngineError::InvalidRequest(
                "customer name must not be blank".to_string(),
            ));
        }
        Ok(Self {
            id: CustomerId::new_v7(),
            org_id,
            code: new.code,
            full_name: new.full_name,
            phone: new.phone,
            email: new.email,
            birth_date: new.birth_date,
            notes: new.notes,
            created_at: Utc::now(),
        })
    }
}
