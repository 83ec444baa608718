//! Service catalog for the loyalty program
//!
//! Services are the things customers spend money on. Every earn
//! transaction references a service, and earning rules are attached to
//! services.

use chrono::{DateTime, Utc};
use core_kernel::{OrgId, ServiceId};
use serde::{Deserialize, Serialize};

use crate::error::RuleError;

/// Business category of a service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceCategory {
    /// Lodging and accommodation
    Hotel,
    /// Dining
    Restaurant,
    /// Coffee shops and bakeries
    Cafe,
    /// Shops and merchandise
    Retail,
    /// Anything that does not fit the above
    Other,
}

impl ServiceCategory {
    /// Returns the wire representation of the category
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceCategory::Hotel => "HOTEL",
            ServiceCategory::Restaurant => "RESTAURANT",
            ServiceCategory::Cafe => "CAFE",
            ServiceCategory::Retail => "RETAIL",
            ServiceCategory::Other => "OTHER",
        }
    }
}

impl std::fmt::Display for ServiceCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A service offered by an organization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    /// Unique identifier
    pub id: ServiceId,
    /// Owning organization
    pub org_id: OrgId,
    /// Display name (e.g., "Garden Terrace Restaurant")
    pub name: String,
    /// Business category
    pub category: ServiceCategory,
    /// Inactive services stop accepting earn transactions but keep
    /// their ledger history
    pub is_active: bool,
    /// When the service was registered
    pub created_at: DateTime<Utc>,
}

/// Input for registering a new service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewService {
    pub name: String,
    pub category: ServiceCategory,
}

impl NewService {
    pub fn new(name: impl Into<String>, category: ServiceCategory) -> Self {
        Self {
            name: name.into(),
            category,
        }
    }
}

impl Service {
    /// Creates a service from registration input
    ///
    /// # Errors
    ///
    /// Returns `RuleError::InvalidRule` if the name is blank.
    pub fn create(org_id: OrgId, new: NewService) -> Result<Self, RuleError> {
        if new.name.trim().is_empty() {
            return Err(RuleError::InvalidRule(
                "service name must not be blank".to_string(),
            ));
        }
        Ok(Self {
            id: ServiceId::new_v7(),
            org_id,
            name: new.name,
            category: new.category,
            is_active: true,
            created_at: Utc::now(),
        })
    }

    /// Marks the service inactive
    pub fn deactivate(&mut self) {
        self.is_active = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_service() {
        let org = OrgId::new();
        let service =
            Service::create(org, NewService::new("Lakeside Hotel", ServiceCategory::Hotel))
                .unwrap();

        assert_eq!(service.org_id, org);
        assert!(service.is_active);
        assert_eq!(service.category, ServiceCategory::Hotel);
    }

    #[test]
    fn test_blank_name_rejected() {
        let result = Service::create(OrgId::new(), NewService::new("   ", ServiceCategory::Cafe));
        assert!(matches!(result, Err(RuleError::InvalidRule(_))));
    }

    #[test]
    fn test_category_serializes_screaming_snake() {
        let json = serde_json::to_string(&ServiceCategory::Restaurant).unwrap();
        assert_eq!(json, "\"RESTAURANT\"");
    }
}
