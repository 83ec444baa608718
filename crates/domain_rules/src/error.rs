//! Rules domain errors

use chrono::NaiveDate;
use core_kernel::{RuleId, ServiceId};
use thiserror::Error;

/// Errors that can occur in the rules domain
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuleError {
    /// Rule configuration is invalid
    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    /// No rule covers the requested date
    #[error("No earning rule applies to service {service_id} on {on}")]
    NoApplicableRule {
        service_id: ServiceId,
        on: NaiveDate,
    },

    /// Candidate rule's validity window collides with an existing rule
    #[error("Validity window overlaps existing rule {existing}")]
    OverlappingValidity { existing: RuleId },

    /// Point calculation left the representable range
    #[error("Point calculation overflowed")]
    Overflow,
}
