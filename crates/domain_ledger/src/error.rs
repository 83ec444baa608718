//! Ledger domain errors

use core_kernel::{PointsError, RuleId};
use domain_rules::error::RuleError;
use thiserror::Error;

use crate::allocation::InsufficientPoints;
use crate::ports::StoreError;

/// Errors surfaced by the points engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// The request itself is malformed (bad amounts, blank fields)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Rule configuration or resolution failed
    #[error(transparent)]
    Rule(#[from] RuleError),

    /// A new rule's validity window collides with an existing one
    #[error("Rule validity overlaps an existing rule for the service")]
    RuleOverlap { existing: Option<RuleId> },

    /// The customer's lots cannot cover the consumption
    #[error(transparent)]
    Insufficient(#[from] InsufficientPoints),

    /// Referenced record does not exist in this org
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A uniqueness constraint was hit
    #[error("Duplicate {entity}: {detail}")]
    Duplicate { entity: &'static str, detail: String },

    /// Concurrent commands kept colliding past the retry budget
    #[error("Operation still conflicted after {attempts} attempts")]
    RetryExhausted { attempts: u32 },

    /// Point arithmetic left the representable range
    #[error(transparent)]
    Points(#[from] PointsError),

    /// The store failed for reasons the caller cannot fix
    #[error("Storage error: {0}")]
    Store(#[source] StoreError),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => EngineError::NotFound { entity, id },
            StoreError::Duplicate { entity, detail } => EngineError::Duplicate { entity, detail },
            StoreError::Insufficient(inner) => EngineError::Insufficient(inner),
            StoreError::RuleOverlap { existing } => EngineError::RuleOverlap { existing },
            StoreError::InvalidReference(message) => EngineError::InvalidRequest(message),
            other => EngineError::Store(other),
        }
    }
}
