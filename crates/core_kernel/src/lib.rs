//! Core Kernel - Foundational types and utilities for the loyalty system
//!
//! This crate provides the fundamental building blocks used across all domain modules:
//! - Integer point amounts with checked arithmetic
//! - Temporal types for validity windows and org-local calendars
//! - Common identifiers and request-scoped context

pub mod context;
pub mod error;
pub mod identifiers;
pub mod points;
pub mod temporal;

pub use context::RequestContext;
pub use error::CoreError;
pub use identifiers::{
    ActorId, AllocationId, CustomerId, EarnTransactionId, LedgerEntryId, OrgId, RedemptionId,
    RuleId, ServiceId,
};
pub use points::{Points, PointsError};
pub use temporal::{OrgTimezone, TemporalError, ValidityWindow};
