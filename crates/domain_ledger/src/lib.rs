//! Ledger Domain - Append-Only Points Accounting
//!
//! This crate implements the points ledger for the loyalty core. Every
//! movement of points is an immutable ledger entry; balances are never
//! stored, only derived.
//!
//! # Ledger Principles
//!
//! - Entries are append-only: corrections append compensating entries,
//!   nothing is updated or deleted
//! - Positive entries (earns, credit adjustments) open "lots" that carry
//!   an expiry date
//! - Negative entries (redemptions, expirations, debit adjustments,
//!   reversals) consume lots through explicit allocation rows
//! - Consumption is FIFO by expiry: the lot that dies soonest is spent
//!   first
//!
//! # The Ledger Identity
//!
//! Because every negative entry is fully covered by allocations against
//! lots, the sum of all entry deltas always equals the sum of remaining
//! points across all lots. `audit::verify` checks this identity plus the
//! per-lot and per-entry invariants behind it.
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_ledger::{MemoryLedgerStore, PointsEngine, EngineConfig};
//!
//! let store = Arc::new(MemoryLedgerStore::new());
//! let engine = PointsEngine::new(store, EngineConfig::default());
//!
//! let receipt = engine.earn(&ctx, earn_request).await?;
//! let balance = engine.available_balance(&ctx, customer_id, None).await?;
//! ```

pub mod allocation;
pub mod audit;
pub mod customer;
pub mod engine;
pub mod entry;
pub mod error;
pub mod lot;
pub mod memory;
pub mod ports;
pub mod redemption;
pub mod transaction;

pub use allocation::{plan, InsufficientPoints, LotDraw};
pub use audit::{verify, ConsistencyReport, ConsistencyViolation};
pub use customer::{Customer, NewCustomer};
pub use engine::{
    AdjustReceipt, AdjustRequest, AllocationLine, BalanceSummary, EarnPreview, EarnReceipt,
    EarnRequest, EngineConfig, HistoryQuery, PointsEngine, RedeemReceipt, RedeemRequest,
    ReversalReceipt,
};
pub use entry::{EntrySource, LedgerEntry};
pub use error::EngineError;
pub use lot::{EarnLot, ExpiringLot};
pub use memory::MemoryLedgerStore;
pub use ports::{
    AdjustmentRecord, EarnRecord, HistoryFilter, LedgerStore, LotQuery, LotScope, Page,
    PageRequest, RedemptionRecord, StoreError, SweepOutcome,
};
pub use redemption::{LotAllocation, Redemption};
pub use transaction::EarnTransaction;
