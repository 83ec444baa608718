//! Infrastructure Database Layer
//!
//! This crate provides the PostgreSQL backing for the loyalty ledger,
//! implementing the `LedgerStore` port with SQLx.
//!
//! # Architecture
//!
//! The schema mirrors the domain's append-only model: `point_ledger` and
//! `lot_allocations` are insert-only, and balances are derived sums.
//! Consuming commands take row locks on the candidate lots before
//! planning draws, so concurrent consumption cannot overspend a lot.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, PostgresLedgerStore};
//!
//! let pool = create_pool(config).await?;
//! run_migrations(&pool).await?;
//! let store = PostgresLedgerStore::new(pool);
//! ```

pub mod error;
pub mod pool;
pub mod store;

pub use error::DatabaseError;
pub use pool::{create_pool, create_pool_from_url, run_migrations, DatabaseConfig, DatabasePool};
pub use store::PostgresLedgerStore;
