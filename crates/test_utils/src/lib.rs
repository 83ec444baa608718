//! Shared test utilities for the loyalty ledger workspace
//!
//! Everything the suites need to exercise the points engine lives here:
//! deterministic fixtures, builders that produce real domain inputs,
//! proptest generators, assertions over points and allocations, and a
//! containerized Postgres harness for store-level tests.
//!
//! Database-backed helpers need a running Docker daemon. The `db_test!`
//! macro marks its tests `#[ignore]` so a plain `cargo test` stays green
//! without one; run them with `cargo test -- --ignored`.

pub mod assertions;
pub mod builders;
pub mod database;
pub mod fixtures;
pub mod generators;

pub use assertions::*;
pub use builders::*;
pub use database::*;
pub use fixtures::*;
pub use generators::*;
