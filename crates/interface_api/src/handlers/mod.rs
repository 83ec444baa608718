//! Request handlers

pub mod customers;
pub mod health;
pub mod ledger;
pub mod services;
