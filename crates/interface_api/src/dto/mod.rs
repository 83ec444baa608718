//! Request and response data transfer objects

pub mod customers;
pub mod ledger;
pub mod services;
