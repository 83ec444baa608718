//! Rules Domain - Earning Rules and Point Calculation
//!
//! This crate owns the configuration side of the loyalty program: which
//! services exist, which earning rule applies on a given date, and how a
//! spend amount converts into whole points.
//!
//! # Rule Resolution
//!
//! A service can accumulate many rules over time. Validity windows are
//! half-open date ranges in the org's local calendar, and exactly one
//! rule wins per date:
//! - Only rules whose window contains the date are candidates
//! - Among candidates the latest `valid_from` wins
//! - Ties on `valid_from` fall back to the most recently created rule
//!
//! # Point Calculation
//!
//! Points are earned in proportion to spend: `spend / rule_spend *
//! rule_earn`, rounded to a whole number by the rule's rounding mode and
//! clamped to zero from below. Rules may set a minimum spend under which
//! a transaction earns nothing.
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_rules::{calculator, resolver};
//!
//! let resolution = resolver::resolve_rule(&rules, on_date)?;
//! let points = calculator::points_for_rule(&resolution.rule, spend)?;
//! ```

pub mod calculator;
pub mod error;
pub mod resolver;
pub mod rule;
pub mod service;

pub use calculator::{calculate_points, points_for_rule};
pub use error::RuleError;
pub use resolver::{resolve_rule, validate_no_overlap, Resolution};
pub use rule::{EarningRule, NewEarningRule, RoundingMode};
pub use service::{NewService, Service, ServiceCategory};
