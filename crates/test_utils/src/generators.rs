//! Property-Based Test Generators
//!
//! Provides proptest strategies for generating random test data
//! that maintains domain invariants.

use chrono::{Duration, NaiveDate};
use core_kernel::{CustomerId, OrgId, Points, ServiceId};
use domain_rules::{NewEarningRule, RoundingMode, ServiceCategory};
use proptest::prelude::*;
use rust_decimal::Decimal;

/// Strategy for generating spend amounts in cents (0.01 to 100,000.00)
pub fn spend_cents_strategy() -> impl Strategy<Value = i64> {
    1i64..10_000_000i64
}

/// Strategy for generating positive spend amounts with two decimal places
pub fn spend_amount_strategy() -> impl Strategy<Value = Decimal> {
    spend_cents_strategy().prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy for generating signed point amounts
pub fn points_strategy() -> impl Strategy<Value = Points> {
    (-1_000_000i64..1_000_000i64).prop_map(Points::new)
}

/// Strategy for generating strictly positive point amounts
pub fn positive_points_strategy() -> impl Strategy<Value = Points> {
    (1i64..1_000_000i64).prop_map(Points::new)
}

/// Strategy for generating rounding modes
pub fn rounding_mode_strategy() -> impl Strategy<Value = RoundingMode> {
    prop_oneof![
        Just(RoundingMode::Floor),
        Just(RoundingMode::Round),
        Just(RoundingMode::Ceil),
    ]
}

/// Strategy for generating service categories
pub fn service_category_strategy() -> impl Strategy<Value = ServiceCategory> {
    prop_oneof![
        Just(ServiceCategory::Hotel),
        Just(ServiceCategory::Restaurant),
        Just(ServiceCategory::Cafe),
        Just(ServiceCategory::Retail),
        Just(ServiceCategory::Other),
    ]
}

/// Strategy for generating local calendar dates within 2024
pub fn local_date_2024_strategy() -> impl Strategy<Value = NaiveDate> {
    (0i64..365i64).prop_map(|days| {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(days)
    })
}

/// Strategy for generating ordered validity bounds (open-ended half the time)
pub fn date_window_strategy() -> impl Strategy<Value = (NaiveDate, Option<NaiveDate>)> {
    (local_date_2024_strategy(), proptest::option::of(1i64..365i64))
        .prop_map(|(from, span)| (from, span.map(|days| from + Duration::days(days))))
}

/// Strategy for generating earning rule input that passes domain validation
pub fn rule_strategy(service_id: ServiceId) -> impl Strategy<Value = NewEarningRule> {
    (
        1i64..10_000i64,
        1i64..100i64,
        rounding_mode_strategy(),
        proptest::option::of(50i64..500i64),
        date_window_strategy(),
    )
        .prop_map(move |(spend, earn, rounding, min_spend, (from, to))| NewEarningRule {
            service_id,
            spend_amount: Decimal::new(spend, 0),
            earn_points: Points::new(earn),
            rounding,
            min_spend: min_spend.map(|m| Decimal::new(m, 0)),
            valid_from: from,
            valid_to: to,
        })
}

/// Strategy for generating OrgId
pub fn org_id_strategy() -> impl Strategy<Value = OrgId> {
    any::<[u8; 16]>().prop_map(|bytes| OrgId::from_uuid(uuid::Uuid::from_bytes(bytes)))
}

/// Strategy for generating CustomerId
pub fn customer_id_strategy() -> impl Strategy<Value = CustomerId> {
    any::<[u8; 16]>().prop_map(|bytes| CustomerId::from_uuid(uuid::Uuid::from_bytes(bytes)))
}

/// Strategy for generating ServiceId
pub fn service_id_strategy() -> impl Strategy<Value = ServiceId> {
    any::<[u8; 16]>().prop_map(|bytes| ServiceId::from_uuid(uuid::Uuid::from_bytes(bytes)))
}

/// Strategy for generating customer codes
pub fn customer_code_strategy() -> impl Strategy<Value = String> {
    "M-[0-9]{6}".prop_map(|s| s)
}

/// Strategy for generating point-of-sale references
pub fn reference_no_strategy() -> impl Strategy<Value = String> {
    "POS-[0-9]{8}".prop_map(|s| s)
}

/// One step in a randomized ledger workload
///
/// Steps may lose to business rules at runtime (overdrawn redemptions,
/// debits past the balance); workload runners should skip those and keep
/// going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerOp {
    /// Record a spend of this many cents
    Earn { spend_cents: i64 },
    /// Redeem this many points
    Redeem { points: i64 },
    /// Manually adjust by this signed, non-zero delta
    Adjust { delta: i64 },
}

/// Strategy for generating a single workload step, weighted toward earns
pub fn ledger_op_strategy() -> impl Strategy<Value = LedgerOp> {
    prop_oneof![
        3 => (100i64..5_000_000i64).prop_map(|spend_cents| LedgerOp::Earn { spend_cents }),
        2 => (1i64..500i64).prop_map(|points| LedgerOp::Redeem { points }),
        1 => (-100i64..200i64)
            .prop_filter("adjustment deltas must be non-zero", |delta| *delta != 0)
            .prop_map(|delta| LedgerOp::Adjust { delta }),
    ]
}

/// Strategy for generating a workload of 1 to `max_len` steps
pub fn ledger_workload_strategy(max_len: usize) -> impl Strategy<Value = Vec<LedgerOp>> {
    proptest::collection::vec(ledger_op_strategy(), 1..=max_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain_rules::EarningRule;

    proptest! {
        #[test]
        fn spend_amounts_are_positive_cents(amount in spend_amount_strategy()) {
            prop_assert!(amount > Decimal::ZERO);
            prop_assert!(amount.scale() <= 2);
        }

        #[test]
        fn positive_points_are_positive(points in positive_points_strategy()) {
            prop_assert!(points.is_positive());
        }

        #[test]
        fn date_windows_are_ordered((from, to) in date_window_strategy()) {
            if let Some(to) = to {
                prop_assert!(to > from);
            }
        }

        #[test]
        fn generated_rules_pass_domain_validation(
            new in rule_strategy(ServiceId::from_uuid(uuid::Uuid::nil()))
        ) {
            prop_assert!(EarningRule::create(OrgId::new(), new).is_ok());
        }

        #[test]
        fn workloads_are_never_empty(ops in ledger_workload_strategy(12)) {
            prop_assert!(!ops.is_empty());
            for op in ops {
                if let LedgerOp::Adjust { delta } = op {
                    prop_assert!(delta != 0);
                }
            }
        }
    }
}
