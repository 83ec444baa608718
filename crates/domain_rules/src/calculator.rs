//! Point calculation from spend amounts
//!
//! Converts a decimal spend into a whole point amount using a rule's
//! ratio and rounding mode. Rounding happens exactly once, here; every
//! later stage of the ledger works in whole points.

use core_kernel::Points;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::RuleError;
use crate::rule::{EarningRule, RoundingMode};

/// Calculates points for a spend under the given ratio and rounding
///
/// The raw value is `spend * rule_earn / rule_spend`, rounded to a whole
/// number and clamped to zero from below. Multiplying before dividing
/// keeps exact ratios exact (a 3-for-3 rule on a spend of 1 yields 1,
/// not 0.999... floored to 0).
///
/// # Errors
///
/// Returns `RuleError::InvalidRule` when `rule_spend` is not positive
/// and `RuleError::Overflow` when the result leaves the representable
/// range.
pub fn calculate_points(
    spend: Decimal,
    rule_spend: Decimal,
    rule_earn: Points,
    rounding: RoundingMode,
) -> Result<Points, RuleError> {
    if rule_spend <= Decimal::ZERO {
        return Err(RuleError::InvalidRule(format!(
            "rule spend_amount must be positive, got {rule_spend}"
        )));
    }

    let scaled = spend
        .checked_mul(Decimal::from(rule_earn.value()))
        .ok_or(RuleError::Overflow)?;
    let raw = scaled.checked_div(rule_spend).ok_or(RuleError::Overflow)?;

    let rounded = match rounding {
        RoundingMode::Floor => raw.floor(),
        RoundingMode::Round => {
            raw.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        }
        RoundingMode::Ceil => raw.ceil(),
    };

    let points = rounded.to_i64().ok_or(RuleError::Overflow)?;
    Ok(Points::new(points).clamp_floor_zero())
}

/// Calculates what a spend earns under a specific rule
///
/// Spends below the rule's minimum earn zero points. The transaction is
/// still recorded by callers; only the amount is zero.
pub fn points_for_rule(rule: &EarningRule, spend: Decimal) -> Result<Points, RuleError> {
    if !rule.meets_min_spend(spend) {
        return Ok(Points::ZERO);
    }
    calculate_points(spend, rule.spend_amount, rule.earn_points, rule.rounding)
}
