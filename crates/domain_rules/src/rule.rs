//! Earning rule definitions
//!
//! An earning rule says how many points a spend amount is worth for one
//! service during one validity window.

use chrono::{DateTime, NaiveDate, Utc};
use core_kernel::{OrgId, Points, RuleId, ServiceId, ValidityWindow};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::RuleError;

/// Rounding applied when a spend converts to a fractional point value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundingMode {
    /// Round toward negative infinity (the conservative default)
    #[default]
    Floor,
    /// Round half away from zero (2.5 becomes 3)
    Round,
    /// Round toward positive infinity
    Ceil,
}

impl RoundingMode {
    /// Returns the wire representation of the mode
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundingMode::Floor => "FLOOR",
            RoundingMode::Round => "ROUND",
            RoundingMode::Ceil => "CEIL",
        }
    }
}

impl std::fmt::Display for RoundingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An earning rule: "spend `spend_amount` on this service, earn
/// `earn_points` points"
///
/// Fractional results round per `rounding`. Spends under `min_spend`
/// earn nothing. The rule applies to transactions whose org-local date
/// falls inside `validity`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarningRule {
    /// Unique identifier
    pub id: RuleId,
    /// Owning organization
    pub org_id: OrgId,
    /// Service this rule prices
    pub service_id: ServiceId,
    /// Spend denominator, in the org's currency
    pub spend_amount: Decimal,
    /// Points numerator
    pub earn_points: Points,
    /// How fractional point values are rounded
    pub rounding: RoundingMode,
    /// Spends strictly below this earn zero points
    pub min_spend: Option<Decimal>,
    /// Half-open date window in the org's local calendar
    pub validity: ValidityWindow,
    /// When the rule was created (tie-breaker for same-day validity starts)
    pub created_at: DateTime<Utc>,
}

/// Input for creating a new earning rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEarningRule {
    pub service_id: ServiceId,
    pub spend_amount: Decimal,
    pub earn_points: Points,
    pub rounding: RoundingMode,
    pub min_spend: Option<Decimal>,
    pub valid_from: NaiveDate,
    pub valid_to: Option<NaiveDate>,
}

impl EarningRule {
    /// Creates a rule from input, validating its configuration
    ///
    /// # Errors
    ///
    /// Returns `RuleError::InvalidRule` when `spend_amount` is not
    /// positive, `earn_points` is negative, `min_spend` is not positive,
    /// or the validity dates are inverted.
    pub fn create(org_id: OrgId, new: NewEarningRule) -> Result<Self, RuleError> {
        if new.spend_amount <= Decimal::ZERO {
            return Err(RuleError::InvalidRule(format!(
                "spend_amount must be positive, got {}",
                new.spend_amount
            )));
        }
        if new.earn_points.is_negative() {
            return Err(RuleError::InvalidRule(format!(
                "earn_points must not be negative, got {}",
                new.earn_points
            )));
        }
        if let Some(min_spend) = new.min_spend {
            if min_spend <= Decimal::ZERO {
                return Err(RuleError::InvalidRule(format!(
                    "min_spend must be positive, got {min_spend}"
                )));
            }
        }
        let validity = ValidityWindow::new(new.valid_from, new.valid_to)
            .map_err(|e| RuleError::InvalidRule(e.to_string()))?;

        Ok(Self {
            id: RuleId::new_v7(),
            org_id,
            service_id: new.service_id,
            spend_amount: new.spend_amount,
            earn_points: new.earn_points,
            rounding: new.rounding,
            min_spend: new.min_spend,
            validity,
            created_at: Utc::now(),
        })
    }

    /// Returns true if this rule applies on the given org-local date
    pub fn applies_on(&self, date: NaiveDate) -> bool {
        self.validity.contains(date)
    }

    /// Returns true if the spend clears the rule's minimum
    pub fn meets_min_spend(&self, spend: Decimal) -> bool {
        self.min_spend.map_or(true, |min| spend >= min)
    }
}
