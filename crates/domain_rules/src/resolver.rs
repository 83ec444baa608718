//! Rule resolution over validity windows
//!
//! Given every rule attached to a service, picks the single rule that
//! applies on a date. Overlap rejection at creation time makes real
//! overlaps unlikely, but legacy data may contain them, so resolution
//! still has a deterministic tie-break.

use chrono::NaiveDate;
use core_kernel::{RuleId, ServiceId};
use tracing::warn;

use crate::error::RuleError;
use crate::rule::EarningRule;

/// Outcome of resolving which rule applies on a date
#[derive(Debug, Clone)]
pub struct Resolution {
    /// The winning rule
    pub rule: EarningRule,
    /// Rules that also matched the date but lost the tie-break
    pub shadowed: Vec<RuleId>,
}

/// Resolves the rule that applies to a service on a date
///
/// Among rules whose validity window contains the date, the one with
/// the latest `valid_from` wins; ties fall back to the most recently
/// created rule. Shadowed matches are reported and logged so operators
/// can repair overlapping configuration.
///
/// # Errors
///
/// Returns `RuleError::NoApplicableRule` when no window contains the
/// date.
pub fn resolve_rule(
    service_id: ServiceId,
    rules: &[EarningRule],
    on: NaiveDate,
) -> Result<Resolution, RuleError> {
    let mut candidates: Vec<&EarningRule> =
        rules.iter().filter(|rule| rule.applies_on(on)).collect();

    if candidates.is_empty() {
        return Err(RuleError::NoApplicableRule { service_id, on });
    }

    candidates.sort_by(|a, b| {
        b.validity
            .from
            .cmp(&a.validity.from)
            .then(b.created_at.cmp(&a.created_at))
    });

    let winner = candidates[0].clone();
    let shadowed: Vec<RuleId> = candidates[1..].iter().map(|rule| rule.id).collect();

    if !shadowed.is_empty() {
        warn!(
            service_id = %service_id,
            date = %on,
            winner = %winner.id,
            shadowed = ?shadowed,
            "multiple earning rules match the same date"
        );
    }

    Ok(Resolution {
        rule: winner,
        shadowed,
    })
}

/// Rejects a candidate rule whose validity window collides with an
/// existing rule for the same service
///
/// # Errors
///
/// Returns `RuleError::OverlappingValidity` naming the first existing
/// rule that overlaps.
pub fn validate_no_overlap(
    existing: &[EarningRule],
    candidate: &EarningRule,
) -> Result<(), RuleError> {
    for rule in existing {
        if rule.service_id == candidate.service_id
            && rule.id != candidate.id
            && rule.validity.overlaps(&candidate.validity)
        {
            return Err(RuleError::OverlappingValidity { existing: rule.id });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{NewEarningRule, RoundingMode};
    use core_kernel::{OrgId, Points};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn rule_for(
        service_id: ServiceId,
        valid_from: NaiveDate,
        valid_to: Option<NaiveDate>,
    ) -> EarningRule {
        EarningRule::create(
            OrgId::new(),
            NewEarningRule {
                service_id,
                spend_amount: dec!(100),
                earn_points: Points::new(1),
                rounding: RoundingMode::Floor,
                min_spend: None,
                valid_from,
                valid_to,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_single_matching_rule_wins() {
        let service = ServiceId::new();
        let rules = vec![rule_for(service, date(2024, 1, 1), None)];

        let resolution = resolve_rule(service, &rules, date(2024, 6, 1)).unwrap();
        assert_eq!(resolution.rule.id, rules[0].id);
        assert!(resolution.shadowed.is_empty());
    }

    #[test]
    fn test_no_rule_for_date() {
        let service = ServiceId::new();
        let rules = vec![rule_for(service, date(2024, 1, 1), Some(date(2024, 2, 1)))];

        let result = resolve_rule(service, &rules, date(2024, 2, 1));
        assert!(matches!(result, Err(RuleError::NoApplicableRule { .. })));
    }

    #[test]
    fn test_no_rules_at_all() {
        let service = ServiceId::new();
        let result = resolve_rule(service, &[], date(2024, 2, 1));

        assert!(matches!(
            result,
            Err(RuleError::NoApplicableRule { service_id, .. }) if service_id == service
        ));
    }

    #[test]
    fn test_latest_valid_from_wins_among_overlaps() {
        let service = ServiceId::new();
        let old = rule_for(service, date(2024, 1, 1), None);
        let newer = rule_for(service, date(2024, 3, 1), None);
        let rules = vec![old.clone(), newer.clone()];

        let resolution = resolve_rule(service, &rules, date(2024, 6, 1)).unwrap();
        assert_eq!(resolution.rule.id, newer.id);
        assert_eq!(resolution.shadowed, vec![old.id]);
    }

    #[test]
    fn test_date_before_newer_rule_selects_older() {
        let service = ServiceId::new();
        let old = rule_for(service, date(2024, 1, 1), None);
        let newer = rule_for(service, date(2024, 3, 1), None);
        let rules = vec![old.clone(), newer];

        let resolution = resolve_rule(service, &rules, date(2024, 2, 15)).unwrap();
        assert_eq!(resolution.rule.id, old.id);
    }

    #[test]
    fn test_same_valid_from_prefers_most_recently_created() {
        let service = ServiceId::new();
        let first = rule_for(service, date(2024, 1, 1), None);
        let second = rule_for(service, date(2024, 1, 1), None);
        let rules = vec![first, second.clone()];

        let resolution = resolve_rule(service, &rules, date(2024, 6, 1)).unwrap();
        assert_eq!(resolution.rule.id, second.id);
    }

    #[test]
    fn test_overlap_validation_rejects_collision() {
        let service = ServiceId::new();
        let existing = rule_for(service, date(2024, 1, 1), Some(date(2024, 6, 1)));
        let candidate = rule_for(service, date(2024, 5, 1), None);

        let result = validate_no_overlap(&[existing.clone()], &candidate);
        assert_eq!(
            result,
            Err(RuleError::OverlappingValidity {
                existing: existing.id
            })
        );
    }

    #[test]
    fn test_overlap_validation_allows_adjacent_windows() {
        let service = ServiceId::new();
        let existing = rule_for(service, date(2024, 1, 1), Some(date(2024, 6, 1)));
        let candidate = rule_for(service, date(2024, 6, 1), None);

        assert!(validate_no_overlap(&[existing], &candidate).is_ok());
    }

    #[test]
    fn test_overlap_validation_ignores_other_services() {
        let existing = rule_for(ServiceId::new(), date(2024, 1, 1), None);
        let candidate = rule_for(ServiceId::new(), date(2024, 1, 1), None);

        assert!(validate_no_overlap(&[existing], &candidate).is_ok());
    }
}
