//! Comprehensive tests for domain_rules

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{OrgId, Points, ServiceId};

use domain_rules::calculator::{calculate_points, points_for_rule};
use domain_rules::error::RuleError;
use domain_rules::resolver::{resolve_rule, validate_no_overlap};
use domain_rules::rule::{EarningRule, NewEarningRule, RoundingMode};
use domain_rules::service::{NewService, Service, ServiceCategory};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn new_rule(service_id: ServiceId) -> NewEarningRule {
    NewEarningRule {
        service_id,
        spend_amount: dec!(100),
        earn_points: Points::new(1),
        rounding: RoundingMode::Floor,
        min_spend: None,
        valid_from: date(2024, 1, 1),
        valid_to: None,
    }
}

// ============================================================================
// Service Tests
// ============================================================================

mod service_tests {
    use super::*;

    #[test]
    fn test_service_creation() {
        let org = OrgId::new();
        let service =
            Service::create(org, NewService::new("Morning Brew Cafe", ServiceCategory::Cafe))
                .unwrap();

        assert_eq!(service.org_id, org);
        assert_eq!(service.name, "Morning Brew Cafe");
        assert!(service.is_active);
    }

    #[test]
    fn test_service_deactivation() {
        let mut service = Service::create(
            OrgId::new(),
            NewService::new("Old Annex Restaurant", ServiceCategory::Restaurant),
        )
        .unwrap();

        service.deactivate();
        assert!(!service.is_active);
    }

    #[test]
    fn test_blank_service_name_rejected() {
        let result = Service::create(OrgId::new(), NewService::new("", ServiceCategory::Hotel));
        assert!(matches!(result, Err(RuleError::InvalidRule(_))));
    }

    #[test]
    fn test_all_categories_serialize() {
        let categories = vec![
            ServiceCategory::Hotel,
            ServiceCategory::Restaurant,
            ServiceCategory::Cafe,
            ServiceCategory::Retail,
            ServiceCategory::Other,
        ];

        for category in categories {
            let json = serde_json::to_string(&category).unwrap();
            let back: ServiceCategory = serde_json::from_str(&json).unwrap();
            assert_eq!(category, back);
        }
    }
}

// ============================================================================
// Rule Validation Tests
// ============================================================================

mod rule_validation_tests {
    use super::*;

    #[test]
    fn test_valid_rule_creation() {
        let rule = EarningRule::create(OrgId::new(), new_rule(ServiceId::new())).unwrap();

        assert_eq!(rule.spend_amount, dec!(100));
        assert_eq!(rule.earn_points, Points::new(1));
        assert_eq!(rule.rounding, RoundingMode::Floor);
    }

    #[test]
    fn test_negative_spend_amount_rejected() {
        let mut new = new_rule(ServiceId::new());
        new.spend_amount = dec!(-10);

        assert!(matches!(
            EarningRule::create(OrgId::new(), new),
            Err(RuleError::InvalidRule(_))
        ));
    }

    #[test]
    fn test_zero_min_spend_rejected() {
        let mut new = new_rule(ServiceId::new());
        new.min_spend = Some(Decimal::ZERO);

        assert!(matches!(
            EarningRule::create(OrgId::new(), new),
            Err(RuleError::InvalidRule(_))
        ));
    }

    #[test]
    fn test_zero_earn_points_allowed() {
        // A promotional pause: the service earns nothing but stays configured
        let mut new = new_rule(ServiceId::new());
        new.earn_points = Points::ZERO;

        let rule = EarningRule::create(OrgId::new(), new).unwrap();
        assert_eq!(points_for_rule(&rule, dec!(10_000)).unwrap(), Points::ZERO);
    }
}

// ============================================================================
// Calculation Tests
// ============================================================================

mod calculation_tests {
    use super::*;

    #[test]
    fn test_rounding_matrix_on_midpoint() {
        // 250 spend at 100-per-1 gives a raw value of 2.5
        let cases = [
            (RoundingMode::Floor, 2),
            (RoundingMode::Round, 3),
            (RoundingMode::Ceil, 3),
        ];

        for (mode, expected) in cases {
            let points = calculate_points(dec!(250), dec!(100), Points::new(1), mode).unwrap();
            assert_eq!(points, Points::new(expected), "mode {mode}");
        }
    }

    #[test]
    fn test_large_spend() {
        let points =
            calculate_points(dec!(5000), dec!(100), Points::new(1), RoundingMode::Floor).unwrap();
        assert_eq!(points, Points::new(50));
    }

    #[test]
    fn test_high_ratio_rule() {
        // 10 points per 1 spent
        let points =
            calculate_points(dec!(7.30), dec!(1), Points::new(10), RoundingMode::Floor).unwrap();
        assert_eq!(points, Points::new(73));
    }

    #[test]
    fn test_min_spend_produces_zero_not_error() {
        let mut new = new_rule(ServiceId::new());
        new.min_spend = Some(dec!(10));
        let rule = EarningRule::create(OrgId::new(), new).unwrap();

        assert_eq!(points_for_rule(&rule, dec!(8)).unwrap(), Points::ZERO);
    }
}

// ============================================================================
// Resolution Tests
// ============================================================================

mod resolution_tests {
    use super::*;

    #[test]
    fn test_successive_windows_resolve_by_date() {
        let service = ServiceId::new();

        let mut january = new_rule(service);
        january.valid_to = Some(date(2024, 2, 1));
        let january = EarningRule::create(OrgId::new(), january).unwrap();

        let mut february = new_rule(service);
        february.valid_from = date(2024, 2, 1);
        february.earn_points = Points::new(2);
        let february = EarningRule::create(OrgId::new(), february).unwrap();

        let rules = vec![january.clone(), february.clone()];

        let in_january = resolve_rule(service, &rules, date(2024, 1, 31)).unwrap();
        assert_eq!(in_january.rule.id, january.id);

        let in_february = resolve_rule(service, &rules, date(2024, 2, 1)).unwrap();
        assert_eq!(in_february.rule.id, february.id);
    }

    #[test]
    fn test_resolution_reports_shadowed_rules() {
        let service = ServiceId::new();
        let older = EarningRule::create(OrgId::new(), new_rule(service)).unwrap();

        let mut newer = new_rule(service);
        newer.valid_from = date(2024, 6, 1);
        let newer = EarningRule::create(OrgId::new(), newer).unwrap();

        let resolution =
            resolve_rule(service, &[older.clone(), newer.clone()], date(2024, 7, 1)).unwrap();

        assert_eq!(resolution.rule.id, newer.id);
        assert_eq!(resolution.shadowed, vec![older.id]);
    }

    #[test]
    fn test_overlap_rejected_at_creation() {
        let service = ServiceId::new();
        let existing = EarningRule::create(OrgId::new(), new_rule(service)).unwrap();

        let mut candidate = new_rule(service);
        candidate.valid_from = date(2024, 6, 1);
        let candidate = EarningRule::create(OrgId::new(), candidate).unwrap();

        let result = validate_no_overlap(std::slice::from_ref(&existing), &candidate);
        assert_eq!(
            result,
            Err(RuleError::OverlappingValidity {
                existing: existing.id
            })
        );
    }

    #[test]
    fn test_closing_a_rule_then_opening_next_is_clean() {
        let service = ServiceId::new();

        let mut closed = new_rule(service);
        closed.valid_to = Some(date(2024, 6, 1));
        let closed = EarningRule::create(OrgId::new(), closed).unwrap();

        let mut next = new_rule(service);
        next.valid_from = date(2024, 6, 1);
        let next = EarningRule::create(OrgId::new(), next).unwrap();

        assert!(validate_no_overlap(std::slice::from_ref(&closed), &next).is_ok());

        // No date resolves to both
        let rules = vec![closed.clone(), next.clone()];
        let last_day = resolve_rule(service, &rules, date(2024, 5, 31)).unwrap();
        let first_day = resolve_rule(service, &rules, date(2024, 6, 1)).unwrap();

        assert_eq!(last_day.rule.id, closed.id);
        assert!(last_day.shadowed.is_empty());
        assert_eq!(first_day.rule.id, next.id);
        assert!(first_day.shadowed.is_empty());
    }
}
