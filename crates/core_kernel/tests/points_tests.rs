//! Comprehensive unit tests for the Points module
//!
//! Tests cover point creation, checked arithmetic, clamping,
//! summation, and edge cases around i64 bounds.

use core_kernel::{Points, PointsError};

mod creation {
    use super::*;

    #[test]
    fn test_new_creates_points_with_correct_value() {
        let p = Points::new(1250);
        assert_eq!(p.value(), 1250);
    }

    #[test]
    fn test_zero_constant() {
        assert_eq!(Points::ZERO.value(), 0);
        assert!(Points::ZERO.is_zero());
    }

    #[test]
    fn test_default_is_zero() {
        assert_eq!(Points::default(), Points::ZERO);
    }

    #[test]
    fn test_from_i64_conversion() {
        let p: Points = 42i64.into();
        assert_eq!(p.value(), 42);
        let back: i64 = p.into();
        assert_eq!(back, 42);
    }
}

mod predicates {
    use super::*;

    #[test]
    fn test_is_positive_true_for_positive_value() {
        assert!(Points::new(1).is_positive());
    }

    #[test]
    fn test_is_positive_false_for_zero() {
        assert!(!Points::ZERO.is_positive());
    }

    #[test]
    fn test_is_negative_true_for_negative_value() {
        assert!(Points::new(-1).is_negative());
    }

    #[test]
    fn test_is_negative_false_for_zero() {
        assert!(!Points::ZERO.is_negative());
    }

    #[test]
    fn test_abs() {
        assert_eq!(Points::new(-12).abs(), Points::new(12));
        assert_eq!(Points::new(12).abs(), Points::new(12));
    }

    #[test]
    fn test_abs_saturates_at_i64_min() {
        assert_eq!(Points::new(i64::MIN).abs(), Points::new(i64::MAX));
    }
}

mod arithmetic {
    use super::*;

    #[test]
    fn test_checked_add() {
        let result = Points::new(100).checked_add(Points::new(50)).unwrap();
        assert_eq!(result, Points::new(150));
    }

    #[test]
    fn test_checked_add_overflow() {
        let result = Points::new(i64::MAX).checked_add(Points::new(1));
        assert_eq!(result, Err(PointsError::Overflow));
    }

    #[test]
    fn test_checked_sub() {
        let result = Points::new(100).checked_sub(Points::new(150)).unwrap();
        assert_eq!(result, Points::new(-50));
    }

    #[test]
    fn test_checked_sub_overflow() {
        let result = Points::new(i64::MIN).checked_sub(Points::new(1));
        assert_eq!(result, Err(PointsError::Overflow));
    }

    #[test]
    fn test_checked_neg() {
        assert_eq!(Points::new(7).checked_neg().unwrap(), Points::new(-7));
    }

    #[test]
    fn test_checked_neg_overflow() {
        assert_eq!(Points::new(i64::MIN).checked_neg(), Err(PointsError::Overflow));
    }

    #[test]
    fn test_operator_sugar() {
        let a = Points::new(30);
        let b = Points::new(12);

        assert_eq!(a + b, Points::new(42));
        assert_eq!(a - b, Points::new(18));
        assert_eq!(-a, Points::new(-30));
    }

    #[test]
    fn test_sum_of_iterator() {
        let total: Points = vec![Points::new(1), Points::new(2), Points::new(3)]
            .into_iter()
            .sum();
        assert_eq!(total, Points::new(6));
    }
}

mod clamping_and_totals {
    use super::*;

    #[test]
    fn test_clamp_floor_zero_on_negative() {
        assert_eq!(Points::new(-100).clamp_floor_zero(), Points::ZERO);
    }

    #[test]
    fn test_clamp_floor_zero_preserves_positive() {
        assert_eq!(Points::new(100).clamp_floor_zero(), Points::new(100));
    }

    #[test]
    fn test_total_of_mixed_signs() {
        let amounts = vec![Points::new(500), Points::new(-120), Points::new(-80)];
        assert_eq!(Points::total(amounts).unwrap(), Points::new(300));
    }

    #[test]
    fn test_total_of_empty_iterator_is_zero() {
        assert_eq!(Points::total(Vec::new()).unwrap(), Points::ZERO);
    }

    #[test]
    fn test_total_reports_overflow() {
        let amounts = vec![Points::new(i64::MAX), Points::new(i64::MAX)];
        assert_eq!(Points::total(amounts), Err(PointsError::Overflow));
    }
}

mod serialization {
    use super::*;

    #[test]
    fn test_points_serialize_as_bare_integer() {
        let p = Points::new(250);
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, "250");
    }

    #[test]
    fn test_points_round_trip() {
        let p = Points::new(-42);
        let json = serde_json::to_string(&p).unwrap();
        let back: Points = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
    }
}
