//! Custom Test Assertions
//!
//! Provides specialized assertion helpers for domain types that give
//! more meaningful error messages than standard assertions.

use chrono::NaiveDate;
use core_kernel::{Points, ValidityWindow};
use domain_ledger::{AllocationLine, ConsistencyReport};

/// Asserts that a point amount equals a raw value
///
/// # Panics
///
/// Panics with both values when they differ
pub fn assert_points_eq(actual: Points, expected: i64) {
    assert_eq!(
        actual.value(),
        expected,
        "Point amounts differ: actual={}, expected={}",
        actual,
        expected
    );
}

/// Asserts that a point amount is strictly positive
pub fn assert_points_positive(points: Points) {
    assert!(
        points.is_positive(),
        "Expected positive points, got {}",
        points
    );
}

/// Asserts that a point amount is zero
pub fn assert_points_zero(points: Points) {
    assert!(points.is_zero(), "Expected zero points, got {}", points);
}

/// Asserts that a point amount is strictly negative
pub fn assert_points_negative(points: Points) {
    assert!(
        points.is_negative(),
        "Expected negative points, got {}",
        points
    );
}

/// Asserts that point amounts sum to a total
///
/// # Panics
///
/// Panics if the sum overflows or doesn't equal the total
pub fn assert_points_sum_equals(parts: &[Points], total: Points) {
    let sum = Points::total(parts.iter().copied()).expect("Overflow while summing parts");
    assert_eq!(
        sum, total,
        "Sum of parts ({}) doesn't equal total ({})",
        sum, total
    );
}

/// Asserts that a ValidityWindow contains a specific local date
pub fn assert_window_contains(window: &ValidityWindow, date: NaiveDate) {
    assert!(
        window.contains(date),
        "Window {:?} does not contain date {}",
        window,
        date
    );
}

/// Asserts that a ValidityWindow does not contain a specific local date
pub fn assert_window_excludes(window: &ValidityWindow, date: NaiveDate) {
    assert!(
        !window.contains(date),
        "Window {:?} unexpectedly contains date {}",
        window,
        date
    );
}

/// Asserts that two ValidityWindows overlap
pub fn assert_windows_overlap(window1: &ValidityWindow, window2: &ValidityWindow) {
    assert!(
        window1.overlaps(window2),
        "Windows {:?} and {:?} do not overlap",
        window1,
        window2
    );
}

/// Asserts that two ValidityWindows do not overlap
pub fn assert_windows_disjoint(window1: &ValidityWindow, window2: &ValidityWindow) {
    assert!(
        !window1.overlaps(window2),
        "Windows {:?} and {:?} unexpectedly overlap",
        window1,
        window2
    );
}

/// Asserts that allocation lines exactly cover a consumed total
///
/// Every line must draw a positive amount, and the draws must sum to
/// the total.
///
/// # Panics
///
/// Panics if any line is non-positive or the sum doesn't match
pub fn assert_allocations_cover(allocations: &[AllocationLine], total: Points) {
    for line in allocations {
        assert!(
            line.points_used.is_positive(),
            "Allocation against lot {} draws a non-positive amount: {}",
            line.earn_entry_id,
            line.points_used
        );
    }

    let covered = Points::total(allocations.iter().map(|line| line.points_used))
        .expect("Overflow while summing allocations");
    assert_eq!(
        covered, total,
        "Allocations cover {} points but the consumption was {}",
        covered, total
    );
}

/// Asserts that a consistency report found no violations
///
/// # Panics
///
/// Panics listing every violation when the report is dirty
pub fn assert_ledger_clean(report: &ConsistencyReport) {
    assert!(
        report.is_clean(),
        "Ledger failed consistency check with {} violation(s): {:#?}",
        report.violations.len(),
        report.violations
    );
}

/// Asserts that a result is Ok and returns the value
#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("{}: {:?}", $msg, e),
        }
    };
}

/// Asserts that a result is Err and returns the error
#[macro_export]
macro_rules! assert_err {
    ($result:expr) => {
        match $result {
            Ok(value) => panic!("Expected Err, got Ok: {:?}", value),
            Err(e) => e,
        }
    };
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(value) => panic!("{}: got Ok({:?})", $msg, value),
            Err(e) => e,
        }
    };
}

/// Asserts that an error matches a specific variant
#[macro_export]
macro_rules! assert_err_variant {
    ($result:expr, $pattern:pat) => {
        match $result {
            Ok(value) => panic!("Expected Err matching {}, got Ok({:?})", stringify!($pattern), value),
            Err(ref e) => {
                assert!(
                    matches!(e, $pattern),
                    "Error {:?} does not match pattern {}",
                    e,
                    stringify!($pattern)
                );
            }
        }
    };
}
