//! Point amounts with checked integer arithmetic
//!
//! This module provides a type-safe representation of loyalty points.
//! Points are whole numbers; fractional values never exist at the type
//! level because rounding happens once, at earning time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Neg, Sub};
use thiserror::Error;

/// Errors that can occur during point operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PointsError {
    #[error("Overflow during point calculation")]
    Overflow,

    #[error("Invalid point amount: {0}")]
    InvalidAmount(String),
}

/// A signed point amount
///
/// Ledger deltas are signed: earns are positive, redemptions and
/// expirations are negative. Balances are derived sums and are kept
/// non-negative by the allocation rules, not by this type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Points(i64);

impl Points {
    /// The zero amount
    pub const ZERO: Points = Points(0);

    /// Creates a new point amount
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw value
    pub fn value(&self) -> i64 {
        self.0
    }

    /// Returns true if the amount is zero
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Returns true if the amount is strictly positive
    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Returns true if the amount is strictly negative
    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value, saturating at `i64::MAX`
    pub fn abs(&self) -> Self {
        Self(self.0.saturating_abs())
    }

    /// Checked addition that returns an error on overflow
    pub fn checked_add(&self, other: Points) -> Result<Points, PointsError> {
        self.0
            .checked_add(other.0)
            .map(Points)
            .ok_or(PointsError::Overflow)
    }

    /// Checked subtraction that returns an error on overflow
    pub fn checked_sub(&self, other: Points) -> Result<Points, PointsError> {
        self.0
            .checked_sub(other.0)
            .map(Points)
            .ok_or(PointsError::Overflow)
    }

    /// Checked negation that returns an error on overflow
    pub fn checked_neg(&self) -> Result<Points, PointsError> {
        self.0.checked_neg().map(Points).ok_or(PointsError::Overflow)
    }

    /// Clamps negative amounts to zero
    pub fn clamp_floor_zero(&self) -> Self {
        Self(self.0.max(0))
    }

    /// Sums an iterator of amounts with overflow checking
    pub fn total<I>(amounts: I) -> Result<Points, PointsError>
    where
        I: IntoIterator<Item = Points>,
    {
        amounts
            .into_iter()
            .try_fold(Points::ZERO, |acc, p| acc.checked_add(p))
    }
}

impl fmt::Display for Points {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Points {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Points> for i64 {
    fn from(points: Points) -> i64 {
        points.0
    }
}

impl Add for Points {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        self.checked_add(other).expect("Overflow in Points::add")
    }
}

impl Sub for Points {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        self.checked_sub(other).expect("Overflow in Points::sub")
    }
}

impl Neg for Points {
    type Output = Self;

    fn neg(self) -> Self {
        self.checked_neg().expect("Overflow in Points::neg")
    }
}

impl Sum for Points {
    fn sum<I: Iterator<Item = Points>>(iter: I) -> Self {
        iter.fold(Points::ZERO, |acc, p| acc + p)
    }
}
