//! Pre-built Test Fixtures
//!
//! Provides ready-to-use test data for common entities across the loyalty
//! system. These fixtures are designed to be consistent and predictable
//! for unit tests.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use core_kernel::{
    ActorId, CustomerId, OrgId, OrgTimezone, Points, RequestContext, RuleId, ServiceId,
    ValidityWindow,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

/// Fixture for spend amounts fed into earning rules
pub struct SpendFixtures;

impl SpendFixtures {
    /// Exactly one standard point under the 100:1 rule
    pub fn spend_100() -> Decimal {
        dec!(100.00)
    }

    /// The walkthrough spend: 50 points under the 100:1 rule
    pub fn spend_5000() -> Decimal {
        dec!(5000.00)
    }

    /// A spend that leaves a fractional point value (2.495 under 100:1)
    pub fn fractional_spend() -> Decimal {
        dec!(249.50)
    }

    /// A spend below the standard minimum of 50
    pub fn below_min_spend() -> Decimal {
        dec!(30.00)
    }

    /// The smallest representable spend
    pub fn smallest_spend() -> Decimal {
        dec!(0.01)
    }
}

/// Fixture for point amounts
pub struct PointsFixtures;

impl PointsFixtures {
    /// What the walkthrough spend earns under the standard rule
    pub fn standard_earn() -> Points {
        Points::new(50)
    }

    /// A small redemption that fits inside one lot
    pub fn small_redemption() -> Points {
        Points::new(10)
    }

    /// A manual credit for service-recovery scenarios
    pub fn goodwill_credit() -> Points {
        Points::new(25)
    }

    /// A manual debit for clawback scenarios
    pub fn clawback() -> Points {
        Points::new(-5)
    }
}

/// Fixture for temporal test data
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// Standard rule window start (Jan 1, 2024)
    pub fn window_from() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    /// Standard rule window end, exclusive (Jan 1, 2025)
    pub fn window_to() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
    }

    /// A date inside the standard window
    pub fn in_window() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    /// A date before the standard window opens
    pub fn before_window() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 12, 15).unwrap()
    }

    /// A date after the standard window closes
    pub fn after_window() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 2, 1).unwrap()
    }

    /// Mid-window instant for earn transactions
    pub fn anchor() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    /// The standard bounded validity window for 2024
    pub fn standard_window() -> ValidityWindow {
        ValidityWindow::bounded(Self::window_from(), Self::window_to()).unwrap()
    }

    /// An open-ended window starting where the standard one does
    pub fn open_window() -> ValidityWindow {
        ValidityWindow::open_from(Self::window_from())
    }

    /// Standard birth date for test customers
    pub fn birth_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(1989, 5, 15).unwrap()
    }

    /// The business calendar most org fixtures run on (UTC+7, no DST)
    pub fn bangkok() -> OrgTimezone {
        OrgTimezone::new(Tz::Asia__Bangkok)
    }

    /// A UTC business calendar for timezone-neutral tests
    pub fn utc() -> OrgTimezone {
        OrgTimezone::default()
    }
}

/// Fixture for identifier test data
pub struct IdFixtures;

impl IdFixtures {
    /// Creates a deterministic org ID for testing
    pub fn org_id() -> OrgId {
        OrgId::from_uuid(Uuid::parse_str("550e8400-e29b-41d4-a716-446655440001").unwrap())
    }

    /// Creates a deterministic actor ID for testing
    pub fn actor_id() -> ActorId {
        ActorId::from_uuid(Uuid::parse_str("550e8400-e29b-41d4-a716-446655440002").unwrap())
    }

    /// Creates a deterministic customer ID for testing
    pub fn customer_id() -> CustomerId {
        CustomerId::from_uuid(Uuid::parse_str("550e8400-e29b-41d4-a716-446655440003").unwrap())
    }

    /// Creates a deterministic service ID for testing
    pub fn service_id() -> ServiceId {
        ServiceId::from_uuid(Uuid::parse_str("550e8400-e29b-41d4-a716-446655440004").unwrap())
    }

    /// Creates a deterministic rule ID for testing
    pub fn rule_id() -> RuleId {
        RuleId::from_uuid(Uuid::parse_str("550e8400-e29b-41d4-a716-446655440005").unwrap())
    }

    /// Creates the request context every deterministic fixture runs under
    pub fn request_context() -> RequestContext {
        RequestContext::new(Self::org_id(), Self::actor_id())
    }
}

/// Fixture for string test data
pub struct StringFixtures;

impl StringFixtures {
    /// Standard customer code
    pub fn customer_code() -> &'static str {
        "M-0042"
    }

    /// Standard customer name
    pub fn customer_name() -> &'static str {
        "Dana Whitfield"
    }

    /// Standard service name
    pub fn service_name() -> &'static str {
        "Garden Terrace Restaurant"
    }

    /// Standard reward name for redemptions
    pub fn reward_name() -> &'static str {
        "Free Dessert"
    }

    /// Standard point-of-sale reference
    pub fn reference_no() -> &'static str {
        "POS-20240615-0042"
    }

    /// Test email address
    pub fn email() -> &'static str {
        "dana.whitfield@example.com"
    }

    /// Test phone number
    pub fn phone() -> &'static str {
        "+66-81-555-0142"
    }

    /// Standard adjustment reason
    pub fn adjustment_reason() -> &'static str {
        "goodwill credit after service delay"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spend_fixtures_are_positive() {
        assert!(SpendFixtures::spend_5000() > Decimal::ZERO);
        assert!(SpendFixtures::smallest_spend() > Decimal::ZERO);
        assert!(SpendFixtures::below_min_spend() < dec!(50));
    }

    #[test]
    fn test_temporal_fixtures_ordering() {
        assert!(TemporalFixtures::before_window() < TemporalFixtures::window_from());
        assert!(TemporalFixtures::in_window() < TemporalFixtures::window_to());
        assert!(TemporalFixtures::window_to() < TemporalFixtures::after_window());

        let window = TemporalFixtures::standard_window();
        assert!(window.contains(TemporalFixtures::in_window()));
        assert!(!window.contains(TemporalFixtures::after_window()));
    }

    #[test]
    fn test_anchor_falls_inside_standard_window() {
        let window = TemporalFixtures::standard_window();
        let local = TemporalFixtures::bangkok().local_date(TemporalFixtures::anchor());
        assert!(window.contains(local));
    }

    #[test]
    fn test_id_fixtures_are_deterministic() {
        assert_eq!(IdFixtures::customer_id(), IdFixtures::customer_id());
        assert_eq!(
            IdFixtures::request_context(),
            IdFixtures::request_context()
        );
    }
}
