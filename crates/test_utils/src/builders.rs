//! Test Data Builders
//!
//! Provides builder patterns for constructing domain inputs with sensible
//! defaults. These builders allow tests to specify only the relevant
//! fields while using defaults for everything else.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use core_kernel::{CustomerId, Points, ServiceId};
use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::Name;
use fake::Fake;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use domain_ledger::{AdjustRequest, EarnRequest, NewCustomer, RedeemRequest};
use domain_rules::{NewEarningRule, NewService, RoundingMode, ServiceCategory};

use crate::fixtures::{SpendFixtures, StringFixtures, TemporalFixtures};

/// Builder for customer registration input
pub struct CustomerBuilder {
    code: String,
    full_name: String,
    phone: Option<String>,
    email: Option<String>,
    birth_date: Option<NaiveDate>,
    notes: Option<String>,
}

impl Default for CustomerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CustomerBuilder {
    /// Creates a new builder with default values
    pub fn new() -> Self {
        Self {
            code: StringFixtures::customer_code().to_string(),
            full_name: StringFixtures::customer_name().to_string(),
            phone: Some(StringFixtures::phone().to_string()),
            email: Some(StringFixtures::email().to_string()),
            birth_date: Some(TemporalFixtures::birth_date()),
            notes: None,
        }
    }

    /// A customer with only the required fields set
    pub fn minimal() -> Self {
        Self {
            code: StringFixtures::customer_code().to_string(),
            full_name: StringFixtures::customer_name().to_string(),
            phone: None,
            email: None,
            birth_date: None,
            notes: None,
        }
    }

    /// A customer with a random code, name, and email
    ///
    /// Use this when the code must be unique, e.g. against a shared
    /// database where `code` carries a uniqueness constraint.
    pub fn randomized() -> Self {
        let code = format!("M-{:06}", (1..=999_999u32).fake::<u32>());
        Self::new()
            .with_code(code)
            .with_full_name(Name().fake::<String>())
            .with_email(SafeEmail().fake::<String>())
    }

    /// Sets the customer code
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    /// Sets the full name
    pub fn with_full_name(mut self, name: impl Into<String>) -> Self {
        self.full_name = name.into();
        self
    }

    /// Sets the phone
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    /// Sets the email
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Sets the birth date
    pub fn with_birth_date(mut self, date: NaiveDate) -> Self {
        self.birth_date = Some(date);
        self
    }

    /// Sets the operator notes
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Builds the registration input
    pub fn build(self) -> NewCustomer {
        NewCustomer {
            code: self.code,
            full_name: self.full_name,
            phone: self.phone,
            email: self.email,
            birth_date: self.birth_date,
            notes: self.notes,
        }
    }
}

/// Builder for service registration input
pub struct ServiceBuilder {
    name: String,
    category: ServiceCategory,
}

impl Default for ServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceBuilder {
    /// Creates a new builder with default values
    pub fn new() -> Self {
        Self {
            name: StringFixtures::service_name().to_string(),
            category: ServiceCategory::Restaurant,
        }
    }

    /// Builds a cafe service
    pub fn cafe() -> Self {
        Self::new()
            .with_name("Lobby Cafe")
            .with_category(ServiceCategory::Cafe)
    }

    /// Builds a hotel service
    pub fn hotel() -> Self {
        Self::new()
            .with_name("Lakeside Hotel")
            .with_category(ServiceCategory::Hotel)
    }

    /// Builds a retail service
    pub fn retail() -> Self {
        Self::new()
            .with_name("Gift Shop")
            .with_category(ServiceCategory::Retail)
    }

    /// Sets the service name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the business category
    pub fn with_category(mut self, category: ServiceCategory) -> Self {
        self.category = category;
        self
    }

    /// Builds the registration input
    pub fn build(self) -> NewService {
        NewService {
            name: self.name,
            category: self.category,
        }
    }
}

/// Builder for earning rule input
///
/// Defaults to the standard 100:1 floor rule, open-ended from the start
/// of the standard window.
pub struct RuleBuilder {
    service_id: ServiceId,
    spend_amount: Decimal,
    earn_points: Points,
    rounding: RoundingMode,
    min_spend: Option<Decimal>,
    valid_from: NaiveDate,
    valid_to: Option<NaiveDate>,
}

impl Default for RuleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleBuilder {
    /// Creates a new builder with default values
    pub fn new() -> Self {
        Self {
            service_id: ServiceId::new(),
            spend_amount: SpendFixtures::spend_100(),
            earn_points: Points::new(1),
            rounding: RoundingMode::Floor,
            min_spend: None,
            valid_from: TemporalFixtures::window_from(),
            valid_to: None,
        }
    }

    /// The standard rule attached to a specific service
    pub fn for_service(service_id: ServiceId) -> Self {
        Self::new().with_service_id(service_id)
    }

    /// A double-points promotion bounded to June 2024
    pub fn double_points_promo(service_id: ServiceId) -> Self {
        Self::for_service(service_id)
            .with_earn_points(Points::new(2))
            .with_valid_from(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
            .with_valid_to(NaiveDate::from_ymd_opt(2024, 7, 1).unwrap())
    }

    /// Sets the service the rule prices
    pub fn with_service_id(mut self, id: ServiceId) -> Self {
        self.service_id = id;
        self
    }

    /// Sets the spend denominator
    pub fn with_spend_amount(mut self, amount: Decimal) -> Self {
        self.spend_amount = amount;
        self
    }

    /// Sets the points numerator
    pub fn with_earn_points(mut self, points: Points) -> Self {
        self.earn_points = points;
        self
    }

    /// Sets the rounding mode
    pub fn with_rounding(mut self, rounding: RoundingMode) -> Self {
        self.rounding = rounding;
        self
    }

    /// Sets the minimum qualifying spend
    pub fn with_min_spend(mut self, min: Decimal) -> Self {
        self.min_spend = Some(min);
        self
    }

    /// Sets the window start
    pub fn with_valid_from(mut self, from: NaiveDate) -> Self {
        self.valid_from = from;
        self
    }

    /// Sets the window end (exclusive)
    pub fn with_valid_to(mut self, to: NaiveDate) -> Self {
        self.valid_to = Some(to);
        self
    }

    /// Builds the rule input
    pub fn build(self) -> NewEarningRule {
        NewEarningRule {
            service_id: self.service_id,
            spend_amount: self.spend_amount,
            earn_points: self.earn_points,
            rounding: self.rounding,
            min_spend: self.min_spend,
            valid_from: self.valid_from,
            valid_to: self.valid_to,
        }
    }
}

/// Builder for earn requests
pub struct EarnBuilder {
    customer_id: CustomerId,
    service_id: ServiceId,
    spend_amount: Decimal,
    occurs_at: Option<DateTime<Utc>>,
    reference_no: Option<String>,
    note: Option<String>,
}

impl Default for EarnBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EarnBuilder {
    /// Creates a new builder with default values
    ///
    /// `occurs_at` defaults to `None`, so the engine stamps the spend
    /// with the current time.
    pub fn new() -> Self {
        Self {
            customer_id: CustomerId::new(),
            service_id: ServiceId::new(),
            spend_amount: SpendFixtures::spend_5000(),
            occurs_at: None,
            reference_no: Some(StringFixtures::reference_no().to_string()),
            note: None,
        }
    }

    /// Sets the earning customer
    pub fn with_customer_id(mut self, id: CustomerId) -> Self {
        self.customer_id = id;
        self
    }

    /// Sets the service spent on
    pub fn with_service_id(mut self, id: ServiceId) -> Self {
        self.service_id = id;
        self
    }

    /// Sets the spend amount
    pub fn with_spend_amount(mut self, amount: Decimal) -> Self {
        self.spend_amount = amount;
        self
    }

    /// Pins the spend to an explicit instant
    pub fn with_occurs_at(mut self, at: DateTime<Utc>) -> Self {
        self.occurs_at = Some(at);
        self
    }

    /// Pins the spend to a number of days before now
    ///
    /// Handy for building lots that are already expired or close to it.
    pub fn occurred_days_ago(mut self, days: i64) -> Self {
        self.occurs_at = Some(Utc::now() - Duration::days(days));
        self
    }

    /// Sets the point-of-sale reference
    pub fn with_reference_no(mut self, reference: impl Into<String>) -> Self {
        self.reference_no = Some(reference.into());
        self
    }

    /// Sets the free-form note
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Builds the earn request
    pub fn build(self) -> EarnRequest {
        EarnRequest {
            customer_id: self.customer_id,
            service_id: self.service_id,
            spend_amount: self.spend_amount,
            occurs_at: self.occurs_at,
            reference_no: self.reference_no,
            note: self.note,
        }
    }
}

/// Builder for redemption requests
pub struct RedeemBuilder {
    customer_id: CustomerId,
    points: Points,
    redeemed_at: Option<DateTime<Utc>>,
    reward_name: Option<String>,
    note: Option<String>,
}

impl Default for RedeemBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RedeemBuilder {
    /// Creates a new builder with default values
    pub fn new() -> Self {
        Self {
            customer_id: CustomerId::new(),
            points: Points::new(10),
            redeemed_at: None,
            reward_name: Some(StringFixtures::reward_name().to_string()),
            note: None,
        }
    }

    /// Sets the redeeming customer
    pub fn with_customer_id(mut self, id: CustomerId) -> Self {
        self.customer_id = id;
        self
    }

    /// Sets the points to spend
    pub fn with_points(mut self, points: Points) -> Self {
        self.points = points;
        self
    }

    /// Pins the redemption to an explicit instant
    pub fn with_redeemed_at(mut self, at: DateTime<Utc>) -> Self {
        self.redeemed_at = Some(at);
        self
    }

    /// Sets the reward name
    pub fn with_reward_name(mut self, name: impl Into<String>) -> Self {
        self.reward_name = Some(name.into());
        self
    }

    /// Sets the free-form note
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Builds the redemption request
    pub fn build(self) -> RedeemRequest {
        RedeemRequest {
            customer_id: self.customer_id,
            points: self.points,
            redeemed_at: self.redeemed_at,
            reward_name: self.reward_name,
            note: self.note,
        }
    }
}

/// Builder for manual adjustment requests
pub struct AdjustBuilder {
    customer_id: CustomerId,
    delta: Points,
    occurs_at: Option<DateTime<Utc>>,
    reason: Option<String>,
}

impl Default for AdjustBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AdjustBuilder {
    /// Creates a new builder defaulting to a goodwill credit
    pub fn new() -> Self {
        Self {
            customer_id: CustomerId::new(),
            delta: Points::new(25),
            occurs_at: None,
            reason: Some(StringFixtures::adjustment_reason().to_string()),
        }
    }

    /// Builds a clawback debit instead of a credit
    pub fn debit() -> Self {
        Self::new()
            .with_delta(Points::new(-5))
            .with_reason("points granted in error")
    }

    /// Sets the adjusted customer
    pub fn with_customer_id(mut self, id: CustomerId) -> Self {
        self.customer_id = id;
        self
    }

    /// Sets the signed delta
    pub fn with_delta(mut self, delta: Points) -> Self {
        self.delta = delta;
        self
    }

    /// Pins the adjustment to an explicit instant
    pub fn with_occurs_at(mut self, at: DateTime<Utc>) -> Self {
        self.occurs_at = Some(at);
        self
    }

    /// Sets the audit reason
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Builds the adjustment request
    pub fn build(self) -> AdjustRequest {
        AdjustRequest {
            customer_id: self.customer_id,
            delta: self.delta,
            occurs_at: self.occurs_at,
            reason: self.reason,
        }
    }
}
