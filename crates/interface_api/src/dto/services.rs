//! Service and earning rule DTOs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use core_kernel::{Points, RuleId, ServiceId};
use domain_ledger::EarnPreview;
use domain_rules::{EarningRule, NewEarningRule, NewService, RoundingMode, Service, ServiceCategory};

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterServiceRequest {
    #[validate(length(min = 1, max = 128))]
    pub name: String,
    pub category: ServiceCategory,
}

impl From<RegisterServiceRequest> for NewService {
    fn from(request: RegisterServiceRequest) -> Self {
        NewService::new(request.name, request.category)
    }
}

#[derive(Debug, Serialize)]
pub struct ServiceResponse {
    pub id: ServiceId,
    pub name: String,
    pub category: ServiceCategory,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Service> for ServiceResponse {
    fn from(service: Service) -> Self {
        Self {
            id: service.id,
            name: service.name,
            category: service.category,
            is_active: service.is_active,
            created_at: service.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateRuleRequest {
    pub spend_amount: Decimal,
    pub earn_points: Points,
    #[serde(default)]
    pub rounding: RoundingMode,
    pub min_spend: Option<Decimal>,
    pub valid_from: NaiveDate,
    pub valid_to: Option<NaiveDate>,
}

impl CreateRuleRequest {
    /// Binds the rule input to the service named in the path
    pub fn into_new_rule(self, service_id: ServiceId) -> NewEarningRule {
        NewEarningRule {
            service_id,
            spend_amount: self.spend_amount,
            earn_points: self.earn_points,
            rounding: self.rounding,
            min_spend: self.min_spend,
            valid_from: self.valid_from,
            valid_to: self.valid_to,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RuleResponse {
    pub id: RuleId,
    pub service_id: ServiceId,
    pub spend_amount: Decimal,
    pub earn_points: Points,
    pub rounding: RoundingMode,
    pub min_spend: Option<Decimal>,
    pub valid_from: NaiveDate,
    pub valid_to: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl From<EarningRule> for RuleResponse {
    fn from(rule: EarningRule) -> Self {
        Self {
            id: rule.id,
            service_id: rule.service_id,
            spend_amount: rule.spend_amount,
            earn_points: rule.earn_points,
            rounding: rule.rounding,
            min_spend: rule.min_spend,
            valid_from: rule.validity.from,
            valid_to: rule.validity.to,
            created_at: rule.created_at,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct ActiveRuleQuery {
    /// Org-local calendar date; defaults to today
    pub on: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct EarnPreviewQuery {
    pub spend_amount: Decimal,
    pub on: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct EarnPreviewResponse {
    pub service_id: ServiceId,
    pub rule_id: RuleId,
    pub on_date: NaiveDate,
    pub spend_amount: Decimal,
    pub points: Points,
    pub rounding: RoundingMode,
    pub min_spend_applied: bool,
}

impl From<EarnPreview> for EarnPreviewResponse {
    fn from(preview: EarnPreview) -> Self {
        Self {
            service_id: preview.service_id,
            rule_id: preview.rule_id,
            on_date: preview.on_date,
            spend_amount: preview.spend_amount,
            points: preview.points,
            rounding: preview.rounding,
            min_spend_applied: preview.min_spend_applied,
        }
    }
}
