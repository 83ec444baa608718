//! End-to-end tests for the points engine over the in-memory store

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{ActorId, CustomerId, OrgId, Points, RequestContext, RuleId, ServiceId};
use domain_rules::error::RuleError;
use domain_rules::rule::{NewEarningRule, RoundingMode};
use domain_rules::service::{NewService, Service, ServiceCategory};

use domain_ledger::{
    AdjustRequest, EarnRequest, EngineConfig, EngineError, EntrySource, HistoryQuery, LedgerStore,
    MemoryLedgerStore, NewCustomer, PointsEngine, RedeemRequest,
};

fn days_ago(days: i64) -> DateTime<Utc> {
    Utc::now() - Duration::days(days)
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Engine over a fresh memory store, with one customer, one service,
/// and an open-ended 100:1 floor rule
struct Fixture {
    engine: Arc<PointsEngine>,
    store: Arc<MemoryLedgerStore>,
    ctx: RequestContext,
    customer_id: CustomerId,
    service_id: ServiceId,
    rule_id: RuleId,
}

impl Fixture {
    async fn new() -> Self {
        let store = Arc::new(MemoryLedgerStore::new());
        let engine = Arc::new(PointsEngine::new(store.clone(), EngineConfig::default()));
        let ctx = RequestContext::new(OrgId::new(), ActorId::new());

        let customer = engine
            .register_customer(
                &ctx,
                NewCustomer {
                    code: "M-0001".to_string(),
                    full_name: "Test Member".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let service = engine
            .register_service(&ctx, NewService::new("Garden Cafe", ServiceCategory::Cafe))
            .await
            .unwrap();
        let rule = engine
            .create_rule(
                &ctx,
                NewEarningRule {
                    service_id: service.id,
                    spend_amount: dec!(100),
                    earn_points: Points::new(1),
                    rounding: RoundingMode::Floor,
                    min_spend: None,
                    valid_from: date(2020, 1, 1),
                    valid_to: None,
                },
            )
            .await
            .unwrap();

        Self {
            engine,
            store,
            ctx,
            customer_id: customer.id,
            service_id: service.id,
            rule_id: rule.id,
        }
    }

    /// Registers another service with its own rule, for rounding and
    /// min-spend variations
    async fn service_with_rule(
        &self,
        name: &str,
        rounding: RoundingMode,
        min_spend: Option<Decimal>,
    ) -> ServiceId {
        let service = self
            .engine
            .register_service(&self.ctx, NewService::new(name, ServiceCategory::Restaurant))
            .await
            .unwrap();
        self.engine
            .create_rule(
                &self.ctx,
                NewEarningRule {
                    service_id: service.id,
                    spend_amount: dec!(100),
                    earn_points: Points::new(1),
                    rounding,
                    min_spend,
                    valid_from: date(2020, 1, 1),
                    valid_to: None,
                },
            )
            .await
            .unwrap();
        service.id
    }

    fn earn_request(&self, spend: Decimal, occurs_at: Option<DateTime<Utc>>) -> EarnRequest {
        EarnRequest {
            customer_id: self.customer_id,
            service_id: self.service_id,
            spend_amount: spend,
            occurs_at,
            reference_no: None,
            note: None,
        }
    }

    fn redeem_request(&self, points: i64) -> RedeemRequest {
        RedeemRequest {
            customer_id: self.customer_id,
            points: Points::new(points),
            redeemed_at: None,
            reward_name: Some("Free americano".to_string()),
            note: None,
        }
    }

    async fn balance(&self) -> Points {
        self.engine
            .available_balance(&self.ctx, self.customer_id, None)
            .await
            .unwrap()
    }

    async fn assert_consistent(&self) {
        let report = self
            .engine
            .verify_consistency(&self.ctx, self.customer_id)
            .await
            .unwrap();
        assert!(report.is_clean(), "violations: {:?}", report.violations);
    }
}

// ============================================================================
// Earn Flow Tests
// ============================================================================

mod earn_flow_tests {
    use super::*;

    #[tokio::test]
    async fn test_spend_converts_with_floor_rounding() {
        let f = Fixture::new().await;

        let occurs = days_ago(1);
        let receipt = f
            .engine
            .earn(&f.ctx, f.earn_request(dec!(250), Some(occurs)))
            .await
            .unwrap();

        // 250 spend at 100:1 is 2.5 points; floor keeps 2.
        assert_eq!(receipt.points_earned, Points::new(2));
        assert_eq!(receipt.rule_id, f.rule_id);
        assert_eq!(receipt.occurs_at, occurs);
        assert_eq!(receipt.expires_at, occurs + Duration::days(365));
        assert_eq!(f.balance().await, Points::new(2));
    }

    #[tokio::test]
    async fn test_large_spend_earns_proportionally() {
        let f = Fixture::new().await;

        let receipt = f
            .engine
            .earn(&f.ctx, f.earn_request(dec!(5000), None))
            .await
            .unwrap();

        assert_eq!(receipt.points_earned, Points::new(50));
        assert_eq!(f.balance().await, Points::new(50));
    }

    #[tokio::test]
    async fn test_rounding_mode_round_goes_half_up() {
        let f = Fixture::new().await;
        let service_id = f
            .service_with_rule("Terrace Grill", RoundingMode::Round, None)
            .await;

        let receipt = f
            .engine
            .earn(
                &f.ctx,
                EarnRequest {
                    service_id,
                    ..f.earn_request(dec!(250), None)
                },
            )
            .await
            .unwrap();

        assert_eq!(receipt.points_earned, Points::new(3));
    }

    #[tokio::test]
    async fn test_below_min_spend_records_zero_point_transaction() {
        let f = Fixture::new().await;
        let service_id = f
            .service_with_rule("Rooftop Bar", RoundingMode::Floor, Some(dec!(1000)))
            .await;

        let receipt = f
            .engine
            .earn(
                &f.ctx,
                EarnRequest {
                    service_id,
                    ..f.earn_request(dec!(500), None)
                },
            )
            .await
            .unwrap();

        assert_eq!(receipt.points_earned, Points::ZERO);
        assert_eq!(f.balance().await, Points::ZERO);

        // The spend is still on the ledger as a zero-delta entry.
        let page = f
            .engine
            .ledger_history(&f.ctx, f.customer_id, HistoryQuery::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].source, EntrySource::Earn);
        assert_eq!(page.items[0].points_delta, Points::ZERO);
    }

    #[tokio::test]
    async fn test_nonpositive_spend_rejected() {
        let f = Fixture::new().await;

        let result = f.engine.earn(&f.ctx, f.earn_request(dec!(0), None)).await;
        assert!(matches!(result, Err(EngineError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_no_rule_covers_the_date() {
        let f = Fixture::new().await;

        let before_any_rule = Utc.with_ymd_and_hms(2019, 6, 1, 12, 0, 0).unwrap();
        let result = f
            .engine
            .earn(&f.ctx, f.earn_request(dec!(250), Some(before_any_rule)))
            .await;

        assert!(matches!(
            result,
            Err(EngineError::Rule(RuleError::NoApplicableRule { .. }))
        ));
    }

    #[tokio::test]
    async fn test_inactive_service_cannot_earn() {
        let f = Fixture::new().await;

        let mut service = Service::create(
            f.ctx.org_id,
            NewService::new("Closed Kiosk", ServiceCategory::Retail),
        )
        .unwrap();
        service.deactivate();
        let service = f.store.register_service(&f.ctx, service).await.unwrap();

        let result = f
            .engine
            .earn(
                &f.ctx,
                EarnRequest {
                    service_id: service.id,
                    ..f.earn_request(dec!(250), None)
                },
            )
            .await;

        assert!(matches!(
            result,
            Err(EngineError::Rule(RuleError::NoApplicableRule { .. }))
        ));
    }

    #[tokio::test]
    async fn test_preview_persists_nothing() {
        let f = Fixture::new().await;

        let preview = f
            .engine
            .preview_earn(&f.ctx, f.service_id, dec!(250), None)
            .await
            .unwrap();

        assert_eq!(preview.points, Points::new(2));
        assert_eq!(preview.rule_id, f.rule_id);
        assert!(!preview.min_spend_applied);

        let page = f
            .engine
            .ledger_history(&f.ctx, f.customer_id, HistoryQuery::default())
            .await
            .unwrap();
        assert_eq!(page.total, 0);
        assert_eq!(f.balance().await, Points::ZERO);
    }
}

// ============================================================================
// Redemption Flow Tests
// ============================================================================

mod redeem_flow_tests {
    use super::*;

    #[tokio::test]
    async fn test_redemption_draws_oldest_expiry_first() {
        let f = Fixture::new().await;

        // Earlier earn expires earlier (retention is a fixed offset).
        f.engine
            .earn(&f.ctx, f.earn_request(dec!(1000), Some(days_ago(20))))
            .await
            .unwrap();
        f.engine
            .earn(&f.ctx, f.earn_request(dec!(500), Some(days_ago(10))))
            .await
            .unwrap();

        let receipt = f
            .engine
            .redeem(&f.ctx, f.redeem_request(12))
            .await
            .unwrap();

        assert_eq!(receipt.points_redeemed, Points::new(12));
        assert_eq!(receipt.allocations.len(), 2);
        assert_eq!(receipt.allocations[0].points_used, Points::new(10));
        assert_eq!(receipt.allocations[1].points_used, Points::new(2));
        assert_eq!(f.balance().await, Points::new(3));
        f.assert_consistent().await;
    }

    #[tokio::test]
    async fn test_insufficient_redemption_reports_available() {
        let f = Fixture::new().await;

        f.engine
            .earn(&f.ctx, f.earn_request(dec!(1000), None))
            .await
            .unwrap();

        let result = f.engine.redeem(&f.ctx, f.redeem_request(12)).await;

        match result {
            Err(EngineError::Insufficient(err)) => {
                assert_eq!(err.requested, Points::new(12));
                assert_eq!(err.available, Points::new(10));
            }
            other => panic!("expected Insufficient, got {other:?}"),
        }

        // The failed attempt left no trace.
        assert_eq!(f.balance().await, Points::new(10));
        let page = f
            .engine
            .ledger_history(&f.ctx, f.customer_id, HistoryQuery::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn test_nonpositive_redemption_rejected() {
        let f = Fixture::new().await;

        let result = f.engine.redeem(&f.ctx, f.redeem_request(0)).await;
        assert!(matches!(result, Err(EngineError::InvalidRequest(_))));
    }
}

// ============================================================================
// Adjustment Flow Tests
// ============================================================================

mod adjust_flow_tests {
    use super::*;

    #[tokio::test]
    async fn test_credit_opens_lot_with_retention_expiry() {
        let f = Fixture::new().await;

        let occurs = days_ago(1);
        let receipt = f
            .engine
            .adjust(
                &f.ctx,
                AdjustRequest {
                    customer_id: f.customer_id,
                    delta: Points::new(25),
                    occurs_at: Some(occurs),
                    reason: Some("Goodwill credit".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(receipt.points_delta, Points::new(25));
        assert_eq!(receipt.expires_at, Some(occurs + Duration::days(365)));
        assert!(receipt.allocations.is_empty());
        assert_eq!(f.balance().await, Points::new(25));
    }

    #[tokio::test]
    async fn test_debit_consumes_like_redemption() {
        let f = Fixture::new().await;

        f.engine
            .earn(&f.ctx, f.earn_request(dec!(1000), None))
            .await
            .unwrap();

        let receipt = f
            .engine
            .adjust(
                &f.ctx,
                AdjustRequest {
                    customer_id: f.customer_id,
                    delta: Points::new(-4),
                    occurs_at: None,
                    reason: Some("Till error".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(receipt.points_delta, Points::new(-4));
        assert_eq!(receipt.expires_at, None);
        assert_eq!(receipt.allocations.len(), 1);
        assert_eq!(receipt.allocations[0].points_used, Points::new(4));
        assert_eq!(f.balance().await, Points::new(6));
        f.assert_consistent().await;
    }

    #[tokio::test]
    async fn test_zero_delta_rejected() {
        let f = Fixture::new().await;

        let result = f
            .engine
            .adjust(
                &f.ctx,
                AdjustRequest {
                    customer_id: f.customer_id,
                    delta: Points::ZERO,
                    occurs_at: None,
                    reason: None,
                },
            )
            .await;

        assert!(matches!(result, Err(EngineError::InvalidRequest(_))));
    }
}

// ============================================================================
// Reversal Flow Tests
// ============================================================================

mod reversal_flow_tests {
    use super::*;

    #[tokio::test]
    async fn test_reverse_unspent_earn() {
        let f = Fixture::new().await;

        let earn = f
            .engine
            .earn(&f.ctx, f.earn_request(dec!(1000), None))
            .await
            .unwrap();

        let receipt = f
            .engine
            .reverse_earn(&f.ctx, earn.transaction_id, Some("Refunded".to_string()))
            .await
            .unwrap();

        assert_eq!(receipt.points_reversed, Points::new(10));
        assert_eq!(f.balance().await, Points::ZERO);
        f.assert_consistent().await;
    }

    #[tokio::test]
    async fn test_reverse_after_partial_spend_claws_back_remainder() {
        let f = Fixture::new().await;

        let earn = f
            .engine
            .earn(&f.ctx, f.earn_request(dec!(1000), None))
            .await
            .unwrap();
        f.engine.redeem(&f.ctx, f.redeem_request(4)).await.unwrap();

        let receipt = f
            .engine
            .reverse_earn(&f.ctx, earn.transaction_id, None)
            .await
            .unwrap();

        assert_eq!(receipt.points_reversed, Points::new(6));
        assert_eq!(f.balance().await, Points::ZERO);
        f.assert_consistent().await;
    }
}

// ============================================================================
// Expiry Flow Tests
// ============================================================================

mod expiry_flow_tests {
    use super::*;

    #[tokio::test]
    async fn test_expired_lot_is_excluded_before_any_sweep() {
        let f = Fixture::new().await;

        // Earned 400 days ago, so it expired 35 days ago.
        f.engine
            .earn(&f.ctx, f.earn_request(dec!(1000), Some(days_ago(400))))
            .await
            .unwrap();
        f.engine
            .earn(&f.ctx, f.earn_request(dec!(700), Some(days_ago(1))))
            .await
            .unwrap();

        assert_eq!(f.balance().await, Points::new(7));
    }

    #[tokio::test]
    async fn test_sweep_writes_off_expired_remainders() {
        let f = Fixture::new().await;

        f.engine
            .earn(&f.ctx, f.earn_request(dec!(1000), Some(days_ago(400))))
            .await
            .unwrap();
        f.engine
            .earn(&f.ctx, f.earn_request(dec!(700), Some(days_ago(1))))
            .await
            .unwrap();

        let outcome = f.engine.sweep_expired(&f.ctx, None).await.unwrap();

        assert_eq!(outcome.lots_swept, 1);
        assert_eq!(outcome.points_expired, Points::new(10));

        // After the sweep the entry sum matches the live balance again.
        assert_eq!(
            f.engine.ledger_sum(&f.ctx, f.customer_id).await.unwrap(),
            Points::new(7)
        );
        f.assert_consistent().await;
    }

    #[tokio::test]
    async fn test_balance_summary_flags_points_expiring_soon() {
        let f = Fixture::new().await;

        // Expires in 65 days: inside the 90-day horizon.
        f.engine
            .earn(&f.ctx, f.earn_request(dec!(500), Some(days_ago(300))))
            .await
            .unwrap();
        // Expires in 364 days: outside the horizon.
        f.engine
            .earn(&f.ctx, f.earn_request(dec!(700), Some(days_ago(1))))
            .await
            .unwrap();

        let summary = f
            .engine
            .balance_summary(&f.ctx, f.customer_id, None)
            .await
            .unwrap();

        assert_eq!(summary.available, Points::new(12));
        assert_eq!(summary.expiring_soon, Points::new(5));
        assert_eq!(summary.horizon_days, 90);
    }

    #[tokio::test]
    async fn test_expiring_balance_respects_the_caller_horizon() {
        let f = Fixture::new().await;

        // Expires in 65 days.
        f.engine
            .earn(&f.ctx, f.earn_request(dec!(500), Some(days_ago(300))))
            .await
            .unwrap();
        // Expires in 364 days.
        f.engine
            .earn(&f.ctx, f.earn_request(dec!(700), Some(days_ago(1))))
            .await
            .unwrap();

        let soon = f
            .engine
            .expiring_balance(&f.ctx, f.customer_id, None, Some(60))
            .await
            .unwrap();
        assert_eq!(soon, Points::ZERO);

        let wider = f
            .engine
            .expiring_balance(&f.ctx, f.customer_id, None, Some(70))
            .await
            .unwrap();
        assert_eq!(wider, Points::new(5));

        let everything = f
            .engine
            .expiring_balance(&f.ctx, f.customer_id, None, Some(365))
            .await
            .unwrap();
        assert_eq!(everything, Points::new(12));
    }

    #[tokio::test]
    async fn test_expiring_lots_view() {
        let f = Fixture::new().await;

        f.engine
            .earn(&f.ctx, f.earn_request(dec!(500), Some(days_ago(300))))
            .await
            .unwrap();
        f.engine
            .earn(&f.ctx, f.earn_request(dec!(700), Some(days_ago(1))))
            .await
            .unwrap();

        let expiring = f
            .engine
            .expiring_lots(&f.ctx, f.customer_id, None, None)
            .await
            .unwrap();

        assert_eq!(expiring.len(), 1);
        assert_eq!(expiring[0].remaining, Points::new(5));
    }
}

// ============================================================================
// History Tests
// ============================================================================

mod history_tests {
    use super::*;

    #[tokio::test]
    async fn test_date_window_is_inclusive_of_both_ends() {
        let f = Fixture::new().await;

        for day in [1, 5, 10] {
            let occurs = Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap();
            f.engine
                .earn(&f.ctx, f.earn_request(dec!(100), Some(occurs)))
                .await
                .unwrap();
        }

        let page = f
            .engine
            .ledger_history(
                &f.ctx,
                f.customer_id,
                HistoryQuery {
                    date_from: Some(date(2024, 3, 5)),
                    date_to: Some(date(2024, 3, 10)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(page.total, 2);
    }

    #[tokio::test]
    async fn test_service_filter_excludes_redemptions() {
        let f = Fixture::new().await;

        f.engine
            .earn(&f.ctx, f.earn_request(dec!(1000), None))
            .await
            .unwrap();
        f.engine.redeem(&f.ctx, f.redeem_request(4)).await.unwrap();

        let everything = f
            .engine
            .ledger_history(&f.ctx, f.customer_id, HistoryQuery::default())
            .await
            .unwrap();
        assert_eq!(everything.total, 2);

        let service_only = f
            .engine
            .ledger_history(
                &f.ctx,
                f.customer_id,
                HistoryQuery {
                    service_id: Some(f.service_id),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(service_only.total, 1);
        assert_eq!(service_only.items[0].source, EntrySource::Earn);
    }

    #[tokio::test]
    async fn test_page_size_is_clamped() {
        let f = Fixture::new().await;

        f.engine
            .earn(&f.ctx, f.earn_request(dec!(100), None))
            .await
            .unwrap();

        let page = f
            .engine
            .ledger_history(
                &f.ctx,
                f.customer_id,
                HistoryQuery {
                    page_size: Some(10_000),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(page.page_size, 100);
    }
}

// ============================================================================
// Rule Administration Tests
// ============================================================================

mod rule_admin_tests {
    use super::*;

    #[tokio::test]
    async fn test_overlapping_rule_surfaces_conflict() {
        let f = Fixture::new().await;

        let result = f
            .engine
            .create_rule(
                &f.ctx,
                NewEarningRule {
                    service_id: f.service_id,
                    spend_amount: dec!(50),
                    earn_points: Points::new(1),
                    rounding: RoundingMode::Floor,
                    min_spend: None,
                    valid_from: date(2024, 6, 1),
                    valid_to: None,
                },
            )
            .await;

        match result {
            Err(EngineError::RuleOverlap { existing }) => {
                assert_eq!(existing, Some(f.rule_id));
            }
            other => panic!("expected RuleOverlap, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_resolve_active_rule() {
        let f = Fixture::new().await;

        let resolution = f
            .engine
            .resolve_active_rule(&f.ctx, f.service_id, None)
            .await
            .unwrap();
        assert_eq!(resolution.rule.id, f.rule_id);

        let result = f
            .engine
            .resolve_active_rule(&f.ctx, f.service_id, Some(date(2019, 1, 1)))
            .await;
        assert!(matches!(
            result,
            Err(EngineError::Rule(RuleError::NoApplicableRule { .. }))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_customer_code_surfaces() {
        let f = Fixture::new().await;

        let result = f
            .engine
            .register_customer(
                &f.ctx,
                NewCustomer {
                    code: "M-0001".to_string(),
                    full_name: "Another Member".to_string(),
                    ..Default::default()
                },
            )
            .await;

        assert!(matches!(result, Err(EngineError::Duplicate { .. })));
    }
}

// ============================================================================
// Concurrency Tests
// ============================================================================

mod concurrency_tests {
    use super::*;

    #[tokio::test]
    async fn test_concurrent_redemptions_settle_to_one_winner() {
        let f = Fixture::new().await;

        f.engine
            .earn(&f.ctx, f.earn_request(dec!(1000), None))
            .await
            .unwrap();

        let first = {
            let engine = f.engine.clone();
            let ctx = f.ctx;
            let request = f.redeem_request(6);
            tokio::spawn(async move { engine.redeem(&ctx, request).await })
        };
        let second = {
            let engine = f.engine.clone();
            let ctx = f.ctx;
            let request = f.redeem_request(6);
            tokio::spawn(async move { engine.redeem(&ctx, request).await })
        };

        let outcomes = [first.await.unwrap(), second.await.unwrap()];
        let wins = outcomes.iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1, "exactly one redemption may win the race");

        match outcomes.iter().find(|r| r.is_err()).unwrap() {
            Err(EngineError::Insufficient(err)) => {
                assert_eq!(err.available, Points::new(4));
            }
            other => panic!("expected Insufficient, got {other:?}"),
        }

        assert_eq!(f.balance().await, Points::new(4));
        f.assert_consistent().await;
    }
}

// ============================================================================
// Consistency Tests
// ============================================================================

mod consistency_tests {
    use super::*;

    #[tokio::test]
    async fn test_full_lifecycle_stays_consistent() {
        let f = Fixture::new().await;

        f.engine
            .earn(&f.ctx, f.earn_request(dec!(1000), Some(days_ago(400))))
            .await
            .unwrap();
        f.engine
            .earn(&f.ctx, f.earn_request(dec!(2000), Some(days_ago(30))))
            .await
            .unwrap();
        f.engine.redeem(&f.ctx, f.redeem_request(8)).await.unwrap();
        f.engine
            .adjust(
                &f.ctx,
                AdjustRequest {
                    customer_id: f.customer_id,
                    delta: Points::new(-3),
                    occurs_at: None,
                    reason: None,
                },
            )
            .await
            .unwrap();
        f.engine.sweep_expired(&f.ctx, None).await.unwrap();

        f.assert_consistent().await;
        // 10 expired, 20 earned, 8 redeemed, 3 debited.
        assert_eq!(
            f.engine.ledger_sum(&f.ctx, f.customer_id).await.unwrap(),
            Points::new(9)
        );
        assert_eq!(f.balance().await, Points::new(9));
    }
}
