//! FIFO allocation planning
//!
//! The planner decides which lots a consumption draws from. It is pure:
//! stores fetch the candidate lots under whatever locking they need,
//! call `plan`, and persist the draws it returns. Both the in-memory
//! store and the Postgres store go through this one function, so FIFO
//! order has a single definition.

use core_kernel::{LedgerEntryId, Points};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lot::EarnLot;

/// The consumption asked for more points than the lots hold
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("Insufficient points: requested {requested}, available {available}")]
pub struct InsufficientPoints {
    pub requested: Points,
    pub available: Points,
}

/// A planned draw of points from one lot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotDraw {
    pub earn_entry_id: LedgerEntryId,
    pub points_used: Points,
}

/// Plans draws covering `requested` points from the given lots
///
/// Lots are consumed in FIFO-by-expiry order: soonest `expires_at`
/// first, then earliest `occurs_at`, then entry id. Each draw takes as
/// much as its lot still holds; the last draw takes the remainder, so
/// the draws sum to exactly `requested`.
///
/// A non-positive request plans nothing. Lots with nothing remaining
/// are skipped.
///
/// # Errors
///
/// Returns `InsufficientPoints` with the total available when the lots
/// cannot cover the request. Nothing is partially planned.
pub fn plan(lots: &[EarnLot], requested: Points) -> Result<Vec<LotDraw>, InsufficientPoints> {
    if !requested.is_positive() {
        return Ok(Vec::new());
    }

    let mut candidates: Vec<&EarnLot> =
        lots.iter().filter(|lot| lot.remaining().is_positive()).collect();
    candidates.sort_by(|a, b| {
        a.expires_at
            .cmp(&b.expires_at)
            .then(a.occurs_at.cmp(&b.occurs_at))
            .then(a.entry_id.cmp(&b.entry_id))
    });

    let available: Points = candidates.iter().map(|lot| lot.remaining()).sum();
    if available < requested {
        return Err(InsufficientPoints {
            requested,
            available,
        });
    }

    let mut draws = Vec::new();
    let mut outstanding = requested;
    for lot in candidates {
        if !outstanding.is_positive() {
            break;
        }
        let take = lot.remaining().min(outstanding);
        draws.push(LotDraw {
            earn_entry_id: lot.entry_id,
            points_used: take,
        });
        outstanding = outstanding - take;
    }

    Ok(draws)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use core_kernel::CustomerId;
    use proptest::prelude::*;
    use std::collections::HashMap;

    prop_compose! {
        fn arb_lot()(
            points in 1i64..500,
            allocated_frac in 0i64..=100,
            expiry_days in 1i64..400,
            occurs_offset in 0i64..100,
        ) -> EarnLot {
            let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
            let allocated = points * allocated_frac / 100;
            EarnLot {
                entry_id: LedgerEntryId::new_v7(),
                customer_id: CustomerId::new(),
                service_id: None,
                points: Points::new(points),
                allocated: Points::new(allocated),
                occurs_at: base + Duration::hours(occurs_offset),
                expires_at: base + Duration::days(expiry_days),
            }
        }
    }

    proptest! {
        #[test]
        fn draws_sum_to_request_and_respect_lot_bounds(
            lots in prop::collection::vec(arb_lot(), 0..20),
            requested in 1i64..2_000,
        ) {
            let requested = Points::new(requested);
            let available: Points = lots.iter().map(|l| l.remaining()).sum();

            match plan(&lots, requested) {
                Ok(draws) => {
                    prop_assert!(available >= requested);

                    let total: Points = draws.iter().map(|d| d.points_used).sum();
                    prop_assert_eq!(total, requested);

                    let by_lot: HashMap<_, _> = lots
                        .iter()
                        .map(|l| (l.entry_id, l.remaining()))
                        .collect();
                    for draw in &draws {
                        prop_assert!(draw.points_used.is_positive());
                        prop_assert!(draw.points_used <= by_lot[&draw.earn_entry_id]);
                    }
                }
                Err(err) => {
                    prop_assert_eq!(err.available, available);
                    prop_assert!(available < requested);
                }
            }
        }

        #[test]
        fn earlier_lots_drain_before_later_lots_are_touched(
            lots in prop::collection::vec(arb_lot(), 1..20),
            requested in 1i64..2_000,
        ) {
            let requested = Points::new(requested);
            if let Ok(draws) = plan(&lots, requested) {
                // Order lots the way the planner does
                let mut fifo: Vec<&EarnLot> = lots
                    .iter()
                    .filter(|l| l.remaining().is_positive())
                    .collect();
                fifo.sort_by(|a, b| {
                    a.expires_at
                        .cmp(&b.expires_at)
                        .then(a.occurs_at.cmp(&b.occurs_at))
                        .then(a.entry_id.cmp(&b.entry_id))
                });

                let drawn: HashMap<_, _> = draws
                    .iter()
                    .map(|d| (d.earn_entry_id, d.points_used))
                    .collect();

                // Every lot before the last drawn lot must be fully drained
                if let Some(last_idx) = fifo
                    .iter()
                    .rposition(|l| drawn.contains_key(&l.entry_id))
                {
                    for lot in &fifo[..last_idx] {
                        prop_assert_eq!(
                            drawn.get(&lot.entry_id).copied(),
                            Some(lot.remaining()),
                            "lot {} skipped or partially drawn out of order",
                            lot.entry_id
                        );
                    }
                }
            }
        }
    }
}
