//! Ledger consistency checking
//!
//! Verifies the structural invariants of a customer's ledger from raw
//! entries and allocation rows:
//!
//! - no lot is over-consumed (remaining never negative)
//! - every consuming entry is exactly covered by its allocations
//! - every positive entry carries an expiry date
//! - the sum of all deltas equals the sum of remaining points over lots
//!
//! The last identity follows from the first three; checking it directly
//! catches arithmetic drift between the two derivations.

use std::collections::HashMap;

use core_kernel::{LedgerEntryId, Points};
use serde::Serialize;

use crate::entry::LedgerEntry;
use crate::redemption::LotAllocation;

/// One broken invariant found by `verify`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsistencyViolation {
    /// A lot has more allocated against it than it ever held
    NegativeLotRemaining {
        entry_id: LedgerEntryId,
        remaining: Points,
    },
    /// A consuming entry's allocations do not sum to its delta
    UncoveredConsumption {
        entry_id: LedgerEntryId,
        delta: Points,
        allocated: Points,
    },
    /// A positive entry has no expiry date
    MissingExpiry { entry_id: LedgerEntryId },
    /// An allocation references an entry that is not a lot
    DanglingAllocation { earn_entry_id: LedgerEntryId },
    /// Sum of deltas disagrees with sum of lot remainders
    LedgerSumMismatch {
        entry_sum: Points,
        lot_remaining_sum: Points,
    },
}

/// Result of verifying one customer's ledger
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConsistencyReport {
    pub violations: Vec<ConsistencyViolation>,
}

impl ConsistencyReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Checks every ledger invariant over a customer's entries and
/// allocations
pub fn verify(entries: &[LedgerEntry], allocations: &[LotAllocation]) -> ConsistencyReport {
    let mut report = ConsistencyReport::default();

    let mut drawn_from: HashMap<LedgerEntryId, Points> = HashMap::new();
    let mut drawn_by: HashMap<LedgerEntryId, Points> = HashMap::new();
    for allocation in allocations {
        let from = drawn_from.entry(allocation.earn_entry_id).or_default();
        *from = *from + allocation.points_used;
        let by = drawn_by.entry(allocation.entry_id).or_default();
        *by = *by + allocation.points_used;
    }

    let mut entry_sum = Points::ZERO;
    let mut lot_remaining_sum = Points::ZERO;
    let mut lot_ids: Vec<LedgerEntryId> = Vec::new();

    for entry in entries {
        entry_sum = entry_sum + entry.points_delta;

        if entry.is_consuming() {
            let allocated = drawn_by.get(&entry.id).copied().unwrap_or(Points::ZERO);
            if allocated != entry.points_delta.abs() {
                report.violations.push(ConsistencyViolation::UncoveredConsumption {
                    entry_id: entry.id,
                    delta: entry.points_delta,
                    allocated,
                });
            }
            continue;
        }

        if entry.expires_at.is_none() {
            report
                .violations
                .push(ConsistencyViolation::MissingExpiry { entry_id: entry.id });
            continue;
        }

        lot_ids.push(entry.id);
        let allocated = drawn_from.get(&entry.id).copied().unwrap_or(Points::ZERO);
        let remaining = entry.points_delta - allocated;
        if remaining.is_negative() {
            report.violations.push(ConsistencyViolation::NegativeLotRemaining {
                entry_id: entry.id,
                remaining,
            });
        }
        lot_remaining_sum = lot_remaining_sum + remaining;
    }

    for earn_entry_id in drawn_from.keys() {
        if !lot_ids.contains(earn_entry_id) {
            report.violations.push(ConsistencyViolation::DanglingAllocation {
                earn_entry_id: *earn_entry_id,
            });
        }
    }

    if entry_sum != lot_remaining_sum {
        report.violations.push(ConsistencyViolation::LedgerSumMismatch {
            entry_sum,
            lot_remaining_sum,
        });
    }

    report
}
