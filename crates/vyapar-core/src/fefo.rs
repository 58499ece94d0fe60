//! # FEFO Allocation
//!
//! First-expire-first-out: given a product's live batches already sorted by
//! expiry (ties by insertion order), take greedily from the front until the
//! requested quantity is covered.
//!
//! ```text
//!  need 7
//!  ┌──────────────┐   ┌──────────────┐
//!  │ B1  exp D1   │   │ B2  exp D2   │
//!  │ qty 5  → 0   │──►│ qty 5  → 3   │
//!  └──────────────┘   └──────────────┘
//! ```
//!
//! Running out of batches is not an error. The aggregate stock figure may
//! include quantity that was never batch-tracked, so whatever the batches
//! cannot cover is reported as `shortfall` and left to the aggregate.

use crate::types::BatchDeduction;

/// The part of a batch the allocator needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchStock {
    pub batch_id: String,
    pub quantity: i64,
    pub unit_cost_paise: i64,
}

impl BatchStock {
    pub fn new(batch_id: impl Into<String>, quantity: i64) -> Self {
        BatchStock {
            batch_id: batch_id.into(),
            quantity,
            unit_cost_paise: 0,
        }
    }

    pub fn with_cost(mut self, unit_cost_paise: i64) -> Self {
        self.unit_cost_paise = unit_cost_paise;
        self
    }
}

/// Result of an allocation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Allocation {
    /// Non-zero deductions in consumption order.
    pub deductions: Vec<BatchDeduction>,
    /// Quantity the batches could not cover.
    pub shortfall: i64,
}

impl Allocation {
    pub fn consumed(&self) -> i64 {
        self.deductions.iter().map(|d| d.quantity).sum()
    }
}

/// Allocates `needed` units across `batches` in the given order.
///
/// Batches with a non-positive quantity are skipped, so no deduction can
/// push a batch below zero.
pub fn allocate(batches: &[BatchStock], needed: i64) -> Allocation {
    let mut remaining = needed.max(0);
    let mut deductions = Vec::new();

    for batch in batches {
        if remaining == 0 {
            break;
        }
        if batch.quantity <= 0 {
            continue;
        }
        let take = remaining.min(batch.quantity);
        deductions.push(BatchDeduction {
            batch_id: batch.batch_id.clone(),
            quantity: take,
            unit_cost_paise: batch.unit_cost_paise,
        });
        remaining -= take;
    }

    Allocation {
        deductions,
        shortfall: remaining,
    }
}
