// src/pipeline/delta.rs

//! Delta calculation against the per-source cursor.
//!
//! Given the current page snapshot and the last seen identifier, computes
//! the items that are new and the running high-water mark. Pure and total
//! over well-formed input; malformed rows were filtered upstream by
//! identifier extraction.

use crate::models::RawItem;

/// Result of one delta computation.
#[derive(Debug, Clone, Default)]
pub struct Delta {
    /// New items, sorted ascending by identifier (oldest first). Empty on
    /// a first run even when the page has items.
    pub new_items: Vec<RawItem>,

    /// Highest identifier observed, never below the incoming cursor.
    pub candidate_max: u64,
}

impl Delta {
    /// Whether the cursor should advance after this computation.
    pub fn advanced(&self, last_seen: u64) -> bool {
        self.candidate_max > last_seen
    }
}

/// Compute the delta for one source.
///
/// Items with identifier 0 are discarded. The first encounter with a board
/// (`last_seen == 0`) establishes a baseline: the cursor advances to the
/// page maximum but nothing is reported, so a cold start never floods the
/// channel with backlog.
pub fn compute(items: &[RawItem], last_seen: u64) -> Delta {
    let mut candidate_max = last_seen;
    let mut new_items: Vec<RawItem> = Vec::new();

    for item in items {
        if item.external_id == 0 {
            continue;
        }
        if item.external_id > candidate_max {
            candidate_max = item.external_id;
        }
        if item.external_id > last_seen {
            new_items.push(item.clone());
        }
    }

    // Baseline establishment: never notify on backlog discovered at cold start.
    if last_seen == 0 {
        new_items.clear();
    }

    new_items.sort_by_key(|item| item.external_id);

    Delta {
        new_items,
        candidate_max,
    }
}
