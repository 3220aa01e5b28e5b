// src/pipeline/aggregate.rs

//! Aggregation of composite announcements.
//!
//! A composite announcement bundles several sub-programs, each with its own
//! application window, operating period, and capacity. This module collapses
//! them into one summary line: the earliest application deadline (the most
//! urgent constraint), the merged operating window, and the smallest
//! capacity (the binding constraint for an applicant). Unparseable free
//! text contributes nothing; it never fails.

use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;

use crate::models::SubItem;

/// Summary derived from a composite item's sub-programs. Recomputed every
/// run, never persisted. Absent fields are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregatedSummary {
    /// Earliest application deadline, rendered "~MM.DD"
    pub apply: String,

    /// Merged operating window, "MM.DD HH:MM~HH:MM" when it collapses to a
    /// single day, "MM.DD~MM.DD" otherwise
    pub oper: String,

    /// Smallest capacity, rendered "{n}명"
    pub capacity: String,
}

impl AggregatedSummary {
    pub fn is_empty(&self) -> bool {
        self.apply.is_empty() && self.oper.is_empty() && self.capacity.is_empty()
    }
}

/// Parse a page timestamp: "YYYY.MM.DD HH:MM" or "YYYY.MM.DD".
fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if text.contains(':') {
        NaiveDateTime::parse_from_str(text, "%Y.%m.%d %H:%M").ok()
    } else {
        NaiveDate::parse_from_str(text, "%Y.%m.%d")
            .ok()
            .map(|d| d.and_hms_opt(0, 0, 0).unwrap())
    }
}

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").unwrap())
}

/// First number in a capacity string, e.g. "30명" -> 30.
fn parse_capacity(text: &str) -> Option<u32> {
    number_re()
        .find(text)
        .and_then(|m| m.as_str().parse().ok())
}

/// Collapse sub-programs into one summary.
pub fn aggregate(sub_items: &[SubItem]) -> AggregatedSummary {
    let mut app_ends: Vec<NaiveDateTime> = Vec::new();
    let mut oper_starts: Vec<NaiveDateTime> = Vec::new();
    let mut oper_ends: Vec<NaiveDateTime> = Vec::new();
    let mut capacities: Vec<u32> = Vec::new();

    for item in sub_items {
        if !item.detail.apply_raw.is_empty() {
            let parts: Vec<&str> = item.detail.apply_raw.split('~').collect();
            if parts.len() > 1 {
                if let Some(end) = parse_timestamp(parts[1]) {
                    app_ends.push(end);
                }
            }
        }

        if !item.detail.oper_raw.is_empty() {
            let parts: Vec<&str> = item.detail.oper_raw.split('~').collect();
            let start = parts.first().and_then(|s| parse_timestamp(s));
            if let Some(start) = start {
                oper_starts.push(start);
            }
            if parts.len() > 1 {
                if let Some(end) = parse_timestamp(parts[1]) {
                    oper_ends.push(end);
                }
            } else if let Some(start) = start {
                // Only a start given: treat the window as that single point.
                oper_ends.push(start);
            }
        }

        if let Some(capacity) = parse_capacity(&item.detail.capacity_raw) {
            capacities.push(capacity);
        }
    }

    let mut summary = AggregatedSummary::default();

    if let Some(min_end) = app_ends.iter().min() {
        summary.apply = format!("~{}", min_end.format("%m.%d"));
    }

    if let (Some(&min_start), Some(&max_end)) =
        (oper_starts.iter().min(), oper_ends.iter().max())
    {
        if min_start.date() == max_end.date() {
            summary.oper = format!(
                "{}~{}",
                min_start.format("%m.%d %H:%M"),
                max_end.format("%H:%M")
            );
        } else {
            summary.oper = format!("{}~{}", min_start.format("%m.%d"), max_end.format("%m.%d"));
        }
    }

    if let Some(min_capacity) = capacities.iter().min() {
        summary.capacity = format!("{min_capacity}명");
    }

    summary
}
