// src/pipeline/format.rs

//! Notification message rendering.
//!
//! Two deterministic shapes: a grouped batch for plain boards (one header,
//! one line per new post) and a single-item shape for portal programs with
//! an aggregated summary line. Missing optional fields are omitted, never
//! an error.

use std::sync::OnceLock;

use regex::Regex;

use crate::models::{RawItem, Source};
use crate::pipeline::aggregate::{AggregatedSummary, aggregate};

/// Render a batch of new board posts as one grouped message.
///
/// Items are rendered in the order given (the delta's ascending-id order).
/// Pinned posts get a filled marker.
pub fn format_batch(source: &Source, items: &[RawItem]) -> String {
    let mut content = format!(
        "### {} [{}] 새 글 {}건\n\n",
        source.icon,
        source.name,
        items.len()
    );

    for item in items {
        let marker = if item.pinned { "▶" } else { "▷" };
        content.push_str(&format!("{} [{}](<{}>)\n", marker, item.title, item.link));
    }

    content
}

/// Render one portal program as a standalone message.
///
/// Composite items get the first sub-program title plus a count of the
/// rest, then the aggregated application/operation/capacity fields.
/// Simple items show their own ranges reformatted to short month.day
/// notation.
pub fn format_portal_item(item: &RawItem) -> String {
    let d_day_part = if item.d_day.is_empty() {
        String::new()
    } else {
        format!("{} | ", item.d_day)
    };
    let mut content = format!("### 📢 [{}{}]({})\n", d_day_part, item.title, item.link);

    if item.is_composite() {
        let first = &item.sub_items[0].title;
        let rest = item.sub_items.len() - 1;
        if rest > 0 {
            content.push_str(&format!("- {first} 외 {rest}개\n"));
        } else {
            content.push_str(&format!("- {first}\n"));
        }
        content.push_str(&summary_line(&aggregate(&item.sub_items)));
    } else {
        content.push_str(&simple_summary_line(item));
    }

    content
}

/// Join the non-empty summary fields with a separator.
fn summary_line(summary: &AggregatedSummary) -> String {
    let mut parts = Vec::new();
    if !summary.apply.is_empty() {
        parts.push(format!("**신청**: {}", summary.apply));
    }
    if !summary.oper.is_empty() {
        parts.push(format!("**운영**: {}", summary.oper));
    }
    if !summary.capacity.is_empty() {
        parts.push(format!("**정원**: {}", summary.capacity));
    }

    if parts.is_empty() {
        String::new()
    } else {
        format!("{}\n", parts.join(" | "))
    }
}

fn simple_summary_line(item: &RawItem) -> String {
    let mut parts = Vec::new();
    if !item.detail.apply_raw.is_empty() {
        parts.push(format!(
            "**신청**: {}",
            format_single_period(&item.detail.apply_raw, true)
        ));
    }
    if !item.detail.oper_raw.is_empty() {
        parts.push(format!(
            "**운영**: {}",
            format_single_period(&item.detail.oper_raw, false)
        ));
    }
    if !item.detail.capacity_raw.is_empty() {
        parts.push(format!("**정원**: {}", item.detail.capacity_raw));
    }

    if parts.is_empty() {
        String::new()
    } else {
        format!("{}\n", parts.join(" | "))
    }
}

fn short_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d{4}\.(\d{2}\.\d{2})").unwrap())
}

/// Drop the year from "YYYY.MM.DD ..." text, leaving "MM.DD".
fn short_date(raw: &str) -> String {
    match short_date_re().captures(raw) {
        Some(caps) => caps[1].to_string(),
        None => raw.trim().to_string(),
    }
}

/// Reformat a raw "start ~ end" range. Application ranges keep only the
/// deadline ("~MM.DD"); others keep both ends.
fn format_single_period(raw: &str, is_apply: bool) -> String {
    let parts: Vec<&str> = raw.split('~').collect();
    if parts.len() < 2 {
        return raw.trim().to_string();
    }
    let start = short_date(parts[0]);
    let end = short_date(parts[1]);
    if is_apply {
        format!("~{end}")
    } else {
        format!("{start}~{end}")
    }
}
