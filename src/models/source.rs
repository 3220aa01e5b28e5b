// src/models/source.rs

//! Source definitions and the item types produced by extraction.

use serde::{Deserialize, Serialize};

/// How a source is fetched and what its items look like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Plain HTML table board, fetched with a single GET.
    #[default]
    Board,
    /// Login-gated portal listing programs, possibly composite.
    Portal,
}

/// How to derive the integer identifier from an item link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IdPattern {
    /// Numeric query parameter, e.g. `?no=123` or `?articleNo=123`.
    Query { param: String },
    /// Numeric suffix: `_123` primary, trailing `/123` fallback.
    Suffix,
}

impl Default for IdPattern {
    fn default() -> Self {
        Self::Suffix
    }
}

/// CSS selectors for pulling rows out of a board page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorSet {
    /// Selector for one announcement row
    #[serde(default = "defaults::row_selector")]
    pub row_selector: String,

    /// Selectors for the title anchor, tried in order
    #[serde(default = "defaults::title_selectors")]
    pub title_selectors: Vec<String>,

    /// Attribute holding the link on the title anchor
    #[serde(default = "defaults::link_attr")]
    pub link_attr: String,

    /// Row class that marks a pinned announcement
    #[serde(default)]
    pub pinned_class: Option<String>,
}

impl Default for SelectorSet {
    fn default() -> Self {
        Self {
            row_selector: defaults::row_selector(),
            title_selectors: defaults::title_selectors(),
            link_attr: defaults::link_attr(),
            pinned_class: None,
        }
    }
}

mod defaults {
    pub fn row_selector() -> String {
        "tbody > tr".into()
    }
    pub fn title_selectors() -> Vec<String> {
        vec!["td.title a".into(), "td.subject a".into(), "a".into()]
    }
    pub fn link_attr() -> String {
        "href".into()
    }
    pub fn icon() -> String {
        "📢".into()
    }
}

/// One monitored board or feed. Immutable configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    /// Stable key, also the cursor key
    pub id: String,

    /// Display name used in notification headers
    pub name: String,

    /// List page URL
    pub url: String,

    /// Emoji prefix for notification headers
    #[serde(default = "defaults::icon")]
    pub icon: String,

    #[serde(default)]
    pub kind: SourceKind,

    #[serde(default)]
    pub selectors: SelectorSet,

    #[serde(default)]
    pub id_pattern: IdPattern,
}

/// Free-text date/capacity ranges as shown on the page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailFields {
    /// Application window, e.g. "2026.03.01 09:00 ~ 2026.03.05 18:00"
    #[serde(default)]
    pub apply_raw: String,

    /// Operating window
    #[serde(default)]
    pub oper_raw: String,

    /// Capacity, e.g. "30명"
    #[serde(default)]
    pub capacity_raw: String,
}

impl DetailFields {
    pub fn is_empty(&self) -> bool {
        self.apply_raw.is_empty() && self.oper_raw.is_empty() && self.capacity_raw.is_empty()
    }
}

/// A sub-program inside a composite announcement. No identifier of its own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubItem {
    pub title: String,

    #[serde(default)]
    pub detail: DetailFields,
}

/// One announcement row as extracted from a page. Produced fresh on every
/// fetch, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawItem {
    /// Integer identifier derived from the link. 0 means no valid
    /// identifier could be extracted and the item is discarded upstream.
    pub external_id: u64,

    pub title: String,

    /// Absolute URL
    pub link: String,

    /// Pinned/top announcement
    #[serde(default)]
    pub pinned: bool,

    /// D-day badge text, e.g. "D-3" (portal items only)
    #[serde(default)]
    pub d_day: String,

    /// Own date/capacity fields (simple portal items)
    #[serde(default)]
    pub detail: DetailFields,

    /// Non-empty marks a composite announcement
    #[serde(default)]
    pub sub_items: Vec<SubItem>,
}

impl RawItem {
    /// Whether this item bundles multiple independently-dated sub-programs.
    pub fn is_composite(&self) -> bool {
        !self.sub_items.is_empty()
    }
}
