// src/utils/url.rs

//! URL manipulation and identifier extraction.

use std::sync::OnceLock;

use regex::Regex;

use crate::models::IdPattern;

/// Resolve a potentially relative URL against a base URL.
///
/// # Examples
/// ```
/// use notibot::utils::url::resolve;
///
/// assert_eq!(
///     resolve("https://example.com/path/", "page.html"),
///     "https://example.com/path/page.html"
/// );
/// ```
pub fn resolve(base: &str, href: &str) -> String {
    // Already absolute
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }

    // Absolute path - combine with base domain
    if href.starts_with('/') {
        return resolve_absolute_path(base, href);
    }

    // Relative path - combine with base directory
    resolve_relative_path(base, href)
}

fn resolve_absolute_path(base: &str, href: &str) -> String {
    if let Some(scheme_end) = base.find("://") {
        let after_scheme = &base[scheme_end + 3..];
        if let Some(slash_idx) = after_scheme.find('/') {
            let domain = &base[..scheme_end + 3 + slash_idx];
            return format!("{domain}{href}");
        }
    }
    format!("{}{}", base.trim_end_matches('/'), href)
}

fn resolve_relative_path(base: &str, href: &str) -> String {
    let base_dir = if base.ends_with('/') {
        base.to_string()
    } else {
        match base.rfind('/') {
            Some(idx) => base[..=idx].to_string(),
            None => format!("{base}/"),
        }
    };

    format!("{base_dir}{href}")
}

fn underscore_suffix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"_(\d+)$").unwrap())
}

fn slash_suffix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/(\d+)$").unwrap())
}

/// Derive the integer identifier from an item link.
///
/// Returns 0 when no identifier can be derived; callers treat that as
/// "skip this item", never as an error.
pub fn extract_id(link: &str, pattern: &IdPattern) -> u64 {
    match pattern {
        IdPattern::Query { param } => extract_query_id(link, param),
        IdPattern::Suffix => extract_suffix_id(link),
    }
}

fn extract_query_id(link: &str, param: &str) -> u64 {
    let Ok(parsed) = url::Url::parse(link) else {
        return 0;
    };

    for (key, value) in parsed.query_pairs() {
        if key == param {
            return value.parse().unwrap_or(0);
        }
    }
    0
}

fn extract_suffix_id(link: &str) -> u64 {
    if let Some(caps) = underscore_suffix_re().captures(link) {
        return caps[1].parse().unwrap_or(0);
    }

    // Fallback: trailing path segment digits
    if let Some(caps) = slash_suffix_re().captures(link) {
        return caps[1].parse().unwrap_or(0);
    }

    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_absolute_url() {
        assert_eq!(
            resolve("https://example.com/path/", "https://other.com/page"),
            "https://other.com/page"
        );
    }

    #[test]
    fn test_resolve_absolute_path() {
        assert_eq!(
            resolve("https://example.com/path/", "/root.html"),
            "https://example.com/root.html"
        );
    }

    #[test]
    fn test_resolve_relative_path() {
        assert_eq!(
            resolve("https://example.com/path/", "page.html"),
            "https://example.com/path/page.html"
        );
    }

    #[test]
    fn test_extract_query_id() {
        let pattern = IdPattern::Query { param: "no".into() };
        assert_eq!(
            extract_id("https://example.com/_prog/_board/?code=sub05&no=4321", &pattern),
            4321
        );
        assert_eq!(extract_id("https://example.com/?code=sub05", &pattern), 0);
    }

    #[test]
    fn test_extract_query_id_article_no() {
        let pattern = IdPattern::Query {
            param: "articleNo".into(),
        };
        assert_eq!(
            extract_id(
                "https://example.com/notice/bachelor.do?mode=view&articleNo=998877",
                &pattern
            ),
            998877
        );
    }

    #[test]
    fn test_extract_suffix_underscore() {
        assert_eq!(
            extract_id("https://example.com/bbs/content/1_123456", &IdPattern::Suffix),
            123456
        );
    }

    #[test]
    fn test_extract_suffix_slash_fallback() {
        assert_eq!(
            extract_id("https://example.com/bbs/view/9999", &IdPattern::Suffix),
            9999
        );
    }

    #[test]
    fn test_extract_no_id_is_zero() {
        assert_eq!(
            extract_id("https://example.com/bbs/list", &IdPattern::Suffix),
            0
        );
        assert_eq!(extract_id("not a url", &IdPattern::Query { param: "no".into() }), 0);
    }
}
