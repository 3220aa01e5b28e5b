// src/services/boards.rs

//! Extraction for plain HTML table boards.
//!
//! One GET per source, rows selected with the source's configured CSS
//! selectors. A page with zero recognizable rows is a structural mismatch,
//! not an empty result: board list pages always show a window of recent
//! posts, so "nothing found" means the markup changed.

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{CleaningConfig, CrawlerConfig, RawItem, Source};
use crate::services::SourceExtractor;
use crate::utils::http;
use crate::utils::url::{extract_id, resolve};

/// Extractor for plain HTML boards.
pub struct BoardExtractor {
    client: Client,
    cleaning: CleaningConfig,
    max_retries: u32,
}

impl BoardExtractor {
    pub fn new(config: &CrawlerConfig, cleaning: CleaningConfig) -> Result<Self> {
        Ok(Self {
            client: http::create_client(config)?,
            cleaning,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl SourceExtractor for BoardExtractor {
    async fn extract(&self, source: &Source) -> Result<Vec<RawItem>> {
        let html = http::get_text_with_retry(&self.client, &source.url, self.max_retries).await?;
        parse_board_page(&html, source, &self.cleaning)
    }
}

/// Parse one board list page into raw items.
///
/// Rows without a usable title anchor are skipped silently. Rows whose link
/// yields no identifier are kept with id 0; the delta stage discards them,
/// and a page where every row comes out as 0 is rejected at the source
/// boundary.
pub fn parse_board_page(
    html: &str,
    source: &Source,
    cleaning: &CleaningConfig,
) -> Result<Vec<RawItem>> {
    let document = Html::parse_document(html);
    let row_sel = parse_selector(&source.selectors.row_selector)?;

    let title_sels: Vec<Selector> = source
        .selectors
        .title_selectors
        .iter()
        .map(|s| parse_selector(s))
        .collect::<Result<_>>()?;

    let rows: Vec<_> = document.select(&row_sel).collect();
    if rows.is_empty() {
        return Err(AppError::structure(&source.id));
    }

    let mut items = Vec::new();
    for row in rows {
        // Title anchor selectors are tried in order; boards differ in
        // which cell carries the link.
        let Some(anchor) = title_sels.iter().find_map(|sel| row.select(sel).next()) else {
            continue;
        };

        let raw_title = match anchor.value().attr("title") {
            Some(t) if !t.trim().is_empty() => t.to_string(),
            _ => anchor.text().collect::<String>(),
        };
        let title = cleaning.clean_title(&raw_title);
        if title.is_empty() {
            continue;
        }

        let href = anchor
            .value()
            .attr(source.selectors.link_attr.as_str())
            .unwrap_or("");
        let link = resolve(&source.url, href);
        let external_id = extract_id(&link, &source.id_pattern);

        let pinned = source
            .selectors
            .pinned_class
            .as_deref()
            .is_some_and(|class| {
                row.value()
                    .classes()
                    .any(|c| c.eq_ignore_ascii_case(class))
            });

        items.push(RawItem {
            external_id,
            title,
            link,
            pinned,
            ..RawItem::default()
        });
    }

    if items.is_empty() {
        return Err(AppError::structure(&source.id));
    }
    Ok(items)
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IdPattern, SelectorSet};

    fn library_source() -> Source {
        Source {
            id: "library".into(),
            name: "일반공지".into(),
            url: "https://library.example.ac.kr/bbs/list/1".into(),
            icon: "📚".into(),
            kind: Default::default(),
            selectors: SelectorSet {
                pinned_class: Some("always".into()),
                ..SelectorSet::default()
            },
            id_pattern: IdPattern::Suffix,
        }
    }

    const PAGE: &str = r#"
        <table><tbody>
            <tr class="always">
                <td class="title"><a href="/bbs/content/1_300" title="고정 공지">고정 공지</a></td>
            </tr>
            <tr>
                <td class="title"><a href="/bbs/content/1_301">새글 일반 공지</a></td>
            </tr>
            <tr>
                <td class="title"><a href="/bbs/list">링크 없음</a></td>
            </tr>
        </tbody></table>
    "#;

    #[test]
    fn parses_rows_with_ids_and_pinned_flag() {
        let items = parse_board_page(PAGE, &library_source(), &CleaningConfig::default()).unwrap();
        assert_eq!(items.len(), 3);

        assert_eq!(items[0].external_id, 300);
        assert!(items[0].pinned);
        assert_eq!(items[0].title, "고정 공지");
        assert_eq!(
            items[0].link,
            "https://library.example.ac.kr/bbs/content/1_300"
        );

        assert_eq!(items[1].external_id, 301);
        assert!(!items[1].pinned);
        // Badge text stripped by cleaning
        assert_eq!(items[1].title, "일반 공지");

        // No derivable identifier: kept with 0, discarded by the delta stage
        assert_eq!(items[2].external_id, 0);
    }

    #[test]
    fn empty_page_is_structural_mismatch() {
        let err = parse_board_page("<html><body></body></html>", &library_source(), &CleaningConfig::default())
            .unwrap_err();
        assert!(matches!(err, AppError::Structure { .. }));
    }

    #[test]
    fn query_param_id_pattern() {
        let mut source = library_source();
        source.id_pattern = IdPattern::Query { param: "no".into() };
        let page = r#"
            <table><tbody>
                <tr><td class="title"><a href="/_prog/_board/?code=sub05&no=4321">입주 공지</a></td></tr>
            </tbody></table>
        "#;
        let items = parse_board_page(page, &source, &CleaningConfig::default()).unwrap();
        assert_eq!(items[0].external_id, 4321);
    }
}
