// src/services/portal.rs

//! Extraction for the login-gated program portal.
//!
//! The portal lists extracurricular programs; an entry may be composite,
//! bundling several sub-programs with their own application windows,
//! operating periods, and capacities. The login session is a scoped
//! resource: acquired in `begin`, released in `finish` on every exit path
//! of a run, since it may hold a server-side session slot.

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{CleaningConfig, CrawlerConfig, DetailFields, PortalConfig};
use crate::models::{RawItem, Source, SubItem};
use crate::services::SourceExtractor;
use crate::utils::http;
use crate::utils::url::{extract_id, resolve};

// Portal markup assumptions live here, with the collaborator that owns them.
const TITLE_SELECTOR: &str = "a.tit";
const LABEL_SELECTOR: &str = ".label";
const D_DAY_SELECTOR: &str = "span.day";
const COMPOSITE_CLASS: &str = "multi_class";
const SUB_ITEM_SELECTOR: &str = ".class_cont";
const PERIOD_SELECTOR: &str = ".etc_info_txt dl";
const CAPACITY_SELECTOR: &str = ".rq_desc dl";

/// Extractor for the authenticated portal.
pub struct PortalExtractor {
    client: Client,
    portal: PortalConfig,
    cleaning: CleaningConfig,
    max_retries: u32,
}

impl PortalExtractor {
    pub fn new(
        config: &CrawlerConfig,
        portal: PortalConfig,
        cleaning: CleaningConfig,
    ) -> Result<Self> {
        Ok(Self {
            client: http::create_client(config)?,
            portal,
            cleaning,
            max_retries: config.max_retries,
        })
    }

    fn page_url(&self, base: &str, page: u32) -> String {
        if page <= 1 {
            return base.to_string();
        }
        let sep = if base.contains('?') { '&' } else { '?' };
        format!("{base}{sep}{}={page}", self.portal.page_param)
    }
}

#[async_trait]
impl SourceExtractor for PortalExtractor {
    /// Log in once per run. The client's cookie jar carries the session.
    async fn begin(&self) -> Result<()> {
        if self.portal.login_url.is_empty() {
            return Ok(());
        }

        let response = self
            .client
            .post(&self.portal.login_url)
            .form(&[
                ("userId", self.portal.user_id.as_str()),
                ("password", self.portal.password.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::fetch(
                &self.portal.login_url,
                format!("login failed with status {}", response.status()),
            ));
        }

        log::info!("Portal session established");
        Ok(())
    }

    async fn extract(&self, source: &Source) -> Result<Vec<RawItem>> {
        let mut items = Vec::new();

        for page in 1..=self.portal.max_pages {
            let url = self.page_url(&source.url, page);
            let html = http::get_text_with_retry(&self.client, &url, self.max_retries).await?;
            let page_items = parse_portal_page(&html, source, &self.cleaning)?;

            if page_items.is_empty() {
                // First page must have rows; later pages may simply run out.
                if page == 1 {
                    return Err(AppError::structure(&source.id));
                }
                break;
            }
            items.extend(page_items);
        }

        Ok(items)
    }

    /// Release the server-side session.
    async fn finish(&self) {
        let Some(logout_url) = self.portal.logout_url.as_deref() else {
            return;
        };
        match self.client.get(logout_url).send().await {
            Ok(_) => log::info!("Portal session released"),
            Err(e) => log::warn!("Portal logout failed: {}", e),
        }
    }
}

/// Parse one portal list page. Returns an empty vec for a page without
/// program rows; the caller decides whether that is a structural mismatch.
pub fn parse_portal_page(
    html: &str,
    source: &Source,
    cleaning: &CleaningConfig,
) -> Result<Vec<RawItem>> {
    let document = Html::parse_document(html);
    let row_sel = parse_selector(&source.selectors.row_selector)?;
    let title_sel = parse_selector(TITLE_SELECTOR)?;
    let label_sel = parse_selector(LABEL_SELECTOR)?;
    let d_day_sel = parse_selector(D_DAY_SELECTOR)?;
    let sub_sel = parse_selector(SUB_ITEM_SELECTOR)?;

    let mut items = Vec::new();
    for row in document.select(&row_sel) {
        let Some(anchor) = row.select(&title_sel).next() else {
            continue;
        };

        let title = cleaning.clean_title(&text_without_label(&anchor, &label_sel));
        if title.is_empty() {
            continue;
        }

        let href = anchor
            .value()
            .attr(source.selectors.link_attr.as_str())
            .unwrap_or("");
        let link = resolve(&source.url, href);
        let external_id = extract_id(&link, &source.id_pattern);

        let d_day = row
            .select(&d_day_sel)
            .next()
            .map(|el| cleaning.clean_title(&el.text().collect::<String>()))
            .unwrap_or_default();

        let is_composite = row
            .value()
            .classes()
            .any(|c| c == COMPOSITE_CLASS);

        let mut item = RawItem {
            external_id,
            title,
            link,
            d_day,
            ..RawItem::default()
        };

        if is_composite {
            for sub in row.select(&sub_sel) {
                if sub.text().collect::<String>().trim().is_empty() {
                    continue;
                }
                let Some(sub_anchor) = sub.select(&title_sel).next() else {
                    continue;
                };
                let sub_title = cleaning.clean_title(&text_without_label(&sub_anchor, &label_sel));
                if sub_title.is_empty() {
                    continue;
                }
                item.sub_items.push(SubItem {
                    title: sub_title,
                    detail: extract_details(&sub, cleaning)?,
                });
            }
        } else {
            item.detail = extract_details(&row, cleaning)?;
        }

        items.push(item);
    }

    Ok(items)
}

/// Anchor text with any badge label removed.
fn text_without_label(anchor: &ElementRef, label_sel: &Selector) -> String {
    let full: String = anchor.text().collect();
    match anchor.select(label_sel).next() {
        Some(label) => {
            let label_text: String = label.text().collect();
            full.replace(&label_text, "")
        }
        None => full,
    }
}

/// Pull the application/operation/capacity fields out of a program block.
fn extract_details(container: &ElementRef, cleaning: &CleaningConfig) -> Result<DetailFields> {
    let period_sel = parse_selector(PERIOD_SELECTOR)?;
    let capacity_sel = parse_selector(CAPACITY_SELECTOR)?;
    let dt_sel = parse_selector("dt")?;
    let dd_sel = parse_selector("dd")?;

    let mut detail = DetailFields::default();

    for dl in container.select(&period_sel) {
        let (Some(dt), Some(dd)) = (dl.select(&dt_sel).next(), dl.select(&dd_sel).next()) else {
            continue;
        };
        let label: String = dt.text().collect();
        let value = cleaning.clean_title(&dd.text().collect::<String>());

        if label.contains("신청") {
            detail.apply_raw = value;
        } else if label.contains("운영") || label.contains("교육기간") {
            detail.oper_raw = value;
        }
    }

    for dl in container.select(&capacity_sel) {
        let (Some(dt), Some(dd)) = (dl.select(&dt_sel).next(), dl.select(&dd_sel).next()) else {
            continue;
        };
        let label: String = dt.text().collect();
        if label.contains("모집") || label.contains("정원") {
            detail.capacity_raw = cleaning.clean_title(&dd.text().collect::<String>());
        }
    }

    Ok(detail)
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}
