// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use reqwest::Client;

use crate::error::{AppError, Result};
use crate::models::CrawlerConfig;

/// Create a configured HTTP client with bounded connect and read timeouts.
/// The cookie store carries the portal session across requests.
pub fn create_client(config: &CrawlerConfig) -> Result<Client> {
    let client = Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .cookie_store(true)
        .build()?;
    Ok(client)
}

/// Fetch a page body, retrying only server-side transient failures
/// (5xx and network errors) with exponential backoff. Client-side
/// failures (4xx) are returned immediately.
///
/// `max_retries` counts extra attempts after the first, so 2 means up to
/// three requests total.
pub async fn get_text_with_retry(client: &Client, url: &str, max_retries: u32) -> Result<String> {
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match client.get(url).send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return Ok(response.text().await?);
                }
                if status.is_server_error() && within_retry_budget(attempt, max_retries) {
                    backoff(attempt).await;
                    continue;
                }
                return Err(AppError::fetch(url, format!("status {status}")));
            }
            Err(e) if is_retryable(&e) && within_retry_budget(attempt, max_retries) => {
                log::debug!("Retrying {} after network error: {}", url, e);
                backoff(attempt).await;
            }
            Err(e) => return Err(AppError::Http(e)),
        }
    }
}

fn is_retryable(error: &reqwest::Error) -> bool {
    if error.is_timeout() || error.is_connect() {
        return true;
    }
    matches!(error.status(), Some(s) if s.is_server_error())
}

/// Whether a failed `attempt` (1-based) may still be retried given a budget
/// of `max_retries` extra attempts.
pub(crate) fn within_retry_budget(attempt: u32, max_retries: u32) -> bool {
    attempt <= max_retries
}

pub(crate) async fn backoff(attempt: u32) {
    tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
}
