// src/services/webhook.rs

//! Message delivery over Discord-style webhooks.
//!
//! Delivery is at-most-once from the engine's point of view: the
//! orchestrator never lets a delivery failure block a cursor update, so a
//! flaky channel cannot cause re-delivery storms.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::WebhookConfig;
use crate::utils::http::{backoff, within_retry_budget};

/// Delivery collaborator contract: transport one text payload to one
/// destination.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn send(&self, content: &str) -> Result<()>;
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    content: &'a str,
}

/// Posts `{"content": …}` to a webhook URL with bounded timeout and
/// bounded retry (network errors and 5xx only, exponential backoff).
/// `max_retries` counts extra attempts after the first, same as the
/// fetch-side retry budget.
#[derive(Clone)]
pub struct WebhookDispatcher {
    url: String,
    client: Client,
    timeout: Duration,
    max_retries: u32,
}

impl WebhookDispatcher {
    pub fn new(url: String, config: &WebhookConfig) -> Self {
        Self {
            url,
            client: Client::new(),
            timeout: Duration::from_secs(config.timeout_secs),
            max_retries: config.max_retries,
        }
    }
}

#[async_trait]
impl Dispatcher for WebhookDispatcher {
    async fn send(&self, content: &str) -> Result<()> {
        if self.url.is_empty() {
            return Err(AppError::delivery("webhook URL not configured"));
        }

        let payload = WebhookPayload { content };
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let result = self
                .client
                .post(&self.url)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            match result {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(());
                    }
                    if status.is_server_error() && within_retry_budget(attempt, self.max_retries) {
                        backoff(attempt).await;
                        continue;
                    }
                    return Err(AppError::delivery(format!("webhook status {status}")));
                }
                Err(e) => {
                    if within_retry_budget(attempt, self.max_retries) {
                        backoff(attempt).await;
                        continue;
                    }
                    return Err(AppError::delivery(e));
                }
            }
        }
    }
}
