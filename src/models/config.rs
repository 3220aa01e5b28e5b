// src/models/config.rs

//! Application configuration structures.

use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::source::Source;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and pacing behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Webhook destinations
    #[serde(default)]
    pub webhooks: WebhookConfig,

    /// Portal login settings (only needed for portal sources)
    #[serde(default)]
    pub portal: PortalConfig,

    /// Text preprocessing settings
    #[serde(default)]
    pub cleaning: CleaningConfig,

    /// Cursor file path
    #[serde(default = "defaults::cursor_file")]
    pub cursor_file: String,

    /// Monitored sources
    #[serde(default)]
    pub sources: Vec<Source>,
}

impl Config {
    /// Load configuration from a TOML file and apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            let mut config = Self::default();
            config.apply_env_overrides();
            config
        })
    }

    /// Secrets come from the environment, overriding anything in the file.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = env::var("NOTIBOT_WEBHOOK_URL") {
            self.webhooks.notify_url = url;
        }
        if let Ok(url) = env::var("MONITOR_WEBHOOK_URL") {
            self.webhooks.monitor_url = Some(url);
        }
        if let Ok(id) = env::var("PORTAL_ID") {
            self.portal.user_id = id;
        }
        if let Ok(pw) = env::var("PORTAL_PW") {
            self.portal.password = pw;
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.sources.is_empty() {
            return Err(AppError::validation("No sources defined"));
        }

        let mut seen = std::collections::HashSet::new();
        for source in &self.sources {
            if !seen.insert(source.id.as_str()) {
                return Err(AppError::validation(format!(
                    "Duplicate source id: {}",
                    source.id
                )));
            }

            scraper::Selector::parse(&source.selectors.row_selector)
                .map_err(|e| AppError::selector(&source.selectors.row_selector, format!("{e:?}")))?;
            for sel in &source.selectors.title_selectors {
                scraper::Selector::parse(sel)
                    .map_err(|e| AppError::selector(sel, format!("{e:?}")))?;
            }
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            crawler: CrawlerConfig::default(),
            webhooks: WebhookConfig::default(),
            portal: PortalConfig::default(),
            cleaning: CleaningConfig::default(),
            cursor_file: defaults::cursor_file(),
            sources: Vec::new(),
        }
    }
}

/// HTTP client and pacing behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Read timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Connect timeout in seconds
    #[serde(default = "defaults::connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Politeness delay between consecutive sources in milliseconds
    #[serde(default = "defaults::pacing_delay")]
    pub pacing_delay_ms: u64,

    /// Delay between consecutive portal item messages in milliseconds
    #[serde(default = "defaults::send_delay")]
    pub send_delay_ms: u64,

    /// Extra fetch attempts after the first for 5xx/network failures
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            connect_timeout_secs: defaults::connect_timeout(),
            pacing_delay_ms: defaults::pacing_delay(),
            send_delay_ms: defaults::send_delay(),
            max_retries: defaults::max_retries(),
        }
    }
}

/// Webhook destinations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Student-facing notification webhook
    #[serde(default)]
    pub notify_url: String,

    /// Operator alert webhook. Unset disables alerting silently.
    #[serde(default)]
    pub monitor_url: Option<String>,

    /// Webhook POST timeout in seconds
    #[serde(default = "defaults::webhook_timeout")]
    pub timeout_secs: u64,

    /// Extra webhook POST attempts after the first
    #[serde(default = "defaults::webhook_retries")]
    pub max_retries: u32,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            notify_url: String::new(),
            monitor_url: None,
            timeout_secs: defaults::webhook_timeout(),
            max_retries: defaults::webhook_retries(),
        }
    }
}

/// Portal login settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Login endpoint
    #[serde(default)]
    pub login_url: String,

    #[serde(default)]
    pub user_id: String,

    #[serde(default)]
    pub password: String,

    /// Logout endpoint, hit when the run ends to release the session
    #[serde(default)]
    pub logout_url: Option<String>,

    /// How many list pages to scan per run
    #[serde(default = "defaults::portal_pages")]
    pub max_pages: u32,

    /// Query parameter used for list pagination
    #[serde(default = "defaults::page_param")]
    pub page_param: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            login_url: String::new(),
            user_id: String::new(),
            password: String::new(),
            logout_url: None,
            max_pages: defaults::portal_pages(),
            page_param: defaults::page_param(),
        }
    }
}

/// Text cleaning/preprocessing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleaningConfig {
    /// Badge text to strip out of titles ("새글" markers and the like)
    #[serde(default = "defaults::title_remove_patterns")]
    pub title_remove_patterns: Vec<String>,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            title_remove_patterns: defaults::title_remove_patterns(),
        }
    }
}

impl CleaningConfig {
    /// Collapse whitespace and strip badge patterns from a title.
    pub fn clean_title(&self, text: &str) -> String {
        let mut result = text.split_whitespace().collect::<Vec<_>>().join(" ");
        for pattern in &self.title_remove_patterns {
            result = result.replace(pattern, "");
        }
        result.trim().to_string()
    }
}

mod defaults {
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; notibot/0.1)".into()
    }
    pub fn timeout() -> u64 {
        10
    }
    pub fn connect_timeout() -> u64 {
        5
    }
    pub fn pacing_delay() -> u64 {
        1000
    }
    pub fn send_delay() -> u64 {
        250
    }
    pub fn max_retries() -> u32 {
        2
    }
    pub fn webhook_timeout() -> u64 {
        5
    }
    pub fn webhook_retries() -> u32 {
        2
    }
    pub fn portal_pages() -> u32 {
        3
    }
    pub fn page_param() -> String {
        "page".into()
    }
    pub fn cursor_file() -> String {
        "data/cursors.json".into()
    }
    pub fn title_remove_patterns() -> Vec<String> {
        vec!["새글".into()]
    }
}
