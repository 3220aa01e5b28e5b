// src/error.rs

//! Unified error handling for the notification bot.

use std::fmt;

use thiserror::Error;

/// Result type alias for bot operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Network-level failure while fetching a source
    #[error("Fetch error for {source_id}: {message}")]
    Fetch { source_id: String, message: String },

    /// The page or session yielded no recognizable rows at all
    #[error("No rows recognized for {source_id}")]
    Structure { source_id: String },

    /// Message delivery to the webhook failed
    #[error("Delivery error: {0}")]
    Delivery(String),
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a fetch error with source context.
    pub fn fetch(source_id: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Fetch {
            source_id: source_id.into(),
            message: message.to_string(),
        }
    }

    /// Create a structural mismatch error for a source.
    pub fn structure(source_id: impl Into<String>) -> Self {
        Self::Structure {
            source_id: source_id.into(),
        }
    }

    /// Create a delivery error.
    pub fn delivery(message: impl fmt::Display) -> Self {
        Self::Delivery(message.to_string())
    }

    /// Short category label for operator alerts. Alerts stay terse;
    /// full detail goes to the log.
    pub fn alert_category(&self) -> &'static str {
        match self {
            Self::Structure { .. } => "no rows found",
            Self::Fetch { .. } | Self::Http(_) => "fetch failed",
            Self::Delivery(_) => "delivery failed",
            _ => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_and_structure_display_include_source_id() {
        assert_eq!(
            AppError::fetch("library", "timeout").to_string(),
            "Fetch error for library: timeout"
        );
        assert_eq!(
            AppError::structure("library").to_string(),
            "No rows recognized for library"
        );
    }

    #[test]
    fn alert_category_distinguishes_structure_from_fetch() {
        assert_eq!(AppError::structure("lib").alert_category(), "no rows found");
        assert_eq!(
            AppError::fetch("lib", "timeout").alert_category(),
            "fetch failed"
        );
    }
}
