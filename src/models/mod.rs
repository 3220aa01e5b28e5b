// src/models/mod.rs

//! Data model definitions.

pub mod config;
pub mod source;

pub use config::{CleaningConfig, Config, CrawlerConfig, PortalConfig, WebhookConfig};
pub use source::{DetailFields, IdPattern, RawItem, SelectorSet, Source, SourceKind, SubItem};
