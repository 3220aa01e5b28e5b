// src/lib.rs

//! notibot: campus board watcher with Discord webhook notifications.

pub mod cursor;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod utils;
