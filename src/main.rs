//! notibot CLI
//!
//! One invocation performs one full pass over the configured sources;
//! scheduling is left to cron or a CI workflow.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use notibot::cursor::CursorStore;
use notibot::error::Result;
use notibot::models::Config;
use notibot::pipeline::CrawlOrchestrator;
use notibot::services::{
    BoardExtractor, Dispatcher, KindExtractor, PortalExtractor, WebhookDispatcher,
};

/// notibot - campus board watcher
#[derive(Parser, Debug)]
#[command(name = "notibot", version, about = "Campus board watcher with Discord notifications")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check all sources once and dispatch notifications for new posts
    Run,

    /// Validate the configuration file
    Validate,

    /// Show the persisted cursors
    Status,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load_or_default(&cli.config);

    match cli.command {
        Command::Run => run(&config).await?,
        Command::Validate => {
            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK ({} sources)", config.sources.len());
        }
        Command::Status => {
            let cursors = CursorStore::load(&config.cursor_file);
            let entries = cursors.entries();
            if entries.is_empty() {
                log::info!("No cursors recorded yet.");
            }
            for (source_id, last_seen) in entries {
                log::info!("{}: last seen id {}", source_id, last_seen);
            }
        }
    }

    Ok(())
}

async fn run(config: &Config) -> Result<()> {
    config.validate()?;

    let extractor = KindExtractor::new(
        BoardExtractor::new(&config.crawler, config.cleaning.clone())?,
        PortalExtractor::new(
            &config.crawler,
            config.portal.clone(),
            config.cleaning.clone(),
        )?,
    );

    let notify: Arc<dyn Dispatcher> = Arc::new(WebhookDispatcher::new(
        config.webhooks.notify_url.clone(),
        &config.webhooks,
    ));
    let monitor: Option<Arc<dyn Dispatcher>> = config
        .webhooks
        .monitor_url
        .clone()
        .map(|url| Arc::new(WebhookDispatcher::new(url, &config.webhooks)) as Arc<dyn Dispatcher>);

    let mut cursors = CursorStore::load(&config.cursor_file);
    let orchestrator = CrawlOrchestrator::new(config, Arc::new(extractor), notify, monitor);

    let stats = orchestrator.run(&config.sources, &mut cursors).await?;

    log::info!(
        "Run complete: {} sources ({} failed), {} messages sent ({} delivery failures), {} cursors advanced",
        stats.sources_total,
        stats.sources_failed,
        stats.messages_sent,
        stats.delivery_failures,
        stats.cursors_advanced
    );

    Ok(())
}
