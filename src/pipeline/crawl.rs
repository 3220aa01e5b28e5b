// src/pipeline/crawl.rs

//! The per-run orchestration loop.
//!
//! Sources are visited strictly sequentially with a politeness delay
//! between them; parallel fetching risks tripping the remote hosts'
//! anti-automation defenses. A failure while processing one source is
//! caught at the source boundary and the loop moves on, leaving that
//! source's cursor untouched. The cursor store is flushed at most once per
//! run, only if some cursor advanced.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;

use crate::cursor::CursorStore;
use crate::error::{AppError, Result};
use crate::models::{Config, RawItem, Source, SourceKind};
use crate::pipeline::delta;
use crate::pipeline::format;
use crate::services::{Dispatcher, SourceExtractor};

/// Counters for one run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub sources_total: usize,
    pub sources_failed: usize,
    pub messages_sent: usize,
    pub delivery_failures: usize,
    pub cursors_advanced: usize,
}

/// Sequences per-source checks with failure isolation and pacing.
pub struct CrawlOrchestrator {
    extractor: Arc<dyn SourceExtractor>,
    notify: Arc<dyn Dispatcher>,
    monitor: Option<Arc<dyn Dispatcher>>,
    pacing_delay: Duration,
    send_delay: Duration,
}

impl CrawlOrchestrator {
    pub fn new(
        config: &Config,
        extractor: Arc<dyn SourceExtractor>,
        notify: Arc<dyn Dispatcher>,
        monitor: Option<Arc<dyn Dispatcher>>,
    ) -> Self {
        Self {
            extractor,
            notify,
            monitor,
            pacing_delay: Duration::from_millis(config.crawler.pacing_delay_ms),
            send_delay: Duration::from_millis(config.crawler.send_delay_ms),
        }
    }

    /// Run one full pass over all sources.
    ///
    /// An error returned from here is fatal for the run: session
    /// acquisition or the final flush failed. Per-source failures never
    /// surface as an `Err`; they are counted in the stats.
    pub async fn run(&self, sources: &[Source], cursors: &mut CursorStore) -> Result<RunStats> {
        let mut stats = RunStats {
            sources_total: sources.len(),
            ..RunStats::default()
        };

        if let Err(e) = self.extractor.begin().await {
            log::error!("Run aborted, session acquisition failed: {}", e);
            self.extractor.finish().await;
            self.alert("fatal error").await;
            return Err(e);
        }

        for (index, source) in sources.iter().enumerate() {
            if index > 0 && !self.pacing_delay.is_zero() {
                tokio::time::sleep(self.pacing_delay).await;
            }

            match self.check_source(source, cursors, &mut stats).await {
                Ok(()) => {}
                Err(e) => {
                    // Source boundary: log full detail, alert tersely,
                    // leave the cursor untouched, keep going.
                    stats.sources_failed += 1;
                    log::error!("Source {} failed: {}", source.id, e);
                    self.alert(e.alert_category()).await;
                }
            }
        }

        self.extractor.finish().await;

        if cursors.is_dirty() {
            if let Err(e) = cursors.flush() {
                log::error!("Cursor flush failed: {}", e);
                self.alert("fatal error").await;
                return Err(e);
            }
            log::info!("Cursor store persisted to {:?}", cursors.path());
        } else {
            log::info!("No source advanced; cursor store not written");
        }

        Ok(stats)
    }

    /// Check one source: extract, delta, notify, record cursor.
    async fn check_source(
        &self,
        source: &Source,
        cursors: &mut CursorStore,
        stats: &mut RunStats,
    ) -> Result<()> {
        log::info!("Checking {} ({})", source.id, source.name);

        let items = self.extractor.extract(source).await?;

        // Rows present but not one yielded an identifier: the markup or the
        // link format changed, not a quiet board. Letting this through would
        // read as "no new posts" forever.
        if !items.is_empty() && items.iter().all(|item| item.external_id == 0) {
            return Err(AppError::structure(&source.id));
        }

        let last_seen = cursors.last_seen(&source.id);
        let delta = delta::compute(&items, last_seen);

        if last_seen == 0 && delta.advanced(0) {
            log::info!(
                "{}: first run, baseline set to {} without notifying",
                source.id,
                delta.candidate_max
            );
        } else if delta.new_items.is_empty() {
            log::info!("{}: no new posts", source.id);
        } else {
            log::info!("{}: {} new posts", source.id, delta.new_items.len());
            self.dispatch(source, &delta.new_items, stats).await;
        }

        // Delivery failure does not block the cursor: at-most-once delivery
        // beats a re-delivery storm on a flaky channel.
        if cursors.record_if_advanced(&source.id, delta.candidate_max) {
            stats.cursors_advanced += 1;
        }

        Ok(())
    }

    /// Send notifications for one source's new items. Never fails; failures
    /// are logged and raise a single terse operator alert.
    async fn dispatch(&self, source: &Source, new_items: &[RawItem], stats: &mut RunStats) {
        let mut failures = 0usize;

        match source.kind {
            SourceKind::Board => {
                let message = format::format_batch(source, new_items);
                match self.notify.send(&message).await {
                    Ok(()) => stats.messages_sent += 1,
                    Err(e) => {
                        failures += 1;
                        log::error!("Delivery failed for {}: {}", source.id, e);
                    }
                }
            }
            SourceKind::Portal => {
                for (index, item) in new_items.iter().enumerate() {
                    if index > 0 && !self.send_delay.is_zero() {
                        tokio::time::sleep(self.send_delay).await;
                    }
                    let message = format::format_portal_item(item);
                    match self.notify.send(&message).await {
                        Ok(()) => stats.messages_sent += 1,
                        Err(e) => {
                            failures += 1;
                            log::error!(
                                "Delivery failed for {} item {}: {}",
                                source.id,
                                item.external_id,
                                e
                            );
                        }
                    }
                }
            }
        }

        if failures > 0 {
            stats.delivery_failures += failures;
            self.alert(AppError::delivery("webhook").alert_category())
                .await;
        }
    }

    /// Terse operator alert: a category and a timestamp, nothing more.
    /// Detailed diagnostics belong in the log. An unconfigured monitor
    /// channel silently disables alerting; alert delivery failures are
    /// swallowed.
    async fn alert(&self, category: &str) {
        let Some(monitor) = &self.monitor else {
            return;
        };

        let now = Local::now().format("%Y-%m-%d %H:%M:%S");
        let content = format!("🚨 **[notibot {category}]**\n{now}");
        if let Err(e) = monitor.send(&content).await {
            log::warn!("Monitor alert failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use crate::models::{CrawlerConfig, IdPattern, SelectorSet};

    fn board(id: &str) -> Source {
        Source {
            id: id.into(),
            name: format!("{id} 공지"),
            url: format!("https://example.com/{id}"),
            icon: "📢".into(),
            kind: SourceKind::Board,
            selectors: SelectorSet::default(),
            id_pattern: IdPattern::Suffix,
        }
    }

    fn items(ids: &[u64]) -> Vec<RawItem> {
        ids.iter()
            .map(|&id| RawItem {
                external_id: id,
                title: format!("notice {id}"),
                link: format!("https://example.com/view/{id}"),
                ..RawItem::default()
            })
            .collect()
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.crawler = CrawlerConfig {
            pacing_delay_ms: 0,
            send_delay_ms: 0,
            ..CrawlerConfig::default()
        };
        config
    }

    /// Extractor serving canned pages, failing for sources it doesn't know.
    struct MockExtractor {
        pages: HashMap<String, Vec<RawItem>>,
        begins: Mutex<usize>,
        finishes: Mutex<usize>,
    }

    impl MockExtractor {
        fn new(pages: HashMap<String, Vec<RawItem>>) -> Self {
            Self {
                pages,
                begins: Mutex::new(0),
                finishes: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl SourceExtractor for MockExtractor {
        async fn begin(&self) -> crate::error::Result<()> {
            *self.begins.lock().unwrap() += 1;
            Ok(())
        }

        async fn extract(&self, source: &Source) -> crate::error::Result<Vec<RawItem>> {
            self.pages
                .get(&source.id)
                .cloned()
                .ok_or_else(|| AppError::fetch(&source.id, "connection refused"))
        }

        async fn finish(&self) {
            *self.finishes.lock().unwrap() += 1;
        }
    }

    #[derive(Default)]
    struct MockDispatcher {
        sent: Mutex<Vec<String>>,
        fail: bool,
    }

    impl MockDispatcher {
        fn failing() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        fn messages(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Dispatcher for MockDispatcher {
        async fn send(&self, content: &str) -> crate::error::Result<()> {
            self.sent.lock().unwrap().push(content.to_string());
            if self.fail {
                return Err(AppError::delivery("mock failure"));
            }
            Ok(())
        }
    }

    fn orchestrator(
        pages: HashMap<String, Vec<RawItem>>,
        notify: Arc<MockDispatcher>,
        monitor: Option<Arc<MockDispatcher>>,
    ) -> (CrawlOrchestrator, Arc<MockExtractor>) {
        let extractor = Arc::new(MockExtractor::new(pages));
        let orch = CrawlOrchestrator::new(
            &test_config(),
            extractor.clone(),
            notify,
            monitor.map(|m| m as Arc<dyn Dispatcher>),
        );
        (orch, extractor)
    }

    #[tokio::test]
    async fn cold_start_sets_baseline_without_notifying() {
        let tmp = TempDir::new().unwrap();
        let mut cursors = CursorStore::load(tmp.path().join("cursors.json"));

        let notify = Arc::new(MockDispatcher::default());
        let pages = HashMap::from([("library".to_string(), items(&[10, 12, 15]))]);
        let (orch, _) = orchestrator(pages, notify.clone(), None);

        let stats = orch.run(&[board("library")], &mut cursors).await.unwrap();

        assert_eq!(cursors.last_seen("library"), 15);
        assert!(notify.messages().is_empty());
        assert_eq!(stats.messages_sent, 0);
        assert_eq!(stats.cursors_advanced, 1);
        // Baseline advance counts as a change, so the store was written
        assert!(cursors.path().exists());
    }

    #[tokio::test]
    async fn new_posts_produce_one_sorted_batch() {
        let tmp = TempDir::new().unwrap();
        let mut cursors = CursorStore::load(tmp.path().join("cursors.json"));
        cursors.record_if_advanced("library", 15);
        cursors.flush().unwrap();

        let notify = Arc::new(MockDispatcher::default());
        let pages = HashMap::from([("library".to_string(), items(&[15, 18, 20, 16]))]);
        let (orch, _) = orchestrator(pages, notify.clone(), None);

        let stats = orch.run(&[board("library")], &mut cursors).await.unwrap();

        assert_eq!(cursors.last_seen("library"), 20);
        let messages = notify.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("새 글 3건"));

        let p16 = messages[0].find("notice 16").unwrap();
        let p18 = messages[0].find("notice 18").unwrap();
        let p20 = messages[0].find("notice 20").unwrap();
        assert!(p16 < p18 && p18 < p20);
        assert_eq!(stats.messages_sent, 1);
    }

    #[tokio::test]
    async fn delivery_failure_still_advances_cursor_and_alerts_once() {
        let tmp = TempDir::new().unwrap();
        let mut cursors = CursorStore::load(tmp.path().join("cursors.json"));
        cursors.record_if_advanced("library", 15);

        let notify = Arc::new(MockDispatcher::failing());
        let monitor = Arc::new(MockDispatcher::default());
        let pages = HashMap::from([("library".to_string(), items(&[15, 18, 20, 16]))]);
        let (orch, _) = orchestrator(pages, notify.clone(), Some(monitor.clone()));

        let stats = orch.run(&[board("library")], &mut cursors).await.unwrap();

        assert_eq!(cursors.last_seen("library"), 20);
        assert_eq!(stats.delivery_failures, 1);
        let alerts = monitor.messages();
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].contains("delivery failed"));
    }

    #[tokio::test]
    async fn failing_source_is_isolated_and_cursor_untouched() {
        let tmp = TempDir::new().unwrap();
        let mut cursors = CursorStore::load(tmp.path().join("cursors.json"));
        cursors.record_if_advanced("dorm", 5);
        cursors.record_if_advanced("library", 15);

        let notify = Arc::new(MockDispatcher::default());
        let monitor = Arc::new(MockDispatcher::default());
        // "dorm" is unknown to the extractor and fails with a fetch error
        let pages = HashMap::from([("library".to_string(), items(&[16]))]);
        let (orch, _) = orchestrator(pages, notify.clone(), Some(monitor.clone()));

        let stats = orch
            .run(&[board("dorm"), board("library")], &mut cursors)
            .await
            .unwrap();

        assert_eq!(stats.sources_failed, 1);
        assert_eq!(cursors.last_seen("dorm"), 5);
        assert_eq!(cursors.last_seen("library"), 16);
        assert_eq!(notify.messages().len(), 1);
        assert!(monitor.messages()[0].contains("fetch failed"));
    }

    #[tokio::test]
    async fn page_of_unidentifiable_rows_fails_instead_of_looking_quiet() {
        let tmp = TempDir::new().unwrap();
        let mut cursors = CursorStore::load(tmp.path().join("cursors.json"));
        cursors.record_if_advanced("library", 15);

        let notify = Arc::new(MockDispatcher::default());
        let monitor = Arc::new(MockDispatcher::default());
        // Rows parsed, but no link yielded an id
        let pages = HashMap::from([("library".to_string(), items(&[0, 0, 0]))]);
        let (orch, _) = orchestrator(pages, notify.clone(), Some(monitor.clone()));

        let stats = orch.run(&[board("library")], &mut cursors).await.unwrap();

        assert_eq!(stats.sources_failed, 1);
        assert_eq!(cursors.last_seen("library"), 15);
        assert!(notify.messages().is_empty());
        assert!(monitor.messages()[0].contains("no rows found"));
    }

    #[tokio::test]
    async fn no_changes_means_no_write() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cursors.json");
        let mut cursors = CursorStore::load(&path);
        cursors.record_if_advanced("library", 20);
        cursors.flush().unwrap();
        let written = std::fs::metadata(&path).unwrap().modified().unwrap();

        let notify = Arc::new(MockDispatcher::default());
        let pages = HashMap::from([("library".to_string(), items(&[18, 20]))]);
        let (orch, _) = orchestrator(pages, notify.clone(), None);

        let stats = orch.run(&[board("library")], &mut cursors).await.unwrap();

        assert_eq!(stats.cursors_advanced, 0);
        assert!(notify.messages().is_empty());
        assert_eq!(
            std::fs::metadata(&path).unwrap().modified().unwrap(),
            written
        );
    }

    #[tokio::test]
    async fn session_is_released_on_every_path() {
        let tmp = TempDir::new().unwrap();
        let mut cursors = CursorStore::load(tmp.path().join("cursors.json"));

        let notify = Arc::new(MockDispatcher::default());
        // Every source fails; finish must still run exactly once.
        let (orch, extractor) = orchestrator(HashMap::new(), notify, None);
        orch.run(&[board("a"), board("b")], &mut cursors)
            .await
            .unwrap();

        assert_eq!(*extractor.begins.lock().unwrap(), 1);
        assert_eq!(*extractor.finishes.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn portal_items_are_sent_individually() {
        let tmp = TempDir::new().unwrap();
        let mut cursors = CursorStore::load(tmp.path().join("cursors.json"));
        cursors.record_if_advanced("with", 500);

        let mut page = items(&[501, 502]);
        page[0].d_day = "D-3".into();

        let notify = Arc::new(MockDispatcher::default());
        let pages = HashMap::from([("with".to_string(), page)]);
        let (orch, _) = orchestrator(pages, notify.clone(), None);

        let mut source = board("with");
        source.kind = SourceKind::Portal;

        let stats = orch.run(&[source], &mut cursors).await.unwrap();

        assert_eq!(stats.messages_sent, 2);
        let messages = notify.messages();
        assert!(messages[0].contains("D-3 | notice 501"));
        assert!(messages[1].contains("notice 502"));
        assert_eq!(cursors.last_seen("with"), 502);
    }
}
