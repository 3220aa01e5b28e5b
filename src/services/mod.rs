// src/services/mod.rs

//! External collaborators: page extraction and message delivery.

pub mod boards;
pub mod portal;
pub mod webhook;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{RawItem, Source, SourceKind};

pub use boards::BoardExtractor;
pub use portal::PortalExtractor;
pub use webhook::{Dispatcher, WebhookDispatcher};

/// Extraction collaborator contract.
///
/// Owns all page-specific selection logic and markup assumptions. Returns
/// the bounded item window shown on a source's list page; the engine never
/// sees raw HTML.
#[async_trait]
pub trait SourceExtractor: Send + Sync {
    /// Acquire per-run resources (e.g. a portal login session). Called once
    /// at the start of a run.
    async fn begin(&self) -> Result<()> {
        Ok(())
    }

    /// Fetch the source and extract its current item window.
    async fn extract(&self, source: &Source) -> Result<Vec<RawItem>>;

    /// Release per-run resources. Invoked on every exit path of the run,
    /// including failed ones; a leaked session may hold a server-side slot.
    async fn finish(&self) {}
}

/// Production extractor: dispatches on source kind.
pub struct KindExtractor {
    boards: BoardExtractor,
    portal: PortalExtractor,
}

impl KindExtractor {
    pub fn new(boards: BoardExtractor, portal: PortalExtractor) -> Self {
        Self { boards, portal }
    }
}

#[async_trait]
impl SourceExtractor for KindExtractor {
    async fn begin(&self) -> Result<()> {
        self.portal.begin().await
    }

    async fn extract(&self, source: &Source) -> Result<Vec<RawItem>> {
        match source.kind {
            SourceKind::Board => self.boards.extract(source).await,
            SourceKind::Portal => self.portal.extract(source).await,
        }
    }

    async fn finish(&self) {
        self.portal.finish().await;
    }
}
