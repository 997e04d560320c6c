use async_trait::async_trait;
use promptlog_engine::dom::{Document, NodeId, RawSnapshot};
use promptlog_engine::page::{Page, PageError, ScrollMetrics, ScrollTarget};
use std::path::Path;

/// A page frozen at a saved probe snapshot. Scrolling has nothing more to
/// load, so the conductor converges after its first stable check.
pub struct SnapshotPage {
    url: String,
    document: Document,
}

impl SnapshotPage {
    pub fn new(snapshot: RawSnapshot, url_override: Option<String>) -> Self {
        let url = url_override.unwrap_or_else(|| snapshot.url.clone());
        let mut document = Document::from_snapshot(snapshot);
        document.url = url.clone();
        Self { url, document }
    }

    pub async fn load(path: &Path, url_override: Option<String>) -> anyhow::Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let snapshot: RawSnapshot = serde_json::from_str(&content)?;
        Ok(Self::new(snapshot, url_override))
    }
}

#[async_trait]
impl Page for SnapshotPage {
    async fn url(&mut self) -> Result<String, PageError> {
        Ok(self.url.clone())
    }

    async fn title(&mut self) -> Result<String, PageError> {
        Ok(self.document.title.clone())
    }

    async fn snapshot(&mut self) -> Result<Document, PageError> {
        Ok(self.document.clone())
    }

    async fn scroll(&mut self, container: NodeId, _target: ScrollTarget) -> Result<(), PageError> {
        self.document
            .node(container)
            .map(|_| ())
            .ok_or(PageError::UnknownNode(container))
    }

    async fn scroll_metrics(&mut self, container: NodeId) -> Result<ScrollMetrics, PageError> {
        self.document
            .node(container)
            .map(|_| ScrollMetrics::default())
            .ok_or(PageError::UnknownNode(container))
    }
}
