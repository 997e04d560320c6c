use crate::capture::{CaptureSelectors, HookEvent};
use crate::dom::{Document, NodeId};
use async_trait::async_trait;
pub use promptlog_common::error::PageError;
use serde::{Deserialize, Serialize};

/// Where to move a scroll container.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "to", content = "fraction", rename_all = "snake_case")]
pub enum ScrollTarget {
    Top,
    Bottom,
    /// 0.0 = top, 1.0 = bottom.
    Fraction(f64),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

/// The browser seam. Every driver (headless Chromium, test doubles) implements this.
///
/// Node ids passed to the scroll methods refer to the most recent
/// [`Page::snapshot`].
#[async_trait]
pub trait Page: Send {
    /// Current page URL.
    async fn url(&mut self) -> Result<String, PageError>;

    async fn title(&mut self) -> Result<String, PageError>;

    /// Serialise the live composed DOM.
    async fn snapshot(&mut self) -> Result<Document, PageError>;

    async fn scroll(&mut self, container: NodeId, target: ScrollTarget) -> Result<(), PageError>;

    async fn scroll_metrics(&mut self, container: NodeId) -> Result<ScrollMetrics, PageError>;

    /// Navigate to a specific URL.
    async fn navigate(&mut self, _url: &str) -> Result<(), PageError> {
        Err(PageError::NotSupported("navigate".into()))
    }

    /// Install (or re-install) send/keyboard/mutation listeners.
    async fn attach_hooks(&mut self, _selectors: &CaptureSelectors) -> Result<(), PageError> {
        Err(PageError::NotSupported("attach_hooks".into()))
    }

    /// Take the hook events queued inside the page since the last call.
    async fn drain_events(&mut self) -> Result<Vec<HookEvent>, PageError> {
        Ok(Vec::new())
    }
}
