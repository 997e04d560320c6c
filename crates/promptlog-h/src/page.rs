use crate::cdp::CdpClient;
use crate::inject::{call_probe, ensure_probe};
use async_trait::async_trait;
use promptlog_engine::capture::{CaptureSelectors, HookEvent};
use promptlog_engine::dom::{Document, NodeId, RawSnapshot};
use promptlog_engine::page::{Page, PageError, ScrollMetrics, ScrollTarget};
use serde::Deserialize;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

#[derive(Debug, Deserialize)]
struct ProbeAck {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// A Chromium tab driven over CDP with the probe injected on demand.
pub struct HeadlessPage {
    client: Option<CdpClient>,
    visible: bool,
    /// Selectors from the last `attach_hooks`, replayed after full page loads.
    hooks: Option<CaptureSelectors>,
}

impl HeadlessPage {
    pub fn new() -> Self {
        Self::new_with_visibility(false)
    }

    pub fn new_with_visibility(visible: bool) -> Self {
        Self {
            client: None,
            visible,
            hooks: None,
        }
    }

    pub async fn launch(&mut self) -> Result<(), PageError> {
        info!("Launching headless Chromium...");
        self.client = Some(CdpClient::launch(self.visible).await?);
        Ok(())
    }

    pub async fn close(&mut self) -> Result<(), PageError> {
        if let Some(client) = self.client.take() {
            client.close().await?;
        }
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.client.is_some()
    }

    pub fn client(&self) -> Option<&CdpClient> {
        self.client.as_ref()
    }

    fn cdp_page(&self) -> Result<&chromiumoxide::Page, PageError> {
        self.client.as_ref().map(|c| &c.page).ok_or(PageError::NotReady)
    }

    /// Evaluates a raw script in the page, mainly for driving test pages.
    pub async fn evaluate(&self, expression: &str) -> Result<serde_json::Value, PageError> {
        let page = self.cdp_page()?;
        page.evaluate(expression)
            .await
            .map_err(|e| PageError::Script(e.to_string()))?
            .into_value::<serde_json::Value>()
            .map_err(|e| PageError::Script(e.to_string()))
    }

    async fn probe(&self, expression: &str) -> Result<serde_json::Value, PageError> {
        call_probe(self.cdp_page()?, expression).await
    }
}

impl Default for HeadlessPage {
    fn default() -> Self {
        Self::new()
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[async_trait]
impl Page for HeadlessPage {
    async fn url(&mut self) -> Result<String, PageError> {
        let page = self.cdp_page()?;
        Ok(page
            .url()
            .await
            .map_err(|e| PageError::Navigation(e.to_string()))?
            .unwrap_or_default())
    }

    async fn title(&mut self) -> Result<String, PageError> {
        let page = self.cdp_page()?;
        Ok(page.get_title().await.unwrap_or_default().unwrap_or_default())
    }

    async fn snapshot(&mut self) -> Result<Document, PageError> {
        let value = self.probe("window.Promptlog.snapshot()").await?;
        let snapshot: RawSnapshot = serde_json::from_value(value)?;
        Ok(Document::from_snapshot(snapshot))
    }

    async fn scroll(&mut self, container: NodeId, target: ScrollTarget) -> Result<(), PageError> {
        let expression = format!(
            "window.Promptlog.scroll({}, {})",
            container,
            serde_json::to_string(&target)?
        );
        let ack: ProbeAck = serde_json::from_value(self.probe(&expression).await?)?;
        match ack {
            ProbeAck { ok: true, .. } => Ok(()),
            ProbeAck { error: Some(e), .. } if e.starts_with("unknown node") => {
                Err(PageError::UnknownNode(container))
            }
            ProbeAck { error, .. } => Err(PageError::Script(
                error.unwrap_or_else(|| "scroll failed".to_string()),
            )),
        }
    }

    async fn scroll_metrics(&mut self, container: NodeId) -> Result<ScrollMetrics, PageError> {
        let value = self
            .probe(&format!("window.Promptlog.metrics({})", container))
            .await?;
        if value.is_null() {
            return Err(PageError::UnknownNode(container));
        }
        Ok(serde_json::from_value(value)?)
    }

    async fn navigate(&mut self, url: &str) -> Result<(), PageError> {
        let page = self.cdp_page()?;
        info!("Navigating to: {}", url);
        page.goto(url)
            .await
            .map_err(|e| PageError::Navigation(e.to_string()))?;
        Ok(())
    }

    async fn attach_hooks(&mut self, selectors: &CaptureSelectors) -> Result<(), PageError> {
        let expression = format!(
            "window.Promptlog.attachHooks({})",
            serde_json::to_string(selectors)?
        );
        self.probe(&expression).await?;
        self.hooks = Some(selectors.clone());
        Ok(())
    }

    async fn drain_events(&mut self) -> Result<Vec<HookEvent>, PageError> {
        let fresh = ensure_probe(self.cdp_page()?).await?;
        if fresh && let Some(selectors) = self.hooks.clone() {
            // A full page load wiped the probe; report it as a route change
            // and re-arm the listeners for the new document.
            self.attach_hooks(&selectors).await?;
            let url = self.url().await?;
            return Ok(vec![HookEvent::Navigated {
                url,
                timestamp: now_millis(),
            }]);
        }

        let value = self.probe("window.Promptlog.drainEvents()").await?;
        let mut events = Vec::new();
        if let serde_json::Value::Array(items) = value {
            for item in items {
                match serde_json::from_value::<HookEvent>(item) {
                    Ok(event) => events.push(event),
                    Err(e) => tracing::debug!("Dropping malformed hook event: {}", e),
                }
            }
        }
        Ok(events)
    }
}
