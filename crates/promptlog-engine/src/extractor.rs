//! One extraction session: adapter selection, capture, storage and the
//! extraction pipeline, owned together instead of living in module globals.

use crate::adapter::{AdapterRegistry, GenericAdapter, PlatformAdapter};
use crate::capture::{CaptureHooks, HookEvent};
use crate::config::EngineConfig;
use crate::page::{Page, PageError};
use crate::reconcile::{merge_keylog, reconcile};
use crate::scroll::{ScrollStrategy, materialize, sample_prompts};
use crate::store::{
    ConversationLogSource, DurableLogs, DurableRecords, KeyValueStore, SessionStore, SyncHandle,
};
use promptlog_common::error::ExtractionError;
use promptlog_common::now_millis;
use promptlog_common::protocol::{
    ExtractionMode, ExtractionResult, Message, Platform, ScrapedPrompt, StoredPrompt,
};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

/// Process-wide "extraction in flight" flag with a safety timeout.
///
/// A second acquire while held is refused. A holder older than the timeout is
/// assumed leaked and replaced; its guard then no longer clears the flag.
struct ExtractionLock {
    held: StdMutex<Option<(u64, Instant)>>,
    next_ticket: StdMutex<u64>,
    timeout: Duration,
}

struct LockGuard<'a> {
    lock: &'a ExtractionLock,
    ticket: u64,
}

impl ExtractionLock {
    fn new(timeout: Duration) -> Self {
        Self {
            held: StdMutex::new(None),
            next_ticket: StdMutex::new(0),
            timeout,
        }
    }

    fn try_acquire(&self) -> Option<LockGuard<'_>> {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((ticket, since)) = *held {
            if since.elapsed() < self.timeout {
                return None;
            }
            warn!(
                "Extraction lock {} held for {:?}, force-clearing",
                ticket,
                since.elapsed()
            );
        }

        let ticket = {
            let mut next = self.next_ticket.lock().unwrap_or_else(PoisonError::into_inner);
            *next += 1;
            *next
        };
        *held = Some((ticket, Instant::now()));
        Some(LockGuard { lock: self, ticket })
    }

    fn is_held(&self) -> bool {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some_and(|(_, since)| since.elapsed() < self.timeout)
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        let mut held = self.lock.held.lock().unwrap_or_else(PoisonError::into_inner);
        if held.is_some_and(|(ticket, _)| ticket == self.ticket) {
            *held = None;
        }
    }
}

pub struct ExtractionSession {
    config: EngineConfig,
    registry: AdapterRegistry,
    store: Mutex<SessionStore>,
    records: DurableRecords,
    hooks: Mutex<CaptureHooks>,
    logs: Arc<dyn ConversationLogSource>,
    adapter: Mutex<Option<Arc<dyn PlatformAdapter>>>,
    lock: ExtractionLock,
}

impl ExtractionSession {
    pub fn new(config: EngineConfig, storage: Arc<dyn KeyValueStore>) -> Self {
        let records = DurableRecords::new(storage.clone());
        Self {
            registry: AdapterRegistry::with_defaults(),
            store: Mutex::new(SessionStore::with_records(
                records.clone(),
                config.storage.clone(),
            )),
            records,
            hooks: Mutex::new(CaptureHooks::new(&config.capture)),
            logs: Arc::new(DurableLogs::new(storage)),
            adapter: Mutex::new(None),
            lock: ExtractionLock::new(config.extraction.lock_timeout()),
            config,
        }
    }

    pub fn with_registry(mut self, registry: AdapterRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Replace where cross-reload keylog entries are fetched from.
    pub fn with_log_source(mut self, logs: Arc<dyn ConversationLogSource>) -> Self {
        self.logs = logs;
        self
    }

    pub fn with_sync(mut self, sync: SyncHandle) -> Self {
        self.store.get_mut().set_sync(sync);
        self
    }

    /// Handle for a [`crate::store::SyncWorker`] to update durable records
    /// without racing this session's appends.
    pub fn durable_records(&self) -> DurableRecords {
        self.records.clone()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_extracting(&self) -> bool {
        self.lock.is_held()
    }

    pub async fn current_platform(&self) -> Option<Platform> {
        self.adapter.lock().await.as_ref().map(|a| a.platform())
    }

    pub async fn conversation_id(&self) -> Option<String> {
        self.store
            .lock()
            .await
            .binding()
            .map(|b| b.conversation_id.clone())
    }

    pub async fn session_prompts(&self) -> Vec<ScrapedPrompt> {
        self.store.lock().await.session_prompts()
    }

    fn detect(&self, url: &Url) -> Arc<dyn PlatformAdapter> {
        self.registry
            .detect(url)
            .unwrap_or_else(|| Arc::new(GenericAdapter))
    }

    /// Re-detect the adapter for `url` and rebind the store. Returns true when
    /// the conversation changed.
    pub async fn on_navigation(&self, url: &str) -> Result<bool, ExtractionError> {
        let parsed = Url::parse(url).map_err(|_| ExtractionError::InvalidUrl(url.to_string()))?;
        let adapter = self.detect(&parsed);
        let conversation_id = adapter.conversation_id(&parsed);
        let platform = adapter.platform();
        *self.adapter.lock().await = Some(adapter);

        let changed = self.store.lock().await.bind(platform, &conversation_id).await;
        if changed {
            debug!("Bound to {} conversation {}", platform, conversation_id);
        }
        Ok(changed)
    }

    /// Bind to the page's current conversation and install capture listeners.
    pub async fn attach<P: Page + ?Sized>(&self, page: &mut P) -> Result<(), ExtractionError> {
        let url = page.url().await?;
        self.on_navigation(&url).await?;
        self.attach_hooks(page).await?;
        Ok(())
    }

    async fn attach_hooks<P: Page + ?Sized>(&self, page: &mut P) -> Result<(), PageError> {
        let Some(adapter) = self.adapter.lock().await.clone() else {
            return Ok(());
        };
        match page.attach_hooks(&adapter.capture_selectors()).await {
            Ok(()) => {
                debug!("Capture hooks attached for {}", adapter.platform());
                Ok(())
            }
            Err(PageError::NotSupported(_)) => {
                debug!("Page driver has no capture hooks");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Drain queued hook events, record confirmed submissions and re-attach
    /// listeners after navigation or debounced structure changes.
    pub async fn pump_events<P: Page + ?Sized>(
        &self,
        page: &mut P,
    ) -> Result<Vec<StoredPrompt>, ExtractionError> {
        if self.store.lock().await.binding().is_none() {
            self.attach(page).await?;
        }

        let events = page.drain_events().await?;
        let mut recorded = Vec::new();
        let mut reattach = false;

        for event in &events {
            match event {
                HookEvent::Navigated { url, .. } => match self.on_navigation(url).await {
                    Ok(_) => reattach = true,
                    Err(e) => warn!("Ignoring navigation event: {}", e),
                },
                HookEvent::ConnectivityChanged { online, .. } => {
                    debug!("Page reports {}", if *online { "online" } else { "offline" });
                    self.store.lock().await.set_online(*online);
                }
                _ => {}
            }

            let capture = self.hooks.lock().await.handle(event);
            if let Some(capture) = capture
                && let Some(stored) = self.store.lock().await.record(capture).await
            {
                recorded.push(stored);
            }
        }

        if self.hooks.lock().await.poll_reattach(now_millis()) {
            reattach = true;
        }
        if reattach {
            self.attach_hooks(page).await?;
        }
        Ok(recorded)
    }

    /// Forget the current conversation's captures everywhere.
    pub async fn reset_conversation(&self) {
        self.hooks.lock().await.reset();
        self.store.lock().await.reset().await;
    }

    /// Run one extraction. Refused with [`ExtractionError::InProgress`] while
    /// another extraction holds the lock.
    pub async fn extract<P: Page + ?Sized>(
        &self,
        page: &mut P,
        mode: ExtractionMode,
    ) -> Result<ExtractionResult, ExtractionError> {
        let _guard = self.lock.try_acquire().ok_or(ExtractionError::InProgress)?;

        let url = page.url().await?;
        let parsed = Url::parse(&url).map_err(|_| ExtractionError::InvalidUrl(url.clone()))?;
        let adapter = self.detect(&parsed);
        let platform = adapter.platform();
        let conversation_id = adapter.conversation_id(&parsed);
        *self.adapter.lock().await = Some(adapter.clone());
        self.store.lock().await.bind(platform, &conversation_id).await;

        info!("Extracting {} conversation {} ({:?})", platform, conversation_id, mode);

        let dom = match mode {
            ExtractionMode::KeylogOnly => Vec::new(),
            ExtractionMode::DomOnly => self.scrape_dom(page, adapter.as_ref()).await?,
            ExtractionMode::Auto => match self.scrape_dom(page, adapter.as_ref()).await {
                Ok(prompts) => prompts,
                Err(e) => {
                    warn!("Reading the DOM failed, falling back to keylog: {}", e);
                    Vec::new()
                }
            },
        };

        let keylog = match mode {
            ExtractionMode::DomOnly => Vec::new(),
            _ => {
                let session = self.store.lock().await.session_prompts();
                let persisted = self.fetch_persisted(platform, &conversation_id).await;
                merge_keylog(&session, &persisted)
            }
        };

        if dom.is_empty() && mode == ExtractionMode::Auto {
            debug!("No DOM prompts found, using keylog only");
        }
        let prompts = reconcile(&dom, &keylog, mode);
        info!(
            "Extracted {} prompts ({} from DOM, {} from keylog)",
            prompts.len(),
            dom.len(),
            keylog.len()
        );

        let title = page.title().await.unwrap_or_else(|e| {
            debug!("Page title unavailable: {}", e);
            String::new()
        });

        Ok(ExtractionResult {
            platform,
            url,
            title,
            prompts,
            extracted_at: now_millis(),
            conversation_id,
        })
    }

    async fn scrape_dom<P: Page + ?Sized>(
        &self,
        page: &mut P,
        adapter: &dyn PlatformAdapter,
    ) -> Result<Vec<ScrapedPrompt>, PageError> {
        let doc = page.snapshot().await?;
        let Some(container) = adapter.scroll_container(&doc) else {
            debug!("No scroll container, scraping rendered DOM");
            return Ok(adapter.scrape(&doc).await);
        };

        let config = adapter.scroll_config();
        match adapter.scroll_strategy() {
            ScrollStrategy::SpatialSampling => {
                match sample_prompts(page, adapter, container, config).await {
                    Ok(prompts) => return Ok(prompts),
                    Err(e) => warn!("Spatial sampling failed, scraping rendered DOM: {}", e),
                }
            }
            ScrollStrategy::Phased => {
                if let Err(e) = materialize(page, container, config).await {
                    warn!("Scrolling failed, scraping rendered DOM: {}", e);
                }
            }
        }

        let doc = page.snapshot().await?;
        Ok(adapter.scrape(&doc).await)
    }

    /// Persisted keylog entries, bounded by the fetch timeout. Failures and
    /// timeouts resolve to an empty list.
    async fn fetch_persisted(&self, platform: Platform, conversation_id: &str) -> Vec<ScrapedPrompt> {
        let timeout = self.config.extraction.persisted_fetch_timeout();
        match tokio::time::timeout(timeout, self.logs.conversation_logs(platform, conversation_id))
            .await
        {
            Ok(Ok(prompts)) => prompts,
            Ok(Err(e)) => {
                warn!("Failed to load persisted prompts: {}", e);
                Vec::new()
            }
            Err(_) => {
                warn!("Persisted prompt fetch timed out after {:?}", timeout);
                Vec::new()
            }
        }
    }

    /// Answer a boundary message. Returns the reply, if the message has one.
    pub async fn handle_message<P: Page + ?Sized>(
        &self,
        page: &mut P,
        message: Message,
    ) -> Option<Message> {
        match message {
            Message::ExtractPrompts { mode, .. } => match self.extract(page, mode).await {
                Ok(result) => Some(Message::ExtractionResult { result, mode }),
                Err(e) => Some(Message::ExtractionError {
                    error: e.to_string(),
                }),
            },
            Message::GetConversationLogs {
                platform,
                conversation_id,
            } => Some(Message::ConversationLogs {
                prompts: self.fetch_persisted(platform, &conversation_id).await,
            }),
            Message::SaveSessionPrompts {
                prompts,
                platform,
                conversation_id,
            } => {
                let added = self
                    .store
                    .lock()
                    .await
                    .save_prompts(platform, &conversation_id, prompts)
                    .await;
                debug!("Saved {} prompts for {}", added, conversation_id);
                None
            }
            other => {
                debug!("Ignoring message {:?}", other);
                None
            }
        }
    }
}
