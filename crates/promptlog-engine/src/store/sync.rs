//! Best-effort delivery of captured prompts to an external backend.

use super::records::DurableRecords;
use crate::config::SyncSettings;
use async_trait::async_trait;
use promptlog_common::error::SyncError;
use promptlog_common::protocol::{Message, Platform, StoredPrompt};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[async_trait]
pub trait SyncClient: Send + Sync {
    async fn push(&self, platform: Platform, prompts: &[StoredPrompt]) -> Result<(), SyncError>;
}

/// Posts `SYNC_PROMPTS_TO_CLOUD` messages as JSON.
pub struct HttpSyncClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSyncClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl SyncClient for HttpSyncClient {
    async fn push(&self, platform: Platform, prompts: &[StoredPrompt]) -> Result<(), SyncError> {
        let body = Message::SyncPromptsToCloud {
            prompts: prompts.to_vec(),
            platform,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(SyncError::Rejected(response.status().as_u16()))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSync {
    pub platform: Platform,
    pub prompt: StoredPrompt,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub delivered: Vec<PendingSync>,
    pub dropped: Vec<PendingSync>,
}

/// Pending entries plus connectivity state. Entries leave the queue on
/// acknowledgment or after exhausting the retry budget.
#[derive(Debug)]
pub struct SyncQueue {
    pending: Vec<PendingSync>,
    settings: SyncSettings,
    online: bool,
}

impl SyncQueue {
    pub fn new(settings: SyncSettings) -> Self {
        Self {
            pending: Vec::new(),
            settings,
            online: true,
        }
    }

    pub fn enqueue(&mut self, platform: Platform, prompt: StoredPrompt) {
        if self.pending.iter().any(|p| p.prompt.id == prompt.id) {
            return;
        }
        self.pending.push(PendingSync { platform, prompt });
    }

    pub fn set_online(&mut self, online: bool) {
        self.online = online;
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Deliver everything pending. Does nothing while offline.
    pub async fn flush(&mut self, client: &dyn SyncClient) -> FlushReport {
        let mut report = FlushReport::default();
        if !self.online || self.pending.is_empty() {
            return report;
        }

        for mut entry in std::mem::take(&mut self.pending) {
            loop {
                match client
                    .push(entry.platform, std::slice::from_ref(&entry.prompt))
                    .await
                {
                    Ok(()) => {
                        entry.prompt.synced = true;
                        report.delivered.push(entry);
                        break;
                    }
                    Err(e) => {
                        entry.prompt.retry_count += 1;
                        if entry.prompt.retry_count >= self.settings.max_retries {
                            warn!(
                                "Dropping prompt {} after {} failed sync attempts: {}",
                                entry.prompt.id, entry.prompt.retry_count, e
                            );
                            report.dropped.push(entry);
                            break;
                        }
                        debug!(
                            "Sync attempt {} for {} failed: {}",
                            entry.prompt.retry_count, entry.prompt.id, e
                        );
                        tokio::time::sleep(self.settings.retry_delay()).await;
                    }
                }
            }
        }

        if !report.delivered.is_empty() {
            info!("Synced {} prompts", report.delivered.len());
        }
        report
    }
}

#[derive(Debug)]
enum SyncCommand {
    Enqueue(Platform, StoredPrompt),
    Connectivity(bool),
    Flush,
}

/// Cheap handle feeding the background sync worker.
#[derive(Debug, Clone)]
pub struct SyncHandle {
    tx: mpsc::UnboundedSender<SyncCommand>,
}

impl SyncHandle {
    pub fn enqueue(&self, platform: Platform, prompt: StoredPrompt) {
        if self.tx.send(SyncCommand::Enqueue(platform, prompt)).is_err() {
            warn!("Sync worker stopped; prompt not queued");
        }
    }

    /// Online/offline signal; going online flushes immediately.
    pub fn set_online(&self, online: bool) {
        if self.tx.send(SyncCommand::Connectivity(online)).is_err() {
            warn!("Sync worker stopped; connectivity change ignored");
        }
    }

    pub fn flush(&self) {
        if self.tx.send(SyncCommand::Flush).is_err() {
            warn!("Sync worker stopped; flush request ignored");
        }
    }
}

pub struct SyncWorker;

impl SyncWorker {
    /// Spawns the worker. It exits (after a final flush) once every handle
    /// is dropped. When `records` is given, delivered prompts are marked
    /// `synced` in their durable conversation record. Pass the same
    /// [`DurableRecords`] the session store writes through.
    pub fn spawn(
        client: Arc<dyn SyncClient>,
        settings: SyncSettings,
        records: Option<DurableRecords>,
    ) -> (SyncHandle, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let debounce = settings.debounce();

        let task = tokio::spawn(async move {
            let mut queue = SyncQueue::new(settings);
            let mut deadline: Option<Instant> = None;

            loop {
                tokio::select! {
                    command = rx.recv() => match command {
                        Some(SyncCommand::Enqueue(platform, prompt)) => {
                            queue.enqueue(platform, prompt);
                            deadline = Some(Instant::now() + debounce);
                        }
                        Some(SyncCommand::Connectivity(online)) => {
                            let reconnected = online && !queue.is_online();
                            queue.set_online(online);
                            if reconnected {
                                info!("Back online, flushing {} queued prompts", queue.len());
                                deliver(&mut queue, client.as_ref(), records.as_ref()).await;
                                deadline = None;
                            }
                        }
                        Some(SyncCommand::Flush) => {
                            deliver(&mut queue, client.as_ref(), records.as_ref()).await;
                            deadline = None;
                        }
                        None => {
                            deliver(&mut queue, client.as_ref(), records.as_ref()).await;
                            break;
                        }
                    },
                    _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                        deliver(&mut queue, client.as_ref(), records.as_ref()).await;
                        deadline = None;
                    }
                }
            }
            debug!("Sync worker stopped");
        });

        (SyncHandle { tx }, task)
    }
}

async fn deliver(queue: &mut SyncQueue, client: &dyn SyncClient, records: Option<&DurableRecords>) {
    let report = queue.flush(client).await;
    if let Some(records) = records
        && !report.delivered.is_empty()
    {
        mark_synced(records, &report.delivered).await;
    }
}

async fn mark_synced(records: &DurableRecords, delivered: &[PendingSync]) {
    let ids: HashSet<&str> = delivered.iter().map(|p| p.prompt.id.as_str()).collect();
    let mut conversations: Vec<(Platform, &str)> = Vec::new();
    for entry in delivered {
        if let Some(conversation_id) = entry.prompt.prompt.conversation_id.as_deref() {
            let target = (entry.platform, conversation_id);
            if !conversations.contains(&target) {
                conversations.push(target);
            }
        }
    }

    for (platform, conversation_id) in conversations {
        let result = records
            .update(platform, conversation_id, |slot| {
                let Some(record) = slot.as_mut() else {
                    return false;
                };
                let mut changed = false;
                for stored in &mut record.prompts {
                    if ids.contains(stored.id.as_str()) && !stored.synced {
                        stored.synced = true;
                        changed = true;
                    }
                }
                changed
            })
            .await;
        if let Err(e) = result {
            warn!("Failed to mark {} prompts synced: {}", conversation_id, e);
        }
    }
}
