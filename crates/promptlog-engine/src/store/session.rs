use super::kv::{KeyValueStore, StorageScope};
use super::records::{DurableRecords, load_conversation};
use super::sync::SyncHandle;
use crate::capture::{Capture, Rejection, check_capture};
use crate::config::StorageSettings;
use async_trait::async_trait;
use promptlog_common::error::StorageError;
use promptlog_common::normalize::normalize_whitespace;
use promptlog_common::now_millis;
use promptlog_common::protocol::{
    CaptureMethod, ConversationStorage, Platform, PromptSource, ScrapedPrompt, StoredPrompt,
    session_storage_key,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Source of cross-reload keylog entries for a conversation.
#[async_trait]
pub trait ConversationLogSource: Send + Sync {
    async fn conversation_logs(
        &self,
        platform: Platform,
        conversation_id: &str,
    ) -> Result<Vec<ScrapedPrompt>, StorageError>;
}

/// Reads `prompts_{platform}_{conversationId}` from durable storage.
pub struct DurableLogs {
    kv: Arc<dyn KeyValueStore>,
}

impl DurableLogs {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }
}

#[async_trait]
impl ConversationLogSource for DurableLogs {
    async fn conversation_logs(
        &self,
        platform: Platform,
        conversation_id: &str,
    ) -> Result<Vec<ScrapedPrompt>, StorageError> {
        let record = load_conversation(self.kv.as_ref(), platform, conversation_id).await?;
        Ok(record
            .map(|r| r.prompts.into_iter().map(|p| p.prompt).collect())
            .unwrap_or_default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub platform: Platform,
    pub conversation_id: String,
}

/// Conversation-scoped capture buffer, mirrored into session storage and
/// appended to the durable conversation record.
pub struct SessionStore {
    kv: Arc<dyn KeyValueStore>,
    records: DurableRecords,
    settings: StorageSettings,
    binding: Option<Binding>,
    buffer: Vec<StoredPrompt>,
    sync: Option<SyncHandle>,
}

impl SessionStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, settings: StorageSettings) -> Self {
        Self::with_records(DurableRecords::new(kv), settings)
    }

    /// Store writing durable records through a shared handle, so a sync
    /// worker holding a clone never interleaves with its appends.
    pub fn with_records(records: DurableRecords, settings: StorageSettings) -> Self {
        Self {
            kv: records.storage().clone(),
            records,
            settings,
            binding: None,
            buffer: Vec::new(),
            sync: None,
        }
    }

    pub fn with_sync(mut self, sync: SyncHandle) -> Self {
        self.set_sync(sync);
        self
    }

    /// Forward a connectivity change to the sync worker, if any.
    pub fn set_online(&self, online: bool) {
        if let Some(sync) = &self.sync {
            sync.set_online(online);
        }
    }

    pub fn set_sync(&mut self, sync: SyncHandle) {
        self.sync = Some(sync);
    }

    pub fn storage(&self) -> Arc<dyn KeyValueStore> {
        self.kv.clone()
    }

    pub fn records(&self) -> DurableRecords {
        self.records.clone()
    }

    pub fn binding(&self) -> Option<&Binding> {
        self.binding.as_ref()
    }

    pub fn buffer(&self) -> &[StoredPrompt] {
        &self.buffer
    }

    /// Switch to a conversation. A different conversation clears the
    /// in-memory buffer and reloads whatever the session scope held for it.
    /// Returns true when the binding changed.
    pub async fn bind(&mut self, platform: Platform, conversation_id: &str) -> bool {
        let next = Binding {
            platform,
            conversation_id: conversation_id.to_string(),
        };
        if self.binding.as_ref() == Some(&next) {
            return false;
        }

        if let Some(previous) = &self.binding {
            info!(
                "Conversation changed {}:{} -> {}:{}",
                previous.platform, previous.conversation_id, platform, conversation_id
            );
        }

        self.buffer = match self.load_session_buffer(platform, conversation_id).await {
            Ok(buffer) => buffer,
            Err(e) => {
                warn!("Failed to load session buffer: {}", e);
                Vec::new()
            }
        };
        self.binding = Some(next);
        true
    }

    async fn load_session_buffer(
        &self,
        platform: Platform,
        conversation_id: &str,
    ) -> Result<Vec<StoredPrompt>, StorageError> {
        let key = session_storage_key(platform, conversation_id);
        match self.kv.get(StorageScope::Session, &key).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(Vec::new()),
        }
    }

    /// Guard, buffer, persist and queue for sync. Returns the stored entry,
    /// or `None` when the capture was rejected or no conversation is bound.
    pub async fn record(&mut self, capture: Capture) -> Option<StoredPrompt> {
        let binding = self.binding.clone()?;
        let content = normalize_whitespace(&capture.content);

        match check_capture(&content, capture.timestamp, &self.buffer) {
            Ok(()) => {}
            // Nothing about the match is logged.
            Err(Rejection::Pii) => return None,
            Err(reason) => {
                debug!("Capture rejected: {:?}", reason);
                return None;
            }
        }

        let stored = StoredPrompt {
            prompt: ScrapedPrompt {
                content,
                index: self.buffer.len(),
                timestamp: Some(capture.timestamp),
                conversation_id: Some(binding.conversation_id.clone()),
                source: capture.method.source(),
            },
            id: format!("{}-{}", binding.platform, uuid::Uuid::new_v4()),
            capture_method: capture.method,
            synced: false,
            retry_count: 0,
        };

        self.buffer.push(stored.clone());
        trim_oldest(&mut self.buffer, self.settings.memory_cap);

        self.persist_session(&binding).await;
        self.append_durable(&binding, std::slice::from_ref(&stored)).await;

        if let Some(sync) = &self.sync {
            sync.enqueue(binding.platform, stored.clone());
        }
        Some(stored)
    }

    /// In-memory entries as keylog prompts.
    pub fn session_prompts(&self) -> Vec<ScrapedPrompt> {
        self.buffer.iter().map(|p| p.prompt.clone()).collect()
    }

    /// Merge prompts handed over by another context into the durable record.
    pub async fn save_prompts(
        &mut self,
        platform: Platform,
        conversation_id: &str,
        prompts: Vec<ScrapedPrompt>,
    ) -> usize {
        let binding = Binding {
            platform,
            conversation_id: conversation_id.to_string(),
        };
        let entries: Vec<StoredPrompt> = prompts
            .into_iter()
            .map(|prompt| StoredPrompt {
                capture_method: match prompt.source {
                    PromptSource::Dom => CaptureMethod::Dom,
                    PromptSource::Network => CaptureMethod::Network,
                    PromptSource::Keylog => CaptureMethod::Keyboard,
                },
                prompt: ScrapedPrompt {
                    conversation_id: Some(conversation_id.to_string()),
                    ..prompt
                },
                id: format!("{}-{}", platform, uuid::Uuid::new_v4()),
                synced: false,
                retry_count: 0,
            })
            .collect();
        self.append_durable(&binding, &entries).await
    }

    /// Explicit reset: forget the conversation everywhere.
    pub async fn reset(&mut self) {
        self.buffer.clear();
        let Some(binding) = self.binding.clone() else {
            return;
        };
        let session_key = session_storage_key(binding.platform, &binding.conversation_id);
        if let Err(e) = self.kv.remove(StorageScope::Session, &session_key).await {
            warn!("Failed to clear {}: {}", session_key, e);
        }
        if let Err(e) = self
            .records
            .remove(binding.platform, &binding.conversation_id)
            .await
        {
            warn!("Failed to clear durable record {}: {}", binding.conversation_id, e);
        }
    }

    async fn persist_session(&self, binding: &Binding) {
        let key = session_storage_key(binding.platform, &binding.conversation_id);
        let result = match serde_json::to_value(&self.buffer) {
            Ok(value) => self.kv.set(StorageScope::Session, &key, value).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            warn!("Failed to persist session buffer {}: {}", key, e);
        }
    }

    /// Appends entries not already present (by id or dedup rules) and trims
    /// to the durable cap. Returns how many were added.
    async fn append_durable(&self, binding: &Binding, entries: &[StoredPrompt]) -> usize {
        let cap = self.settings.durable_cap;
        let mut added = 0;
        let result = self
            .records
            .update(binding.platform, &binding.conversation_id, |slot| {
                let record = slot.get_or_insert_with(|| ConversationStorage {
                    conversation_id: binding.conversation_id.clone(),
                    platform: binding.platform,
                    prompts: Vec::new(),
                    last_updated: 0,
                });
                for entry in entries {
                    let timestamp = entry.prompt.timestamp.unwrap_or_default();
                    if record.prompts.iter().any(|p| p.id == entry.id)
                        || check_capture(&entry.prompt.content, timestamp, &record.prompts).is_err()
                    {
                        continue;
                    }
                    record.prompts.push(entry.clone());
                    added += 1;
                }
                if added == 0 {
                    return false;
                }
                trim_oldest(&mut record.prompts, cap);
                record.last_updated = now_millis();
                true
            })
            .await;

        match result {
            Ok(_) => added,
            Err(e) => {
                warn!("Failed to persist durable record {}: {}", binding.conversation_id, e);
                0
            }
        }
    }
}

fn trim_oldest(prompts: &mut Vec<StoredPrompt>, cap: usize) {
    if prompts.len() > cap {
        let excess = prompts.len() - cap;
        prompts.drain(..excess);
    }
    for (index, prompt) in prompts.iter_mut().enumerate() {
        prompt.prompt.index = index;
    }
}
