use super::kv::{KeyValueStore, StorageScope};
use promptlog_common::error::StorageError;
use promptlog_common::protocol::{ConversationStorage, Platform, durable_storage_key};
use std::sync::Arc;
use tokio::sync::Mutex;

pub async fn load_conversation(
    kv: &dyn KeyValueStore,
    platform: Platform,
    conversation_id: &str,
) -> Result<Option<ConversationStorage>, StorageError> {
    let key = durable_storage_key(platform, conversation_id);
    match kv.get(StorageScope::Durable, &key).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Durable conversation records with serialised read-modify-write.
///
/// Every writer of `prompts_*` records (the session store and the sync
/// worker) must share one `DurableRecords`; clones share the lock.
#[derive(Clone)]
pub struct DurableRecords {
    kv: Arc<dyn KeyValueStore>,
    lock: Arc<Mutex<()>>,
}

impl DurableRecords {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn storage(&self) -> &Arc<dyn KeyValueStore> {
        &self.kv
    }

    pub async fn load(
        &self,
        platform: Platform,
        conversation_id: &str,
    ) -> Result<Option<ConversationStorage>, StorageError> {
        load_conversation(self.kv.as_ref(), platform, conversation_id).await
    }

    /// Applies `change` to the current record while holding the lock. The
    /// record is written back only when `change` returns true.
    pub async fn update<F>(
        &self,
        platform: Platform,
        conversation_id: &str,
        change: F,
    ) -> Result<bool, StorageError>
    where
        F: FnOnce(&mut Option<ConversationStorage>) -> bool + Send,
    {
        let _held = self.lock.lock().await;
        let mut record = self.load(platform, conversation_id).await?;
        if !change(&mut record) {
            return Ok(false);
        }

        let key = durable_storage_key(platform, conversation_id);
        match record {
            Some(record) => {
                self.kv
                    .set(StorageScope::Durable, &key, serde_json::to_value(&record)?)
                    .await?
            }
            None => self.kv.remove(StorageScope::Durable, &key).await?,
        }
        Ok(true)
    }

    pub async fn remove(&self, platform: Platform, conversation_id: &str) -> Result<(), StorageError> {
        let _held = self.lock.lock().await;
        self.kv
            .remove(StorageScope::Durable, &durable_storage_key(platform, conversation_id))
            .await
    }
}
