use async_trait::async_trait;
use promptlog_common::error::StorageError;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Extension-style storage areas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageScope {
    /// Lives as long as the browser session.
    Session,
    /// Survives reloads and restarts.
    Durable,
}

impl StorageScope {
    fn dir_name(&self) -> &'static str {
        match self {
            StorageScope::Session => "session",
            StorageScope::Durable => "durable",
        }
    }
}

/// Key-value storage holding JSON values.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, scope: StorageScope, key: &str) -> Result<Option<Value>, StorageError>;

    async fn set(&self, scope: StorageScope, key: &str, value: Value) -> Result<(), StorageError>;

    async fn remove(&self, scope: StorageScope, key: &str) -> Result<(), StorageError>;

    async fn keys(&self, scope: StorageScope) -> Result<Vec<String>, StorageError>;

    async fn clear(&self, scope: StorageScope) -> Result<(), StorageError> {
        for key in self.keys(scope).await? {
            self.remove(scope, &key).await?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<HashMap<(StorageScope, String), Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, scope: StorageScope, key: &str) -> Result<Option<Value>, StorageError> {
        let data = self.data.lock().await;
        Ok(data.get(&(scope, key.to_string())).cloned())
    }

    async fn set(&self, scope: StorageScope, key: &str, value: Value) -> Result<(), StorageError> {
        let mut data = self.data.lock().await;
        data.insert((scope, key.to_string()), value);
        Ok(())
    }

    async fn remove(&self, scope: StorageScope, key: &str) -> Result<(), StorageError> {
        let mut data = self.data.lock().await;
        data.remove(&(scope, key.to_string()));
        Ok(())
    }

    async fn keys(&self, scope: StorageScope) -> Result<Vec<String>, StorageError> {
        let data = self.data.lock().await;
        let mut keys: Vec<String> = data
            .keys()
            .filter(|(s, _)| *s == scope)
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}

/// One JSON file per key under `<root>/<scope>/`.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, scope: StorageScope, key: &str) -> PathBuf {
        self.root
            .join(scope.dir_name())
            .join(format!("{}.json", sanitize_key(key)))
    }
}

/// Keys are built from platform names and URL-derived ids; anything outside
/// a conservative charset is replaced so keys map to plain file names.
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, scope: StorageScope, key: &str) -> Result<Option<Value>, StorageError> {
        let path = self.path_for(scope, key);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, scope: StorageScope, key: &str, value: Value) -> Result<(), StorageError> {
        let path = self.path_for(scope, key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(&value)?).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove(&self, scope: StorageScope, key: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.path_for(scope, key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn keys(&self, scope: StorageScope) -> Result<Vec<String>, StorageError> {
        let dir = self.root.join(scope.dir_name());
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(key) = name.strip_suffix(".json") {
                keys.push(key.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}
