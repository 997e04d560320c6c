use promptlog_common::protocol::ExtractionMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default)]
    pub extraction: ExtractionSettings,
    #[serde(default)]
    pub capture: CaptureSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Root for the file-backed store. Defaults to `~/.promptlog/storage`.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default = "default_memory_cap")]
    pub memory_cap: usize,
    #[serde(default = "default_durable_cap")]
    pub durable_cap: usize,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            dir: None,
            memory_cap: default_memory_cap(),
            durable_cap: default_durable_cap(),
        }
    }
}

impl StorageSettings {
    pub fn resolved_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join(".promptlog")
                .join("storage")
        })
    }
}

fn default_memory_cap() -> usize {
    100
}

fn default_durable_cap() -> usize {
    1000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Backend URL; sync is disabled when unset.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            debounce_ms: default_debounce_ms(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl SyncSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

fn default_debounce_ms() -> u64 {
    2000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionSettings {
    /// Safety timeout after which a held extraction lock is force-cleared.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    #[serde(default = "default_persisted_fetch_timeout_ms")]
    pub persisted_fetch_timeout_ms: u64,
    #[serde(default)]
    pub default_mode: ExtractionMode,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_lock_timeout_ms(),
            persisted_fetch_timeout_ms: default_persisted_fetch_timeout_ms(),
            default_mode: ExtractionMode::Auto,
        }
    }
}

impl ExtractionSettings {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn persisted_fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.persisted_fetch_timeout_ms)
    }
}

fn default_lock_timeout_ms() -> u64 {
    30000
}

fn default_persisted_fetch_timeout_ms() -> u64 {
    2000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSettings {
    #[serde(default = "default_confirm_window_ms")]
    pub confirm_window_ms: u64,
    #[serde(default = "default_reattach_debounce_ms")]
    pub reattach_debounce_ms: u64,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            confirm_window_ms: default_confirm_window_ms(),
            reattach_debounce_ms: default_reattach_debounce_ms(),
        }
    }
}

fn default_confirm_window_ms() -> u64 {
    2000
}

fn default_reattach_debounce_ms() -> u64 {
    500
}
