use super::schema::EngineConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Config files searched by [`ConfigLoader::load_default`], most specific first.
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("./promptlog.yaml")];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".promptlog").join("config.yaml"));
        }
        paths
    }

    /// First existing file from [`ConfigLoader::search_paths`], else defaults.
    pub async fn load_default() -> Result<EngineConfig, ConfigError> {
        for path in Self::search_paths() {
            if path.exists() {
                return Self::load_from(&path).await;
            }
        }
        debug!("No config file found, using defaults");
        Ok(EngineConfig::default())
    }

    pub async fn load_from(path: &Path) -> Result<EngineConfig, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        let config = Self::parse(&content)?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse and validate YAML. Blank input yields the defaults.
    pub fn parse(content: &str) -> Result<EngineConfig, ConfigError> {
        let config = if content.trim().is_empty() {
            EngineConfig::default()
        } else {
            serde_yaml::from_str(content)?
        };
        Self::validate(&config)?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(config: &EngineConfig) -> Result<(), ConfigError> {
        let storage = &config.storage;
        if storage.memory_cap == 0 {
            return Err(invalid("storage.memory_cap", "must be at least 1"));
        }
        if storage.durable_cap < storage.memory_cap {
            return Err(invalid(
                "storage.durable_cap",
                format!(
                    "{} is below storage.memory_cap ({})",
                    storage.durable_cap, storage.memory_cap
                ),
            ));
        }

        let sync = &config.sync;
        if sync.max_retries == 0 {
            return Err(invalid("sync.max_retries", "must be at least 1"));
        }
        if let Some(endpoint) = &sync.endpoint {
            let url = Url::parse(endpoint)
                .map_err(|e| invalid("sync.endpoint", format!("'{}': {}", endpoint, e)))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(invalid(
                    "sync.endpoint",
                    format!("unsupported scheme '{}'", url.scheme()),
                ));
            }
        }

        let timeouts = [
            ("extraction.lock_timeout_ms", config.extraction.lock_timeout_ms),
            (
                "extraction.persisted_fetch_timeout_ms",
                config.extraction.persisted_fetch_timeout_ms,
            ),
            ("capture.confirm_window_ms", config.capture.confirm_window_ms),
        ];
        for (field, value) in timeouts {
            if value == 0 {
                return Err(invalid(field, "must be greater than zero"));
            }
        }
        Ok(())
    }
}
