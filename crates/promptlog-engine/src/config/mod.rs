pub mod loader;
pub mod schema;

pub use loader::{ConfigError, ConfigLoader};
pub use schema::{
    CaptureSettings, EngineConfig, ExtractionSettings, StorageSettings, SyncSettings,
};
