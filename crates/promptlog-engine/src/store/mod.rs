//! Capture persistence: storage scopes, the per-conversation buffer and
//! background delivery.

pub mod kv;
pub mod records;
pub mod session;
pub mod sync;

pub use kv::{FileStore, KeyValueStore, MemoryStore, StorageScope};
pub use records::{DurableRecords, load_conversation};
pub use session::{Binding, ConversationLogSource, DurableLogs, SessionStore};
pub use sync::{FlushReport, HttpSyncClient, PendingSync, SyncClient, SyncHandle, SyncQueue, SyncWorker};
