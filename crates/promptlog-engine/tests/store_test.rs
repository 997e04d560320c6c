use promptlog_engine::capture::Capture;
use promptlog_engine::config::StorageSettings;
use promptlog_engine::protocol::{
    CaptureMethod, Platform, ScrapedPrompt, durable_storage_key, session_storage_key,
};
use promptlog_engine::store::{
    ConversationLogSource, DurableLogs, FileStore, KeyValueStore, MemoryStore, SessionStore,
    StorageScope, load_conversation,
};
use serde_json::json;
use std::sync::Arc;

fn capture(content: &str, timestamp: u64) -> Capture {
    Capture {
        content: content.into(),
        method: CaptureMethod::ButtonClick,
        timestamp,
    }
}

#[tokio::test]
async fn memory_store_scopes_are_separate() {
    let kv = MemoryStore::new();
    kv.set(StorageScope::Session, "k", json!([1, 2])).await.unwrap();
    assert_eq!(kv.get(StorageScope::Session, "k").await.unwrap(), Some(json!([1, 2])));
    assert_eq!(kv.get(StorageScope::Durable, "k").await.unwrap(), None);

    kv.set(StorageScope::Durable, "b", json!(1)).await.unwrap();
    kv.set(StorageScope::Durable, "a", json!(2)).await.unwrap();
    assert_eq!(kv.keys(StorageScope::Durable).await.unwrap(), ["a", "b"]);

    kv.clear(StorageScope::Durable).await.unwrap();
    assert!(kv.keys(StorageScope::Durable).await.unwrap().is_empty());
    assert_eq!(kv.keys(StorageScope::Session).await.unwrap(), ["k"]);
}

#[tokio::test]
async fn file_store_round_trips_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let kv = FileStore::new(dir.path());

    assert_eq!(kv.get(StorageScope::Durable, "prompts_claude_abc").await.unwrap(), None);
    kv.set(StorageScope::Durable, "prompts_claude_abc", json!({"n": 1}))
        .await
        .unwrap();
    assert!(dir.path().join("durable").join("prompts_claude_abc.json").exists());

    // a second instance over the same directory sees the data
    let reopened = FileStore::new(dir.path());
    assert_eq!(
        reopened.get(StorageScope::Durable, "prompts_claude_abc").await.unwrap(),
        Some(json!({"n": 1}))
    );
    assert_eq!(
        reopened.keys(StorageScope::Durable).await.unwrap(),
        ["prompts_claude_abc"]
    );

    reopened.remove(StorageScope::Durable, "prompts_claude_abc").await.unwrap();
    reopened.remove(StorageScope::Durable, "prompts_claude_abc").await.unwrap();
    assert!(reopened.keys(StorageScope::Session).await.unwrap().is_empty());
}

#[tokio::test]
async fn file_store_sanitises_keys() {
    let dir = tempfile::tempdir().unwrap();
    let kv = FileStore::new(dir.path());
    kv.set(StorageScope::Session, "odd/key with spaces", json!(true))
        .await
        .unwrap();
    assert!(dir.path().join("session").join("odd_key_with_spaces.json").exists());
    assert_eq!(
        kv.get(StorageScope::Session, "odd/key with spaces").await.unwrap(),
        Some(json!(true))
    );
}

#[tokio::test]
async fn record_writes_session_and_durable_keys() {
    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let mut store = SessionStore::new(kv.clone(), StorageSettings::default());
    store.bind(Platform::Claude, "c1").await;
    store.record(capture("Plan a three day trip", 100)).await.unwrap();

    let session = kv
        .get(StorageScope::Session, &session_storage_key(Platform::Claude, "c1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session[0]["content"], "Plan a three day trip");
    assert_eq!(session[0]["captureMethod"], "button_click");

    let record = load_conversation(kv.as_ref(), Platform::Claude, "c1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.platform, Platform::Claude);
    assert_eq!(record.conversation_id, "c1");
    assert_eq!(record.prompts.len(), 1);
    assert!(!record.prompts[0].synced);
    assert!(record.last_updated > 0);
    assert!(
        kv.get(StorageScope::Durable, &durable_storage_key(Platform::Claude, "c1"))
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn buffers_are_trimmed_oldest_first() {
    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let settings = StorageSettings {
        dir: None,
        memory_cap: 3,
        durable_cap: 5,
    };
    let mut store = SessionStore::new(kv.clone(), settings);
    store.bind(Platform::Grok, "g").await;
    for i in 0..7u64 {
        store
            .record(capture(&format!("distinct prompt number {}", i), i * 10_000))
            .await
            .unwrap();
    }

    let buffered: Vec<&str> = store.buffer().iter().map(|p| p.prompt.content.as_str()).collect();
    assert_eq!(
        buffered,
        [
            "distinct prompt number 4",
            "distinct prompt number 5",
            "distinct prompt number 6"
        ]
    );
    assert_eq!(store.buffer()[0].prompt.index, 0);

    let record = load_conversation(kv.as_ref(), Platform::Grok, "g").await.unwrap().unwrap();
    assert_eq!(record.prompts.len(), 5);
    assert_eq!(record.prompts[0].prompt.content, "distinct prompt number 2");
}

#[tokio::test]
async fn rebinding_swaps_buffers_and_reload_restores_them() {
    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let mut store = SessionStore::new(kv.clone(), StorageSettings::default());
    assert!(store.bind(Platform::ChatGpt, "one").await);
    assert!(!store.bind(Platform::ChatGpt, "one").await);
    store.record(capture("question in the first chat", 1)).await.unwrap();

    assert!(store.bind(Platform::ChatGpt, "two").await);
    assert!(store.buffer().is_empty());
    assert!(store.session_prompts().is_empty());

    // page reload: fresh store, same storage
    let mut reloaded = SessionStore::new(kv.clone(), StorageSettings::default());
    reloaded.bind(Platform::ChatGpt, "one").await;
    assert_eq!(reloaded.session_prompts()[0].content, "question in the first chat");
}

#[tokio::test]
async fn reset_forgets_conversation_everywhere() {
    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let mut store = SessionStore::new(kv.clone(), StorageSettings::default());
    store.bind(Platform::Perplexity, "p").await;
    store.record(capture("search for rust books", 1)).await.unwrap();

    store.reset().await;
    assert!(store.buffer().is_empty());
    assert!(kv.keys(StorageScope::Session).await.unwrap().is_empty());
    assert!(kv.keys(StorageScope::Durable).await.unwrap().is_empty());
}

#[tokio::test]
async fn saved_prompts_feed_durable_logs() {
    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let mut store = SessionStore::new(kv.clone(), StorageSettings::default());
    let prompts = vec![
        ScrapedPrompt::from_keylog("handed over from another tab", 500),
        ScrapedPrompt::from_dom("seen in the page earlier", 0),
    ];

    let added = store.save_prompts(Platform::DeepSeek, "d1", prompts.clone()).await;
    assert_eq!(added, 2);
    assert_eq!(store.save_prompts(Platform::DeepSeek, "d1", prompts).await, 0);

    let record = load_conversation(kv.as_ref(), Platform::DeepSeek, "d1").await.unwrap().unwrap();
    assert_eq!(record.prompts[1].capture_method, CaptureMethod::Dom);

    let logs = DurableLogs::new(kv.clone());
    let fetched = logs.conversation_logs(Platform::DeepSeek, "d1").await.unwrap();
    assert_eq!(fetched.len(), 2);
    assert_eq!(fetched[0].conversation_id.as_deref(), Some("d1"));
    assert!(logs.conversation_logs(Platform::DeepSeek, "nope").await.unwrap().is_empty());
}
