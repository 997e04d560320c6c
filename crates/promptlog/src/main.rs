mod offline;

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use offline::SnapshotPage;
use promptlog_engine::config::{ConfigLoader, EngineConfig};
use promptlog_engine::formatter::{format_prompt, format_result, format_summary};
use promptlog_engine::page::Page;
use promptlog_engine::protocol::{ConversationStorage, ExtractionMode, Platform, ScrapedPrompt};
use promptlog_engine::store::{
    FileStore, HttpSyncClient, KeyValueStore, StorageScope, SyncWorker, load_conversation,
};
use promptlog_engine::ExtractionSession;
use promptlog_h::HeadlessPage;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// How often `watch` drains hook events from the page.
const WATCH_POLL: Duration = Duration::from_millis(250);

#[derive(Parser)]
#[command(name = "promptlog", version, about = "Extract and log prompts from AI chat pages")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Config file (defaults to ./promptlog.yaml, then ~/.promptlog/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Open a conversation in Chromium and extract its prompts
    Extract {
        #[arg(long)]
        url: String,
        /// auto, keylog-only or dom-only
        #[arg(long, value_parser = parse_mode)]
        mode: Option<ExtractionMode>,
        /// Launch browser in visible mode (not headless)
        #[arg(long)]
        visible: bool,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
        /// Time to let the page render before extracting, in ms
        #[arg(long, default_value_t = 1500)]
        settle_ms: u64,
    },
    /// Record prompts as they are sent; extract the whole conversation on Ctrl-C
    Watch {
        #[arg(long)]
        url: String,
        #[arg(long)]
        visible: bool,
    },
    /// List stored conversations, or one conversation's prompts
    History {
        #[arg(long, value_parser = parse_platform)]
        platform: Option<Platform>,
        #[arg(long)]
        conversation: Option<String>,
    },
    /// Extract from a saved probe snapshot without a browser
    Offline {
        #[arg(long)]
        snapshot: PathBuf,
        /// Overrides the URL recorded in the snapshot
        #[arg(long)]
        url: Option<String>,
        #[arg(long, value_parser = parse_mode)]
        mode: Option<ExtractionMode>,
        #[arg(long)]
        json: bool,
    },
}

fn parse_mode(s: &str) -> Result<ExtractionMode, String> {
    ExtractionMode::parse(s).ok_or_else(|| format!("unknown mode '{}'", s))
}

fn parse_platform(s: &str) -> Result<Platform, String> {
    Platform::parse(s).ok_or_else(|| format!("unknown platform '{}'", s))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays clean for results and JSON.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => ConfigLoader::load_from(path).await,
        None => ConfigLoader::load_default().await,
    }
    .context("Failed to load configuration")?;

    match args.command {
        Command::Extract {
            url,
            mode,
            visible,
            json,
            settle_ms,
        } => {
            let mode = mode.unwrap_or(config.extraction.default_mode);
            let (session, sync_task) = open_session(config);
            let mut page = HeadlessPage::new_with_visibility(visible);
            page.launch().await?;

            let outcome = async {
                page.navigate(&url).await?;
                tokio::time::sleep(Duration::from_millis(settle_ms)).await;
                Ok::<_, anyhow::Error>(session.extract(&mut page, mode).await?)
            }
            .await;
            page.close().await?;

            let result = outcome?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", format_result(&result));
            }
            finish(session, sync_task).await;
        }
        Command::Watch { url, visible } => {
            let mode = config.extraction.default_mode;
            let (session, sync_task) = open_session(config);
            let mut page = HeadlessPage::new_with_visibility(visible);
            page.launch().await?;
            page.navigate(&url).await?;
            session.attach(&mut page).await?;
            info!("Watching {} (Ctrl-C to stop)", url);

            let mut ticker = tokio::time::interval(WATCH_POLL);
            loop {
                tokio::select! {
                    _ = ticker.tick() => match session.pump_events(&mut page).await {
                        Ok(recorded) => {
                            for stored in recorded {
                                println!("{}", format_prompt(&stored.prompt));
                            }
                        }
                        Err(e) => warn!("Failed to pump capture events: {}", e),
                    },
                    _ = tokio::signal::ctrl_c() => break,
                }
            }

            // final reconciliation of everything seen while watching
            let outcome = session.extract(&mut page, mode).await;
            page.close().await?;
            println!("{}", format_result(&outcome?));
            finish(session, sync_task).await;
        }
        Command::History {
            platform,
            conversation,
        } => {
            let kv = FileStore::new(config.storage.resolved_dir());
            match (platform, conversation) {
                (Some(platform), Some(id)) => {
                    let prompts: Vec<ScrapedPrompt> = load_conversation(&kv, platform, &id)
                        .await?
                        .map(|record| record.prompts.into_iter().map(|p| p.prompt).collect())
                        .unwrap_or_default();
                    println!("{}", format_summary(&prompts));
                }
                (None, Some(_)) => return Err(anyhow!("--conversation requires --platform")),
                (platform, None) => list_conversations(&kv, platform).await?,
            }
        }
        Command::Offline {
            snapshot,
            url,
            mode,
            json,
        } => {
            let mode = mode.unwrap_or(config.extraction.default_mode);
            let mut page = SnapshotPage::load(&snapshot, url)
                .await
                .with_context(|| format!("Failed to read snapshot {}", snapshot.display()))?;
            let (session, sync_task) = open_session(config);
            let result = session.extract(&mut page, mode).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", format_result(&result));
            }
            finish(session, sync_task).await;
        }
    }

    Ok(())
}

/// Session over the file store, with a sync worker when an endpoint is configured.
fn open_session(config: EngineConfig) -> (ExtractionSession, Option<JoinHandle<()>>) {
    let kv: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(config.storage.resolved_dir()));
    let endpoint = config.sync.endpoint.clone();
    let sync_settings = config.sync.clone();
    let session = ExtractionSession::new(config, kv);

    match endpoint {
        Some(endpoint) => {
            info!("Syncing prompts to {}", endpoint);
            let client = Arc::new(HttpSyncClient::new(endpoint));
            let records = session.durable_records();
            let (handle, task) = SyncWorker::spawn(client, sync_settings, Some(records));
            (session.with_sync(handle), Some(task))
        }
        None => (session, None),
    }
}

/// Drops the session (and with it the last sync handle) and waits for the
/// worker's final flush.
async fn finish(session: ExtractionSession, sync_task: Option<JoinHandle<()>>) {
    drop(session);
    if let Some(task) = sync_task
        && let Err(e) = task.await
    {
        warn!("Sync worker ended abnormally: {}", e);
    }
}

async fn list_conversations(kv: &dyn KeyValueStore, platform: Option<Platform>) -> anyhow::Result<()> {
    let mut records = Vec::new();
    for key in kv.keys(StorageScope::Durable).await? {
        if !key.starts_with("prompts_") {
            continue;
        }
        let Some(value) = kv.get(StorageScope::Durable, &key).await? else {
            continue;
        };
        match serde_json::from_value::<ConversationStorage>(value) {
            Ok(record) if platform.is_none_or(|p| p == record.platform) => records.push(record),
            Ok(_) => {}
            Err(e) => warn!("Skipping unreadable record {}: {}", key, e),
        }
    }

    if records.is_empty() {
        println!("No conversations stored.");
        return Ok(());
    }
    records.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
    for record in records {
        println!(
            "{:<10} {:<40} {:>4} prompts  updated {}",
            record.platform.as_str(),
            record.conversation_id,
            record.prompts.len(),
            record.last_updated
        );
    }
    Ok(())
}
