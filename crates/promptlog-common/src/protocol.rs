use serde::{Deserialize, Serialize};
use std::fmt;

/// Chat platforms the engine knows how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    ChatGpt,
    Claude,
    Gemini,
    Perplexity,
    DeepSeek,
    Grok,
    Copilot,
    Generic,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::ChatGpt => "chatgpt",
            Platform::Claude => "claude",
            Platform::Gemini => "gemini",
            Platform::Perplexity => "perplexity",
            Platform::DeepSeek => "deepseek",
            Platform::Grok => "grok",
            Platform::Copilot => "copilot",
            Platform::Generic => "generic",
        }
    }

    pub fn parse(name: &str) -> Option<Platform> {
        match name.trim().to_ascii_lowercase().as_str() {
            "chatgpt" => Some(Platform::ChatGpt),
            "claude" => Some(Platform::Claude),
            "gemini" => Some(Platform::Gemini),
            "perplexity" => Some(Platform::Perplexity),
            "deepseek" => Some(Platform::DeepSeek),
            "grok" => Some(Platform::Grok),
            "copilot" => Some(Platform::Copilot),
            "generic" => Some(Platform::Generic),
            _ => None,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a prompt was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptSource {
    Dom,
    Keylog,
    Network,
}

/// One user-authored turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedPrompt {
    pub content: String,
    pub index: usize,
    /// Epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    pub source: PromptSource,
}

impl ScrapedPrompt {
    pub fn from_dom(content: impl Into<String>, index: usize) -> Self {
        Self {
            content: content.into(),
            index,
            timestamp: None,
            conversation_id: None,
            source: PromptSource::Dom,
        }
    }

    pub fn from_keylog(content: impl Into<String>, timestamp: u64) -> Self {
        Self {
            content: content.into(),
            index: 0,
            timestamp: Some(timestamp),
            conversation_id: None,
            source: PromptSource::Keylog,
        }
    }
}

/// The engine's only externally visible output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub platform: Platform,
    pub url: String,
    pub title: String,
    pub prompts: Vec<ScrapedPrompt>,
    pub extracted_at: u64,
    pub conversation_id: String,
}

/// How a stored prompt was captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMethod {
    Network,
    Dom,
    ButtonClick,
    Keyboard,
}

impl CaptureMethod {
    pub fn source(&self) -> PromptSource {
        match self {
            CaptureMethod::Network => PromptSource::Network,
            CaptureMethod::Dom => PromptSource::Dom,
            CaptureMethod::ButtonClick | CaptureMethod::Keyboard => PromptSource::Keylog,
        }
    }
}

/// Persisted form of a prompt, only used inside the session store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredPrompt {
    #[serde(flatten)]
    pub prompt: ScrapedPrompt,
    pub id: String,
    pub capture_method: CaptureMethod,
    #[serde(default)]
    pub synced: bool,
    #[serde(default)]
    pub retry_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationStorage {
    pub conversation_id: String,
    pub platform: Platform,
    #[serde(default)]
    pub prompts: Vec<StoredPrompt>,
    pub last_updated: u64,
}

/// `{platform}_{conversationId}`
pub fn conversation_key(platform: Platform, conversation_id: &str) -> String {
    format!("{}_{}", platform.as_str(), conversation_id)
}

/// Session-scope storage key.
pub fn session_storage_key(platform: Platform, conversation_id: &str) -> String {
    format!("sessionPrompts_{}", conversation_key(platform, conversation_id))
}

/// Reload-durable storage key.
pub fn durable_storage_key(platform: Platform, conversation_id: &str) -> String {
    format!("prompts_{}", conversation_key(platform, conversation_id))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionMode {
    #[default]
    Auto,
    KeylogOnly,
    DomOnly,
}

impl ExtractionMode {
    pub fn parse(name: &str) -> Option<ExtractionMode> {
        match name.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "auto" => Some(ExtractionMode::Auto),
            "keylog-only" | "keylog" => Some(ExtractionMode::KeylogOnly),
            "dom-only" | "dom" => Some(ExtractionMode::DomOnly),
            _ => None,
        }
    }
}

/// Messages exchanged with the background orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum Message {
    ExtractPrompts {
        #[serde(default)]
        mode: ExtractionMode,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        extraction_source: Option<String>,
    },
    ExtractionResult {
        result: ExtractionResult,
        mode: ExtractionMode,
    },
    ExtractionFromPageResult {
        result: ExtractionResult,
        mode: ExtractionMode,
    },
    ExtractionError {
        error: String,
    },
    SaveSessionPrompts {
        prompts: Vec<ScrapedPrompt>,
        platform: Platform,
        conversation_id: String,
    },
    GetConversationLogs {
        platform: Platform,
        conversation_id: String,
    },
    ConversationLogs {
        prompts: Vec<ScrapedPrompt>,
    },
    SyncPromptToCloud {
        prompt: StoredPrompt,
        platform: Platform,
    },
    SyncPromptsToCloud {
        prompts: Vec<StoredPrompt>,
        platform: Platform,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_prompt_flattens_scraped_fields() {
        let stored = StoredPrompt {
            prompt: ScrapedPrompt::from_keylog("hello there", 42),
            id: "p1".into(),
            capture_method: CaptureMethod::ButtonClick,
            synced: false,
            retry_count: 0,
        };
        let value = serde_json::to_value(&stored).unwrap();
        assert_eq!(value["content"], "hello there");
        assert_eq!(value["timestamp"], 42);
        assert_eq!(value["source"], "keylog");
        assert_eq!(value["captureMethod"], "button_click");
        assert_eq!(value["retryCount"], 0);
    }

    #[test]
    fn message_uses_screaming_tag_and_camel_fields() {
        let msg = Message::GetConversationLogs {
            platform: Platform::Claude,
            conversation_id: "abc".into(),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "GET_CONVERSATION_LOGS");
        assert_eq!(value["conversationId"], "abc");
        assert_eq!(value["platform"], "claude");

        let parsed: Message =
            serde_json::from_str(r#"{"type":"EXTRACT_PROMPTS","mode":"keylog-only"}"#).unwrap();
        assert_eq!(
            parsed,
            Message::ExtractPrompts {
                mode: ExtractionMode::KeylogOnly,
                extraction_source: None
            }
        );
    }

    #[test]
    fn storage_keys_follow_platform_conversation_schema() {
        assert_eq!(
            durable_storage_key(Platform::ChatGpt, "123"),
            "prompts_chatgpt_123"
        );
        assert_eq!(
            session_storage_key(Platform::Gemini, "x"),
            "sessionPrompts_gemini_x"
        );
    }
}
