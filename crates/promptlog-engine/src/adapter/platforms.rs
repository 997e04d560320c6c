use super::{PlatformAdapter, find_scroll_container, scrape_user_turns};
use crate::capture::CaptureSelectors;
use crate::dom::{Document, NodeId, SelectorList};
use crate::scroll::ScrollStrategy;
use lazy_static::lazy_static;
use promptlog_common::normalize::stable_hash;
use promptlog_common::protocol::{Platform, ScrapedPrompt};
use regex::Regex;
use tracing::warn;
use url::Url;

/// Selectors every platform also tries.
pub const GENERIC_TURN_SELECTORS: &[&str] = &[
    r#"[data-message-author-role="user"]"#,
    r#"[data-role="user"]"#,
    r#"[data-author="user"]"#,
    r#"[data-testid="user-message"]"#,
    ".user-message",
    r#"[class*="user-message"]"#,
    r#"[class*="UserMessage"]"#,
];

pub const GENERIC_SEND_SELECTORS: &[&str] = &[
    r#"button[type="submit"]"#,
    r#"button[aria-label*="Send" i]"#,
    r#"[data-testid*="send"]"#,
];

pub const GENERIC_INPUT_SELECTORS: &[&str] = &["textarea", r#"[contenteditable="true"]"#];

/// Static description of one chat site.
#[derive(Debug)]
pub struct SiteProfile {
    pub platform: Platform,
    pub hosts: &'static [&'static str],
    /// Regex over the URL path; capture group 1 is the conversation id.
    pub conversation_pattern: &'static str,
    pub turn_selectors: &'static [&'static str],
    pub container_selectors: &'static [&'static str],
    pub send_selectors: &'static [&'static str],
    pub input_selectors: &'static [&'static str],
    pub strategy: ScrollStrategy,
}

pub static SITE_PROFILES: &[SiteProfile] = &[
    SiteProfile {
        platform: Platform::ChatGpt,
        hosts: &["chatgpt.com", "chat.openai.com"],
        conversation_pattern: r"^/(?:g/[^/]+/)?c/([A-Za-z0-9-]+)",
        turn_selectors: &[
            r#"[data-message-author-role="user"] .whitespace-pre-wrap"#,
            r#"[data-message-author-role="user"]"#,
        ],
        container_selectors: &[
            r#"main [class*="react-scroll-to-bottom"] > div"#,
            r#"main div[class*="overflow-y-auto"]"#,
        ],
        send_selectors: &[
            r#"[data-testid="send-button"]"#,
            r#"button[aria-label*="Send prompt"]"#,
        ],
        input_selectors: &["#prompt-textarea", r#"div.ProseMirror[contenteditable="true"]"#],
        strategy: ScrollStrategy::Phased,
    },
    SiteProfile {
        platform: Platform::Claude,
        hosts: &["claude.ai"],
        conversation_pattern: r"^/chat/([A-Za-z0-9-]+)",
        turn_selectors: &[r#"[data-testid="user-message"]"#, ".font-user-message"],
        container_selectors: &[
            r#"div[class*="overflow-y-scroll"]"#,
            r#"div[class*="overflow-y-auto"]"#,
        ],
        send_selectors: &[
            r#"button[aria-label="Send message"]"#,
            r#"button[aria-label*="Send"]"#,
        ],
        input_selectors: &[r#"div.ProseMirror[contenteditable="true"]"#],
        strategy: ScrollStrategy::Phased,
    },
    SiteProfile {
        platform: Platform::Gemini,
        hosts: &["gemini.google.com"],
        conversation_pattern: r"^/(?:u/\d+/)?app/([A-Za-z0-9]+)",
        turn_selectors: &[
            "user-query .query-text",
            "user-query-content",
            ".user-query-bubble-with-background",
        ],
        container_selectors: &["infinite-scroller", r#"[class*="chat-history"]"#],
        send_selectors: &["button.send-button", r#"button[aria-label*="Send"]"#],
        input_selectors: &[
            "rich-textarea .ql-editor",
            r#"div.ql-editor[contenteditable="true"]"#,
        ],
        strategy: ScrollStrategy::SpatialSampling,
    },
    SiteProfile {
        platform: Platform::Perplexity,
        hosts: &["perplexity.ai"],
        conversation_pattern: r"^/search/([A-Za-z0-9._-]+)",
        turn_selectors: &[
            r#"[data-testid="user-query"]"#,
            r#"h1[class*="query"]"#,
            r#"div[class*="query-text"]"#,
        ],
        container_selectors: &[r#"div[class*="scrollable-container"]"#],
        send_selectors: &[r#"button[aria-label="Submit"]"#, r#"button[aria-label*="Send"]"#],
        input_selectors: &["textarea", r#"#ask-input"#],
        strategy: ScrollStrategy::Phased,
    },
    SiteProfile {
        platform: Platform::DeepSeek,
        hosts: &["chat.deepseek.com"],
        conversation_pattern: r"^/a/chat/s/([A-Za-z0-9-]+)",
        turn_selectors: &[
            r#"div[class*="fbb737a4"]"#,
            r#"[class*="user-message"] [class*="message-content"]"#,
        ],
        container_selectors: &[r#"div[class*="scroll-area"]"#],
        send_selectors: &[r#"div[role="button"][aria-disabled="false"]"#],
        input_selectors: &["textarea#chat-input", "textarea"],
        strategy: ScrollStrategy::Phased,
    },
    SiteProfile {
        platform: Platform::Grok,
        hosts: &["grok.com"],
        conversation_pattern: r"^/chat/([A-Za-z0-9-]+)",
        turn_selectors: &[r#"div[class*="items-end"] .message-bubble"#],
        container_selectors: &[r#"div[class*="overflow-y-auto"]"#],
        send_selectors: &[r#"button[type="submit"]"#, r#"button[aria-label="Submit"]"#],
        input_selectors: &["textarea", r#"div[contenteditable="true"]"#],
        strategy: ScrollStrategy::Phased,
    },
    SiteProfile {
        platform: Platform::Copilot,
        hosts: &["copilot.microsoft.com"],
        conversation_pattern: r"^/chats/([A-Za-z0-9_-]+)",
        turn_selectors: &[
            r#"[data-content="user-message"]"#,
            r#"[class*="user-message"]"#,
        ],
        container_selectors: &[r#"div[data-content="conversation"]"#],
        send_selectors: &[r#"button[data-testid="submit-button"]"#, r#"button[title="Submit message"]"#],
        input_selectors: &["textarea#userInput", "textarea"],
        strategy: ScrollStrategy::Phased,
    },
];

lazy_static! {
    static ref GENERIC_TURNS: SelectorList = compile(GENERIC_TURN_SELECTORS, &[]);
    static ref GENERIC_INPUTS: SelectorList = compile(GENERIC_INPUT_SELECTORS, &[]);
}

/// Compiles a selector table. Tables are bundled constants, so an invalid
/// entry is a programming error; it is logged and skipped.
fn compile(primary: &[&str], extra: &[&str]) -> SelectorList {
    let valid: Vec<&str> = primary
        .iter()
        .chain(extra.iter())
        .copied()
        .filter(|s| match SelectorList::parse(s) {
            Ok(_) => true,
            Err(e) => {
                warn!("Skipping invalid selector {}: {}", s, e);
                false
            }
        })
        .collect();
    if valid.is_empty() {
        return SelectorList::empty();
    }
    SelectorList::parse_many(&valid).unwrap_or_else(|_| SelectorList::empty())
}

fn host_matches(url: &Url, hosts: &[&str]) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    let host = host.to_ascii_lowercase();
    hosts
        .iter()
        .any(|h| host == *h || host.ends_with(&format!(".{}", h)))
}

/// Path-hash fallback shared by all adapters.
pub fn fallback_conversation_id(url: &Url) -> String {
    stable_hash(url.path())
}

/// Adapter driven by a [`SiteProfile`].
pub struct SiteAdapter {
    profile: &'static SiteProfile,
    conversation_re: Option<Regex>,
    turns: SelectorList,
    containers: SelectorList,
    inputs: SelectorList,
}

impl SiteAdapter {
    pub fn new(profile: &'static SiteProfile) -> Self {
        Self {
            profile,
            conversation_re: match Regex::new(profile.conversation_pattern) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!("Invalid conversation pattern for {}: {}", profile.platform, e);
                    None
                }
            },
            turns: compile(profile.turn_selectors, GENERIC_TURN_SELECTORS),
            containers: compile(profile.container_selectors, &[]),
            inputs: compile(profile.input_selectors, GENERIC_INPUT_SELECTORS),
        }
    }

    pub fn for_platform(platform: Platform) -> Option<Self> {
        SITE_PROFILES
            .iter()
            .find(|p| p.platform == platform)
            .map(Self::new)
    }

    pub fn profile(&self) -> &'static SiteProfile {
        self.profile
    }
}

impl PlatformAdapter for SiteAdapter {
    fn platform(&self) -> Platform {
        self.profile.platform
    }

    fn detect(&self, url: &Url) -> bool {
        host_matches(url, self.profile.hosts)
    }

    fn conversation_id(&self, url: &Url) -> String {
        self.conversation_re
            .as_ref()
            .and_then(|re| re.captures(url.path()))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| fallback_conversation_id(url))
    }

    fn scrape_prompts(&self, doc: &Document) -> Vec<ScrapedPrompt> {
        scrape_user_turns(doc, &self.turns, Some(&self.inputs))
    }

    fn scroll_container(&self, doc: &Document) -> Option<NodeId> {
        find_scroll_container(doc, Some(&self.containers), &self.turns)
    }

    fn capture_selectors(&self) -> CaptureSelectors {
        CaptureSelectors::new(
            self.profile
                .send_selectors
                .iter()
                .chain(GENERIC_SEND_SELECTORS.iter()),
            self.profile
                .input_selectors
                .iter()
                .chain(GENERIC_INPUT_SELECTORS.iter()),
        )
    }

    fn scroll_strategy(&self) -> ScrollStrategy {
        self.profile.strategy
    }
}

/// Fallback for unrecognised sites; always detects.
#[derive(Debug, Default)]
pub struct GenericAdapter;

impl PlatformAdapter for GenericAdapter {
    fn platform(&self) -> Platform {
        Platform::Generic
    }

    fn detect(&self, _url: &Url) -> bool {
        true
    }

    fn conversation_id(&self, url: &Url) -> String {
        fallback_conversation_id(url)
    }

    fn scrape_prompts(&self, doc: &Document) -> Vec<ScrapedPrompt> {
        scrape_user_turns(doc, &GENERIC_TURNS, Some(&GENERIC_INPUTS))
    }

    fn scroll_container(&self, doc: &Document) -> Option<NodeId> {
        find_scroll_container(doc, None, &GENERIC_TURNS)
    }

    fn capture_selectors(&self) -> CaptureSelectors {
        CaptureSelectors::new(GENERIC_SEND_SELECTORS.iter(), GENERIC_INPUT_SELECTORS.iter())
    }
}
