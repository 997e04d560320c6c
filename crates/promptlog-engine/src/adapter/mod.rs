//! Platform adapters: site detection and scraping of user-authored turns.

pub mod platforms;
pub mod registry;

use crate::capture::CaptureSelectors;
use crate::dom::{Document, NodeId, SelectorList};
use crate::scroll::{ScrollConfig, ScrollStrategy};
use async_trait::async_trait;
use promptlog_common::normalize::{DedupSet, is_effectively_empty, normalize_whitespace};
use promptlog_common::protocol::{Platform, ScrapedPrompt};
use std::collections::HashSet;
use url::Url;

pub use platforms::{GenericAdapter, SiteAdapter, SiteProfile};
pub use registry::AdapterRegistry;

pub use promptlog_probe::SCROLLABLE_ATTR;

/// Button/label texts that are UI chrome rather than prompts.
const UI_NOISE: &[&str] = &[
    "copy",
    "copy code",
    "copied",
    "copied!",
    "regenerate",
    "regenerate response",
    "retry",
    "share",
    "edit",
    "edit message",
    "read aloud",
    "like",
    "dislike",
    "good response",
    "bad response",
    "more",
    "show more",
    "show less",
    "you said:",
    "you",
];

#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    /// Does `url` belong to this platform.
    fn detect(&self, url: &Url) -> bool;

    /// Stable id for the conversation at `url`.
    fn conversation_id(&self, url: &Url) -> String;

    /// Single-snapshot extraction. Zero matches is a valid outcome.
    fn scrape_prompts(&self, doc: &Document) -> Vec<ScrapedPrompt>;

    async fn scrape(&self, doc: &Document) -> Vec<ScrapedPrompt> {
        self.scrape_prompts(doc)
    }

    fn scroll_container(&self, doc: &Document) -> Option<NodeId>;

    fn capture_selectors(&self) -> CaptureSelectors;

    fn scroll_config(&self) -> ScrollConfig {
        ScrollConfig::for_platform(self.platform())
    }

    fn scroll_strategy(&self) -> ScrollStrategy {
        ScrollStrategy::Phased
    }
}

pub fn is_ui_noise(text: &str) -> bool {
    let lowered = text.trim().to_lowercase();
    UI_NOISE.contains(&lowered.as_str())
}

/// Shared scrape: deep query, keep leaf candidates, drop composer and noise,
/// normalise and deduplicate.
pub fn scrape_user_turns(
    doc: &Document,
    turns: &SelectorList,
    composer: Option<&SelectorList>,
) -> Vec<ScrapedPrompt> {
    let candidates = doc.query_all_deep(turns);
    if candidates.is_empty() {
        return Vec::new();
    }

    let composer_nodes = composer.map(|c| doc.query_all_deep(c)).unwrap_or_default();
    let mut seen = DedupSet::new();
    let mut prompts = Vec::new();

    for node in leaf_candidates(doc, &candidates) {
        if doc.touches_editable(node)
            || composer_nodes
                .iter()
                .any(|c| *c == node || doc.contains(*c, node) || doc.contains(node, *c))
        {
            continue;
        }

        let text = normalize_whitespace(&doc.text_content(node));
        if is_effectively_empty(&text) || is_ui_noise(&text) {
            continue;
        }
        if !seen.admit(&text) {
            continue;
        }
        prompts.push(ScrapedPrompt::from_dom(text, prompts.len()));
    }

    prompts
}

/// Drops every candidate that contains another candidate.
pub fn leaf_candidates(doc: &Document, candidates: &[NodeId]) -> Vec<NodeId> {
    let set: HashSet<NodeId> = candidates.iter().copied().collect();
    let mut has_candidate_descendant = HashSet::new();

    for &node in candidates {
        let mut current = doc.composed_parent(node);
        while let Some(ancestor) = current {
            if set.contains(&ancestor) && !has_candidate_descendant.insert(ancestor) {
                // Everything above was already marked via this ancestor.
                break;
            }
            current = doc.composed_parent(ancestor);
        }
    }

    candidates
        .iter()
        .copied()
        .filter(|node| !has_candidate_descendant.contains(node))
        .collect()
}

/// Scroll container lookup: explicit selectors first, then the probe's
/// overflow marker nearest to the first user turn, then any marked element.
pub fn find_scroll_container(
    doc: &Document,
    containers: Option<&SelectorList>,
    turns: &SelectorList,
) -> Option<NodeId> {
    if let Some(found) = containers.and_then(|c| doc.query_first_deep(c)) {
        return Some(found);
    }

    let is_scrollable = |id: NodeId| doc.attr(id, SCROLLABLE_ATTR).is_some();

    if let Some(first_turn) = doc.query_first_deep(turns) {
        let mut current = doc.composed_parent(first_turn);
        while let Some(ancestor) = current {
            if is_scrollable(ancestor) {
                return Some(ancestor);
            }
            current = doc.composed_parent(ancestor);
        }
    }

    doc.elements().find(|id| is_scrollable(*id))
}
