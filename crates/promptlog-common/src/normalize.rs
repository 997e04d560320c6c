//! Content normalization shared by the scrapers, the capture guards and the
//! reconciliation engine.

use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Normalized content is truncated to this many characters before comparison.
pub const DEDUP_KEY_CHARS: usize = 200;

/// Normalized content at or below this length may repeat (short acknowledgements).
pub const SHORT_CONTENT_CHARS: usize = 10;

/// Collapse runs of spaces/tabs inside each line, trim lines and squeeze
/// blank-line runs down to a single empty line.
pub fn normalize_whitespace(text: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut blank_run = false;

    for raw in text.replace("\r\n", "\n").replace('\u{a0}', " ").split('\n') {
        let line = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            if !lines.is_empty() && !blank_run {
                lines.push(String::new());
            }
            blank_run = true;
        } else {
            lines.push(line);
            blank_run = false;
        }
    }

    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

/// Case-folded, whitespace-collapsed, truncated comparison key.
pub fn dedup_key(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .chars()
        .take(DEDUP_KEY_CHARS)
        .collect()
}

/// Short keys are exempt from duplicate collapsing.
pub fn is_short_key(key: &str) -> bool {
    key.chars().count() <= SHORT_CONTENT_CHARS
}

/// True when the text has nothing a reader would recognise as content.
pub fn is_effectively_empty(text: &str) -> bool {
    !text.chars().any(|c| c.is_alphanumeric())
}

/// Seen-content set applying the short-content exemption.
#[derive(Debug, Default, Clone)]
pub struct DedupSet {
    seen: HashSet<String>,
}

impl DedupSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `text` should be kept.
    pub fn admit(&mut self, text: &str) -> bool {
        let key = dedup_key(text);
        if is_short_key(&key) {
            return true;
        }
        self.seen.insert(key)
    }

    /// Like `admit`, but short content is deduplicated as well.
    pub fn admit_strict(&mut self, text: &str) -> bool {
        self.seen.insert(dedup_key(text))
    }

    pub fn contains(&self, text: &str) -> bool {
        self.seen.contains(&dedup_key(text))
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Deterministic short hash used for fallback conversation ids.
pub fn stable_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(&digest[..8])
}
