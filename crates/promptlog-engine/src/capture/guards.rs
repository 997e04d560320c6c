use promptlog_common::normalize::{dedup_key, is_effectively_empty, is_short_key};
use promptlog_common::pii::contains_pii;
use promptlog_common::protocol::StoredPrompt;

/// Short captures repeating within this window are treated as one submission
/// seen twice (button and keyboard path).
const DOUBLE_SUBMIT_MS: u64 = 1_500;

/// Whole-text echoes of internal UI choices.
const SYSTEM_CHOICE_EXACT: &[&str] = &[
    "response 1",
    "response 2",
    "skip",
    "try again",
    "continue generating",
    "stop generating",
];

/// Phrases that only appear in UI selection echoes.
const SYSTEM_CHOICE_PHRASES: &[&str] = &[
    "which response do you prefer",
    "you're giving feedback on a new version",
    "i prefer this response",
    "was this response better or worse",
    "choose a response to continue",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Empty,
    Pii,
    Duplicate,
    SystemChoice,
}

/// Checks a capture before it enters the session buffer.
pub fn check_capture(
    content: &str,
    timestamp: u64,
    existing: &[StoredPrompt],
) -> Result<(), Rejection> {
    if is_effectively_empty(content) {
        return Err(Rejection::Empty);
    }
    if contains_pii(content) {
        return Err(Rejection::Pii);
    }

    let key = dedup_key(content);
    if is_system_choice(&key) {
        return Err(Rejection::SystemChoice);
    }

    let short = is_short_key(&key);
    let duplicate = existing.iter().any(|stored| {
        dedup_key(&stored.prompt.content) == key
            && (!short
                || stored
                    .prompt
                    .timestamp
                    .is_some_and(|t| t.abs_diff(timestamp) <= DOUBLE_SUBMIT_MS))
    });
    if duplicate {
        return Err(Rejection::Duplicate);
    }

    Ok(())
}

fn is_system_choice(key: &str) -> bool {
    SYSTEM_CHOICE_EXACT.contains(&key) || SYSTEM_CHOICE_PHRASES.iter().any(|p| key.contains(p))
}
