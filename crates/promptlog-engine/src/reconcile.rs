//! Merge of DOM-scraped turns with keylog captures.
//!
//! Pure and synchronous: no I/O, no retries. Every output list is reindexed
//! `0..n` and each entry's `source` records where it came from.

use promptlog_common::normalize::{DedupSet, dedup_key, is_short_key};
use promptlog_common::protocol::{ExtractionMode, ScrapedPrompt};
use std::collections::HashSet;

/// Session and persisted keylog buffers merged into one timestamp-ordered list.
///
/// Long content deduplicates on its normalized key. Short content only
/// collapses when the timestamp also matches, which is the same capture seen
/// through both buffers.
pub fn merge_keylog(session: &[ScrapedPrompt], persisted: &[ScrapedPrompt]) -> Vec<ScrapedPrompt> {
    let mut seen_long: HashSet<String> = HashSet::new();
    let mut seen_short: HashSet<(String, Option<u64>)> = HashSet::new();
    let mut merged: Vec<ScrapedPrompt> = Vec::new();

    for prompt in session.iter().chain(persisted) {
        let key = dedup_key(&prompt.content);
        let fresh = if is_short_key(&key) {
            seen_short.insert((key, prompt.timestamp))
        } else {
            seen_long.insert(key)
        };
        if fresh {
            merged.push(prompt.clone());
        }
    }

    // Stable: equal timestamps keep session-before-persisted order.
    merged.sort_by_key(|p| (p.timestamp.is_none(), p.timestamp));
    reindex(&mut merged);
    merged
}

/// Combine a DOM scrape with (already merged) keylog entries.
pub fn reconcile(
    dom: &[ScrapedPrompt],
    keylog: &[ScrapedPrompt],
    mode: ExtractionMode,
) -> Vec<ScrapedPrompt> {
    match mode {
        ExtractionMode::DomOnly => {
            let mut prompts = dom.to_vec();
            reindex(&mut prompts);
            prompts
        }
        ExtractionMode::KeylogOnly => merge_keylog(keylog, &[]),
        ExtractionMode::Auto if dom.is_empty() => merge_keylog(keylog, &[]),
        ExtractionMode::Auto => merge_onto_dom(dom, &merge_keylog(keylog, &[])),
    }
}

/// DOM order is the backbone. A keylog entry with matching content replaces
/// the DOM entry in place; leftover keylog entries go last.
fn merge_onto_dom(dom: &[ScrapedPrompt], keylog: &[ScrapedPrompt]) -> Vec<ScrapedPrompt> {
    let keylog_keys: Vec<String> = keylog.iter().map(|k| dedup_key(&k.content)).collect();
    let mut used = vec![false; keylog.len()];
    let mut seen = DedupSet::new();
    let mut merged: Vec<ScrapedPrompt> = Vec::with_capacity(dom.len() + keylog.len());

    for prompt in dom {
        if !seen.admit(&prompt.content) {
            continue;
        }
        let key = dedup_key(&prompt.content);
        let matched = keylog_keys
            .iter()
            .enumerate()
            .find(|(i, k)| !used[*i] && **k == key)
            .map(|(i, _)| i);

        match matched {
            Some(i) => {
                used[i] = true;
                merged.push(keylog[i].clone());
            }
            None => merged.push(prompt.clone()),
        }
    }

    for (i, entry) in keylog.iter().enumerate() {
        if used[i] || !seen.admit(&entry.content) {
            continue;
        }
        merged.push(entry.clone());
    }

    reindex(&mut merged);
    merged
}

fn reindex(prompts: &mut [ScrapedPrompt]) {
    for (index, prompt) in prompts.iter_mut().enumerate() {
        prompt.index = index;
    }
}
