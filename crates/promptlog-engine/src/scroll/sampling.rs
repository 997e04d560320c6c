use super::ScrollConfig;
use crate::adapter::PlatformAdapter;
use crate::dom::NodeId;
use crate::page::{Page, PageError, ScrollTarget};
use promptlog_common::normalize::DedupSet;
use promptlog_common::protocol::ScrapedPrompt;
use tracing::debug;

/// Fractions of the scroll range sampled, top to bottom.
pub const SAMPLE_OFFSETS: [f64; 5] = [0.0, 0.25, 0.5, 0.75, 1.0];

/// Spatial alternative to the phase protocol: scrape at fixed offsets and
/// merge with one dedup set shared across offsets.
///
/// `container` must come from the page's latest snapshot. Every snapshot
/// renumbers nodes, so the container is looked up again after each one.
pub async fn sample_prompts<P: Page + ?Sized>(
    page: &mut P,
    adapter: &dyn PlatformAdapter,
    mut container: NodeId,
    config: ScrollConfig,
) -> Result<Vec<ScrapedPrompt>, PageError> {
    let mut seen = DedupSet::new();
    let mut merged: Vec<ScrapedPrompt> = Vec::new();

    for offset in SAMPLE_OFFSETS {
        page.scroll(container, ScrollTarget::Fraction(offset)).await?;
        tokio::time::sleep(config.wait_per_scroll).await;
        let doc = page.snapshot().await?;
        match adapter.scroll_container(&doc) {
            Some(id) => container = id,
            None => debug!("Scroll container vanished after sampling at {:.0}%", offset * 100.0),
        }

        let before = merged.len();
        for prompt in adapter.scrape_prompts(&doc) {
            if seen.admit_strict(&prompt.content) {
                merged.push(prompt);
            }
        }
        debug!(
            "Sample at {:.0}%: {} new prompts",
            offset * 100.0,
            merged.len() - before
        );
    }

    for (index, prompt) in merged.iter_mut().enumerate() {
        prompt.index = index;
    }
    Ok(merged)
}
