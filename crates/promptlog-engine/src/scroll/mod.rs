//! Forcing virtualised chat history into the live DOM before a scrape.

pub mod conductor;
pub mod sampling;

use promptlog_common::protocol::Platform;
use std::time::Duration;

pub use conductor::{Phase, ScrollConductor, ScrollReport, materialize};
pub use sampling::{SAMPLE_OFFSETS, sample_prompts};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollStrategy {
    /// Bottom discovery, top discovery, settle.
    Phased,
    /// Scrape at fixed offsets and merge.
    SpatialSampling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollConfig {
    pub top_attempts: u32,
    pub bottom_attempts: u32,
    pub wait_per_scroll: Duration,
    /// Consecutive unchanged heights required to end top discovery.
    pub stability_checks: u32,
    /// End each wait early once the container height changes.
    pub parallel_wait: bool,
}

impl ScrollConfig {
    /// For sites that virtualise aggressively.
    pub const THOROUGH: ScrollConfig = ScrollConfig {
        top_attempts: 30,
        bottom_attempts: 10,
        wait_per_scroll: Duration::from_millis(800),
        stability_checks: 3,
        parallel_wait: false,
    };

    pub const FAST: ScrollConfig = ScrollConfig {
        top_attempts: 15,
        bottom_attempts: 5,
        wait_per_scroll: Duration::from_millis(400),
        stability_checks: 2,
        parallel_wait: true,
    };

    pub fn for_platform(platform: Platform) -> ScrollConfig {
        PLATFORM_SCROLL_TABLE
            .iter()
            .find(|(p, _)| *p == platform)
            .map(|(_, config)| *config)
            .unwrap_or(ScrollConfig::FAST)
    }
}

const PLATFORM_SCROLL_TABLE: &[(Platform, ScrollConfig)] = &[
    (Platform::ChatGpt, ScrollConfig::THOROUGH),
    (Platform::Claude, ScrollConfig::THOROUGH),
    (Platform::Gemini, ScrollConfig::THOROUGH),
    (Platform::Copilot, ScrollConfig::THOROUGH),
    (Platform::Perplexity, ScrollConfig::FAST),
    (Platform::DeepSeek, ScrollConfig::FAST),
    (Platform::Grok, ScrollConfig::FAST),
];
