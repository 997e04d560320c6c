mod common;

use async_trait::async_trait;
use common::{MockChatPage, chatgpt_markup, gemini_markup, turns};
use promptlog_engine::adapter::{PlatformAdapter, SiteAdapter};
use promptlog_engine::dom::{Document, NodeId, RawNode};
use promptlog_engine::page::{Page, PageError, ScrollMetrics, ScrollTarget};
use promptlog_engine::protocol::Platform;
use promptlog_engine::scroll::{ScrollConfig, materialize, sample_prompts};
use std::time::Duration;

/// Container whose content grows on every scroll until `grow_for` scrolls
/// have happened.
struct GrowingContainer {
    scrolls: u32,
    grow_for: u32,
    metric_reads: u32,
}

impl GrowingContainer {
    fn new(grow_for: u32) -> Self {
        Self {
            scrolls: 0,
            grow_for,
            metric_reads: 0,
        }
    }
}

#[async_trait]
impl Page for GrowingContainer {
    async fn url(&mut self) -> Result<String, PageError> {
        Ok("https://chatgpt.com/c/growing".into())
    }

    async fn title(&mut self) -> Result<String, PageError> {
        Ok(String::new())
    }

    async fn snapshot(&mut self) -> Result<Document, PageError> {
        Ok(Document::default())
    }

    async fn scroll(&mut self, _container: NodeId, _target: ScrollTarget) -> Result<(), PageError> {
        self.scrolls += 1;
        Ok(())
    }

    async fn scroll_metrics(&mut self, _container: NodeId) -> Result<ScrollMetrics, PageError> {
        self.metric_reads += 1;
        Ok(ScrollMetrics {
            scroll_top: 0.0,
            scroll_height: 1000.0 + 500.0 * self.scrolls.min(self.grow_for) as f64,
            client_height: 800.0,
        })
    }
}

fn quick(bottom: u32, top: u32, stability: u32) -> ScrollConfig {
    ScrollConfig {
        top_attempts: top,
        bottom_attempts: bottom,
        wait_per_scroll: Duration::from_millis(10),
        stability_checks: stability,
        parallel_wait: false,
    }
}

#[tokio::test(start_paused = true)]
async fn bottom_discovery_stops_one_scroll_after_growth_ends() {
    let mut page = GrowingContainer::new(3);
    let report = materialize(&mut page, 1, quick(10, 5, 2)).await.unwrap();

    assert_eq!(report.bottom_iterations, 4);
    assert!(report.bottom_iterations < 10);
}

#[tokio::test(start_paused = true)]
async fn top_discovery_converges_after_consecutive_stable_readings() {
    let mut page = GrowingContainer::new(0);
    let report = materialize(&mut page, 1, quick(5, 10, 3)).await.unwrap();

    assert!(report.converged);
    // first top reading equals the bottom plateau, so three in a row suffice
    assert_eq!(report.top_iterations, 3);
    // bottom: 2, top: 3, settle: 1
    assert_eq!(page.scrolls, 6);
}

#[tokio::test(start_paused = true)]
async fn history_loaded_from_top_is_fully_materialised() {
    let all = turns(&[
        "Turn one asks something",
        "Turn two follows up",
        "Turn three digs deeper",
        "Turn four changes topic",
        "Turn five wraps up",
        "Turn six says goodbye",
    ]);
    let mut page = MockChatPage::new("https://chatgpt.com/c/lazy", all, chatgpt_markup).lazy(2, 2);

    let report = materialize(&mut page, 1, quick(5, 10, 2)).await.unwrap();
    assert!(report.converged);
    assert_eq!(report.max_height, 600.0);
    assert_eq!(page.scroll_log().last(), Some(&ScrollTarget::Bottom));

    let adapter = SiteAdapter::for_platform(Platform::ChatGpt).unwrap();
    let doc = page.snapshot().await.unwrap();
    assert_eq!(adapter.scrape_prompts(&doc).len(), 6);
}

#[tokio::test(start_paused = true)]
async fn parallel_wait_returns_as_soon_as_height_changes() {
    let config = ScrollConfig {
        wait_per_scroll: Duration::from_millis(400),
        parallel_wait: true,
        ..quick(3, 0, 1)
    };

    let mut page = GrowingContainer::new(10);
    let started = tokio::time::Instant::now();
    materialize(&mut page, 1, config).await.unwrap();
    let elapsed = started.elapsed();

    // three growing bottom scrolls plus one settle, each ending at the first poll
    assert_eq!(page.scrolls, 4);
    assert_eq!(page.metric_reads, 5);
    assert!(elapsed < Duration::from_millis(400), "waited {:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn serial_wait_always_waits_full_interval() {
    let config = ScrollConfig {
        wait_per_scroll: Duration::from_millis(400),
        ..quick(2, 0, 1)
    };

    let mut page = GrowingContainer::new(10);
    let started = tokio::time::Instant::now();
    materialize(&mut page, 1, config).await.unwrap();

    assert_eq!(page.scrolls, 3);
    assert!(started.elapsed() >= Duration::from_millis(1200));
}

#[tokio::test(start_paused = true)]
async fn spatial_sampling_collects_every_window() {
    let all = turns(&[
        "Gemini first question",
        "Gemini second question",
        "Gemini third question",
        "Gemini fourth question",
        "Gemini fifth question",
    ]);
    let mut page = MockChatPage::new("https://gemini.google.com/app/abc123", all.clone(), gemini_markup)
        .windowed(2);
    let adapter = SiteAdapter::for_platform(Platform::Gemini).unwrap();

    let prompts = sample_prompts(&mut page, &adapter, 1, quick(1, 1, 1)).await.unwrap();

    let got: Vec<&str> = prompts.iter().map(|p| p.content.as_str()).collect();
    let expected: Vec<&str> = all.iter().map(String::as_str).collect();
    assert_eq!(got, expected);
    assert_eq!(prompts.iter().map(|p| p.index).collect::<Vec<_>>(), [0, 1, 2, 3, 4]);
    assert_eq!(page.scroll_log().len(), 5);
}

/// Gemini-like page whose sidebar gains a link on every snapshot, shifting
/// the ids of everything after it. Scrolls must use the latest ids.
struct ShiftingPage {
    turns: Vec<String>,
    snapshots: usize,
    offset: f64,
    live_container: Option<NodeId>,
    container_ids: Vec<NodeId>,
    scrolled_ids: Vec<NodeId>,
}

impl ShiftingPage {
    fn new(turns: Vec<String>) -> Self {
        Self {
            turns,
            snapshots: 0,
            offset: 1.0,
            live_container: None,
            container_ids: Vec::new(),
            scrolled_ids: Vec::new(),
        }
    }

    fn visible(&self) -> &[String] {
        let span = (self.turns.len() - 2) as f64;
        let start = (self.offset * span).round() as usize;
        &self.turns[start..start + 2]
    }
}

#[async_trait]
impl Page for ShiftingPage {
    async fn url(&mut self) -> Result<String, PageError> {
        Ok("https://gemini.google.com/app/shifting".into())
    }

    async fn title(&mut self) -> Result<String, PageError> {
        Ok(String::new())
    }

    async fn snapshot(&mut self) -> Result<Document, PageError> {
        self.snapshots += 1;
        let sidebar = RawNode::element("nav").children(
            (0..self.snapshots).map(|i| RawNode::element("a").with_text(&format!("Recent chat {}", i))),
        );
        let mut scroller = RawNode::element("infinite-scroller");
        for turn in self.visible() {
            scroller = scroller.child(
                RawNode::element("user-query")
                    .child(RawNode::element("div").class("query-text").with_text(turn)),
            );
        }
        let doc = Document::from_root(
            "https://gemini.google.com/app/shifting",
            "",
            RawNode::element("html").child(RawNode::element("body").child(sidebar).child(scroller)),
        );
        let container = doc
            .elements()
            .find(|id| doc.tag(*id) == Some("infinite-scroller"));
        self.live_container = container;
        self.container_ids.extend(container);
        Ok(doc)
    }

    async fn scroll(&mut self, container: NodeId, target: ScrollTarget) -> Result<(), PageError> {
        if self.live_container != Some(container) {
            return Err(PageError::UnknownNode(container));
        }
        self.scrolled_ids.push(container);
        if let ScrollTarget::Fraction(f) = target {
            self.offset = f;
        }
        Ok(())
    }

    async fn scroll_metrics(&mut self, _container: NodeId) -> Result<ScrollMetrics, PageError> {
        Ok(ScrollMetrics::default())
    }
}

#[tokio::test(start_paused = true)]
async fn spatial_sampling_follows_renumbered_container() {
    let all = turns(&[
        "Shifting first question",
        "Shifting second question",
        "Shifting third question",
        "Shifting fourth question",
        "Shifting fifth question",
    ]);
    let mut page = ShiftingPage::new(all.clone());
    let adapter = SiteAdapter::for_platform(Platform::Gemini).unwrap();

    let doc = page.snapshot().await.unwrap();
    let container = adapter.scroll_container(&doc).unwrap();
    let prompts = sample_prompts(&mut page, &adapter, container, quick(1, 1, 1))
        .await
        .unwrap();

    let got: Vec<&str> = prompts.iter().map(|p| p.content.as_str()).collect();
    let expected: Vec<&str> = all.iter().map(String::as_str).collect();
    assert_eq!(got, expected);

    // each scroll targets the container as numbered by the snapshot before it
    assert_eq!(page.scrolled_ids, page.container_ids[..5]);
    assert_ne!(page.container_ids[0], page.container_ids[4]);
}

#[test]
fn presets_follow_platform_table() {
    let thorough = ScrollConfig::for_platform(Platform::Claude);
    let fast = ScrollConfig::for_platform(Platform::Generic);
    assert_eq!(thorough, ScrollConfig::THOROUGH);
    assert_eq!(fast, ScrollConfig::FAST);
    assert!(thorough.stability_checks > fast.stability_checks);
}
