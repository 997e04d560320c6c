#![allow(dead_code)]

use async_trait::async_trait;
use promptlog_engine::adapter::SCROLLABLE_ATTR;
use promptlog_engine::capture::{CaptureSelectors, HookEvent};
use promptlog_engine::dom::{Document, NodeId, RawNode};
use promptlog_engine::page::{Page, PageError, ScrollMetrics, ScrollTarget};
use std::sync::{Arc, Mutex};

pub const TURN_HEIGHT: f64 = 100.0;

/// ChatGPT-shaped markup: nested user-turn wrappers, assistant turns and a
/// composer holding a draft.
pub fn chatgpt_markup(turns: &[String]) -> RawNode {
    let mut list = RawNode::element("div")
        .class("flex flex-col overflow-y-auto")
        .attr(SCROLLABLE_ATTR, "");
    for (i, turn) in turns.iter().enumerate() {
        list = list
            .child(
                RawNode::element("article").child(
                    RawNode::element("div")
                        .attr("data-message-author-role", "user")
                        .child(
                            RawNode::element("div")
                                .class("whitespace-pre-wrap")
                                .with_text(turn),
                        ),
                ),
            )
            .child(
                RawNode::element("article").child(
                    RawNode::element("div")
                        .attr("data-message-author-role", "assistant")
                        .with_text(&format!("Answer number {}", i)),
                ),
            );
    }

    RawNode::element("html").child(
        RawNode::element("body").child(
            RawNode::element("main").child(list).child(
                RawNode::element("form").child(
                    RawNode::element("div")
                        .attr("id", "prompt-textarea")
                        .attr("contenteditable", "true")
                        .with_text("a draft that was never sent"),
                ),
            ),
        ),
    )
}

pub fn gemini_markup(turns: &[String]) -> RawNode {
    let mut scroller = RawNode::element("infinite-scroller");
    for turn in turns {
        scroller = scroller
            .child(
                RawNode::element("user-query")
                    .child(RawNode::element("div").class("query-text").with_text(turn)),
            )
            .child(RawNode::element("model-response").with_text("Sure, here you go."));
    }
    RawNode::element("html").child(RawNode::element("body").child(scroller))
}

/// Plain page for unknown sites: generic user-message markers, no overflow.
pub fn generic_markup(turns: &[String]) -> RawNode {
    RawNode::element("html").child(RawNode::element("body").children(turns.iter().map(|t| {
        RawNode::element("div")
            .class("chat-row")
            .child(RawNode::element("p").class("user-message").with_text(t))
    })))
}

pub fn turns(contents: &[&str]) -> Vec<String> {
    contents.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, Copy)]
pub enum Rendering {
    /// The newest `loaded` turns are in the DOM; scrolling to the top loads
    /// `batch` more older turns.
    LazyHistory { loaded: usize, batch: usize },
    /// Only `size` consecutive turns around the scroll offset are rendered.
    Window { size: usize },
}

/// In-memory chat page with virtualised history.
pub struct MockChatPage {
    pub url: String,
    pub title: String,
    pub turns: Vec<String>,
    pub markup: fn(&[String]) -> RawNode,
    pub rendering: Rendering,
    pub offset: f64,
    pub scrolls: Arc<Mutex<Vec<ScrollTarget>>>,
    pub attached: Arc<Mutex<Vec<CaptureSelectors>>>,
    pub events: Vec<HookEvent>,
    pub snapshots: usize,
}

impl MockChatPage {
    pub fn new(url: &str, turns: Vec<String>, markup: fn(&[String]) -> RawNode) -> Self {
        let loaded = turns.len();
        Self {
            url: url.to_string(),
            title: "Mock chat".to_string(),
            turns,
            markup,
            rendering: Rendering::LazyHistory { loaded, batch: 0 },
            offset: 1.0,
            scrolls: Arc::new(Mutex::new(Vec::new())),
            attached: Arc::new(Mutex::new(Vec::new())),
            events: Vec::new(),
            snapshots: 0,
        }
    }

    pub fn lazy(mut self, loaded: usize, batch: usize) -> Self {
        self.rendering = Rendering::LazyHistory { loaded, batch };
        self
    }

    pub fn windowed(mut self, size: usize) -> Self {
        self.rendering = Rendering::Window { size };
        self
    }

    pub fn rendered(&self) -> &[String] {
        match self.rendering {
            Rendering::LazyHistory { loaded, .. } => {
                let loaded = loaded.min(self.turns.len());
                &self.turns[self.turns.len() - loaded..]
            }
            Rendering::Window { size } => {
                let size = size.min(self.turns.len());
                let span = (self.turns.len() - size) as f64;
                let start = (self.offset * span).round() as usize;
                &self.turns[start..start + size]
            }
        }
    }

    pub fn scroll_log(&self) -> Vec<ScrollTarget> {
        self.scrolls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Page for MockChatPage {
    async fn url(&mut self) -> Result<String, PageError> {
        Ok(self.url.clone())
    }

    async fn title(&mut self) -> Result<String, PageError> {
        Ok(self.title.clone())
    }

    async fn snapshot(&mut self) -> Result<Document, PageError> {
        self.snapshots += 1;
        let root = (self.markup)(self.rendered());
        Ok(Document::from_root(&self.url, &self.title, root))
    }

    async fn scroll(&mut self, _container: NodeId, target: ScrollTarget) -> Result<(), PageError> {
        self.scrolls.lock().unwrap().push(target);
        self.offset = match target {
            ScrollTarget::Top => 0.0,
            ScrollTarget::Bottom => 1.0,
            ScrollTarget::Fraction(f) => f.clamp(0.0, 1.0),
        };
        if let (ScrollTarget::Top, Rendering::LazyHistory { loaded, batch }) =
            (target, self.rendering)
        {
            self.rendering = Rendering::LazyHistory {
                loaded: (loaded + batch).min(self.turns.len()),
                batch,
            };
        }
        Ok(())
    }

    async fn scroll_metrics(&mut self, _container: NodeId) -> Result<ScrollMetrics, PageError> {
        let rows = match self.rendering {
            Rendering::LazyHistory { loaded, .. } => loaded.min(self.turns.len()),
            Rendering::Window { .. } => self.turns.len(),
        };
        Ok(ScrollMetrics {
            scroll_top: 0.0,
            scroll_height: rows as f64 * TURN_HEIGHT,
            client_height: TURN_HEIGHT,
        })
    }

    async fn attach_hooks(&mut self, selectors: &CaptureSelectors) -> Result<(), PageError> {
        self.attached.lock().unwrap().push(selectors.clone());
        Ok(())
    }

    async fn drain_events(&mut self) -> Result<Vec<HookEvent>, PageError> {
        Ok(std::mem::take(&mut self.events))
    }
}

pub fn key_enter(text: &str, timestamp: u64) -> HookEvent {
    HookEvent::KeyDown {
        key: "Enter".into(),
        shift: false,
        ctrl: false,
        meta: false,
        input_text: text.into(),
        timestamp,
    }
}

pub fn input_cleared(timestamp: u64) -> HookEvent {
    HookEvent::InputChanged {
        input_text: String::new(),
        timestamp,
    }
}
