//! Headless Chromium driver for the extraction engine.

pub mod cdp;
pub mod inject;
pub mod page;

pub use page::HeadlessPage;
