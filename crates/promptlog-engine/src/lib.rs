pub mod adapter;
pub mod capture;
pub mod config;
pub mod dom;
pub mod extractor;
pub mod formatter;
pub mod page;
pub mod reconcile;
pub mod scroll;
pub mod store;

pub use extractor::ExtractionSession;
pub use promptlog_common::error;
pub use promptlog_common::protocol;
