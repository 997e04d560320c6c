//! Realtime capture of prompts at the moment of submission.

pub mod guards;
pub mod hooks;

use promptlog_common::protocol::CaptureMethod;
use serde::{Deserialize, Serialize};

pub use guards::{Rejection, check_capture};
pub use hooks::{CaptureHooks, Debouncer};

/// Selectors handed to the probe when hooks are attached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSelectors {
    pub send_buttons: Vec<String>,
    pub inputs: Vec<String>,
}

impl CaptureSelectors {
    pub fn new<S, I>(send_buttons: impl IntoIterator<Item = S>, inputs: impl IntoIterator<Item = I>) -> Self
    where
        S: AsRef<str>,
        I: AsRef<str>,
    {
        Self {
            send_buttons: send_buttons.into_iter().map(|s| s.as_ref().to_string()).collect(),
            inputs: inputs.into_iter().map(|s| s.as_ref().to_string()).collect(),
        }
    }
}

/// Raw events reported by the in-page listeners. Timestamps are epoch ms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum HookEvent {
    /// Pointer pressed on a send button; text read before any click handler runs.
    SendMouseDown { input_text: String, timestamp: u64 },
    SendClick { timestamp: u64 },
    KeyDown {
        key: String,
        #[serde(default)]
        shift: bool,
        #[serde(default)]
        ctrl: bool,
        #[serde(default)]
        meta: bool,
        input_text: String,
        timestamp: u64,
    },
    /// The composer (or its replacement node) changed.
    InputChanged { input_text: String, timestamp: u64 },
    /// Surrounding structure mutated; hooks may need re-attaching.
    StructureChanged { timestamp: u64 },
    /// SPA route change.
    Navigated { url: String, timestamp: u64 },
    /// Browser `online`/`offline` event.
    ConnectivityChanged { online: bool, timestamp: u64 },
}

impl HookEvent {
    pub fn timestamp(&self) -> u64 {
        match self {
            HookEvent::SendMouseDown { timestamp, .. }
            | HookEvent::SendClick { timestamp }
            | HookEvent::KeyDown { timestamp, .. }
            | HookEvent::InputChanged { timestamp, .. }
            | HookEvent::StructureChanged { timestamp }
            | HookEvent::Navigated { timestamp, .. }
            | HookEvent::ConnectivityChanged { timestamp, .. } => *timestamp,
        }
    }
}

/// A confirmed submission, not yet guarded or stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub content: String,
    pub method: CaptureMethod,
    pub timestamp: u64,
}
