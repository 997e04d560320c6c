use super::{Capture, HookEvent};
use crate::config::CaptureSettings;
use promptlog_common::protocol::CaptureMethod;
use tracing::{debug, trace};

/// How long a mousedown stays armed waiting for its click.
const CLICK_ARM_WINDOW_MS: u64 = 3_000;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Pending {
    text: String,
    timestamp: u64,
}

/// Trailing-edge debounce over event timestamps.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window_ms: u64,
    deadline: Option<u64>,
}

impl Debouncer {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            deadline: None,
        }
    }

    /// Restart the window at `now`.
    pub fn trigger(&mut self, now: u64) {
        self.deadline = Some(now + self.window_ms);
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// True once per trigger burst, after the window has passed quietly.
    pub fn ready(&mut self, now: u64) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Turns raw listener events into confirmed submissions.
///
/// Button submissions record text on mousedown and commit on the following
/// click. Keyboard submissions are only candidates until the composer is
/// seen emptied (or much shorter) within the confirmation window.
#[derive(Debug, Clone)]
pub struct CaptureHooks {
    confirm_window_ms: u64,
    armed_click: Option<Pending>,
    keyboard_candidate: Option<Pending>,
    reattach: Debouncer,
}

impl CaptureHooks {
    pub fn new(settings: &CaptureSettings) -> Self {
        Self {
            confirm_window_ms: settings.confirm_window_ms,
            armed_click: None,
            keyboard_candidate: None,
            reattach: Debouncer::new(settings.reattach_debounce_ms),
        }
    }

    pub fn has_keyboard_candidate(&self) -> bool {
        self.keyboard_candidate.is_some()
    }

    /// Forget partial state, e.g. after navigating to another conversation.
    pub fn reset(&mut self) {
        self.armed_click = None;
        self.keyboard_candidate = None;
    }

    pub fn handle(&mut self, event: &HookEvent) -> Option<Capture> {
        self.expire_candidate(event.timestamp());

        match event {
            HookEvent::SendMouseDown {
                input_text,
                timestamp,
            } => {
                let text = input_text.trim();
                self.armed_click = (!text.is_empty()).then(|| Pending {
                    text: text.to_string(),
                    timestamp: *timestamp,
                });
                None
            }
            HookEvent::SendClick { timestamp } => {
                let armed = self.armed_click.take()?;
                if timestamp.saturating_sub(armed.timestamp) > CLICK_ARM_WINDOW_MS {
                    trace!("Discarding stale mousedown text");
                    return None;
                }
                // The keyboard path would otherwise commit the same text again.
                if self
                    .keyboard_candidate
                    .as_ref()
                    .is_some_and(|c| c.text == armed.text)
                {
                    self.keyboard_candidate = None;
                }
                debug!("Send button submission captured");
                Some(Capture {
                    content: armed.text,
                    method: CaptureMethod::ButtonClick,
                    timestamp: armed.timestamp,
                })
            }
            HookEvent::KeyDown {
                key,
                shift,
                ctrl,
                meta,
                input_text,
                timestamp,
            } => {
                if is_submit_key(key, *shift, *ctrl, *meta) {
                    let text = input_text.trim();
                    if !text.is_empty() {
                        self.keyboard_candidate = Some(Pending {
                            text: text.to_string(),
                            timestamp: *timestamp,
                        });
                    }
                }
                None
            }
            HookEvent::InputChanged { input_text, .. } => {
                let candidate = self.keyboard_candidate.as_ref()?;
                if !is_cleared(&candidate.text, input_text) {
                    return None;
                }
                let candidate = self.keyboard_candidate.take()?;
                debug!("Keyboard submission confirmed");
                Some(Capture {
                    content: candidate.text,
                    method: CaptureMethod::Keyboard,
                    timestamp: candidate.timestamp,
                })
            }
            HookEvent::StructureChanged { timestamp } => {
                self.reattach.trigger(*timestamp);
                None
            }
            HookEvent::Navigated { .. } | HookEvent::ConnectivityChanged { .. } => None,
        }
    }

    /// True when hooks should be re-attached (debounced structure changes).
    pub fn poll_reattach(&mut self, now: u64) -> bool {
        self.reattach.ready(now)
    }

    fn expire_candidate(&mut self, now: u64) {
        if let Some(candidate) = &self.keyboard_candidate
            && now.saturating_sub(candidate.timestamp) > self.confirm_window_ms
        {
            trace!("Keyboard candidate expired without confirmation");
            self.keyboard_candidate = None;
        }
    }
}

/// Enter without Shift, or Ctrl/Cmd+Enter.
pub fn is_submit_key(key: &str, shift: bool, ctrl: bool, meta: bool) -> bool {
    key == "Enter" && (!shift || ctrl || meta)
}

/// The composer was emptied or shrank to at most half of the submitted text.
fn is_cleared(submitted: &str, current: &str) -> bool {
    let current = current.trim();
    current.is_empty() || current.chars().count() * 2 <= submitted.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debouncer_fires_once_after_quiet_window() {
        let mut d = Debouncer::new(500);
        d.trigger(1_000);
        d.trigger(1_300);
        assert!(!d.ready(1_700));
        assert!(d.ready(1_800));
        assert!(!d.ready(2_500));
    }

    #[test]
    fn submit_key_rules() {
        assert!(is_submit_key("Enter", false, false, false));
        assert!(!is_submit_key("Enter", true, false, false));
        assert!(is_submit_key("Enter", true, true, false));
        assert!(is_submit_key("Enter", false, false, true));
        assert!(!is_submit_key("a", false, false, false));
    }

    #[test]
    fn shrink_threshold() {
        assert!(is_cleared("hello world", ""));
        assert!(is_cleared("hello world", "hell"));
        assert!(!is_cleared("hello world", "hello worl"));
    }
}
