/// In-page probe injected by browser drivers.
/// Installs `window.Promptlog` with snapshot, scroll and capture-hook entry points.
pub const PROBE_JS: &str = include_str!("probe.js");

/// Attribute the probe sets on elements whose content overflows vertically.
pub const SCROLLABLE_ATTR: &str = "data-promptlog-scrollable";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::const_is_empty)]
    fn probe_is_embedded() {
        assert!(!PROBE_JS.is_empty());
        assert!(PROBE_JS.contains("window.Promptlog"));
    }

    #[test]
    fn probe_marks_scrollables_with_shared_attribute() {
        assert!(PROBE_JS.contains(SCROLLABLE_ATTR));
    }

    #[test]
    fn reports_every_hook_event_type() {
        for kind in [
            "send_mouse_down",
            "send_click",
            "key_down",
            "input_changed",
            "structure_changed",
            "navigated",
            "connectivity_changed",
        ] {
            assert!(PROBE_JS.contains(&format!("\"{}\"", kind)), "missing {}", kind);
        }
    }

    #[test]
    fn probe_exposes_driver_entry_points() {
        for name in ["snapshot", "scroll", "metrics", "attachHooks", "drainEvents"] {
            assert!(PROBE_JS.contains(&format!("{}:", name)), "missing {}", name);
        }
    }
}
