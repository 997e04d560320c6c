use super::ScrollConfig;
use crate::dom::NodeId;
use crate::page::{Page, PageError, ScrollTarget};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Polling interval inside a wait window when `parallel_wait` is set.
const PARALLEL_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    BottomDiscovery,
    TopDiscovery,
    Settle,
    Done,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScrollReport {
    pub bottom_iterations: u32,
    pub top_iterations: u32,
    /// Top discovery saw the required run of stable heights.
    pub converged: bool,
    pub max_height: f64,
    pub final_height: f64,
}

/// Scroll protocol as an explicit state machine.
///
/// Drive it by scrolling to [`ScrollConductor::next_target`], waiting, and
/// feeding the measured content height to [`ScrollConductor::observe`].
#[derive(Debug, Clone)]
pub struct ScrollConductor {
    config: ScrollConfig,
    phase: Phase,
    attempts: u32,
    last_height: Option<f64>,
    stable_readings: u32,
    report: ScrollReport,
}

impl ScrollConductor {
    pub fn new(config: ScrollConfig) -> Self {
        let mut conductor = Self {
            config,
            phase: Phase::BottomDiscovery,
            attempts: 0,
            last_height: None,
            stable_readings: 0,
            report: ScrollReport::default(),
        };
        if config.bottom_attempts == 0 {
            conductor.enter_top_discovery();
        }
        conductor
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn report(&self) -> ScrollReport {
        self.report
    }

    pub fn next_target(&self) -> Option<ScrollTarget> {
        match self.phase {
            Phase::BottomDiscovery | Phase::Settle => Some(ScrollTarget::Bottom),
            Phase::TopDiscovery => Some(ScrollTarget::Top),
            Phase::Done => None,
        }
    }

    pub fn observe(&mut self, height: f64) {
        self.report.max_height = self.report.max_height.max(height);

        match self.phase {
            Phase::BottomDiscovery => {
                self.attempts += 1;
                self.report.bottom_iterations += 1;
                let unchanged = self.last_height == Some(height);
                self.last_height = Some(height);
                if unchanged || self.attempts >= self.config.bottom_attempts {
                    self.enter_top_discovery();
                }
            }
            Phase::TopDiscovery => {
                self.attempts += 1;
                self.report.top_iterations += 1;
                if self.last_height == Some(height) {
                    self.stable_readings += 1;
                } else {
                    self.stable_readings = 0;
                }
                self.last_height = Some(height);

                if self.stable_readings >= self.config.stability_checks {
                    self.report.converged = true;
                    self.phase = Phase::Settle;
                } else if self.attempts >= self.config.top_attempts {
                    self.phase = Phase::Settle;
                }
            }
            Phase::Settle => {
                self.report.final_height = height;
                self.phase = Phase::Done;
            }
            Phase::Done => {}
        }
    }

    fn enter_top_discovery(&mut self) {
        self.attempts = 0;
        self.stable_readings = 0;
        self.phase = if self.config.top_attempts == 0 {
            Phase::Settle
        } else {
            Phase::TopDiscovery
        };
    }
}

/// Runs the full protocol against `container`.
pub async fn materialize<P: Page + ?Sized>(
    page: &mut P,
    container: NodeId,
    config: ScrollConfig,
) -> Result<ScrollReport, PageError> {
    let mut conductor = ScrollConductor::new(config);
    let mut height = page.scroll_metrics(container).await?.scroll_height;

    while let Some(target) = conductor.next_target() {
        let phase = conductor.phase();
        page.scroll(container, target).await?;
        height = wait_after_scroll(page, container, &config, height).await?;
        conductor.observe(height);
        debug!("Scroll {:?}: height {}", phase, height);
    }

    let report = conductor.report();
    debug!(
        "Scroll finished: {} bottom, {} top iterations, converged={}",
        report.bottom_iterations, report.top_iterations, report.converged
    );
    Ok(report)
}

async fn wait_after_scroll<P: Page + ?Sized>(
    page: &mut P,
    container: NodeId,
    config: &ScrollConfig,
    previous_height: f64,
) -> Result<f64, PageError> {
    if !config.parallel_wait {
        tokio::time::sleep(config.wait_per_scroll).await;
        return Ok(page.scroll_metrics(container).await?.scroll_height);
    }

    let deadline = Instant::now() + config.wait_per_scroll;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        tokio::time::sleep(remaining.min(PARALLEL_POLL)).await;
        let height = page.scroll_metrics(container).await?.scroll_height;
        if height != previous_height || Instant::now() >= deadline {
            return Ok(height);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(bottom: u32, top: u32, stability: u32) -> ScrollConfig {
        ScrollConfig {
            top_attempts: top,
            bottom_attempts: bottom,
            wait_per_scroll: Duration::from_millis(1),
            stability_checks: stability,
            parallel_wait: false,
        }
    }

    #[test]
    fn bottom_phase_stops_on_first_unchanged_height() {
        let mut c = ScrollConductor::new(config(10, 5, 2));
        for h in [100.0, 200.0, 300.0, 300.0] {
            assert_eq!(c.phase(), Phase::BottomDiscovery);
            c.observe(h);
        }
        assert_eq!(c.phase(), Phase::TopDiscovery);
        assert_eq!(c.report().bottom_iterations, 4);
    }

    #[test]
    fn top_phase_requires_consecutive_stable_readings() {
        let mut c = ScrollConductor::new(config(1, 10, 3));
        c.observe(100.0);
        assert_eq!(c.phase(), Phase::TopDiscovery);
        // one plateau, then growth resets the counter
        for h in [100.0, 400.0, 400.0, 400.0] {
            c.observe(h);
            assert_eq!(c.phase(), Phase::TopDiscovery);
        }
        c.observe(400.0);
        assert_eq!(c.phase(), Phase::Settle);
        assert!(c.report().converged);
        assert_eq!(c.next_target(), Some(ScrollTarget::Bottom));
        c.observe(400.0);
        assert_eq!(c.phase(), Phase::Done);
        assert_eq!(c.next_target(), None);
    }

    #[test]
    fn top_phase_gives_up_after_attempt_budget() {
        let mut c = ScrollConductor::new(config(1, 3, 5));
        c.observe(10.0);
        for h in [20.0, 30.0, 40.0] {
            c.observe(h);
        }
        assert_eq!(c.phase(), Phase::Settle);
        assert!(!c.report().converged);
        assert_eq!(c.report().max_height, 40.0);
    }

    #[test]
    fn zero_attempt_budgets_skip_straight_to_settle() {
        let c = ScrollConductor::new(config(0, 0, 1));
        assert_eq!(c.phase(), Phase::Settle);
    }
}
