//! Refresh-loop detection.
//!
//! Guards against the feedback loop where a state write triggers a
//! page reload, the reload re-reads stale state and writes again, and
//! the cycle never ends. Every observed navigation completion is
//! compared against the URL already recorded for the active tab: a
//! match means no real navigation happened and counts toward the
//! threshold; a differing URL proves forward progress and resets
//! everything, including an engaged suppression.
//!
//! Suppression is process-local by design. It must never travel with
//! the persisted state, or a poisoned snapshot would re-suppress every
//! future session.

use std::time::{Duration, Instant};

/// Outcome of one navigation observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The URL changed; the session is making progress.
    Progress,
    /// Same URL again, still under the threshold. Carries the count.
    Repeat(u32),
    /// The threshold was exceeded; propagation must stop.
    Suppressed,
}

/// Counter-based detector for no-progress reload loops.
#[derive(Debug)]
pub struct LoopDetector {
    threshold: u32,
    window: Duration,
    count: u32,
    window_start: Option<Instant>,
    suppressed: bool,
}

impl LoopDetector {
    pub fn new(threshold: u32, window: Duration) -> Self {
        Self { threshold, window, count: 0, window_start: None, suppressed: false }
    }

    /// Record a navigation completion.
    ///
    /// `loaded_url` is what the page actually loaded; `recorded_url`
    /// is what the synchronized state says the active tab should be.
    pub fn observe(&mut self, loaded_url: &str, recorded_url: &str) -> Verdict {
        if loaded_url != recorded_url {
            self.reset();
            return Verdict::Progress;
        }

        // Only forward progress ends suppression; a window that ages
        // out while suppressed must not downgrade the verdict.
        if self.suppressed {
            return Verdict::Suppressed;
        }

        let now = Instant::now();
        match self.window_start {
            Some(start) if now.duration_since(start) <= self.window => {}
            _ => {
                // First repeat, or the previous burst aged out.
                self.count = 0;
                self.window_start = Some(now);
            }
        }

        self.count += 1;
        if self.count > self.threshold {
            if !self.suppressed {
                tracing::warn!(
                    count = self.count,
                    threshold = self.threshold,
                    url = loaded_url,
                    "refresh loop detected, suppressing state propagation"
                );
            }
            self.suppressed = true;
            return Verdict::Suppressed;
        }

        Verdict::Repeat(self.count)
    }

    /// Whether propagation is currently suppressed.
    pub fn is_suppressed(&self) -> bool {
        self.suppressed
    }

    fn reset(&mut self) {
        if self.suppressed {
            tracing::info!("forward navigation observed, lifting suppression");
        }
        self.count = 0;
        self.window_start = None;
        self.suppressed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> LoopDetector {
        LoopDetector::new(3, Duration::from_secs(10))
    }

    #[test]
    fn test_different_url_is_progress() {
        let mut det = detector();
        assert_eq!(det.observe("https://b", "https://a"), Verdict::Progress);
        assert!(!det.is_suppressed());
    }

    #[test]
    fn test_repeats_count_up_to_threshold() {
        let mut det = detector();
        assert_eq!(det.observe("https://a", "https://a"), Verdict::Repeat(1));
        assert_eq!(det.observe("https://a", "https://a"), Verdict::Repeat(2));
        assert_eq!(det.observe("https://a", "https://a"), Verdict::Repeat(3));
        assert!(!det.is_suppressed());
        assert_eq!(det.observe("https://a", "https://a"), Verdict::Suppressed);
        assert!(det.is_suppressed());
    }

    #[test]
    fn test_suppression_persists_across_repeats() {
        let mut det = detector();
        for _ in 0..5 {
            det.observe("https://a", "https://a");
        }
        assert!(det.is_suppressed());
        assert_eq!(det.observe("https://a", "https://a"), Verdict::Suppressed);
    }

    #[test]
    fn test_progress_lifts_suppression() {
        let mut det = detector();
        for _ in 0..5 {
            det.observe("https://a", "https://a");
        }
        assert!(det.is_suppressed());

        assert_eq!(det.observe("https://b", "https://a"), Verdict::Progress);
        assert!(!det.is_suppressed());

        // The counter restarted too.
        assert_eq!(det.observe("https://b", "https://b"), Verdict::Repeat(1));
    }

    #[test]
    fn test_stale_window_restarts_count() {
        let mut det = LoopDetector::new(3, Duration::from_millis(0));
        assert_eq!(det.observe("https://a", "https://a"), Verdict::Repeat(1));
        std::thread::sleep(Duration::from_millis(5));
        // Window already elapsed, so the burst starts over.
        assert_eq!(det.observe("https://a", "https://a"), Verdict::Repeat(1));
    }

    #[test]
    fn test_suppression_outlasts_the_window() {
        let mut det = LoopDetector::new(1, Duration::from_millis(20));
        assert_eq!(det.observe("https://a", "https://a"), Verdict::Repeat(1));
        assert_eq!(det.observe("https://a", "https://a"), Verdict::Suppressed);

        // The observation window elapses, but the mode and the verdict
        // must keep agreeing until real progress is observed.
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(det.observe("https://a", "https://a"), Verdict::Suppressed);
        assert!(det.is_suppressed());
    }

    #[test]
    fn test_threshold_of_one() {
        let mut det = LoopDetector::new(1, Duration::from_secs(10));
        assert_eq!(det.observe("https://a", "https://a"), Verdict::Repeat(1));
        assert_eq!(det.observe("https://a", "https://a"), Verdict::Suppressed);
    }
}
