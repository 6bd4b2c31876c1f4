//! Rolling speech failure tracker
//!
//! Each recorded error stays on the books for `decay_ms`. When more than
//! `max_errors` land inside a `window_ms` window the tracker trips and speech
//! stays disabled until expired errors bring the count back to `max_errors`.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{info, warn};

/// Thresholds for the rate limiter
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvailabilityConfig {
    /// Errors tolerated inside one window
    pub max_errors: usize,

    /// Sliding window for the trip condition
    pub window_ms: u64,

    /// How long each error counts against the tracker
    pub decay_ms: u64,
}

impl Default for AvailabilityConfig {
    fn default() -> Self {
        Self {
            max_errors: 3,
            window_ms: 10_000,
            decay_ms: 30_000,
        }
    }
}

impl AvailabilityConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn decay(&self) -> Duration {
        Duration::from_millis(self.decay_ms)
    }
}

/// Process-wide speech availability
#[derive(Clone, Debug)]
pub struct SpeechAvailabilityTracker {
    config: AvailabilityConfig,

    /// Whether the host has a speech engine at all
    capability_present: bool,

    /// Latched by the trip condition, released by decay
    rate_limited: bool,

    /// Timestamps of errors that have not decayed yet, oldest first
    errors: VecDeque<Duration>,

    last_error_at: Option<Duration>,
}

impl SpeechAvailabilityTracker {
    pub fn new(config: AvailabilityConfig) -> Self {
        Self {
            config,
            capability_present: true,
            rate_limited: false,
            errors: VecDeque::new(),
            last_error_at: None,
        }
    }

    /// Record a speech failure at `now`
    pub fn record_error(&mut self, now: Duration) {
        self.decay(now);
        self.errors.push_back(now);
        self.last_error_at = Some(now);

        let recent = self.errors_within_window(now);
        if recent > self.config.max_errors && !self.rate_limited {
            warn!(
                "Speech synthesis disabled after {} errors within {}ms",
                recent, self.config.window_ms
            );
            self.rate_limited = true;
        }
    }

    /// Expire errors older than the decay period
    pub fn decay(&mut self, now: Duration) {
        let decay = self.config.decay();
        while let Some(&oldest) = self.errors.front() {
            if now.saturating_sub(oldest) >= decay {
                self.errors.pop_front();
            } else {
                break;
            }
        }

        if self.rate_limited && self.errors.len() <= self.config.max_errors {
            info!("Speech synthesis re-enabled, error count back to {}", self.errors.len());
            self.rate_limited = false;
        }
    }

    /// Number of errors inside the trailing window ending at `now`
    pub fn errors_within_window(&self, now: Duration) -> usize {
        let window = self.config.window();
        self.errors
            .iter()
            .filter(|&&t| now.saturating_sub(t) < window)
            .count()
    }

    /// Errors that have not decayed yet; never negative
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn last_error_at(&self) -> Option<Duration> {
        self.last_error_at
    }

    /// Update whether the host exposes a speech engine
    pub fn set_capability_present(&mut self, present: bool) {
        if self.capability_present && !present {
            warn!("Speech synthesis capability not present");
        }
        self.capability_present = present;
    }

    pub fn is_capability_present(&self) -> bool {
        self.capability_present
    }

    pub fn is_rate_limited(&self) -> bool {
        self.rate_limited
    }

    /// Whether new sessions may start
    pub fn is_available(&self) -> bool {
        self.capability_present && !self.rate_limited
    }
}

impl Default for SpeechAvailabilityTracker {
    fn default() -> Self {
        Self::new(AvailabilityConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(v: u64) -> Duration {
        Duration::from_secs(v)
    }

    #[test]
    fn test_four_errors_in_window_trip() {
        let mut tracker = SpeechAvailabilityTracker::default();
        for t in 0..3 {
            tracker.record_error(secs(t));
            assert!(tracker.is_available());
        }
        tracker.record_error(secs(3));
        assert!(!tracker.is_available());
        assert!(tracker.is_rate_limited());
    }

    #[test]
    fn test_spaced_errors_stay_available() {
        let mut tracker = SpeechAvailabilityTracker::default();
        for i in 0..6 {
            tracker.record_error(secs(i * 11));
            assert!(tracker.is_available(), "tripped at error {}", i);
        }
    }

    #[test]
    fn test_decay_releases_rate_limit() {
        let mut tracker = SpeechAvailabilityTracker::default();
        for t in 0..4 {
            tracker.record_error(secs(t));
        }
        assert!(!tracker.is_available());

        tracker.decay(secs(29));
        assert!(!tracker.is_available());

        // first error expires at 30s, leaving three
        tracker.decay(secs(30));
        assert!(tracker.is_available());
        assert_eq!(tracker.error_count(), 3);
    }

    #[test]
    fn test_error_count_clamped_at_zero() {
        let mut tracker = SpeechAvailabilityTracker::default();
        tracker.record_error(secs(0));
        tracker.decay(secs(100));
        tracker.decay(secs(200));
        assert_eq!(tracker.error_count(), 0);
        assert_eq!(tracker.last_error_at(), Some(secs(0)));
    }

    #[test]
    fn test_capability_absent_disables() {
        let mut tracker = SpeechAvailabilityTracker::default();
        tracker.set_capability_present(false);
        assert!(!tracker.is_available());
        tracker.set_capability_present(true);
        assert!(tracker.is_available());
    }

    #[test]
    fn test_custom_thresholds() {
        let mut tracker = SpeechAvailabilityTracker::new(AvailabilityConfig {
            max_errors: 1,
            window_ms: 1_000,
            decay_ms: 5_000,
        });
        tracker.record_error(Duration::from_millis(0));
        tracker.record_error(Duration::from_millis(500));
        assert!(!tracker.is_available());
        tracker.decay(Duration::from_millis(5_000));
        assert!(tracker.is_available());
    }
}
