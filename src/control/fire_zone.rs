//! Dwell-timed arming of the effector near the frame center.

use std::time::{Duration, Instant};

use nalgebra::Vector2;

/// Result of one fire-zone evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FireZoneReading {
    /// Distance of the target from the frame center, in pixels
    pub distance: f64,
    pub in_zone: bool,
    pub fire: bool,
}

/// Tracks how long the target has continuously stayed inside the fire zone.
///
/// Leaving the zone clears the entry time, so every re-entry starts a new
/// dwell period.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FireZoneArmer {
    entered_at: Option<Instant>,
}

impl FireZoneArmer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn evaluate(
        &mut self,
        error_x: f64,
        error_y: f64,
        threshold: f64,
        dwell_required: Duration,
        now: Instant,
    ) -> FireZoneReading {
        let distance = Vector2::new(error_x, error_y).norm();
        let in_zone = distance < threshold;

        let fire = if in_zone {
            let entered_at = *self.entered_at.get_or_insert(now);
            now.saturating_duration_since(entered_at) > dwell_required
        } else {
            self.entered_at = None;
            false
        };

        FireZoneReading {
            distance,
            in_zone,
            fire,
        }
    }

    /// Whether the target is currently inside the zone and the dwell clock runs.
    pub fn is_armed(&self) -> bool {
        self.entered_at.is_some()
    }

    /// Time spent in the zone so far.
    pub fn dwell(&self, now: Instant) -> Option<Duration> {
        self.entered_at.map(|t| now.saturating_duration_since(t))
    }

    /// Disarm and forget the entry time.
    pub fn reset(&mut self) {
        self.entered_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: f64 = 30.0;
    const DWELL: Duration = Duration::from_millis(500);

    fn at(t0: Instant, ms: u64) -> Instant {
        t0 + Duration::from_millis(ms)
    }

    #[test]
    fn test_fires_after_dwell() {
        let t0 = Instant::now();
        let mut armer = FireZoneArmer::new();
        for ms in (0..=500).step_by(100) {
            let reading = armer.evaluate(6.0, 8.0, THRESHOLD, DWELL, at(t0, ms));
            assert!(reading.in_zone);
            assert!(!reading.fire, "fired early at {ms} ms");
            assert!((reading.distance - 10.0).abs() < 1e-12);
        }
        let reading = armer.evaluate(6.0, 8.0, THRESHOLD, DWELL, at(t0, 600));
        assert!(reading.fire);
    }

    #[test]
    fn test_exit_restarts_dwell() {
        let t0 = Instant::now();
        let mut armer = FireZoneArmer::new();
        for ms in [0, 100, 200, 300] {
            armer.evaluate(6.0, 8.0, THRESHOLD, DWELL, at(t0, ms));
        }

        let outside = armer.evaluate(24.0, 32.0, THRESHOLD, DWELL, at(t0, 400));
        assert!(!outside.in_zone);
        assert!(!outside.fire);
        assert!(!armer.is_armed());

        let reentry = armer.evaluate(6.0, 8.0, THRESHOLD, DWELL, at(t0, 500));
        assert!(reentry.in_zone);
        assert!(!reentry.fire);

        assert!(!armer.evaluate(6.0, 8.0, THRESHOLD, DWELL, at(t0, 600)).fire);
        assert!(!armer.evaluate(6.0, 8.0, THRESHOLD, DWELL, at(t0, 1000)).fire);
        assert!(armer.evaluate(6.0, 8.0, THRESHOLD, DWELL, at(t0, 1001)).fire);
    }

    #[test]
    fn test_boundary_is_outside() {
        let mut armer = FireZoneArmer::new();
        let reading = armer.evaluate(30.0, 0.0, THRESHOLD, DWELL, Instant::now());
        assert!(!reading.in_zone);
        assert!(!armer.is_armed());
    }

    #[test]
    fn test_reset_disarms() {
        let t0 = Instant::now();
        let mut armer = FireZoneArmer::new();
        armer.evaluate(0.0, 0.0, THRESHOLD, DWELL, t0);
        assert!(armer.is_armed());
        assert_eq!(armer.dwell(at(t0, 250)), Some(Duration::from_millis(250)));

        armer.reset();
        assert_eq!(armer, FireZoneArmer::new());

        // A stale entry time must not fire immediately on the next lock
        let reading = armer.evaluate(0.0, 0.0, THRESHOLD, DWELL, at(t0, 10_000));
        assert!(!reading.fire);
    }

    #[test]
    fn test_zero_dwell_fires_after_any_time() {
        let t0 = Instant::now();
        let mut armer = FireZoneArmer::new();
        assert!(!armer.evaluate(1.0, 1.0, THRESHOLD, Duration::ZERO, t0).fire);
        assert!(armer.evaluate(1.0, 1.0, THRESHOLD, Duration::ZERO, at(t0, 1)).fire);
    }
}
