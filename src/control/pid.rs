//! Two-axis PID controller from pixel error to pan/tilt correction.
//!
//! # Operation
//! 1. Create with `PidController::new()` and a [`PidConfig`]
//! 2. Call `update()` once per tracked frame with the pixel error
//! 3. Call `reset()` whenever a lock starts, switches algorithm or stops
//!
//! # Units
//! - Input: pixel error from frame center
//! - Output: degrees, clamped to the configured output range
//!
//! The integral term is the plain sum of a sliding window of past errors and
//! the derivative term is the raw difference from the previous error. Neither
//! is scaled by the time step.

use std::time::Instant;

use crate::config::PidConfig;
use crate::control::window::ErrorWindow;

/// Pan/tilt correction in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AngularCorrection {
    pub pan_degrees: f64,
    pub tilt_degrees: f64,
}

/// Everything the controller remembers between updates.
#[derive(Debug, Clone, PartialEq)]
pub struct PidState {
    prev_error_x: f64,
    prev_error_y: f64,
    history: ErrorWindow,
    last_update: Instant,
    last_dt: f64,
    last_raw: (f64, f64),
}

impl PidState {
    fn new(window: usize, now: Instant) -> Self {
        Self {
            prev_error_x: 0.0,
            prev_error_y: 0.0,
            history: ErrorWindow::new(window),
            last_update: now,
            last_dt: 0.0,
            last_raw: (0.0, 0.0),
        }
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn previous_error(&self) -> (f64, f64) {
        (self.prev_error_x, self.prev_error_y)
    }
}

#[derive(Debug, Clone)]
pub struct PidController {
    config: PidConfig,
    state: PidState,
}

impl PidController {
    pub fn new(config: PidConfig) -> Self {
        Self::new_at(config, Instant::now())
    }

    /// Create a controller whose first time step is measured from `now`.
    pub fn new_at(config: PidConfig, now: Instant) -> Self {
        let state = PidState::new(config.window, now);
        Self { config, state }
    }

    pub fn config(&self) -> &PidConfig {
        &self.config
    }

    pub fn state(&self) -> &PidState {
        &self.state
    }

    /// Time step used by the most recent update, in seconds.
    pub fn last_dt(&self) -> f64 {
        self.state.last_dt
    }

    /// Unscaled, unclamped controller output of the most recent update.
    pub fn last_raw_output(&self) -> (f64, f64) {
        self.state.last_raw
    }

    /// Replace gains and scaling. The controller state is reset.
    pub fn set_config(&mut self, config: PidConfig) {
        self.config = config;
        self.reset();
    }

    /// Compute the correction for the current pixel error.
    pub fn update(&mut self, error_x: f64, error_y: f64, now: Instant) -> AngularCorrection {
        let dt = now
            .checked_duration_since(self.state.last_update)
            .map(|d| d.as_secs_f64())
            .filter(|dt| *dt > 0.0)
            .unwrap_or(self.config.min_dt_secs);

        self.state.history.push(error_x, error_y);
        let (integral_x, integral_y) = self.state.history.sums();

        let derivative_x = error_x - self.state.prev_error_x;
        let derivative_y = error_y - self.state.prev_error_y;

        let cfg = &self.config;
        let raw_x = cfg.kp * error_x + cfg.ki * integral_x + cfg.kd * derivative_x;
        let raw_y = cfg.kp * error_y + cfg.ki * integral_y + cfg.kd * derivative_y;

        let pan = constrain(raw_x * cfg.degrees_per_pixel_x, cfg.min_output, cfg.max_output);
        let tilt = constrain(raw_y * cfg.degrees_per_pixel_y, cfg.min_output, cfg.max_output);

        self.state.prev_error_x = error_x;
        self.state.prev_error_y = error_y;
        self.state.last_update = now;
        self.state.last_dt = dt;
        self.state.last_raw = (raw_x, raw_y);

        AngularCorrection {
            pan_degrees: pan,
            tilt_degrees: tilt,
        }
    }

    /// Forget all history; the next time step is measured from now.
    pub fn reset(&mut self) {
        self.reset_at(Instant::now());
    }

    /// Forget all history; the next time step is measured from `now`.
    pub fn reset_at(&mut self, now: Instant) {
        self.state = PidState::new(self.config.window, now);
    }
}

/// Limit `value` to `[min, max]`. NaN maps to the middle of the range.
pub fn constrain(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() {
        return min + (max - min) / 2.0;
    }
    value.max(min).min(max)
}
