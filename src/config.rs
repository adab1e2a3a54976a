//! Runtime configuration for capture, tracking, control and actuation.
//!
//! Every tunable of the loop lives here so nothing is baked in at compile
//! time. Configuration is stored as JSON; missing fields fall back to the
//! defaults below.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::tracker::Algorithm;

/// Capture device settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Device identifier handed to the device opener (index or path)
    pub device: String,
    /// Requested frame width in pixels
    pub width: u32,
    /// Requested frame height in pixels
    pub height: u32,
    /// Clockwise rotation applied to every captured frame (0, 90, 180 or 270)
    pub rotation_degrees: u16,
    /// Pause after a failed device read before trying again
    pub retry_backoff_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: "0".to_string(),
            width: 1920,
            height: 1080,
            rotation_degrees: 0,
            retry_backoff_ms: 5,
        }
    }
}

impl CaptureConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Tracker session settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerSettings {
    /// Algorithm used for the first acquisition
    pub algorithm: Algorithm,
    /// Smallest width/height a bounding box is clamped to
    pub min_bbox_size: f32,
    /// Side of the square box created when a selection is a click, not a drag
    pub click_box_size: f32,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Csrt,
            min_bbox_size: 10.0,
            click_box_size: 50.0,
        }
    }
}

/// PID gains, integral window, output clamp and pixel-to-degree scaling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PidConfig {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// Number of past errors summed by the integral term
    pub window: usize,
    /// Lower bound of the angular output in degrees
    pub min_output: f64,
    /// Upper bound of the angular output in degrees
    pub max_output: f64,
    /// Pan degrees per pixel of horizontal error
    pub degrees_per_pixel_x: f64,
    /// Tilt degrees per pixel of vertical error
    pub degrees_per_pixel_y: f64,
    /// Substituted for non-positive time steps, in seconds
    pub min_dt_secs: f64,
}

impl Default for PidConfig {
    fn default() -> Self {
        Self {
            kp: 0.085,
            ki: 0.00001,
            kd: 0.04,
            window: 100,
            min_output: -5.0,
            max_output: 5.0,
            degrees_per_pixel_x: 60.0 / 1920.0,
            degrees_per_pixel_y: 35.0 / 1080.0,
            min_dt_secs: 0.001,
        }
    }
}

impl PidConfig {
    /// Derive the degree scale factors from the camera field of view and resolution.
    pub fn with_field_of_view(mut self, h_fov: f64, v_fov: f64, width: u32, height: u32) -> Self {
        self.degrees_per_pixel_x = h_fov / f64::from(width);
        self.degrees_per_pixel_y = v_fov / f64::from(height);
        self
    }
}

/// Fire-zone arming settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FireZoneConfig {
    /// Radius around the frame center, in pixels
    pub threshold_px: f64,
    /// Time the target must stay inside the radius before firing, in seconds
    pub dwell_secs: f64,
}

impl Default for FireZoneConfig {
    fn default() -> Self {
        Self {
            threshold_px: 30.0,
            dwell_secs: 0.5,
        }
    }
}

impl FireZoneConfig {
    /// Dwell as a [`Duration`]; negative, non-finite or overlong values are rejected.
    pub fn dwell(&self) -> Result<Duration> {
        Duration::try_from_secs_f64(self.dwell_secs).map_err(|e| {
            invalid(format!("fire zone dwell of {} s: {e}", self.dwell_secs))
        })
    }
}

/// Actuator link settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActuatorConfig {
    /// Serial port of the actuator board; `None` disables actuation
    pub port: Option<String>,
    pub baud_rate: u32,
    /// Dispatch tick in milliseconds
    pub tick_ms: u64,
    /// Wait after opening the port while the board resets
    pub settle_ms: u64,
    pub write_timeout_ms: u64,
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: 115_200,
            tick_ms: 10,
            settle_ms: 2_000,
            write_timeout_ms: 1_000,
        }
    }
}

impl ActuatorConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

/// Control loop timing and diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Pause after the final neutral command before capture and dispatch stop
    pub shutdown_settle_ms: u64,
    /// Longest time the run loop waits for a fresh frame before polling events again
    pub frame_wait_ms: u64,
    /// Emit periodic tracking diagnostics
    pub debug: bool,
    /// Diagnostics are logged every this many tracked frames
    pub debug_every: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            shutdown_settle_ms: 100,
            frame_wait_ms: 100,
            debug: true,
            debug_every: 10,
        }
    }
}

impl ControlConfig {
    pub fn shutdown_settle(&self) -> Duration {
        Duration::from_millis(self.shutdown_settle_ms)
    }

    pub fn frame_wait(&self) -> Duration {
        Duration::from_millis(self.frame_wait_ms)
    }
}

/// Complete system configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub capture: CaptureConfig,
    pub tracker: TrackerSettings,
    pub pid: PidConfig,
    pub fire_zone: FireZoneConfig,
    pub actuator: ActuatorConfig,
    pub control: ControlConfig,
}

impl Config {
    /// Load and validate a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Check that every value is usable by the loop.
    pub fn validate(&self) -> Result<()> {
        let capture = &self.capture;
        if capture.width == 0 || capture.height == 0 {
            return Err(invalid("capture width and height must be non-zero"));
        }
        if !matches!(capture.rotation_degrees, 0 | 90 | 180 | 270) {
            return Err(invalid(format!(
                "capture rotation must be 0, 90, 180 or 270, got {}",
                capture.rotation_degrees
            )));
        }

        let tracker = &self.tracker;
        if !(tracker.min_bbox_size >= 1.0) || !(tracker.click_box_size >= 1.0) {
            return Err(invalid("bounding box sizes must be at least one pixel"));
        }

        let pid = &self.pid;
        for (name, value) in [("kp", pid.kp), ("ki", pid.ki), ("kd", pid.kd)] {
            if !value.is_finite() {
                return Err(invalid(format!("pid gain {name} must be finite")));
            }
        }
        if pid.window == 0 {
            return Err(invalid("pid integral window must hold at least one error"));
        }
        if !(pid.min_output < pid.max_output) || !pid.min_output.is_finite() || !pid.max_output.is_finite() {
            return Err(invalid(format!(
                "pid output range [{}, {}] is empty or unbounded",
                pid.min_output, pid.max_output
            )));
        }
        if !(pid.degrees_per_pixel_x > 0.0 && pid.degrees_per_pixel_x.is_finite())
            || !(pid.degrees_per_pixel_y > 0.0 && pid.degrees_per_pixel_y.is_finite())
        {
            return Err(invalid("degrees per pixel must be positive"));
        }
        if !(pid.min_dt_secs > 0.0) {
            return Err(invalid("pid minimum dt must be positive"));
        }

        let zone = &self.fire_zone;
        if !(zone.threshold_px > 0.0) || !zone.threshold_px.is_finite() {
            return Err(invalid("fire zone threshold must be positive"));
        }
        zone.dwell()?;

        if self.actuator.tick_ms == 0 {
            return Err(invalid("actuator tick must be at least one millisecond"));
        }
        if self.control.debug_every == 0 {
            return Err(invalid("debug interval must be at least one frame"));
        }

        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> Error {
    Error::InvalidConfig(msg.into())
}
