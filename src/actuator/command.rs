use std::fmt;

use crate::control::AngularCorrection;

/// One pan/tilt/effector instruction for the actuator board.
///
/// Serialized as `<pan>:<tilt>:<fire>\n` with signed one-decimal degrees and
/// `0`/`1` for the effector, e.g. `+2.5:-3.5:0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Command {
    pan_degrees: f64,
    tilt_degrees: f64,
    fire: bool,
}

impl Command {
    /// Non-finite angles are replaced by zero.
    pub fn new(pan_degrees: f64, tilt_degrees: f64, fire: bool) -> Self {
        Self {
            pan_degrees: finite_or_zero(pan_degrees),
            tilt_degrees: finite_or_zero(tilt_degrees),
            fire,
        }
    }

    /// Hold position with the effector off.
    pub fn neutral() -> Self {
        Self::new(0.0, 0.0, false)
    }

    /// Fire without moving.
    pub fn manual_fire() -> Self {
        Self::new(0.0, 0.0, true)
    }

    pub fn from_correction(correction: AngularCorrection, fire: bool) -> Self {
        Self::new(correction.pan_degrees, correction.tilt_degrees, fire)
    }

    pub fn pan_degrees(&self) -> f64 {
        self.pan_degrees
    }

    pub fn tilt_degrees(&self) -> f64 {
        self.tilt_degrees
    }

    pub fn fire(&self) -> bool {
        self.fire
    }

    pub fn is_neutral(&self) -> bool {
        *self == Self::neutral()
    }

    /// Wire form including the trailing newline.
    pub fn to_line(&self) -> String {
        format!("{self}\n")
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:+.1}:{:+.1}:{}",
            self.pan_degrees,
            self.tilt_degrees,
            u8::from(self.fire)
        )
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}
