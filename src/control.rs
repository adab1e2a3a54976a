//! Numeric control: PID correction and fire-zone arming.

mod fire_zone;
mod pid;
mod window;

pub use fire_zone::{FireZoneArmer, FireZoneReading};
pub use pid::{AngularCorrection, PidController, PidState, constrain};
pub use window::ErrorWindow;
