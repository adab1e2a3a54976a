//! Wiring of capture, tracking, control and actuation into a running loop.
//!
//! [`ControlLoop`] turns frames into commands one step at a time and can be
//! driven directly. [`TrackingSystem`] owns the capture thread as well and
//! applies [`ControlEvent`]s between frames.

mod control_loop;
mod fps;
mod system;

pub use control_loop::{ControlLoop, LoopStatus, StepOutcome, TrackingSample};
pub use fps::FpsMeter;
pub use system::{ControlEvent, RunSummary, TrackingSystem};
