//! Closed-loop visual tracking for a pan/tilt mount.
//!
//! Frames from a capture device feed a single-target tracker. The target's
//! offset from the frame center drives a two-axis PID controller whose output
//! is sent to the actuator as `<pan>:<tilt>:<fire>` lines, with the effector
//! armed once the target has dwelt near the center.
//!
//! # Example
//!
//! ```ignore
//! use crossbeam_channel::unbounded;
//! use pantilt_rs::{Config, ControlEvent, TrackingSystem, actuator::NullSink, sim};
//!
//! let config = Config::default();
//! let mut system = TrackingSystem::start(
//!     config,
//!     |c: &pantilt_rs::config::CaptureConfig| Ok(sim::MovingTarget::new(c.width, c.height)),
//!     sim::tracker_factory,
//!     NullSink,
//! )?;
//!
//! let (events, rx) = unbounded();
//! events.send(ControlEvent::Select { start: (960.0, 540.0), end: (960.0, 540.0) })?;
//! ```

pub mod actuator;
pub mod capture;
pub mod config;
pub mod control;
mod error;
pub mod integration;
pub mod sim;
pub mod tracker;

pub use actuator::{Command, CommandChannel, CommandSink};
pub use capture::{CaptureDevice, Frame, FrameSource};
pub use config::Config;
pub use control::{FireZoneArmer, PidController};
pub use error::{Error, Result};
pub use integration::{ControlEvent, ControlLoop, StepOutcome, TrackingSystem};
pub use tracker::{
    Algorithm, BoundingBox, TrackState, TrackerFactory, TrackerFailure, TrackerSession,
    VisualTracker,
};
