//! Capture, control and dispatch wired together behind an event channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crossbeam_channel::Receiver;
use tracing::{info, warn};

use super::control_loop::{ControlLoop, LoopStatus, StepOutcome};
use crate::actuator::{CommandChannel, CommandSink, DispatchStats};
use crate::capture::{CaptureDevice, DeviceFailure, FrameSource, SlotStats};
use crate::config::{CaptureConfig, Config};
use crate::error::Result;
use crate::tracker::{BoundingBox, TrackerFactory};

/// Operator requests delivered to a running [`TrackingSystem`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlEvent {
    /// Lock onto the given box
    Acquire(BoundingBox),
    /// Lock onto a mouse selection from press to release position
    Select { start: (f32, f32), end: (f32, f32) },
    Stop,
    /// Stop tracking and re-center
    Reset,
    /// Move to the next tracking algorithm
    SwitchAlgorithm,
    ManualFire,
    /// Queue a neutral command
    Center,
    ToggleDebug,
    Quit,
}

/// Counters reported by [`TrackingSystem::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: u64,
    pub tracked: u64,
    pub lost: u64,
    pub events: u64,
}

/// Owns the capture thread, the control loop and the dispatcher.
pub struct TrackingSystem {
    source: FrameSource,
    control: ControlLoop,
}

impl TrackingSystem {
    /// Validate `config`, open the capture device, start dispatch and capture.
    pub fn start<D, O>(
        config: Config,
        opener: O,
        factory: impl TrackerFactory + 'static,
        sink: impl CommandSink,
    ) -> Result<Self>
    where
        D: CaptureDevice,
        O: FnOnce(&CaptureConfig) -> std::result::Result<D, DeviceFailure>,
    {
        config.validate()?;
        let mut source = FrameSource::open(&config.capture, opener)?;
        let commands = CommandChannel::spawn(sink, config.actuator.tick())?;
        source.start()?;

        let control = ControlLoop::new(config, source.slot(), factory, commands)?;
        info!("Tracking system started");
        Ok(Self { source, control })
    }

    pub fn control(&self) -> &ControlLoop {
        &self.control
    }

    pub fn control_mut(&mut self) -> &mut ControlLoop {
        &mut self.control
    }

    pub fn status(&self) -> LoopStatus {
        self.control.status()
    }

    pub fn capture_stats(&self) -> SlotStats {
        self.source.stats()
    }

    /// Apply one operator event. Returns false for [`ControlEvent::Quit`].
    pub fn handle_event(&mut self, event: ControlEvent) -> bool {
        let control = &mut self.control;
        // Failures are logged by the control loop and leave it idle
        match event {
            ControlEvent::Acquire(bbox) => {
                let _ = control.acquire(bbox);
            }
            ControlEvent::Select { start, end } => {
                let _ = control.acquire_selection(start, end);
            }
            ControlEvent::Stop => {
                control.stop_tracking();
            }
            ControlEvent::Reset => control.reset_tracking(),
            ControlEvent::SwitchAlgorithm => {
                let _ = control.switch_algorithm();
            }
            ControlEvent::ManualFire => {
                control.manual_fire();
            }
            ControlEvent::Center => {
                control.center();
            }
            ControlEvent::ToggleDebug => {
                control.toggle_debug();
            }
            ControlEvent::Quit => return false,
        }
        true
    }

    /// Run until `stop` is set, a [`ControlEvent::Quit`] arrives or capture ends.
    ///
    /// Pending events are applied before each frame. The loop waits for a
    /// frame newer than the last processed one, so no frame is handled twice.
    pub fn run(&mut self, events: &Receiver<ControlEvent>, stop: &AtomicBool) -> RunSummary {
        let mut summary = RunSummary::default();
        let frame_wait = self.control.config().control.frame_wait();

        'run: while !stop.load(Ordering::SeqCst) {
            for event in events.try_iter() {
                summary.events += 1;
                if !self.handle_event(event) {
                    info!("Quit requested");
                    break 'run;
                }
            }

            if !self.source.is_running() {
                warn!("Capture is not running");
                break;
            }

            let after = self.control.last_sequence();
            let Some(frame) = self.source.wait_newer(after, frame_wait) else {
                continue;
            };
            match self.control.process_frame(&frame) {
                StepOutcome::NoFrame => continue,
                StepOutcome::Idle => {}
                StepOutcome::Tracked(_) => summary.tracked += 1,
                StepOutcome::Lost { .. } => summary.lost += 1,
            }
            summary.processed += 1;
        }

        summary
    }

    /// Neutral the mount, wait, release the camera and close the actuator link.
    pub fn shutdown(mut self) -> Option<DispatchStats> {
        info!("Shutting down");
        self.control.stop_tracking();
        thread::sleep(self.control.config().control.shutdown_settle());
        self.source.stop();
        self.control.close()
    }
}
