//! Per-frame orchestration from tracker output to actuator command.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use nalgebra::Vector2;
use tracing::{debug, info, trace, warn};

use super::fps::FpsMeter;
use crate::actuator::{Command, CommandChannel, DispatchStats};
use crate::capture::{Frame, FrameSlot};
use crate::config::Config;
use crate::control::{AngularCorrection, FireZoneArmer, FireZoneReading, PidController};
use crate::error::{Error, Result};
use crate::tracker::{
    Algorithm, BoundingBox, TrackState, TrackerFactory, TrackerSession, pixel_error,
};

/// Everything computed for one tracked frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackingSample {
    pub sequence: u64,
    pub bbox: BoundingBox,
    /// Target offset from the frame center, in pixels
    pub error: Vector2<f64>,
    pub correction: AngularCorrection,
    pub zone: FireZoneReading,
    pub command: Command,
}

/// What a single [`ControlLoop::step`] did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepOutcome {
    /// No frame newer than the last processed one
    NoFrame,
    /// A frame arrived but nothing is being tracked
    Idle,
    Tracked(TrackingSample),
    /// The tracker gave up on this frame; a neutral command was sent
    Lost { last_bbox: Option<BoundingBox> },
}

/// Snapshot of the loop for status displays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopStatus {
    pub algorithm: Algorithm,
    pub state: TrackState,
    pub bbox: Option<BoundingBox>,
    pub fps: f64,
    pub in_fire_zone: bool,
    pub debug: bool,
    pub last_sequence: u64,
    pub pending_commands: usize,
}

/// Drives tracker, PID controller, fire-zone armer and command channel.
///
/// Each step takes the newest frame, advances the tracker, turns the pixel
/// error into an angular correction and queues exactly one command. Frames
/// are never processed twice. Losing the target resets the controller and
/// the armer and queues a single neutral command.
pub struct ControlLoop {
    config: Config,
    frames: Arc<FrameSlot>,
    session: TrackerSession,
    pid: PidController,
    armer: FireZoneArmer,
    dwell: Duration,
    commands: CommandChannel,
    fps: FpsMeter,
    last_sequence: u64,
    tracked_frames: u64,
    in_fire_zone: bool,
    debug: bool,
}

impl ControlLoop {
    /// Build a loop reading from `frames` and writing to `commands`.
    ///
    /// `config` is validated first; an invalid configuration is
    /// [`Error::InvalidConfig`].
    pub fn new(
        config: Config,
        frames: Arc<FrameSlot>,
        factory: impl TrackerFactory + 'static,
        commands: CommandChannel,
    ) -> Result<Self> {
        config.validate()?;
        let dwell = config.fire_zone.dwell()?;
        let session = TrackerSession::new(
            factory,
            config.tracker.algorithm,
            config.tracker.min_bbox_size,
        );
        let pid = PidController::new(config.pid.clone());
        let debug = config.control.debug;

        Ok(Self {
            config,
            frames,
            session,
            pid,
            armer: FireZoneArmer::new(),
            dwell,
            commands,
            fps: FpsMeter::default(),
            last_sequence: 0,
            tracked_frames: 0,
            in_fire_zone: false,
            debug,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &TrackerSession {
        &self.session
    }

    pub fn pid(&self) -> &PidController {
        &self.pid
    }

    /// Sequence number of the last frame handed to the tracker.
    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    /// Process the newest frame in the slot, if it has not been seen yet.
    pub fn step(&mut self) -> StepOutcome {
        match self.frames.latest() {
            Some(frame) => self.process_frame(&frame),
            None => StepOutcome::NoFrame,
        }
    }

    /// Process `frame` unless a frame with the same or a later sequence number
    /// was already processed.
    pub fn process_frame(&mut self, frame: &Frame) -> StepOutcome {
        if frame.sequence() <= self.last_sequence {
            return StepOutcome::NoFrame;
        }
        self.last_sequence = frame.sequence();
        if let Some(fps) = self.fps.tick(frame.timestamp()) {
            trace!("Frame rate {fps:.1} fps");
        }

        if !self.session.is_tracking() {
            return StepOutcome::Idle;
        }

        match self.session.step(frame) {
            Ok(bbox) => StepOutcome::Tracked(self.correct(frame, bbox)),
            Err(err) => {
                warn!("{err}");
                self.disengage();
                StepOutcome::Lost {
                    last_bbox: self.session.bbox(),
                }
            }
        }
    }

    fn correct(&mut self, frame: &Frame, bbox: BoundingBox) -> TrackingSample {
        let now = frame.timestamp();
        let error = pixel_error(&bbox, frame.width(), frame.height());
        let correction = self.pid.update(error.x, error.y, now);

        let zone = self.armer.evaluate(
            error.x,
            error.y,
            self.config.fire_zone.threshold_px,
            self.dwell,
            now,
        );
        self.in_fire_zone = zone.in_zone;

        let command = Command::from_correction(correction, zone.fire);
        self.commands.send(command);
        self.tracked_frames += 1;

        if self.debug && self.tracked_frames % self.config.control.debug_every == 0 {
            info!(
                "Error: ({:.1}, {:.1}) px | Command: {command} | In zone: {} | FPS: {:.1}",
                error.x,
                error.y,
                zone.in_zone,
                self.fps.fps()
            );
        }

        TrackingSample {
            sequence: frame.sequence(),
            bbox,
            error,
            correction,
            zone,
            command,
        }
    }

    /// Lock onto the target inside `bbox` using the newest frame.
    ///
    /// Any current lock is released and a neutral command queued first. On
    /// failure the loop stays idle.
    pub fn acquire(&mut self, bbox: BoundingBox) -> Result<BoundingBox> {
        self.stop_tracking();
        let frame = self.frames.latest().ok_or(Error::NoFrame)?;

        let locked = self.session.acquire(&frame, bbox).inspect_err(|e| {
            warn!("Failed to initialize tracker: {e}");
        })?;
        self.pid.reset_at(frame.timestamp());
        self.armer.reset();
        info!(
            "Tracking started with {} at ({:.0}, {:.0}) {:.0}x{:.0}",
            self.session.algorithm(),
            locked.x,
            locked.y,
            locked.width,
            locked.height
        );
        Ok(locked)
    }

    /// Acquire from a mouse selection; a near-zero drag becomes a click box.
    pub fn acquire_selection(&mut self, start: (f32, f32), end: (f32, f32)) -> Result<BoundingBox> {
        let bbox = BoundingBox::from_drag(start, end, self.config.tracker.click_box_size);
        self.acquire(bbox)
    }

    /// Release any lock and queue a neutral command. Returns the state that was left.
    pub fn stop_tracking(&mut self) -> TrackState {
        let previous = self.session.release();
        self.disengage();
        if previous == TrackState::Tracking {
            info!("Tracking stopped");
        }
        previous
    }

    /// Stop tracking and re-center the mount.
    pub fn reset_tracking(&mut self) {
        self.stop_tracking();
        self.center();
        info!("Tracking reset");
    }

    /// Move to the next algorithm, re-initializing on the last box while tracking.
    pub fn switch_algorithm(&mut self) -> Result<Algorithm> {
        let next = self.session.algorithm().next();
        let was_tracking = self.session.is_tracking();
        let frame = self.frames.latest();

        match self.session.switch_algorithm(next, frame.as_deref()) {
            Ok(()) => {
                if was_tracking {
                    let now = frame.map_or_else(Instant::now, |f| f.timestamp());
                    self.pid.reset_at(now);
                    self.armer.reset();
                    self.in_fire_zone = false;
                }
                info!("Switched to {next} tracker");
                Ok(next)
            }
            Err(err) => {
                warn!("Failed to switch to {next}: {err}");
                self.disengage();
                Err(err)
            }
        }
    }

    /// Queue a fire command. Honored only while tracking inside the fire zone.
    pub fn manual_fire(&mut self) -> bool {
        if !(self.session.is_tracking() && self.in_fire_zone) {
            debug!("Manual fire ignored outside the fire zone");
            return false;
        }
        info!("Manual fire");
        self.commands.send(Command::manual_fire())
    }

    /// Queue a neutral command.
    pub fn center(&mut self) -> bool {
        self.commands.send(Command::neutral())
    }

    pub fn toggle_debug(&mut self) -> bool {
        self.debug = !self.debug;
        info!("Debug mode {}", if self.debug { "on" } else { "off" });
        self.debug
    }

    pub fn status(&self) -> LoopStatus {
        LoopStatus {
            algorithm: self.session.algorithm(),
            state: self.session.state(),
            bbox: self.session.bbox(),
            fps: self.fps.fps(),
            in_fire_zone: self.in_fire_zone,
            debug: self.debug,
            last_sequence: self.last_sequence,
            pending_commands: self.commands.pending(),
        }
    }

    /// Neutral the mount, wait for it to settle and stop dispatching.
    pub fn shutdown(mut self) -> Option<DispatchStats> {
        self.stop_tracking();
        thread::sleep(self.config.control.shutdown_settle());
        self.close()
    }

    /// Stop dispatching after the queued commands are written.
    pub(crate) fn close(&mut self) -> Option<DispatchStats> {
        self.commands.close()
    }

    fn disengage(&mut self) {
        self.pid.reset();
        self.armer.reset();
        self.in_fire_zone = false;
        self.commands.send(Command::neutral());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io;
    use std::sync::Mutex;

    use ndarray::Array3;

    use crate::actuator::{CommandSink, NullSink};
    use crate::tracker::{TrackerFailure, VisualTracker};

    #[derive(Clone, Default)]
    struct Lines(Arc<Mutex<Vec<String>>>);

    impl CommandSink for Lines {
        fn write_line(&mut self, line: &str) -> io::Result<()> {
            self.0.lock().unwrap().push(line.trim_end().to_string());
            Ok(())
        }
    }

    struct Scripted(VecDeque<Option<BoundingBox>>);

    impl VisualTracker for Scripted {
        fn init(&mut self, _frame: &Frame, _bbox: BoundingBox) -> std::result::Result<(), TrackerFailure> {
            Ok(())
        }

        fn update(&mut self, _frame: &Frame) -> Option<BoundingBox> {
            self.0.pop_front().flatten()
        }
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.pid.degrees_per_pixel_x = 1.0;
        config.pid.degrees_per_pixel_y = 1.0;
        config.control.shutdown_settle_ms = 0;
        config
    }

    fn control_loop(
        updates: Vec<Option<BoundingBox>>,
    ) -> (ControlLoop, Arc<FrameSlot>, Lines) {
        let slot = Arc::new(FrameSlot::new());
        let lines = Lines::default();
        let channel = CommandChannel::spawn(lines.clone(), Duration::from_millis(1)).unwrap();
        let factory = move |_: Algorithm| -> std::result::Result<Box<dyn VisualTracker>, TrackerFailure> {
            Ok(Box::new(Scripted(updates.clone().into())))
        };
        let control = ControlLoop::new(test_config(), Arc::clone(&slot), factory, channel).unwrap();
        (control, slot, lines)
    }

    fn frame_at(t0: Instant, ms: u64, sequence: u64) -> Frame {
        Frame::new(
            Array3::zeros((480, 640, 1)),
            t0 + Duration::from_millis(ms),
            sequence,
        )
    }

    /// A 20x20 box whose center is offset from the 640x480 frame center.
    fn offset_box(dx: f32, dy: f32) -> BoundingBox {
        BoundingBox::new(310.0 + dx, 230.0 + dy, 20.0, 20.0)
    }

    #[test]
    fn test_no_frame_and_idle() {
        let (mut control, slot, lines) = control_loop(vec![]);
        assert_eq!(control.step(), StepOutcome::NoFrame);

        slot.publish(Frame::blank(640, 480, 1, 1));
        assert_eq!(control.step(), StepOutcome::Idle);
        // Same frame again is not reprocessed
        assert_eq!(control.step(), StepOutcome::NoFrame);

        control.shutdown();
        assert_eq!(*lines.0.lock().unwrap(), vec!["+0.0:+0.0:0"]);
    }

    #[test]
    fn test_acquire_without_frame() {
        let (mut control, _slot, _lines) = control_loop(vec![]);
        let result = control.acquire(offset_box(0.0, 0.0));
        assert!(matches!(result, Err(Error::NoFrame)));
        assert_eq!(control.status().state, TrackState::Idle);
    }

    #[test]
    fn test_tracking_sends_one_command_per_frame() {
        let t0 = Instant::now();
        let (mut control, slot, lines) = control_loop(vec![
            Some(offset_box(100.0, 0.0)),
            Some(offset_box(100.0, 0.0)),
        ]);
        slot.publish(frame_at(t0, 0, 1));
        control.acquire(offset_box(0.0, 0.0)).unwrap();

        slot.publish(frame_at(t0, 33, 2));
        let StepOutcome::Tracked(sample) = control.step() else {
            panic!("expected a tracked frame");
        };
        assert_eq!(sample.error, Vector2::new(100.0, 0.0));
        assert_eq!(sample.command.to_line(), "+5.0:+0.0:0\n");
        assert!(!sample.zone.in_zone);

        // Repeated step on the same frame sends nothing
        assert_eq!(control.step(), StepOutcome::NoFrame);

        slot.publish(frame_at(t0, 66, 3));
        assert!(matches!(control.step(), StepOutcome::Tracked(_)));

        control.shutdown();
        // acquire neutral, two corrections, shutdown neutral
        assert_eq!(
            *lines.0.lock().unwrap(),
            vec!["+0.0:+0.0:0", "+5.0:+0.0:0", "+5.0:+0.0:0", "+0.0:+0.0:0"]
        );
    }

    #[test]
    fn test_loss_sends_single_neutral() {
        let t0 = Instant::now();
        let (mut control, slot, lines) = control_loop(vec![Some(offset_box(0.0, 0.0)), None]);
        slot.publish(frame_at(t0, 0, 1));
        control.acquire(offset_box(0.0, 0.0)).unwrap();

        slot.publish(frame_at(t0, 33, 2));
        assert!(matches!(control.step(), StepOutcome::Tracked(_)));
        assert!(control.status().in_fire_zone);

        slot.publish(frame_at(t0, 66, 3));
        assert_eq!(
            control.step(),
            StepOutcome::Lost {
                last_bbox: Some(offset_box(0.0, 0.0))
            }
        );
        let status = control.status();
        assert_eq!(status.state, TrackState::Lost);
        assert!(!status.in_fire_zone);
        assert_eq!(control.pid().state().history_len(), 0);

        for seq in 4..8 {
            slot.publish(frame_at(t0, 33 * seq, seq));
            assert_eq!(control.step(), StepOutcome::Idle);
        }

        let stats = control.close().unwrap();
        assert_eq!(stats.sent, 3);
        assert_eq!(
            *lines.0.lock().unwrap(),
            vec!["+0.0:+0.0:0", "+0.0:+0.0:0", "+0.0:+0.0:0"]
        );
    }

    #[test]
    fn test_fire_after_dwell_and_manual_fire() {
        let t0 = Instant::now();
        let centered = Some(offset_box(3.0, 4.0));
        let (mut control, slot, lines) = control_loop(vec![centered; 8]);
        slot.publish(frame_at(t0, 0, 1));

        assert!(!control.manual_fire());
        control.acquire(offset_box(3.0, 4.0)).unwrap();

        let mut fired = Vec::new();
        for (seq, ms) in [(2, 100), (3, 300), (4, 600), (5, 700)] {
            slot.publish(frame_at(t0, ms, seq));
            let StepOutcome::Tracked(sample) = control.step() else {
                panic!("expected a tracked frame");
            };
            assert!(sample.zone.in_zone);
            fired.push(sample.command.fire());
        }
        // Zone entered at 100 ms, dwell of 500 ms must be exceeded
        assert_eq!(fired, vec![false, false, false, true]);

        assert!(control.manual_fire());
        control.shutdown();
        let lines = lines.0.lock().unwrap();
        assert_eq!(lines[lines.len() - 2], "+0.0:+0.0:1");
    }

    #[test]
    fn test_switch_algorithm_cycles_and_keeps_lock() {
        let t0 = Instant::now();
        let (mut control, slot, _lines) = control_loop(vec![Some(offset_box(0.0, 0.0)); 4]);
        assert_eq!(control.switch_algorithm().unwrap(), Algorithm::Kcf);

        slot.publish(frame_at(t0, 0, 1));
        control.acquire(offset_box(0.0, 0.0)).unwrap();
        assert_eq!(control.switch_algorithm().unwrap(), Algorithm::Mil);
        assert_eq!(control.status().state, TrackState::Tracking);
        assert_eq!(control.status().algorithm, Algorithm::Mil);

        control.stop_tracking();
        assert_eq!(control.status().state, TrackState::Idle);
        assert_eq!(control.status().bbox, None);
    }

    #[test]
    fn test_switch_algorithm_resets_pid_and_dwell() {
        let t0 = Instant::now();
        let (mut control, slot, _lines) = control_loop(vec![Some(offset_box(3.0, 4.0)); 8]);
        slot.publish(frame_at(t0, 0, 1));
        control.acquire(offset_box(3.0, 4.0)).unwrap();

        let mut last = None;
        for (seq, ms) in [(2, 100), (3, 400), (4, 700)] {
            slot.publish(frame_at(t0, ms, seq));
            last = Some(control.step());
        }
        let Some(StepOutcome::Tracked(sample)) = last else {
            panic!("expected a tracked frame");
        };
        assert!(sample.command.fire());
        assert_eq!(control.pid().state().history_len(), 3);

        assert_eq!(control.switch_algorithm().unwrap(), Algorithm::Kcf);
        assert_eq!(control.pid().state().history_len(), 0);
        assert_eq!(control.pid().state().previous_error(), (0.0, 0.0));
        assert!(!control.status().in_fire_zone);

        // Still inside the zone, but the dwell starts over
        slot.publish(frame_at(t0, 800, 5));
        let StepOutcome::Tracked(sample) = control.step() else {
            panic!("expected a tracked frame");
        };
        assert!(sample.zone.in_zone);
        assert!(!sample.command.fire());
        assert_eq!(control.pid().state().history_len(), 1);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let factory = |_: Algorithm| -> std::result::Result<Box<dyn VisualTracker>, TrackerFailure> {
            Ok(Box::new(Scripted(VecDeque::new())))
        };

        let mut config = test_config();
        config.control.debug_every = 0;
        let channel = CommandChannel::spawn(NullSink, Duration::from_millis(1)).unwrap();
        let result = ControlLoop::new(config, Arc::new(FrameSlot::new()), factory, channel);
        assert!(matches!(result, Err(Error::InvalidConfig(_))));

        let mut config = test_config();
        config.fire_zone.dwell_secs = 1e20;
        let channel = CommandChannel::spawn(NullSink, Duration::from_millis(1)).unwrap();
        let result = ControlLoop::new(config, Arc::new(FrameSlot::new()), factory, channel);
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_toggle_debug() {
        let (mut control, _slot, _lines) = control_loop(vec![]);
        assert!(control.status().debug);
        assert!(!control.toggle_debug());
        assert!(control.toggle_debug());
    }
}
