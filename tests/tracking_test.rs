use std::collections::VecDeque;
use std::io;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::unbounded;
use ndarray::Array3;

use pantilt_rs::actuator::CommandSink;
use pantilt_rs::capture::{DeviceFailure, FrameSlot};
use pantilt_rs::config::CaptureConfig;
use pantilt_rs::sim::{self, MovingTarget};
use pantilt_rs::{
    Algorithm, BoundingBox, CommandChannel, Config, ControlEvent, ControlLoop, Error, Frame,
    StepOutcome, TrackState, TrackerFailure, TrackingSystem, VisualTracker,
};

#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<String>>>);

impl Recorder {
    fn lines(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl CommandSink for Recorder {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.0.lock().unwrap().push(line.to_string());
        Ok(())
    }
}

/// Tracker that replays a fixed list of update results.
struct Replay(VecDeque<Option<BoundingBox>>);

impl VisualTracker for Replay {
    fn init(&mut self, _frame: &Frame, _bbox: BoundingBox) -> Result<(), TrackerFailure> {
        Ok(())
    }

    fn update(&mut self, _frame: &Frame) -> Option<BoundingBox> {
        self.0.pop_front().flatten()
    }
}

fn quiet_config(width: u32, height: u32) -> Config {
    let mut config = Config::default();
    config.capture.width = width;
    config.capture.height = height;
    config.actuator.tick_ms = 1;
    config.control.shutdown_settle_ms = 0;
    config.control.frame_wait_ms = 20;
    config
}

#[test]
fn test_lock_track_lose_and_shutdown_command_stream() {
    let mut config = quiet_config(640, 480);
    config.pid.degrees_per_pixel_x = 1.0;
    config.pid.degrees_per_pixel_y = 1.0;

    let right_of_center = BoundingBox::new(410.0, 230.0, 20.0, 20.0);
    let slot = Arc::new(FrameSlot::new());
    let recorder = Recorder::default();
    let channel = CommandChannel::spawn(recorder.clone(), Duration::from_millis(1)).unwrap();
    let factory = move |_: Algorithm| -> Result<Box<dyn VisualTracker>, TrackerFailure> {
        Ok(Box::new(Replay(VecDeque::from(vec![Some(right_of_center), None]))))
    };
    let mut control = ControlLoop::new(config, Arc::clone(&slot), factory, channel).unwrap();

    let t0 = Instant::now();
    let frame = |ms: u64, seq: u64| Frame::new(Array3::zeros((480, 640, 1)), t0 + Duration::from_millis(ms), seq);

    slot.publish(frame(0, 1));
    control.acquire(BoundingBox::new(300.0, 220.0, 40.0, 40.0)).unwrap();

    slot.publish(frame(33, 2));
    assert!(matches!(control.step(), StepOutcome::Tracked(_)));

    slot.publish(frame(66, 3));
    assert!(matches!(control.step(), StepOutcome::Lost { .. }));
    for seq in 4..10 {
        slot.publish(frame(33 * seq, seq));
        assert_eq!(control.step(), StepOutcome::Idle);
    }

    control.shutdown();
    assert_eq!(
        recorder.lines(),
        vec![
            "+0.0:+0.0:0\n", // released before acquiring
            "+5.0:+0.0:0\n", // clamped correction toward the target
            "+0.0:+0.0:0\n", // single neutral on loss
            "+0.0:+0.0:0\n", // shutdown
        ]
    );
}

#[test]
fn test_synthetic_target_is_followed_to_the_fire_zone() {
    let mut config = quiet_config(320, 240);
    // The target starts centered and stays inside the zone for roughly 100 ms
    config.fire_zone.dwell_secs = 0.03;

    let recorder = Recorder::default();
    let opener = |c: &CaptureConfig| -> Result<MovingTarget, DeviceFailure> {
        Ok(MovingTarget::new(c.width, c.height).with_frame_interval(Duration::from_millis(5)))
    };
    let mut system = TrackingSystem::start(config, opener, sim::tracker_factory, recorder.clone()).unwrap();

    while system.capture_stats().published == 0 {
        thread::sleep(Duration::from_millis(1));
    }

    let (tx, rx) = unbounded();
    // Target is 20x20 and starts centered; select around it
    tx.send(ControlEvent::Select {
        start: (140.0, 100.0),
        end: (180.0, 140.0),
    })
    .unwrap();

    let stop = Arc::new(AtomicBool::new(false));
    let quitter = thread::spawn(move || {
        thread::sleep(Duration::from_millis(400));
        tx.send(ControlEvent::Quit).unwrap();
    });
    let summary = system.run(&rx, &stop);
    quitter.join().unwrap();

    assert!(summary.tracked > 10, "only {} tracked frames", summary.tracked);
    assert_eq!(summary.lost, 0);
    assert_eq!(system.status().state, TrackState::Tracking);

    let stats = system.shutdown().unwrap();
    assert_eq!(stats.failed, 0);

    let lines = recorder.lines();
    assert_eq!(lines.first().map(String::as_str), Some("+0.0:+0.0:0\n"));
    assert_eq!(lines.last().map(String::as_str), Some("+0.0:+0.0:0\n"));
    assert!(lines.iter().any(|l| l.ends_with(":1\n")), "never fired");
    for line in &lines {
        let fields: Vec<&str> = line.trim_end().split(':').collect();
        assert_eq!(fields.len(), 3, "malformed line {line:?}");
        for angle in &fields[..2] {
            let value: f64 = angle.parse().unwrap();
            assert!((-5.0..=5.0).contains(&value));
        }
    }
}

#[test]
fn test_selection_without_target_stays_idle() {
    let config = quiet_config(320, 240);
    let opener = |c: &CaptureConfig| -> Result<MovingTarget, DeviceFailure> {
        Ok(MovingTarget::new(c.width, c.height).with_frame_interval(Duration::from_millis(5)))
    };
    let mut system = TrackingSystem::start(config, opener, sim::tracker_factory, Recorder::default()).unwrap();
    while system.capture_stats().published == 0 {
        thread::sleep(Duration::from_millis(1));
    }

    // A corner click holds no target pixels
    system.handle_event(ControlEvent::Select {
        start: (5.0, 5.0),
        end: (5.0, 5.0),
    });
    assert_eq!(system.status().state, TrackState::Idle);

    let result = system.control_mut().acquire(BoundingBox::new(0.0, 0.0, 30.0, 30.0));
    assert!(matches!(result, Err(Error::AcquisitionFailed(_))));
    system.shutdown();
}
