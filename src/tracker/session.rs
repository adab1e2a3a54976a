//! Lifecycle of a single target lock.

use tracing::debug;

use crate::capture::Frame;
use crate::error::{Error, Result};
use crate::tracker::algorithm::{Algorithm, TrackerFactory, VisualTracker};
use crate::tracker::bbox::BoundingBox;
use crate::tracker::track_state::TrackState;

enum SessionState {
    Idle,
    Tracking {
        tracker: Box<dyn VisualTracker>,
        bbox: BoundingBox,
    },
    Lost {
        last_bbox: BoundingBox,
    },
}

/// Wraps one tracker instance and drives it through Idle, Tracking and Lost.
///
/// A tracker handle and a bounding box exist exactly while the session is
/// tracking. Lost sessions keep only the last box and are never recovered
/// automatically.
pub struct TrackerSession {
    factory: Box<dyn TrackerFactory>,
    algorithm: Algorithm,
    min_bbox_size: f32,
    state: SessionState,
}

impl TrackerSession {
    pub fn new(factory: impl TrackerFactory + 'static, algorithm: Algorithm, min_bbox_size: f32) -> Self {
        Self {
            factory: Box::new(factory),
            algorithm,
            min_bbox_size,
            state: SessionState::Idle,
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn state(&self) -> TrackState {
        match self.state {
            SessionState::Idle => TrackState::Idle,
            SessionState::Tracking { .. } => TrackState::Tracking,
            SessionState::Lost { .. } => TrackState::Lost,
        }
    }

    pub fn is_tracking(&self) -> bool {
        matches!(self.state, SessionState::Tracking { .. })
    }

    /// Current box while tracking, last known box once lost.
    pub fn bbox(&self) -> Option<BoundingBox> {
        match &self.state {
            SessionState::Idle => None,
            SessionState::Tracking { bbox, .. } => Some(*bbox),
            SessionState::Lost { last_bbox } => Some(*last_bbox),
        }
    }

    /// Lock onto the target inside `bbox`.
    ///
    /// Any existing lock is released first. The box is clamped to the frame
    /// and handed to a fresh tracker instance. On failure the session is Idle.
    pub fn acquire(&mut self, frame: &Frame, bbox: BoundingBox) -> Result<BoundingBox> {
        self.release();
        let clamped = bbox.clamp_to(frame.width(), frame.height(), self.min_bbox_size);
        let tracker = self.start_tracker(frame, clamped)?;
        debug!("{} locked on {:?}", self.algorithm, clamped);
        self.state = SessionState::Tracking {
            tracker,
            bbox: clamped,
        };
        Ok(clamped)
    }

    /// Advance the tracker by one frame.
    ///
    /// Returns the new box, [`Error::TrackingLost`] when the tracker gives up
    /// (the session is then Lost), or [`Error::NotTracking`].
    pub fn step(&mut self, frame: &Frame) -> Result<BoundingBox> {
        let SessionState::Tracking { tracker, bbox } = &mut self.state else {
            return Err(Error::NotTracking);
        };
        match tracker.update(frame) {
            Some(found) => {
                *bbox = found;
                Ok(found)
            }
            None => {
                let last_bbox = *bbox;
                self.state = SessionState::Lost { last_bbox };
                Err(Error::TrackingLost {
                    algorithm: self.algorithm.to_string(),
                })
            }
        }
    }

    /// Drop any lock and return to Idle. Returns the state that was left.
    pub fn release(&mut self) -> TrackState {
        let previous = self.state();
        self.state = SessionState::Idle;
        previous
    }

    /// Change the algorithm used by this session.
    ///
    /// While tracking, the last known box is re-acquired on an instance of the
    /// new algorithm using `frame`; if that fails the session is Idle. A lost
    /// session becomes Idle. An idle session only records the new algorithm.
    pub fn switch_algorithm(&mut self, algorithm: Algorithm, frame: Option<&Frame>) -> Result<()> {
        self.algorithm = algorithm;
        match std::mem::replace(&mut self.state, SessionState::Idle) {
            SessionState::Tracking { bbox, .. } => {
                let frame = frame.ok_or_else(|| {
                    Error::AcquisitionFailed(format!("no frame to re-initialize {algorithm}"))
                })?;
                let clamped = bbox.clamp_to(frame.width(), frame.height(), self.min_bbox_size);
                let tracker = self.start_tracker(frame, clamped)?;
                self.state = SessionState::Tracking {
                    tracker,
                    bbox: clamped,
                };
                Ok(())
            }
            SessionState::Idle | SessionState::Lost { .. } => Ok(()),
        }
    }

    fn start_tracker(&self, frame: &Frame, bbox: BoundingBox) -> Result<Box<dyn VisualTracker>> {
        let mut tracker = self.factory.create(self.algorithm).map_err(|e| {
            Error::AcquisitionFailed(format!("{} tracker unavailable: {e}", self.algorithm))
        })?;
        tracker.init(frame, bbox).map_err(|e| {
            Error::AcquisitionFailed(format!("{} rejected {bbox:?}: {e}", self.algorithm))
        })?;
        Ok(tracker)
    }
}
