//! Single-slot, latest-wins hand-off between the capture thread and its readers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::frame::Frame;

#[derive(Debug, Default)]
struct SlotInner {
    frame: Option<Arc<Frame>>,
    /// Highest sequence number handed to a reader
    observed: u64,
    published: u64,
    dropped: u64,
}

/// Holds at most one frame: the most recent capture.
///
/// Publishing never waits for readers; a frame that is replaced before any
/// reader saw it is counted as dropped.
#[derive(Debug, Default)]
pub struct FrameSlot {
    inner: Mutex<SlotInner>,
    fresh: Condvar,
}

/// Capture statistics for a [`FrameSlot`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotStats {
    pub published: u64,
    pub dropped: u64,
    pub latest_sequence: Option<u64>,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the slot contents with `frame` and wake any waiting reader.
    pub fn publish(&self, frame: Frame) -> Arc<Frame> {
        let frame = Arc::new(frame);
        {
            let mut inner = self.inner.lock();
            if let Some(previous) = inner.frame.replace(Arc::clone(&frame)) {
                if previous.sequence() > inner.observed {
                    inner.dropped += 1;
                }
            }
            inner.published += 1;
        }
        self.fresh.notify_all();
        frame
    }

    /// Snapshot of the most recent frame, or `None` before the first capture.
    pub fn latest(&self) -> Option<Arc<Frame>> {
        let mut inner = self.inner.lock();
        let frame = inner.frame.clone()?;
        inner.observed = inner.observed.max(frame.sequence());
        Some(frame)
    }

    /// Wait up to `timeout` for a frame with a sequence number above `after`.
    pub fn wait_newer(&self, after: u64, timeout: Duration) -> Option<Arc<Frame>> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();
        loop {
            if let Some(frame) = inner.frame.clone() {
                if frame.sequence() > after {
                    inner.observed = inner.observed.max(frame.sequence());
                    return Some(frame);
                }
            }
            if self.fresh.wait_until(&mut inner, deadline).timed_out() {
                return None;
            }
        }
    }

    pub fn stats(&self) -> SlotStats {
        let inner = self.inner.lock();
        SlotStats {
            published: inner.published,
            dropped: inner.dropped,
            latest_sequence: inner.frame.as_ref().map(|f| f.sequence()),
        }
    }
}
