use std::time::Instant;

/// Frame rate measured over fixed-size batches of frames.
///
/// The rate is refreshed once every `window` frames, so a single slow frame
/// does not make the reading jump.
#[derive(Debug, Clone)]
pub struct FpsMeter {
    window: u64,
    count: u64,
    mark: Option<Instant>,
    fps: f64,
}

impl FpsMeter {
    pub const DEFAULT_WINDOW: u64 = 30;

    pub fn new(window: u64) -> Self {
        Self {
            window: window.max(1),
            count: 0,
            mark: None,
            fps: 0.0,
        }
    }

    /// Count a frame captured at `now`. Returns the new rate when it was refreshed.
    pub fn tick(&mut self, now: Instant) -> Option<f64> {
        let Some(mark) = self.mark else {
            self.mark = Some(now);
            return None;
        };

        self.count += 1;
        if self.count < self.window {
            return None;
        }

        let elapsed = now.saturating_duration_since(mark).as_secs_f64();
        self.count = 0;
        self.mark = Some(now);
        if elapsed > 0.0 {
            self.fps = self.window as f64 / elapsed;
            Some(self.fps)
        } else {
            None
        }
    }

    /// Last measured rate, zero until the first full window.
    pub fn fps(&self) -> f64 {
        self.fps
    }
}

impl Default for FpsMeter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WINDOW)
    }
}
