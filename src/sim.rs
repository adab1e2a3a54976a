//! Synthetic camera and tracker for running the loop without hardware.
//!
//! [`MovingTarget`] renders a bright square drifting over a dark background
//! and [`CentroidTracker`] follows the brightest blob near its last position.

use std::thread;
use std::time::Duration;

use ndarray::{Array3, s};

use crate::capture::{CaptureDevice, DeviceFailure, Frame};
use crate::tracker::{Algorithm, BoundingBox, TrackerFailure, VisualTracker};

const BACKGROUND: u8 = 16;
const TARGET: u8 = 240;

/// Capture device showing one square target on a Lissajous path.
#[derive(Debug, Clone)]
pub struct MovingTarget {
    width: usize,
    height: usize,
    target_size: usize,
    interval: Duration,
    frames: u64,
}

impl MovingTarget {
    pub fn new(width: u32, height: u32) -> Self {
        let (width, height) = (width as usize, height as usize);
        Self {
            width,
            height,
            target_size: (width.min(height) / 12).max(4),
            interval: Duration::from_millis(33),
            frames: 0,
        }
    }

    /// Delay between frames; zero produces frames as fast as they are read.
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_target_size(mut self, size: usize) -> Self {
        self.target_size = size.max(1);
        self
    }

    pub fn target_size(&self) -> usize {
        self.target_size
    }

    /// Target center in the `frame`-th image, counting from zero.
    pub fn center_at(&self, frame: u64) -> (f32, f32) {
        let t = frame as f64 / 30.0;
        let (w, h) = (self.width as f64, self.height as f64);
        let cx = w / 2.0 + 0.25 * w * (0.5 * t).sin();
        let cy = h / 2.0 + 0.25 * h * (0.33 * t).sin();
        (cx as f32, cy as f32)
    }

    /// Draw the target centered at `center` (rows x columns x 3).
    pub fn render(&self, center: (f32, f32)) -> Array3<u8> {
        let mut image = Array3::from_elem((self.height, self.width, 3), BACKGROUND);
        let half = self.target_size as f32 / 2.0;
        let x0 = pixel(center.0 - half, self.width);
        let x1 = pixel(center.0 + half, self.width);
        let y0 = pixel(center.1 - half, self.height);
        let y1 = pixel(center.1 + half, self.height);
        if x0 < x1 && y0 < y1 {
            image.slice_mut(s![y0..y1, x0..x1, ..]).fill(TARGET);
        }
        image
    }
}

impl CaptureDevice for MovingTarget {
    fn grab(&mut self) -> Result<Option<Array3<u8>>, DeviceFailure> {
        if !self.interval.is_zero() {
            thread::sleep(self.interval);
        }
        let image = self.render(self.center_at(self.frames));
        self.frames += 1;
        Ok(Some(image))
    }
}

fn pixel(coord: f32, limit: usize) -> usize {
    (coord.round().max(0.0) as usize).min(limit)
}

/// Follows the centroid of bright pixels around the last known box.
#[derive(Debug, Clone)]
pub struct CentroidTracker {
    bbox: BoundingBox,
    threshold: u8,
    /// Search region grows by this fraction of the box size on every side
    search_margin: f32,
    min_pixels: usize,
}

impl CentroidTracker {
    pub fn new() -> Self {
        Self {
            bbox: BoundingBox::default(),
            threshold: 128,
            search_margin: 1.0,
            min_pixels: 4,
        }
    }

    pub fn with_threshold(mut self, threshold: u8) -> Self {
        self.threshold = threshold;
        self
    }

    fn centroid(&self, frame: &Frame, region: BoundingBox) -> Option<(f32, f32)> {
        let image = frame.image();
        let (rows, cols, _) = image.dim();
        let [x1, y1, x2, y2] = region.to_tlbr();
        let (c0, c1) = (pixel(x1.floor(), cols), pixel(x2.ceil(), cols));
        let (r0, r1) = (pixel(y1.floor(), rows), pixel(y2.ceil(), rows));
        if c0 >= c1 || r0 >= r1 {
            return None;
        }

        let (mut sum_x, mut sum_y, mut count) = (0.0f64, 0.0f64, 0usize);
        for ((r, c), &value) in image.slice(s![r0..r1, c0..c1, 0]).indexed_iter() {
            if value >= self.threshold {
                sum_x += (c0 + c) as f64 + 0.5;
                sum_y += (r0 + r) as f64 + 0.5;
                count += 1;
            }
        }

        (count >= self.min_pixels)
            .then(|| ((sum_x / count as f64) as f32, (sum_y / count as f64) as f32))
    }

    fn centered_on(&self, center: (f32, f32)) -> BoundingBox {
        BoundingBox::new(
            center.0 - self.bbox.width / 2.0,
            center.1 - self.bbox.height / 2.0,
            self.bbox.width,
            self.bbox.height,
        )
    }
}

impl Default for CentroidTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl VisualTracker for CentroidTracker {
    fn init(&mut self, frame: &Frame, bbox: BoundingBox) -> Result<(), TrackerFailure> {
        let center = self
            .centroid(frame, bbox)
            .ok_or("no bright target inside the selection")?;
        self.bbox = bbox;
        self.bbox = self.centered_on(center);
        Ok(())
    }

    fn update(&mut self, frame: &Frame) -> Option<BoundingBox> {
        let margin_x = self.bbox.width * self.search_margin;
        let margin_y = self.bbox.height * self.search_margin;
        let search = BoundingBox::new(
            self.bbox.x - margin_x,
            self.bbox.y - margin_y,
            self.bbox.width + 2.0 * margin_x,
            self.bbox.height + 2.0 * margin_y,
        );
        let center = self.centroid(frame, search)?;
        self.bbox = self.centered_on(center);
        Some(self.bbox)
    }
}

/// Factory handing out a [`CentroidTracker`] for every algorithm.
pub fn tracker_factory(_algorithm: Algorithm) -> Result<Box<dyn VisualTracker>, TrackerFailure> {
    Ok(Box::new(CentroidTracker::new()))
}
