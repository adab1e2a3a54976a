use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in pixel coordinates (TLWH format).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Top-left x coordinate
    pub x: f32,
    /// Top-left y coordinate
    pub y: f32,
    /// Width of the bounding box
    pub width: f32,
    /// Height of the bounding box
    pub height: f32,
}

/// Selections smaller than this on both axes count as a click.
const CLICK_TOLERANCE: f32 = 5.0;

impl BoundingBox {
    /// Create a new box from top-left coordinates and dimensions.
    #[inline]
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a box from TLBR format (top-left x, top-left y, bottom-right x, bottom-right y).
    #[inline]
    pub fn from_tlbr(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
        }
    }

    /// Build a box from a drag selection between two pixel positions.
    ///
    /// The corners may be given in any order. A selection smaller than a few
    /// pixels on both axes is treated as a click: a `click_size` square is
    /// centered on `end`.
    pub fn from_drag(start: (f32, f32), end: (f32, f32), click_size: f32) -> Self {
        let x1 = start.0.min(end.0);
        let y1 = start.1.min(end.1);
        let x2 = start.0.max(end.0);
        let y2 = start.1.max(end.1);

        if x2 - x1 < CLICK_TOLERANCE && y2 - y1 < CLICK_TOLERANCE {
            let half = (click_size / 2.0).floor();
            return Self::new(end.0 - half, end.1 - half, click_size, click_size);
        }
        Self::from_tlbr(x1, y1, x2, y2)
    }

    /// Convert to TLBR format: (x1, y1, x2, y2).
    #[inline]
    pub fn to_tlbr(&self) -> [f32; 4] {
        [self.x, self.y, self.x + self.width, self.y + self.height]
    }

    /// Get the center point of the bounding box.
    #[inline]
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Get the area of the bounding box.
    #[inline]
    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// Clamp the box so it lies inside a `frame_width` x `frame_height` frame.
    ///
    /// The origin is pulled into the frame, the size is limited to what is left
    /// of the frame and floored at `min_size`. If the floor pushes the box past
    /// the right or bottom edge, the box is shifted back inside.
    pub fn clamp_to(&self, frame_width: u32, frame_height: u32, min_size: f32) -> Self {
        let (x, width) = clamp_axis(self.x, self.width, frame_width as f32, min_size);
        let (y, height) = clamp_axis(self.y, self.height, frame_height as f32, min_size);
        Self::new(x, y, width, height)
    }

    /// Whether the box lies entirely inside the frame.
    pub fn is_within(&self, frame_width: u32, frame_height: u32) -> bool {
        let [x1, y1, x2, y2] = self.to_tlbr();
        x1 >= 0.0 && y1 >= 0.0 && x2 <= frame_width as f32 && y2 <= frame_height as f32
    }
}

fn clamp_axis(origin: f32, size: f32, limit: f32, min_size: f32) -> (f32, f32) {
    let origin = if origin.is_nan() { 0.0 } else { origin };
    let origin = origin.min(limit - 1.0).max(0.0);
    let size = if size.is_nan() { 0.0 } else { size };
    let floor = min_size.min(limit).max(1.0);
    let size = size.min(limit - origin).max(floor);
    let origin = if origin + size > limit {
        (limit - size).max(0.0)
    } else {
        origin
    };
    (origin, size)
}
