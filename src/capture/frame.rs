use std::time::Instant;

use ndarray::{Array3, ArrayView3, Axis};

/// A captured image with its capture time and sequence number.
///
/// The image is laid out as rows x columns x channels. Frames are shared
/// read-only once published.
#[derive(Debug, Clone)]
pub struct Frame {
    image: Array3<u8>,
    timestamp: Instant,
    sequence: u64,
}

impl Frame {
    pub fn new(image: Array3<u8>, timestamp: Instant, sequence: u64) -> Self {
        Self {
            image,
            timestamp,
            sequence,
        }
    }

    /// A black frame, mostly useful for tests and idle displays.
    pub fn blank(width: u32, height: u32, channels: usize, sequence: u64) -> Self {
        Self::new(
            Array3::zeros((height as usize, width as usize, channels)),
            Instant::now(),
            sequence,
        )
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.image.dim().1 as u32
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.image.dim().0 as u32
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.image.dim().2
    }

    pub fn image(&self) -> ArrayView3<'_, u8> {
        self.image.view()
    }

    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    /// Monotonically increasing capture counter, starting at 1.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

/// Clockwise rotation applied to frames as they leave the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    None,
    Clockwise90,
    Half,
    CounterClockwise90,
}

impl Rotation {
    /// Map 0/90/180/270 degrees clockwise to a rotation.
    pub fn from_degrees(degrees: u16) -> Option<Self> {
        match degrees {
            0 => Some(Rotation::None),
            90 => Some(Rotation::Clockwise90),
            180 => Some(Rotation::Half),
            270 => Some(Rotation::CounterClockwise90),
            _ => None,
        }
    }

    pub fn apply(self, image: Array3<u8>) -> Array3<u8> {
        if self == Rotation::None {
            return image;
        }
        let mut view = image.view();
        match self {
            Rotation::None => {}
            Rotation::Clockwise90 => {
                view.swap_axes(0, 1);
                view.invert_axis(Axis(1));
            }
            Rotation::Half => {
                view.invert_axis(Axis(0));
                view.invert_axis(Axis(1));
            }
            Rotation::CounterClockwise90 => {
                view.swap_axes(0, 1);
                view.invert_axis(Axis(0));
            }
        }
        view.as_standard_layout().into_owned()
    }
}
