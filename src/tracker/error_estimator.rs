//! Pixel error between the tracked target and the frame center.

use nalgebra::Vector2;

use crate::tracker::BoundingBox;

/// Offset of the bbox center from the frame center, in pixels.
///
/// Positive x means the target is right of center, positive y means below.
pub fn pixel_error(bbox: &BoundingBox, frame_width: u32, frame_height: u32) -> Vector2<f64> {
    let (cx, cy) = bbox.center();
    let target = Vector2::new(f64::from(cx), f64::from(cy));
    let center = Vector2::new(f64::from(frame_width) / 2.0, f64::from(frame_height) / 2.0);
    target - center
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centered_target_has_zero_error() {
        let bbox = BoundingBox::new(40.0, 40.0, 20.0, 20.0);
        assert_eq!(pixel_error(&bbox, 100, 100), Vector2::new(0.0, 0.0));
    }

    #[test]
    fn test_error_sign_convention() {
        // Center at (85, 15) in a 100x100 frame
        let bbox = BoundingBox::new(80.0, 10.0, 10.0, 10.0);
        let error = pixel_error(&bbox, 100, 100);
        assert_eq!(error.x, 35.0);
        assert_eq!(error.y, -35.0);
    }

    #[test]
    fn test_odd_frame_dimensions() {
        let bbox = BoundingBox::new(0.0, 0.0, 2.0, 2.0);
        let error = pixel_error(&bbox, 1921, 1081);
        assert_eq!(error, Vector2::new(1.0 - 960.5, 1.0 - 540.5));
    }
}
