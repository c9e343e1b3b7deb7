//! Synthetic frames with known quality scores
//!
//! All generators produce gray RGB8 frames (R = G = B), so brightness is
//! simply the mean pixel value.

use crate::types::{Frame, PixelFormat};

/// A frame where every pixel is `value`. Sharpness is exactly zero.
pub fn uniform_frame(width: u32, height: u32, value: u8) -> Frame {
    let data = vec![value; (width * height * 3) as usize];
    Frame::new(data, width, height, PixelFormat::Rgb8)
}

/// Alternating `cell`-sized squares of `low` and `high`.
///
/// With an even number of cells per side the brightness is exactly the
/// midpoint of `low` and `high`; the hard edges give a large sharpness.
pub fn checkerboard_frame(width: u32, height: u32, cell: u32, low: u8, high: u8) -> Frame {
    let cell = cell.max(1);
    let mut data = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            let value = if ((x / cell) + (y / cell)) % 2 == 0 {
                low
            } else {
                high
            };
            data.extend_from_slice(&[value, value, value]);
        }
    }
    Frame::new(data, width, height, PixelFormat::Rgb8)
}

/// Smooth left-to-right ramp from 0 to 255. Low sharpness, mid brightness.
pub fn gradient_frame(width: u32, height: u32) -> Frame {
    let mut data = Vec::with_capacity((width * height * 3) as usize);
    let span = width.saturating_sub(1).max(1);
    for _ in 0..height {
        for x in 0..width {
            let value = ((x * 255) / span) as u8;
            data.extend_from_slice(&[value, value, value]);
        }
    }
    Frame::new(data, width, height, PixelFormat::Rgb8)
}

/// A sharp frame at roughly 720p, like a real webcam would deliver
pub fn sharp_hd_frame(sequence: u64) -> Frame {
    checkerboard_frame(1280, 720, 40, 30, 210).with_sequence(sequence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::{laplacian_variance, mean_value_brightness, grayscale};

    #[test]
    fn test_uniform_has_zero_sharpness() {
        let frame = uniform_frame(16, 16, 77);
        let gray = grayscale(&frame);
        assert_eq!(laplacian_variance(&gray, 16, 16), 0.0);
        assert_eq!(mean_value_brightness(&frame), 77.0);
    }

    #[test]
    fn test_checkerboard_brightness_is_midpoint() {
        let frame = checkerboard_frame(64, 64, 8, 0, 240);
        assert_eq!(mean_value_brightness(&frame), 120.0);
        let gray = grayscale(&frame);
        assert!(laplacian_variance(&gray, 64, 64) > 1000.0);
    }

    #[test]
    fn test_gradient_spans_full_range() {
        let frame = gradient_frame(256, 2);
        assert_eq!(frame.data[0], 0);
        assert_eq!(frame.data[255 * 3], 255);
        assert!(frame.validate().is_ok());
    }

    #[test]
    fn test_sharp_hd_frame_dimensions() {
        let frame = sharp_hd_frame(4);
        assert_eq!((frame.width, frame.height), (1280, 720));
        assert_eq!(frame.sequence, 4);
    }
}
