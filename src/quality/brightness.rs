use crate::types::Frame;

/// Mean of the HSV value channel, i.e. the mean over pixels of
/// `max(R, G, B)`. Always within `[0, 255]`.
///
/// The frame must already be validated.
pub fn mean_value_brightness(frame: &Frame) -> f64 {
    let pixels = frame.pixel_count();
    if pixels == 0 {
        return 0.0;
    }
    let total: u64 = frame
        .data
        .chunks_exact(3)
        .map(|px| px[0].max(px[1]).max(px[2]) as u64)
        .sum();
    total as f64 / pixels as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PixelFormat;

    #[test]
    fn test_uniform_frame_brightness() {
        let frame = Frame::new(vec![120; 4 * 4 * 3], 4, 4, PixelFormat::Rgb8);
        assert_eq!(mean_value_brightness(&frame), 120.0);
    }

    #[test]
    fn test_value_uses_max_channel() {
        // One pure-red pixel and one black pixel
        let frame = Frame::new(vec![255, 0, 0, 0, 0, 0], 2, 1, PixelFormat::Rgb8);
        assert_eq!(mean_value_brightness(&frame), 127.5);
    }

    #[test]
    fn test_channel_order_does_not_matter() {
        let data = vec![10, 200, 30, 90, 5, 60];
        let rgb = Frame::new(data.clone(), 2, 1, PixelFormat::Rgb8);
        let bgr = Frame::new(data, 2, 1, PixelFormat::Bgr8);
        assert_eq!(mean_value_brightness(&rgb), mean_value_brightness(&bgr));
    }
}
