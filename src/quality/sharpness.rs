use crate::types::Frame;

/// Convert to 8-bit luma using BT.601 weights, honoring channel order.
///
/// The frame must already be validated.
pub fn grayscale(frame: &Frame) -> Vec<u8> {
    let (r, g, b) = frame.format.rgb_offsets();
    frame
        .data
        .chunks_exact(3)
        .map(|px| {
            let y = 0.299 * px[r] as f64 + 0.587 * px[g] as f64 + 0.114 * px[b] as f64;
            y.round().clamp(0.0, 255.0) as u8
        })
        .collect()
}

/// Mirror an out-of-range index back into `0..len` without repeating the
/// edge sample (`-1 -> 1`, `len -> len - 2`).
#[inline]
fn reflect101(index: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let last = len as isize - 1;
    let mirrored = if index < 0 {
        -index
    } else if index > last {
        2 * last - index
    } else {
        index
    };
    mirrored as usize
}

/// Population variance of the 4-neighbour Laplacian over every pixel of a
/// `width x height` luma plane. Higher means sharper; no upper bound.
pub fn laplacian_variance(gray: &[u8], width: usize, height: usize) -> f64 {
    let count = width * height;
    if count == 0 || gray.len() != count {
        return 0.0;
    }

    // Integer laplacian keeps the sums exact and the result deterministic.
    let mut sum: i64 = 0;
    let mut sum_sq: i64 = 0;
    for y in 0..height {
        let up = reflect101(y as isize - 1, height) * width;
        let down = reflect101(y as isize + 1, height) * width;
        let row = y * width;
        for x in 0..width {
            let left = reflect101(x as isize - 1, width);
            let right = reflect101(x as isize + 1, width);
            let center = gray[row + x] as i64;
            let lap = gray[up + x] as i64
                + gray[down + x] as i64
                + gray[row + left] as i64
                + gray[row + right] as i64
                - 4 * center;
            sum += lap;
            sum_sq += lap * lap;
        }
    }

    let n = count as f64;
    let mean = sum as f64 / n;
    (sum_sq as f64 / n - mean * mean).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PixelFormat;

    #[test]
    fn test_reflect101() {
        assert_eq!(reflect101(-1, 5), 1);
        assert_eq!(reflect101(5, 5), 3);
        assert_eq!(reflect101(2, 5), 2);
        assert_eq!(reflect101(-1, 1), 0);
        assert_eq!(reflect101(1, 1), 0);
    }

    #[test]
    fn test_flat_plane_has_zero_variance() {
        let gray = vec![77u8; 10 * 6];
        assert_eq!(laplacian_variance(&gray, 10, 6), 0.0);
    }

    #[test]
    fn test_single_bright_pixel() {
        // 3x3 plane with one bright centre pixel. The centre gets -40; each
        // edge-adjacent neighbour sees the centre twice through the
        // mirrored border and gets +20; corners stay 0.
        let mut gray = vec![0u8; 9];
        gray[4] = 10;
        let var = laplacian_variance(&gray, 3, 3);
        let mean = 40.0 / 9.0;
        let expected = 3200.0 / 9.0 - mean * mean;
        assert!((var - expected).abs() < 1e-9);
    }

    #[test]
    fn test_grayscale_respects_channel_order() {
        let rgb = Frame::new(vec![255, 0, 0], 1, 1, PixelFormat::Rgb8);
        let bgr = Frame::new(vec![255, 0, 0], 1, 1, PixelFormat::Bgr8);
        assert_eq!(grayscale(&rgb), vec![76]);
        assert_eq!(grayscale(&bgr), vec![29]);
    }

    #[test]
    fn test_edges_are_sharper_than_flat() {
        let mut gray = vec![0u8; 16 * 16];
        for y in 0..16 {
            for x in 8..16 {
                gray[y * 16 + x] = 200;
            }
        }
        assert!(laplacian_variance(&gray, 16, 16) > 100.0);
    }
}
