//! Core frame types shared by the capture pipeline

use crate::errors::InvalidFrame;
use base64::Engine;
use chrono::{DateTime, Utc};
use image::{codecs::jpeg::JpegEncoder, DynamicImage, ExtendedColorType, ImageEncoder};
use serde::{Deserialize, Serialize};

/// Channel ordering of an 8-bit, 3-channel frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    Rgb8,
    Bgr8,
}

impl PixelFormat {
    /// Indices of the red, green and blue bytes within a pixel
    #[inline]
    pub fn rgb_offsets(self) -> (usize, usize, usize) {
        match self {
            PixelFormat::Rgb8 => (0, 1, 2),
            PixelFormat::Bgr8 => (2, 1, 0),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PixelFormat::Rgb8 => "RGB8",
            PixelFormat::Bgr8 => "BGR8",
        }
    }
}

/// Requested capture resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// 1280x720
    pub const fn hd() -> Self {
        Self::new(1280, 720)
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::hd()
    }
}

/// A captured frame. Immutable once handed to the frame mailbox.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub format: PixelFormat,
    pub data: Vec<u8>,
}

impl Frame {
    /// Create a 3-channel frame. The data length is checked when the frame
    /// is evaluated or encoded, not here.
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            sequence: 0,
            timestamp: Utc::now(),
            width,
            height,
            channels: 3,
            format,
            data,
        }
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// Build an RGB frame from a decoded image
    pub fn from_image(image: &DynamicImage) -> Self {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        Self::new(rgb.into_raw(), width, height, PixelFormat::Rgb8)
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Check dimensionality against the pixel buffer
    pub fn validate(&self) -> Result<(), InvalidFrame> {
        if self.width == 0 || self.height == 0 {
            return Err(InvalidFrame(format!(
                "zero-sized frame {}x{}",
                self.width, self.height
            )));
        }
        if self.channels != 3 {
            return Err(InvalidFrame(format!(
                "expected 3 channels, got {}",
                self.channels
            )));
        }
        let expected = self.pixel_count() * self.channels as usize;
        if self.data.len() != expected {
            return Err(InvalidFrame(format!(
                "buffer holds {} bytes, {}x{}x{} needs {}",
                self.data.len(),
                self.width,
                self.height,
                self.channels,
                expected
            )));
        }
        Ok(())
    }

    /// Pixel data in RGB order, copying only when the frame is BGR
    fn rgb_bytes(&self) -> std::borrow::Cow<'_, [u8]> {
        match self.format {
            PixelFormat::Rgb8 => std::borrow::Cow::Borrowed(&self.data),
            PixelFormat::Bgr8 => {
                let mut swapped = self.data.clone();
                for px in swapped.chunks_exact_mut(3) {
                    px.swap(0, 2);
                }
                std::borrow::Cow::Owned(swapped)
            }
        }
    }

    /// Encode as JPEG
    pub fn to_jpeg(&self, quality: u8) -> Result<Vec<u8>, InvalidFrame> {
        self.validate()?;
        let mut out = Vec::with_capacity(self.data.len() / 8);
        let encoder = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
        encoder
            .write_image(&self.rgb_bytes(), self.width, self.height, ExtendedColorType::Rgb8)
            .map_err(|e| InvalidFrame(format!("JPEG encoding failed: {}", e)))?;
        Ok(out)
    }

    /// Encode as a `data:image/jpeg;base64,...` URL for web display
    pub fn to_data_url(&self, quality: u8) -> Result<String, InvalidFrame> {
        let jpeg = self.to_jpeg(quality)?;
        Ok(format!(
            "data:image/jpeg;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(jpeg)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_short_buffer() {
        let frame = Frame::new(vec![0; 10], 4, 4, PixelFormat::Rgb8);
        assert!(frame.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_size() {
        let frame = Frame::new(Vec::new(), 0, 4, PixelFormat::Rgb8);
        let err = frame.validate().unwrap_err();
        assert!(err.0.contains("zero-sized"));
    }

    #[test]
    fn test_validate_rejects_wrong_channels() {
        let mut frame = Frame::new(vec![0; 16], 4, 4, PixelFormat::Rgb8);
        frame.channels = 1;
        assert!(frame.validate().is_err());
    }

    #[test]
    fn test_jpeg_encoding_produces_jpeg_magic() {
        let frame = Frame::new(vec![128; 16 * 16 * 3], 16, 16, PixelFormat::Bgr8);
        let jpeg = frame.to_jpeg(90).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_data_url_prefix() {
        let frame = Frame::new(vec![10; 8 * 8 * 3], 8, 8, PixelFormat::Rgb8);
        let url = frame.to_data_url(80).unwrap();
        assert!(url.starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn test_from_image_is_rgb() {
        let img = DynamicImage::new_rgb8(5, 3);
        let frame = Frame::from_image(&img);
        assert_eq!((frame.width, frame.height), (5, 3));
        assert_eq!(frame.format, PixelFormat::Rgb8);
        assert!(frame.validate().is_ok());
    }
}
