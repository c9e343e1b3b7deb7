use super::brightness::mean_value_brightness;
use super::sharpness::{grayscale, laplacian_variance};
use crate::errors::InvalidFrame;
use crate::types::Frame;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Gate thresholds. The defaults are working values, not calibrated
/// constants; every deployment can override them through the config.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityThresholds {
    pub min_sharpness: f64,
    pub min_brightness: f64,
    pub max_brightness: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            min_sharpness: 100.0,
            min_brightness: 50.0,
            max_brightness: 200.0,
        }
    }
}

impl QualityThresholds {
    pub fn validate(&self) -> Result<(), String> {
        let values = [self.min_sharpness, self.min_brightness, self.max_brightness];
        if values.iter().any(|v| !v.is_finite()) {
            return Err("Quality thresholds must be finite numbers".to_string());
        }
        if self.min_sharpness < 0.0 {
            return Err("Minimum sharpness must not be negative".to_string());
        }
        if !(0.0..=255.0).contains(&self.min_brightness)
            || !(0.0..=255.0).contains(&self.max_brightness)
        {
            return Err("Brightness bounds must be between 0 and 255".to_string());
        }
        if self.min_brightness > self.max_brightness {
            return Err("Minimum brightness exceeds maximum brightness".to_string());
        }
        Ok(())
    }
}

/// Result of one quality evaluation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub passed: bool,
    pub sharpness: f64,
    pub brightness: f64,
}

/// Evaluate a frame against the given thresholds.
///
/// Pure and deterministic: the same frame always yields the same report.
pub fn evaluate(frame: &Frame, thresholds: &QualityThresholds) -> Result<QualityReport, InvalidFrame> {
    frame.validate()?;

    let gray = grayscale(frame);
    let sharpness = laplacian_variance(&gray, frame.width as usize, frame.height as usize);
    let brightness = mean_value_brightness(frame);

    let passed = sharpness >= thresholds.min_sharpness
        && thresholds.min_brightness <= brightness
        && brightness <= thresholds.max_brightness;

    log::debug!(
        "Quality of frame #{}: sharpness={:.2} brightness={:.2} passed={}",
        frame.sequence,
        sharpness,
        brightness,
        passed
    );

    Ok(QualityReport {
        passed,
        sharpness,
        brightness,
    })
}

/// Same as [`evaluate`] with the thresholds spelled out
pub fn evaluate_with(
    frame: &Frame,
    min_sharpness: f64,
    min_brightness: f64,
    max_brightness: f64,
) -> Result<QualityReport, InvalidFrame> {
    evaluate(
        frame,
        &QualityThresholds {
            min_sharpness,
            min_brightness,
            max_brightness,
        },
    )
}

/// Evaluate a decoded still image, e.g. one loaded from disk
pub fn evaluate_image(
    image: &DynamicImage,
    thresholds: &QualityThresholds,
) -> Result<QualityReport, InvalidFrame> {
    evaluate(&Frame::from_image(image), thresholds)
}
