//! Frame quality gating
//!
//! Decides whether a captured frame is worth sending for remote analysis.
//! Sharpness is the variance of the Laplacian of the grayscale frame and
//! brightness is the mean of the HSV value channel.
pub mod brightness;
pub mod evaluator;
pub mod sharpness;

pub use brightness::mean_value_brightness;
pub use evaluator::{evaluate, evaluate_image, evaluate_with, QualityReport, QualityThresholds};
pub use sharpness::{grayscale, laplacian_variance};
