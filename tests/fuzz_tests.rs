//! Fuzz-style tests using proptest
//!
//! These provide fuzz-like testing without requiring nightly Rust or cargo-fuzz.
//! Run with: cargo test --test fuzz_tests

use proptest::prelude::*;
use studycam::errors::ScheduleConfigError;
use studycam::pipeline::CaptureInterval;
use studycam::quality::{evaluate, evaluate_with, QualityThresholds};
use studycam::testing::{checkerboard_frame, uniform_frame};
use studycam::types::{Frame, PixelFormat};

fn arb_frame() -> impl Strategy<Value = Frame> {
    (1u32..24, 1u32..24, any::<bool>()).prop_flat_map(|(w, h, bgr)| {
        prop::collection::vec(any::<u8>(), (w * h * 3) as usize).prop_map(move |data| {
            let format = if bgr { PixelFormat::Bgr8 } else { PixelFormat::Rgb8 };
            Frame::new(data, w, h, format)
        })
    })
}

mod quality_fuzz {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        /// Scores stay in range for any well-formed frame
        #[test]
        fn fuzz_scores_in_range(frame in arb_frame()) {
            let report = evaluate(&frame, &QualityThresholds::default()).unwrap();
            prop_assert!(report.sharpness >= 0.0);
            prop_assert!(report.sharpness.is_finite());
            prop_assert!((0.0..=255.0).contains(&report.brightness));
        }

        /// The same frame always yields the same report
        #[test]
        fn fuzz_evaluation_is_deterministic(frame in arb_frame()) {
            let thresholds = QualityThresholds::default();
            let first = evaluate(&frame, &thresholds).unwrap();
            let second = evaluate(&frame.clone(), &thresholds).unwrap();
            prop_assert_eq!(first, second);
        }

        /// The pass flag is exactly the threshold predicate
        #[test]
        fn fuzz_pass_matches_thresholds(
            frame in arb_frame(),
            min_sharpness in 0.0f64..5000.0,
            low in 0.0f64..255.0,
            span in 0.0f64..255.0,
        ) {
            let high = (low + span).min(255.0);
            let report = evaluate_with(&frame, min_sharpness, low, high).unwrap();
            let expected = report.sharpness >= min_sharpness
                && report.brightness >= low
                && report.brightness <= high;
            prop_assert_eq!(report.passed, expected);
        }

        /// Brightness outside the band fails no matter how sharp
        #[test]
        fn fuzz_dark_frames_always_fail(value in 0u8..50, size in 2u32..32) {
            let report = evaluate(&uniform_frame(size, size, value), &QualityThresholds::default()).unwrap();
            prop_assert!(!report.passed);
            prop_assert_eq!(report.sharpness, 0.0);
            prop_assert_eq!(report.brightness, value as f64);
        }

        /// Checkerboards with an even cell count have midpoint brightness
        #[test]
        fn fuzz_checkerboard_brightness(cell in 1u32..6, cells in 1u32..5, low in 0u8..128, high in 128u8..=255) {
            let side = cell * cells * 2;
            let report = evaluate(
                &checkerboard_frame(side, side, cell, low, high),
                &QualityThresholds::default(),
            ).unwrap();
            let midpoint = (low as f64 + high as f64) / 2.0;
            prop_assert!((report.brightness - midpoint).abs() < 1e-9);
        }

        /// Wrong buffer lengths are rejected, never evaluated
        #[test]
        fn fuzz_mismatched_length_rejected(w in 1u32..32, h in 1u32..32, delta in 1usize..16) {
            let len = (w * h * 3) as usize + delta;
            let frame = Frame::new(vec![0; len], w, h, PixelFormat::Rgb8);
            prop_assert!(evaluate(&frame, &QualityThresholds::default()).is_err());
        }
    }
}

mod interval_fuzz {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(512))]

        /// Any integer input lands inside the valid range
        #[test]
        fn fuzz_parsed_interval_in_range(value in any::<i64>(), previous in 1u64..=3600) {
            let previous = CaptureInterval::from_secs(previous).unwrap();
            let (interval, _) = CaptureInterval::parse(&value.to_string(), previous);
            prop_assert!((CaptureInterval::MIN_SECS..=CaptureInterval::MAX_SECS).contains(&interval.secs()));
        }

        /// In-range input is taken verbatim with no adjustment
        #[test]
        fn fuzz_in_range_is_exact(secs in 1u64..=3600) {
            let (interval, adjusted) = CaptureInterval::parse(&secs.to_string(), CaptureInterval::default());
            prop_assert_eq!(interval.secs(), secs);
            prop_assert!(adjusted.is_none());
        }

        /// Huge digit strings clamp to the maximum instead of failing
        #[test]
        fn fuzz_overflow_clamps(digits in "[1-9][0-9]{20,40}") {
            let (interval, adjusted) = CaptureInterval::parse(&digits, CaptureInterval::default());
            prop_assert_eq!(interval.secs(), CaptureInterval::MAX_SECS);
            let clamped_to_max = matches!(adjusted, Some(ScheduleConfigError::AboveMaximum { .. }));
            prop_assert!(clamped_to_max);
        }

        /// Non-numeric text keeps the previous interval
        #[test]
        fn fuzz_text_keeps_previous(text in "[a-zA-Z ,.]{1,12}", previous in 1u64..=3600) {
            let previous = CaptureInterval::from_secs(previous).unwrap();
            let (interval, adjusted) = CaptureInterval::parse(&text, previous);
            prop_assert_eq!(interval, previous);
            let kept = matches!(adjusted, Some(ScheduleConfigError::NotNumeric { .. }));
            prop_assert!(kept);
        }
    }
}
