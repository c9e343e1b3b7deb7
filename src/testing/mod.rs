//! Testing utilities for studycam
//!
//! Synthetic frames with predictable quality scores, plus scripted fakes for
//! every collaborator so the pipeline can run without a camera or network.

pub mod fakes;
pub mod synthetic_data;

pub use fakes::{RecordingNotifier, RecordingSink, ScriptedBackend, ScriptedRead, StubAnalysisClient};
pub use synthetic_data::{checkerboard_frame, gradient_frame, sharp_hd_frame, uniform_frame};
