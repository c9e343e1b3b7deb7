//! studycam: quality-gated camera capture for Tauri applications
//!
//! A continuously running camera feeds a single-slot frame mailbox. A
//! preview task shows the freshest frame, and a capture orchestrator
//! (manual or on a timer) takes a frame, checks sharpness and brightness,
//! and only sends frames that pass to a remote analysis service.
//!
//! # Usage
//! Add this to your `Cargo.toml`:
//! ```toml
//! [dependencies]
//! studycam = "0.1"
//! tauri = { version = "2.0", features = ["protocol-asset"] }
//! ```
//!
//! Then in your Tauri app:
//! ```rust,ignore
//! fn main() {
//!     tauri::Builder::default()
//!         .plugin(studycam::init())
//!         .run(tauri::generate_context!())
//!         .expect("error while running tauri application");
//! }
//! ```
//!
//! The frontend listens for `studycam://preview-frame`,
//! `studycam://camera-status` and `studycam://notice` events.
pub mod analysis;
pub mod commands;
pub mod config;
pub mod errors;
pub mod notify;
pub mod pipeline;
pub mod platform;
pub mod quality;
pub mod types;

// Testing utilities - synthetic frames and fakes for offline testing
pub mod testing;

// Re-exports for convenience
pub use analysis::{AnalysisClient, AnalysisOutcome, HttpAnalysisClient};
pub use config::StudyCamConfig;
pub use errors::{AnalysisError, DeviceError, InvalidFrame, StudyCamError};
pub use notify::{Notice, Notifier, PipelineEvent};
pub use pipeline::{
    CaptureOrchestrator, CaptureOutcome, FrameMailbox, Pipeline, PipelineConfig, PipelineParts,
};
pub use quality::{evaluate, QualityReport, QualityThresholds};
pub use types::{Frame, PixelFormat, Resolution};

use tauri::{
    plugin::{Builder, TauriPlugin},
    Runtime,
};

/// Initialize the studycam plugin with all commands
pub fn init<R: Runtime>() -> TauriPlugin<R> {
    Builder::new("studycam")
        .invoke_handler(tauri::generate_handler![
            // Camera and capture commands
            commands::capture::list_cameras,
            commands::capture::start_pipeline,
            commands::capture::stop_pipeline,
            commands::capture::capture_now,
            commands::capture::set_auto_capture,
            commands::capture::get_latest_result,
            commands::capture::get_capture_stats,
            commands::capture::get_pipeline_status,
            commands::capture::get_log_lines,
            // Configuration commands
            commands::config::get_config,
            commands::config::update_config,
            commands::config::reset_config,
            commands::config::update_api_settings,
            commands::config::get_quality_config,
            commands::config::update_quality_config,
        ])
        .build()
}

/// Initialize logging, defaulting to `studycam=info`
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "studycam=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
