//! Frame acquisition and quality-gated capture
//!
//! ```text
//! FrameSource ──put──▶ FrameMailbox ──try_get──▶ PreviewRefresher ─▶ PreviewSink
//!                                  └─try_get──▶ CaptureOrchestrator ─▶ AnalysisClient
//! ```
//!
//! [`Pipeline`] wires the pieces together and tears them down in order.

pub mod mailbox;
pub mod orchestrator;
pub mod preview;
pub mod results;
pub mod schedule;
pub mod source;

pub use mailbox::FrameMailbox;
pub use orchestrator::{
    CaptureOrchestrator, CaptureOutcome, CapturePhase, CaptureSettings, CaptureStats,
    CaptureTrigger,
};
pub use preview::{ConnectionTracker, PreviewConfig, PreviewHandle, PreviewRefresher, PreviewSink};
pub use results::{AnalysisRecord, CompletedAnalysis, ResultStore};
pub use schedule::{CaptureInterval, CaptureSchedule};
pub use source::{FrameSource, FrameSourceConfig, FrameSourceHandle};

use crate::analysis::AnalysisClient;
use crate::errors::StudyCamError;
use crate::notify::Notifier;
use crate::platform::DeviceBackend;
use std::sync::Arc;
use tokio::runtime::Handle;

/// Everything needed to start a [`Pipeline`]
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub source: FrameSourceConfig,
    pub preview: PreviewConfig,
    pub capture: CaptureSettings,
    pub auto_interval: CaptureInterval,
    pub auto_capture: bool,
}

/// Collaborators supplied by the host
pub struct PipelineParts {
    pub backend: Arc<dyn DeviceBackend>,
    pub client: Arc<dyn AnalysisClient>,
    pub sink: Arc<dyn PreviewSink>,
    pub notifier: Arc<dyn Notifier>,
}

/// A running camera pipeline
pub struct Pipeline {
    mailbox: Arc<FrameMailbox>,
    source: FrameSourceHandle,
    preview: PreviewHandle,
    orchestrator: CaptureOrchestrator,
}

impl Pipeline {
    /// Open the camera and start preview and capture.
    ///
    /// Fails synchronously if the device cannot be opened; nothing is left
    /// running in that case.
    pub fn start(
        parts: PipelineParts,
        config: PipelineConfig,
        runtime: Handle,
    ) -> Result<Self, StudyCamError> {
        config.capture.validate()?;

        let mailbox = Arc::new(FrameMailbox::new());
        let source = FrameSource::start(
            parts.backend,
            config.source,
            mailbox.clone(),
            parts.notifier.clone(),
        )?;

        let preview = PreviewRefresher::spawn(
            &runtime,
            mailbox.clone(),
            parts.sink,
            parts.notifier.clone(),
            config.preview,
        );

        let orchestrator = CaptureOrchestrator::new(
            mailbox.clone(),
            parts.client,
            parts.notifier,
            config.capture,
            runtime,
        );
        orchestrator.set_auto_capture(config.auto_capture, config.auto_interval);

        log::info!("Pipeline started on camera {}", source.device_index());
        Ok(Self {
            mailbox,
            source,
            preview,
            orchestrator,
        })
    }

    pub fn orchestrator(&self) -> &CaptureOrchestrator {
        &self.orchestrator
    }

    pub fn source(&self) -> &FrameSourceHandle {
        &self.source
    }

    pub fn mailbox(&self) -> &Arc<FrameMailbox> {
        &self.mailbox
    }

    pub fn preview(&self) -> &PreviewHandle {
        &self.preview
    }

    pub fn is_running(&self) -> bool {
        self.source.is_running()
    }

    /// Cancel auto-capture, stop the preview, then release the camera.
    /// Idempotent.
    pub fn stop(&self) {
        self.orchestrator.shutdown();
        self.preview.stop();
        self.source.stop();
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.stop();
    }
}
