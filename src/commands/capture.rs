use super::config::{current_config, persist_current};
use crate::analysis::{AnalysisClient, AnalysisOutcome, HttpAnalysisClient};
use crate::config::StudyCamConfig;
use crate::errors::{AnalysisError, StudyCamError};
use crate::notify::{FanOut, LogBook, LogNotifier, Notice, Notifier};
use crate::pipeline::{
    AnalysisRecord, CaptureOutcome, CapturePhase, CaptureStats, Pipeline, PipelineParts,
    PreviewSink,
};
use crate::platform::{list_devices, DeviceInfo, NokhwaBackend};
use crate::quality::QualityReport;
use crate::types::Frame;
use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tauri::{command, AppHandle, Emitter, Runtime};

pub const PREVIEW_FRAME_EVENT: &str = "studycam://preview-frame";
pub const CAMERA_STATUS_EVENT: &str = "studycam://camera-status";
pub const NOTICE_EVENT: &str = "studycam://notice";

lazy_static::lazy_static! {
    static ref ACTIVE_PIPELINE: Arc<Mutex<Option<Arc<Pipeline>>>> = Arc::new(Mutex::new(None));
    static ref PIPELINE_START: tokio::sync::Mutex<()> = tokio::sync::Mutex::new(());
    static ref LOG_BOOK: Arc<LogBook> = Arc::new(LogBook::default());
    static ref ANALYSIS_CLIENT: Arc<ReloadableClient> = Arc::new(ReloadableClient::default());
}

/// Preview frame as delivered to the web view
#[derive(Debug, Clone, Serialize)]
pub struct PreviewFramePayload {
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub data_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CameraStatusPayload {
    pub connected: bool,
}

/// Result of a capture request, without waiting for the analysis
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CaptureResponse {
    NoFrame,
    Rejected { report: QualityReport },
    Failed { category: String, message: String },
    Submitted { report: QualityReport },
}

impl From<CaptureOutcome> for CaptureResponse {
    fn from(outcome: CaptureOutcome) -> Self {
        match outcome {
            CaptureOutcome::NoFrame => CaptureResponse::NoFrame,
            CaptureOutcome::Rejected(report) => CaptureResponse::Rejected { report },
            CaptureOutcome::Failed(error) => CaptureResponse::Failed {
                category: error.category().to_string(),
                message: error.to_string(),
            },
            // The task reports its own completion through notices
            CaptureOutcome::Submitted { report, .. } => CaptureResponse::Submitted { report },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatus {
    pub running: bool,
    pub device_index: Option<u32>,
    pub phase: Option<CapturePhase>,
    pub auto_capture: bool,
    pub interval_secs: u64,
    pub frames_captured: u64,
    pub dropped_frames: u64,
}

/// Admits one holder at a time without waiting
#[derive(Debug, Default, Clone)]
struct BusyFlag(Arc<AtomicBool>);

impl BusyFlag {
    fn try_claim(&self) -> Option<BusyClaim> {
        if self.0.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(BusyClaim(self.0.clone()))
        }
    }
}

/// Releases its [`BusyFlag`] on drop
struct BusyClaim(Arc<AtomicBool>);

impl Drop for BusyClaim {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct TauriPreviewSink<R: Runtime> {
    app: AppHandle<R>,
    jpeg_quality: u8,
    encoding: BusyFlag,
}

fn emit_preview_frame<R: Runtime>(app: &AppHandle<R>, frame: &Frame, jpeg_quality: u8) {
    let data_url = match frame.to_data_url(jpeg_quality) {
        Ok(url) => url,
        Err(e) => {
            log::warn!("Failed to encode preview frame: {}", e);
            return;
        }
    };
    let payload = PreviewFramePayload {
        sequence: frame.sequence,
        width: frame.width,
        height: frame.height,
        data_url,
    };
    if let Err(e) = app.emit(PREVIEW_FRAME_EVENT, payload) {
        log::debug!("Failed to emit preview frame: {}", e);
    }
}

impl<R: Runtime> PreviewSink for TauriPreviewSink<R> {
    /// Encodes on the blocking pool. Frames arriving while the previous
    /// one is still encoding are skipped.
    fn show_frame(&self, frame: &Frame) {
        let Some(claim) = self.encoding.try_claim() else {
            log::trace!("Preview encoder busy, skipping frame {}", frame.sequence);
            return;
        };

        let app = self.app.clone();
        let frame = frame.clone();
        let quality = self.jpeg_quality;
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn_blocking(move || {
                    let _claim = claim;
                    emit_preview_frame(&app, &frame, quality);
                });
            }
            Err(_) => emit_preview_frame(&app, &frame, quality),
        }
    }

    fn camera_status(&self, connected: bool) {
        if let Err(e) = self
            .app
            .emit(CAMERA_STATUS_EVENT, CameraStatusPayload { connected })
        {
            log::debug!("Failed to emit camera status: {}", e);
        }
    }
}

struct TauriNotifier<R: Runtime> {
    app: AppHandle<R>,
}

impl<R: Runtime> Notifier for TauriNotifier<R> {
    fn notify(&self, notice: &Notice) {
        if let Err(e) = self.app.emit(NOTICE_EVENT, notice.payload()) {
            log::debug!("Failed to emit notice: {}", e);
        }
    }
}

/// Analysis client whose settings can change while the pipeline runs
#[derive(Default)]
struct ReloadableClient {
    current: parking_lot::RwLock<Option<Arc<HttpAnalysisClient>>>,
}

impl ReloadableClient {
    fn reload(&self, config: &StudyCamConfig) -> Result<(), String> {
        let client = HttpAnalysisClient::new(config.http_client_config()).map_err(|e| e.to_string())?;
        *self.current.write() = Some(Arc::new(client));
        Ok(())
    }

    fn client(&self) -> Result<Arc<HttpAnalysisClient>, AnalysisError> {
        self.current
            .read()
            .clone()
            .ok_or(AnalysisError::MissingCredential)
    }
}

#[async_trait]
impl AnalysisClient for ReloadableClient {
    fn ready(&self) -> Result<(), AnalysisError> {
        self.client()?.ready()
    }

    async fn analyze(&self, jpeg: Bytes) -> Result<AnalysisOutcome, AnalysisError> {
        let client = self.client()?;
        client.analyze(jpeg).await
    }
}

/// Start a pipeline into `slot` unless one is already running.
///
/// `gate` serializes concurrent starts so only one device open is in
/// flight. A pipeline is never dropped while `slot` is locked.
async fn install_pipeline<F>(
    slot: &Mutex<Option<Arc<Pipeline>>>,
    gate: &tokio::sync::Mutex<()>,
    start: F,
) -> Result<(), String>
where
    F: FnOnce() -> Result<Pipeline, StudyCamError> + Send + 'static,
{
    let _starting = gate.lock().await;

    let occupied = slot.lock().map_err(|e| e.to_string())?.is_some();
    if occupied {
        return Err("Camera is already running".to_string());
    }

    // Opening the device blocks until the driver answers
    let pipeline = tokio::task::spawn_blocking(start)
        .await
        .map_err(|e| format!("Task join error: {}", e))?
        .map_err(|e| e.to_string())?;
    let pipeline = Arc::new(pipeline);

    let loser = {
        let mut guard = slot.lock().map_err(|e| e.to_string())?;
        if guard.is_some() {
            Some(pipeline)
        } else {
            *guard = Some(pipeline);
            None
        }
    };

    if let Some(pipeline) = loser {
        tokio::task::spawn_blocking(move || pipeline.stop())
            .await
            .map_err(|e| format!("Task join error: {}", e))?;
        return Err("Camera is already running".to_string());
    }
    Ok(())
}

fn active_pipeline() -> Result<Option<Arc<Pipeline>>, String> {
    let guard = ACTIVE_PIPELINE.lock().map_err(|e| e.to_string())?;
    Ok(guard.clone())
}

fn require_pipeline() -> Result<Arc<Pipeline>, String> {
    active_pipeline()?.ok_or_else(|| "Camera is not running".to_string())
}

/// Push a saved configuration into the running pipeline
pub(crate) fn apply_config(config: &StudyCamConfig) -> Result<(), String> {
    ANALYSIS_CLIENT.reload(config)?;

    if let Some(pipeline) = active_pipeline()? {
        let orchestrator = pipeline.orchestrator();
        orchestrator
            .update_settings(config.capture_settings())
            .map_err(|e| e.to_string())?;
        if orchestrator.auto_capture_enabled() != config.capture.auto_capture
            || orchestrator.auto_interval() != config.capture_interval()
        {
            orchestrator.set_auto_capture(config.capture.auto_capture, config.capture_interval());
        }
        log::info!("Applied updated configuration to running pipeline");
    }
    Ok(())
}

/// List cameras visible to the system
#[command]
pub async fn list_cameras() -> Result<Vec<DeviceInfo>, String> {
    tokio::task::spawn_blocking(list_devices)
        .await
        .map_err(|e| format!("Task join error: {}", e))?
        .map_err(|e| e.to_string())
}

/// Open the camera and start preview and capture
#[command]
pub async fn start_pipeline<R: Runtime>(
    app: AppHandle<R>,
    device_index: Option<u32>,
) -> Result<(), String> {
    if active_pipeline()?.is_some() {
        return Err("Camera is already running".to_string());
    }

    let mut config = current_config()?;
    if let Some(index) = device_index {
        config.camera.device_index = index;
    }
    ANALYSIS_CLIENT.reload(&config)?;

    let notifier: Arc<dyn Notifier> = Arc::new(
        FanOut::new()
            .with(Arc::new(LogNotifier))
            .with(LOG_BOOK.clone())
            .with(Arc::new(TauriNotifier { app: app.clone() })),
    );
    let parts = PipelineParts {
        backend: Arc::new(NokhwaBackend),
        client: ANALYSIS_CLIENT.clone(),
        sink: Arc::new(TauriPreviewSink {
            app,
            jpeg_quality: config.preview.jpeg_quality,
            encoding: BusyFlag::default(),
        }),
        notifier,
    };

    let runtime = tokio::runtime::Handle::current();
    let pipeline_config = config.pipeline_config();
    install_pipeline(&ACTIVE_PIPELINE, &PIPELINE_START, move || {
        Pipeline::start(parts, pipeline_config, runtime)
    })
    .await
}

/// Cancel auto-capture, stop the preview, release the camera and save
/// the configuration
#[command]
pub async fn stop_pipeline() -> Result<(), String> {
    let pipeline = {
        let mut guard = ACTIVE_PIPELINE.lock().map_err(|e| e.to_string())?;
        guard.take()
    };

    if let Some(pipeline) = pipeline {
        tokio::task::spawn_blocking(move || pipeline.stop())
            .await
            .map_err(|e| format!("Task join error: {}", e))?;
    }

    persist_current()
}

/// Capture the current frame now
#[command]
pub async fn capture_now() -> Result<CaptureResponse, String> {
    let pipeline = require_pipeline()?;
    // Quality evaluation is CPU bound
    let outcome = tokio::task::spawn_blocking(move || pipeline.orchestrator().capture_now())
        .await
        .map_err(|e| format!("Task join error: {}", e))?
        .map_err(|e| e.to_string())?;
    Ok(outcome.into())
}

/// Toggle auto-capture. `interval` is the raw text typed by the user;
/// returns the interval actually applied in seconds.
#[command]
pub async fn set_auto_capture(enabled: bool, interval: String) -> Result<u64, String> {
    let pipeline = require_pipeline()?;
    let applied = pipeline
        .orchestrator()
        .set_auto_capture_text(enabled, &interval);

    let mut config = current_config()?;
    config.capture.auto_capture = enabled;
    config.capture.interval_secs = applied.secs();
    super::config::store_config(config)?;

    Ok(applied.secs())
}

/// Most recent successful analysis
#[command]
pub async fn get_latest_result() -> Result<Option<AnalysisRecord>, String> {
    Ok(active_pipeline()?
        .and_then(|p| p.orchestrator().latest())
        .map(|record| (*record).clone()))
}

#[command]
pub async fn get_capture_stats() -> Result<CaptureStats, String> {
    Ok(require_pipeline()?.orchestrator().stats())
}

#[command]
pub async fn get_pipeline_status() -> Result<PipelineStatus, String> {
    let config = current_config()?;
    let status = match active_pipeline()? {
        Some(pipeline) => {
            let orchestrator = pipeline.orchestrator();
            PipelineStatus {
                running: pipeline.is_running(),
                device_index: Some(pipeline.source().device_index()),
                phase: Some(orchestrator.phase()),
                auto_capture: orchestrator.auto_capture_enabled(),
                interval_secs: orchestrator.auto_interval().secs(),
                frames_captured: pipeline.source().frames_captured(),
                dropped_frames: pipeline.mailbox().dropped(),
            }
        }
        None => PipelineStatus {
            running: false,
            device_index: None,
            phase: None,
            auto_capture: false,
            interval_secs: config.capture.interval_secs,
            frames_captured: 0,
            dropped_frames: 0,
        },
    };
    Ok(status)
}

/// Last timestamped log lines, oldest first
#[command]
pub async fn get_log_lines() -> Result<Vec<String>, String> {
    Ok(LOG_BOOK.lines())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineConfig;
    use crate::testing::{
        RecordingNotifier, RecordingSink, ScriptedBackend, ScriptedRead, StubAnalysisClient,
    };

    #[test]
    fn test_capture_response_serialization() {
        let report = QualityReport {
            passed: false,
            sharpness: 10.0,
            brightness: 120.0,
        };
        let json = serde_json::to_value(CaptureResponse::from(CaptureOutcome::Rejected(report))).unwrap();
        assert_eq!(json["status"], "rejected");
        assert_eq!(json["report"]["sharpness"], 10.0);

        let json = serde_json::to_value(CaptureResponse::from(CaptureOutcome::Failed(
            AnalysisError::MissingCredential,
        )))
        .unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["category"], "unauthorized");
    }

    #[test]
    fn test_reloadable_client_without_config_is_not_ready() {
        let client = ReloadableClient::default();
        assert_eq!(client.ready(), Err(AnalysisError::MissingCredential));

        let mut config = StudyCamConfig::default();
        config.analysis.api_key = "secret".to_string();
        client.reload(&config).unwrap();
        assert!(client.ready().is_ok());
    }

    fn scripted_start(
        backend: Arc<ScriptedBackend>,
    ) -> impl FnOnce() -> Result<Pipeline, StudyCamError> + Send + 'static {
        let runtime = tokio::runtime::Handle::current();
        move || {
            let parts = PipelineParts {
                backend,
                client: Arc::new(StubAnalysisClient::succeeding(serde_json::json!({}))),
                sink: Arc::new(RecordingSink::default()),
                notifier: Arc::new(RecordingNotifier::default()),
            };
            Pipeline::start(parts, PipelineConfig::default(), runtime)
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_starts_open_one_camera() {
        let slot = Mutex::new(None);
        let gate = tokio::sync::Mutex::new(());
        let backend = Arc::new(ScriptedBackend::new(vec![ScriptedRead::Sharp]).repeat_last());

        let (first, second) = tokio::join!(
            install_pipeline(&slot, &gate, scripted_start(backend.clone())),
            install_pipeline(&slot, &gate, scripted_start(backend.clone())),
        );

        assert_eq!(
            [first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count(),
            1
        );
        assert_eq!(backend.opens(), 1);

        let pipeline = slot.lock().unwrap().take().unwrap();
        assert!(pipeline.is_running());
        pipeline.stop();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_start_rejected_while_running() {
        let slot = Mutex::new(None);
        let gate = tokio::sync::Mutex::new(());
        let backend = Arc::new(ScriptedBackend::new(vec![ScriptedRead::Sharp]).repeat_last());

        install_pipeline(&slot, &gate, scripted_start(backend.clone()))
            .await
            .unwrap();
        let err = install_pipeline(&slot, &gate, scripted_start(backend.clone()))
            .await
            .unwrap_err();
        assert_eq!(err, "Camera is already running");
        assert_eq!(backend.opens(), 1);

        // A failed open leaves the slot empty
        let failing = install_pipeline(
            &Mutex::new(None),
            &gate,
            scripted_start(Arc::new(ScriptedBackend::failing_open())),
        )
        .await;
        assert!(failing.is_err());

        if let Some(pipeline) = slot.lock().unwrap().take() {
            pipeline.stop();
        }
    }

    #[test]
    fn test_busy_flag_admits_one_holder() {
        let flag = BusyFlag::default();
        let claim = flag.try_claim();
        assert!(claim.is_some());
        assert!(flag.clone().try_claim().is_none());

        drop(claim);
        assert!(flag.try_claim().is_some());
    }

    #[tokio::test]
    async fn test_capture_without_pipeline_fails() {
        assert!(capture_now().await.is_err());
        assert!(get_latest_result().await.unwrap().is_none());
    }
}
