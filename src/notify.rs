//! Status notifications
//!
//! Every component reports what happened through a [`Notifier`]. A notice is
//! a timestamped [`PipelineEvent`]; the event carries the structured reason
//! (scores, error category) and renders a human-readable line.

use crate::errors::{AnalysisError, DeviceError, ScheduleConfigError};
use crate::pipeline::{AnalysisRecord, CaptureTrigger};
use crate::quality::QualityReport;
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

/// Something the user should hear about
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    CameraStarted { index: u32, width: u32, height: u32 },
    CameraOpenFailed(DeviceError),
    CameraStopped,
    CameraConnected,
    CameraDisconnected,
    DeviceDegraded { consecutive_failures: u32, last_error: String },
    DeviceRecovered { after_failures: u32 },
    NoFrame { trigger: CaptureTrigger },
    InvalidFrame { trigger: CaptureTrigger, reason: String },
    CaptureRejected { trigger: CaptureTrigger, report: QualityReport },
    AnalysisSubmitted { trigger: CaptureTrigger, report: QualityReport },
    AnalysisCompleted(AnalysisRecord),
    AnalysisFailed { trigger: CaptureTrigger, error: AnalysisError },
    AutoCaptureEnabled { interval_secs: u64 },
    AutoCaptureDisabled,
    IntervalAdjusted(ScheduleConfigError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// How a front end should surface a notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Presentation {
    LogOnly,
    Dialog,
}

impl PipelineEvent {
    pub fn severity(&self) -> Severity {
        match self {
            PipelineEvent::CameraOpenFailed(_) | PipelineEvent::AnalysisFailed { .. } => {
                Severity::Error
            }
            PipelineEvent::CameraDisconnected
            | PipelineEvent::DeviceDegraded { .. }
            | PipelineEvent::NoFrame { .. }
            | PipelineEvent::InvalidFrame { .. }
            | PipelineEvent::CaptureRejected { .. }
            | PipelineEvent::IntervalAdjusted(_) => Severity::Warning,
            _ => Severity::Info,
        }
    }

    /// Capture-triggered outcomes get a dialog, everything else is logged
    pub fn presentation(&self) -> Presentation {
        match self {
            PipelineEvent::NoFrame { .. }
            | PipelineEvent::InvalidFrame { .. }
            | PipelineEvent::CaptureRejected { .. }
            | PipelineEvent::AnalysisCompleted(_)
            | PipelineEvent::AnalysisFailed { .. } => Presentation::Dialog,
            _ => Presentation::LogOnly,
        }
    }

    /// Machine-readable category for front ends
    pub fn category(&self) -> &'static str {
        match self {
            PipelineEvent::CameraStarted { .. }
            | PipelineEvent::CameraOpenFailed(_)
            | PipelineEvent::CameraStopped => "camera",
            PipelineEvent::CameraConnected | PipelineEvent::CameraDisconnected => "camera_status",
            PipelineEvent::DeviceDegraded { .. } | PipelineEvent::DeviceRecovered { .. } => {
                "device_health"
            }
            PipelineEvent::NoFrame { .. } => "no_frame",
            PipelineEvent::InvalidFrame { .. } => "invalid_frame",
            PipelineEvent::CaptureRejected { .. } => "quality_rejected",
            PipelineEvent::AnalysisSubmitted { .. } => "analysis_submitted",
            PipelineEvent::AnalysisCompleted(_) => "analysis_completed",
            PipelineEvent::AnalysisFailed { error, .. } => match error {
                AnalysisError::Network(_) => "analysis_network",
                AnalysisError::Timeout(_) => "analysis_timeout",
                AnalysisError::Unauthorized(_) | AnalysisError::MissingCredential => {
                    "analysis_unauthorized"
                }
                AnalysisError::MalformedResponse(_) => "analysis_malformed_response",
                AnalysisError::Encoding(_) => "analysis_encoding",
            },
            PipelineEvent::AutoCaptureEnabled { .. } | PipelineEvent::AutoCaptureDisabled => {
                "auto_capture"
            }
            PipelineEvent::IntervalAdjusted(_) => "schedule_config",
        }
    }
}

impl fmt::Display for PipelineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineEvent::CameraStarted { index, width, height } => {
                write!(f, "Camera {} started at {}x{}", index, width, height)
            }
            PipelineEvent::CameraOpenFailed(e) => write!(f, "Camera initialization failed: {}", e),
            PipelineEvent::CameraStopped => write!(f, "Camera stopped"),
            PipelineEvent::CameraConnected => write!(f, "Camera connected"),
            PipelineEvent::CameraDisconnected => write!(f, "Camera not connected"),
            PipelineEvent::DeviceDegraded {
                consecutive_failures,
                last_error,
            } => write!(
                f,
                "Camera is failing to deliver frames ({} consecutive failures, last: {})",
                consecutive_failures, last_error
            ),
            PipelineEvent::DeviceRecovered { after_failures } => {
                write!(f, "Camera recovered after {} failed reads", after_failures)
            }
            PipelineEvent::NoFrame { trigger } => {
                write!(f, "{} capture: no frame available yet", trigger)
            }
            PipelineEvent::InvalidFrame { trigger, reason } => {
                write!(f, "{} capture: frame could not be evaluated ({})", trigger, reason)
            }
            PipelineEvent::CaptureRejected { trigger, report } => write!(
                f,
                "{} capture rejected: image quality too low (sharpness {:.1}, brightness {:.1}), please retake",
                trigger, report.sharpness, report.brightness
            ),
            PipelineEvent::AnalysisSubmitted { trigger, report } => write!(
                f,
                "{} capture accepted (sharpness {:.1}, brightness {:.1}), analyzing",
                trigger, report.sharpness, report.brightness
            ),
            PipelineEvent::AnalysisCompleted(record) => write!(
                f,
                "Analysis #{} complete: {}",
                record.version,
                record.outcome.material_type()
            ),
            PipelineEvent::AnalysisFailed { trigger, error } => write!(
                f,
                "{} capture analysis failed ({}): {}",
                trigger,
                error.category(),
                error
            ),
            PipelineEvent::AutoCaptureEnabled { interval_secs } => {
                write!(f, "Auto capture enabled every {}s", interval_secs)
            }
            PipelineEvent::AutoCaptureDisabled => write!(f, "Auto capture disabled"),
            PipelineEvent::IntervalAdjusted(e) => write!(f, "{}", e),
        }
    }
}

/// A timestamped event
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub at: DateTime<Local>,
    pub event: PipelineEvent,
}

impl Notice {
    pub fn now(event: PipelineEvent) -> Self {
        Self {
            at: Local::now(),
            event,
        }
    }

    /// `[HH:MM:SS] message`
    pub fn line(&self) -> String {
        format!("[{}] {}", self.at.format("%H:%M:%S"), self.event)
    }

    pub fn payload(&self) -> NoticePayload {
        NoticePayload {
            timestamp: self.at.to_rfc3339(),
            line: self.line(),
            category: self.event.category(),
            severity: self.event.severity(),
            presentation: self.event.presentation(),
        }
    }
}

/// Serializable form of a notice for front ends
#[derive(Debug, Clone, Serialize)]
pub struct NoticePayload {
    pub timestamp: String,
    pub line: String,
    pub category: &'static str,
    pub severity: Severity,
    pub presentation: Presentation,
}

/// Receives status notices. Must be cheap and must not block.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: &Notice);
}

/// Convenience for emitting an event stamped with the current time
pub fn emit(notifier: &dyn Notifier, event: PipelineEvent) {
    notifier.notify(&Notice::now(event));
}

/// Forwards notices to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: &Notice) {
        match notice.event.severity() {
            Severity::Info => log::info!("{}", notice.event),
            Severity::Warning => log::warn!("{}", notice.event),
            Severity::Error => log::error!("{}", notice.event),
        }
    }
}

/// Bounded history of rendered notice lines, oldest dropped first
pub struct LogBook {
    lines: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl LogBook {
    pub const DEFAULT_CAPACITY: usize = 100;

    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }
}

impl Default for LogBook {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl Notifier for LogBook {
    fn notify(&self, notice: &Notice) {
        let mut lines = self.lines.lock();
        if lines.len() >= self.capacity {
            lines.pop_front();
        }
        lines.push_back(notice.line());
    }
}

/// Delivers each notice to several notifiers in order
#[derive(Default, Clone)]
pub struct FanOut {
    targets: Vec<Arc<dyn Notifier>>,
}

impl FanOut {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, target: Arc<dyn Notifier>) -> Self {
        self.targets.push(target);
        self
    }
}

impl Notifier for FanOut {
    fn notify(&self, notice: &Notice) {
        for target in &self.targets {
            target.notify(notice);
        }
    }
}
