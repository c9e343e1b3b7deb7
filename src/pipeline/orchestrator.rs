use super::mailbox::FrameMailbox;
use super::results::{AnalysisRecord, CompletedAnalysis, ResultStore};
use super::schedule::{CaptureInterval, CaptureSchedule};
use crate::analysis::{AnalysisClient, AnalysisOutcome};
use crate::errors::{AnalysisError, ConfigError, InvalidFrame};
use crate::notify::{emit, Notifier, PipelineEvent};
use crate::quality::{self, QualityReport, QualityThresholds};
use crate::types::Frame;
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// What started a capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureTrigger {
    Manual,
    Scheduled,
}

impl fmt::Display for CaptureTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureTrigger::Manual => write!(f, "Manual"),
            CaptureTrigger::Scheduled => write!(f, "Auto"),
        }
    }
}

/// Capture state machine.
///
/// `Idle -> Capturing -> Evaluating -> {Rejected -> Idle |
/// Submitting -> AwaitingResult -> {Completed | Failed} -> Idle}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CapturePhase {
    Idle,
    Capturing,
    Evaluating,
    Rejected,
    Submitting,
    AwaitingResult,
    Completed,
    Failed,
}

/// Result of one capture attempt, as seen by the caller.
///
/// `Submitted` only means the frame was handed to an analysis task; the
/// task itself reports completion or failure through the notifier.
#[derive(Debug)]
pub enum CaptureOutcome {
    NoFrame,
    Rejected(QualityReport),
    /// A precondition failed before anything was submitted
    Failed(AnalysisError),
    Submitted {
        report: QualityReport,
        task: JoinHandle<Result<Arc<AnalysisRecord>, AnalysisError>>,
    },
}

/// Tunables read once per capture
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSettings {
    pub thresholds: QualityThresholds,
    pub analysis_timeout: Duration,
    pub jpeg_quality: u8,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            thresholds: QualityThresholds::default(),
            analysis_timeout: Duration::from_secs(15),
            jpeg_quality: 85,
        }
    }
}

impl CaptureSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.thresholds.validate().map_err(ConfigError::Invalid)?;
        if self.analysis_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "analysis timeout must be greater than zero".to_string(),
            ));
        }
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(ConfigError::Invalid(format!(
                "jpeg quality must be within 1..=100, got {}",
                self.jpeg_quality
            )));
        }
        Ok(())
    }
}

/// Snapshot of capture counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CaptureStats {
    pub attempts: u64,
    pub no_frame: u64,
    pub invalid: u64,
    pub rejected: u64,
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    attempts: AtomicU64,
    no_frame: AtomicU64,
    invalid: AtomicU64,
    rejected: AtomicU64,
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CaptureStats {
        CaptureStats {
            attempts: self.attempts.load(Ordering::Relaxed),
            no_frame: self.no_frame.load(Ordering::Relaxed),
            invalid: self.invalid.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

struct Inner {
    mailbox: Arc<FrameMailbox>,
    client: Arc<dyn AnalysisClient>,
    notifier: Arc<dyn Notifier>,
    results: Arc<ResultStore>,
    runtime: Handle,
    settings: RwLock<CaptureSettings>,
    phase: Mutex<CapturePhase>,
    schedule: Mutex<CaptureSchedule>,
    stats: Counters,
}

impl Inner {
    fn set_phase(&self, phase: CapturePhase) {
        let mut current = self.phase.lock();
        if *current != phase {
            log::debug!("Capture phase {:?} -> {:?}", *current, phase);
            *current = phase;
        }
    }

    /// Terminal phase, then back to idle
    fn finish(&self, phase: CapturePhase) {
        self.set_phase(phase);
        self.set_phase(CapturePhase::Idle);
    }

    fn notify(&self, event: PipelineEvent) {
        emit(self.notifier.as_ref(), event);
    }
}

/// Manual and scheduled capture-evaluate-submit.
///
/// Cheap to clone; clones drive the same orchestrator.
#[derive(Clone)]
pub struct CaptureOrchestrator {
    inner: Arc<Inner>,
}

impl CaptureOrchestrator {
    /// Analysis and schedule tasks are spawned on `runtime`
    pub fn new(
        mailbox: Arc<FrameMailbox>,
        client: Arc<dyn AnalysisClient>,
        notifier: Arc<dyn Notifier>,
        settings: CaptureSettings,
        runtime: Handle,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                mailbox,
                client,
                notifier,
                results: Arc::new(ResultStore::new()),
                runtime,
                settings: RwLock::new(settings),
                phase: Mutex::new(CapturePhase::Idle),
                schedule: Mutex::new(CaptureSchedule::new()),
                stats: Counters::default(),
            }),
        }
    }

    /// One manual capture
    pub fn capture_now(&self) -> Result<CaptureOutcome, InvalidFrame> {
        self.trigger(CaptureTrigger::Manual)
    }

    /// Take the latest frame, gate it on quality and submit it for analysis.
    ///
    /// Never waits for the analysis itself. Only a malformed frame is an
    /// error; every other outcome is reported through the notifier and
    /// returned as a [`CaptureOutcome`].
    pub fn trigger(&self, trigger: CaptureTrigger) -> Result<CaptureOutcome, InvalidFrame> {
        let inner = &self.inner;
        Counters::bump(&inner.stats.attempts);
        inner.set_phase(CapturePhase::Capturing);

        let Some(frame) = inner.mailbox.try_get() else {
            Counters::bump(&inner.stats.no_frame);
            inner.notify(PipelineEvent::NoFrame { trigger });
            inner.set_phase(CapturePhase::Idle);
            return Ok(CaptureOutcome::NoFrame);
        };

        inner.set_phase(CapturePhase::Evaluating);
        let settings = inner.settings.read().clone();
        let report = match quality::evaluate(&frame, &settings.thresholds) {
            Ok(report) => report,
            Err(e) => {
                Counters::bump(&inner.stats.invalid);
                inner.notify(PipelineEvent::InvalidFrame {
                    trigger,
                    reason: e.0.clone(),
                });
                inner.set_phase(CapturePhase::Idle);
                return Err(e);
            }
        };

        if !report.passed {
            Counters::bump(&inner.stats.rejected);
            inner.notify(PipelineEvent::CaptureRejected { trigger, report });
            inner.finish(CapturePhase::Rejected);
            return Ok(CaptureOutcome::Rejected(report));
        }

        if let Err(e) = inner.client.ready() {
            Counters::bump(&inner.stats.failed);
            inner.notify(PipelineEvent::AnalysisFailed {
                trigger,
                error: e.clone(),
            });
            inner.finish(CapturePhase::Failed);
            return Ok(CaptureOutcome::Failed(e));
        }

        inner.set_phase(CapturePhase::Submitting);
        Counters::bump(&inner.stats.submitted);
        inner.notify(PipelineEvent::AnalysisSubmitted { trigger, report });

        let task = inner.runtime.spawn(run_analysis(
            inner.clone(),
            trigger,
            frame,
            report,
            settings,
        ));
        Ok(CaptureOutcome::Submitted { report, task })
    }

    /// Enable or disable auto-capture. Any pending fire is cancelled first,
    /// so at most one is ever armed.
    pub fn set_auto_capture(&self, enabled: bool, interval: CaptureInterval) {
        let mut schedule = self.inner.schedule.lock();
        if enabled {
            let weak = Arc::downgrade(&self.inner);
            let runtime = self.inner.runtime.clone();
            schedule.arm(interval, |generation, deadline| {
                spawn_schedule(&runtime, weak, generation, deadline)
            });
            drop(schedule);
            self.inner.notify(PipelineEvent::AutoCaptureEnabled {
                interval_secs: interval.secs(),
            });
        } else {
            let was_enabled = schedule.enabled();
            schedule.cancel();
            schedule.set_interval(interval);
            drop(schedule);
            if was_enabled {
                self.inner.notify(PipelineEvent::AutoCaptureDisabled);
            }
        }
    }

    /// Like [`set_auto_capture`](Self::set_auto_capture) with an interval
    /// typed by the user. Returns the interval actually applied.
    pub fn set_auto_capture_text(&self, enabled: bool, text: &str) -> CaptureInterval {
        let previous = self.auto_interval();
        let (interval, adjustment) = CaptureInterval::parse(text, previous);
        if let Some(err) = adjustment {
            self.inner.notify(PipelineEvent::IntervalAdjusted(err));
        }
        self.set_auto_capture(enabled, interval);
        interval
    }

    pub fn auto_capture_enabled(&self) -> bool {
        self.inner.schedule.lock().enabled()
    }

    pub fn auto_interval(&self) -> CaptureInterval {
        self.inner.schedule.lock().interval()
    }

    /// Number of armed scheduled fires, 0 or 1
    pub fn pending_fires(&self) -> usize {
        self.inner.schedule.lock().pending_fires()
    }

    pub fn next_fire(&self) -> Option<Instant> {
        self.inner.schedule.lock().next_fire()
    }

    /// Replace the settings used by subsequent captures
    pub fn update_settings(&self, settings: CaptureSettings) -> Result<(), ConfigError> {
        settings.validate()?;
        *self.inner.settings.write() = settings;
        log::info!("Capture settings updated");
        Ok(())
    }

    pub fn settings(&self) -> CaptureSettings {
        self.inner.settings.read().clone()
    }

    pub fn phase(&self) -> CapturePhase {
        *self.inner.phase.lock()
    }

    pub fn stats(&self) -> CaptureStats {
        self.inner.stats.snapshot()
    }

    pub fn latest(&self) -> Option<Arc<AnalysisRecord>> {
        self.inner.results.latest()
    }

    pub fn results(&self) -> Arc<ResultStore> {
        self.inner.results.clone()
    }

    /// Cancel auto-capture. In-flight analyses are left to finish.
    pub fn shutdown(&self) {
        self.set_auto_capture(false, self.auto_interval());
    }
}

fn spawn_schedule(
    runtime: &Handle,
    inner: Weak<Inner>,
    generation: u64,
    first_deadline: Instant,
) -> JoinHandle<()> {
    runtime.spawn(async move {
        let mut deadline = first_deadline;
        loop {
            tokio::time::sleep_until(deadline).await;

            let Some(inner) = inner.upgrade() else {
                return;
            };
            if !inner.schedule.lock().is_current(generation) {
                return;
            }

            let orchestrator = CaptureOrchestrator {
                inner: inner.clone(),
            };
            if let Err(e) = orchestrator.trigger(CaptureTrigger::Scheduled) {
                log::debug!("Scheduled capture skipped: {}", e);
            }

            // Reschedule regardless of outcome
            let next = inner.schedule.lock().rearm(generation);
            match next {
                Some(next) => deadline = next,
                None => return,
            }
        }
    })
}

async fn run_analysis(
    inner: Arc<Inner>,
    trigger: CaptureTrigger,
    frame: Frame,
    report: QualityReport,
    settings: CaptureSettings,
) -> Result<Arc<AnalysisRecord>, AnalysisError> {
    inner.set_phase(CapturePhase::AwaitingResult);
    let frame_sequence = frame.sequence;
    let captured_at = frame.timestamp;

    match analyze_frame(inner.client.as_ref(), frame, &settings).await {
        Ok(outcome) => {
            let record = inner.results.publish(CompletedAnalysis {
                trigger,
                quality: report,
                outcome,
                frame_sequence,
                captured_at,
            });
            Counters::bump(&inner.stats.completed);
            inner.notify(PipelineEvent::AnalysisCompleted((*record).clone()));
            inner.finish(CapturePhase::Completed);
            Ok(record)
        }
        Err(error) => {
            Counters::bump(&inner.stats.failed);
            inner.notify(PipelineEvent::AnalysisFailed {
                trigger,
                error: error.clone(),
            });
            inner.finish(CapturePhase::Failed);
            Err(error)
        }
    }
}

async fn analyze_frame(
    client: &dyn AnalysisClient,
    frame: Frame,
    settings: &CaptureSettings,
) -> Result<AnalysisOutcome, AnalysisError> {
    let quality = settings.jpeg_quality;
    let jpeg = tokio::task::spawn_blocking(move || frame.to_jpeg(quality))
        .await
        .map_err(|e| AnalysisError::Encoding(e.to_string()))?
        .map_err(|e| AnalysisError::Encoding(e.to_string()))?;

    let timeout = settings.analysis_timeout;
    match tokio::time::timeout(timeout, client.analyze(Bytes::from(jpeg))).await {
        Ok(result) => result,
        Err(_) => Err(AnalysisError::Timeout(timeout)),
    }
}
