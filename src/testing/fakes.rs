//! In-memory stand-ins for the camera, the analysis service and the UI

use super::synthetic_data::{checkerboard_frame, uniform_frame};
use crate::analysis::{AnalysisClient, AnalysisOutcome};
use crate::errors::{AnalysisError, DeviceError};
use crate::notify::{Notice, Notifier, PipelineEvent};
use crate::pipeline::PreviewSink;
use crate::platform::{CaptureDevice, DeviceBackend};
use crate::types::{Frame, Resolution};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// One scripted device read
#[derive(Debug, Clone)]
pub enum ScriptedRead {
    /// Uniform 32x32 frame of this value (fails the sharpness gate)
    Frame(u8),
    /// 64x64 checkerboard at brightness 120 (passes the default gate)
    Sharp,
    Fail,
}

impl ScriptedRead {
    fn produce(&self) -> Result<Frame, DeviceError> {
        match self {
            ScriptedRead::Frame(value) => Ok(uniform_frame(32, 32, *value)),
            ScriptedRead::Sharp => Ok(checkerboard_frame(64, 64, 8, 0, 240)),
            ScriptedRead::Fail => Err(DeviceError::TransientReadFailure(
                "scripted read failure".to_string(),
            )),
        }
    }
}

/// Device backend that replays a script of reads
pub struct ScriptedBackend {
    script: Vec<ScriptedRead>,
    repeat_last: bool,
    fail_open: bool,
    released: Arc<AtomicBool>,
    opens: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new(script: Vec<ScriptedRead>) -> Self {
        Self {
            script,
            repeat_last: false,
            fail_open: false,
            released: Arc::new(AtomicBool::new(false)),
            opens: AtomicUsize::new(0),
        }
    }

    /// A backend whose `open` always fails
    pub fn failing_open() -> Self {
        Self {
            fail_open: true,
            ..Self::new(Vec::new())
        }
    }

    /// Keep returning the last scripted read once the script runs out
    pub fn repeat_last(mut self) -> Self {
        self.repeat_last = true;
        self
    }

    /// Whether an opened device has been released
    pub fn released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::Relaxed)
    }
}

impl DeviceBackend for ScriptedBackend {
    fn open(&self, index: u32, _resolution: Resolution) -> Result<Box<dyn CaptureDevice>, DeviceError> {
        self.opens.fetch_add(1, Ordering::Relaxed);
        if self.fail_open {
            return Err(DeviceError::open_failed(index, "no such device"));
        }
        Ok(Box::new(ScriptedDevice {
            script: self.script.clone(),
            position: 0,
            repeat_last: self.repeat_last,
            released: self.released.clone(),
        }))
    }
}

struct ScriptedDevice {
    script: Vec<ScriptedRead>,
    position: usize,
    repeat_last: bool,
    released: Arc<AtomicBool>,
}

impl CaptureDevice for ScriptedDevice {
    fn read_frame(&mut self) -> Result<Frame, DeviceError> {
        // Roughly a fast camera's frame period
        thread::sleep(Duration::from_millis(2));

        let read = match self.script.get(self.position) {
            Some(read) => {
                self.position += 1;
                read.clone()
            }
            None if self.repeat_last && !self.script.is_empty() => {
                self.script[self.script.len() - 1].clone()
            }
            None => ScriptedRead::Fail,
        };
        read.produce()
    }

    fn release(&mut self) {
        self.released.store(true, Ordering::Release);
    }
}

/// Keeps every notice it receives
#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.notices.lock().iter().map(|n| n.event.clone()).collect()
    }

    pub fn lines(&self) -> Vec<String> {
        self.notices.lock().iter().map(Notice::line).collect()
    }

    pub fn count(&self, predicate: impl Fn(&PipelineEvent) -> bool) -> usize {
        self.notices.lock().iter().filter(|n| predicate(&n.event)).count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: &Notice) {
        self.notices.lock().push(notice.clone());
    }
}

/// Preview sink that counts frames and records status transitions
#[derive(Default)]
pub struct RecordingSink {
    frames: AtomicUsize,
    statuses: Mutex<Vec<bool>>,
}

impl RecordingSink {
    pub fn frames(&self) -> usize {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn statuses(&self) -> Vec<bool> {
        self.statuses.lock().clone()
    }
}

impl PreviewSink for RecordingSink {
    fn show_frame(&self, _frame: &Frame) {
        self.frames.fetch_add(1, Ordering::Relaxed);
    }

    fn camera_status(&self, connected: bool) {
        self.statuses.lock().push(connected);
    }
}

/// Analysis client returning a canned result
pub struct StubAnalysisClient {
    result: Result<AnalysisOutcome, AnalysisError>,
    delay: Duration,
    has_credential: bool,
    calls: AtomicUsize,
    last_payload: Mutex<Option<Bytes>>,
}

impl StubAnalysisClient {
    /// Succeeds with `outcome`; non-object values become an empty outcome
    pub fn succeeding(outcome: Value) -> Self {
        Self::with_result(Ok(AnalysisOutcome::from_value(outcome).unwrap_or_default()))
    }

    pub fn failing(error: AnalysisError) -> Self {
        Self::with_result(Err(error))
    }

    fn with_result(result: Result<AnalysisOutcome, AnalysisError>) -> Self {
        Self {
            result,
            delay: Duration::ZERO,
            has_credential: true,
            calls: AtomicUsize::new(0),
            last_payload: Mutex::new(None),
        }
    }

    /// Sleep this long before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Report a missing credential from `ready`
    pub fn without_credential(mut self) -> Self {
        self.has_credential = false;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Bytes of the most recent submission
    pub fn last_payload(&self) -> Option<Bytes> {
        self.last_payload.lock().clone()
    }
}

#[async_trait]
impl AnalysisClient for StubAnalysisClient {
    fn ready(&self) -> Result<(), AnalysisError> {
        if self.has_credential {
            Ok(())
        } else {
            Err(AnalysisError::MissingCredential)
        }
    }

    async fn analyze(&self, jpeg: Bytes) -> Result<AnalysisOutcome, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_payload.lock() = Some(jpeg);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.result.clone()
    }
}
