use super::mailbox::FrameMailbox;
use crate::notify::{emit, Notifier, PipelineEvent};
use crate::types::Frame;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Display collaborator
pub trait PreviewSink: Send + Sync {
    /// Render one frame. Called from the refresher task; keep it short.
    fn show_frame(&self, frame: &Frame);

    /// Camera connected/disconnected, called once per transition
    fn camera_status(&self, connected: bool);
}

#[derive(Debug, Clone, Copy)]
pub struct PreviewConfig {
    pub interval: Duration,
    /// No frame for this long means the camera is disconnected
    pub stale_after: Duration,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            stale_after: Duration::from_secs(2),
        }
    }
}

/// Derives connected/disconnected transitions from per-tick observations.
/// The initial status is unknown, so the first decision is always reported.
#[derive(Debug)]
pub struct ConnectionTracker {
    stale_after: Duration,
    since: Instant,
    last_frame: Option<Instant>,
    status: Option<bool>,
}

impl ConnectionTracker {
    pub fn new(stale_after: Duration, now: Instant) -> Self {
        Self {
            stale_after,
            since: now,
            last_frame: None,
            status: None,
        }
    }

    pub fn status(&self) -> Option<bool> {
        self.status
    }

    /// Returns the new status only when it changed
    pub fn observe(&mut self, frame_seen: bool, source_closed: bool, now: Instant) -> Option<bool> {
        let decided = if frame_seen {
            self.last_frame = Some(now);
            Some(true)
        } else if source_closed {
            Some(false)
        } else {
            let reference = self.last_frame.unwrap_or(self.since);
            if now.saturating_duration_since(reference) >= self.stale_after {
                Some(false)
            } else {
                None
            }
        };

        match decided {
            Some(connected) if self.status != Some(connected) => {
                self.status = Some(connected);
                Some(connected)
            }
            _ => None,
        }
    }
}

/// Periodic display-only consumer of the frame mailbox
pub struct PreviewRefresher;

impl PreviewRefresher {
    pub fn spawn(
        runtime: &Handle,
        mailbox: Arc<FrameMailbox>,
        sink: Arc<dyn PreviewSink>,
        notifier: Arc<dyn Notifier>,
        config: PreviewConfig,
    ) -> PreviewHandle {
        let frames_shown = Arc::new(AtomicU64::new(0));
        let counter = frames_shown.clone();
        let interval = config.interval.max(Duration::from_millis(1));

        let task = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut tracker = ConnectionTracker::new(config.stale_after, Instant::now());

            loop {
                ticker.tick().await;

                let frame = mailbox.try_get();
                if let Some(frame) = &frame {
                    sink.show_frame(frame);
                    counter.fetch_add(1, Ordering::Relaxed);
                }

                let closed = mailbox.is_closed();
                if let Some(connected) = tracker.observe(frame.is_some(), closed, Instant::now()) {
                    sink.camera_status(connected);
                    let event = if connected {
                        PipelineEvent::CameraConnected
                    } else {
                        PipelineEvent::CameraDisconnected
                    };
                    emit(notifier.as_ref(), event);
                }

                if closed && tracker.status() == Some(false) {
                    log::debug!("Frame source closed; preview refresher exiting");
                    break;
                }
            }
        });

        PreviewHandle {
            task: Mutex::new(Some(task)),
            frames_shown,
        }
    }
}

/// Handle to the refresher task. Stops the task on drop.
pub struct PreviewHandle {
    task: Mutex<Option<JoinHandle<()>>>,
    frames_shown: Arc<AtomicU64>,
}

impl PreviewHandle {
    /// Idempotent
    pub fn stop(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn frames_shown(&self) -> u64 {
        self.frames_shown.load(Ordering::Relaxed)
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
