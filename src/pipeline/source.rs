use super::mailbox::FrameMailbox;
use crate::errors::DeviceError;
use crate::notify::{emit, Notifier, PipelineEvent};
use crate::platform::{CaptureDevice, DeviceBackend};
use crate::types::Resolution;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Acquisition settings, read once at start
#[derive(Debug, Clone)]
pub struct FrameSourceConfig {
    pub device_index: u32,
    pub resolution: Resolution,
    /// Consecutive failed reads before the device is reported as degraded
    pub failure_report_threshold: u32,
    /// Pause after a failed read
    pub read_retry_delay: Duration,
    /// Upper bound on how long `stop` waits for the loop to exit
    pub join_timeout: Duration,
}

impl Default for FrameSourceConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            resolution: Resolution::hd(),
            failure_report_threshold: 30,
            read_retry_delay: Duration::from_millis(10),
            join_timeout: Duration::from_secs(2),
        }
    }
}

struct Shared {
    mailbox: Arc<FrameMailbox>,
    notifier: Arc<dyn Notifier>,
    stop_flag: AtomicBool,
    frames_captured: AtomicU64,
    read_failures: AtomicU64,
}

/// Owns the capture device and the acquisition thread
pub struct FrameSource;

impl FrameSource {
    /// Open the device and start the acquisition loop.
    ///
    /// The device is opened on the acquisition thread; this call blocks
    /// until the open either succeeds or fails, so `OpenFailed` reaches the
    /// caller synchronously.
    pub fn start(
        backend: Arc<dyn DeviceBackend>,
        config: FrameSourceConfig,
        mailbox: Arc<FrameMailbox>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<FrameSourceHandle, DeviceError> {
        let index = config.device_index;
        let shared = Arc::new(Shared {
            mailbox,
            notifier,
            stop_flag: AtomicBool::new(false),
            frames_captured: AtomicU64::new(0),
            read_failures: AtomicU64::new(0),
        });

        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<Resolution, DeviceError>>(1);
        let thread_shared = shared.clone();
        let thread_config = config.clone();
        let thread = thread::Builder::new()
            .name(format!("studycam-capture-{}", index))
            .spawn(move || {
                let device = match backend.open(thread_config.device_index, thread_config.resolution) {
                    Ok(device) => device,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(thread_config.resolution));
                acquisition_loop(&thread_shared, device, &thread_config);
            })
            .map_err(|e| DeviceError::open_failed(index, format!("failed to spawn capture thread: {}", e)))?;

        let opened = match ready_rx.recv() {
            Ok(result) => result,
            Err(_) => Err(DeviceError::open_failed(
                index,
                "capture thread exited before reporting",
            )),
        };

        match opened {
            Ok(resolution) => {
                emit(
                    shared.notifier.as_ref(),
                    PipelineEvent::CameraStarted {
                        index,
                        width: resolution.width,
                        height: resolution.height,
                    },
                );
                Ok(FrameSourceHandle {
                    inner: Arc::new(HandleInner {
                        shared,
                        thread: Mutex::new(Some(thread)),
                        join_timeout: config.join_timeout,
                        device_index: index,
                    }),
                })
            }
            Err(e) => {
                let _ = thread.join();
                shared.mailbox.close();
                emit(shared.notifier.as_ref(), PipelineEvent::CameraOpenFailed(e.clone()));
                Err(e)
            }
        }
    }
}

/// Control handle for a running frame source. Clones share one source;
/// dropping the last clone stops it.
#[derive(Clone)]
pub struct FrameSourceHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    shared: Arc<Shared>,
    thread: Mutex<Option<JoinHandle<()>>>,
    join_timeout: Duration,
    device_index: u32,
}

impl FrameSourceHandle {
    /// Stop the loop, close the mailbox and release the device.
    ///
    /// Idempotent and safe from any thread. Waits at most `join_timeout`
    /// for the loop; a loop stuck in a device read is detached and releases
    /// the device when the read returns.
    pub fn stop(&self) {
        self.inner.stop();
    }

    pub fn is_running(&self) -> bool {
        !self.inner.shared.stop_flag.load(Ordering::Acquire)
            && self
                .inner
                .thread
                .lock()
                .as_ref()
                .is_some_and(|h| !h.is_finished())
    }

    pub fn device_index(&self) -> u32 {
        self.inner.device_index
    }

    pub fn frames_captured(&self) -> u64 {
        self.inner.shared.frames_captured.load(Ordering::Relaxed)
    }

    pub fn read_failures(&self) -> u64 {
        self.inner.shared.read_failures.load(Ordering::Relaxed)
    }
}

impl HandleInner {
    fn stop(&self) {
        if self.shared.stop_flag.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shared.mailbox.close();

        let handle = self.thread.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                log::warn!("stop() called from the acquisition thread; not joining");
            } else {
                let start = Instant::now();
                loop {
                    if handle.is_finished() {
                        let _ = handle.join();
                        break;
                    }
                    if start.elapsed() >= self.join_timeout {
                        log::warn!(
                            "Acquisition loop for camera {} did not exit within {:?}; detaching",
                            self.device_index,
                            self.join_timeout
                        );
                        break;
                    }
                    thread::sleep(Duration::from_millis(5));
                }
            }
        }

        emit(self.shared.notifier.as_ref(), PipelineEvent::CameraStopped);
    }
}

impl Drop for HandleInner {
    fn drop(&mut self) {
        self.stop();
    }
}

fn acquisition_loop(shared: &Shared, mut device: Box<dyn CaptureDevice>, config: &FrameSourceConfig) {
    let threshold = config.failure_report_threshold.max(1);
    let mut sequence: u64 = 0;
    let mut consecutive_failures: u32 = 0;
    let mut degraded = false;

    while !shared.stop_flag.load(Ordering::Acquire) {
        match device.read_frame() {
            Ok(frame) => {
                if degraded {
                    emit(
                        shared.notifier.as_ref(),
                        PipelineEvent::DeviceRecovered {
                            after_failures: consecutive_failures,
                        },
                    );
                    degraded = false;
                }
                consecutive_failures = 0;
                sequence = sequence.saturating_add(1);
                shared.frames_captured.fetch_add(1, Ordering::Relaxed);
                shared.mailbox.put(frame.with_sequence(sequence));
            }
            Err(e) => {
                consecutive_failures = consecutive_failures.saturating_add(1);
                shared.read_failures.fetch_add(1, Ordering::Relaxed);
                log::debug!("Skipping frame from camera {}: {}", config.device_index, e);

                if !degraded && consecutive_failures >= threshold {
                    degraded = true;
                    emit(
                        shared.notifier.as_ref(),
                        PipelineEvent::DeviceDegraded {
                            consecutive_failures,
                            last_error: e.to_string(),
                        },
                    );
                }
                thread::sleep(config.read_retry_delay);
            }
        }
    }

    device.release();
    log::info!("Acquisition loop for camera {} exited", config.device_index);
}
