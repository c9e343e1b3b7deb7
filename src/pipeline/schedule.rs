use crate::errors::ScheduleConfigError;
use std::fmt;
use std::num::IntErrorKind;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Auto-capture period, always within `[MIN_SECS, MAX_SECS]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CaptureInterval(u64);

impl CaptureInterval {
    pub const MIN_SECS: u64 = 1;
    pub const MAX_SECS: u64 = 3600;
    pub const DEFAULT_SECS: u64 = 10;

    /// Strict constructor
    pub fn from_secs(secs: u64) -> Result<Self, ScheduleConfigError> {
        match Self::clamped(secs) {
            (interval, None) => Ok(interval),
            (_, Some(err)) => Err(err),
        }
    }

    /// Clamp into range, reporting the adjustment if one was made
    pub fn clamped(secs: u64) -> (Self, Option<ScheduleConfigError>) {
        if secs < Self::MIN_SECS {
            (
                Self(Self::MIN_SECS),
                Some(ScheduleConfigError::BelowMinimum {
                    input: secs.to_string(),
                    clamped: Self::MIN_SECS,
                }),
            )
        } else if secs > Self::MAX_SECS {
            (
                Self(Self::MAX_SECS),
                Some(ScheduleConfigError::AboveMaximum {
                    input: secs.to_string(),
                    clamped: Self::MAX_SECS,
                }),
            )
        } else {
            (Self(secs), None)
        }
    }

    /// Interpret user-entered text.
    ///
    /// Out-of-range integers (including ones too large for any integer
    /// type) are clamped; anything else keeps `previous`. Never yields an
    /// interval below one second.
    pub fn parse(text: &str, previous: CaptureInterval) -> (Self, Option<ScheduleConfigError>) {
        let trimmed = text.trim();
        match trimmed.parse::<i64>() {
            Ok(value) if value < Self::MIN_SECS as i64 => (
                Self(Self::MIN_SECS),
                Some(ScheduleConfigError::BelowMinimum {
                    input: trimmed.to_string(),
                    clamped: Self::MIN_SECS,
                }),
            ),
            Ok(value) if value > Self::MAX_SECS as i64 => (
                Self(Self::MAX_SECS),
                Some(ScheduleConfigError::AboveMaximum {
                    input: trimmed.to_string(),
                    clamped: Self::MAX_SECS,
                }),
            ),
            Ok(value) => (Self(value as u64), None),
            Err(e) => match e.kind() {
                IntErrorKind::PosOverflow => (
                    Self(Self::MAX_SECS),
                    Some(ScheduleConfigError::AboveMaximum {
                        input: trimmed.to_string(),
                        clamped: Self::MAX_SECS,
                    }),
                ),
                IntErrorKind::NegOverflow => (
                    Self(Self::MIN_SECS),
                    Some(ScheduleConfigError::BelowMinimum {
                        input: trimmed.to_string(),
                        clamped: Self::MIN_SECS,
                    }),
                ),
                _ => (
                    previous,
                    Some(ScheduleConfigError::NotNumeric {
                        input: text.to_string(),
                        kept: previous.0,
                    }),
                ),
            },
        }
    }

    pub fn secs(self) -> u64 {
        self.0
    }

    pub fn as_duration(self) -> Duration {
        Duration::from_secs(self.0)
    }
}

impl Default for CaptureInterval {
    fn default() -> Self {
        Self(Self::DEFAULT_SECS)
    }
}

impl fmt::Display for CaptureInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

/// Auto-capture state: at most one armed task at a time.
///
/// Every arm or cancel bumps `generation`; a fire that wakes up with an
/// older generation than the current one does nothing.
#[derive(Debug, Default)]
pub struct CaptureSchedule {
    enabled: bool,
    interval: CaptureInterval,
    next_fire: Option<Instant>,
    generation: u64,
    task: Option<JoinHandle<()>>,
}

impl CaptureSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn interval(&self) -> CaptureInterval {
        self.interval
    }

    pub fn next_fire(&self) -> Option<Instant> {
        self.next_fire
    }

    /// Change the interval used by later fires without arming anything
    pub fn set_interval(&mut self, interval: CaptureInterval) {
        self.interval = interval;
    }

    /// 0 or 1
    pub fn pending_fires(&self) -> usize {
        match &self.task {
            Some(task) if self.enabled && !task.is_finished() => 1,
            _ => 0,
        }
    }

    /// Cancel whatever is armed, then arm a new task built by `spawn` from
    /// the new generation and first deadline
    pub fn arm<F>(&mut self, interval: CaptureInterval, spawn: F) -> u64
    where
        F: FnOnce(u64, Instant) -> JoinHandle<()>,
    {
        self.cancel();
        self.generation = self.generation.wrapping_add(1);
        self.enabled = true;
        self.interval = interval;

        let deadline = Instant::now() + interval.as_duration();
        self.next_fire = Some(deadline);
        self.task = Some(spawn(self.generation, deadline));
        self.generation
    }

    /// Idempotent
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if self.enabled {
            self.generation = self.generation.wrapping_add(1);
        }
        self.enabled = false;
        self.next_fire = None;
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.enabled && self.generation == generation
    }

    /// Record the next deadline after a fire. Returns `None` if this
    /// generation has been cancelled or replaced in the meantime.
    pub fn rearm(&mut self, generation: u64) -> Option<Instant> {
        if !self.is_current(generation) {
            return None;
        }
        let deadline = Instant::now() + self.interval.as_duration();
        self.next_fire = Some(deadline);
        Some(deadline)
    }
}

impl Drop for CaptureSchedule {
    fn drop(&mut self) {
        self.cancel();
    }
}
