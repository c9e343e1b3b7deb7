use crate::types::Frame;
use parking_lot::Mutex;

struct Slot {
    frame: Option<Frame>,
    dropped: u64,
    closed: bool,
}

/// Single-slot, overwrite-oldest handoff between the acquisition loop and
/// its readers.
///
/// `put` never blocks and replaces whatever is unread; `try_get` never blocks
/// and takes the content, so the same frame is never read twice. Readers
/// racing for one frame is expected: the loser sees an empty slot.
pub struct FrameMailbox {
    slot: Mutex<Slot>,
}

impl FrameMailbox {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                frame: None,
                dropped: 0,
                closed: false,
            }),
        }
    }

    /// Store `frame`, discarding any unread frame. Ignored once closed.
    pub fn put(&self, frame: Frame) {
        let mut slot = self.slot.lock();
        if slot.closed {
            return;
        }
        if slot.frame.replace(frame).is_some() {
            slot.dropped = slot.dropped.saturating_add(1);
        }
    }

    /// Take the most recent frame, if any
    pub fn try_get(&self) -> Option<Frame> {
        self.slot.lock().frame.take()
    }

    pub fn has_data(&self) -> bool {
        self.slot.lock().frame.is_some()
    }

    /// Number of frames overwritten before anyone read them
    pub fn dropped(&self) -> u64 {
        self.slot.lock().dropped
    }

    /// Stop accepting frames and discard the pending one
    pub fn close(&self) {
        let mut slot = self.slot.lock();
        slot.closed = true;
        slot.frame = None;
    }

    pub fn is_closed(&self) -> bool {
        self.slot.lock().closed
    }
}

impl Default for FrameMailbox {
    fn default() -> Self {
        Self::new()
    }
}
