//! Bounded, most-recent-biased log of broadcast frames for late joiners.

use std::collections::VecDeque;

use parking_lot::Mutex;

/// Default number of frames retained.
pub const DEFAULT_HISTORY_CAP: usize = 100;

/// Append-and-trim buffer of serialized broadcast frames.
///
/// Newest frames are pushed at the head; once the cap is exceeded the oldest
/// are dropped from the tail. There are no update or delete operations.
pub struct HistoryBuffer {
    cap: usize,
    frames: Mutex<VecDeque<String>>,
}

impl HistoryBuffer {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            frames: Mutex::new(VecDeque::new()),
        }
    }

    /// Insert a frame at the head, trimming the tail back to the cap.
    pub fn append(&self, frame: String) {
        let mut frames = self.frames.lock();
        frames.push_front(frame);
        frames.truncate(self.cap);
    }

    /// Retained frames in chronological order (oldest first), ready to be
    /// replayed to a late joiner.
    pub fn snapshot(&self) -> Vec<String> {
        self.frames.lock().iter().rev().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.lock().is_empty()
    }
}
