//! Frame completion handoff between the emulation and render threads.
//!
//! A pair of ready flags, double-buffered by frame parity: the emulation
//! thread sets the flag for each finished frame, the renderer consumes it
//! without blocking. Missing a flag is harmless; the phosphor ring carries
//! the actual image data and the next frame sets the other flag.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Double-buffered frame-ready latch. Shared between the two threads via
/// `Arc`.
pub struct FrameLatch {
    ready: [AtomicBool; 2],
    frame: AtomicU64,
}

impl FrameLatch {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ready: [AtomicBool::new(false), AtomicBool::new(false)],
            frame: AtomicU64::new(0),
        }
    }

    /// Mark a frame as finished. Called by the emulation thread at each
    /// 50 Hz boundary.
    pub fn publish(&self, frame_number: u64) {
        self.frame.store(frame_number, Ordering::Release);
        self.ready[(frame_number & 1) as usize].store(true, Ordering::Release);
    }

    /// Non-blocking consume: returns the latest finished frame number if one
    /// is pending, clearing the flag.
    pub fn try_consume(&self) -> Option<u64> {
        for slot in &self.ready {
            if slot.swap(false, Ordering::AcqRel) {
                return Some(self.frame.load(Ordering::Acquire));
            }
        }
        None
    }
}

impl Default for FrameLatch {
    fn default() -> Self {
        Self::new()
    }
}
