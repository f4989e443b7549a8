//! The phosphor trail: a lock-free single-producer single-consumer ring.
//!
//! The emulation thread appends one dot per drawn cycle; the render thread
//! walks the live span, fades each dot and retires the ones that have gone
//! dark. This mirrors the CRT itself: the beam writes, the phosphor decays,
//! and nothing is ever locked.
//!
//! Ownership discipline:
//! - `add` belongs to the producer. It is published with Release after the
//!   dot cell is written; the consumer Acquires it before reading.
//! - `fade` belongs to the consumer. It is published with Release after the
//!   consumer has finished mutating `z` values in the retired span; the
//!   producer Acquires it before reusing those cells.
//! - Cells in `[fade, add)` may have their `z` decayed in place by the
//!   consumer; the producer never writes inside that span. When the ring is
//!   full the producer drops the newest dot rather than racing the consumer
//!   for the oldest.
//!
//! Indices increase monotonically and are reduced modulo the capacity on
//! access, so the live count is always `add - fade` and never exceeds
//! capacity - 1.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Number of dots the trail can hold; several frames of beam movement.
pub const PHOSPHOR_CAPACITY: usize = 50_000;

/// A single point of brightness on the CRT.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Phosphor {
    /// Screen X in dot units (integrator space divided by 64).
    pub x: i32,
    /// Screen Y in dot units.
    pub y: i32,
    /// Remaining brightness, 0-127. Decayed by the renderer.
    pub z: u8,
    /// Brightness at the moment the beam drew the dot.
    pub orig_z: u8,
    /// First dot of a stroke (the beam was off or off-screen before it).
    pub is_start: bool,
}

struct Ring {
    dots: Box<[UnsafeCell<Phosphor>]>,
    add: AtomicUsize,
    fade: AtomicUsize,
}

// The SPSC discipline above keeps every cell single-writer: the producer
// writes only at `add` (outside the live span), the consumer mutates only
// inside `[fade, add)`.
unsafe impl Sync for Ring {}
unsafe impl Send for Ring {}

/// Create a phosphor ring and split it into its two endpoints.
#[must_use]
pub fn phosphor_ring(capacity: usize) -> (PhosphorProducer, PhosphorConsumer) {
    assert!(capacity >= 2, "phosphor ring needs at least two slots");
    let ring = Arc::new(Ring {
        dots: (0..capacity)
            .map(|_| UnsafeCell::new(Phosphor::default()))
            .collect(),
        add: AtomicUsize::new(0),
        fade: AtomicUsize::new(0),
    });
    (
        PhosphorProducer {
            ring: Arc::clone(&ring),
            add: 0,
            fade_cache: 0,
        },
        PhosphorConsumer {
            ring,
            fade: 0,
            add_cache: 0,
        },
    )
}

/// Producer endpoint, owned by the video circuitry.
pub struct PhosphorProducer {
    ring: Arc<Ring>,
    /// Local copy of the producer index; the atomic lags it by one store.
    add: usize,
    /// Last observed consumer index; refreshed only when the ring looks full.
    fade_cache: usize,
}

impl PhosphorProducer {
    /// Append a dot. Returns false when the ring is full and the dot was
    /// dropped (the renderer is behind; the trail is bounded by design).
    pub fn push(&mut self, dot: Phosphor) -> bool {
        let capacity = self.ring.dots.len();
        if self.add.wrapping_sub(self.fade_cache) >= capacity - 1 {
            self.fade_cache = self.ring.fade.load(Ordering::Acquire);
            if self.add.wrapping_sub(self.fade_cache) >= capacity - 1 {
                return false;
            }
        }
        unsafe {
            *self.ring.dots[self.add % capacity].get() = dot;
        }
        self.add = self.add.wrapping_add(1);
        self.ring.add.store(self.add, Ordering::Release);
        true
    }

    /// Number of live dots from the producer's point of view.
    #[must_use]
    pub fn len(&self) -> usize {
        self.add.wrapping_sub(self.ring.fade.load(Ordering::Acquire))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Consumer endpoint, owned by the renderer.
pub struct PhosphorConsumer {
    ring: Arc<Ring>,
    /// Local copy of the consumer index.
    fade: usize,
    /// Producer index observed at the last `sync`.
    add_cache: usize,
}

impl PhosphorConsumer {
    /// Observe the producer's progress. Call once per rendered frame before
    /// iterating.
    pub fn sync(&mut self) {
        self.add_cache = self.ring.add.load(Ordering::Acquire);
    }

    /// Number of live dots as of the last `sync`.
    #[must_use]
    pub fn len(&self) -> usize {
        self.add_cache.wrapping_sub(self.fade)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy out the live dots, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = Phosphor> + '_ {
        let capacity = self.ring.dots.len();
        (self.fade..self.add_cache)
            .map(move |index| unsafe { *self.ring.dots[index % capacity].get() })
    }

    /// Fade the live span: subtract `step` from every dot's brightness,
    /// then retire leading dots that have gone dark, stopping at the first
    /// still-visible one. The new `fade` index is published for the
    /// producer.
    pub fn decay(&mut self, step: u8) {
        let capacity = self.ring.dots.len();
        for index in self.fade..self.add_cache {
            let dot = self.ring.dots[index % capacity].get();
            unsafe {
                (*dot).z = (*dot).z.saturating_sub(step);
            }
        }
        while self.fade != self.add_cache {
            let dark = unsafe { (*self.ring.dots[self.fade % capacity].get()).z == 0 };
            if !dark {
                break;
            }
            self.fade = self.fade.wrapping_add(1);
        }
        self.ring.fade.store(self.fade, Ordering::Release);
    }
}
