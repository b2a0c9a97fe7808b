use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

/// Pause and cancel switches shared between a running operation tree and
/// whoever drives it (CLI signal handler, UI, tests).
///
/// Cloning yields another handle to the same switches.
#[derive(Clone, Default)]
pub struct RunControl {
    inner: Arc<ControlInner>,
}

#[derive(Default)]
struct ControlInner {
    cancel: CancellationToken,
    paused: AtomicBool,
    /// Bumped on every pause so operations that were not polling at the
    /// time still notice a pause happened.
    generation: AtomicU64,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        if !self.inner.paused.swap(true, Ordering::SeqCst) {
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn resume(&self) {
        self.inner.paused.store(false, Ordering::SeqCst);
    }

    pub fn cancel(&self) {
        self.inner.cancel.cancel();
    }

    pub fn is_paused(&self) -> bool {
        self.inner.paused.load(Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    pub fn pause_generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    /// Token for async observers, e.g. to stop a progress printer.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }
}

impl std::fmt::Debug for RunControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunControl")
            .field("paused", &self.is_paused())
            .field("cancelled", &self.is_cancelled())
            .field("generation", &self.pause_generation())
            .finish()
    }
}
