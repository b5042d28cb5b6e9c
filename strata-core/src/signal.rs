//! Cooperative cancellation.
//!
//! An [`AbortSignal`] is a one-way flag. Events and pipelines bound to a
//! signal consider themselves stopped once it is aborted; nothing is
//! interrupted mid-await.

use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// A cancellation flag observed by events and pipelines.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    /// A fresh, non-aborted signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the signal has been aborted.
    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn abort(&self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Owner of a replaceable [`AbortSignal`].
///
/// [`abort`](Self::abort) aborts the current signal and installs a fresh one,
/// so work bound to the old signal stops while later stages start clean.
/// Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct AbortController {
    current: Arc<Mutex<AbortSignal>>,
}

impl AbortController {
    /// Create a controller with a fresh signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current signal.
    pub fn signal(&self) -> AbortSignal {
        self.current.lock().clone()
    }

    /// Abort the current signal and replace it with a fresh one.
    pub fn abort(&self) {
        let old = std::mem::take(&mut *self.current.lock());
        old.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abort_replaces_signal() {
        let controller = AbortController::new();
        let before = controller.signal();
        controller.abort();
        let after = controller.signal();

        assert!(before.is_aborted());
        assert!(!after.is_aborted());
    }
}
