//! Cooperative cancellation of continuous runs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Non-blocking cancellation check, polled once per completed pass
pub trait CancelSignal {
    fn poll_cancel(&self) -> bool;
}

/// Shared flag, typically set from a Ctrl-C handler
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Clear a pending cancellation before starting a new batch
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl CancelSignal for CancelFlag {
    fn poll_cancel(&self) -> bool {
        self.is_cancelled()
    }
}

/// Signal that never fires
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancel;

impl CancelSignal for NeverCancel {
    fn poll_cancel(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_is_shared() {
        let flag = CancelFlag::new();
        let handle = flag.clone();
        assert!(!flag.poll_cancel());
        handle.cancel();
        assert!(flag.poll_cancel());
        flag.reset();
        assert!(!handle.poll_cancel());
    }
}
