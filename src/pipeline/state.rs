use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Cooperative cancellation signal shared between the caller and the run task
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Returns `true` only for the first request.
    pub fn cancel(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-run state: cancellation, progress counter and the target video count
#[derive(Debug)]
pub struct RunState {
    cancel: CancelFlag,
    target: usize,
    processed: AtomicUsize,
}

impl RunState {
    pub fn new(target: usize) -> Self {
        Self {
            cancel: CancelFlag::new(),
            target,
            processed: AtomicUsize::new(0),
        }
    }

    /// Handle for requesting cancellation from outside the run
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::SeqCst)
    }

    /// Raise the processed counter; it never decreases
    pub(crate) fn advance_to(&self, processed: usize) {
        self.processed.fetch_max(processed, Ordering::SeqCst);
    }
}
