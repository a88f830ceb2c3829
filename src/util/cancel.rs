//! Cooperative cancellation for long-running phases.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{DedupError, Result};

/// A cloneable flag checked between iterations and batches.
///
/// Cancelling is sticky: once set, every clone observes it. Phases that see
/// it return [`DedupError::OperationCancelled`] and discard partial results.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Return an error naming `stage` if cancellation has been requested.
    pub fn check(&self, stage: &str) -> Result<()> {
        if self.is_cancelled() {
            Err(DedupError::cancelled(format!("cancelled during {stage}")))
        } else {
            Ok(())
        }
    }
}
