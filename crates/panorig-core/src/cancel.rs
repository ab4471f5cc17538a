use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{PanoError, PanoResult};

/// Shared operator-abort flag. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once the flag is set.
    pub fn checkpoint(&self) -> PanoResult<()> {
        if self.is_cancelled() {
            Err(PanoError::Cancelled)
        } else {
            Ok(())
        }
    }
}
