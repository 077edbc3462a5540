//! Scan execution context (cancellation / deadline).
//!
//! Every suspension point in a scan (before each iterator step, before
//! invoking engine hooks) checks the context and aborts with
//! [`Error::Cancelled`] once it fires. A disabled context is a single
//! `None` pointer, so unbounded scans pay only a null check.

use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

struct ContextInner {
    cancelled: AtomicBool,
    deadline: Option<Instant>,
}

/// Cheap-to-clone cancellation handle threaded through `read` calls.
#[derive(Clone, Default)]
pub struct ScanContext(Option<Arc<ContextInner>>);

impl ScanContext {
    /// Context that never cancels.
    #[inline]
    pub fn none() -> Self {
        Self(None)
    }

    /// Cancellable context; call [`cancel`](Self::cancel) on any clone.
    pub fn new() -> Self {
        Self(Some(Arc::new(ContextInner {
            cancelled: AtomicBool::new(false),
            deadline: None,
        })))
    }

    /// Cancellable context that also expires after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self(Some(Arc::new(ContextInner {
            cancelled: AtomicBool::new(false),
            deadline: Some(Instant::now() + timeout),
        })))
    }

    /// Request cancellation; a no-op on a disabled context.
    pub fn cancel(&self) {
        if let Some(inner) = &self.0 {
            inner.cancelled.store(true, Ordering::Relaxed);
        }
    }

    /// Returns `Err(Cancelled)` once cancelled or past the deadline.
    #[inline]
    pub fn check(&self) -> Result<()> {
        let Some(inner) = &self.0 else {
            return Ok(());
        };
        if inner.cancelled.load(Ordering::Relaxed) {
            return Err(Error::Cancelled);
        }
        if let Some(deadline) = inner.deadline {
            if Instant::now() >= deadline {
                return Err(Error::Cancelled);
            }
        }
        Ok(())
    }
}
