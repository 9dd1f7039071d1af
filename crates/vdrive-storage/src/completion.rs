//! Single-flight completion tracking for asynchronous drive backends.
//!
//! The tracker is owned by whatever drives emulated time forward and is passed into every
//! drive request. A backend that cannot finish a request in-line registers its
//! [`Completion`] here and returns [`IoStatus::Pending`](crate::IoStatus::Pending); the
//! scheduler then calls [`CompletionTracker::check_complete`] once per tick.

use std::fmt;

use tracing::{debug, warn};

use crate::{DiskError, Result};

/// Callback fired when a pending transfer finishes.
///
/// Any caller context (the controller's channel, a request tag, ...) is captured by the
/// closure. A completion handed to a request that finishes synchronously is dropped without
/// being called.
pub struct Completion(Box<dyn FnOnce(Result<()>)>);

impl Completion {
    pub fn new(callback: impl FnOnce(Result<()>) + 'static) -> Self {
        Self(Box::new(callback))
    }

    /// A completion that does nothing when fired.
    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    fn fire(self, status: Result<()>) {
        (self.0)(status)
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Completion(..)")
    }
}

#[derive(Debug, Default)]
pub struct CompletionTracker {
    pending: Option<Completion>,
}

impl CompletionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pending transfer.
    ///
    /// Only one transfer may be outstanding. A second registration is rejected with
    /// [`DiskError::TransferInProgress`] and the already-pending completion is left in place.
    pub fn register(&mut self, completion: Completion) -> Result<()> {
        if self.pending.is_some() {
            warn!("rejecting transfer: another transfer is still pending");
            return Err(DiskError::TransferInProgress);
        }
        debug!("transfer pending");
        self.pending = Some(completion);
        Ok(())
    }

    /// Fire the pending completion, if any. Returns whether a completion was delivered.
    pub fn check_complete(&mut self) -> bool {
        match self.pending.take() {
            Some(completion) => {
                debug!("transfer complete");
                completion.fire(Ok(()));
                true
            }
            None => false,
        }
    }

    /// Abandon any in-flight transfer without notifying its owner (machine reset/power-off).
    pub fn cancel_transfers(&mut self) {
        if self.pending.take().is_some() {
            warn!("cancelled pending transfer");
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}
