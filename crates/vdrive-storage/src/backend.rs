use std::path::Path;

use crate::{Completion, CompletionTracker, Result};

/// Outcome of a drive request that did not fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IoStatus {
    /// The request finished in-line. Its completion was dropped and will never fire.
    Sync,
    /// The request was handed to the [`CompletionTracker`]; wait for the completion, then
    /// re-issue the request to collect the data.
    Pending,
}

/// Storage implementation behind a [`Drive`](crate::Drive).
///
/// Offsets and lengths are in bytes and must be whole sectors; implementations report
/// violations as errors and leave escalation to the drive. Backends that always finish
/// in-line ignore `tracker` and drop `completion`.
pub trait DriveBackend {
    /// Size of the image in bytes.
    fn capacity_bytes(&self) -> u64;

    fn read(
        &mut self,
        buf: &mut [u8],
        offset: u64,
        tracker: &mut CompletionTracker,
        completion: Completion,
    ) -> Result<IoStatus>;

    fn write(
        &mut self,
        buf: &[u8],
        offset: u64,
        tracker: &mut CompletionTracker,
        completion: Completion,
    ) -> Result<IoStatus>;

    /// Hint that `[offset, offset + len)` will be read soon.
    fn prefetch(
        &mut self,
        _len: usize,
        _offset: u64,
        _tracker: &mut CompletionTracker,
        _completion: Completion,
    ) -> Result<IoStatus> {
        Ok(IoStatus::Sync)
    }

    /// Externalize backend state next to a machine snapshot stored at `path`.
    fn save_state(&mut self, _path: &Path) -> Result<()> {
        Ok(())
    }

    /// Push any pass-through writes to stable storage.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
