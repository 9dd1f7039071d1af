use std::fs::File;
use std::path::Path;

use tracing::{info, warn};

use crate::util::{check_request, read_exact_at};
use crate::{Completion, CompletionTracker, DiskError, DriveBackend, IoStatus, Result};

/// Whole image held in memory.
///
/// The file is read once at open time and then closed; writes modify the in-memory copy
/// only and are lost when the backend is dropped.
pub struct RamBackend {
    data: Vec<u8>,
}

impl RamBackend {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path)?;
        let size = file.metadata()?.len();
        if size == 0 {
            return Err(DiskError::EmptyImage);
        }
        let len = usize::try_from(size).map_err(|_| DiskError::QuotaExceeded(size))?;

        let mut data = Vec::new();
        if data.try_reserve_exact(len).is_err() {
            warn!(path = %path.display(), size, "cannot allocate ram disk buffer");
            return Err(DiskError::QuotaExceeded(size));
        }
        data.resize(len, 0);

        if let Err(err) = read_exact_at(&mut file, 0, &mut data) {
            warn!(path = %path.display(), size, %err, "ram disk read failed");
            return Err(err);
        }

        info!(path = %path.display(), size, "loaded ram disk");
        Ok(Self { data })
    }

    pub fn from_vec(data: Vec<u8>) -> Result<Self> {
        if data.is_empty() {
            return Err(DiskError::EmptyImage);
        }
        Ok(Self { data })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl DriveBackend for RamBackend {
    fn capacity_bytes(&self) -> u64 {
        self.data.len() as u64
    }

    fn read(
        &mut self,
        buf: &mut [u8],
        offset: u64,
        _tracker: &mut CompletionTracker,
        _completion: Completion,
    ) -> Result<IoStatus> {
        check_request(offset, buf.len(), self.capacity_bytes())?;
        let start = offset as usize;
        buf.copy_from_slice(&self.data[start..start + buf.len()]);
        Ok(IoStatus::Sync)
    }

    fn write(
        &mut self,
        buf: &[u8],
        offset: u64,
        _tracker: &mut CompletionTracker,
        _completion: Completion,
    ) -> Result<IoStatus> {
        check_request(offset, buf.len(), self.capacity_bytes())?;
        let start = offset as usize;
        self.data[start..start + buf.len()].copy_from_slice(buf);
        Ok(IoStatus::Sync)
    }
}
