use std::fs::{File, OpenOptions};
use std::path::Path;

use tracing::info;

use crate::cache::{BlockCache, CacheStats, BLOCK_SIZE};
use crate::util::{check_request, read_exact_at, write_all_at};
use crate::{
    Completion, CompletionTracker, DiskError, DriveBackend, IoStatus, Result, SECTOR_SIZE,
};

/// Flat image file on the host filesystem.
///
/// In *raw* mode every sector goes straight to the file, so writes persist. Otherwise the
/// file is opened read-only and a [`BlockCache`] acts as an in-session overlay: blocks are
/// pulled in on first touch, writes land in memory only, and nothing is ever written back.
pub struct FileBackend {
    file: File,
    image_size: u64,
    raw: bool,
    cache: BlockCache,
}

impl FileBackend {
    /// Open `path`. `modify_backing_file` selects raw pass-through mode and opens the file
    /// read-write; otherwise the file is opened read-only in cached overlay mode.
    pub fn open(path: impl AsRef<Path>, modify_backing_file: bool) -> Result<Self> {
        Self::open_with_block_size(path, modify_backing_file, BLOCK_SIZE)
    }

    pub fn open_with_block_size(
        path: impl AsRef<Path>,
        modify_backing_file: bool,
        block_size: usize,
    ) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(modify_backing_file)
            .open(path)?;
        let image_size = file.metadata()?.len();
        if image_size == 0 {
            return Err(DiskError::EmptyImage);
        }
        let cache = BlockCache::new(image_size, block_size)?;

        info!(
            path = %path.display(),
            image_size,
            raw = modify_backing_file,
            blocks = cache.block_count(),
            "opened file disk"
        );

        Ok(Self {
            file,
            image_size,
            raw: modify_backing_file,
            cache,
        })
    }

    pub fn is_raw(&self) -> bool {
        self.raw
    }

    pub fn cache(&self) -> &BlockCache {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

impl DriveBackend for FileBackend {
    fn capacity_bytes(&self) -> u64 {
        self.image_size
    }

    fn read(
        &mut self,
        buf: &mut [u8],
        offset: u64,
        _tracker: &mut CompletionTracker,
        _completion: Completion,
    ) -> Result<IoStatus> {
        check_request(offset, buf.len(), self.image_size)?;

        for (i, sector) in buf.chunks_exact_mut(SECTOR_SIZE).enumerate() {
            let pos = offset + (i * SECTOR_SIZE) as u64;
            if self.raw {
                read_exact_at(&mut self.file, pos, sector)?;
            } else {
                self.cache.read_sector(&mut self.file, pos, sector)?;
            }
        }
        Ok(IoStatus::Sync)
    }

    fn write(
        &mut self,
        buf: &[u8],
        offset: u64,
        _tracker: &mut CompletionTracker,
        _completion: Completion,
    ) -> Result<IoStatus> {
        check_request(offset, buf.len(), self.image_size)?;

        for (i, sector) in buf.chunks_exact(SECTOR_SIZE).enumerate() {
            let pos = offset + (i * SECTOR_SIZE) as u64;
            if self.raw {
                write_all_at(&mut self.file, pos, sector)?;
            } else {
                self.cache.write_sector(&mut self.file, pos, sector)?;
            }
        }
        Ok(IoStatus::Sync)
    }

    fn flush(&mut self) -> Result<()> {
        if self.raw {
            self.file.sync_data()?;
        }
        Ok(())
    }
}

impl Drop for FileBackend {
    fn drop(&mut self) {
        info!(
            resident_blocks = self.cache.resident_blocks(),
            "closed file disk"
        );
    }
}
