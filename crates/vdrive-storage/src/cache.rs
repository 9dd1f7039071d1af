use std::io::{Read, Seek};

use tracing::debug;

use crate::util::{checked_range, div_ceil_u64, read_exact_at};
use crate::{DiskError, Result, SECTOR_SIZE};

/// Cache granularity for file-backed images (256 KiB).
pub const BLOCK_SIZE: usize = 256 * 1024;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub blocks_loaded: u64,
}

/// Lazily-populated arena of fixed-size blocks covering a whole image.
///
/// Slot `i` covers bytes `[i * block_size, (i + 1) * block_size)`. A slot stays empty until
/// a sector inside it is first touched, at which point the full block is read from the
/// backing source. Blocks are never evicted and never written back: modifications live in
/// memory for as long as the cache does.
pub struct BlockCache {
    block_size: usize,
    capacity: u64,
    blocks: Vec<Option<Box<[u8]>>>,
    stats: CacheStats,
}

impl BlockCache {
    pub fn new(capacity: u64, block_size: usize) -> Result<Self> {
        if block_size == 0 || block_size % SECTOR_SIZE != 0 {
            return Err(DiskError::InvalidConfig(
                "block size must be a non-zero multiple of the sector size",
            ));
        }
        let count = div_ceil_u64(capacity, block_size as u64)?;
        let count = usize::try_from(count).map_err(|_| DiskError::OffsetOverflow)?;
        let mut blocks = Vec::new();
        blocks
            .try_reserve_exact(count)
            .map_err(|_| DiskError::QuotaExceeded(capacity))?;
        blocks.resize_with(count, || None);
        Ok(Self {
            block_size,
            capacity,
            blocks,
            stats: CacheStats::default(),
        })
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn resident_blocks(&self) -> usize {
        self.blocks.iter().filter(|b| b.is_some()).count()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Copy one sector at `offset` into `out`, loading its block from `source` if needed.
    pub fn read_sector<S: Read + Seek>(
        &mut self,
        source: &mut S,
        offset: u64,
        out: &mut [u8],
    ) -> Result<()> {
        let (block, within) = self.sector_slot(source, offset, out.len())?;
        out.copy_from_slice(&block[within..within + out.len()]);
        Ok(())
    }

    /// Overwrite one sector at `offset` in memory, loading its block from `source` first so
    /// the rest of the block stays intact. `source` is never written.
    pub fn write_sector<S: Read + Seek>(
        &mut self,
        source: &mut S,
        offset: u64,
        data: &[u8],
    ) -> Result<()> {
        let (block, within) = self.sector_slot(source, offset, data.len())?;
        block[within..within + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn sector_slot<S: Read + Seek>(
        &mut self,
        source: &mut S,
        offset: u64,
        len: usize,
    ) -> Result<(&mut [u8], usize)> {
        if offset % SECTOR_SIZE as u64 != 0 || len != SECTOR_SIZE {
            return Err(DiskError::UnalignedRequest {
                offset,
                len,
                alignment: SECTOR_SIZE,
            });
        }
        checked_range(offset, len, self.capacity)?;

        let idx = (offset / self.block_size as u64) as usize;
        let within = (offset % self.block_size as u64) as usize;
        if self.blocks[idx].is_some() {
            self.stats.hits += 1;
        } else {
            self.stats.misses += 1;
        }
        let block = self.ensure_block_loaded(source, idx)?;
        Ok((block, within))
    }

    fn ensure_block_loaded<S: Read + Seek>(
        &mut self,
        source: &mut S,
        idx: usize,
    ) -> Result<&mut [u8]> {
        let block_size = self.block_size;
        let slot = &mut self.blocks[idx];
        match slot {
            Some(block) => Ok(&mut block[..]),
            None => {
                let start = idx as u64 * block_size as u64;
                // The last block of an image that isn't a block multiple is only partly backed.
                let backed = (self.capacity - start).min(block_size as u64) as usize;

                let mut data = Vec::new();
                data.try_reserve_exact(block_size)
                    .map_err(|_| DiskError::QuotaExceeded(block_size as u64))?;
                data.resize(block_size, 0);
                read_exact_at(source, start, &mut data[..backed])?;

                debug!(block = idx, start, backed, "loaded cache block");
                self.stats.blocks_loaded += 1;
                Ok(&mut slot.insert(data.into_boxed_slice())[..])
            }
        }
    }
}
