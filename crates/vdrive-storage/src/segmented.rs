//! On-disk layout of segmented (directory) images.
//!
//! A segmented image is a directory holding an `info.dat` record followed by the image data
//! split across one or more backing paths. Only the layout is modelled here: the table of
//! backing paths and one record per block naming its origin path. Block loading and merging
//! of layered paths are not implemented, so these images cannot be opened as a
//! [`Drive`](crate::Drive).

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::util::div_ceil_u64;
use crate::{DiskError, Result, SECTOR_SIZE};

pub const INFO_FILE_NAME: &str = "info.dat";
const INFO_LEN: usize = 8;

/// Contents of `info.dat`: two little-endian `u32` values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentInfo {
    pub size: u32,
    pub block_size: u32,
}

impl SegmentInfo {
    pub fn parse(raw: &[u8]) -> Result<Self> {
        if raw.len() < INFO_LEN {
            return Err(DiskError::CorruptImage("info.dat is truncated"));
        }
        let size = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
        let block_size = u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]);
        if block_size == 0 || block_size as usize % SECTOR_SIZE != 0 {
            return Err(DiskError::CorruptImage(
                "block size must be a non-zero multiple of 512",
            ));
        }
        Ok(Self { size, block_size })
    }

    pub fn to_bytes(self) -> [u8; INFO_LEN] {
        let mut out = [0u8; INFO_LEN];
        out[..4].copy_from_slice(&self.size.to_le_bytes());
        out[4..].copy_from_slice(&self.block_size.to_le_bytes());
        out
    }
}

#[derive(Debug, Default)]
pub struct BlockRecord {
    /// Index into [`SegmentedLayout::paths`] of the path this block is sourced from.
    pub path_index: u32,
    pub dirty: bool,
    pub data: Option<Box<[u8]>>,
}

#[derive(Debug)]
pub struct SegmentedLayout {
    info: SegmentInfo,
    paths: Vec<PathBuf>,
    blocks: Vec<BlockRecord>,
}

impl SegmentedLayout {
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let raw = std::fs::read(dir.join(INFO_FILE_NAME))?;
        let info = SegmentInfo::parse(&raw)?;
        let count = div_ceil_u64(u64::from(info.size), u64::from(info.block_size))?;
        let blocks = (0..count).map(|_| BlockRecord::default()).collect();
        Ok(Self {
            info,
            paths: vec![dir.to_path_buf()],
            blocks,
        })
    }

    pub fn info(&self) -> SegmentInfo {
        self.info
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn blocks(&self) -> &[BlockRecord] {
        &self.blocks
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn dirty_blocks(&self) -> usize {
        self.blocks.iter().filter(|b| b.dirty).count()
    }
}
