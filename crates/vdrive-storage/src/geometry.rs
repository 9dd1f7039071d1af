//! Legacy CHS geometry derived from image size.
//!
//! The IDE controller and BIOS address drives by LBA, but both still report a
//! cylinder/head/sector triple. Heads and sectors-per-track are fixed at the conventional
//! translation values and the cylinder count is whatever remains, so every image gets a
//! self-consistent triple regardless of where it came from.

use serde::Serialize;

use crate::SECTOR_SIZE;

pub const HEADS: u32 = 16;
pub const SECTORS_PER_TRACK: u32 = 63;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Geometry {
    pub sectors: u64,
    pub sectors_per_track: u32,
    pub heads: u32,
    pub cylinders: u64,
}

/// A 1-based CHS address as seen by INT 13h / IDE CHS mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Chs {
    pub cylinder: u64,
    pub head: u32,
    pub sector: u32,
}

impl Geometry {
    /// Derive geometry from a byte size. Trailing bytes short of a full sector are ignored.
    pub fn from_capacity(capacity_bytes: u64) -> Self {
        let sectors = capacity_bytes / SECTOR_SIZE as u64;
        Self {
            sectors,
            sectors_per_track: SECTORS_PER_TRACK,
            heads: HEADS,
            cylinders: sectors / u64::from(SECTORS_PER_TRACK * HEADS),
        }
    }

    pub fn capacity_bytes(&self) -> u64 {
        self.sectors * SECTOR_SIZE as u64
    }

    pub fn lba_to_chs(&self, lba: u64) -> Chs {
        let spt = u64::from(self.sectors_per_track);
        let heads = u64::from(self.heads);
        Chs {
            cylinder: lba / (spt * heads),
            head: ((lba / spt) % heads) as u32,
            sector: (lba % spt) as u32 + 1,
        }
    }

    /// Translate a CHS address back to LBA. Returns `None` for sector 0 or out-of-range
    /// head/sector values.
    pub fn chs_to_lba(&self, chs: Chs) -> Option<u64> {
        if chs.sector == 0 || chs.sector > self.sectors_per_track || chs.head >= self.heads {
            return None;
        }
        let spt = u64::from(self.sectors_per_track);
        let lba = (chs.cylinder * u64::from(self.heads) + u64::from(chs.head)) * spt
            + u64::from(chs.sector - 1);
        Some(lba)
    }
}
