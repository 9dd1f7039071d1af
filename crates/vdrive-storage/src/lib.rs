//! Virtual block storage for the emulated IDE drives.
//!
//! Device emulation sees every drive as a flat array of 512-byte sectors. Behind that, bytes
//! come from one of several interchangeable backends:
//!
//! - [`FileBackend`]: image file on the host, either raw pass-through or with a lazily
//!   populated 256 KiB [`BlockCache`] acting as an in-session write overlay
//! - [`RamBackend`]: whole image loaded into memory at open time
//! - [`SegmentedLayout`]: directory images (layout only; not openable)
//!
//! [`Drive`] is the handle the controller holds. Requests either finish in-line
//! ([`IoStatus::Sync`]) or are parked on the caller-owned [`CompletionTracker`], which the
//! scheduler polls once per tick.

mod backend;
mod backends;
mod cache;
mod completion;
mod config;
mod drive;
mod error;
mod geometry;
mod segmented;
mod util;

pub use backend::{DriveBackend, IoStatus};
pub use backends::{FileBackend, RamBackend};
pub use cache::{BlockCache, CacheStats, BLOCK_SIZE};
pub use completion::{Completion, CompletionTracker};
pub use config::{BackendSelect, DriveConfig};
pub use drive::{autodetect, BackendKind, Drive, ImageKind};
pub use error::{DiskError, Result};
pub use geometry::{Chs, Geometry, HEADS, SECTORS_PER_TRACK};
pub use segmented::{BlockRecord, SegmentInfo, SegmentedLayout, INFO_FILE_NAME};

pub const SECTOR_SIZE: usize = 512;

#[cfg(test)]
mod proptests;
