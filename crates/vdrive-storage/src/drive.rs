use std::path::Path;

use serde::Serialize;
use tracing::{error, info};

use crate::util::check_request;
use crate::{
    BackendSelect, Completion, CompletionTracker, DiskError, DriveBackend, DriveConfig,
    FileBackend, Geometry, IoStatus, RamBackend, Result, SECTOR_SIZE,
};

/// Classification of an image path before opening it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    /// Ordinary file holding a flat sector array.
    Raw,
    /// Directory holding a segmented image (`info.dat` plus per-path image files).
    Segmented,
    /// `http://` / `https://` source.
    Url,
    /// The path could not be opened or inspected.
    Missing,
}

impl ImageKind {
    /// Legacy status code: positive for openable images, negative otherwise.
    pub fn code(self) -> i32 {
        match self {
            ImageKind::Raw => 1,
            ImageKind::Segmented | ImageKind::Url | ImageKind::Missing => -1,
        }
    }

    pub fn is_openable(self) -> bool {
        self.code() > 0
    }
}

/// Inspect `path` and decide what kind of image it names.
pub fn autodetect(path: impl AsRef<Path>) -> ImageKind {
    let path = path.as_ref();
    let text = path.to_string_lossy();
    if text.contains("http://") || text.contains("https://") {
        return ImageKind::Url;
    }
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => ImageKind::Segmented,
        Ok(_) => ImageKind::Raw,
        Err(_) => ImageKind::Missing,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    File,
    Ram,
    /// Supplied by the embedder through [`Drive::with_backend`].
    External,
}

/// An emulated disk as seen by the storage controller.
///
/// Every request is checked before it reaches the backend: offsets and lengths must be whole
/// 512-byte sectors inside the image. A request that breaks this, or that the backend cannot
/// complete because the medium misbehaves, is a bug in the caller or a broken image rather
/// than something the controller can retry, so it panics after logging the cause.
pub struct Drive {
    backend: Box<dyn DriveBackend>,
    kind: BackendKind,
    geometry: Geometry,
    modify_backing_file: bool,
}

impl Drive {
    pub fn open(config: &DriveConfig) -> Result<Self> {
        config.validate()?;
        let path = config.path.as_path();
        match autodetect(path) {
            ImageKind::Url => return Err(DiskError::Unsupported("network images")),
            ImageKind::Segmented => return Err(DiskError::Unsupported("segmented images")),
            // Let the backend surface the underlying I/O error.
            ImageKind::Raw | ImageKind::Missing => {}
        }

        let (backend, kind): (Box<dyn DriveBackend>, BackendKind) = match config.backend {
            BackendSelect::Auto | BackendSelect::File => (
                Box::new(FileBackend::open(path, config.modify_backing_file)?),
                BackendKind::File,
            ),
            BackendSelect::Ram => (Box::new(RamBackend::open(path)?), BackendKind::Ram),
        };
        // RAM images are never written back, whatever the config asks for.
        let persists = config.modify_backing_file && kind == BackendKind::File;
        let drive = Self::from_parts(backend, kind, persists)?;
        info!(
            path = %path.display(),
            backend = ?kind,
            sectors = drive.geometry.sectors,
            cylinders = drive.geometry.cylinders,
            heads = drive.geometry.heads,
            spt = drive.geometry.sectors_per_track,
            "drive ready"
        );
        Ok(drive)
    }

    /// Wrap a backend the embedder built itself (e.g. one that completes asynchronously).
    pub fn with_backend(backend: Box<dyn DriveBackend>, modify_backing_file: bool) -> Result<Self> {
        Self::from_parts(backend, BackendKind::External, modify_backing_file)
    }

    fn from_parts(
        backend: Box<dyn DriveBackend>,
        kind: BackendKind,
        modify_backing_file: bool,
    ) -> Result<Self> {
        let capacity = backend.capacity_bytes();
        if capacity < SECTOR_SIZE as u64 {
            return Err(DiskError::EmptyImage);
        }
        Ok(Self {
            backend,
            kind,
            geometry: Geometry::from_capacity(capacity),
            modify_backing_file,
        })
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn capacity_bytes(&self) -> u64 {
        self.backend.capacity_bytes()
    }

    pub fn total_sectors(&self) -> u64 {
        self.geometry.sectors
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.kind
    }

    /// Whether guest writes reach the image file. Always false for RAM-backed drives.
    pub fn modifies_backing_store(&self) -> bool {
        self.modify_backing_file
    }

    /// Read `buf.len()` bytes at `offset`.
    ///
    /// On [`IoStatus::Pending`] the buffer has not been filled; re-issue the read after the
    /// completion fires. A second asynchronous request while one is pending returns
    /// [`DiskError::TransferInProgress`].
    ///
    /// # Panics
    ///
    /// If `offset` or `buf.len()` is not a multiple of 512, the range leaves the image, or the
    /// backing medium returns short or failed I/O.
    pub fn read(
        &mut self,
        tracker: &mut CompletionTracker,
        buf: &mut [u8],
        offset: u64,
        completion: Completion,
    ) -> Result<IoStatus> {
        self.check(offset, buf.len());
        escalate(self.backend.read(buf, offset, tracker, completion))
    }

    /// Write `buf` at `offset`. Same contract as [`Drive::read`].
    pub fn write(
        &mut self,
        tracker: &mut CompletionTracker,
        buf: &[u8],
        offset: u64,
        completion: Completion,
    ) -> Result<IoStatus> {
        self.check(offset, buf.len());
        escalate(self.backend.write(buf, offset, tracker, completion))
    }

    /// Hint that `[offset, offset + len)` will be read soon.
    ///
    /// Hints are not validated here; synchronous backends ignore them and any error the
    /// backend reports is returned as-is.
    pub fn prefetch(
        &mut self,
        tracker: &mut CompletionTracker,
        len: usize,
        offset: u64,
        completion: Completion,
    ) -> Result<IoStatus> {
        self.backend.prefetch(len, offset, tracker, completion)
    }

    pub fn save_state(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.backend.save_state(path.as_ref())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.backend.flush()
    }

    fn check(&self, offset: u64, len: usize) {
        if let Err(err) = check_request(offset, len, self.capacity_bytes()) {
            fatal(err);
        }
    }
}

impl Drop for Drive {
    fn drop(&mut self) {
        info!(backend = ?self.kind, "drive closed");
    }
}

fn escalate(result: Result<IoStatus>) -> Result<IoStatus> {
    match result {
        Err(err) if err.is_fatal() => fatal(err),
        other => other,
    }
}

fn fatal(err: DiskError) -> ! {
    error!(%err, "unrecoverable drive error");
    panic!("drive: {err}");
}
