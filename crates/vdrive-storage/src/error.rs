use thiserror::Error;

pub type Result<T> = std::result::Result<T, DiskError>;

/// Unified error type for drive and backend operations.
///
/// Two classes of failure share this enum. Open-time failures (missing file, empty image,
/// allocation failure, bad configuration) are handed back to whoever opened the drive so it
/// can decide whether to continue without it. Request-time failures such as misaligned or
/// out-of-range requests and short transfers against the backing file are classified by
/// [`DiskError::is_fatal`]; the drive never returns those to the caller.
#[derive(Debug, Error)]
pub enum DiskError {
    #[error("unaligned request: offset={offset} len={len} (expected multiples of {alignment})")]
    UnalignedRequest {
        offset: u64,
        len: usize,
        alignment: usize,
    },

    #[error("out of bounds: offset={offset} len={len} capacity={capacity}")]
    OutOfBounds {
        offset: u64,
        len: usize,
        capacity: u64,
    },

    #[error("integer overflow while computing byte offsets")]
    OffsetOverflow,

    #[error("short transfer at offset {offset}: expected {expected} bytes, got {actual}")]
    ShortTransfer {
        offset: u64,
        expected: usize,
        actual: usize,
    },

    #[error("image is empty")]
    EmptyImage,

    #[error("unable to allocate {0} bytes for image")]
    QuotaExceeded(u64),

    #[error("unsupported image source: {0}")]
    Unsupported(&'static str),

    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    #[error("unable to parse drive configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("corrupt disk image: {0}")]
    CorruptImage(&'static str),

    #[error("a transfer is already in progress")]
    TransferInProgress,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DiskError {
    /// Whether this error represents a condition the storage layer cannot recover from once a
    /// request is in flight.
    ///
    /// Misaligned or out-of-range requests are caller defects (emulated hardware never issues
    /// them) and a short or failed transfer means the medium itself is unreadable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DiskError::UnalignedRequest { .. }
                | DiskError::OutOfBounds { .. }
                | DiskError::OffsetOverflow
                | DiskError::ShortTransfer { .. }
                | DiskError::Io(_)
        )
    }
}
