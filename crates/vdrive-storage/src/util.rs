use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};

use crate::{DiskError, Result, SECTOR_SIZE};

pub fn div_ceil_u64(n: u64, d: u64) -> Result<u64> {
    if d == 0 {
        return Err(DiskError::OffsetOverflow);
    }
    Ok(n.div_ceil(d))
}

/// Validate a sector-granular request against the image capacity.
pub fn check_request(offset: u64, len: usize, capacity: u64) -> Result<()> {
    if offset % SECTOR_SIZE as u64 != 0 || len % SECTOR_SIZE != 0 {
        return Err(DiskError::UnalignedRequest {
            offset,
            len,
            alignment: SECTOR_SIZE,
        });
    }
    checked_range(offset, len, capacity)
}

pub fn checked_range(offset: u64, len: usize, capacity: u64) -> Result<()> {
    let end = offset
        .checked_add(len as u64)
        .ok_or(DiskError::OffsetOverflow)?;
    if end > capacity {
        return Err(DiskError::OutOfBounds {
            offset,
            len,
            capacity,
        });
    }
    Ok(())
}

/// Seek to `offset` and fill `buf`, reporting a short read as [`DiskError::ShortTransfer`].
pub fn read_exact_at<R: Read + Seek>(source: &mut R, offset: u64, buf: &mut [u8]) -> Result<()> {
    source.seek(SeekFrom::Start(offset))?;
    let mut done = 0usize;
    while done < buf.len() {
        match source.read(&mut buf[done..]) {
            Ok(0) => break,
            Ok(n) => done += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    if done != buf.len() {
        return Err(DiskError::ShortTransfer {
            offset,
            expected: buf.len(),
            actual: done,
        });
    }
    Ok(())
}

/// Seek to `offset` and write all of `buf`, reporting a short write as
/// [`DiskError::ShortTransfer`].
pub fn write_all_at<W: Write + Seek>(sink: &mut W, offset: u64, buf: &[u8]) -> Result<()> {
    sink.seek(SeekFrom::Start(offset))?;
    let mut done = 0usize;
    while done < buf.len() {
        match sink.write(&buf[done..]) {
            Ok(0) => break,
            Ok(n) => done += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    if done != buf.len() {
        return Err(DiskError::ShortTransfer {
            offset,
            expected: buf.len(),
            actual: done,
        });
    }
    Ok(())
}
