//! Block device abstraction (spec.md §4.1 / §6).
//!
//! A `BlockDevice` exposes fixed-size-block read/write over whatever backs
//! it; the device's own block size is always 512 bytes, matching the
//! teacher's `HalBlockDevice` contract (`hal/storage.rs`) minus the async
//! channel plumbing that only exists there because the teacher's I/O is
//! interrupt-driven.

pub mod ram;
pub mod registry;

use thiserror::Error;

pub const SECTOR_SIZE: u32 = 512;

#[derive(Debug, Error)]
pub enum BlockDeviceError {
    #[error("block range {block}..{} is out of bounds for a device with {block_count} blocks", block + count)]
    OutOfRange {
        block: u32,
        count: u32,
        block_count: u32,
    },
    #[error("buffer length {got} does not match the requested {expected} bytes")]
    BadBufferLen { expected: usize, got: usize },
    #[error("device is unavailable")]
    Unavailable,
}

/// A named, registrable block device. Device block size is fixed at
/// `SECTOR_SIZE` (512 bytes) and immutable per device, per spec.md §4.1.
pub trait BlockDevice: Send {
    /// Reads `count` consecutive blocks starting at `first_block` into
    /// `buffer` (`buffer.len() == count * block_size()`).
    fn read(&mut self, first_block: u32, count: u32, buffer: &mut [u8]) -> Result<(), BlockDeviceError>;

    /// Writes `count` consecutive blocks starting at `first_block` from
    /// `buffer`.
    fn write(&mut self, first_block: u32, count: u32, buffer: &[u8]) -> Result<(), BlockDeviceError>;

    /// Total number of addressable blocks.
    fn block_count(&self) -> u32;

    /// Block size in bytes; 512 for every device in this crate.
    fn block_size(&self) -> u32 {
        SECTOR_SIZE
    }
}

pub(crate) fn check_range(block: u32, count: u32, block_count: u32) -> Result<(), BlockDeviceError> {
    if count == 0 {
        return Ok(());
    }
    let end = block.checked_add(count).ok_or(BlockDeviceError::OutOfRange {
        block,
        count,
        block_count,
    })?;
    if end > block_count {
        return Err(BlockDeviceError::OutOfRange {
            block,
            count,
            block_count,
        });
    }
    Ok(())
}
