//! RAM-backed block device (spec.md §4.1: "The RAM-backed device owns a
//! byte buffer of size block_count × 512 and copies bytes on read/write").

use super::{BlockDevice, BlockDeviceError, check_range, SECTOR_SIZE};

#[derive(Debug)]
pub struct RamDisk {
    data: Vec<u8>,
    block_count: u32,
}

impl RamDisk {
    pub fn new(block_count: u32) -> Self {
        Self {
            data: vec![0u8; block_count as usize * SECTOR_SIZE as usize],
            block_count,
        }
    }

    /// Convenience constructor sized in bytes, rounded down to a whole
    /// number of 512-byte blocks.
    pub fn with_capacity_bytes(bytes: usize) -> Self {
        Self::new((bytes / SECTOR_SIZE as usize) as u32)
    }
}

impl BlockDevice for RamDisk {
    fn read(&mut self, first_block: u32, count: u32, buffer: &mut [u8]) -> Result<(), BlockDeviceError> {
        check_range(first_block, count, self.block_count)?;
        let expected = count as usize * SECTOR_SIZE as usize;
        if buffer.len() != expected {
            return Err(BlockDeviceError::BadBufferLen {
                expected,
                got: buffer.len(),
            });
        }
        let start = first_block as usize * SECTOR_SIZE as usize;
        buffer.copy_from_slice(&self.data[start..start + expected]);
        Ok(())
    }

    fn write(&mut self, first_block: u32, count: u32, buffer: &[u8]) -> Result<(), BlockDeviceError> {
        check_range(first_block, count, self.block_count)?;
        let expected = count as usize * SECTOR_SIZE as usize;
        if buffer.len() != expected {
            return Err(BlockDeviceError::BadBufferLen {
                expected,
                got: buffer.len(),
            });
        }
        let start = first_block as usize * SECTOR_SIZE as usize;
        self.data[start..start + expected].copy_from_slice(buffer);
        Ok(())
    }

    fn block_count(&self) -> u32 {
        self.block_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_write_round_trips() {
        let mut disk = RamDisk::new(4);
        let payload = vec![0xAB; SECTOR_SIZE as usize * 2];
        disk.write(1, 2, &payload).unwrap();

        let mut out = vec![0u8; SECTOR_SIZE as usize * 2];
        disk.read(1, 2, &mut out).unwrap();
        assert_eq!(out, payload);
    }

    #[test]
    fn out_of_range_fails_without_partial_effect() {
        let mut disk = RamDisk::new(2);
        let before = {
            let mut buf = vec![0u8; SECTOR_SIZE as usize * 2];
            disk.read(0, 2, &mut buf).unwrap();
            buf
        };

        let payload = vec![0xFF; SECTOR_SIZE as usize * 2];
        assert!(disk.write(1, 2, &payload).is_err());

        let mut after = vec![0u8; SECTOR_SIZE as usize * 2];
        disk.read(0, 2, &mut after).unwrap();
        assert_eq!(before, after);
    }
}
