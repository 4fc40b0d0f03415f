//! Symlink target storage (spec.md §4.6): targets up to 60 bytes are
//! stored inline across the inode's 15 `i_block` words ("fast symlinks"),
//! longer targets spill into a regular data block ("slow symlinks"), same
//! as upstream ext2 and the teacher's `drivers/fs/ext2/read.rs` handling.

use super::fs::Ext2Fs;
use super::{Ext2Error, Inode};

/// Inline storage capacity: 15 `u32` slots worth of bytes.
pub const FAST_SYMLINK_MAX_LEN: usize = 60;

impl Ext2Fs {
    pub fn read_symlink_target(&self, inode: &Inode) -> Result<String, Ext2Error> {
        let len = inode.i_size as usize;
        if len > FAST_SYMLINK_MAX_LEN && inode.i_blocks == 0 {
            return Err(Ext2Error::Corrupted("symlink claims slow storage with no blocks".into()));
        }
        if inode.i_blocks == 0 {
            // Fast symlink: bytes packed little-endian across i_block.
            let mut bytes = Vec::with_capacity(FAST_SYMLINK_MAX_LEN);
            for word in inode.i_block.iter() {
                bytes.extend_from_slice(&word.to_le_bytes());
            }
            bytes.truncate(len);
            return Ok(String::from_utf8_lossy(&bytes).into_owned());
        }
        let mut buf = vec![0u8; len];
        self.read_inode_data(inode, 0, &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Writes `target` into a freshly built symlink inode (`inode.i_size`
    /// and `i_block`/data are both set by this call; the caller still owns
    /// allocating the inode number and inserting the directory entry).
    pub fn write_symlink_target(
        &mut self,
        inode: &mut Inode,
        inode_num: u32,
        target: &str,
    ) -> Result<(), Ext2Error> {
        let bytes = target.as_bytes();
        inode.i_size = bytes.len() as u32;

        if bytes.len() <= FAST_SYMLINK_MAX_LEN {
            let mut padded = [0u8; FAST_SYMLINK_MAX_LEN];
            padded[..bytes.len()].copy_from_slice(bytes);
            for (i, word) in inode.i_block.iter_mut().enumerate() {
                let start = i * 4;
                *word = u32::from_le_bytes(padded[start..start + 4].try_into().unwrap());
            }
            self.write_inode(inode_num, inode)?;
        } else {
            self.write_inode_data(inode, inode_num, 0, bytes)?;
            self.write_inode(inode_num, inode)?;
        }
        Ok(())
    }
}
