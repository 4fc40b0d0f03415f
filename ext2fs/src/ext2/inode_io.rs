//! Inode lifecycle helpers layered on top of `fs`/`alloc`/`data`: building a
//! fresh inode, releasing all of an inode's data blocks, and truncation.
//! Grounded in the teacher's `drivers/fs/ext2/inode.rs`.

use std::time::{SystemTime, UNIX_EPOCH};

use super::fs::Ext2Fs;
use super::{DIRECT_BLOCKS, Ext2Error, Inode};

/// Seconds since the Unix epoch, used for `i_atime`/`i_ctime`/`i_mtime`.
/// Ext2 timestamps are 32-bit and will wrap in 2038, same as the format's
/// native limit — not a bug introduced here.
pub fn now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

impl Ext2Fs {
    /// Builds a zeroed inode with `mode` and ownership set, ready to be
    /// assigned a number via `allocate_inode` and written with `write_inode`.
    pub fn new_inode(&self, mode: u16, uid: u16, gid: u16) -> Inode {
        let t = now();
        Inode {
            i_mode: mode,
            i_uid: uid,
            i_size: 0,
            i_atime: t,
            i_ctime: t,
            i_mtime: t,
            i_dtime: 0,
            i_gid: gid,
            i_links_count: 1,
            i_blocks: 0,
            i_flags: 0,
            i_osd1: 0,
            i_block: [0; 15],
            i_generation: 0,
            i_file_acl: 0,
            i_dir_acl: 0,
            i_faddr: 0,
            i_osd2: [0; 12],
        }
    }

    /// Releases every data block (direct + single-indirect, including the
    /// indirect block itself) owned by `inode`, leaving `i_block` zeroed.
    /// Used by `unlink` once an inode's link count drops to zero and by
    /// `truncate` when shrinking to 0.
    pub fn free_all_blocks(&mut self, inode: &mut Inode) -> Result<(), Ext2Error> {
        for slot in inode.i_block[..DIRECT_BLOCKS].iter_mut() {
            if *slot != 0 {
                self.free_block(*slot)?;
                *slot = 0;
            }
        }
        let indirect = inode.i_block[super::SINGLE_INDIRECT_IDX];
        if indirect != 0 {
            let addrs = self.superblock.addrs_per_block();
            for i in 0..addrs {
                let ptr = self.read_indirect_ptr(indirect, i)?;
                if ptr != 0 {
                    self.free_block(ptr)?;
                }
            }
            self.free_block(indirect)?;
            inode.i_block[super::SINGLE_INDIRECT_IDX] = 0;
        }
        inode.i_blocks = 0;
        inode.i_size = 0;
        Ok(())
    }

    /// Shrinks `inode`'s data to `new_size` bytes, freeing any blocks fully
    /// beyond the new end. Growing via truncate (seeking past the current
    /// end without writing) is not supported; spec.md only requires shrink
    /// semantics for `vfs_truncate`.
    pub fn truncate_to(&mut self, inode: &mut Inode, inode_num: u32, new_size: u32) -> Result<(), Ext2Error> {
        if new_size >= inode.i_size {
            inode.i_size = new_size;
            self.write_inode(inode_num, inode)?;
            return Ok(());
        }
        if new_size == 0 {
            self.free_all_blocks(inode)?;
            self.write_inode(inode_num, inode)?;
            return Ok(());
        }

        let block_size = self.block_size();
        let first_free_logical = new_size.div_ceil(block_size);
        let old_num_blocks = inode.i_size.div_ceil(block_size);

        for logical in first_free_logical..old_num_blocks {
            if let Some(physical) = self.lookup_block(inode, logical)? {
                self.free_block(physical)?;
                self.clear_block_pointer(inode, logical)?;
            }
        }
        inode.i_size = new_size;
        self.write_inode(inode_num, inode)?;
        Ok(())
    }
}
