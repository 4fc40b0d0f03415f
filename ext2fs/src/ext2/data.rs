//! Block mapping and byte-range read/write through an inode's `i_block`
//! array (spec.md §4.4). Reads follow direct blocks and the single-indirect
//! block; double and triple indirect addressing are out of scope entirely
//! (spec.md's Non-goals). Writes only ever allocate direct blocks — a write
//! reaching logical block 12 returns `Ext2Error::TooLarge` instead of
//! growing an indirect block, per spec.md §9's resolution of that ambiguity.

use dvida_serialize::{DvDeserialize, DvSerialize, Endianness};

use super::fs::Ext2Fs;
use super::{Ext2Error, Inode, DIRECT_BLOCKS, SINGLE_INDIRECT_IDX};

impl Ext2Fs {
    fn addrs_per_block(&self) -> u32 {
        self.superblock.addrs_per_block()
    }

    fn max_single_indirect_index(&self) -> u32 {
        DIRECT_BLOCKS as u32 + self.addrs_per_block()
    }

    pub(crate) fn read_indirect_ptr(&self, indirect_block: u32, index: u32) -> Result<u32, Ext2Error> {
        let block = self.read_block(indirect_block)?;
        let (ptr, _) = u32::deserialize(Endianness::Little, &block[index as usize * 4..])?;
        Ok(ptr)
    }

    pub(crate) fn write_indirect_ptr(&self, indirect_block: u32, index: u32, value: u32) -> Result<(), Ext2Error> {
        let mut block = self.read_block(indirect_block)?;
        value.serialize(Endianness::Little, &mut block[index as usize * 4..])?;
        self.write_block(indirect_block, &block)
    }

    /// Zeroes the pointer to logical block `idx` of `inode` without freeing
    /// anything (the caller frees the physical block first).
    pub(crate) fn clear_block_pointer(&self, inode: &mut Inode, idx: u32) -> Result<(), Ext2Error> {
        if idx < DIRECT_BLOCKS as u32 {
            inode.i_block[idx as usize] = 0;
            return Ok(());
        }
        let indirect_block = inode.i_block[SINGLE_INDIRECT_IDX];
        if indirect_block != 0 {
            self.write_indirect_ptr(indirect_block, idx - DIRECT_BLOCKS as u32, 0)?;
        }
        Ok(())
    }

    /// Looks up the physical block backing logical block `idx` of `inode`,
    /// without allocating. `None` means a hole (never written).
    pub fn lookup_block(&self, inode: &Inode, idx: u32) -> Result<Option<u32>, Ext2Error> {
        if idx < DIRECT_BLOCKS as u32 {
            let ptr = inode.i_block[idx as usize];
            return Ok(if ptr == 0 { None } else { Some(ptr) });
        }
        if idx < self.max_single_indirect_index() {
            let indirect_block = inode.i_block[SINGLE_INDIRECT_IDX];
            if indirect_block == 0 {
                return Ok(None);
            }
            let ptr = self.read_indirect_ptr(indirect_block, idx - DIRECT_BLOCKS as u32)?;
            return Ok(if ptr == 0 { None } else { Some(ptr) });
        }
        Err(Ext2Error::TooLarge)
    }

    /// Like `lookup_block`, but allocates direct blocks on demand so that
    /// writes past the current end of file work. Writes never extend into
    /// the single-indirect range: a write reaching logical block 12 fails
    /// with `Ext2Error::TooLarge` rather than growing an indirect block,
    /// matching the direct-blocks-only write ceiling this crate commits to.
    /// `inode` and its on-disk copy (keyed by `inode_num`) are both updated
    /// as pointers and `i_blocks` change.
    pub fn ensure_block(&mut self, inode: &mut Inode, inode_num: u32, idx: u32) -> Result<u32, Ext2Error> {
        let hint_group = self.group_index_of_inode(inode_num);

        if idx < DIRECT_BLOCKS as u32 {
            if inode.i_block[idx as usize] == 0 {
                let new_block = self.allocate_block(hint_group)?;
                self.zero_block(new_block)?;
                inode.i_block[idx as usize] = new_block;
                inode.i_blocks += self.block_size() / 512;
                self.write_inode(inode_num, inode)?;
            }
            return Ok(inode.i_block[idx as usize]);
        }

        Err(Ext2Error::TooLarge)
    }

    /// Reads up to `buf.len()` bytes starting at byte `offset`, clipped to
    /// `inode.i_size`. Returns the number of bytes actually read.
    pub fn read_inode_data(&self, inode: &Inode, offset: u64, buf: &mut [u8]) -> Result<usize, Ext2Error> {
        let size = inode.i_size as u64;
        if offset >= size {
            return Ok(0);
        }
        let to_read = buf.len().min((size - offset) as usize);
        let block_size = self.block_size() as u64;
        let mut done = 0usize;

        while done < to_read {
            let abs_offset = offset + done as u64;
            let logical_block = (abs_offset / block_size) as u32;
            let block_offset = (abs_offset % block_size) as usize;
            let chunk = (block_size as usize - block_offset).min(to_read - done);

            match self.lookup_block(inode, logical_block)? {
                Some(block_num) => {
                    let block = self.read_block(block_num)?;
                    buf[done..done + chunk].copy_from_slice(&block[block_offset..block_offset + chunk]);
                }
                None => {
                    buf[done..done + chunk].fill(0);
                }
            }
            done += chunk;
        }
        Ok(done)
    }

    /// Writes `data` at byte `offset`, allocating blocks as needed and
    /// extending `inode.i_size` if the write runs past the current end.
    /// Does not persist `inode` itself beyond pointer/size bookkeeping —
    /// callers update timestamps and call `write_inode` themselves.
    pub fn write_inode_data(
        &mut self,
        inode: &mut Inode,
        inode_num: u32,
        offset: u64,
        data: &[u8],
    ) -> Result<usize, Ext2Error> {
        let block_size = self.block_size() as u64;
        let mut done = 0usize;

        while done < data.len() {
            let abs_offset = offset + done as u64;
            let logical_block = (abs_offset / block_size) as u32;
            let block_offset = (abs_offset % block_size) as usize;
            let chunk = (block_size as usize - block_offset).min(data.len() - done);

            let physical = self.ensure_block(inode, inode_num, logical_block)?;
            let mut block = self.read_block(physical)?;
            block[block_offset..block_offset + chunk].copy_from_slice(&data[done..done + chunk]);
            self.write_block(physical, &block)?;
            done += chunk;
        }

        let new_size = offset + done as u64;
        if new_size > inode.i_size as u64 {
            inode.i_size = new_size as u32;
        }
        Ok(done)
    }
}
