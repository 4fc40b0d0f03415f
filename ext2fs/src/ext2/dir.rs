//! Directory entry iteration, lookup, insertion and removal (spec.md §4.5,
//! grounded in the teacher's `drivers/fs/ext2/dirs.rs`). Entry insertion
//! reuses slack at the tail of an existing `rec_len` before allocating a
//! new block; removal merges the freed span into the preceding entry's
//! `rec_len` rather than physically compacting the block (the standard
//! ext2 tombstone convention spec.md §4.9 calls out).

use super::fs::Ext2Fs;
use super::{
    round_up_4, DirEntry, Ext2Error, Inode, DIR_ENTRY_HEADER_LEN, EXT2_FT_DIR,
};

impl Ext2Fs {
    /// All live entries of a directory, across every allocated data block,
    /// in on-disk order. Stops (rather than erroring) the moment a block
    /// runs out of valid entries — a `rec_len` of 0 before the block is
    /// exhausted is treated as corruption.
    pub fn list_dir_entries(&self, dir_inode: &Inode) -> Result<Vec<DirEntry>, Ext2Error> {
        if !dir_inode.is_directory() {
            return Err(Ext2Error::NotADirectory);
        }
        let block_size = self.block_size() as u64;
        let num_blocks = dir_inode.i_size as u64 / block_size;
        let mut entries = Vec::new();

        for logical in 0..num_blocks as u32 {
            let Some(physical) = self.lookup_block(dir_inode, logical)? else {
                continue;
            };
            let block = self.read_block(physical)?;
            let mut pos = 0usize;
            while pos < block.len() {
                let entry = DirEntry::parse(&block[pos..])?;
                if entry.rec_len == 0 {
                    return Err(Ext2Error::Corrupted(
                        "directory entry rec_len is zero before end of block".into(),
                    ));
                }
                if entry.inode != 0 {
                    entries.push(entry.clone());
                }
                pos += entry.rec_len as usize;
            }
        }
        Ok(entries)
    }

    pub fn lookup_entry(&self, dir_inode: &Inode, name: &str) -> Result<Option<DirEntry>, Ext2Error> {
        Ok(self
            .list_dir_entries(dir_inode)?
            .into_iter()
            .find(|e| e.name == name))
    }

    pub fn is_dir_empty(&self, dir_inode: &Inode) -> Result<bool, Ext2Error> {
        Ok(self
            .list_dir_entries(dir_inode)?
            .iter()
            .all(|e| e.name == "." || e.name == ".."))
    }

    /// Writes the initial `.`/`..` entries into a freshly allocated
    /// directory's first data block.
    pub fn init_directory_block(
        &mut self,
        dir_inode: &mut Inode,
        dir_inode_num: u32,
        parent_inode_num: u32,
    ) -> Result<(), Ext2Error> {
        let physical = self.ensure_block(dir_inode, dir_inode_num, 0)?;
        let block_size = self.block_size() as usize;
        let mut block = vec![0u8; block_size];

        let mut dot = DirEntry::new(dir_inode_num, ".".to_string(), EXT2_FT_DIR);
        dot.rec_len = (DIR_ENTRY_HEADER_LEN + round_up_4(1)) as u16;
        let mut dotdot = DirEntry::new(parent_inode_num, "..".to_string(), EXT2_FT_DIR);
        let remaining = block_size - dot.rec_len as usize;
        dotdot.rec_len = remaining as u16;

        dot.write_into(&mut block[..dot.rec_len as usize])?;
        let dotdot_off = dot.rec_len as usize;
        dotdot.write_into(&mut block[dotdot_off..dotdot_off + DIR_ENTRY_HEADER_LEN + dotdot.name.len()])?;

        self.write_block(physical, &block)?;
        dir_inode.i_size = block_size as u32;
        self.write_inode(dir_inode_num, dir_inode)?;
        Ok(())
    }

    /// Inserts a new entry, reusing slack in an existing block if any entry
    /// has `rec_len` large enough to hold both itself and the new entry;
    /// otherwise grows the directory by one block.
    pub fn add_entry(
        &mut self,
        dir_inode: &mut Inode,
        dir_inode_num: u32,
        name: &str,
        target_inode: u32,
        file_type: u8,
    ) -> Result<(), Ext2Error> {
        if self.lookup_entry(dir_inode, name)?.is_some() {
            return Err(Ext2Error::AlreadyExists);
        }
        let new_entry = DirEntry::new(target_inode, name.to_string(), file_type);
        let needed = new_entry.min_rec_len();

        let block_size = self.block_size() as u64;
        let num_blocks = dir_inode.i_size as u64 / block_size;

        for logical in 0..num_blocks as u32 {
            let Some(physical) = self.lookup_block(dir_inode, logical)? else {
                continue;
            };
            let mut block = self.read_block(physical)?;
            let mut pos = 0usize;
            while pos < block.len() {
                let existing = DirEntry::parse(&block[pos..])?;
                if existing.rec_len == 0 {
                    return Err(Ext2Error::Corrupted("rec_len is zero mid-block".into()));
                }
                let used = if existing.inode == 0 { 0 } else { existing.min_rec_len() };
                let slack = existing.rec_len - used;

                if slack >= needed {
                    if used > 0 {
                        let mut shrunk = existing.clone();
                        shrunk.rec_len = used;
                        shrunk.write_into(&mut block[pos..pos + used as usize])?;
                    }
                    let insert_at = pos + used as usize;
                    let mut to_insert = new_entry.clone();
                    to_insert.rec_len = existing.rec_len - used;
                    to_insert.write_into(
                        &mut block[insert_at..insert_at + DIR_ENTRY_HEADER_LEN + to_insert.name.len()],
                    )?;
                    self.write_block(physical, &block)?;
                    return Ok(());
                }
                pos += existing.rec_len as usize;
            }
        }

        // No slack anywhere: grow the directory by one block, single entry
        // filling it whole.
        let new_logical = num_blocks as u32;
        let physical = self.ensure_block(dir_inode, dir_inode_num, new_logical)?;
        let mut block = vec![0u8; self.block_size() as usize];
        let mut to_insert = new_entry;
        to_insert.rec_len = self.block_size() as u16;
        to_insert.write_into(&mut block[..DIR_ENTRY_HEADER_LEN + to_insert.name.len()])?;
        self.write_block(physical, &block)?;

        dir_inode.i_size += self.block_size();
        self.write_inode(dir_inode_num, dir_inode)?;
        Ok(())
    }

    /// Removes the entry named `name`: merges its span into the preceding
    /// entry in the same block (or, if it is the first entry, zeroes its
    /// inode number and leaves the slot as slack for `add_entry` to reuse).
    /// Returns the inode number the entry pointed at.
    pub fn remove_entry(
        &mut self,
        dir_inode: &Inode,
        name: &str,
    ) -> Result<u32, Ext2Error> {
        let block_size = self.block_size() as u64;
        let num_blocks = dir_inode.i_size as u64 / block_size;

        for logical in 0..num_blocks as u32 {
            let Some(physical) = self.lookup_block(dir_inode, logical)? else {
                continue;
            };
            let mut block = self.read_block(physical)?;
            let mut pos = 0usize;
            let mut prev_pos: Option<usize> = None;

            while pos < block.len() {
                let entry = DirEntry::parse(&block[pos..])?;
                if entry.rec_len == 0 {
                    return Err(Ext2Error::Corrupted("rec_len is zero mid-block".into()));
                }
                if entry.name == name && entry.inode != 0 {
                    let removed_inode = entry.inode;
                    if let Some(prev) = prev_pos {
                        let mut prev_entry = DirEntry::parse(&block[prev..])?;
                        prev_entry.rec_len += entry.rec_len;
                        prev_entry.write_into(
                            &mut block[prev..prev + DIR_ENTRY_HEADER_LEN + prev_entry.name.len()],
                        )?;
                    } else {
                        let mut tombstone = entry.clone();
                        tombstone.inode = 0;
                        tombstone.write_into(&mut block[pos..pos + DIR_ENTRY_HEADER_LEN + tombstone.name.len()])?;
                    }
                    self.write_block(physical, &block)?;
                    return Ok(removed_inode);
                }
                prev_pos = Some(pos);
                pos += entry.rec_len as usize;
            }
        }
        Err(Ext2Error::NotFound(name.to_string()))
    }
}
