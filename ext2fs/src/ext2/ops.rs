//! Directory-relative create/unlink/chmod/chown operations (spec.md §4.7),
//! layered on `alloc`, `data`, `dir` and `inode_io`. Path walking lives in
//! the `vfs` facade; everything here takes an already-resolved parent
//! directory inode and a single leaf name.

use super::fs::Ext2Fs;
use super::inode_io::now;
use super::{Ext2Error, Inode, EXT2_FT_DIR, EXT2_FT_REG_FILE, EXT2_S_IFDIR, EXT2_S_IFREG, MAX_NAME_LEN};

fn check_name_len(name: &str) -> Result<(), Ext2Error> {
    if name.len() > MAX_NAME_LEN {
        return Err(Ext2Error::InvalidArgument("directory entry name too long".into()));
    }
    Ok(())
}

impl Ext2Fs {
    /// Creates a regular file named `name` in `parent` and returns its new
    /// inode number.
    pub fn create_file(
        &mut self,
        parent: &mut Inode,
        parent_num: u32,
        name: &str,
        mode: u16,
        uid: u16,
        gid: u16,
    ) -> Result<u32, Ext2Error> {
        check_name_len(name)?;
        if !parent.is_directory() {
            return Err(Ext2Error::NotADirectory);
        }
        if self.lookup_entry(parent, name)?.is_some() {
            return Err(Ext2Error::AlreadyExists);
        }
        let hint_group = self.group_index_of_inode(parent_num);
        let new_num = self.allocate_inode(hint_group, false)?;
        let inode = self.new_inode(EXT2_S_IFREG | (mode & 0x0FFF), uid, gid);
        self.write_inode(new_num, &inode)?;
        self.add_entry(parent, parent_num, name, new_num, EXT2_FT_REG_FILE)?;
        Ok(new_num)
    }

    /// Creates a subdirectory named `name` in `parent`, wired up with its
    /// own `.`/`..` entries, and returns its new inode number.
    pub fn create_directory(
        &mut self,
        parent: &mut Inode,
        parent_num: u32,
        name: &str,
        mode: u16,
        uid: u16,
        gid: u16,
    ) -> Result<u32, Ext2Error> {
        check_name_len(name)?;
        if !parent.is_directory() {
            return Err(Ext2Error::NotADirectory);
        }
        if self.lookup_entry(parent, name)?.is_some() {
            return Err(Ext2Error::AlreadyExists);
        }
        let hint_group = self.group_index_of_inode(parent_num);
        let new_num = self.allocate_inode(hint_group, true)?;
        let mut inode = self.new_inode(EXT2_S_IFDIR | (mode & 0x0FFF), uid, gid);
        inode.i_links_count = 2;
        self.write_inode(new_num, &inode)?;
        self.init_directory_block(&mut inode, new_num, parent_num)?;

        self.add_entry(parent, parent_num, name, new_num, EXT2_FT_DIR)?;
        parent.i_links_count += 1;
        self.write_inode(parent_num, parent)?;
        Ok(new_num)
    }

    /// Removes the directory entry named `name` from `parent` and, if the
    /// target inode's link count drops to zero, frees its blocks and the
    /// inode itself. Refuses to remove a non-empty directory.
    pub fn unlink(&mut self, parent: &mut Inode, parent_num: u32, name: &str) -> Result<(), Ext2Error> {
        let entry = self
            .lookup_entry(parent, name)?
            .ok_or_else(|| Ext2Error::NotFound(name.to_string()))?;
        let mut target = self.read_inode(entry.inode)?;

        let was_dir = target.is_directory();
        if was_dir && !self.is_dir_empty(&target)? {
            return Err(Ext2Error::NotEmpty);
        }

        self.remove_entry(parent, name)?;
        if was_dir {
            parent.i_links_count = parent.i_links_count.saturating_sub(1);
            self.write_inode(parent_num, parent)?;
        }

        target.i_links_count = target.i_links_count.saturating_sub(1);
        if target.i_links_count == 0 {
            self.free_all_blocks(&mut target)?;
            target.i_dtime = now();
            self.write_inode(entry.inode, &target)?;
            self.free_inode(entry.inode, was_dir)?;
        } else {
            self.write_inode(entry.inode, &target)?;
        }
        Ok(())
    }

    pub fn chmod(&mut self, inode_num: u32, inode: &mut Inode, permissions: u16) -> Result<(), Ext2Error> {
        inode.i_mode = inode.file_type_bits() | (permissions & 0x0FFF);
        inode.i_ctime = now();
        self.write_inode(inode_num, inode)
    }

    pub fn chown(&mut self, inode_num: u32, inode: &mut Inode, uid: u16, gid: u16) -> Result<(), Ext2Error> {
        inode.i_uid = uid;
        inode.i_gid = gid;
        inode.i_ctime = now();
        self.write_inode(inode_num, inode)
    }
}
