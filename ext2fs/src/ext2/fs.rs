//! Mount procedure and low-level block/group-descriptor I/O (spec.md §4.2,
//! grounded in the teacher's `init_ext2` in `drivers/fs/ext2/init.rs`).

use std::sync::{Arc, Mutex};

use dvida_serialize::{DvDeserialize, DvSerialize, Endianness};

use crate::block::{BlockDevice, SECTOR_SIZE};

use super::{
    Ext2Error, GroupDescriptor, Inode, SuperBlock, BLOCK_GROUP_DESCRIPTOR_SIZE, INODE_DISK_SIZE,
    SUPERBLOCK_OFFSET, SUPERBLOCK_SIZE,
};

/// A mounted ext2 filesystem: superblock + group descriptor table + the
/// device backing them. All VFS operations funnel through a single
/// `&mut Ext2Fs` (spec.md §5's single-mutator model) so no internal locking
/// is needed here; the `Vfs` facade owns the coarse lock.
pub struct Ext2Fs {
    pub(crate) device: Arc<Mutex<dyn BlockDevice>>,
    pub(crate) superblock: SuperBlock,
    pub(crate) groups: Vec<GroupDescriptor>,
    dirty_superblock: bool,
    dirty_groups: bool,
}

impl Ext2Fs {
    /// Mounts the filesystem found on `device`: reads and validates the
    /// superblock, then reads the group descriptor table that follows it.
    pub fn mount(device: Arc<Mutex<dyn BlockDevice>>) -> Result<Self, Ext2Error> {
        let superblock = Self::read_superblock(&device)?;
        if !superblock.is_valid() {
            return Err(Ext2Error::BadMagic);
        }
        let block_size = superblock.block_size();
        let num_groups = superblock.num_block_groups();
        let gdt_start_block = superblock.s_first_data_block + 1;

        let gdt_bytes = num_groups as usize * BLOCK_GROUP_DESCRIPTOR_SIZE;
        let gdt_blocks_needed = gdt_bytes.div_ceil(block_size as usize);
        let mut raw = Vec::with_capacity(gdt_blocks_needed * block_size as usize);
        {
            let mut dev = device.lock().expect("device lock poisoned");
            for i in 0..gdt_blocks_needed {
                let mut buf = vec![0u8; block_size as usize];
                read_fs_block(&mut *dev, block_size, gdt_start_block + i as u32, &mut buf)?;
                raw.extend_from_slice(&buf);
            }
        }
        let mut groups = Vec::with_capacity(num_groups as usize);
        let mut offset = 0;
        for _ in 0..num_groups {
            let (gd, read) = GroupDescriptor::deserialize(Endianness::Little, &raw[offset..])?;
            groups.push(gd);
            offset += read;
        }

        log::info!(
            "mounted ext2 volume: {} blocks, {} groups, block size {}",
            superblock.s_blocks_count,
            num_groups,
            block_size
        );

        Ok(Self {
            device,
            superblock,
            groups,
            dirty_superblock: false,
            dirty_groups: false,
        })
    }

    fn read_superblock(device: &Arc<Mutex<dyn BlockDevice>>) -> Result<SuperBlock, Ext2Error> {
        let mut dev = device.lock().expect("device lock poisoned");
        let first_sector = (SUPERBLOCK_OFFSET / SECTOR_SIZE as u64) as u32;
        let sector_count = SUPERBLOCK_SIZE as u32 / SECTOR_SIZE;
        let mut buf = vec![0u8; SUPERBLOCK_SIZE];
        dev.read(first_sector, sector_count, &mut buf)?;
        let (sb, _) = SuperBlock::deserialize(Endianness::Little, &buf)?;
        Ok(sb)
    }

    pub fn block_size(&self) -> u32 {
        self.superblock.block_size()
    }

    fn sectors_per_block(&self) -> u32 {
        self.block_size() / SECTOR_SIZE
    }

    /// Reads one filesystem block (`self.block_size()` bytes) at `block_num`.
    pub fn read_block(&self, block_num: u32) -> Result<Vec<u8>, Ext2Error> {
        let mut buf = vec![0u8; self.block_size() as usize];
        let mut dev = self.device.lock().expect("device lock poisoned");
        read_fs_block(&mut *dev, self.block_size(), block_num, &mut buf)?;
        Ok(buf)
    }

    /// Writes one filesystem block immediately (spec.md §9's "persistence
    /// policy" open question is resolved in favor of synchronous writeback:
    /// every mutating VFS call leaves the device consistent with no
    /// deferred flush step).
    pub fn write_block(&self, block_num: u32, data: &[u8]) -> Result<(), Ext2Error> {
        assert_eq!(data.len(), self.block_size() as usize);
        let mut dev = self.device.lock().expect("device lock poisoned");
        let spb = self.sectors_per_block();
        dev.write(block_num * spb, spb, data)?;
        Ok(())
    }

    pub fn zero_block(&self, block_num: u32) -> Result<(), Ext2Error> {
        let zeros = vec![0u8; self.block_size() as usize];
        self.write_block(block_num, &zeros)
    }

    fn group_for_inode(&self, inode_num: u32) -> u32 {
        (inode_num - 1) / self.superblock.s_inodes_per_group
    }

    fn group_for_block(&self, block_num: u32) -> u32 {
        (block_num - self.superblock.s_first_data_block) / self.superblock.s_blocks_per_group
    }

    pub fn group_of_inode(&self, inode_num: u32) -> &GroupDescriptor {
        &self.groups[self.group_for_inode(inode_num) as usize]
    }

    pub fn group_of_block(&self, block_num: u32) -> &GroupDescriptor {
        &self.groups[self.group_for_block(block_num) as usize]
    }

    pub fn group_index_of_inode(&self, inode_num: u32) -> usize {
        self.group_for_inode(inode_num) as usize
    }

    pub fn group_index_of_block(&self, block_num: u32) -> usize {
        self.group_for_block(block_num) as usize
    }

    pub fn read_inode(&self, inode_num: u32) -> Result<Inode, Ext2Error> {
        let group = self.group_of_inode(inode_num);
        let index_in_group = (inode_num - 1) % self.superblock.s_inodes_per_group;
        let inodes_per_block = self.superblock.inodes_per_block();
        let block_offset = index_in_group / inodes_per_block;
        let offset_in_block = (index_in_group % inodes_per_block) as usize * INODE_DISK_SIZE;

        let block = self.read_block(group.bg_inode_table + block_offset)?;
        let (inode, _) = Inode::deserialize(
            Endianness::Little,
            &block[offset_in_block..offset_in_block + INODE_DISK_SIZE],
        )?;
        Ok(inode)
    }

    pub fn write_inode(&self, inode_num: u32, inode: &Inode) -> Result<(), Ext2Error> {
        let group = self.group_of_inode(inode_num);
        let index_in_group = (inode_num - 1) % self.superblock.s_inodes_per_group;
        let inodes_per_block = self.superblock.inodes_per_block();
        let block_offset = index_in_group / inodes_per_block;
        let offset_in_block = (index_in_group % inodes_per_block) as usize * INODE_DISK_SIZE;

        let mut block = self.read_block(group.bg_inode_table + block_offset)?;
        inode.serialize(
            Endianness::Little,
            &mut block[offset_in_block..offset_in_block + INODE_DISK_SIZE],
        )?;
        self.write_block(group.bg_inode_table + block_offset, &block)?;
        Ok(())
    }

    pub fn mark_superblock_dirty(&mut self) -> Result<(), Ext2Error> {
        self.dirty_superblock = true;
        self.flush_superblock()
    }

    pub fn mark_group_dirty(&mut self, group_index: usize) -> Result<(), Ext2Error> {
        self.dirty_groups = true;
        self.flush_group(group_index)
    }

    fn flush_superblock(&mut self) -> Result<(), Ext2Error> {
        let mut buf = vec![0u8; SUPERBLOCK_SIZE];
        self.superblock.serialize(Endianness::Little, &mut buf)?;
        let mut dev = self.device.lock().expect("device lock poisoned");
        let first_sector = (SUPERBLOCK_OFFSET / SECTOR_SIZE as u64) as u32;
        dev.write(first_sector, SUPERBLOCK_SIZE as u32 / SECTOR_SIZE, &buf)?;
        self.dirty_superblock = false;
        Ok(())
    }

    fn flush_group(&mut self, group_index: usize) -> Result<(), Ext2Error> {
        let block_size = self.block_size();
        let gdt_start_block = self.superblock.s_first_data_block + 1;
        let entries_per_block = block_size as usize / BLOCK_GROUP_DESCRIPTOR_SIZE;
        let block_offset = group_index / entries_per_block;
        let offset_in_block = (group_index % entries_per_block) * BLOCK_GROUP_DESCRIPTOR_SIZE;

        let mut block = self.read_block(gdt_start_block + block_offset as u32)?;
        self.groups[group_index].serialize(
            Endianness::Little,
            &mut block[offset_in_block..offset_in_block + BLOCK_GROUP_DESCRIPTOR_SIZE],
        )?;
        self.write_block(gdt_start_block + block_offset as u32, &block)?;
        self.dirty_groups = false;
        Ok(())
    }
}

fn read_fs_block(
    dev: &mut dyn BlockDevice,
    block_size: u32,
    block_num: u32,
    buf: &mut [u8],
) -> Result<(), Ext2Error> {
    let spb = block_size / SECTOR_SIZE;
    dev.read(block_num * spb, spb, buf)?;
    Ok(())
}
