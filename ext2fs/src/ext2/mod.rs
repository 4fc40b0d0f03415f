//! ext2 revision 0 on-disk structures (spec.md §3). All multi-byte fields
//! are little-endian; structs are (de)serialized field-by-field via
//! `dvida_serialize` rather than by reinterpreting host memory layout
//! (spec.md §9 "Raw byte structures").

pub mod alloc;
pub mod data;
pub mod dir;
pub mod format;
pub mod fs;
pub mod inode_io;
pub mod ops;
pub mod symlink;

use dvida_serialize::DvDeSer;

pub const BLOCK_GROUP_DESCRIPTOR_SIZE: usize = 32;
pub const INODE_DISK_SIZE: usize = 128;
pub const SUPERBLOCK_SIZE: usize = 1024;
pub const SUPERBLOCK_OFFSET: u64 = 1024;

pub const EXT2_SUPER_MAGIC: u16 = 0xEF53;
pub const EXT2_MIN_BLOCK_SIZE: u32 = 1024;
pub const EXT2_MAX_BLOCK_SIZE: u32 = 4096;

pub const EXT2_VALID_FS: u16 = 0x0001;
pub const EXT2_ERROR_FS: u16 = 0x0002;

pub const EXT2_ERRORS_CONTINUE: u16 = 1;
pub const EXT2_ERRORS_RO: u16 = 2;
pub const EXT2_ERRORS_PANIC: u16 = 3;

pub const EXT2_OS_LINUX: u32 = 0;
pub const EXT2_GOOD_OLD_REV: u32 = 0;

// File mode bits (i_mode high nibble).
pub const EXT2_S_IFSOCK: u16 = 0xC000;
pub const EXT2_S_IFLNK: u16 = 0xA000;
pub const EXT2_S_IFREG: u16 = 0x8000;
pub const EXT2_S_IFBLK: u16 = 0x6000;
pub const EXT2_S_IFDIR: u16 = 0x4000;
pub const EXT2_S_IFCHR: u16 = 0x2000;
pub const EXT2_S_IFIFO: u16 = 0x1000;
pub const EXT2_S_IFMT: u16 = 0xF000;

// Directory entry file types.
pub const EXT2_FT_UNKNOWN: u8 = 0;
pub const EXT2_FT_REG_FILE: u8 = 1;
pub const EXT2_FT_DIR: u8 = 2;
pub const EXT2_FT_CHRDEV: u8 = 3;
pub const EXT2_FT_BLKDEV: u8 = 4;
pub const EXT2_FT_FIFO: u8 = 5;
pub const EXT2_FT_SOCK: u8 = 6;
pub const EXT2_FT_SYMLINK: u8 = 7;

// Reserved inode numbers.
pub const EXT2_BAD_INO: u32 = 1;
pub const EXT2_ROOT_INO: u32 = 2;
pub const EXT2_ACL_IDX_INO: u32 = 3;
pub const EXT2_ACL_DATA_INO: u32 = 4;
pub const EXT2_BOOT_LOADER_INO: u32 = 5;
pub const EXT2_UNDEL_DIR_INO: u32 = 6;
pub const EXT2_FIRST_INO: u32 = 11;

pub const DIRECT_BLOCKS: usize = 12;
pub const SINGLE_INDIRECT_IDX: usize = 12;
pub const DOUBLE_INDIRECT_IDX: usize = 13;
pub const TRIPLE_INDIRECT_IDX: usize = 14;

pub const MAX_SYMLINK_DEPTH: u32 = 8;
pub const MAX_NAME_LEN: usize = 255;

#[derive(Debug, thiserror::Error)]
pub enum Ext2Error {
    #[error("block device error: {0}")]
    Device(#[from] crate::block::BlockDeviceError),
    #[error("(de)serialization of an on-disk structure failed")]
    Codec,
    #[error("superblock magic mismatch: filesystem is not ext2")]
    BadMagic,
    #[error("a filesystem is already mounted on this handle")]
    AlreadyMounted,
    #[error("path component {0:?} not found")]
    NotFound(String),
    #[error("expected a directory")]
    NotADirectory,
    #[error("expected a regular file or symlink, found a directory")]
    IsADirectory,
    #[error("directory is not empty")]
    NotEmpty,
    #[error("no free blocks or inodes left")]
    NoSpace,
    #[error("access beyond the single-indirect block range is unsupported")]
    TooLarge,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("a directory entry for that name already exists")]
    AlreadyExists,
    #[error("attempted to free a reserved block or inode")]
    ReservedIndex,
    #[error("on-disk structure is corrupted: {0}")]
    Corrupted(String),
}

impl From<dvida_serialize::DvSerErr> for Ext2Error {
    fn from(_: dvida_serialize::DvSerErr) -> Self {
        Ext2Error::Codec
    }
}

impl From<dvida_serialize::DvDeErr> for Ext2Error {
    fn from(_: dvida_serialize::DvDeErr) -> Self {
        Ext2Error::Codec
    }
}

/// The ext2 superblock (revision 0 field set; 1024 bytes total with
/// trailing padding, located at byte offset 1024 from the device start).
#[derive(DvDeSer, Debug, Clone)]
pub struct SuperBlock {
    pub s_inodes_count: u32,
    pub s_blocks_count: u32,
    pub s_r_blocks_count: u32,
    pub s_free_blocks_count: u32,
    pub s_free_inodes_count: u32,
    pub s_first_data_block: u32,
    pub s_log_block_size: u32,
    pub s_log_frag_size: u32,
    pub s_blocks_per_group: u32,
    pub s_frags_per_group: u32,
    pub s_inodes_per_group: u32,
    pub s_mtime: u32,
    pub s_wtime: u32,
    pub s_mnt_count: u16,
    pub s_max_mnt_count: u16,
    pub s_magic: u16,
    pub s_state: u16,
    pub s_errors: u16,
    pub s_minor_rev_level: u16,
    pub s_lastcheck: u32,
    pub s_checkinterval: u32,
    pub s_creator_os: u32,
    pub s_rev_level: u32,
    pub s_def_resuid: u16,
    pub s_def_resgid: u16,
    pub padding: [u8; SUPERBLOCK_SIZE - 84],
}

impl SuperBlock {
    pub fn block_size(&self) -> u32 {
        EXT2_MIN_BLOCK_SIZE << self.s_log_block_size
    }

    pub fn fragment_size(&self) -> u32 {
        EXT2_MIN_BLOCK_SIZE << self.s_log_frag_size
    }

    pub fn is_valid(&self) -> bool {
        self.s_magic == EXT2_SUPER_MAGIC
    }

    pub fn num_block_groups(&self) -> u32 {
        (self.s_blocks_count - self.s_first_data_block).div_ceil(self.s_blocks_per_group)
    }

    pub fn inodes_per_block(&self) -> u32 {
        self.block_size() / INODE_DISK_SIZE as u32
    }

    pub fn addrs_per_block(&self) -> u32 {
        self.block_size() / 4
    }
}

/// A block group descriptor (spec.md §3).
#[derive(DvDeSer, Debug, Clone, Copy, Default)]
pub struct GroupDescriptor {
    pub bg_block_bitmap: u32,
    pub bg_inode_bitmap: u32,
    pub bg_inode_table: u32,
    pub bg_free_blocks_count: u16,
    pub bg_free_inodes_count: u16,
    pub bg_used_dirs_count: u16,
    pub bg_pad: u16,
    pub bg_reserved: [u8; 12],
}

/// An on-disk inode (spec.md §3, 128 bytes).
#[derive(DvDeSer, Debug, Clone, Copy, Default)]
pub struct Inode {
    pub i_mode: u16,
    pub i_uid: u16,
    pub i_size: u32,
    pub i_atime: u32,
    pub i_ctime: u32,
    pub i_mtime: u32,
    pub i_dtime: u32,
    pub i_gid: u16,
    pub i_links_count: u16,
    pub i_blocks: u32,
    pub i_flags: u32,
    pub i_osd1: u32,
    pub i_block: [u32; 15],
    pub i_generation: u32,
    pub i_file_acl: u32,
    pub i_dir_acl: u32,
    pub i_faddr: u32,
    pub i_osd2: [u8; 12],
}

impl Inode {
    pub fn file_type_bits(&self) -> u16 {
        self.i_mode & EXT2_S_IFMT
    }

    pub fn permissions(&self) -> u16 {
        self.i_mode & 0x0FFF
    }

    pub fn is_directory(&self) -> bool {
        self.file_type_bits() == EXT2_S_IFDIR
    }

    pub fn is_regular_file(&self) -> bool {
        self.file_type_bits() == EXT2_S_IFREG
    }

    pub fn is_symlink(&self) -> bool {
        self.file_type_bits() == EXT2_S_IFLNK
    }

    /// Returns the file_type byte used in directory entries for this inode.
    pub fn dir_entry_file_type(&self) -> u8 {
        match self.file_type_bits() {
            EXT2_S_IFREG => EXT2_FT_REG_FILE,
            EXT2_S_IFDIR => EXT2_FT_DIR,
            EXT2_S_IFLNK => EXT2_FT_SYMLINK,
            EXT2_S_IFCHR => EXT2_FT_CHRDEV,
            EXT2_S_IFBLK => EXT2_FT_BLKDEV,
            EXT2_S_IFIFO => EXT2_FT_FIFO,
            EXT2_S_IFSOCK => EXT2_FT_SOCK,
            _ => EXT2_FT_UNKNOWN,
        }
    }
}

/// A file type as derived from an inode's mode, surfaced to the VFS facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Regular,
    Directory,
    Symlink,
    CharDevice,
    BlockDevice,
    Fifo,
    Socket,
    Unknown,
}

impl From<u16> for FileType {
    fn from(mode: u16) -> Self {
        match mode & EXT2_S_IFMT {
            EXT2_S_IFREG => FileType::Regular,
            EXT2_S_IFDIR => FileType::Directory,
            EXT2_S_IFLNK => FileType::Symlink,
            EXT2_S_IFCHR => FileType::CharDevice,
            EXT2_S_IFBLK => FileType::BlockDevice,
            EXT2_S_IFIFO => FileType::Fifo,
            EXT2_S_IFSOCK => FileType::Socket,
            _ => FileType::Unknown,
        }
    }
}

/// Fixed 8-byte directory entry header, cast in place with `bytemuck` when
/// only `inode`/`rec_len`/`name_len` need patching (tombstoning, slack
/// splitting) — the teacher mixes `bytemuck` raw-header patches with
/// `dvida_serialize` full-entry codec the same way (`drivers/fs/ext2/open.rs`).
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DirEntryHeader {
    pub inode: u32,
    pub rec_len: u16,
    pub name_len: u8,
    pub file_type: u8,
}

pub const DIR_ENTRY_HEADER_LEN: usize = 8;

/// A directory entry (spec.md §3). Not fixed-size (the name trails the
/// header), so it gets a hand-written codec rather than `#[derive(DvDeSer)]`.
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub inode: u32,
    pub rec_len: u16,
    pub file_type: u8,
    pub name: String,
}

pub fn round_up_4(n: usize) -> usize {
    (n + 3) & !3
}

impl DirEntry {
    pub fn new(inode: u32, name: String, file_type: u8) -> Self {
        let actual_len = DIR_ENTRY_HEADER_LEN + round_up_4(name.len());
        Self {
            inode,
            rec_len: actual_len as u16,
            file_type,
            name,
        }
    }

    /// Minimum rec_len this entry needs: `8 + round_up_4(name_len)`.
    pub fn min_rec_len(&self) -> u16 {
        (DIR_ENTRY_HEADER_LEN + round_up_4(self.name.len())) as u16
    }

    /// Parses one entry out of `input`, returning it alongside the header's
    /// `rec_len` (the caller advances by that, not by the parsed size — a
    /// `rec_len` of 0 is the corruption guard spec.md §9 calls out and must
    /// be checked by the caller before advancing).
    pub fn parse(input: &[u8]) -> Result<Self, crate::ext2::Ext2Error> {
        if input.len() < DIR_ENTRY_HEADER_LEN {
            return Err(crate::ext2::Ext2Error::Corrupted(
                "directory entry header truncated".into(),
            ));
        }
        let header: DirEntryHeader = bytemuck::pod_read_unaligned(&input[..DIR_ENTRY_HEADER_LEN]);
        let name_len = header.name_len as usize;
        let name_bytes = input
            .get(DIR_ENTRY_HEADER_LEN..DIR_ENTRY_HEADER_LEN + name_len)
            .ok_or_else(|| crate::ext2::Ext2Error::Corrupted("directory entry name truncated".into()))?;
        let name = String::from_utf8_lossy(name_bytes).into_owned();
        Ok(DirEntry {
            inode: header.inode,
            rec_len: header.rec_len,
            file_type: header.file_type,
            name,
        })
    }

    /// Serializes the entry's header + name into `target` (does not zero
    /// the rest of `target`; callers own the slack beyond `min_rec_len()`).
    pub fn write_into(&self, target: &mut [u8]) -> Result<(), crate::ext2::Ext2Error> {
        if self.name.len() > MAX_NAME_LEN {
            return Err(crate::ext2::Ext2Error::InvalidArgument(
                "directory entry name too long".into(),
            ));
        }
        if target.len() < DIR_ENTRY_HEADER_LEN + self.name.len() {
            return Err(crate::ext2::Ext2Error::Corrupted(
                "directory entry buffer too small".into(),
            ));
        }
        let header = DirEntryHeader {
            inode: self.inode,
            rec_len: self.rec_len,
            name_len: self.name.len() as u8,
            file_type: self.file_type,
        };
        target[..DIR_ENTRY_HEADER_LEN].copy_from_slice(bytemuck::bytes_of(&header));
        target[DIR_ENTRY_HEADER_LEN..DIR_ENTRY_HEADER_LEN + self.name.len()]
            .copy_from_slice(self.name.as_bytes());
        Ok(())
    }
}
