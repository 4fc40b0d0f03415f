//! A read/write ext2 filesystem driver over an abstract block device, with
//! a synchronous VFS facade on top (spec.md §1-§9).
//!
//! - [`block`] — the device abstraction everything else is built on.
//! - [`ext2`] — the on-disk format: superblock, group descriptors, inodes,
//!   directory entries, allocation, and the `format` mkfs helper.
//! - [`vfs`] — path resolution, open file/directory handles, and the
//!   operation set a caller actually uses.
//! - [`mount`] — wiring a named device up to a mounted [`vfs::Vfs`].

pub mod block;
pub mod ext2;
pub mod mount;
pub mod vfs;

pub use ext2::fs::Ext2Fs;
pub use ext2::format::{format, FormatOptions};
pub use mount::{mount_device, mount_root, MountError, MountOptions};
pub use vfs::{DirListEntry, OpenOptions, Stat, Vfs, VfsError};
