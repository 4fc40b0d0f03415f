//! VFS facade over a mounted ext2 volume (spec.md §4.8/§6), grounded in
//! the original kernel's `vfs.c`/`vfs.h` operation set and the teacher's
//! `drivers/fs` dispatch layer, rebuilt synchronous per spec.md §5 (no
//! suspension points inside a call — a single coarse lock guards the
//! whole filesystem for the duration of every operation).

pub mod path;

use std::collections::HashMap;
use std::sync::Mutex;

use crate::ext2::fs::Ext2Fs;
use crate::ext2::{Ext2Error, FileType, Inode, EXT2_ROOT_INO, EXT2_S_IFLNK};

#[derive(Debug, thiserror::Error)]
pub enum VfsError {
    #[error(transparent)]
    Ext2(#[from] Ext2Error),
    #[error("invalid path {0:?}")]
    InvalidPath(String),
    #[error("no such file or directory: {0:?}")]
    NotFound(String),
    #[error("too many levels of symbolic links")]
    TooManySymlinks,
    #[error("bad file descriptor {0}")]
    BadFd(u32),
    #[error("file descriptor {0} is not open on a directory")]
    NotADirHandle(u32),
    #[error("path is a directory, not a file")]
    IsADirectory,
    #[error("file is not open for writing")]
    NotWritable,
}

/// A snapshot of the directory's entries at the time `opendir` was called,
/// matching the original `vfs_opendir`/`vfs_readdir` cursor semantics —
/// entries added after `opendir` are not observed by this handle.
struct OpenDir {
    entries: Vec<crate::ext2::DirEntry>,
    cursor: usize,
}

struct OpenFile {
    inode_num: u32,
    position: u64,
    writable: bool,
    append: bool,
}

struct Inner {
    fs: Ext2Fs,
    open_files: HashMap<u32, OpenFile>,
    open_dirs: HashMap<u32, OpenDir>,
    next_handle: u32,
}

impl Inner {
    fn alloc_handle(&mut self) -> u32 {
        let h = self.next_handle;
        self.next_handle += 1;
        h
    }
}

/// A stat result (spec.md §4.8's `vfs_stat`).
#[derive(Debug, Clone)]
pub struct Stat {
    pub inode: u32,
    pub file_type: FileType,
    pub permissions: u16,
    pub uid: u16,
    pub gid: u16,
    pub size: u32,
    pub links_count: u16,
    pub atime: u32,
    pub mtime: u32,
    pub ctime: u32,
}

impl From<(u32, &Inode)> for Stat {
    fn from((num, inode): (u32, &Inode)) -> Self {
        Stat {
            inode: num,
            file_type: FileType::from(inode.i_mode),
            permissions: inode.permissions(),
            uid: inode.i_uid,
            gid: inode.i_gid,
            size: inode.i_size,
            links_count: inode.i_links_count,
            atime: inode.i_atime,
            mtime: inode.i_mtime,
            ctime: inode.i_ctime,
        }
    }
}

/// A directory entry as surfaced by `readdir`/`list_directory`.
#[derive(Debug, Clone)]
pub struct DirListEntry {
    pub name: String,
    pub inode: u32,
    pub file_type: FileType,
}

/// Options controlling `Vfs::open` — `create` makes a missing file, and a
/// non-existent path without `create` is `NotFound`. `truncate` only
/// applies when the file already exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenOptions {
    pub write: bool,
    pub create: bool,
    pub truncate: bool,
    pub append: bool,
}

impl OpenOptions {
    pub fn read_only() -> Self {
        Self::default()
    }

    pub fn write_create() -> Self {
        Self {
            write: true,
            create: true,
            ..Default::default()
        }
    }
}

pub struct Vfs {
    inner: Mutex<Inner>,
}

impl Vfs {
    pub fn new(fs: Ext2Fs) -> Self {
        Self {
            inner: Mutex::new(Inner {
                fs,
                open_files: HashMap::new(),
                open_dirs: HashMap::new(),
                next_handle: 1,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("vfs lock poisoned")
    }

    /// Resolves `path` all the way through the leaf, following symlinks on
    /// every component including the last (spec.md §4.13) — a symlink at
    /// the leaf is never opened as itself, it's followed to whatever it
    /// points at, up to `MAX_SYMLINK_DEPTH` substitutions.
    pub fn open(&self, path: &str, options: OpenOptions) -> Result<u32, VfsError> {
        let mut inner = self.lock();
        let components = path::split_path(path)?;

        let (inode_num, mut inode) = match path::resolve(&mut inner.fs, EXT2_ROOT_INO, &components, true) {
            Ok(resolved) => resolved,
            Err(VfsError::NotFound(name)) if options.create => {
                let (parent_components, leaf) = path::split_parent_and_leaf(path)?;
                let (parent_num, mut parent) =
                    path::resolve(&mut inner.fs, EXT2_ROOT_INO, &parent_components, true)?;
                if leaf != name {
                    return Err(VfsError::NotFound(name));
                }
                let new_num = inner.fs.create_file(&mut parent, parent_num, &leaf, 0o644, 0, 0)?;
                let inode = inner.fs.read_inode(new_num)?;
                (new_num, inode)
            }
            Err(e) => return Err(e),
        };

        if inode.is_directory() {
            return Err(VfsError::IsADirectory);
        }
        if options.truncate && options.write {
            inner.fs.truncate_to(&mut inode, inode_num, 0)?;
        }

        let handle = inner.alloc_handle();
        inner.open_files.insert(
            handle,
            OpenFile {
                inode_num,
                position: if options.append { inode.i_size as u64 } else { 0 },
                writable: options.write,
                append: options.append,
            },
        );
        Ok(handle)
    }

    pub fn close(&self, fd: u32) -> Result<(), VfsError> {
        let mut inner = self.lock();
        inner.open_files.remove(&fd).ok_or(VfsError::BadFd(fd))?;
        Ok(())
    }

    pub fn read(&self, fd: u32, buf: &mut [u8]) -> Result<usize, VfsError> {
        let mut inner = self.lock();
        let (inode_num, position) = {
            let file = inner.open_files.get(&fd).ok_or(VfsError::BadFd(fd))?;
            (file.inode_num, file.position)
        };
        let inode = inner.fs.read_inode(inode_num)?;
        let n = inner.fs.read_inode_data(&inode, position, buf)?;
        inner.open_files.get_mut(&fd).unwrap().position += n as u64;
        Ok(n)
    }

    pub fn write(&self, fd: u32, data: &[u8]) -> Result<usize, VfsError> {
        let mut inner = self.lock();
        let (inode_num, position, writable, append) = {
            let file = inner.open_files.get(&fd).ok_or(VfsError::BadFd(fd))?;
            (file.inode_num, file.position, file.writable, file.append)
        };
        if !writable {
            return Err(VfsError::NotWritable);
        }
        let mut inode = inner.fs.read_inode(inode_num)?;
        let write_at = if append { inode.i_size as u64 } else { position };
        let n = inner.fs.write_inode_data(&mut inode, inode_num, write_at, data)?;
        inode.i_mtime = crate::ext2::inode_io::now();
        inner.fs.write_inode(inode_num, &inode)?;
        inner.open_files.get_mut(&fd).unwrap().position = write_at + n as u64;
        Ok(n)
    }

    /// Seeks to an absolute byte offset from the start of the file.
    pub fn seek(&self, fd: u32, offset: u64) -> Result<u64, VfsError> {
        let mut inner = self.lock();
        let file = inner.open_files.get_mut(&fd).ok_or(VfsError::BadFd(fd))?;
        file.position = offset;
        Ok(offset)
    }

    pub fn opendir(&self, path: &str) -> Result<u32, VfsError> {
        let mut inner = self.lock();
        let components = path::split_path(path)?;
        let (_, dir_inode) = path::resolve(&mut inner.fs, EXT2_ROOT_INO, &components, true)?;
        if !dir_inode.is_directory() {
            return Err(VfsError::Ext2(Ext2Error::NotADirectory));
        }
        let entries = inner.fs.list_dir_entries(&dir_inode)?;
        let handle = inner.alloc_handle();
        inner.open_dirs.insert(handle, OpenDir { entries, cursor: 0 });
        Ok(handle)
    }

    pub fn readdir(&self, fd: u32) -> Result<Option<DirListEntry>, VfsError> {
        let mut inner = self.lock();
        let dir = inner.open_dirs.get_mut(&fd).ok_or(VfsError::NotADirHandle(fd))?;
        let Some(entry) = dir.entries.get(dir.cursor).cloned() else {
            return Ok(None);
        };
        dir.cursor += 1;
        let inode = inner.fs.read_inode(entry.inode)?;
        Ok(Some(DirListEntry {
            name: entry.name,
            inode: entry.inode,
            file_type: FileType::from(inode.i_mode),
        }))
    }

    pub fn closedir(&self, fd: u32) -> Result<(), VfsError> {
        let mut inner = self.lock();
        inner.open_dirs.remove(&fd).ok_or(VfsError::NotADirHandle(fd))?;
        Ok(())
    }

    pub fn create(&self, path: &str, mode: u16) -> Result<(), VfsError> {
        let mut inner = self.lock();
        let (parent_components, leaf) = path::split_parent_and_leaf(path)?;
        let (parent_num, mut parent) = path::resolve(&mut inner.fs, EXT2_ROOT_INO, &parent_components, true)?;
        inner.fs.create_file(&mut parent, parent_num, &leaf, mode, 0, 0)?;
        Ok(())
    }

    pub fn mkdir(&self, path: &str, mode: u16) -> Result<(), VfsError> {
        let mut inner = self.lock();
        let (parent_components, leaf) = path::split_parent_and_leaf(path)?;
        let (parent_num, mut parent) = path::resolve(&mut inner.fs, EXT2_ROOT_INO, &parent_components, true)?;
        inner.fs.create_directory(&mut parent, parent_num, &leaf, mode, 0, 0)?;
        Ok(())
    }

    pub fn unlink(&self, path: &str) -> Result<(), VfsError> {
        let mut inner = self.lock();
        let (parent_components, leaf) = path::split_parent_and_leaf(path)?;
        let (parent_num, mut parent) = path::resolve(&mut inner.fs, EXT2_ROOT_INO, &parent_components, true)?;
        inner.fs.unlink(&mut parent, parent_num, &leaf)?;
        Ok(())
    }

    pub fn create_symlink(&self, path: &str, target: &str) -> Result<(), VfsError> {
        let mut inner = self.lock();
        let (parent_components, leaf) = path::split_parent_and_leaf(path)?;
        if leaf.len() > crate::ext2::MAX_NAME_LEN {
            return Err(VfsError::Ext2(Ext2Error::InvalidArgument(
                "directory entry name too long".into(),
            )));
        }
        let (parent_num, mut parent) = path::resolve(&mut inner.fs, EXT2_ROOT_INO, &parent_components, true)?;
        if inner.fs.lookup_entry(&parent, &leaf)?.is_some() {
            return Err(VfsError::Ext2(Ext2Error::AlreadyExists));
        }
        let hint_group = inner.fs.group_index_of_inode(parent_num);
        let new_num = inner.fs.allocate_inode(hint_group, false)?;
        let mut inode = inner.fs.new_inode(EXT2_S_IFLNK | 0o777, 0, 0);
        inner.fs.write_symlink_target(&mut inode, new_num, target)?;
        inner
            .fs
            .add_entry(&mut parent, parent_num, &leaf, new_num, crate::ext2::EXT2_FT_SYMLINK)?;
        Ok(())
    }

    pub fn read_link(&self, path: &str) -> Result<String, VfsError> {
        let mut inner = self.lock();
        let components = path::split_path(path)?;
        let (_, inode) = path::resolve(&mut inner.fs, EXT2_ROOT_INO, &components, false)?;
        if !inode.is_symlink() {
            return Err(VfsError::Ext2(Ext2Error::InvalidArgument("not a symlink".into())));
        }
        Ok(inner.fs.read_symlink_target(&inode)?)
    }

    pub fn chmod(&self, path: &str, permissions: u16) -> Result<(), VfsError> {
        let mut inner = self.lock();
        let components = path::split_path(path)?;
        let (inode_num, mut inode) = path::resolve(&mut inner.fs, EXT2_ROOT_INO, &components, true)?;
        inner.fs.chmod(inode_num, &mut inode, permissions)?;
        Ok(())
    }

    pub fn chown(&self, path: &str, uid: u16, gid: u16) -> Result<(), VfsError> {
        let mut inner = self.lock();
        let components = path::split_path(path)?;
        let (inode_num, mut inode) = path::resolve(&mut inner.fs, EXT2_ROOT_INO, &components, true)?;
        inner.fs.chown(inode_num, &mut inode, uid, gid)?;
        Ok(())
    }

    pub fn truncate(&self, path: &str, new_size: u32) -> Result<(), VfsError> {
        let mut inner = self.lock();
        let components = path::split_path(path)?;
        let (inode_num, mut inode) = path::resolve(&mut inner.fs, EXT2_ROOT_INO, &components, true)?;
        if !inode.is_regular_file() {
            return Err(VfsError::IsADirectory);
        }
        inner.fs.truncate_to(&mut inode, inode_num, new_size)?;
        Ok(())
    }

    pub fn stat(&self, path: &str) -> Result<Stat, VfsError> {
        let mut inner = self.lock();
        let components = path::split_path(path)?;
        let (inode_num, inode) = path::resolve(&mut inner.fs, EXT2_ROOT_INO, &components, true)?;
        Ok(Stat::from((inode_num, &inode)))
    }

    pub fn exists(&self, path: &str) -> bool {
        let mut inner = self.lock();
        let Ok(components) = path::split_path(path) else {
            return false;
        };
        path::resolve(&mut inner.fs, EXT2_ROOT_INO, &components, true).is_ok()
    }

    pub fn list_directory(&self, path: &str) -> Result<Vec<DirListEntry>, VfsError> {
        let mut inner = self.lock();
        let components = path::split_path(path)?;
        let (_, dir_inode) = path::resolve(&mut inner.fs, EXT2_ROOT_INO, &components, true)?;
        if !dir_inode.is_directory() {
            return Err(VfsError::Ext2(Ext2Error::NotADirectory));
        }
        let entries = inner.fs.list_dir_entries(&dir_inode)?;
        let mut out = Vec::with_capacity(entries.len());
        for entry in entries {
            let inode = inner.fs.read_inode(entry.inode)?;
            out.push(DirListEntry {
                name: entry.name,
                inode: entry.inode,
                file_type: FileType::from(inode.i_mode),
            });
        }
        log::info!("{}: {} entries", path, out.len());
        Ok(out)
    }
}
