//! Absolute path splitting and symlink-aware component resolution
//! (spec.md §4.8/§9), adapted from the teacher's `hal::path` component
//! walker with the async suspension points removed.

use crate::ext2::fs::Ext2Fs;
use crate::ext2::{Ext2Error, Inode, EXT2_ROOT_INO, MAX_SYMLINK_DEPTH};

use super::VfsError;

/// Splits an absolute path into its non-empty components. Repeated slashes
/// collapse; `.` and `..` are left intact and resolved as ordinary
/// directory entries (every ext2 directory carries both).
pub fn split_path(path: &str) -> Result<Vec<String>, VfsError> {
    if !path.starts_with('/') {
        return Err(VfsError::InvalidPath(path.to_string()));
    }
    Ok(path
        .split('/')
        .filter(|c| !c.is_empty())
        .map(|c| c.to_string())
        .collect())
}

/// Resolves `components` starting from `start_inode`, following symlinks
/// encountered along the way (and the final component too, if
/// `follow_final` is set). A relative symlink target is resolved relative
/// to the symlink's own parent directory, not the caller's current
/// directory — distinguishing it from a simpler "treat as absolute"
/// reading some ext2 implementations take.
pub fn resolve(
    fs: &mut Ext2Fs,
    start_inode: u32,
    components: &[String],
    follow_final: bool,
) -> Result<(u32, Inode), VfsError> {
    let mut budget = MAX_SYMLINK_DEPTH;
    resolve_inner(fs, start_inode, components, follow_final, &mut budget)
}

fn resolve_inner(
    fs: &mut Ext2Fs,
    start_inode: u32,
    components: &[String],
    follow_final: bool,
    budget: &mut u32,
) -> Result<(u32, Inode), VfsError> {
    let mut current_num = start_inode;
    let mut current = fs.read_inode(current_num)?;

    for (idx, component) in components.iter().enumerate() {
        if !current.is_directory() {
            return Err(VfsError::Ext2(Ext2Error::NotADirectory));
        }
        let entry = fs
            .lookup_entry(&current, component)?
            .ok_or_else(|| VfsError::NotFound(component.clone()))?;

        let mut next_num = entry.inode;
        let mut next_inode = fs.read_inode(next_num)?;
        let is_last = idx == components.len() - 1;
        let parent_for_symlink = current_num;

        while next_inode.is_symlink() && (!is_last || follow_final) {
            if *budget == 0 {
                return Err(VfsError::TooManySymlinks);
            }
            *budget -= 1;

            let target = fs.read_symlink_target(&next_inode)?;
            let target_components = split_relative_or_absolute(&target)?;
            let base = if target.starts_with('/') {
                EXT2_ROOT_INO
            } else {
                parent_for_symlink
            };
            let (resolved_num, resolved_inode) =
                resolve_inner(fs, base, &target_components, true, budget)?;
            next_num = resolved_num;
            next_inode = resolved_inode;
        }

        current_num = next_num;
        current = next_inode;
    }

    Ok((current_num, current))
}

fn split_relative_or_absolute(target: &str) -> Result<Vec<String>, VfsError> {
    Ok(target
        .split('/')
        .filter(|c| !c.is_empty())
        .map(|c| c.to_string())
        .collect())
}

/// Splits `path` into (parent components, leaf name), for operations that
/// need to resolve a containing directory and act on one entry within it.
pub fn split_parent_and_leaf(path: &str) -> Result<(Vec<String>, String), VfsError> {
    let mut components = split_path(path)?;
    let leaf = components
        .pop()
        .ok_or_else(|| VfsError::InvalidPath(path.to_string()))?;
    Ok((components, leaf))
}
