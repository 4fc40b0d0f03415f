//! Mounting a named block device as the filesystem root (spec.md's
//! ambient configuration addition, §4.18). Grounded in the teacher's
//! `init_ext2` call site in `kernel/src/main.rs`, which looks up a fixed
//! device name at boot — generalized here into a small config struct
//! instead of a hardcoded string.

use std::sync::{Arc, Mutex, OnceLock};

use crate::block::registry;
use crate::ext2::fs::Ext2Fs;
use crate::ext2::Ext2Error;
use crate::vfs::Vfs;

/// The single root-filesystem slot (spec.md §2/§4.2): at most one mount can
/// be active at a time, mirroring `block::registry`'s process-wide-singleton
/// shape but tracking occupancy rather than a name table.
pub struct MountTable {
    mounted: Mutex<bool>,
}

impl MountTable {
    fn new() -> Self {
        Self {
            mounted: Mutex::new(false),
        }
    }

    /// Claims the root slot, failing with `Ext2Error::AlreadyMounted` if a
    /// mount is already active.
    fn acquire(&self) -> Result<(), Ext2Error> {
        let mut mounted = self.mounted.lock().expect("mount table lock poisoned");
        if *mounted {
            return Err(Ext2Error::AlreadyMounted);
        }
        *mounted = true;
        Ok(())
    }

    /// Frees the root slot so a subsequent `mount_root`/`mount_device` call
    /// can succeed.
    pub fn release(&self) {
        *self.mounted.lock().expect("mount table lock poisoned") = false;
    }

    pub fn is_mounted(&self) -> bool {
        *self.mounted.lock().expect("mount table lock poisoned")
    }
}

static MOUNT_TABLE: OnceLock<MountTable> = OnceLock::new();

/// The process-wide mount table, created on first use.
pub fn table() -> &'static MountTable {
    MOUNT_TABLE.get_or_init(MountTable::new)
}

/// Releases the process-wide root mount slot. Callers that mounted via
/// `mount_root`/`mount_device` and are done with the filesystem should call
/// this before mounting again.
pub fn unmount() {
    table().release();
}

/// Configuration for mounting the root filesystem.
#[derive(Debug, Clone)]
pub struct MountOptions {
    /// Name under which the backing device was registered
    /// (`block::registry::global().register`).
    pub device_name: String,
}

impl Default for MountOptions {
    fn default() -> Self {
        Self {
            device_name: "ramdisk0".to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MountError {
    #[error("no device named {0:?} is registered")]
    DeviceNotFound(String),
    #[error(transparent)]
    Ext2(#[from] Ext2Error),
}

/// Looks up `options.device_name` in the global device registry, mounts
/// the ext2 volume found on it, and wraps it in a `Vfs` facade. Fails with
/// `Ext2Error::AlreadyMounted` if the root slot is already occupied by an
/// earlier `mount_root`/`mount_device` call that hasn't been released with
/// `unmount()`.
pub fn mount_root(options: MountOptions) -> Result<Vfs, MountError> {
    table().acquire()?;
    let device = registry::global()
        .lookup(&options.device_name)
        .ok_or_else(|| {
            table().release();
            MountError::DeviceNotFound(options.device_name.clone())
        })?;
    let fs = Ext2Fs::mount(device).inspect_err(|_| table().release())?;
    log::info!("root filesystem mounted from device {:?}", options.device_name);
    Ok(Vfs::new(fs))
}

/// Mounts directly from an already-obtained device handle, bypassing the
/// registry — used by `format::format`'s own callers and by tests. Subject
/// to the same single-mount slot as `mount_root`.
pub fn mount_device(device: Arc<std::sync::Mutex<dyn crate::block::BlockDevice>>) -> Result<Vfs, MountError> {
    table().acquire()?;
    let fs = Ext2Fs::mount(device).inspect_err(|_| table().release())?;
    Ok(Vfs::new(fs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_until_released() {
        let table = MountTable::new();
        table.acquire().unwrap();
        assert!(matches!(table.acquire(), Err(Ext2Error::AlreadyMounted)));
        table.release();
        table.acquire().unwrap();
    }
}
