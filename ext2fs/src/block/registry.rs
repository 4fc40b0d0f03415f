//! Process-wide named device registry (spec.md §4.1, grounded in the
//! original C kernel's `blockdev_register`/`blockdev_get` and the teacher's
//! `hal::storage` device table, minus the async dispatch channel).

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, OnceLock};

use super::BlockDevice;

/// Caps the number of simultaneously registered devices, per spec.md
/// §4.1's "a small fixed number of devices."
pub const MAX_DEVICES: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("a device named {0:?} is already registered")]
    NameTaken(String),
    #[error("device registry is full (max {MAX_DEVICES})")]
    Full,
}

pub struct Registry {
    devices: Mutex<BTreeMap<String, Arc<Mutex<dyn BlockDevice>>>>,
}

impl Registry {
    fn new() -> Self {
        Self {
            devices: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn register(
        &self,
        name: impl Into<String>,
        device: Arc<Mutex<dyn BlockDevice>>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        let mut devices = self.devices.lock().expect("registry lock poisoned");
        if devices.contains_key(&name) {
            return Err(RegistryError::NameTaken(name));
        }
        if devices.len() >= MAX_DEVICES {
            return Err(RegistryError::Full);
        }
        log::info!("registered block device {name:?}");
        devices.insert(name, device);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<Mutex<dyn BlockDevice>>> {
        self.devices
            .lock()
            .expect("registry lock poisoned")
            .get(name)
            .cloned()
    }

    pub fn unregister(&self, name: &str) -> Option<Arc<Mutex<dyn BlockDevice>>> {
        self.devices.lock().expect("registry lock poisoned").remove(name)
    }
}

static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// The process-wide device registry, created on first use.
pub fn global() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::ram::RamDisk;

    #[test]
    fn duplicate_name_rejected() {
        let registry = Registry::new();
        registry
            .register("dup", Arc::new(Mutex::new(RamDisk::new(1))))
            .unwrap();
        assert!(matches!(
            registry.register("dup", Arc::new(Mutex::new(RamDisk::new(1)))),
            Err(RegistryError::NameTaken(_))
        ));
    }

    #[test]
    fn lookup_missing_is_none() {
        let registry = Registry::new();
        assert!(registry.lookup("nope").is_none());
    }
}
