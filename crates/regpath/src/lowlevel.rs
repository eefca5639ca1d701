//! Stateless backend calls bound to one access mask.
//!
//! [`LowLevel`] is the only place that talks to a [`RegistryBackend`]
//! directly. It encodes and decodes value payloads and hands out
//! [`OwnedKey`] guards so every opened handle is closed exactly once.

use std::fmt;
use std::io;
use std::sync::Arc;

use crate::backend::{KeyInfo, KeyParent, RawHandle, RegistryBackend};
use crate::permission::PermissionConfig;
use crate::value::{RegistryData, RegistryValue, ValueType};

/// An open handle, closed when dropped.
pub struct OwnedKey {
    backend: Arc<dyn RegistryBackend>,
    handle: RawHandle,
}

impl OwnedKey {
    pub fn handle(&self) -> RawHandle {
        self.handle
    }
}

impl Drop for OwnedKey {
    fn drop(&mut self) {
        if let Err(_err) = self.backend.close_key(self.handle) {
            #[cfg(feature = "logging")]
            tracing::debug!(handle = self.handle.as_raw(), error = %_err, "failed to close key");
        }
    }
}

impl fmt::Debug for OwnedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OwnedKey").field(&self.handle).finish()
    }
}

/// Backend operations with a precomputed access mask.
#[derive(Clone)]
pub struct LowLevel {
    backend: Arc<dyn RegistryBackend>,
    access: u32,
}

impl fmt::Debug for LowLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LowLevel")
            .field("access", &format_args!("{:#x}", self.access))
            .finish_non_exhaustive()
    }
}

impl LowLevel {
    pub fn new(backend: Arc<dyn RegistryBackend>, permissions: &PermissionConfig) -> Self {
        Self {
            backend,
            access: permissions.access_mask(),
        }
    }

    pub fn access(&self) -> u32 {
        self.access
    }

    pub fn backend(&self) -> &Arc<dyn RegistryBackend> {
        &self.backend
    }

    pub fn open(&self, parent: KeyParent, path: &str) -> io::Result<OwnedKey> {
        let handle = self.backend.open_key(parent, path, self.access)?;
        Ok(OwnedKey {
            backend: Arc::clone(&self.backend),
            handle,
        })
    }

    pub fn query_info(&self, key: &OwnedKey) -> io::Result<KeyInfo> {
        self.backend.query_info(key.handle)
    }

    pub fn subkey_from_index(&self, key: &OwnedKey, index: u32) -> io::Result<String> {
        self.backend.enum_key(key.handle, index)
    }

    pub fn value_from_index(&self, key: &OwnedKey, index: u32) -> io::Result<RegistryValue> {
        let raw = self.backend.enum_value(key.handle, index)?;
        RegistryValue::from_raw(raw.name, raw.type_code, &raw.data)
    }

    pub fn create_subkey(&self, key: &OwnedKey, name: &str) -> io::Result<()> {
        self.backend.create_key(key.handle, name, self.access)
    }

    pub fn delete_subkey(&self, key: &OwnedKey, name: &str) -> io::Result<()> {
        self.backend.delete_key(key.handle, name, self.access)
    }

    pub fn query_value(&self, key: &OwnedKey, name: &str) -> io::Result<RegistryValue> {
        let raw = self.backend.query_value(key.handle, name)?;
        RegistryValue::from_raw(raw.name, raw.type_code, &raw.data)
    }

    pub fn set_value(
        &self,
        key: &OwnedKey,
        name: &str,
        value_type: ValueType,
        data: &RegistryData,
    ) -> io::Result<()> {
        let bytes = data.encode(value_type)?;
        self.backend
            .set_value(key.handle, name, value_type.code(), &bytes)
    }

    pub fn delete_value(&self, key: &OwnedKey, name: &str) -> io::Result<()> {
        self.backend.delete_value(key.handle, name)
    }
}
