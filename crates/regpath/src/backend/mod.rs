//! Registry backends.
//!
//! This module provides the [`RegistryBackend`] trait for implementing raw
//! registry storage, plus two implementations:
//! - [`InMemoryRegistry`]: a registry held in memory, available everywhere
//! - `NativeRegistry`: the Win32 registry API (Windows only)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  RegistryPath                    │
//! │        (navigation, preconditions, walks)        │
//! └───────────────────────┬─────────────────────────┘
//!                         │ owns
//! ┌───────────────────────▼─────────────────────────┐
//! │                RegistryHandler                   │
//! │  (one open handle, snapshot, typed errors)       │
//! └───────────────────────┬─────────────────────────┘
//!                         │ calls through LowLevel
//! ┌───────────────────────▼─────────────────────────┐
//! │             RegistryBackend trait                │
//! └───────────────────────┬─────────────────────────┘
//!                         │
//!        ┌────────────────┼────────────────┐
//!        │                │                │
//! ┌──────▼──────┐  ┌──────▼──────┐  ┌──────▼──────┐
//! │InMemory     │  │ Native      │  │ your impl   │
//! │Registry     │  │ Registry    │  │             │
//! └─────────────┘  └─────────────┘  └─────────────┘
//! ```
//!
//! Backends report failures as [`std::io::Error`]. The handler layer wraps
//! them into [`OperationError`](crate::OperationError)s and keeps the
//! original as the error source, so a backend should pick error kinds with
//! care: `NotFound` is what turns a failed value read into "value not found".

mod limits;
mod memory;
#[cfg(windows)]
mod windows;

pub use limits::{LimitExceeded, RegistryLimits};
pub use memory::InMemoryRegistry;
#[cfg(windows)]
pub use windows::NativeRegistry;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io;

use crate::root::RootKey;

/// Opaque handle issued by a backend.
///
/// Handles are plain values; ownership (and closing) is tracked by the
/// handler layer, not by this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHandle(u64);

impl RawHandle {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

/// What an open is relative to: a predefined root or an already open key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyParent {
    Root(RootKey),
    Key(RawHandle),
}

/// Counts and timestamp reported by a key at query time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInfo {
    pub subkey_count: u32,
    pub value_count: u32,
    pub last_modified: DateTime<Utc>,
}

/// A value as stored: name, type code and undecoded bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawValue {
    pub name: String,
    pub type_code: u32,
    pub data: Vec<u8>,
}

/// Raw registry operations.
///
/// Every method is a single blocking call. `access` is the composed access
/// mask of the calling handler (see
/// [`PermissionConfig::access_mask`](crate::PermissionConfig::access_mask)).
///
/// # Contract
///
/// Backends are expected to:
/// - resolve `path` arguments relative to `parent`, with `\` as separator
/// - return `NotFound` for missing keys and values
/// - fail enumeration with an error once `index` is past the last entry
/// - keep a handle valid until [`close_key`](Self::close_key), even if the
///   key it names is deleted (later calls on it may fail)
///
/// Backends do NOT need to:
/// - check for existing subkeys or values before writes (the handler layer
///   does it)
/// - delete non-empty keys (the handler layer deletes children first)
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync`.
pub trait RegistryBackend: Send + Sync {
    /// Open the key at `path` below `parent`. An empty `path` opens `parent`
    /// itself again.
    ///
    /// # Errors
    /// - `NotFound` if the key doesn't exist
    fn open_key(&self, parent: KeyParent, path: &str, access: u32) -> io::Result<RawHandle>;

    /// Release a handle.
    fn close_key(&self, handle: RawHandle) -> io::Result<()>;

    /// Create the key `name` below `parent`, with any missing intermediate
    /// keys. Creating an existing key succeeds.
    fn create_key(&self, parent: RawHandle, name: &str, access: u32) -> io::Result<()>;

    /// Delete the key `name` below `parent`.
    ///
    /// # Errors
    /// - `NotFound` if the key doesn't exist
    /// - backend-specific error if the key still has subkeys
    fn delete_key(&self, parent: RawHandle, name: &str, access: u32) -> io::Result<()>;

    /// Subkey count, value count and last write time.
    fn query_info(&self, handle: RawHandle) -> io::Result<KeyInfo>;

    /// Name of the subkey at `index`.
    fn enum_key(&self, handle: RawHandle, index: u32) -> io::Result<String>;

    /// Value at `index`.
    fn enum_value(&self, handle: RawHandle, index: u32) -> io::Result<RawValue>;

    /// Value named `name`; the empty name is the key's default value.
    ///
    /// # Errors
    /// - `NotFound` if the value doesn't exist
    fn query_value(&self, handle: RawHandle, name: &str) -> io::Result<RawValue>;

    /// Create or overwrite a value.
    fn set_value(&self, handle: RawHandle, name: &str, type_code: u32, data: &[u8])
    -> io::Result<()>;

    /// Delete a value.
    ///
    /// # Errors
    /// - `NotFound` if the value doesn't exist
    fn delete_value(&self, handle: RawHandle, name: &str) -> io::Result<()>;
}
