//! One open key and the typed operations on it.
//!
//! A [`RegistryHandler`] owns a single backend handle together with the
//! [`KeyInfo`] taken when it was opened. Backend failures leave this module
//! as [`OperationError`]s, classified by what was being attempted.
//!
//! The snapshot is not refreshed: if another handle adds or removes subkeys,
//! [`RegistryHandler::list_subkey_names`] still walks the old count and may
//! fail part way through. Open a new handler to see current counts.

use std::fmt;
use std::io;
use std::sync::Arc;

use crate::backend::{KeyInfo, KeyParent, RegistryBackend};
use crate::error::{FailureReason, OperationError, OperationKind, Result, TargetKind};
use crate::lowlevel::{LowLevel, OwnedKey};
use crate::path::RegistryPathString;
use crate::permission::PermissionConfig;
use crate::value::{RegistryData, RegistryValue, ValueType};

pub struct RegistryHandler {
    low: LowLevel,
    key: OwnedKey,
    info: KeyInfo,
    path: RegistryPathString,
    permissions: PermissionConfig,
}

impl fmt::Debug for RegistryHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryHandler")
            .field("path", &self.path.fullpath())
            .field("key", &self.key)
            .field("info", &self.info)
            .field("permissions", &self.permissions)
            .finish()
    }
}

fn open_raw(low: &LowLevel, path: &RegistryPathString) -> io::Result<(OwnedKey, KeyInfo)> {
    let key = low.open(KeyParent::Root(path.root()), &path.path())?;
    let info = low.query_info(&key)?;
    Ok((key, info))
}

impl RegistryHandler {
    /// Open `path` with the access mask of `permissions` and take a snapshot.
    ///
    /// # Errors
    /// - `OperationError(OnRead, Subkey)` if the key cannot be opened or
    ///   queried; the message names the full path
    pub fn open(
        backend: Arc<dyn RegistryBackend>,
        path: RegistryPathString,
        permissions: PermissionConfig,
    ) -> Result<Self> {
        let low = LowLevel::new(backend, &permissions);
        let (key, info) = open_raw(&low, &path).map_err(|err| {
            #[cfg(feature = "logging")]
            tracing::debug!(path = %path, error = %err, "open failed");
            OperationError::native(
                OperationKind::OnRead,
                TargetKind::Subkey,
                format!("cannot open '{}'", path.fullpath()),
                err,
            )
        })?;
        Ok(Self {
            low,
            key,
            info,
            path,
            permissions,
        })
    }

    /// Snapshot taken at open time.
    pub fn info(&self) -> &KeyInfo {
        &self.info
    }

    pub fn path(&self) -> &RegistryPathString {
        &self.path
    }

    pub fn permissions(&self) -> &PermissionConfig {
        &self.permissions
    }

    pub(crate) fn backend(&self) -> &Arc<dyn RegistryBackend> {
        self.low.backend()
    }

    /// Names of the subkeys, by index up to the snapshot's subkey count.
    ///
    /// Each call starts again from index 0.
    pub fn list_subkey_names(&self) -> impl Iterator<Item = Result<String>> + '_ {
        (0..self.info.subkey_count).map(move |index| {
            self.low
                .subkey_from_index(&self.key, index)
                .map_err(|err| {
                    crate::Error::from(OperationError::native(
                        OperationKind::OnRead,
                        TargetKind::Subkey,
                        format!("cannot enumerate subkey {index} of '{}'", self.path),
                        err,
                    ))
                })
        })
    }

    /// Decoded values, by index up to the snapshot's value count.
    pub fn list_values(&self) -> impl Iterator<Item = Result<RegistryValue>> + '_ {
        (0..self.info.value_count).map(move |index| {
            self.low
                .value_from_index(&self.key, index)
                .map_err(|err| {
                    crate::Error::from(OperationError::native(
                        OperationKind::OnRead,
                        TargetKind::Value,
                        format!("cannot enumerate value {index} of '{}'", self.path),
                        err,
                    ))
                })
        })
    }

    /// Resolve `name` the way navigation does: split on either separator,
    /// drop empty tokens. Returns the child's path and its `\`-joined path
    /// relative to this key, or `None` if `name` adds no segment.
    fn resolve(&self, name: &str) -> Option<(RegistryPathString, String)> {
        let child = self.path.join(name);
        let relative = child.strip_prefix(&self.path)?.join("\\");
        if relative.is_empty() {
            return None;
        }
        Some((child, relative))
    }

    fn resolve_or_fail(
        &self,
        name: &str,
        operation: OperationKind,
    ) -> Result<(RegistryPathString, String)> {
        self.resolve(name).ok_or_else(|| {
            OperationError::precondition(
                operation,
                TargetKind::Subkey,
                FailureReason::InvalidName,
                format!("subkey name '{name}' names no subkey of '{}'", self.path),
            )
            .into()
        })
    }

    /// Whether the key at `relative` (already `\`-joined) opens below this one.
    pub(crate) fn contains(&self, relative: &str) -> bool {
        self.low
            .open(KeyParent::Key(self.key.handle()), relative)
            .is_ok()
    }

    /// Whether `name` can be opened below this key. Any failure, including
    /// a name with no segments, counts as absent.
    pub fn subkey_exists(&self, name: &str) -> bool {
        self.resolve(name)
            .is_some_and(|(_, relative)| self.contains(&relative))
    }

    /// Create `name` and any missing keys above it.
    ///
    /// # Errors
    /// - [`FailureReason::InvalidName`] if `name` has no segments
    pub fn create_subkey(&self, name: &str) -> Result<()> {
        let (_, relative) = self.resolve_or_fail(name, OperationKind::OnCreate)?;
        self.low.create_subkey(&self.key, &relative).map_err(|err| {
            OperationError::native(
                OperationKind::OnCreate,
                TargetKind::Subkey,
                format!("cannot create subkey '{relative}' under '{}'", self.path),
                err,
            )
            .into()
        })
    }

    /// Delete the subkey `name`.
    ///
    /// A subkey with children is refused unless `recursive`, in which case
    /// its children are deleted first, depth first.
    ///
    /// # Errors
    /// - `OperationError(OnDelete, Subkey)` with [`FailureReason::InvalidName`]
    ///   if `name` has no segments
    /// - `OperationError(OnDelete, Subkey)` with [`FailureReason::NotEmpty`]
    ///   for a non-recursive delete of a key with children
    /// - `OperationError(OnDelete, Subkey)` wrapping any backend failure
    pub fn delete_subkey_tree(&self, name: &str, recursive: bool) -> Result<()> {
        let (child_path, relative) = self.resolve_or_fail(name, OperationKind::OnDelete)?;
        self.delete_resolved(child_path, &relative, recursive)
    }

    fn delete_resolved(
        &self,
        child_path: RegistryPathString,
        relative: &str,
        recursive: bool,
    ) -> Result<()> {
        let delete_error = |err: io::Error| -> crate::Error {
            OperationError::native(
                OperationKind::OnDelete,
                TargetKind::Subkey,
                format!("cannot delete subkey '{relative}' under '{}'", self.path),
                err,
            )
            .into()
        };

        let (child_key, child_info) = open_raw(&self.low, &child_path).map_err(delete_error)?;

        if child_info.subkey_count > 0 {
            if !recursive {
                return Err(OperationError::precondition(
                    OperationKind::OnDelete,
                    TargetKind::Subkey,
                    FailureReason::NotEmpty,
                    format!("subkey '{child_path}' is not empty"),
                )
                .into());
            }

            let child = Self {
                low: self.low.clone(),
                key: child_key,
                info: child_info,
                path: child_path,
                permissions: self.permissions.clone(),
            };
            // collect first: deleting shifts the indices of later siblings
            let names = child.list_subkey_names().collect::<Result<Vec<_>>>()?;
            for grandchild in &names {
                #[cfg(feature = "logging")]
                tracing::debug!(parent = %child.path, name = %grandchild, "deleting subkey");
                // enumerated names are single segments, even with a '/' in them
                child.delete_resolved(child.path.child(grandchild.as_str()), grandchild, true)?;
            }
        } else {
            drop(child_key);
        }

        self.low.delete_subkey(&self.key, relative).map_err(delete_error)
    }

    /// Whether `name` can be read. Any failure counts as absent.
    pub fn value_exists(&self, name: &str) -> bool {
        self.low.query_value(&self.key, name).is_ok()
    }

    pub fn query_value(&self, name: &str) -> Result<RegistryValue> {
        self.low.query_value(&self.key, name).map_err(|err| {
            let message = if err.kind() == io::ErrorKind::NotFound {
                format!("value '{name}' not found")
            } else {
                format!("cannot read value '{name}' of '{}'", self.path)
            };
            OperationError::native(OperationKind::OnRead, TargetKind::Value, message, err).into()
        })
    }

    /// Write a value.
    ///
    /// On failure the error is classified `OnUpdate` if the value exists
    /// afterwards and `OnCreate` otherwise. The check races with other
    /// writers.
    pub fn set_value(&self, name: &str, value_type: ValueType, data: &RegistryData) -> Result<()> {
        self.low
            .set_value(&self.key, name, value_type, data)
            .map_err(|err| {
                let operation = if self.value_exists(name) {
                    OperationKind::OnUpdate
                } else {
                    OperationKind::OnCreate
                };
                #[cfg(feature = "logging")]
                tracing::debug!(path = %self.path, name, %operation, error = %err, "set_value failed");
                OperationError::native(
                    operation,
                    TargetKind::Value,
                    format!("cannot write value '{name}' of '{}'", self.path),
                    err,
                )
                .into()
            })
    }

    pub fn delete_value(&self, name: &str) -> Result<()> {
        self.low.delete_value(&self.key, name).map_err(|err| {
            OperationError::native(
                OperationKind::OnDelete,
                TargetKind::Value,
                format!("cannot delete value '{name}' of '{}'", self.path),
                err,
            )
            .into()
        })
    }
}
