//! The user-facing key handle.
//!
//! A [`RegistryPath`] is an open key plus the path it was opened at.
//! Navigation never changes a node; it opens a new one.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use crate::backend::{KeyInfo, RegistryBackend};
use crate::error::{FailureReason, OperationError, OperationKind, Result, TargetKind};
use crate::handler::RegistryHandler;
use crate::path::RegistryPathString;
use crate::permission::{KeyPermission, PermissionConfig};
use crate::root::RootKey;
use crate::value::{RegistryData, RegistryValue, ValueType};

/// Per-call overrides for opening a key.
///
/// Anything left unset is inherited: from the parent node for
/// [`RegistryPath::open_subkey_with`], from the registry defaults for
/// [`Registry::open_with`](crate::Registry::open_with).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenOptions {
    root: Option<RootKey>,
    permissions: Option<Vec<KeyPermission>>,
    use_32bit_view: Option<bool>,
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Root for the fragments, which then must not start with a root token.
    /// Ignored when opening below an existing node.
    pub fn root(mut self, root: RootKey) -> Self {
        self.root = Some(root);
        self
    }

    pub fn permission(mut self, permission: KeyPermission) -> Self {
        self.permissions = Some(vec![permission]);
        self
    }

    pub fn permissions(mut self, permissions: impl IntoIterator<Item = KeyPermission>) -> Self {
        self.permissions = Some(permissions.into_iter().collect());
        self
    }

    pub fn use_32bit_view(mut self, use_32bit_view: bool) -> Self {
        self.use_32bit_view = Some(use_32bit_view);
        self
    }

    pub(crate) fn explicit_root(&self) -> Option<RootKey> {
        self.root
    }

    pub(crate) fn resolve(&self, inherited: &PermissionConfig) -> PermissionConfig {
        let permissions = self
            .permissions
            .clone()
            .unwrap_or_else(|| inherited.permissions().to_vec());
        let use_32bit_view = self
            .use_32bit_view
            .unwrap_or_else(|| inherited.use_32bit_view());
        PermissionConfig::new(permissions, use_32bit_view)
    }
}

/// An open registry key.
///
/// The counts in [`info`](Self::info) are taken when the node is opened.
/// Use [`refresh`](Self::refresh) to see changes made since.
pub struct RegistryPath {
    handler: RegistryHandler,
}

impl RegistryPath {
    pub(crate) fn open(
        backend: Arc<dyn RegistryBackend>,
        path: RegistryPathString,
        permissions: PermissionConfig,
    ) -> Result<Self> {
        let handler = RegistryHandler::open(backend, path, permissions)?;
        Ok(Self { handler })
    }

    pub fn path(&self) -> &RegistryPathString {
        self.handler.path()
    }

    /// Last path segment; `None` for a root key.
    pub fn name(&self) -> Option<&str> {
        self.handler.path().name()
    }

    pub fn info(&self) -> &KeyInfo {
        self.handler.info()
    }

    pub fn permissions(&self) -> &PermissionConfig {
        self.handler.permissions()
    }

    pub fn handler(&self) -> &RegistryHandler {
        &self.handler
    }

    /// Reopen this key, taking a new snapshot.
    pub fn refresh(&self) -> Result<RegistryPath> {
        Self::open(
            Arc::clone(self.handler.backend()),
            self.path().clone(),
            self.permissions().clone(),
        )
    }

    /// Open the parent key with the same permissions; `None` for a root.
    pub fn parent(&self) -> Result<Option<RegistryPath>> {
        self.path()
            .parent()
            .map(|parent| {
                Self::open(
                    Arc::clone(self.handler.backend()),
                    parent,
                    self.permissions().clone(),
                )
            })
            .transpose()
    }

    /// Open a key below this one with the same permissions.
    pub fn open_subkey(&self, fragment: impl AsRef<str>) -> Result<RegistryPath> {
        self.open_subkey_with([fragment], &OpenOptions::default())
    }

    /// Open a key below this one, with per-call overrides.
    ///
    /// Fragments that add no segment reopen this key.
    ///
    /// # Errors
    /// - `OperationError(OnRead, Subkey)` with [`FailureReason::DoesNotExist`]
    ///   if the key is not there
    pub fn open_subkey_with<I, S>(&self, fragments: I, options: &OpenOptions) -> Result<RegistryPath>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let path = self.path().joinpath(fragments);
        let relative = path
            .strip_prefix(self.path())
            .map(|segments| segments.join("\\"))
            .unwrap_or_default();
        if !relative.is_empty() && !self.handler.contains(&relative) {
            return Err(OperationError::precondition(
                OperationKind::OnRead,
                TargetKind::Subkey,
                FailureReason::DoesNotExist,
                format!("subkey '{relative}' does not exist under '{}'", self.path()),
            )
            .into());
        }
        Self::open(
            Arc::clone(self.handler.backend()),
            path,
            options.resolve(self.permissions()),
        )
    }

    /// Open a child by its enumerated name, which is one segment as is.
    fn open_child(&self, name: String) -> Result<RegistryPath> {
        Self::open(
            Arc::clone(self.handler.backend()),
            self.path().child(name),
            self.permissions().clone(),
        )
    }

    /// Child keys that can be opened; the rest are skipped.
    pub fn subkeys(&self) -> impl Iterator<Item = RegistryPath> + '_ {
        self.handler
            .list_subkey_names()
            .filter_map(move |name| match name.and_then(|name| self.open_child(name)) {
                Ok(node) => Some(node),
                Err(_err) => {
                    #[cfg(feature = "logging")]
                    tracing::debug!(parent = %self.path(), error = %_err, "skipping subkey");
                    None
                }
            })
    }

    pub fn subkey_exists(&self, name: &str) -> bool {
        self.handler.subkey_exists(name)
    }

    /// Create `name` below this key and open it.
    ///
    /// # Errors
    /// - `OperationError(OnCreate, Subkey)` with
    ///   [`FailureReason::AlreadyExists`] if it exists and `exist_ok` is false
    pub fn create_subkey(&self, name: &str, exist_ok: bool) -> Result<RegistryPath> {
        if self.subkey_exists(name) {
            if !exist_ok {
                return Err(OperationError::precondition(
                    OperationKind::OnCreate,
                    TargetKind::Subkey,
                    FailureReason::AlreadyExists,
                    format!("subkey '{name}' already exists"),
                )
                .into());
            }
        } else {
            self.handler.create_subkey(name)?;
        }
        self.open_subkey(name)
    }

    /// Delete `name`. With `recursive`, everything below it goes too.
    ///
    /// # Errors
    /// - [`FailureReason::DoesNotExist`] if there is no such subkey
    /// - [`FailureReason::NotEmpty`] if it has children and `recursive` is
    ///   false
    pub fn delete_subkey(&self, name: &str, recursive: bool) -> Result<()> {
        if !self.subkey_exists(name) {
            return Err(OperationError::precondition(
                OperationKind::OnDelete,
                TargetKind::Subkey,
                FailureReason::DoesNotExist,
                format!("subkey '{name}' does not exist"),
            )
            .into());
        }
        self.handler.delete_subkey_tree(name, recursive)
    }

    pub fn value_exists(&self, name: &str) -> bool {
        self.handler.value_exists(name)
    }

    pub fn values(&self) -> impl Iterator<Item = Result<RegistryValue>> + '_ {
        self.handler.list_values()
    }

    /// Read a value. The empty name reads the key's default value.
    ///
    /// # Errors
    /// - `OperationError(OnRead, Value)` with [`FailureReason::DoesNotExist`]
    ///   if there is no such value
    pub fn get_value(&self, name: &str) -> Result<RegistryValue> {
        if !self.value_exists(name) {
            return Err(OperationError::precondition(
                OperationKind::OnRead,
                TargetKind::Value,
                FailureReason::DoesNotExist,
                format!("value '{name}' does not exist"),
            )
            .into());
        }
        self.handler.query_value(name)
    }

    /// Write a value and read it back.
    ///
    /// # Errors
    /// - `OperationError(OnCreate, Value)` with
    ///   [`FailureReason::AlreadyExists`] if it exists and `overwrite` is false
    pub fn set_value(
        &self,
        name: &str,
        data: impl Into<RegistryData>,
        value_type: ValueType,
        overwrite: bool,
    ) -> Result<RegistryValue> {
        if !overwrite && self.value_exists(name) {
            return Err(OperationError::precondition(
                OperationKind::OnCreate,
                TargetKind::Value,
                FailureReason::AlreadyExists,
                format!("value '{name}' already exists"),
            )
            .into());
        }
        self.handler.set_value(name, value_type, &data.into())?;
        self.get_value(name)
    }

    pub fn delete_value(&self, name: &str) -> Result<()> {
        if !self.value_exists(name) {
            return Err(OperationError::precondition(
                OperationKind::OnDelete,
                TargetKind::Value,
                FailureReason::DoesNotExist,
                format!("value '{name}' does not exist"),
            )
            .into());
        }
        self.handler.delete_value(name)
    }

    /// Walk this key and everything below it, breadth first.
    ///
    /// Each node is opened when it is reached, so its snapshot is current at
    /// that point. A child that can no longer be opened is skipped. A node
    /// whose values cannot be read is yielded as an error and its children
    /// are not visited.
    pub fn traverse(&self) -> Traverse {
        let mut queue = VecDeque::new();
        queue.push_back(self.path().clone());
        Traverse {
            backend: Arc::clone(self.handler.backend()),
            permissions: self.permissions().clone(),
            queue,
            first: true,
        }
    }
}

impl fmt::Display for RegistryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.path(), f)
    }
}

impl fmt::Debug for RegistryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryPath")
            .field("path", &self.path().fullpath())
            .field("info", self.info())
            .finish()
    }
}

/// One step of [`RegistryPath::traverse`].
#[derive(Debug)]
pub struct TraverseEntry {
    pub node: RegistryPath,
    pub subkeys: Vec<RegistryPath>,
    pub values: Vec<RegistryValue>,
}

/// Breadth-first walk returned by [`RegistryPath::traverse`].
pub struct Traverse {
    backend: Arc<dyn RegistryBackend>,
    permissions: PermissionConfig,
    queue: VecDeque<RegistryPathString>,
    first: bool,
}

impl Traverse {
    fn visit(&mut self, node: RegistryPath) -> Result<TraverseEntry> {
        let subkeys: Vec<RegistryPath> = node.subkeys().collect();
        let values = node.values().collect::<Result<Vec<_>>>()?;
        self.queue
            .extend(subkeys.iter().map(|subkey| subkey.path().clone()));
        Ok(TraverseEntry {
            node,
            subkeys,
            values,
        })
    }
}

impl Iterator for Traverse {
    type Item = Result<TraverseEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(path) = self.queue.pop_front() {
            let first = std::mem::replace(&mut self.first, false);
            match RegistryPath::open(Arc::clone(&self.backend), path, self.permissions.clone()) {
                Ok(node) => return Some(self.visit(node)),
                // the starting key failing is worth reporting
                Err(err) if first => return Some(Err(err)),
                Err(_err) => {
                    #[cfg(feature = "logging")]
                    tracing::debug!(error = %_err, "skipping vanished key during traversal");
                }
            }
        }
        None
    }
}

impl fmt::Debug for Traverse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Traverse")
            .field("pending", &self.queue.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{InMemoryRegistry, KeyParent};

    fn writable_root() -> RegistryPath {
        RegistryPath::open(
            Arc::new(InMemoryRegistry::new()),
            RegistryPathString::root_path(RootKey::CurrentUser),
            KeyPermission::AllAccess.into(),
        )
        .unwrap()
    }

    #[test]
    fn test_open_options_inherit() {
        let inherited = PermissionConfig::new([KeyPermission::Write], true);
        let resolved = OpenOptions::new().resolve(&inherited);
        assert_eq!(resolved, inherited);

        let resolved = OpenOptions::new()
            .permission(KeyPermission::Read)
            .resolve(&inherited);
        assert_eq!(resolved.permissions(), &[KeyPermission::Read]);
        assert!(resolved.use_32bit_view());

        let resolved = OpenOptions::new()
            .use_32bit_view(false)
            .permissions([])
            .resolve(&inherited);
        assert_eq!(resolved.permissions(), &[KeyPermission::Read]);
        assert!(!resolved.use_32bit_view());
    }

    #[test]
    fn test_open_subkey_inherits_permissions() {
        let root = writable_root();
        root.create_subkey("A", false).unwrap();
        let a = root.open_subkey("A").unwrap();
        assert_eq!(a.permissions(), root.permissions());
        assert_eq!(a.name(), Some("A"));

        let a_read = root
            .open_subkey_with(["A"], &OpenOptions::new().permission(KeyPermission::Read))
            .unwrap();
        assert_eq!(a_read.permissions().permissions(), &[KeyPermission::Read]);
    }

    #[test]
    fn test_create_subkey_exist_ok() {
        let root = writable_root();
        root.create_subkey("A", true).unwrap();
        root.create_subkey("A", true).unwrap();

        let err = root.create_subkey("A", false).unwrap_err();
        let op = err.as_operation().unwrap();
        assert_eq!(op.reason(), FailureReason::AlreadyExists);
        assert_eq!(op.operation(), OperationKind::OnCreate);
        assert!(op.message().contains("already exists"));
    }

    #[test]
    fn test_delete_missing_subkey() {
        let root = writable_root();
        let err = root.delete_subkey("Missing", false).unwrap_err();
        let op = err.as_operation().unwrap();
        assert_eq!(op.reason(), FailureReason::DoesNotExist);
        assert_eq!(op.target(), TargetKind::Subkey);
    }

    #[test]
    fn test_open_missing_subkey() {
        let root = writable_root();
        root.create_subkey("A", false).unwrap();

        let err = root.open_subkey("A/Missing").unwrap_err();
        let op = err.as_operation().unwrap();
        assert_eq!(op.operation(), OperationKind::OnRead);
        assert_eq!(op.target(), TargetKind::Subkey);
        assert_eq!(op.reason(), FailureReason::DoesNotExist);
        assert!(op.message().contains("A\\Missing"));
        assert!(op.is_not_found());

        // no segments reopens the key itself
        let again = root.open_subkey("/").unwrap();
        assert_eq!(again.path(), root.path());
    }

    #[test]
    fn test_subkeys_keep_slash_names() {
        let backend = Arc::new(InMemoryRegistry::new());
        let access = KeyPermission::AllAccess.bits();
        let raw = backend
            .open_key(KeyParent::Root(RootKey::CurrentUser), "", access)
            .unwrap();
        // one native segment containing a slash
        backend.create_key(raw, "a/b", access).unwrap();
        backend.close_key(raw).unwrap();

        let root = RegistryPath::open(
            backend,
            RegistryPathString::root_path(RootKey::CurrentUser),
            KeyPermission::AllAccess.into(),
        )
        .unwrap();

        let names: Vec<_> = root
            .subkeys()
            .map(|node| node.name().map(str::to_string))
            .collect();
        assert_eq!(names, vec![Some("a/b".to_string())]);
    }

    #[test]
    fn test_get_missing_value() {
        let root = writable_root();
        let err = root.get_value("nope").unwrap_err();
        let op = err.as_operation().unwrap();
        assert_eq!(op.operation(), OperationKind::OnRead);
        assert_eq!(op.target(), TargetKind::Value);
        assert_eq!(op.reason(), FailureReason::DoesNotExist);
        assert!(op.native_error().is_none());
    }

    #[test]
    fn test_set_value_overwrite() {
        let root = writable_root();
        let value = root
            .set_value("name", "first", ValueType::String, false)
            .unwrap();
        assert_eq!(value.data.as_str(), Some("first"));

        let err = root
            .set_value("name", "second", ValueType::String, false)
            .unwrap_err();
        assert_eq!(
            err.as_operation().unwrap().reason(),
            FailureReason::AlreadyExists
        );

        let value = root
            .set_value("name", "second", ValueType::String, true)
            .unwrap();
        assert_eq!(value.data.as_str(), Some("second"));
    }

    #[test]
    fn test_delete_missing_value() {
        let root = writable_root();
        let err = root.delete_value("nope").unwrap_err();
        let op = err.as_operation().unwrap();
        assert_eq!(op.reason(), FailureReason::DoesNotExist);
        assert_eq!(op.target(), TargetKind::Value);
    }

    #[test]
    fn test_parent_and_refresh() {
        let root = writable_root();
        let a = root.create_subkey("A", false).unwrap();
        assert!(root.parent().unwrap().is_none());

        let parent = a.parent().unwrap().unwrap();
        assert_eq!(parent.path(), root.path());

        assert_eq!(root.info().subkey_count, 0);
        assert_eq!(root.refresh().unwrap().info().subkey_count, 1);
    }

    #[test]
    fn test_display() {
        let root = writable_root();
        let a = root.create_subkey("A\\B", false).unwrap();
        assert_eq!(a.to_string(), "HKEY_CURRENT_USER\\A\\B");
    }
}
