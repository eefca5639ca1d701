//! regpath - Path-oriented access to the Windows registry
//!
//! Keys are addressed by paths such as `HKCU\Software\Vendor`, opened with a
//! set of key permissions, and manipulated through [`RegistryPath`]. Storage
//! sits behind the [`RegistryBackend`] trait: the Win32 registry on Windows,
//! or [`InMemoryRegistry`] anywhere.
//!
//! # Example
//!
//! ```rust
//! use regpath::{KeyPermission, Registry, ValueType};
//!
//! fn main() -> regpath::Result<()> {
//!     let registry = Registry::builder()
//!         .permission(KeyPermission::AllAccess)
//!         .build_in_memory();
//!
//!     let software = registry.current_user()?.create_subkey("Software", true)?;
//!     let app = software.create_subkey("Vendor\\App", false)?;
//!     app.set_value("Version", 3u32, ValueType::Dword, false)?;
//!
//!     let value = app.get_value("version")?;
//!     assert_eq!(value.data.as_u32(), Some(3));
//!
//!     software.delete_subkey("Vendor", true)?;
//!     assert!(!software.subkey_exists("Vendor"));
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `logging`: emit `tracing` events for skipped children, recursive
//!   deletes and failed opens

mod backend;
mod error;
mod handler;
mod lowlevel;
mod node;
mod path;
mod permission;
mod root;
mod value;

pub use backend::{
    InMemoryRegistry, KeyInfo, KeyParent, LimitExceeded, RawHandle, RawValue, RegistryBackend,
    RegistryLimits,
};
#[cfg(windows)]
pub use backend::NativeRegistry;
pub use error::{Error, FailureReason, OperationError, OperationKind, Result, TargetKind};
pub use handler::RegistryHandler;
pub use lowlevel::{LowLevel, OwnedKey};
pub use node::{OpenOptions, RegistryPath, Traverse, TraverseEntry};
pub use path::{REGISTRY_SEP, RegistryPathString};
pub use permission::{KeyPermission, PermissionConfig, RegistryView};
pub use root::RootKey;
pub use value::{RegistryData, RegistryValue, ValueType};

use std::fmt;
use std::sync::Arc;

/// Main entry point: a backend plus the permissions keys are opened with by
/// default.
#[derive(Clone)]
pub struct Registry {
    backend: Arc<dyn RegistryBackend>,
    permissions: PermissionConfig,
}

impl Default for Registry {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("permissions", &self.permissions)
            .finish_non_exhaustive()
    }
}

impl Registry {
    /// Registry over `backend`, opening keys with `KEY_READ`.
    pub fn new(backend: Arc<dyn RegistryBackend>) -> Self {
        Self {
            backend,
            permissions: PermissionConfig::default(),
        }
    }

    /// Empty in-memory registry.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryRegistry::new()))
    }

    /// The machine's registry.
    #[cfg(windows)]
    pub fn native() -> Self {
        Self::new(Arc::new(NativeRegistry::new()))
    }

    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn backend(&self) -> &Arc<dyn RegistryBackend> {
        &self.backend
    }

    pub fn permissions(&self) -> &PermissionConfig {
        &self.permissions
    }

    /// Open a key by full path, e.g. `HKLM\Software` or `HKEY_USERS/.DEFAULT`.
    pub fn open(&self, path: &str) -> Result<RegistryPath> {
        self.open_with([path], &OpenOptions::default())
    }

    /// Open a key from fragments.
    ///
    /// Without [`OpenOptions::root`] the first segment names the root.
    pub fn open_with<I, S>(&self, fragments: I, options: &OpenOptions) -> Result<RegistryPath>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let path = RegistryPathString::parse(fragments, options.explicit_root())?;
        RegistryPath::open(
            Arc::clone(&self.backend),
            path,
            options.resolve(&self.permissions),
        )
    }

    /// Open a root key.
    pub fn open_root(&self, root: RootKey) -> Result<RegistryPath> {
        RegistryPath::open(
            Arc::clone(&self.backend),
            RegistryPathString::root_path(root),
            self.permissions.clone(),
        )
    }

    pub fn classes_root(&self) -> Result<RegistryPath> {
        self.open_root(RootKey::ClassesRoot)
    }

    pub fn current_user(&self) -> Result<RegistryPath> {
        self.open_root(RootKey::CurrentUser)
    }

    pub fn local_machine(&self) -> Result<RegistryPath> {
        self.open_root(RootKey::LocalMachine)
    }

    pub fn users(&self) -> Result<RegistryPath> {
        self.open_root(RootKey::Users)
    }

    pub fn current_config(&self) -> Result<RegistryPath> {
        self.open_root(RootKey::CurrentConfig)
    }
}

/// Builder for customized Registry configuration.
#[derive(Default)]
pub struct RegistryBuilder {
    backend: Option<Arc<dyn RegistryBackend>>,
    permissions: Vec<KeyPermission>,
    use_32bit_view: bool,
}

impl RegistryBuilder {
    /// Set a custom backend.
    pub fn backend(mut self, backend: Arc<dyn RegistryBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Add a default permission. With none added, keys open with `KEY_READ`.
    pub fn permission(mut self, permission: KeyPermission) -> Self {
        self.permissions.push(permission);
        self
    }

    pub fn permissions(mut self, permissions: impl IntoIterator<Item = KeyPermission>) -> Self {
        self.permissions.extend(permissions);
        self
    }

    /// Open keys in the 32-bit registry view by default.
    pub fn use_32bit_view(mut self, use_32bit_view: bool) -> Self {
        self.use_32bit_view = use_32bit_view;
        self
    }

    /// Build the registry. Without a backend, this is the machine's registry
    /// on Windows and an empty in-memory registry elsewhere.
    pub fn build(self) -> Registry {
        let backend = match self.backend.clone() {
            Some(backend) => backend,
            None => default_backend(),
        };
        self.finish(backend)
    }

    /// Build over an empty in-memory registry, ignoring any backend set.
    pub fn build_in_memory(self) -> Registry {
        self.finish(Arc::new(InMemoryRegistry::new()))
    }

    fn finish(self, backend: Arc<dyn RegistryBackend>) -> Registry {
        Registry {
            backend,
            permissions: PermissionConfig::new(self.permissions, self.use_32bit_view),
        }
    }
}

#[cfg(windows)]
fn default_backend() -> Arc<dyn RegistryBackend> {
    Arc::new(NativeRegistry::new())
}

#[cfg(not(windows))]
fn default_backend() -> Arc<dyn RegistryBackend> {
    Arc::new(InMemoryRegistry::new())
}

#[cfg(windows)]
fn native_registry() -> &'static Registry {
    static NATIVE: std::sync::OnceLock<Registry> = std::sync::OnceLock::new();
    NATIVE.get_or_init(Registry::native)
}

/// `HKEY_CLASSES_ROOT` of the machine's registry, freshly opened.
#[cfg(windows)]
pub fn hkcr() -> Result<RegistryPath> {
    native_registry().classes_root()
}

/// `HKEY_CURRENT_USER` of the machine's registry, freshly opened.
#[cfg(windows)]
pub fn hkcu() -> Result<RegistryPath> {
    native_registry().current_user()
}

/// `HKEY_LOCAL_MACHINE` of the machine's registry, freshly opened.
#[cfg(windows)]
pub fn hklm() -> Result<RegistryPath> {
    native_registry().local_machine()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_by_alias_and_full_name() {
        let registry = Registry::in_memory();
        let a = registry.open("HKCU").unwrap();
        let b = registry.open("hkey_current_user").unwrap();
        assert_eq!(a.path(), b.path());
        assert!(a.path().is_root());
    }

    #[test]
    fn test_open_with_explicit_root() {
        let registry = Registry::builder()
            .permission(KeyPermission::AllAccess)
            .build_in_memory();
        registry
            .local_machine()
            .unwrap()
            .create_subkey("Software", false)
            .unwrap();

        let node = registry
            .open_with(["Software"], &OpenOptions::new().root(RootKey::LocalMachine))
            .unwrap();
        assert_eq!(node.path().fullpath(), "HKEY_LOCAL_MACHINE\\Software");
        assert_eq!(node.permissions().permissions(), &[KeyPermission::AllAccess]);
    }

    #[test]
    fn test_invalid_root() {
        let registry = Registry::in_memory();
        let err = registry.open("HKXX\\Software").unwrap_err();
        assert!(matches!(err, Error::InvalidRoot(ref t) if t == "HKXX"));
    }

    #[test]
    fn test_builder_defaults() {
        let registry = Registry::builder().build_in_memory();
        assert_eq!(registry.permissions(), &PermissionConfig::default());

        let registry = Registry::builder()
            .permissions([KeyPermission::Read, KeyPermission::Write])
            .use_32bit_view(true)
            .build_in_memory();
        assert_eq!(registry.permissions().access_mask() & RegistryView::MASK, 0x0200);
    }

    #[test]
    fn test_root_shortcuts_reopen() {
        let registry = Registry::builder()
            .permission(KeyPermission::AllAccess)
            .build_in_memory();
        let first = registry.current_user().unwrap();
        first.create_subkey("A", false).unwrap();

        // a shortcut opened later sees the new key in its snapshot
        assert_eq!(first.info().subkey_count, 0);
        assert_eq!(registry.current_user().unwrap().info().subkey_count, 1);
        assert_eq!(registry.users().unwrap().info().subkey_count, 0);
    }
}
