//! Key access rights and access-mask composition.
//!
//! A [`PermissionConfig`] is built once per handler and turned into the
//! access mask passed to every backend call that handler makes.

use serde::{Deserialize, Serialize};

/// Key access rights (`KEY_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyPermission {
    #[serde(rename = "KEY_ALL_ACCESS")]
    AllAccess,
    #[serde(rename = "KEY_WRITE")]
    Write,
    #[serde(rename = "KEY_READ")]
    Read,
    #[serde(rename = "KEY_EXECUTE")]
    Execute,
    #[serde(rename = "KEY_QUERY_VALUE")]
    QueryValue,
    #[serde(rename = "KEY_SET_VALUE")]
    SetValue,
    #[serde(rename = "KEY_CREATE_SUB_KEY")]
    CreateSubKey,
    #[serde(rename = "KEY_ENUMERATE_SUB_KEYS")]
    EnumerateSubKeys,
    #[serde(rename = "KEY_NOTIFY")]
    Notify,
    #[serde(rename = "KEY_CREATE_LINK")]
    CreateLink,
}

impl KeyPermission {
    pub const QUERY_VALUE: u32 = 0x0001;
    pub const SET_VALUE: u32 = 0x0002;
    pub const CREATE_SUB_KEY: u32 = 0x0004;
    pub const ENUMERATE_SUB_KEYS: u32 = 0x0008;
    pub const NOTIFY: u32 = 0x0010;
    pub const CREATE_LINK: u32 = 0x0020;
    const READ_CONTROL: u32 = 0x0002_0000;
    const STANDARD_RIGHTS_REQUIRED: u32 = 0x000F_0000;
    const SYNCHRONIZE: u32 = 0x0010_0000;

    /// Raw access bits.
    pub fn bits(self) -> u32 {
        match self {
            KeyPermission::AllAccess => {
                (Self::STANDARD_RIGHTS_REQUIRED
                    | Self::QUERY_VALUE
                    | Self::SET_VALUE
                    | Self::CREATE_SUB_KEY
                    | Self::ENUMERATE_SUB_KEYS
                    | Self::NOTIFY
                    | Self::CREATE_LINK)
                    & !Self::SYNCHRONIZE
            }
            KeyPermission::Write => {
                (Self::READ_CONTROL | Self::SET_VALUE | Self::CREATE_SUB_KEY) & !Self::SYNCHRONIZE
            }
            KeyPermission::Read | KeyPermission::Execute => {
                (Self::READ_CONTROL | Self::QUERY_VALUE | Self::ENUMERATE_SUB_KEYS | Self::NOTIFY)
                    & !Self::SYNCHRONIZE
            }
            KeyPermission::QueryValue => Self::QUERY_VALUE,
            KeyPermission::SetValue => Self::SET_VALUE,
            KeyPermission::CreateSubKey => Self::CREATE_SUB_KEY,
            KeyPermission::EnumerateSubKeys => Self::ENUMERATE_SUB_KEYS,
            KeyPermission::Notify => Self::NOTIFY,
            KeyPermission::CreateLink => Self::CREATE_LINK,
        }
    }
}

/// Which registry view (WOW64 redirection) a handle is opened against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RegistryView {
    #[default]
    #[serde(rename = "KEY_WOW64_64KEY")]
    Wow64_64Key,
    #[serde(rename = "KEY_WOW64_32KEY")]
    Wow64_32Key,
}

impl RegistryView {
    /// Both view bits; exactly one of them is set in a composed mask.
    pub const MASK: u32 = 0x0100 | 0x0200;

    pub fn bits(self) -> u32 {
        match self {
            RegistryView::Wow64_64Key => 0x0100,
            RegistryView::Wow64_32Key => 0x0200,
        }
    }
}

/// Permissions plus view selector for one handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PermissionConfigRepr")]
pub struct PermissionConfig {
    permissions: Vec<KeyPermission>,
    use_32bit_view: bool,
}

// Deserialized configs go through `new` so the permission set is never empty.
#[derive(Deserialize)]
struct PermissionConfigRepr {
    #[serde(default)]
    permissions: Vec<KeyPermission>,
    #[serde(default)]
    use_32bit_view: bool,
}

impl From<PermissionConfigRepr> for PermissionConfig {
    fn from(repr: PermissionConfigRepr) -> Self {
        Self::new(repr.permissions, repr.use_32bit_view)
    }
}

impl Default for PermissionConfig {
    fn default() -> Self {
        Self {
            permissions: vec![KeyPermission::Read],
            use_32bit_view: false,
        }
    }
}

impl PermissionConfig {
    /// Build a config from one or more permissions.
    ///
    /// Duplicates are dropped, keeping first-seen order. An empty set falls
    /// back to [`KeyPermission::Read`].
    pub fn new(permissions: impl IntoIterator<Item = KeyPermission>, use_32bit_view: bool) -> Self {
        let mut unique = Vec::new();
        for permission in permissions {
            if !unique.contains(&permission) {
                unique.push(permission);
            }
        }
        if unique.is_empty() {
            unique.push(KeyPermission::Read);
        }
        Self {
            permissions: unique,
            use_32bit_view,
        }
    }

    /// Same permissions, different view.
    pub fn with_32bit_view(mut self, use_32bit_view: bool) -> Self {
        self.use_32bit_view = use_32bit_view;
        self
    }

    pub fn permissions(&self) -> &[KeyPermission] {
        &self.permissions
    }

    pub fn use_32bit_view(&self) -> bool {
        self.use_32bit_view
    }

    pub fn view(&self) -> RegistryView {
        if self.use_32bit_view {
            RegistryView::Wow64_32Key
        } else {
            RegistryView::Wow64_64Key
        }
    }

    /// Union of every permission OR'd with the selected view bit.
    pub fn access_mask(&self) -> u32 {
        self.permissions
            .iter()
            .fold(0, |mask, permission| mask | permission.bits())
            | self.view().bits()
    }
}

impl From<KeyPermission> for PermissionConfig {
    fn from(permission: KeyPermission) -> Self {
        Self::new([permission], false)
    }
}

impl<const N: usize> From<[KeyPermission; N]> for PermissionConfig {
    fn from(permissions: [KeyPermission; N]) -> Self {
        Self::new(permissions, false)
    }
}

impl From<Vec<KeyPermission>> for PermissionConfig {
    fn from(permissions: Vec<KeyPermission>) -> Self {
        Self::new(permissions, false)
    }
}
