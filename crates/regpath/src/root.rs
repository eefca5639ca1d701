//! Predefined root keys and their short aliases.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// One of the fixed top-level namespaces of the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum RootKey {
    ClassesRoot,
    CurrentUser,
    LocalMachine,
    Users,
    PerformanceData,
    CurrentConfig,
    DynData,
}

impl RootKey {
    /// Every root, in predefined-handle order.
    pub const ALL: [RootKey; 7] = [
        RootKey::ClassesRoot,
        RootKey::CurrentUser,
        RootKey::LocalMachine,
        RootKey::Users,
        RootKey::PerformanceData,
        RootKey::CurrentConfig,
        RootKey::DynData,
    ];

    /// Full name, e.g. `HKEY_CURRENT_USER`.
    pub fn name(self) -> &'static str {
        match self {
            RootKey::ClassesRoot => "HKEY_CLASSES_ROOT",
            RootKey::CurrentUser => "HKEY_CURRENT_USER",
            RootKey::LocalMachine => "HKEY_LOCAL_MACHINE",
            RootKey::Users => "HKEY_USERS",
            RootKey::PerformanceData => "HKEY_PERFORMANCE_DATA",
            RootKey::CurrentConfig => "HKEY_CURRENT_CONFIG",
            RootKey::DynData => "HKEY_DYN_DATA",
        }
    }

    /// Short alias, e.g. `HKCU`.
    pub fn alias(self) -> &'static str {
        match self {
            RootKey::ClassesRoot => "HKCR",
            RootKey::CurrentUser => "HKCU",
            RootKey::LocalMachine => "HKLM",
            RootKey::Users => "HKU",
            RootKey::PerformanceData => "HKPD",
            RootKey::CurrentConfig => "HKCC",
            RootKey::DynData => "HKDD",
        }
    }

    /// Value of the predefined handle (`HKEY_CLASSES_ROOT` is `0x8000_0000`).
    pub fn predefined_handle(self) -> u32 {
        let offset = match self {
            RootKey::ClassesRoot => 0,
            RootKey::CurrentUser => 1,
            RootKey::LocalMachine => 2,
            RootKey::Users => 3,
            RootKey::PerformanceData => 4,
            RootKey::CurrentConfig => 5,
            RootKey::DynData => 6,
        };
        0x8000_0000 | offset
    }

    /// Resolve a root token: full name or alias, ASCII case-insensitive.
    pub fn from_token(token: &str) -> Option<RootKey> {
        Self::ALL.into_iter().find(|root| {
            token.eq_ignore_ascii_case(root.name()) || token.eq_ignore_ascii_case(root.alias())
        })
    }
}

impl fmt::Display for RootKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RootKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RootKey::from_token(s).ok_or_else(|| Error::InvalidRoot(s.to_string()))
    }
}

impl From<RootKey> for String {
    fn from(root: RootKey) -> Self {
        root.name().to_string()
    }
}

impl TryFrom<String> for RootKey {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases_and_full_names() {
        assert_eq!(RootKey::from_token("HKCR"), Some(RootKey::ClassesRoot));
        assert_eq!(RootKey::from_token("HKCU"), Some(RootKey::CurrentUser));
        assert_eq!(RootKey::from_token("HKLM"), Some(RootKey::LocalMachine));
        assert_eq!(RootKey::from_token("HKU"), Some(RootKey::Users));
        assert_eq!(
            RootKey::from_token("HKEY_CLASSES_ROOT"),
            Some(RootKey::ClassesRoot)
        );
        assert_eq!(
            RootKey::from_token("hkey_current_user"),
            Some(RootKey::CurrentUser)
        );
    }

    #[test]
    fn test_unknown_token() {
        assert_eq!(RootKey::from_token("INVALID"), None);
        assert_eq!(RootKey::from_token(""), None);
        assert!(matches!(
            "HKEY_NOWHERE".parse::<RootKey>(),
            Err(Error::InvalidRoot(t)) if t == "HKEY_NOWHERE"
        ));
    }

    #[test]
    fn test_predefined_handles() {
        assert_eq!(RootKey::ClassesRoot.predefined_handle(), 0x8000_0000);
        assert_eq!(RootKey::DynData.predefined_handle(), 0x8000_0006);
    }
}
