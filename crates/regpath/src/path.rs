//! Registry path strings.
//!
//! A [`RegistryPathString`] is a root key plus an ordered list of segments.
//! Input may use either `\` or `/` as separator and may spread the path over
//! several fragments; output is always joined with `\`.
//!
//! ```rust
//! use regpath::{RegistryPathString, RootKey};
//!
//! let p = RegistryPathString::parse(["HKCU/Software", "Vendor\\App"], None).unwrap();
//! assert_eq!(p.root(), RootKey::CurrentUser);
//! assert_eq!(p.path(), "Software\\Vendor\\App");
//! assert_eq!(p.fullpath(), "HKEY_CURRENT_USER\\Software\\Vendor\\App");
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::root::RootKey;

/// Canonical separator used in every rendered path.
pub const REGISTRY_SEP: char = '\\';

fn is_sep(c: char) -> bool {
    c == '\\' || c == '/'
}

fn split_fragments<I, S>(fragments: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    fragments
        .into_iter()
        .flat_map(|fragment| {
            fragment
                .as_ref()
                .split(is_sep)
                .filter(|token| !token.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Root key plus segments, e.g. `HKEY_CURRENT_USER\Software\Vendor`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistryPathString {
    root: RootKey,
    segments: Vec<String>,
}

impl RegistryPathString {
    /// Parse fragments into a path.
    ///
    /// Without `root`, the first segment must name a root (full name or
    /// alias) and is consumed.
    ///
    /// # Errors
    /// - [`Error::InvalidRoot`] if no root is given and the first segment is
    ///   missing or is not a root token
    pub fn parse<I, S>(fragments: I, root: Option<RootKey>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut segments = split_fragments(fragments);
        let root = match root {
            Some(root) => root,
            None => {
                if segments.is_empty() {
                    return Err(Error::InvalidRoot(String::new()));
                }
                let token = segments.remove(0);
                RootKey::from_token(&token).ok_or(Error::InvalidRoot(token))?
            }
        };
        Ok(Self { root, segments })
    }

    /// Path to the root key itself.
    pub fn root_path(root: RootKey) -> Self {
        Self {
            root,
            segments: Vec::new(),
        }
    }

    pub fn root(&self) -> RootKey {
        self.root
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Last segment; `None` at the root.
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Segments joined with `\`, without the root.
    pub fn path(&self) -> String {
        self.segments.join("\\")
    }

    /// Root name followed by the segments, joined with `\`.
    pub fn fullpath(&self) -> String {
        let mut full = self.root.name().to_string();
        for segment in &self.segments {
            full.push(REGISTRY_SEP);
            full.push_str(segment);
        }
        full
    }

    /// Drop the last segment; `None` at the root.
    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.segments.split_last()?;
        Some(Self {
            root: self.root,
            segments: rest.to_vec(),
        })
    }

    /// Append fragments. No root inference happens on the fragments.
    pub fn joinpath<I, S>(&self, fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut segments = self.segments.clone();
        segments.extend(split_fragments(fragments));
        Self {
            root: self.root,
            segments,
        }
    }

    /// Append a single fragment, which may itself contain separators.
    pub fn join(&self, fragment: impl AsRef<str>) -> Self {
        self.joinpath([fragment])
    }

    /// Append one segment as is, without splitting it.
    ///
    /// For names read back from the registry, which may contain `/`.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self {
            root: self.root,
            segments,
        }
    }

    /// Segments below `base`; `None` if `base` is not this path or an
    /// ancestor of it.
    pub fn strip_prefix(&self, base: &RegistryPathString) -> Option<&[String]> {
        if self.root != base.root {
            return None;
        }
        self.segments.strip_prefix(base.segments.as_slice())
    }
}

impl fmt::Display for RegistryPathString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fullpath())
    }
}

impl FromStr for RegistryPathString {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse([s], None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hkcu(fragments: &[&str]) -> RegistryPathString {
        RegistryPathString::parse(fragments, Some(RootKey::CurrentUser)).unwrap()
    }

    #[test]
    fn test_parse_with_explicit_root() {
        let p = hkcu(&["Software\\Test"]);
        assert_eq!(p.root(), RootKey::CurrentUser);
        assert_eq!(p.segments(), &["Software", "Test"]);
    }

    #[test]
    fn test_parse_infers_root() {
        let p: RegistryPathString = "HKCU\\Software\\Test".parse().unwrap();
        assert_eq!(p.root(), RootKey::CurrentUser);
        assert_eq!(p.segments(), &["Software", "Test"]);

        let p: RegistryPathString = "HKEY_LOCAL_MACHINE\\System\\CurrentControlSet"
            .parse()
            .unwrap();
        assert_eq!(p.root(), RootKey::LocalMachine);
        assert_eq!(p.path(), "System\\CurrentControlSet");
    }

    #[test]
    fn test_forward_slashes() {
        let p = hkcu(&["Software/Test"]);
        assert_eq!(p.segments(), &["Software", "Test"]);

        let p: RegistryPathString = "HKCU/Software/Test".parse().unwrap();
        assert_eq!(p.fullpath(), "HKEY_CURRENT_USER\\Software\\Test");
    }

    #[test]
    fn test_invalid_root() {
        assert!(matches!(
            "INVALID\\Software".parse::<RegistryPathString>(),
            Err(Error::InvalidRoot(t)) if t == "INVALID"
        ));
        assert!(matches!(
            RegistryPathString::parse(Vec::<String>::new(), None),
            Err(Error::InvalidRoot(_))
        ));
    }

    #[test]
    fn test_empty_tokens_are_not_segments() {
        let p = hkcu(&["\\Software\\\\Test\\", ""]);
        assert_eq!(p.segments(), &["Software", "Test"]);
    }

    #[test]
    fn test_root_path() {
        let p: RegistryPathString = "HKLM".parse().unwrap();
        assert!(p.is_root());
        assert_eq!(p.path(), "");
        assert_eq!(p.fullpath(), "HKEY_LOCAL_MACHINE");
        assert_eq!(p.parent(), None);
        assert_eq!(p.name(), None);
    }

    #[test]
    fn test_parent() {
        let p = hkcu(&["Software", "Test"]);
        let parent = p.parent().unwrap();
        assert_eq!(parent.path(), "Software");
        assert_eq!(parent.fullpath(), "HKEY_CURRENT_USER\\Software");
    }

    #[test]
    fn test_joinpath() {
        let p = hkcu(&["Software"]);
        let joined = p.joinpath(["Test", "Subkey"]);
        assert_eq!(joined.path(), "Software\\Test\\Subkey");
        assert_eq!(
            joined.fullpath(),
            "HKEY_CURRENT_USER\\Software\\Test\\Subkey"
        );
        // the original is untouched
        assert_eq!(p.path(), "Software");
    }

    #[test]
    fn test_joinpath_does_not_infer_root() {
        let p = hkcu(&["Software"]);
        let joined = p.join("HKLM/Test");
        assert_eq!(joined.root(), RootKey::CurrentUser);
        assert_eq!(joined.segments(), &["Software", "HKLM", "Test"]);
    }

    #[test]
    fn test_child_keeps_slashes() {
        let p = hkcu(&["Software"]);
        let child = p.child("a/b");
        assert_eq!(child.segments(), &["Software", "a/b"]);
        assert_eq!(child.parent(), Some(p));
    }

    #[test]
    fn test_strip_prefix() {
        let base = hkcu(&["Software"]);
        let deep = base.join("A/B");
        assert_eq!(deep.strip_prefix(&base), Some(&["A".to_string(), "B".to_string()][..]));
        assert_eq!(base.strip_prefix(&base).map(<[String]>::len), Some(0));
        assert_eq!(base.strip_prefix(&deep), None);

        let other_root = RegistryPathString::parse(["Software"], Some(RootKey::LocalMachine)).unwrap();
        assert_eq!(deep.strip_prefix(&other_root), None);
    }

    #[test]
    fn test_display() {
        let p = hkcu(&["Software", "Test"]);
        assert_eq!(p.to_string(), "HKEY_CURRENT_USER\\Software\\Test");
    }
}
