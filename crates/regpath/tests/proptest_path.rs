//! Property-based tests for path parsing and access masks

use proptest::prelude::*;
use regpath::{KeyPermission, PermissionConfig, RegistryPathString, RegistryView, RootKey};

mod strategies {
    use proptest::prelude::*;
    use regpath::{KeyPermission, RootKey};

    /// Key names: no separators, never empty
    pub fn segment() -> impl Strategy<Value = String> {
        prop::string::string_regex("[a-zA-Z0-9 _.{}-]{1,20}").unwrap()
    }

    pub fn segments() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec(segment(), 0..6)
    }

    pub fn separator() -> impl Strategy<Value = &'static str> {
        prop_oneof![Just("\\"), Just("/")]
    }

    pub fn root() -> impl Strategy<Value = RootKey> {
        prop::sample::select(RootKey::ALL.to_vec())
    }

    pub fn permission() -> impl Strategy<Value = KeyPermission> {
        prop::sample::select(vec![
            KeyPermission::AllAccess,
            KeyPermission::Write,
            KeyPermission::Read,
            KeyPermission::Execute,
            KeyPermission::QueryValue,
            KeyPermission::SetValue,
            KeyPermission::CreateSubKey,
            KeyPermission::EnumerateSubKeys,
            KeyPermission::Notify,
            KeyPermission::CreateLink,
        ])
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Separator style never changes the canonical form
    #[test]
    fn fullpath_is_canonical(
        root in strategies::root(),
        segments in strategies::segments(),
        sep in strategies::separator(),
    ) {
        let mut raw = root.name().to_string();
        for segment in &segments {
            raw.push_str(sep);
            raw.push_str(segment);
        }
        let parsed: RegistryPathString = raw.parse().unwrap();

        let mut expected = root.name().to_string();
        for segment in &segments {
            expected.push('\\');
            expected.push_str(segment);
        }
        prop_assert_eq!(parsed.fullpath(), expected);
        prop_assert_eq!(parsed.segments(), segments.as_slice());
    }

    /// Alias, full name and any ASCII casing resolve to the same path
    #[test]
    fn aliases_are_equivalent(
        root in strategies::root(),
        segments in strategies::segments(),
        lowercase in any::<bool>(),
    ) {
        let rest = segments.join("\\");
        let alias = if lowercase { root.alias().to_ascii_lowercase() } else { root.alias().to_string() };
        let by_alias = RegistryPathString::parse([alias.as_str(), rest.as_str()], None).unwrap();
        let by_name = RegistryPathString::parse([root.name(), rest.as_str()], None).unwrap();
        prop_assert_eq!(&by_alias, &by_name);
        prop_assert_eq!(by_alias.root(), root);
    }

    /// Joining one segment and taking the parent is the identity
    #[test]
    fn join_then_parent(
        root in strategies::root(),
        segments in strategies::segments(),
        child in strategies::segment(),
    ) {
        let base = RegistryPathString::parse(&segments, Some(root)).unwrap();
        let joined = base.join(&child);
        prop_assert_eq!(joined.name(), Some(child.as_str()));
        prop_assert_eq!(joined.parent(), Some(base));
    }

    /// The view flag only moves the view bits
    #[test]
    fn view_changes_only_view_bits(
        permissions in prop::collection::vec(strategies::permission(), 0..5),
    ) {
        let wide = PermissionConfig::new(permissions.clone(), false).access_mask();
        let narrow = PermissionConfig::new(permissions, true).access_mask();

        prop_assert_eq!(wide & RegistryView::MASK, RegistryView::Wow64_64Key.bits());
        prop_assert_eq!(narrow & RegistryView::MASK, RegistryView::Wow64_32Key.bits());
        prop_assert_eq!(wide & !RegistryView::MASK, narrow & !RegistryView::MASK);
    }

    /// The mask is the union of the flags, whatever their order
    #[test]
    fn mask_is_union_of_flags(
        permissions in prop::collection::vec(strategies::permission(), 1..5),
    ) {
        let union = permissions.iter().fold(0, |mask, p| mask | p.bits());
        let mut reversed = permissions.clone();
        reversed.reverse();

        let mask = PermissionConfig::new(permissions, false).access_mask();
        prop_assert_eq!(mask & !RegistryView::MASK, union);
        prop_assert_eq!(mask, PermissionConfig::new(reversed, false).access_mask());
    }
}

#[test]
fn read_write_mask() {
    let conf = PermissionConfig::new([KeyPermission::Read, KeyPermission::Write], false);
    assert_eq!(
        conf.access_mask(),
        KeyPermission::Read.bits() | KeyPermission::Write.bits() | 0x0100
    );
    assert_eq!(RootKey::CurrentUser.to_string(), "HKEY_CURRENT_USER");
}
