//! In-memory registry implementation

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::io::{Error as IoError, ErrorKind, Result};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::limits::RegistryLimits;
use super::{KeyInfo, KeyParent, RawHandle, RawValue, RegistryBackend};
use crate::permission::KeyPermission;
use crate::root::RootKey;

type NodeId = u64;

/// In-memory registry.
///
/// Keys live in an arena keyed by node id; open handles map to node ids.
/// Names are matched case-insensitively and keep the case they were created
/// with. Subkeys and values enumerate in case-folded alphabetical order.
///
/// Handle access masks are enforced:
///
/// | Operation | Required access on the handle |
/// |-----------|-------------------------------|
/// | `query_info`, `query_value`, `enum_value` | `KEY_QUERY_VALUE` |
/// | `enum_key` | `KEY_ENUMERATE_SUB_KEYS` |
/// | `create_key` | `KEY_CREATE_SUB_KEY` |
/// | `set_value`, `delete_value` | `KEY_SET_VALUE` |
///
/// The 32/64-bit view bits are accepted and ignored: both views see the same
/// keys.
pub struct InMemoryRegistry {
    state: RwLock<State>,
    limits: RegistryLimits,
}

struct State {
    nodes: HashMap<NodeId, KeyNode>,
    roots: HashMap<RootKey, NodeId>,
    handles: HashMap<u64, OpenKey>,
    next_node: NodeId,
    next_handle: u64,
}

struct KeyNode {
    name: String,
    depth: usize,
    subkeys: BTreeMap<String, NodeId>,
    values: BTreeMap<String, StoredValue>,
    last_modified: DateTime<Utc>,
}

#[derive(Clone)]
struct StoredValue {
    name: String,
    type_code: u32,
    data: Vec<u8>,
}

impl StoredValue {
    fn to_raw(&self) -> RawValue {
        RawValue {
            name: self.name.clone(),
            type_code: self.type_code,
            data: self.data.clone(),
        }
    }
}

#[derive(Clone, Copy)]
struct OpenKey {
    node: NodeId,
    access: u32,
}

fn fold(name: &str) -> String {
    name.to_lowercase()
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('\\').filter(|s| !s.is_empty())
}

fn not_found(what: &str) -> IoError {
    IoError::new(ErrorKind::NotFound, format!("{what} not found"))
}

fn access_denied() -> IoError {
    IoError::new(ErrorKind::PermissionDenied, "access denied")
}

fn key_deleted() -> IoError {
    IoError::other("illegal operation attempted on a registry key that has been marked for deletion")
}

fn no_more_items() -> IoError {
    IoError::other("no more data is available")
}

impl KeyNode {
    fn new(name: impl Into<String>, depth: usize) -> Self {
        Self {
            name: name.into(),
            depth,
            subkeys: BTreeMap::new(),
            values: BTreeMap::new(),
            last_modified: Utc::now(),
        }
    }
}

impl State {
    fn node(&self, id: NodeId) -> Result<&KeyNode> {
        self.nodes.get(&id).ok_or_else(key_deleted)
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut KeyNode> {
        self.nodes.get_mut(&id).ok_or_else(key_deleted)
    }

    fn open_key(&self, handle: RawHandle) -> Result<OpenKey> {
        let open = self
            .handles
            .get(&handle.as_raw())
            .copied()
            .ok_or_else(|| IoError::new(ErrorKind::InvalidInput, "invalid handle"))?;
        // the key may have been deleted through another handle
        self.node(open.node)?;
        Ok(open)
    }

    /// Handle lookup plus access check.
    fn checked(&self, handle: RawHandle, required: u32) -> Result<NodeId> {
        let open = self.open_key(handle)?;
        if open.access & required != required {
            return Err(access_denied());
        }
        Ok(open.node)
    }

    fn walk(&self, start: NodeId, path: &str) -> Result<NodeId> {
        let mut current = start;
        for segment in segments(path) {
            current = *self
                .node(current)?
                .subkeys
                .get(&fold(segment))
                .ok_or_else(|| not_found("key"))?;
        }
        Ok(current)
    }

    fn alloc_node(&mut self, node: KeyNode) -> NodeId {
        let id = self.next_node;
        self.next_node += 1;
        self.nodes.insert(id, node);
        id
    }
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRegistry {
    /// Create an empty registry: every root exists and has no subkeys.
    pub fn new() -> Self {
        Self::with_limits(RegistryLimits::default())
    }

    /// Create an empty registry with custom limits.
    pub fn with_limits(limits: RegistryLimits) -> Self {
        let mut state = State {
            nodes: HashMap::new(),
            roots: HashMap::new(),
            handles: HashMap::new(),
            next_node: 0,
            next_handle: 1,
        };
        for root in RootKey::ALL {
            let id = state.alloc_node(KeyNode::new(root.name(), 0));
            state.roots.insert(root, id);
        }
        Self {
            state: RwLock::new(state),
            limits,
        }
    }

    pub fn limits(&self) -> &RegistryLimits {
        &self.limits
    }

    /// Number of handles currently open.
    pub fn open_handle_count(&self) -> usize {
        self.read().map(|state| state.handles.len()).unwrap_or(0)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| IoError::other("registry state poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| IoError::other("registry state poisoned"))
    }
}

impl RegistryBackend for InMemoryRegistry {
    fn open_key(&self, parent: KeyParent, path: &str, access: u32) -> Result<RawHandle> {
        let mut state = self.write()?;
        let start = match parent {
            KeyParent::Root(root) => *state.roots.get(&root).ok_or_else(|| not_found("root"))?,
            KeyParent::Key(handle) => state.open_key(handle)?.node,
        };
        let node = state.walk(start, path)?;

        let raw = state.next_handle;
        state.next_handle += 1;
        state.handles.insert(raw, OpenKey { node, access });
        Ok(RawHandle::from_raw(raw))
    }

    fn close_key(&self, handle: RawHandle) -> Result<()> {
        let mut state = self.write()?;
        state
            .handles
            .remove(&handle.as_raw())
            .map(|_| ())
            .ok_or_else(|| IoError::new(ErrorKind::InvalidInput, "invalid handle"))
    }

    fn create_key(&self, parent: RawHandle, name: &str, _access: u32) -> Result<()> {
        let mut state = self.write()?;
        let mut current = state.checked(parent, KeyPermission::CREATE_SUB_KEY)?;

        for segment in segments(name) {
            let key = fold(segment);
            let node = state.node(current)?;
            if let Some(&child) = node.subkeys.get(&key) {
                current = child;
                continue;
            }

            let depth = node.depth + 1;
            self.limits.check_key(segment, depth)?;
            let child = state.alloc_node(KeyNode::new(segment, depth));
            let node = state.node_mut(current)?;
            node.subkeys.insert(key, child);
            node.last_modified = Utc::now();
            current = child;
        }
        Ok(())
    }

    fn delete_key(&self, parent: RawHandle, name: &str, _access: u32) -> Result<()> {
        let mut state = self.write()?;
        let start = state.open_key(parent)?.node;

        let mut owner = start;
        let mut target = start;
        for segment in segments(name) {
            owner = target;
            target = state.walk(owner, segment)?;
        }
        if target == start {
            return Err(IoError::new(
                ErrorKind::InvalidInput,
                "a key cannot delete itself",
            ));
        }
        if !state.node(target)?.subkeys.is_empty() {
            return Err(IoError::new(
                ErrorKind::PermissionDenied,
                "access denied: key has subkeys",
            ));
        }

        let removed = state.nodes.remove(&target).ok_or_else(key_deleted)?;
        let owner = state.node_mut(owner)?;
        owner.subkeys.remove(&fold(&removed.name));
        owner.last_modified = Utc::now();
        Ok(())
    }

    fn query_info(&self, handle: RawHandle) -> Result<KeyInfo> {
        let state = self.read()?;
        let node = state.node(state.checked(handle, KeyPermission::QUERY_VALUE)?)?;
        Ok(KeyInfo {
            subkey_count: node.subkeys.len() as u32,
            value_count: node.values.len() as u32,
            last_modified: node.last_modified,
        })
    }

    fn enum_key(&self, handle: RawHandle, index: u32) -> Result<String> {
        let state = self.read()?;
        let node = state.node(state.checked(handle, KeyPermission::ENUMERATE_SUB_KEYS)?)?;
        let child = node
            .subkeys
            .values()
            .nth(index as usize)
            .ok_or_else(no_more_items)?;
        Ok(state.node(*child)?.name.clone())
    }

    fn enum_value(&self, handle: RawHandle, index: u32) -> Result<RawValue> {
        let state = self.read()?;
        let node = state.node(state.checked(handle, KeyPermission::QUERY_VALUE)?)?;
        node.values
            .values()
            .nth(index as usize)
            .map(StoredValue::to_raw)
            .ok_or_else(no_more_items)
    }

    fn query_value(&self, handle: RawHandle, name: &str) -> Result<RawValue> {
        let state = self.read()?;
        let node = state.node(state.checked(handle, KeyPermission::QUERY_VALUE)?)?;
        node.values
            .get(&fold(name))
            .map(StoredValue::to_raw)
            .ok_or_else(|| not_found("value"))
    }

    fn set_value(&self, handle: RawHandle, name: &str, type_code: u32, data: &[u8]) -> Result<()> {
        self.limits.check_value_name(name)?;
        let mut state = self.write()?;
        let id = state.checked(handle, KeyPermission::SET_VALUE)?;
        let node = state.node_mut(id)?;

        let key = fold(name);
        // an overwrite keeps the name's original case
        let stored_name = node
            .values
            .get(&key)
            .map(|v| v.name.clone())
            .unwrap_or_else(|| name.to_string());
        node.values.insert(
            key,
            StoredValue {
                name: stored_name,
                type_code,
                data: data.to_vec(),
            },
        );
        node.last_modified = Utc::now();
        Ok(())
    }

    fn delete_value(&self, handle: RawHandle, name: &str) -> Result<()> {
        let mut state = self.write()?;
        let id = state.checked(handle, KeyPermission::SET_VALUE)?;
        let node = state.node_mut(id)?;
        node.values
            .remove(&fold(name))
            .ok_or_else(|| not_found("value"))?;
        node.last_modified = Utc::now();
        Ok(())
    }
}
