//! In-memory key store backed by a JSON hive file.
//!
//! Names compare case-insensitively and keep the case they were created
//! with. Per-key locks simulate the permission and in-use failures a live
//! registry produces, so the escalation path can run anywhere.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{Result, StoreError, StoreResult, SweeperError};
use crate::hive::key::{KeyPath, RootKey};
use crate::hive::snapshot::KeySnapshot;
use crate::hive::store::{Access, AccessControl, KeyHandle, KeyStore};
use crate::hive::value::{Value, ValueData};

/// Simulated protection on a single key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyLock {
    #[default]
    None,
    /// Writes refused until ownership is taken and full control granted.
    Denied,
    /// Writes refused and ownership cannot be taken.
    System,
    /// Held open elsewhere; every delete fails until reboot.
    Pinned,
}

impl KeyLock {
    fn blocks_write(self) -> bool {
        matches!(self, KeyLock::Denied | KeyLock::System)
    }

    fn check_delete(self, path: &str) -> StoreResult<()> {
        match self {
            KeyLock::None => Ok(()),
            KeyLock::Denied | KeyLock::System => Err(StoreError::AccessDenied(path.to_string())),
            KeyLock::Pinned => Err(StoreError::InUse(path.to_string())),
        }
    }
}

/// On-disk hive file layout.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct HiveFile {
    /// One entry per root; `name` is the canonical root name.
    pub roots: Vec<KeySnapshot>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locks: Vec<LockEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockEntry {
    pub path: KeyPath,
    pub lock: KeyLock,
}

#[derive(Debug, Clone, Default)]
struct Node {
    name: String,
    values: Vec<Value>,
    children: BTreeMap<String, Node>,
    lock: KeyLock,
    owned: bool,
}

fn fold(name: &str) -> String {
    name.to_lowercase()
}

fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split('\\').filter(|part| !part.is_empty())
}

impl Node {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn find(&self, path: &str) -> Option<&Node> {
        components(path).try_fold(self, |node, part| node.children.get(&fold(part)))
    }

    fn find_mut(&mut self, path: &str) -> Option<&mut Node> {
        components(path).try_fold(self, |node, part| node.children.get_mut(&fold(part)))
    }

    fn value_index(&self, name: &str) -> Option<usize> {
        self.values
            .iter()
            .position(|v| v.name.eq_ignore_ascii_case(name) || fold(&v.name) == fold(name))
    }

    fn put_value(&mut self, name: &str, data: ValueData) {
        match self.value_index(name) {
            Some(idx) => self.values[idx].data = data,
            None => self.values.push(Value::new(name, data)),
        }
    }

    /// First lock in this subtree that would stop a recursive delete.
    fn subtree_block(&self, path: &str) -> StoreResult<()> {
        self.lock.check_delete(path)?;
        for child in self.children.values() {
            child.subtree_block(&format!("{}\\{}", path, child.name))?;
        }
        Ok(())
    }

    fn from_snapshot(snapshot: &KeySnapshot) -> Self {
        let mut node = Node::named(&snapshot.name);
        for value in &snapshot.values {
            node.put_value(&value.name, value.data.clone());
        }
        for child in &snapshot.subkeys {
            node.children.insert(fold(&child.name), Node::from_snapshot(child));
        }
        node
    }

    fn to_snapshot(&self) -> KeySnapshot {
        KeySnapshot {
            name: self.name.clone(),
            values: self.values.clone(),
            subkeys: self.children.values().map(Node::to_snapshot).collect(),
        }
    }

    fn collect_locks(&self, path: &KeyPath, out: &mut Vec<LockEntry>) {
        if self.lock != KeyLock::None {
            out.push(LockEntry {
                path: path.clone(),
                lock: self.lock,
            });
        }
        for child in self.children.values() {
            child.collect_locks(&path.join(&child.name), out);
        }
    }
}

/// Thread-safe in-memory key store.
#[derive(Debug)]
pub struct MemoryStore {
    roots: RwLock<BTreeMap<RootKey, Node>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Store with every root present and empty.
    pub fn new() -> Self {
        let roots = RootKey::ALL
            .into_iter()
            .map(|root| (root, Node::named(root.canonical_name())))
            .collect();
        Self {
            roots: RwLock::new(roots),
        }
    }

    pub fn from_hive(hive: &HiveFile) -> StoreResult<Self> {
        let store = Self::new();
        {
            let mut roots = store.roots.write();
            for snapshot in &hive.roots {
                let root = RootKey::parse(&snapshot.name)
                    .ok_or_else(|| StoreError::InvalidPath(snapshot.name.clone()))?;
                let mut node = Node::from_snapshot(snapshot);
                node.name = root.canonical_name().to_string();
                roots.insert(root, node);
            }
        }
        for entry in &hive.locks {
            if !store.set_lock(&entry.path, entry.lock) {
                return Err(StoreError::NotFound(entry.path.to_string()));
            }
        }
        Ok(store)
    }

    pub fn to_hive(&self) -> HiveFile {
        let roots = self.roots.read();
        let mut locks = Vec::new();
        for (root, node) in roots.iter() {
            node.collect_locks(&KeyPath::new(*root, ""), &mut locks);
        }
        HiveFile {
            roots: roots.values().map(Node::to_snapshot).collect(),
            locks,
        }
    }

    /// Load a hive file written by [`MemoryStore::save`].
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| SweeperError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let hive: HiveFile =
            serde_json::from_str(&content).map_err(|source| SweeperError::HiveFormat {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::from_hive(&hive)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.to_hive()).map_err(|source| {
            SweeperError::HiveFormat {
                path: path.to_path_buf(),
                source,
            }
        })?;
        fs::write(path, json).map_err(|source| SweeperError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Create a key and its parents, ignoring locks.
    pub fn put_key(&self, path: &KeyPath) {
        let mut roots = self.roots.write();
        if let Some(root) = roots.get_mut(&path.root) {
            let mut node = root;
            for part in components(&path.subkey) {
                node = node
                    .children
                    .entry(fold(part))
                    .or_insert_with(|| Node::named(part));
            }
        }
    }

    /// Set a value, creating the key if needed and ignoring locks.
    pub fn put_value(&self, path: &KeyPath, name: &str, data: ValueData) {
        self.put_key(path);
        let mut roots = self.roots.write();
        if let Some(node) = roots
            .get_mut(&path.root)
            .and_then(|root| root.find_mut(&path.subkey))
        {
            node.put_value(name, data);
        }
    }

    /// Attach a simulated lock. Returns `false` when the key does not exist.
    pub fn set_lock(&self, path: &KeyPath, lock: KeyLock) -> bool {
        let mut roots = self.roots.write();
        match roots
            .get_mut(&path.root)
            .and_then(|root| root.find_mut(&path.subkey))
        {
            Some(node) => {
                node.lock = lock;
                node.owned = false;
                true
            }
            None => false,
        }
    }

    pub fn lock_of(&self, path: &KeyPath) -> Option<KeyLock> {
        self.with_node(path, |node| node.lock)
    }

    /// Whether ownership of the key has been taken since its lock was set.
    pub fn is_owned(&self, path: &KeyPath) -> bool {
        self.with_node(path, |node| node.owned).unwrap_or(false)
    }

    pub fn contains_key(&self, path: &KeyPath) -> bool {
        self.with_node(path, |_| ()).is_some()
    }

    pub fn value_of(&self, path: &KeyPath, name: &str) -> Option<ValueData> {
        self.with_node(path, |node| {
            node.value_index(name).map(|idx| node.values[idx].data.clone())
        })
        .flatten()
    }

    fn with_node<T>(&self, path: &KeyPath, f: impl FnOnce(&Node) -> T) -> Option<T> {
        let roots = self.roots.read();
        roots
            .get(&path.root)
            .and_then(|root| root.find(&path.subkey))
            .map(f)
    }

    fn with_node_mut<T>(
        &self,
        path: &KeyPath,
        f: impl FnOnce(&mut Node) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut roots = self.roots.write();
        let node = roots
            .get_mut(&path.root)
            .and_then(|root| root.find_mut(&path.subkey))
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        f(node)
    }
}

impl KeyStore for MemoryStore {
    fn open(&self, root: RootKey, path: &str, access: Access) -> StoreResult<Box<dyn KeyHandle + '_>> {
        let key = KeyPath::new(root, path);
        let lock = self
            .lock_of(&key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

        if access.can_write() && lock.blocks_write() {
            return Err(StoreError::AccessDenied(key.to_string()));
        }

        Ok(Box::new(MemoryHandle {
            store: self,
            path: key,
            access,
        }))
    }

    fn create(&self, root: RootKey, path: &str) -> StoreResult<Box<dyn KeyHandle + '_>> {
        let key = KeyPath::new(root, path);
        {
            let mut roots = self.roots.write();
            let mut node = roots
                .get_mut(&root)
                .ok_or_else(|| StoreError::NotFound(root.to_string()))?;
            let mut walked = KeyPath::new(root, "");

            for part in components(&key.subkey) {
                let folded = fold(part);
                if !node.children.contains_key(&folded) && node.lock.blocks_write() {
                    return Err(StoreError::AccessDenied(walked.to_string()));
                }
                walked = walked.join(part);
                node = node
                    .children
                    .entry(folded)
                    .or_insert_with(|| Node::named(part));
            }

            if node.lock.blocks_write() {
                return Err(StoreError::AccessDenied(key.to_string()));
            }
        }

        Ok(Box::new(MemoryHandle {
            store: self,
            path: key,
            access: Access::Full,
        }))
    }

    fn access_control(&self) -> Option<&dyn AccessControl> {
        Some(self)
    }
}

impl AccessControl for MemoryStore {
    fn take_ownership(&self, root: RootKey, path: &str) -> StoreResult<()> {
        let key = KeyPath::new(root, path);
        self.with_node_mut(&key, |node| {
            if node.lock == KeyLock::System {
                return Err(StoreError::AccessDenied(key.to_string()));
            }
            node.owned = true;
            Ok(())
        })
    }

    fn grant_full_control(&self, root: RootKey, path: &str) -> StoreResult<()> {
        let key = KeyPath::new(root, path);
        self.with_node_mut(&key, |node| match (node.lock, node.owned) {
            (KeyLock::System, _) | (KeyLock::Denied, false) => {
                Err(StoreError::AccessDenied(key.to_string()))
            }
            (KeyLock::Denied, true) => {
                node.lock = KeyLock::None;
                Ok(())
            }
            (KeyLock::None | KeyLock::Pinned, _) => Ok(()),
        })
    }
}

struct MemoryHandle<'a> {
    store: &'a MemoryStore,
    path: KeyPath,
    access: Access,
}

impl MemoryHandle<'_> {
    fn require_write(&self) -> StoreResult<()> {
        if self.access.can_write() {
            Ok(())
        } else {
            Err(StoreError::AccessDenied(self.path.to_string()))
        }
    }

    fn read<T>(&self, f: impl FnOnce(&Node) -> T) -> StoreResult<T> {
        self.store
            .with_node(&self.path, f)
            .ok_or_else(|| StoreError::NotFound(self.path.to_string()))
    }

    fn remove_child(&self, name: &str, recursive: bool) -> StoreResult<()> {
        self.require_write()?;
        let child_path = self.path.join(name);
        self.store.with_node_mut(&self.path, |node| {
            let folded = fold(name);
            let child = node
                .children
                .get(&folded)
                .ok_or_else(|| StoreError::NotFound(child_path.to_string()))?;

            if recursive {
                child.subtree_block(&child_path.to_string())?;
            } else {
                child.lock.check_delete(&child_path.to_string())?;
                if !child.children.is_empty() {
                    return Err(StoreError::HasChildren(child_path.to_string()));
                }
            }

            node.children.remove(&folded);
            Ok(())
        })
    }
}

impl KeyHandle for MemoryHandle<'_> {
    fn path(&self) -> &KeyPath {
        &self.path
    }

    fn subkey_names(&self) -> StoreResult<Vec<String>> {
        self.read(|node| node.children.values().map(|c| c.name.clone()).collect())
    }

    fn values(&self) -> StoreResult<Vec<Value>> {
        self.read(|node| node.values.clone())
    }

    fn value(&self, name: &str) -> Option<ValueData> {
        self.store.value_of(&self.path, name)
    }

    fn subkey_count(&self) -> StoreResult<usize> {
        self.read(|node| node.children.len())
    }

    fn value_count(&self) -> StoreResult<usize> {
        self.read(|node| node.values.len())
    }

    fn set_value(&self, name: &str, data: &ValueData) -> StoreResult<()> {
        self.require_write()?;
        let path = self.path.to_string();
        self.store.with_node_mut(&self.path, |node| {
            if node.lock.blocks_write() {
                return Err(StoreError::AccessDenied(path));
            }
            node.put_value(name, data.clone());
            Ok(())
        })
    }

    fn delete_value(&self, name: &str) -> StoreResult<()> {
        self.require_write()?;
        let path = self.path.to_string();
        self.store.with_node_mut(&self.path, |node| {
            node.lock.check_delete(&path)?;
            let idx = node
                .value_index(name)
                .ok_or_else(|| StoreError::NotFound(format!("{} [{}]", path, name)))?;
            node.values.remove(idx);
            Ok(())
        })
    }

    fn delete_subkey(&self, name: &str) -> StoreResult<()> {
        self.remove_child(name, false)
    }

    fn delete_subkey_tree(&self, name: &str) -> StoreResult<()> {
        self.remove_child(name, true)
    }
}
