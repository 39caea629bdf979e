//! Serializable copies of key subtrees, used by hive files and backups.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::StoreResult;
use crate::hive::key::KeyPath;
use crate::hive::store::{Access, KeyStore};
use crate::hive::value::Value;

/// A key with its values and subkeys, detached from any store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySnapshot {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subkeys: Vec<KeySnapshot>,
}

impl KeySnapshot {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.values.push(value);
        self
    }

    pub fn with_subkey(mut self, subkey: KeySnapshot) -> Self {
        self.subkeys.push(subkey);
        self
    }

    /// Total keys in this subtree, including itself.
    pub fn key_count(&self) -> usize {
        let mut count = 0;
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            count += 1;
            pending.extend(node.subkeys.iter());
        }
        count
    }
}

/// Read one key's values and child names.
fn read_key(store: &dyn KeyStore, path: &KeyPath) -> StoreResult<(KeySnapshot, Vec<String>)> {
    let handle = store.open_path(path, Access::Read)?;
    let mut snapshot = KeySnapshot::new(path.leaf());
    snapshot.values = handle.values()?;
    Ok((snapshot, handle.subkey_names()?))
}

/// Copy the subtree rooted at `path` out of `store`.
///
/// The key itself must be readable. Descendants that vanish or deny access
/// mid-walk are left out with a warning.
pub fn capture(store: &dyn KeyStore, path: &KeyPath) -> StoreResult<KeySnapshot> {
    let (root, names) = read_key(store, path)?;

    // (parent index, snapshot), breadth-first: parents precede children
    let mut nodes: Vec<(usize, KeySnapshot)> = vec![(0, root)];
    let mut pending: VecDeque<(usize, KeyPath)> = names.iter().map(|name| (0, path.join(name))).collect();

    while let Some((parent, key)) = pending.pop_front() {
        match read_key(store, &key) {
            Ok((snapshot, names)) => {
                let index = nodes.len();
                pending.extend(names.iter().map(|name| (index, key.join(name))));
                nodes.push((parent, snapshot));
            }
            Err(e) => tracing::warn!("Leaving {} out of snapshot: {}", key, e),
        }
    }

    for index in (1..nodes.len()).rev() {
        let (parent, snapshot) = std::mem::take(&mut nodes[index]);
        nodes[parent].1.subkeys.insert(0, snapshot);
    }

    Ok(std::mem::take(&mut nodes[0].1))
}

/// Write `snapshot` back at `path`, creating keys as needed.
///
/// Existing values with the same names are overwritten; nothing is removed.
pub fn restore(store: &dyn KeyStore, path: &KeyPath, snapshot: &KeySnapshot) -> StoreResult<usize> {
    let mut pending = vec![(path.clone(), snapshot)];
    let mut written = 0;

    while let Some((key, node)) = pending.pop() {
        let handle = store.create(key.root, &key.subkey)?;
        for value in &node.values {
            handle.set_value(&value.name, &value.data)?;
        }
        written += 1;
        pending.extend(node.subkeys.iter().rev().map(|child| (key.join(&child.name), child)));
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaner::detectors::fixture::ObservedStore;
    use crate::hive::{MemoryStore, ValueData};

    fn key(full: &str) -> KeyPath {
        KeyPath::parse(full).unwrap()
    }

    fn sample() -> MemoryStore {
        let store = MemoryStore::new();
        store.put_value(&key(r"HKCU\Software\Acme"), "Version", ValueData::DWord(2));
        store.put_value(&key(r"HKCU\Software\Acme\Alpha\Deep"), "Path", ValueData::String("C:\\a".into()));
        store.put_key(&key(r"HKCU\Software\Acme\Beta"));
        store
    }

    #[test]
    fn capture_keeps_child_order_and_values() {
        let store = sample();

        let snapshot = capture(&store, &key(r"HKCU\Software\Acme")).unwrap();

        assert_eq!(snapshot.name, "Acme");
        assert_eq!(snapshot.values.len(), 1);
        let names: Vec<&str> = snapshot.subkeys.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["Alpha", "Beta"]);
        assert_eq!(snapshot.subkeys[0].subkeys[0].name, "Deep");
        assert_eq!(snapshot.subkeys[0].subkeys[0].values[0].name, "Path");
        assert_eq!(snapshot.key_count(), 4);
    }

    #[test]
    fn capture_of_missing_key_fails() {
        let store = sample();

        assert!(capture(&store, &key(r"HKCU\Software\Gone")).is_err());
    }

    #[test]
    fn unreadable_descendant_is_left_out() {
        let store = sample();
        let observed = ObservedStore::new(&store).unlistable(r"HKCU\Software\Acme\Alpha");

        let snapshot = capture(&observed, &key(r"HKCU\Software\Acme")).unwrap();

        let names: Vec<&str> = snapshot.subkeys.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["Beta"]);
        assert_eq!(snapshot.key_count(), 2);
    }

    #[test]
    fn restore_recreates_deleted_subtree() {
        let store = sample();
        let acme = key(r"HKCU\Software\Acme");
        let snapshot = capture(&store, &acme).unwrap();
        store
            .open(acme.root, "Software", Access::Write)
            .unwrap()
            .delete_subkey_tree("Acme")
            .unwrap();

        let written = restore(&store, &acme, &snapshot).unwrap();

        assert_eq!(written, 4);
        assert_eq!(
            store.value_of(&key(r"HKCU\Software\Acme\Alpha\Deep"), "Path"),
            Some(ValueData::String("C:\\a".into()))
        );
        assert!(store.contains_key(&key(r"HKCU\Software\Acme\Beta")));
        assert_eq!(capture(&store, &acme).unwrap(), snapshot);
    }

    #[test]
    fn deep_chain_is_captured() {
        let store = MemoryStore::new();
        let mut path = String::from("Software");
        for depth in 0..200 {
            path.push_str(&format!("\\L{}", depth));
        }
        store.put_value(&key(&format!("HKCU\\{}", path)), "Leaf", ValueData::DWord(1));
        let root = key(r"HKCU\Software\L0");

        let snapshot = capture(&store, &root).unwrap();

        assert_eq!(snapshot.key_count(), 200);
    }
}
