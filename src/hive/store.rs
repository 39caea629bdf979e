//! Key store contract shared by the in-memory and live backends.

use crate::error::StoreResult;
use crate::hive::key::{KeyPath, RootKey};
use crate::hive::value::{Value, ValueData};

/// Desired access when opening a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    /// Set and delete values, delete subkeys.
    Write,
    Full,
}

impl Access {
    pub fn can_write(self) -> bool {
        !matches!(self, Access::Read)
    }
}

/// Hierarchical, case-insensitive key/value store.
///
/// "Not found" and "access denied" are ordinary `Err` values; callers
/// scanning the store treat them as a branch to skip.
pub trait KeyStore: Send + Sync {
    /// Open an existing key. An empty `path` opens the root itself.
    fn open(&self, root: RootKey, path: &str, access: Access) -> StoreResult<Box<dyn KeyHandle + '_>>;

    /// Open a key, creating it and any missing parents.
    fn create(&self, root: RootKey, path: &str) -> StoreResult<Box<dyn KeyHandle + '_>>;

    /// Ownership and ACL manipulation, when the backend supports it.
    fn access_control(&self) -> Option<&dyn AccessControl> {
        None
    }

    fn open_path(&self, path: &KeyPath, access: Access) -> StoreResult<Box<dyn KeyHandle + '_>> {
        self.open(path.root, &path.subkey, access)
    }

    fn key_exists(&self, root: RootKey, path: &str) -> bool {
        self.open(root, path, Access::Read).is_ok()
    }

    /// Read a single value, `None` when the key or value is absent.
    fn read_value(&self, root: RootKey, path: &str, name: &str) -> Option<ValueData> {
        self.open(root, path, Access::Read).ok()?.value(name)
    }
}

/// An open key. Handles are short-lived and never stored in issues.
pub trait KeyHandle {
    fn path(&self) -> &KeyPath;

    fn subkey_names(&self) -> StoreResult<Vec<String>>;

    fn values(&self) -> StoreResult<Vec<Value>>;

    /// Look up a value by name; the empty name is the default value.
    fn value(&self, name: &str) -> Option<ValueData>;

    fn subkey_count(&self) -> StoreResult<usize> {
        self.subkey_names().map(|names| names.len())
    }

    fn value_count(&self) -> StoreResult<usize> {
        self.values().map(|values| values.len())
    }

    fn set_value(&self, name: &str, data: &ValueData) -> StoreResult<()>;

    fn delete_value(&self, name: &str) -> StoreResult<()>;

    /// Delete a direct child key. Fails with `HasChildren` when it has subkeys.
    fn delete_subkey(&self, name: &str) -> StoreResult<()>;

    /// Delete a direct child key and everything below it.
    fn delete_subkey_tree(&self, name: &str) -> StoreResult<()>;
}

/// Privileged operations used only by force mode.
pub trait AccessControl: Send + Sync {
    /// Make the administrators group the owner of the key.
    fn take_ownership(&self, root: RootKey, path: &str) -> StoreResult<()>;

    /// Give the administrators group full control over the key.
    fn grant_full_control(&self, root: RootKey, path: &str) -> StoreResult<()>;
}
