//! Escalated deletion for keys and values the OS refuses to remove.
//!
//! Used only in force mode and only after a normal delete has failed.
//! Nothing here consults the protected-path guard; callers must have done
//! so already.

use crate::error::{StoreError, StoreResult};
use crate::hive::{Access, KeyPath, KeyStore, RootKey, ValueData};

/// Key whose values the OS runs once at next logon.
pub const RUN_ONCE: &str = "SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\RunOnce";

const SCHEDULED_VALUE_PREFIX: &str = "RegSweeper_Delete_";

/// Per-step results of a force delete.
///
/// Ownership and ACL changes are best effort and reported on their own;
/// the attempt as a whole succeeds only when the final delete does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForceAttempt {
    pub ownership_taken: bool,
    pub access_granted: bool,
    pub result: StoreResult<()>,
}

impl ForceAttempt {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

/// Force and reboot-time deletion over a key store.
pub struct ForceDeleter<'a> {
    store: &'a dyn KeyStore,
}

impl<'a> ForceDeleter<'a> {
    pub fn new(store: &'a dyn KeyStore) -> Self {
        Self { store }
    }

    /// Take ownership of `path` and grant full control. Returns which of
    /// the two steps succeeded.
    fn unlock(&self, path: &KeyPath) -> (bool, bool) {
        let Some(acl) = self.store.access_control() else {
            return (false, false);
        };

        let owned = match acl.take_ownership(path.root, &path.subkey) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("take ownership of {} failed: {}", path, e);
                false
            }
        };
        let granted = match acl.grant_full_control(path.root, &path.subkey) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("grant full control on {} failed: {}", path, e);
                false
            }
        };
        (owned, granted)
    }

    /// Unlock the key, then delete one of its values.
    pub fn force_delete_value(&self, path: &KeyPath, name: &str) -> ForceAttempt {
        let (ownership_taken, access_granted) = self.unlock(path);
        let result = self
            .store
            .open_path(path, Access::Write)
            .and_then(|handle| handle.delete_value(name));

        ForceAttempt {
            ownership_taken,
            access_granted,
            result,
        }
    }

    /// Unlock the key and every key below it, deleting from the leaves up.
    pub fn force_delete_key(&self, path: &KeyPath) -> ForceAttempt {
        let (ownership_taken, access_granted) = self.unlock(path);
        let result = self.delete_bottom_up(path);

        ForceAttempt {
            ownership_taken,
            access_granted,
            result,
        }
    }

    fn delete_bottom_up(&self, path: &KeyPath) -> StoreResult<()> {
        // Breadth-first listing: every parent precedes its children.
        let mut order = vec![path.clone()];
        let mut next = 0;
        while next < order.len() {
            let current = order[next].clone();
            if next > 0 {
                self.unlock(&current);
            }
            if let Ok(handle) = self.store.open_path(&current, Access::Read) {
                for name in handle.subkey_names().unwrap_or_default() {
                    order.push(current.join(&name));
                }
            }
            next += 1;
        }

        for key in order.iter().rev() {
            self.delete_single(key)?;
        }
        Ok(())
    }

    fn delete_single(&self, key: &KeyPath) -> StoreResult<()> {
        let (parent, leaf) = key
            .split_leaf()
            .ok_or_else(|| StoreError::InvalidPath(key.to_string()))?;
        self.store
            .open(key.root, parent, Access::Write)?
            .delete_subkey(leaf)
    }

    /// Register a `reg delete` command to run at next startup. Returns the
    /// name of the `RunOnce` value written.
    pub fn schedule_delete_on_reboot(&self, path: &KeyPath, value_name: Option<&str>) -> StoreResult<String> {
        let command = reg_delete_command(path, value_name)?;
        let name = scheduled_value_name(path, value_name);

        let handle = self.store.create(RootKey::LocalMachine, RUN_ONCE)?;
        handle.set_value(&name, &ValueData::String(command))?;

        tracing::info!("Scheduled {} for deletion at next startup", path);
        Ok(name)
    }
}

fn reg_root(root: RootKey) -> StoreResult<&'static str> {
    match root {
        RootKey::LocalMachine | RootKey::CurrentUser | RootKey::ClassesRoot => Ok(root.short_name()),
        other => Err(StoreError::Unsupported(format!(
            "reboot-time deletion under {}",
            other
        ))),
    }
}

/// `reg delete "HKLM\path" [/v "name" | /ve] /f`
fn reg_delete_command(path: &KeyPath, value_name: Option<&str>) -> StoreResult<String> {
    let root = reg_root(path.root)?;
    let target = if path.subkey.is_empty() {
        root.to_string()
    } else {
        format!("{}\\{}", root, path.subkey)
    };

    let value = match value_name {
        Some("") => " /ve".to_string(),
        Some(name) => format!(" /v \"{}\"", name),
        None => String::new(),
    };
    Ok(format!("reg delete \"{}\"{} /f", target, value))
}

/// Stable per-target name, so scheduling the same target twice overwrites.
fn scheduled_value_name(path: &KeyPath, value_name: Option<&str>) -> String {
    let mut target = path.to_string().to_uppercase();
    if let Some(name) = value_name {
        target.push('\n');
        target.push_str(&name.to_uppercase());
    }
    format!("{}{:08x}", SCHEDULED_VALUE_PREFIX, fnv1a(target.as_bytes()))
}

fn fnv1a(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0x811c_9dc5, |hash, &b| (hash ^ u32::from(b)).wrapping_mul(0x0100_0193))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hive::{KeyLock, MemoryStore};

    fn key(full: &str) -> KeyPath {
        KeyPath::parse(full).unwrap()
    }

    #[test]
    fn test_force_delete_value_unlocks_denied_key() {
        let store = MemoryStore::new();
        let path = key(r"HKCU\Software\Locked");
        store.put_value(&path, "Stale", ValueData::DWord(1));
        store.set_lock(&path, KeyLock::Denied);

        let attempt = ForceDeleter::new(&store).force_delete_value(&path, "Stale");

        assert!(attempt.ownership_taken);
        assert!(attempt.access_granted);
        assert!(attempt.succeeded());
        assert_eq!(store.value_of(&path, "Stale"), None);
    }

    #[test]
    fn test_force_delete_value_on_system_key_fails() {
        let store = MemoryStore::new();
        let path = key(r"HKCU\Software\Sys");
        store.put_value(&path, "Stale", ValueData::DWord(1));
        store.set_lock(&path, KeyLock::System);

        let attempt = ForceDeleter::new(&store).force_delete_value(&path, "Stale");

        assert!(!attempt.ownership_taken);
        assert!(!attempt.access_granted);
        assert!(matches!(attempt.result, Err(StoreError::AccessDenied(_))));
        assert!(store.value_of(&path, "Stale").is_some());
    }

    #[test]
    fn test_force_delete_key_removes_locked_descendants() {
        let store = MemoryStore::new();
        let app = key(r"HKCU\Software\Vendor\App");
        let deep = app.join(r"A\B");
        store.put_value(&deep, "x", ValueData::DWord(1));
        store.put_key(&app.join("C"));
        store.set_lock(&app, KeyLock::Denied);
        store.set_lock(&app.join("A"), KeyLock::Denied);

        let attempt = ForceDeleter::new(&store).force_delete_key(&app);

        assert!(attempt.succeeded(), "{:?}", attempt.result);
        assert!(!store.contains_key(&app));
        assert!(store.contains_key(&key(r"HKCU\Software\Vendor")));
    }

    #[test]
    fn test_force_delete_key_stops_at_pinned_child() {
        let store = MemoryStore::new();
        let app = key(r"HKCU\Software\Vendor\App");
        store.put_key(&app.join("Busy"));
        store.set_lock(&app.join("Busy"), KeyLock::Pinned);

        let attempt = ForceDeleter::new(&store).force_delete_key(&app);

        assert!(matches!(attempt.result, Err(StoreError::InUse(_))));
        assert!(store.contains_key(&app));
    }

    #[test]
    fn test_schedule_writes_run_once_command() {
        let store = MemoryStore::new();
        let deleter = ForceDeleter::new(&store);
        let path = key(r"HKCU\Software\Vendor\App");

        let name = deleter.schedule_delete_on_reboot(&path, None).unwrap();

        assert!(name.starts_with("RegSweeper_Delete_"));
        let run_once = KeyPath::new(RootKey::LocalMachine, RUN_ONCE);
        assert_eq!(
            store.value_of(&run_once, &name),
            Some(ValueData::String(r#"reg delete "HKCU\Software\Vendor\App" /f"#.into()))
        );
    }

    #[test]
    fn test_schedule_value_delete_adds_value_switch() {
        let store = MemoryStore::new();
        let deleter = ForceDeleter::new(&store);
        let path = key(r"HKLM\SOFTWARE\Vendor");

        let named = deleter.schedule_delete_on_reboot(&path, Some("Stale")).unwrap();
        let default = deleter.schedule_delete_on_reboot(&path, Some("")).unwrap();

        assert_ne!(named, default);
        let run_once = KeyPath::new(RootKey::LocalMachine, RUN_ONCE);
        assert_eq!(
            store.value_of(&run_once, &named).unwrap().as_string(),
            r#"reg delete "HKLM\SOFTWARE\Vendor" /v "Stale" /f"#
        );
        assert_eq!(
            store.value_of(&run_once, &default).unwrap().as_string(),
            r#"reg delete "HKLM\SOFTWARE\Vendor" /ve /f"#
        );
    }

    #[test]
    fn test_schedule_name_is_stable_and_case_insensitive() {
        let a = scheduled_value_name(&key(r"HKCU\Software\App"), None);
        let b = scheduled_value_name(&key(r"hkcu\SOFTWARE\app"), None);
        assert_eq!(a, b);
        assert_ne!(a, scheduled_value_name(&key(r"HKCU\Software\Other"), None));
    }

    #[test]
    fn test_schedule_unsupported_root() {
        let store = MemoryStore::new();
        let err = ForceDeleter::new(&store)
            .schedule_delete_on_reboot(&key(r"HKU\S-1-5-21\Software"), None)
            .unwrap_err();

        assert!(matches!(err, StoreError::Unsupported(_)));
    }
}
