//! Access to the hierarchical key/value store.

mod key;
mod memory;
mod paths;
mod snapshot;
mod store;
mod value;
#[cfg(windows)]
mod windows;

pub use key::{normalize, KeyPath, RootKey};
pub use memory::{HiveFile, KeyLock, LockEntry, MemoryStore};
pub use paths::{is_bare_name, unquote, PathResolver};
pub use snapshot::{capture, restore, KeySnapshot};
pub use store::{Access, AccessControl, KeyHandle, KeyStore};
pub use value::{store_value_name, Value, ValueData, DEFAULT_VALUE_LABEL};
#[cfg(windows)]
pub use windows::{enable_force_privileges, WindowsRegistry};
