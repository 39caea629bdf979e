//! Built-in registry detectors.

mod activex;
mod app_paths;
mod browser_history;
mod context_menu;
mod empty_keys;
mod file_extensions;
mod firewall;
mod fonts;
mod help_files;
mod image_execution;
mod mru;
mod mui_cache;
mod services;
mod shared_dlls;
mod software_paths;
mod sounds;
mod start_menu;
mod startup;
mod uninstall;

pub use activex::ActiveXDetector;
pub use app_paths::AppPathsDetector;
pub use browser_history::BrowserHistoryDetector;
pub use context_menu::ContextMenuDetector;
pub use empty_keys::EmptyKeysDetector;
pub use file_extensions::FileExtensionDetector;
pub use firewall::FirewallDetector;
pub use fonts::FontDetector;
pub use help_files::HelpFileDetector;
pub use image_execution::ImageExecutionDetector;
pub use mru::MruDetector;
pub use mui_cache::MuiCacheDetector;
pub use services::ServiceDetector;
pub use shared_dlls::SharedDllDetector;
pub use software_paths::SoftwarePathDetector;
pub use sounds::SoundEventDetector;
pub use start_menu::StartMenuDetector;
pub use startup::StartupDetector;
pub use uninstall::UninstallDetector;

use crate::cleaner::Detector;

/// Returns all built-in detectors in scan order.
pub fn all_detectors() -> Vec<Box<dyn Detector>> {
    vec![
        Box::new(UninstallDetector),
        Box::new(FileExtensionDetector),
        Box::new(MruDetector),
        Box::new(StartupDetector),
        Box::new(SharedDllDetector),
        Box::new(AppPathsDetector),
        Box::new(ActiveXDetector),
        Box::new(ContextMenuDetector),
        Box::new(EmptyKeysDetector),
        Box::new(FirewallDetector),
        Box::new(FontDetector),
        Box::new(HelpFileDetector),
        Box::new(ImageExecutionDetector),
        Box::new(ServiceDetector),
        Box::new(SoundEventDetector),
        Box::new(SoftwarePathDetector),
        Box::new(StartMenuDetector),
        Box::new(BrowserHistoryDetector),
        Box::new(MuiCacheDetector),
    ]
}

#[cfg(test)]
pub(crate) mod fixture {
    //! Hermetic scan environment: an in-memory hive plus a temp directory
    //! standing in for the file system, with `SystemRoot` pointing into it.

    use std::fs;
    use std::path::PathBuf;
    use std::sync::Mutex;

    use tempfile::TempDir;

    use crate::cleaner::{Detector, Issue, ScanContext, ScanReporter};
    use crate::error::{StoreError, StoreResult};
    use crate::guard::ProtectedPathGuard;
    use crate::hive::{Access, KeyHandle, KeyPath, KeyStore, MemoryStore, PathResolver, RootKey, Value, ValueData};

    pub struct Fixture {
        pub store: MemoryStore,
        pub paths: PathResolver,
        pub guard: ProtectedPathGuard,
        pub dir: TempDir,
    }

    impl Fixture {
        pub fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let windows = dir.path().join("Windows");
            fs::create_dir_all(windows.join("System32")).unwrap();
            let paths = PathResolver::with_vars([
                ("SystemRoot", windows.display().to_string()),
                ("TESTROOT", dir.path().display().to_string()),
            ]);
            Self {
                store: MemoryStore::new(),
                paths,
                guard: ProtectedPathGuard::new(),
                dir,
            }
        }

        pub fn key(full: &str) -> KeyPath {
            KeyPath::parse(full).unwrap()
        }

        pub fn put(&self, full: &str, name: &str, data: ValueData) {
            self.store.put_value(&Self::key(full), name, data);
        }

        pub fn put_str(&self, full: &str, name: &str, text: &str) {
            self.put(full, name, ValueData::String(text.to_string()));
        }

        pub fn put_key(&self, full: &str) {
            self.store.put_key(&Self::key(full));
        }

        /// Create a file under the temp root and return its path.
        pub fn existing_file(&self, relative: &str) -> String {
            let path = self.dir.path().join(relative);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(&path, "").unwrap();
            path.display().to_string()
        }

        pub fn existing_dir(&self, relative: &str) -> String {
            let path = self.dir.path().join(relative);
            fs::create_dir_all(&path).unwrap();
            path.display().to_string()
        }

        /// A path under the temp root that does not exist.
        pub fn missing_file(&self, relative: &str) -> String {
            let path: PathBuf = self.dir.path().join("missing").join(relative);
            path.display().to_string()
        }

        pub fn windows_dir(&self) -> PathBuf {
            self.dir.path().join("Windows")
        }

        pub fn scan(&self, detector: &dyn Detector) -> Vec<Issue> {
            let ctx = ScanContext::new(&self.store, &self.paths, &self.guard);
            detector.scan(&ctx, &ScanReporter::silent())
        }

        /// Scan through `store` (usually an [`ObservedStore`] over this
        /// fixture's hive), collecting every progress report.
        pub fn scan_through(&self, store: &dyn KeyStore, detector: &dyn Detector) -> (Vec<Issue>, Vec<String>) {
            let reported = Mutex::new(Vec::new());
            let callback = |key: &str, _: usize| reported.lock().unwrap().push(key.to_string());
            let ctx = ScanContext::new(store, &self.paths, &self.guard);
            let issues = detector.scan(&ctx, &ScanReporter::new(&callback));
            (issues, reported.into_inner().unwrap())
        }
    }

    /// Wraps a `MemoryStore`, recording every key opened and failing
    /// subkey enumeration on chosen keys.
    pub struct ObservedStore<'a> {
        inner: &'a MemoryStore,
        unlistable: Vec<KeyPath>,
        opened: Mutex<Vec<KeyPath>>,
    }

    impl<'a> ObservedStore<'a> {
        pub fn new(inner: &'a MemoryStore) -> Self {
            Self {
                inner,
                unlistable: Vec::new(),
                opened: Mutex::new(Vec::new()),
            }
        }

        /// Make `subkey_names` fail with `AccessDenied` on `full`.
        pub fn unlistable(mut self, full: &str) -> Self {
            self.unlistable.push(Fixture::key(full));
            self
        }

        pub fn opened(&self) -> Vec<KeyPath> {
            self.opened.lock().unwrap().clone()
        }

        fn is_unlistable(&self, path: &KeyPath) -> bool {
            self.unlistable
                .iter()
                .any(|p| p.root == path.root && p.subkey.eq_ignore_ascii_case(&path.subkey))
        }
    }

    impl KeyStore for ObservedStore<'_> {
        fn open(&self, root: RootKey, path: &str, access: Access) -> StoreResult<Box<dyn KeyHandle + '_>> {
            let key = KeyPath::new(root, path);
            self.opened.lock().unwrap().push(key.clone());
            let unlistable = self.is_unlistable(&key);
            let inner = self.inner.open(root, path, access)?;
            Ok(Box::new(ObservedHandle { inner, unlistable }))
        }

        fn create(&self, root: RootKey, path: &str) -> StoreResult<Box<dyn KeyHandle + '_>> {
            self.inner.create(root, path)
        }
    }

    struct ObservedHandle<'a> {
        inner: Box<dyn KeyHandle + 'a>,
        unlistable: bool,
    }

    impl KeyHandle for ObservedHandle<'_> {
        fn path(&self) -> &KeyPath {
            self.inner.path()
        }

        fn subkey_names(&self) -> StoreResult<Vec<String>> {
            if self.unlistable {
                return Err(StoreError::AccessDenied(self.inner.path().to_string()));
            }
            self.inner.subkey_names()
        }

        fn values(&self) -> StoreResult<Vec<Value>> {
            self.inner.values()
        }

        fn value(&self, name: &str) -> Option<ValueData> {
            self.inner.value(name)
        }

        fn set_value(&self, name: &str, data: &ValueData) -> StoreResult<()> {
            self.inner.set_value(name, data)
        }

        fn delete_value(&self, name: &str) -> StoreResult<()> {
            self.inner.delete_value(name)
        }

        fn delete_subkey(&self, name: &str) -> StoreResult<()> {
            self.inner.delete_subkey(name)
        }

        fn delete_subkey_tree(&self, name: &str) -> StoreResult<()> {
            self.inner.delete_subkey_tree(name)
        }
    }
}
