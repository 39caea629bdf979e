//! Detector registry with per-detector enabled flags.

use crate::cleaner::detectors::all_detectors;
use crate::cleaner::Detector;
use crate::error::{Result, SweeperError};
use std::collections::HashSet;

struct Entry {
    detector: Box<dyn Detector>,
    enabled: bool,
}

/// Ordered list of detectors, each of which can be switched off.
///
/// Registration order is scan order. Filtering by id backs the
/// `--only`/`--skip` options and the `disabled_detectors` setting.
pub struct DetectorRegistry {
    entries: Vec<Entry>,
}

impl std::fmt::Debug for DetectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|e| (e.detector.id(), e.enabled)))
            .finish()
    }
}

impl DetectorRegistry {
    /// Create a registry with all built-in detectors enabled.
    pub fn new() -> Self {
        Self::from_detectors(all_detectors())
    }

    /// Create a registry over an explicit detector list, all enabled.
    pub fn from_detectors(detectors: Vec<Box<dyn Detector>>) -> Self {
        Self {
            entries: detectors
                .into_iter()
                .map(|detector| Entry {
                    detector,
                    enabled: true,
                })
                .collect(),
        }
    }

    /// Create a registry with only the specified detector ids.
    ///
    /// # Example
    /// ```
    /// use reg_sweeper::cleaner::DetectorRegistry;
    ///
    /// let registry = DetectorRegistry::with_types(&["startup", "shared-dlls"]);
    /// assert_eq!(registry.len(), 2);
    /// ```
    pub fn with_types(types: &[&str]) -> Self {
        let type_set: HashSet<&str> = types.iter().copied().collect();
        Self::from_detectors(
            all_detectors()
                .into_iter()
                .filter(|d| type_set.contains(d.id()))
                .collect(),
        )
    }

    /// Create a registry excluding the specified detector ids.
    pub fn without_types(types: &[&str]) -> Self {
        let type_set: HashSet<&str> = types.iter().copied().collect();
        Self::from_detectors(
            all_detectors()
                .into_iter()
                .filter(|d| !type_set.contains(d.id()))
                .collect(),
        )
    }

    /// Switch a detector on or off.
    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> Result<()> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.detector.id() == id)
            .ok_or_else(|| SweeperError::UnknownDetector(id.to_string()))?;
        entry.enabled = enabled;
        Ok(())
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.enabled && e.detector.id() == id)
    }

    /// Enabled detectors, in registration order.
    pub fn enabled(&self) -> impl Iterator<Item = &dyn Detector> {
        self.entries
            .iter()
            .filter(|e| e.enabled)
            .map(|e| e.detector.as_ref())
    }

    /// All registered detectors with their enabled flag.
    pub fn iter(&self) -> impl Iterator<Item = (&dyn Detector, bool)> {
        self.entries.iter().map(|e| (e.detector.as_ref(), e.enabled))
    }

    /// Get a detector by id.
    pub fn get(&self, id: &str) -> Option<&dyn Detector> {
        self.entries
            .iter()
            .find(|e| e.detector.id() == id)
            .map(|e| e.detector.as_ref())
    }

    /// List all registered detector ids.
    pub fn ids(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.detector.id()).collect()
    }

    /// Number of registered detectors, enabled or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for DetectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Ids of every built-in detector.
pub fn known_detector_ids() -> Vec<&'static str> {
    all_detectors().iter().map(|d| d.id()).collect()
}
