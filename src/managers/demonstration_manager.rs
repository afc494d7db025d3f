// DemonstrationManager: Focused manager for demonstration capture
//
// Single Responsibility: the session's DemonstrationSet and its persistence

use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::demonstration::{ActionLabel, DemonstrationRecord, DemonstrationSet, ACTION_COUNT};
use crate::encoding::FeatureVector;
use crate::error::{log_model_error, ModelError};

/// Owns the demonstrations captured during one session
///
/// The set only grows by append, is replaced wholesale on import and is
/// emptied by `clear`.
pub struct DemonstrationManager {
    set: RwLock<DemonstrationSet>,
}

impl DemonstrationManager {
    pub fn new() -> Self {
        Self {
            set: RwLock::new(DemonstrationSet::new()),
        }
    }

    /// Append one demonstration, returning the new set size.
    pub fn record(&self, features: FeatureVector, action: ActionLabel) -> Result<usize, ModelError> {
        let mut set = self.write_set()?;
        set.push(DemonstrationRecord::new(features, action));
        log::debug!("[DemonstrationManager] Recorded {} ({} total)", action, set.len());
        Ok(set.len())
    }

    pub fn clear(&self) -> Result<(), ModelError> {
        self.write_set()?.clear();
        log::info!("[DemonstrationManager] Demonstrations cleared");
        Ok(())
    }

    /// Replace the whole set
    pub fn replace(&self, demonstrations: DemonstrationSet) -> Result<(), ModelError> {
        *self.write_set()? = demonstrations;
        Ok(())
    }

    /// Independent copy of the current set
    pub fn snapshot(&self) -> Result<DemonstrationSet, ModelError> {
        Ok(self.read_set()?.clone())
    }

    pub fn len(&self) -> Result<usize, ModelError> {
        Ok(self.read_set()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, ModelError> {
        Ok(self.read_set()?.is_empty())
    }

    pub fn counts_by_action(&self) -> Result<[usize; ACTION_COUNT], ModelError> {
        Ok(self.read_set()?.counts_by_action())
    }

    pub fn export_json(&self) -> Result<String, ModelError> {
        self.read_set()?.to_json()
    }

    /// Replace the set with one parsed from interchange JSON.
    ///
    /// Nothing changes when parsing fails.
    pub fn import_json(&self, json: &str) -> Result<usize, ModelError> {
        let imported = DemonstrationSet::from_json(json).inspect_err(|err| {
            log_model_error(err, "import_demonstrations");
        })?;
        let len = imported.len();
        self.replace(imported)?;
        log::info!("[DemonstrationManager] Imported {} demonstrations", len);
        Ok(len)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ModelError> {
        self.read_set()?.save(path)
    }

    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<usize, ModelError> {
        let loaded = DemonstrationSet::load(&path).inspect_err(|err| {
            log_model_error(err, "load_demonstrations");
        })?;
        let len = loaded.len();
        self.replace(loaded)?;
        log::info!(
            "[DemonstrationManager] Loaded {} demonstrations from {}",
            len,
            path.as_ref().display()
        );
        Ok(len)
    }

    // ========================================================================
    // HELPER METHODS - Lock management
    // ========================================================================

    fn read_set(&self) -> Result<RwLockReadGuard<'_, DemonstrationSet>, ModelError> {
        self.set.read().map_err(|_| ModelError::StatePoisoned)
    }

    fn write_set(&self) -> Result<RwLockWriteGuard<'_, DemonstrationSet>, ModelError> {
        self.set.write().map_err(|_| ModelError::StatePoisoned)
    }
}

impl Default for DemonstrationManager {
    fn default() -> Self {
        Self::new()
    }
}
