//! Persistence for the last merged rate snapshot.

use crate::conversion::rates::RateSnapshot;
use crate::error::{PriceScanError, PriceScanResult};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Storage for the most recent successful snapshot.
pub trait RateStore: Send + Sync {
    /// Returns `Ok(None)` when nothing has been stored yet.
    fn load(&self) -> PriceScanResult<Option<RateSnapshot>>;

    fn save(&self, snapshot: &RateSnapshot) -> PriceScanResult<()>;
}

/// Keeps the snapshot as a JSON document on disk.
#[derive(Debug, Clone)]
pub struct JsonFileRateStore {
    path: PathBuf,
}

impl JsonFileRateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persistence_error(&self, reason: impl ToString) -> PriceScanError {
        PriceScanError::Persistence {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

impl RateStore for JsonFileRateStore {
    fn load(&self) -> PriceScanResult<Option<RateSnapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path).map_err(|source| PriceScanError::Io {
            path: self.path.clone(),
            source,
        })?;
        let snapshot = serde_json::from_str(&raw).map_err(|e| self.persistence_error(e))?;
        debug!(path = %self.path.display(), "Loaded persisted rates");
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &RateSnapshot) -> PriceScanResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| PriceScanError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let json = serde_json::to_string_pretty(snapshot).map_err(|e| self.persistence_error(e))?;

        // Write beside the target and rename so readers never see a torn file.
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, json).map_err(|source| PriceScanError::Io {
            path: staging.clone(),
            source,
        })?;
        fs::rename(&staging, &self.path).map_err(|source| PriceScanError::Io {
            path: self.path.clone(),
            source,
        })?;

        debug!(path = %self.path.display(), "Persisted rates");
        Ok(())
    }
}

/// In-process store, used when no path is configured.
#[derive(Debug, Default)]
pub struct MemoryRateStore {
    snapshot: Mutex<Option<RateSnapshot>>,
}

impl MemoryRateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: RateSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
        }
    }
}

impl RateStore for MemoryRateStore {
    fn load(&self) -> PriceScanResult<Option<RateSnapshot>> {
        Ok(self
            .snapshot
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default())
    }

    fn save(&self, snapshot: &RateSnapshot) -> PriceScanResult<()> {
        let mut guard = self.snapshot.lock().map_err(|_| PriceScanError::Persistence {
            path: PathBuf::from("<memory>"),
            reason: "store lock poisoned".to_string(),
        })?;
        *guard = Some(snapshot.clone());
        Ok(())
    }
}
