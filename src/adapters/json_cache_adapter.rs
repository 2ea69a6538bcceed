//! On-disk bar cache: one JSON file per cache key.
//!
//! Writes go to a `.tmp` sibling and are renamed into place. Entries that
//! fail to parse or are out of order are treated as misses and moved aside
//! with a `.corrupt` extension. An entry recorded under a different key is
//! a miss and is left for the next store to overwrite.

use crate::domain::bar::{Bar, BarSeries};
use crate::domain::error::TradesimError;
use crate::ports::cache_port::{CacheKey, CachePort};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    key: String,
    bars: Vec<Bar>,
}

pub struct JsonCacheAdapter {
    cache_dir: PathBuf,
}

impl JsonCacheAdapter {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.cache_dir.join(format!("{key}.json"))
    }

    fn read_entry(path: &Path) -> Result<(String, BarSeries), String> {
        let content = fs::read_to_string(path).map_err(|e| e.to_string())?;
        let entry: CacheEntry = serde_json::from_str(&content).map_err(|e| e.to_string())?;
        let series = BarSeries::new(entry.bars).map_err(|e| e.to_string())?;
        Ok((entry.key, series))
    }

    fn quarantine(path: &Path) {
        let target = path.with_extension("json.corrupt");
        if let Err(e) = fs::rename(path, &target) {
            warn!(path = %path.display(), error = %e, "failed to quarantine cache entry");
        }
    }
}

impl CachePort for JsonCacheAdapter {
    fn load(&self, key: &CacheKey) -> Option<BarSeries> {
        let path = self.entry_path(key);
        match fs::metadata(&path) {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cache entry unreadable");
                return None;
            }
        }

        match Self::read_entry(&path) {
            Ok((stored, _)) if stored != key.to_string() => {
                warn!(path = %path.display(), %stored, expected = %key, "cache entry key mismatch");
                None
            }
            Ok((_, series)) => {
                debug!(path = %path.display(), bars = series.len(), "cache entry loaded");
                Some(series)
            }
            Err(reason) => {
                warn!(path = %path.display(), %reason, "corrupt cache entry, ignoring");
                Self::quarantine(&path);
                None
            }
        }
    }

    fn store(&self, key: &CacheKey, series: &BarSeries) -> Result<(), TradesimError> {
        fs::create_dir_all(&self.cache_dir).map_err(|e| TradesimError::Cache {
            reason: format!("failed to create {}: {e}", self.cache_dir.display()),
        })?;

        let entry = CacheEntry {
            key: key.to_string(),
            bars: series.bars().to_vec(),
        };
        let json = serde_json::to_string(&entry).map_err(|e| TradesimError::Cache {
            reason: format!("serialization failed: {e}"),
        })?;

        let path = self.entry_path(key);
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, json).map_err(|e| TradesimError::Cache {
            reason: format!("failed to write {}: {e}", tmp_path.display()),
        })?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            TradesimError::Cache {
                reason: format!("atomic rename failed: {e}"),
            }
        })?;
        debug!(path = %path.display(), bars = series.len(), "cache entry stored");
        Ok(())
    }
}
