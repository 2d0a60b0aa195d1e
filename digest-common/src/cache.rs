use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::warn;

/// A row stored in a fingerprint cache file: the caller's payload plus the
/// provenance fields every cache needs (spec §3, §4.9).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CacheRow {
    pub version: String,
    pub cached_at: DateTime<Utc>,
    pub data: Value,
}

/// Filesystem-backed map from fingerprint to `CacheRow`, one JSON object per file.
/// Reads return no-match when the file is absent or unparsable; writes are
/// best-effort (a failed write warns but never fails the pipeline).
pub struct FingerprintCache {
    path: PathBuf,
    rows: HashMap<String, CacheRow>,
}

impl FingerprintCache {
    /// Load `{data_dir}/{file_name}`. A missing or corrupt file yields an empty cache.
    pub fn load(data_dir: &Path, file_name: &str) -> Self {
        let path = data_dir.join(file_name);
        let rows = std::fs::read_to_string(&path)
            .ok()
            .and_then(|s| serde_json::from_str::<HashMap<String, CacheRow>>(&s).ok())
            .unwrap_or_default();
        Self { path, rows }
    }

    /// Return the cached value for `key` if present and its `version` matches.
    pub fn get<T: DeserializeOwned>(&self, key: &str, version: &str) -> Option<T> {
        let row = self.rows.get(key)?;
        if row.version != version {
            return None;
        }
        serde_json::from_value(row.data.clone()).ok()
    }

    pub fn put<T: Serialize>(&mut self, key: String, version: &str, value: &T) {
        let data = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, key, "failed to serialize cache row, skipping write");
                return;
            }
        };
        self.rows.insert(
            key,
            CacheRow {
                version: version.to_string(),
                cached_at: Utc::now(),
                data,
            },
        );
    }

    /// Persist the full map back to disk via a temp-file-and-rename, matching the
    /// digest artifact's atomic-write contract (spec §4.9, §7: cache I/O errors warn-only).
    pub fn save(&self) {
        if let Some(parent) = self.path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!(error = %e, path = %parent.display(), "failed to create cache directory");
                return;
            }
        }

        let body = match serde_json::to_string_pretty(&self.rows) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "failed to serialize cache file");
                return;
            }
        };

        let tmp_path = self.path.with_extension("json.tmp");
        if let Err(e) = std::fs::write(&tmp_path, body) {
            warn!(error = %e, path = %tmp_path.display(), "failed to write cache temp file");
            return;
        }
        if let Err(e) = std::fs::rename(&tmp_path, &self.path) {
            warn!(error = %e, path = %self.path.display(), "failed to rename cache temp file into place");
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Serialize, serde::Deserialize, PartialEq)]
    struct Sample {
        n: u32,
    }

    #[test]
    fn missing_file_yields_empty_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FingerprintCache::load(dir.path(), "does_not_exist.json");
        assert!(cache.is_empty());
    }

    #[test]
    fn round_trip_through_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = FingerprintCache::load(dir.path(), "rerank_cache.json");
        cache.put("key-1".to_string(), "v1", &Sample { n: 7 });
        cache.save();

        let reloaded = FingerprintCache::load(dir.path(), "rerank_cache.json");
        let value: Sample = reloaded.get("key-1", "v1").unwrap();
        assert_eq!(value, Sample { n: 7 });
    }

    #[test]
    fn version_mismatch_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = FingerprintCache::load(dir.path(), "x.json");
        cache.put("key-1".to_string(), "v1", &Sample { n: 1 });
        let miss: Option<Sample> = cache.get("key-1", "v2");
        assert!(miss.is_none());
    }
}
