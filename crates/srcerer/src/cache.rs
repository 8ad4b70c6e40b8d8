// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Modification tracking for incremental builds.
//!
//! The [`ModificationCache`] remembers the last observed modification time of
//! every resource it was asked about and answers one question: did this
//! resource change since the previous check?
//!
//! # Semantics
//!
//! - A resource never seen before is changed.
//! - A resource is changed iff its current mtime is strictly greater than the
//!   cached one.
//! - Every check stores the current observation, changed or not, so a second
//!   check right after a first one reports unchanged.
//! - [`ModificationCache::clear`] forgets everything, which turns the next
//!   pass into a full rebuild.
//!
//! # Custom Stores
//!
//! Implement [`ModificationStore`] to keep entries elsewhere. Implementations
//! must make the read-compare-write of one key atomic.

use crate::error::{Result, SrcererError};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

/// Storage backend for modification timestamps.
pub trait ModificationStore: Send + Sync + std::fmt::Debug {
    /// Stores `modified_at` under `key` and returns the previous value.
    ///
    /// The read of the previous value and the write of the new one must be
    /// atomic with respect to other calls for the same key.
    fn swap(&self, key: &str, modified_at: u64) -> Result<Option<u64>>;
    /// Removes every entry.
    fn clear(&self) -> Result<()>;
    /// Number of tracked resources.
    fn len(&self) -> usize;
    /// Whether nothing is tracked.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory store guarded by a single mutex.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, u64>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ModificationStore for MemoryStore {
    fn swap(&self, key: &str, modified_at: u64) -> Result<Option<u64>> {
        let mut entries = self.entries.lock().map_err(|_| {
            SrcererError::Cache("Failed to acquire modification cache lock".to_string())
        })?;
        Ok(entries.insert(key.to_string(), modified_at))
    }

    fn clear(&self) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| {
            SrcererError::Cache("Failed to acquire modification cache lock".to_string())
        })?;
        entries.clear();
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }
}

/// Result of a modification check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Modification {
    /// True when the resource is new or newer than the cached observation.
    pub changed: bool,
    /// Current modification time in milliseconds since the Unix epoch.
    pub modified_at: u64,
}

/// Shared modification cache.
///
/// Cloning is cheap; clones share the same store.
#[derive(Debug, Clone)]
pub struct ModificationCache {
    store: Arc<dyn ModificationStore>,
}

impl ModificationCache {
    /// Creates a cache backed by a [`MemoryStore`].
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new())
    }

    /// Creates a cache backed by a custom store.
    pub fn with_store<S: ModificationStore + 'static>(store: S) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    /// Checks whether the file at `path` changed since the previous check.
    ///
    /// # Errors
    ///
    /// Returns [`SrcererError::NotFound`] when the file cannot be stat'ed.
    pub async fn is_modified(&self, path: &Path) -> Result<Modification> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| SrcererError::from_io(path, e))?;
        let modified = metadata.modified().map_err(SrcererError::Io)?;
        self.observe(path, system_time_millis(modified))
    }

    /// Records an observation of `path` at `modified_at` and reports whether
    /// it counts as a change.
    pub fn observe(&self, path: &Path, modified_at: u64) -> Result<Modification> {
        let key = cache_key(path);
        let previous = self.store.swap(&key, modified_at)?;
        let changed = previous.map_or(true, |seen| modified_at > seen);
        Ok(Modification {
            changed,
            modified_at,
        })
    }

    /// Forgets every observation.
    pub fn clear(&self) -> Result<()> {
        tracing::debug!(entries = self.store.len(), "clearing modification cache");
        self.store.clear()
    }

    /// Number of tracked resources.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Whether nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

impl Default for ModificationCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache key for a resource path: SHA-256 of the path, hex encoded.
pub fn cache_key(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Milliseconds since the Unix epoch, saturating at zero for earlier times.
pub fn system_time_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn touch(path: &Path, offset_secs: u64) {
        let file = fs::OpenOptions::new().write(true).open(path).unwrap();
        file.set_modified(UNIX_EPOCH + Duration::from_secs(1_700_000_000 + offset_secs))
            .unwrap();
    }

    #[test]
    fn first_observation_is_a_change() {
        let cache = ModificationCache::new();
        let m = cache.observe(Path::new("a.css"), 10).unwrap();
        assert!(m.changed);
        assert_eq!(m.modified_at, 10);
    }

    #[test]
    fn only_strictly_newer_counts() {
        let cache = ModificationCache::new();
        let path = Path::new("a.css");
        cache.observe(path, 10).unwrap();
        assert!(!cache.observe(path, 10).unwrap().changed);
        assert!(!cache.observe(path, 9).unwrap().changed);
        // 9 was stored, so 10 is newer again
        assert!(cache.observe(path, 10).unwrap().changed);
    }

    #[test]
    fn keys_are_per_path() {
        let cache = ModificationCache::new();
        cache.observe(Path::new("a.css"), 10).unwrap();
        assert!(cache.observe(Path::new("b.css"), 10).unwrap().changed);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn clear_forces_changes() {
        let cache = ModificationCache::new();
        let path = Path::new("a.css");
        cache.observe(path, 10).unwrap();
        cache.clear().unwrap();
        assert!(cache.is_empty());
        assert!(cache.observe(path, 10).unwrap().changed);
    }

    #[test]
    fn cache_key_is_stable_hex() {
        let a = cache_key(Path::new("blob/main/main.js"));
        let b = cache_key(Path::new("blob/main/main.js"));
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, cache_key(Path::new("blob/main/main.css")));
    }

    #[tokio::test]
    async fn is_modified_reads_file_mtime() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("main.js");
        fs::write(&path, "this.model = 1;").unwrap();
        touch(&path, 0);

        let cache = ModificationCache::new();
        assert!(cache.is_modified(&path).await.unwrap().changed);
        assert!(!cache.is_modified(&path).await.unwrap().changed);

        touch(&path, 5);
        let m = cache.is_modified(&path).await.unwrap();
        assert!(m.changed);
        assert_eq!(m.modified_at, (1_700_000_005u64) * 1000);
    }

    #[tokio::test]
    async fn is_modified_propagates_not_found() {
        let dir = TempDir::new().unwrap();
        let cache = ModificationCache::new();
        let err = cache
            .is_modified(&dir.path().join("missing.svg"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(cache.is_empty());
    }
}
