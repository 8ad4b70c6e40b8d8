// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! File system watching for rebuilds.
//!
//! This module provides `FileWatcher` for monitoring app sources.
//!
//! # Features
//!
//! - Debounced file change events (300ms)
//! - Filters for source file types (.css, .svg, .js, .json)
//! - Ignores build output directories
//! - Recursive directory watching

use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{new_debouncer, DebounceEventResult, Debouncer, RecommendedCache};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Extensions that trigger a rebuild.
pub const WATCHED_EXTENSIONS: &[&str] = &["css", "svg", "js", "json"];

/// Watches an app directory for source changes.
pub struct FileWatcher {
    _debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
}

/// Whether a change to `path` should trigger a rebuild.
pub fn is_source_change(path: &Path, ignored: &[PathBuf]) -> bool {
    let watched = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| WATCHED_EXTENSIONS.contains(&ext));
    watched && !ignored.iter().any(|dir| path.starts_with(dir))
}

impl FileWatcher {
    /// Creates a watcher for `path`.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory path to watch recursively
    /// * `ignored` - Directories whose changes are never reported
    /// * `on_change` - Callback invoked with the changed source paths
    pub fn new<F>(path: &Path, ignored: Vec<PathBuf>, on_change: F) -> anyhow::Result<Self>
    where
        F: Fn(Vec<PathBuf>) + Send + 'static,
    {
        let mut debouncer = new_debouncer(
            Duration::from_millis(300),
            None,
            move |result: DebounceEventResult| match result {
                Ok(events) => {
                    let mut changed: Vec<PathBuf> = events
                        .iter()
                        .flat_map(|e| e.paths.iter())
                        .filter(|p| is_source_change(p, &ignored))
                        .cloned()
                        .collect();
                    changed.sort();
                    changed.dedup();

                    if !changed.is_empty() {
                        on_change(changed);
                    }
                }
                Err(errors) => {
                    for error in errors {
                        tracing::warn!("watch error: {}", error);
                    }
                }
            },
        )?;

        debouncer.watch(path, RecursiveMode::Recursive)?;

        Ok(Self {
            _debouncer: debouncer,
        })
    }
}
