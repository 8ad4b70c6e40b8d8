// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Where the runtime fetches artifacts from.

use crate::artifact::ARTIFACT_EXTENSION;
use crate::error::{Result, SrcererError};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Fetches artifact text by component name.
pub trait ArtifactSource: Send + Sync {
    /// URL written into the injected script node.
    fn url(&self, name: &str) -> String {
        format!("bin/{}.{}", name, ARTIFACT_EXTENSION)
    }

    /// Fetches the artifact of `name`.
    fn fetch<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<String>>;
}

/// Reads artifacts from a build output directory.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    bin_dir: PathBuf,
}

impl DirectorySource {
    /// Reads `<bin_dir>/<name>.js`.
    pub fn new(bin_dir: impl Into<PathBuf>) -> Self {
        Self {
            bin_dir: bin_dir.into(),
        }
    }
}

impl ArtifactSource for DirectorySource {
    fn fetch<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<String>> {
        async move {
            let path = self.bin_dir.join(format!("{}.{}", name, ARTIFACT_EXTENSION));
            tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| SrcererError::from_io(path, e))
        }
        .boxed()
    }
}

#[derive(Default)]
struct MemoryEntries {
    artifacts: HashMap<String, String>,
    delays: HashMap<String, Duration>,
    fetches: HashMap<String, usize>,
}

/// In-memory artifacts, with optional per-name latency. Counts fetches.
#[derive(Default)]
pub struct MemorySource {
    entries: Mutex<MemoryEntries>,
}

impl std::fmt::Debug for MemorySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("MemorySource")
            .field("artifacts", &entries.artifacts.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl MemorySource {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an artifact.
    pub fn insert(&self, name: impl Into<String>, artifact: impl Into<String>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .artifacts
            .insert(name.into(), artifact.into());
    }

    /// Delays every fetch of `name`.
    pub fn delay(&self, name: impl Into<String>, delay: Duration) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .delays
            .insert(name.into(), delay);
    }

    /// How often `name` was fetched.
    pub fn fetches(&self, name: &str) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .fetches
            .get(name)
            .copied()
            .unwrap_or(0)
    }
}

impl ArtifactSource for MemorySource {
    fn fetch<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<String>> {
        async move {
            let (artifact, delay) = {
                let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
                *entries.fetches.entry(name.to_string()).or_default() += 1;
                (
                    entries.artifacts.get(name).cloned(),
                    entries.delays.get(name).copied(),
                )
            };
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            artifact.ok_or_else(|| SrcererError::NotFound {
                path: PathBuf::from(self.url(name)),
            })
        }
        .boxed()
    }
}

/// Fetches artifacts from a running server.
#[cfg(feature = "http-source")]
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    base: String,
}

#[cfg(feature = "http-source")]
impl HttpSource {
    /// Fetches `<base>/bin/<name>.js`, where `base` is the application URL,
    /// e.g. `http://localhost:3000/hello`.
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base: base.into().trim_end_matches('/').to_string(),
        }
    }
}

#[cfg(feature = "http-source")]
impl ArtifactSource for HttpSource {
    fn fetch<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<String>> {
        async move {
            let url = format!("{}/{}", self.base, self.url(name));
            let response = self
                .client
                .get(&url)
                .header("X-Requested-With", "XMLHttpRequest")
                .send()
                .await
                .map_err(|e| SrcererError::Registration(format!("fetch {}: {}", url, e)))?;

            if response.status() == reqwest::StatusCode::NOT_FOUND {
                return Err(SrcererError::NotFound {
                    path: PathBuf::from(url),
                });
            }
            let response = response
                .error_for_status()
                .map_err(|e| SrcererError::Registration(format!("fetch {}: {}", url, e)))?;
            response
                .text()
                .await
                .map_err(|e| SrcererError::Registration(format!("fetch {}: {}", url, e)))
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn directory_source_reads_artifacts() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("main.js"), "({\nname:\"main\"\n})").unwrap();

        let source = DirectorySource::new(dir.path());
        assert!(source.fetch("main").await.unwrap().contains("main"));
        assert!(source.fetch("gone").await.unwrap_err().is_not_found());
        assert_eq!(source.url("main"), "bin/main.js");
    }

    #[tokio::test]
    async fn memory_source_counts_fetches() {
        let source = MemorySource::new();
        source.insert("a", "({\nname:\"a\"\n})");
        source.fetch("a").await.unwrap();
        source.fetch("a").await.unwrap();
        assert!(source.fetch("b").await.is_err());
        assert_eq!(source.fetches("a"), 2);
        assert_eq!(source.fetches("b"), 1);
    }
}
