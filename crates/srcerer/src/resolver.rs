// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Blob descriptor resolution.
//!
//! A *blob* is one component's source directory. For a blob called `main`
//! under the root `blob/`, the resolver looks for:
//!
//! - `blob/main/main.css` (style)
//! - `blob/main/main.svg` (sprite)
//! - `blob/main/main.js` (behavior)
//!
//! Each file is optional. All three are checked against the
//! [`ModificationCache`] concurrently, and the blob is kept for compilation
//! when at least one of them changed (or when a rebuild is forced).
//!
//! Descriptors are rebuilt on every pass; only the cache entries survive.

use crate::cache::ModificationCache;
use crate::error::AssetKind;
use crate::manifest::Manifest;
use crate::task::Join;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Extension of a blob's style source.
pub const STYLE_EXTENSION: &str = "css";
/// Extension of a blob's sprite source.
pub const SPRITE_EXTENSION: &str = "svg";
/// Extension of a blob's behavior source.
pub const BEHAVIOR_EXTENSION: &str = "js";

/// One present source file of a blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path of the file.
    pub path: PathBuf,
    /// Whether the file changed since the previous pass.
    pub changed: bool,
    /// Modification time in milliseconds since the Unix epoch.
    pub modified_at: u64,
}

/// A component source directory and its three optional sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobDescriptor {
    /// Directory name, unique within an application.
    pub name: String,
    /// Source directory.
    pub dir: PathBuf,
    /// Style source, when present.
    pub style: Option<SourceFile>,
    /// Sprite source, when present.
    pub sprite: Option<SourceFile>,
    /// Behavior source, when present.
    pub behavior: Option<SourceFile>,
}

impl BlobDescriptor {
    /// Source file of the given kind.
    pub fn source(&self, kind: AssetKind) -> Option<&SourceFile> {
        match kind {
            AssetKind::Style => self.style.as_ref(),
            AssetKind::Sprite => self.sprite.as_ref(),
            AssetKind::Script => self.behavior.as_ref(),
        }
    }

    /// Whether any present source changed.
    pub fn any_changed(&self) -> bool {
        [&self.style, &self.sprite, &self.behavior]
            .iter()
            .any(|s| s.as_ref().is_some_and(|f| f.changed))
    }

    /// Path of the source of `kind`, whether or not it exists.
    pub fn source_path(dir: &Path, name: &str, kind: AssetKind) -> PathBuf {
        let extension = match kind {
            AssetKind::Style => STYLE_EXTENSION,
            AssetKind::Sprite => SPRITE_EXTENSION,
            AssetKind::Script => BEHAVIOR_EXTENSION,
        };
        dir.join(format!("{}.{}", name, extension))
    }
}

/// Enumerates blobs and decides which ones need compiling.
#[derive(Debug, Clone)]
pub struct BlobResolver {
    cache: ModificationCache,
}

impl BlobResolver {
    /// Creates a resolver backed by `cache`.
    pub fn new(cache: ModificationCache) -> Self {
        Self { cache }
    }

    /// Lists `(name, directory)` for every candidate blob of the manifest.
    ///
    /// Roots with an explicit module list yield exactly those modules. Other
    /// roots yield every subdirectory, sorted by name. Missing roots are
    /// logged and skipped.
    pub async fn candidates(&self, app_root: &Path, manifest: &Manifest) -> Vec<(String, PathBuf)> {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();

        for root in &manifest.blob {
            let root_dir = app_root.join(&root.path);
            let names = match &root.modules {
                Some(modules) => modules.clone(),
                None => match list_subdirectories(&root_dir).await {
                    Ok(names) => names,
                    Err(e) => {
                        tracing::warn!(
                            app = %manifest.name,
                            root = %root_dir.display(),
                            "blob root unreadable: {}",
                            e
                        );
                        continue;
                    }
                },
            };

            for name in names {
                if !seen.insert(name.clone()) {
                    tracing::warn!(app = %manifest.name, blob = %name, "duplicate blob name, keeping the first");
                    continue;
                }
                let dir = root_dir.join(&name);
                candidates.push((name, dir));
            }
        }

        candidates
    }

    /// Builds the descriptor of one blob, checking its three sources
    /// concurrently.
    pub async fn describe(&self, name: String, dir: PathBuf) -> BlobDescriptor {
        let mut checks: Join<'_, Option<SourceFile>> = Join::new();
        for kind in [AssetKind::Style, AssetKind::Sprite, AssetKind::Script] {
            let path = BlobDescriptor::source_path(&dir, &name, kind);
            checks.push(self.check(path));
        }

        let mut results = checks.run().await.into_iter();
        let style = results.next().flatten();
        let sprite = results.next().flatten();
        let behavior = results.next().flatten();

        BlobDescriptor {
            name,
            dir,
            style,
            sprite,
            behavior,
        }
    }

    /// Returns the descriptors that need compiling in this pass.
    pub async fn resolve(&self, app_root: &Path, manifest: &Manifest, force: bool) -> Vec<BlobDescriptor> {
        let candidates = self.candidates(app_root, manifest).await;

        let mut join: Join<'_, BlobDescriptor> = Join::new();
        for (name, dir) in candidates {
            join.push(self.describe(name, dir));
        }

        join.then(|descriptors| {
            descriptors
                .into_iter()
                .filter(|d| force || d.any_changed())
                .collect()
        })
        .await
    }

    async fn check(&self, path: PathBuf) -> Option<SourceFile> {
        match self.cache.is_modified(&path).await {
            Ok(modification) => Some(SourceFile {
                path,
                changed: modification.changed,
                modified_at: modification.modified_at,
            }),
            Err(e) if e.is_not_found() => None,
            Err(e) => {
                tracing::warn!(path = %path.display(), "cannot check source: {}", e);
                None
            }
        }
    }
}

async fn list_subdirectories(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_blob(root: &Path, name: &str, files: &[&str]) {
        let dir = root.join("blob").join(name);
        fs::create_dir_all(&dir).unwrap();
        for ext in files {
            fs::write(dir.join(format!("{}.{}", name, ext)), "/* src */").unwrap();
        }
    }

    fn manifest(blob: &str) -> Manifest {
        Manifest::from_json(&format!(
            r#"{{ "name": "t", "static": "static", "blob": [{}] }}"#,
            blob
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn lists_every_subdirectory_sorted() {
        let dir = TempDir::new().unwrap();
        write_blob(dir.path(), "world", &["js"]);
        write_blob(dir.path(), "main", &["js"]);
        fs::write(dir.path().join("blob/README"), "not a blob").unwrap();

        let resolver = BlobResolver::new(ModificationCache::new());
        let names: Vec<String> = resolver
            .candidates(dir.path(), &manifest(r#"{ "path": "blob" }"#))
            .await
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        assert_eq!(names, vec!["main", "world"]);
    }

    #[tokio::test]
    async fn explicit_selection_wins() {
        let dir = TempDir::new().unwrap();
        write_blob(dir.path(), "main", &["js"]);
        write_blob(dir.path(), "world", &["js"]);

        let resolver = BlobResolver::new(ModificationCache::new());
        let candidates = resolver
            .candidates(dir.path(), &manifest(r#"{ "path": "blob", "modules": ["world"] }"#))
            .await;
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].0, "world");
    }

    #[tokio::test]
    async fn describes_present_sources_only() {
        let dir = TempDir::new().unwrap();
        write_blob(dir.path(), "main", &["css", "js"]);

        let resolver = BlobResolver::new(ModificationCache::new());
        let d = resolver
            .describe("main".to_string(), dir.path().join("blob/main"))
            .await;
        assert!(d.style.as_ref().unwrap().changed);
        assert!(d.sprite.is_none());
        assert!(d.behavior.is_some());
        assert!(d.any_changed());
    }

    #[tokio::test]
    async fn unchanged_blobs_are_dropped_unless_forced() {
        let dir = TempDir::new().unwrap();
        write_blob(dir.path(), "main", &["js"]);
        let m = manifest(r#"{ "path": "blob" }"#);

        let resolver = BlobResolver::new(ModificationCache::new());
        assert_eq!(resolver.resolve(dir.path(), &m, false).await.len(), 1);
        assert!(resolver.resolve(dir.path(), &m, false).await.is_empty());

        let forced = resolver.resolve(dir.path(), &m, true).await;
        assert_eq!(forced.len(), 1);
        assert!(!forced[0].any_changed());
    }

    #[tokio::test]
    async fn missing_root_yields_nothing() {
        let dir = TempDir::new().unwrap();
        let resolver = BlobResolver::new(ModificationCache::new());
        let found = resolver
            .resolve(dir.path(), &manifest(r#"{ "path": "nowhere" }"#), true)
            .await;
        assert!(found.is_empty());
    }
}
