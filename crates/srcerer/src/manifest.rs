// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Application manifests (`app.json`).
//!
//! A manifest declares where an application's component sources live, where
//! its build output goes and what its bootstrap document contains.
//!
//! # Example
//!
//! ```json
//! {
//!   "name": "hello",
//!   "version": "1.0.0",
//!   "server": "*",
//!   "stylePaths": ["style"],
//!   "blob": [{ "path": "blob" }],
//!   "static": "static",
//!   "meta": [{ "charset": "utf-8" }],
//!   "ext": ["https://cdn.example.com/polyfill.js"]
//! }
//! ```
//!
//! Every path is relative to the application root. Absolute paths and paths
//! that climb out of the root are rejected with a configuration error.

use crate::cache::ModificationCache;
use crate::error::{Result, SrcererError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

/// File name of an application manifest.
pub const MANIFEST_FILE: &str = "app.json";

/// Parsed application manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Application name, used in the title and generation comment.
    pub name: String,
    /// Application version.
    #[serde(default = "default_version")]
    pub version: String,
    /// Which servers may mount this application.
    #[serde(default)]
    pub server: Option<ServerFilter>,
    /// Import search paths handed to the style transform.
    #[serde(default)]
    pub style_paths: Vec<String>,
    /// Component source roots.
    #[serde(default)]
    pub blob: Vec<BlobRoot>,
    /// Static output root.
    #[serde(rename = "static")]
    pub static_root: String,
    /// Artifact directory inside the static root.
    #[serde(default = "default_bin")]
    pub bin: String,
    /// Bootstrap document file name inside the static root.
    #[serde(default = "default_index")]
    pub index: String,
    /// URL of the component runtime bootstrap script.
    #[serde(default = "default_bootstrap")]
    pub bootstrap: String,
    /// `<meta>` tags, one attribute map each.
    #[serde(default)]
    pub meta: Vec<BTreeMap<String, String>>,
    /// Extra head tags.
    #[serde(default)]
    pub head: Vec<HeadTag>,
    /// Global style sources, inlined into the bootstrap document.
    #[serde(default)]
    pub style: Vec<String>,
    /// External script URLs.
    #[serde(default)]
    pub ext: Vec<String>,
    /// Inline script libraries.
    #[serde(default)]
    pub lib: Vec<LibBundle>,
    /// Web worker scripts, compiled to `<static>/worker/<id>.js`.
    #[serde(default)]
    pub worker: Vec<WorkerScript>,
    /// Attributes of the `<body>` element.
    #[serde(default)]
    pub body: Vec<Attribute>,
    /// Attributes of the `<html>` element.
    #[serde(default)]
    pub html: Vec<Attribute>,
    /// Extra location the bootstrap document is copied to.
    #[serde(default)]
    pub deploy_file: Option<String>,
}

fn default_version() -> String {
    "0.0.0".to_string()
}

fn default_bin() -> String {
    "bin".to_string()
}

fn default_index() -> String {
    "index.html".to_string()
}

fn default_bootstrap() -> String {
    "srcerer.js".to_string()
}

/// Server allow-list of a manifest: `"*"`, a single server name or a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerFilter {
    /// `"*"` or one server name.
    One(String),
    /// Several server names.
    Many(Vec<String>),
}

impl ServerFilter {
    /// Whether the server called `name` may mount the application.
    pub fn allows(&self, name: &str) -> bool {
        match self {
            ServerFilter::One(one) => one == "*" || one == name,
            ServerFilter::Many(many) => many.iter().any(|n| n == "*" || n == name),
        }
    }
}

/// One component source root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobRoot {
    /// Directory holding one subdirectory per component.
    pub path: String,
    /// Explicit component selection; every subdirectory when absent.
    #[serde(default)]
    pub modules: Option<Vec<String>>,
}

/// Extra head tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadTag {
    /// Tag name.
    pub tag: String,
    /// Text content; the tag is self-closing when absent.
    #[serde(default)]
    pub content: Option<String>,
    /// Attributes.
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
}

/// Inline script library: files under one directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibBundle {
    /// Directory of the files.
    pub path: String,
    /// File names, inlined in order.
    #[serde(default)]
    pub files: Vec<String>,
}

/// Web worker source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerScript {
    /// Output name (`worker/<id>.js`).
    pub id: String,
    /// Source file.
    pub path: String,
}

/// Element attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Attribute name.
    pub name: String,
    /// Attribute value.
    pub value: String,
}

impl Manifest {
    /// Parses a manifest from JSON text and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`SrcererError::Config`] when a required field is missing,
    /// the JSON is malformed or a path is not relative.
    pub fn from_json(source: &str) -> Result<Self> {
        let manifest: Manifest = serde_json::from_str(source)
            .map_err(|e| SrcererError::Config(format!("invalid manifest: {}", e)))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Reads and parses the manifest at `path`.
    pub async fn load(path: &Path) -> Result<Self> {
        let source = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SrcererError::from_io(path, e))?;
        Self::from_json(&source).map_err(|e| match e {
            SrcererError::Config(message) => {
                SrcererError::Config(format!("{}: {}", path.display(), message))
            }
            other => other,
        })
    }

    /// Checks the invariants the pipeline relies on.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(SrcererError::Config("manifest name is empty".to_string()));
        }
        if self.bin.is_empty() || self.index.is_empty() {
            return Err(SrcererError::Config(
                "manifest bin and index must not be empty".to_string(),
            ));
        }

        let mut paths: Vec<(&str, &str)> = vec![
            ("static", self.static_root.as_str()),
            ("bin", self.bin.as_str()),
            ("index", self.index.as_str()),
        ];
        paths.extend(self.style_paths.iter().map(|p| ("stylePaths", p.as_str())));
        paths.extend(self.blob.iter().map(|b| ("blob", b.path.as_str())));
        paths.extend(self.style.iter().map(|p| ("style", p.as_str())));
        paths.extend(self.lib.iter().map(|l| ("lib", l.path.as_str())));
        paths.extend(self.worker.iter().map(|w| ("worker", w.path.as_str())));
        if let Some(deploy) = &self.deploy_file {
            paths.push(("deployFile", deploy.as_str()));
        }

        for (field, path) in paths {
            check_relative(field, path)?;
        }

        for root in &self.blob {
            for module in root.modules.iter().flatten() {
                if module.is_empty() || module.contains(['/', '\\']) || module == ".." {
                    return Err(SrcererError::Config(format!(
                        "blob module name '{}' must be a plain directory name",
                        module
                    )));
                }
            }
        }

        for worker in &self.worker {
            if worker.id.is_empty() || worker.id.contains(['/', '\\']) {
                return Err(SrcererError::Config(format!(
                    "worker id '{}' must be a plain file name",
                    worker.id
                )));
            }
        }

        Ok(())
    }

    /// Static output root under `app_root`.
    pub fn static_dir(&self, app_root: &Path) -> PathBuf {
        app_root.join(&self.static_root)
    }

    /// Artifact directory under `app_root`.
    pub fn bin_dir(&self, app_root: &Path) -> PathBuf {
        self.static_dir(app_root).join(&self.bin)
    }

    /// Bootstrap document path under `app_root`.
    pub fn index_path(&self, app_root: &Path) -> PathBuf {
        self.static_dir(app_root).join(&self.index)
    }

    /// Style search paths resolved against `app_root`.
    pub fn style_search_paths(&self, app_root: &Path) -> Vec<PathBuf> {
        self.style_paths.iter().map(|p| app_root.join(p)).collect()
    }

    /// Whether the server called `name` may mount this application.
    pub fn mountable_on(&self, name: &str) -> bool {
        self.server.as_ref().is_some_and(|s| s.allows(name))
    }
}

fn check_relative(field: &str, path: &str) -> Result<()> {
    let p = Path::new(path);
    let escapes = p
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
    if p.is_absolute() || escapes {
        return Err(SrcererError::Config(format!(
            "{} path '{}' must be relative to the application root",
            field, path
        )));
    }
    Ok(())
}

/// A manifest together with whether it was (re)read on this call.
#[derive(Debug, Clone)]
pub struct LoadedManifest {
    /// The parsed manifest.
    pub manifest: Arc<Manifest>,
    /// True when the file was read because it is new or changed.
    pub changed: bool,
}

/// Keeps parsed manifests and re-reads them only when they change on disk.
#[derive(Debug)]
pub struct ManifestStore {
    cache: ModificationCache,
    loaded: Mutex<HashMap<PathBuf, Arc<Manifest>>>,
}

impl ManifestStore {
    /// Creates a store that uses `cache` for change detection.
    pub fn new(cache: ModificationCache) -> Self {
        Self {
            cache,
            loaded: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the manifest at `path`, parsing it if it changed.
    ///
    /// # Errors
    ///
    /// [`SrcererError::NotFound`] when the file is missing and
    /// [`SrcererError::Config`] when it does not parse.
    pub async fn load(&self, path: &Path) -> Result<LoadedManifest> {
        let modification = self.cache.is_modified(path).await?;

        if !modification.changed {
            if let Some(manifest) = self.cached(path)? {
                return Ok(LoadedManifest {
                    manifest,
                    changed: false,
                });
            }
        }

        match Manifest::load(path).await {
            Ok(manifest) => {
                let manifest = Arc::new(manifest);
                self.lock()?.insert(path.to_path_buf(), manifest.clone());
                tracing::debug!(path = %path.display(), "manifest loaded");
                Ok(LoadedManifest {
                    manifest,
                    changed: true,
                })
            }
            Err(err) => {
                self.lock()?.remove(path);
                Err(err)
            }
        }
    }

    fn cached(&self, path: &Path) -> Result<Option<Arc<Manifest>>> {
        Ok(self.lock()?.get(path).cloned())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<PathBuf, Arc<Manifest>>>> {
        self.loaded
            .lock()
            .map_err(|_| SrcererError::Cache("Failed to acquire manifest store lock".to_string()))
    }
}
