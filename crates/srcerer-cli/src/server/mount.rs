// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! App discovery.
//!
//! Apps are found as `<apps_root>/<mount>/app.json`. The directory name is
//! the mount point; an app is mounted only when its manifest's `server`
//! field is `"*"` or names this server.

use console::style;
use srcerer::{Manifest, MANIFEST_FILE};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// One mounted app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPoint {
    /// URL segment the app is served under.
    pub name: String,
    /// App root directory.
    pub root: PathBuf,
    /// Manifest version.
    pub version: String,
}

/// Mounted apps by mount point.
#[derive(Debug, Clone, Default)]
pub struct Mounts {
    apps: BTreeMap<String, MountPoint>,
}

impl Mounts {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a mount.
    pub fn insert(&mut self, mount: MountPoint) {
        self.apps.insert(mount.name.clone(), mount);
    }

    /// Root directory of the app mounted at `name`.
    pub fn get(&self, name: &str) -> Option<&Path> {
        self.apps.get(name).map(|m| m.root.as_path())
    }

    /// Every mount, ordered by name.
    pub fn iter(&self) -> impl Iterator<Item = &MountPoint> {
        self.apps.values()
    }

    /// Number of mounted apps.
    pub fn len(&self) -> usize {
        self.apps.len()
    }

    /// Whether nothing is mounted.
    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }
}

/// Discovers the apps under `apps_dir` that may be mounted on `server_name`.
///
/// Unreadable or invalid manifests are reported and skipped.
pub fn discover(apps_dir: &Path, server_name: &str) -> anyhow::Result<Mounts> {
    let pattern = apps_dir.join("*").join(MANIFEST_FILE);
    let pattern = pattern.to_string_lossy();

    let mut mounts = Mounts::new();
    for entry in glob::glob(&pattern)? {
        let manifest_path = match entry {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!("Skipping unreadable path: {}", e);
                continue;
            }
        };
        let Some(root) = manifest_path.parent() else { continue };
        let Some(name) = root.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        let manifest = match std::fs::read_to_string(&manifest_path)
            .map_err(anyhow::Error::from)
            .and_then(|s| Manifest::from_json(&s).map_err(anyhow::Error::from))
        {
            Ok(manifest) => manifest,
            Err(e) => {
                println!(
                    "{} app {} ({})",
                    style("!").red(),
                    name,
                    style(e).dim()
                );
                continue;
            }
        };

        let version = format!(" v{}", manifest.version);

        if !manifest.mountable_on(server_name) {
            println!("{} app {}{}", style("-").dim(), name, version);
            continue;
        }

        println!(
            "{} app {}{} @ {}",
            style("+").green(),
            name,
            version,
            manifest_path.display()
        );
        mounts.insert(MountPoint {
            name: name.to_string(),
            root: root.to_path_buf(),
            version: manifest.version,
        });
    }

    Ok(mounts)
}
