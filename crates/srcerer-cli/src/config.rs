// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! srcerer server configuration.
//!
//! Configuration is loaded from `srcerer.toml` in the working directory.
//!
//! # Example Configuration
//!
//! ```toml
//! [server]
//! name = "srcerer"
//! host = "127.0.0.1"
//! port = 2000
//! apps_root = "apps"
//! root = "hello"
//! ```

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the configuration file.
pub const CONFIG_FILE: &str = "srcerer.toml";

/// Main configuration structure loaded from `srcerer.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server settings.
    #[serde(default)]
    pub server: ServerConfig,
}

/// Server settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server name, matched against the `server` field of app manifests
    /// (default: "srcerer").
    #[serde(default = "default_name")]
    pub name: String,
    /// Server version, reported in the `x-powered-by` header.
    #[serde(default = "default_version")]
    pub version: String,
    /// Host to bind to (default: "127.0.0.1").
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on (default: 2000).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory searched for `<mount>/app.json` (default: ".").
    #[serde(default = "default_apps_root")]
    pub apps_root: String,
    /// App that `/` redirects to.
    #[serde(default)]
    pub root: Option<String>,
}

fn default_name() -> String {
    "srcerer".to_string()
}

fn default_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    2000
}

fn default_apps_root() -> String {
    ".".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            version: default_version(),
            host: default_host(),
            port: default_port(),
            apps_root: default_apps_root(),
            root: None,
        }
    }
}

impl ServerConfig {
    /// `host:port` to bind to.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Apps root resolved against `base`.
    pub fn apps_dir(&self, base: &Path) -> PathBuf {
        base.join(&self.apps_root)
    }
}

impl Config {
    /// Loads configuration from `srcerer.toml` in the current directory.
    ///
    /// If no configuration file exists, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be parsed.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Loads configuration from `path`, falling back to defaults when the
    /// file does not exist.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
