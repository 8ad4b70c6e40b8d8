// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Error types for the srcerer build pipeline and component runtime.
//!
//! This module defines [`SrcererError`], the main error enum.
//!
//! # Error Categories
//!
//! - **Not found**: a source file or manifest is missing
//! - **Transform errors**: the style, sprite or script backend failed
//! - **Configuration errors**: a manifest is malformed or incomplete
//! - **Registration errors**: a component or sprite was never registered
//!
//! Not-found and transform errors are recoverable inside a build pass: the
//! pipeline logs them and drops the affected sub-asset. Configuration errors
//! abort the current build request only.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The sub-asset a transform was working on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    /// Component or global style source.
    Style,
    /// Vector sprite source.
    Sprite,
    /// Component behavior script, worker or inline library.
    Script,
}

impl AssetKind {
    /// Returns the short label used in build logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Style => "CSS",
            AssetKind::Sprite => "SVG",
            AssetKind::Script => "MVC",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The main error type for srcerer operations.
#[derive(Error, Debug)]
pub enum SrcererError {
    /// A file could not be found or stat'ed.
    #[error("Not found: {}", path.display())]
    NotFound {
        /// The path that was looked up.
        path: PathBuf,
    },

    /// A style, sprite or script transformation failed.
    #[error("{stage} transform error: {message}")]
    Transform {
        /// Which backend failed.
        stage: AssetKind,
        /// Backend error message.
        message: String,
    },

    /// The application manifest or server configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A component or sprite identifier was requested but never registered.
    #[error("Registration error: {0}")]
    Registration(String),

    /// An artifact could not be parsed.
    #[error("Invalid artifact {name}: {message}")]
    InvalidArtifact {
        /// Blob name of the artifact.
        name: String,
        /// What was wrong with it.
        message: String,
    },

    /// Cache operation failed.
    #[error("Cache error: {0}")]
    Cache(String),

    /// A spawned build task panicked or was cancelled.
    #[error("Task error: {0}")]
    Task(String),

    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SrcererError {
    /// Builds a transform error for the given stage.
    pub fn transform(stage: AssetKind, message: impl Into<String>) -> Self {
        SrcererError::Transform {
            stage,
            message: message.into(),
        }
    }

    /// Converts an I/O error on `path` into [`SrcererError::NotFound`] when
    /// the file is missing, and into [`SrcererError::Io`] otherwise.
    pub fn from_io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            SrcererError::NotFound { path: path.into() }
        } else {
            SrcererError::Io(err)
        }
    }

    /// Returns true for [`SrcererError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, SrcererError::NotFound { .. })
    }
}

impl From<tokio::task::JoinError> for SrcererError {
    fn from(err: tokio::task::JoinError) -> Self {
        SrcererError::Task(err.to_string())
    }
}

/// Convenience type alias for Results with [`SrcererError`].
pub type Result<T> = std::result::Result<T, SrcererError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_maps_to_not_found() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = SrcererError::from_io("blob/main/main.css", err);
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Not found: blob/main/main.css");
    }

    #[test]
    fn other_io_errors_stay_io() {
        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let err = SrcererError::from_io("x", err);
        assert!(!err.is_not_found());
        assert!(matches!(err, SrcererError::Io(_)));
    }

    #[test]
    fn transform_error_names_stage() {
        let err = SrcererError::transform(AssetKind::Sprite, "unclosed tag");
        assert_eq!(err.to_string(), "SVG transform error: unclosed tag");
    }
}
