// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]

//! # srcerer
//!
//! Incremental component builds and a component runtime for small web apps.
//!
//! An app is a directory with an `app.json` manifest and one or more blob
//! roots. Every blob (component) is a directory holding up to three sources:
//! `<name>.css`, `<name>.svg` and `<name>.js`. The build pipeline turns each
//! blob into a single artifact under `bin/`, recompiling only what changed,
//! and emits the app's `index.html` shell.
//!
//! ## Features
//!
//! - Modification cache keyed by path, with pluggable storage
//! - Style imports inlined and compiled with lightningcss
//! - Conservative sprite optimization and script minification
//! - Artifacts registered with a client runtime that runs each component's
//!   model, view and controller and assembles its view into a document
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use srcerer::{BuildPipeline, BuildRequest};
//! use std::path::Path;
//!
//! let pipeline = BuildPipeline::default();
//! let outcome = pipeline.build(Path::new("apps/hello"), BuildRequest::default()).await?;
//! println!("{} artifacts written", outcome.report.written());
//! ```

/// Artifact encoding and parsing.
pub mod artifact;
/// Modification cache.
pub mod cache;
/// Client component runtime.
pub mod client;
/// Per-blob compilation.
pub mod compiler;
/// Error types.
pub mod error;
/// App manifests.
pub mod manifest;
/// The build pipeline.
pub mod pipeline;
/// Blob discovery.
pub mod resolver;
/// HTML shell emission.
pub mod shell;
/// Sequence and join composition.
pub mod task;
/// Style, sprite and script backends.
pub mod transform;

pub use artifact::{registered_name, wrap_behavior, Artifact, ARTIFACT_EXTENSION, REGISTRY};
pub use cache::*;
pub use compiler::*;
pub use error::*;
pub use manifest::*;
pub use pipeline::*;
pub use resolver::*;
pub use shell::*;
pub use task::{Join, Sequence, SequenceHandle};
pub use transform::{ScriptMinifier, SpriteOptimizer, SpriteOptions, StyleTransform, Transformers};
