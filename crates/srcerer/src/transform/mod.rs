// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Asset transformation backends.
//!
//! The compiler treats style, sprite and script processing as black boxes
//! behind three traits:
//!
//! - [`StyleTransform`]: style source + import search paths → CSS
//! - [`SpriteOptimizer`]: SVG markup + [`SpriteOptions`] → SVG markup
//! - [`ScriptMinifier`]: script source → minified script
//!
//! [`Transformers::default`] wires the built-in implementations. Swap any of
//! them to plug in another toolchain.

mod script;
mod sprite;
mod style;

pub use script::{minify_script, OxcMinifier};
pub use sprite::{ConservativeSprite, SpriteOptions};
pub use style::LightningStyle;

use crate::error::Result;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Turns style source into CSS.
pub trait StyleTransform: Send + Sync {
    /// Transforms `source`, resolving imports against `search_paths`.
    fn transform(&self, source: &str, search_paths: &[PathBuf]) -> Result<String>;
}

/// Optimizes sprite markup.
pub trait SpriteOptimizer: Send + Sync {
    /// Optimizes `svg` with the given options.
    fn optimize(&self, svg: &str, options: &SpriteOptions) -> Result<String>;
}

/// Minifies script source.
pub trait ScriptMinifier: Send + Sync {
    /// Minifies `source`.
    fn minify(&self, source: &str) -> Result<String>;
}

/// The set of transformation backends used by a build.
#[derive(Clone)]
pub struct Transformers {
    /// Style backend.
    pub style: Arc<dyn StyleTransform>,
    /// Sprite backend.
    pub sprite: Arc<dyn SpriteOptimizer>,
    /// Script backend.
    pub script: Arc<dyn ScriptMinifier>,
}

impl Default for Transformers {
    fn default() -> Self {
        Self {
            style: Arc::new(LightningStyle::new()),
            sprite: Arc::new(ConservativeSprite),
            script: Arc::new(OxcMinifier),
        }
    }
}

impl fmt::Debug for Transformers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transformers").finish_non_exhaustive()
    }
}
