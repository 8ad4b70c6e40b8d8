// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Conservative sprite optimization.
//!
//! Sprites are looked up by element id at runtime, so the optimizer never
//! renames or removes ids, never touches `viewBox`, and never merges or
//! rewrites paths. It only removes what the browser ignores anyway.

use super::SpriteOptimizer;
use crate::error::{AssetKind, Result, SrcererError};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref COMMENT_RE: Regex = Regex::new(r"(?s)<!--.*?-->").unwrap();
    static ref DECLARATION_RE: Regex = Regex::new(r"(?s)<\?xml.*?\?>").unwrap();
    static ref DOCTYPE_RE: Regex = Regex::new(r"(?s)<!DOCTYPE[^>\[]*(\[.*?\])?\s*>").unwrap();
    static ref METADATA_RE: Regex =
        Regex::new(r"(?s)<metadata\b[^>]*/>|<metadata\b[^>]*>.*?</metadata>").unwrap();
    static ref BETWEEN_TAGS_RE: Regex = Regex::new(r">\s+<").unwrap();
    static ref SVG_OPEN_RE: Regex = Regex::new(r"<svg[\s>/]").unwrap();
}

/// Which cleanups the sprite optimizer may apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpriteOptions {
    /// Drop `<!-- -->` comments.
    pub remove_comments: bool,
    /// Drop the XML declaration and doctype.
    pub remove_declarations: bool,
    /// Drop `<metadata>` elements.
    pub remove_metadata: bool,
    /// Drop whitespace-only runs between tags.
    pub collapse_whitespace: bool,
}

impl SpriteOptions {
    /// The option set used for component sprites.
    pub fn conservative() -> Self {
        Self {
            remove_comments: true,
            remove_declarations: true,
            remove_metadata: true,
            collapse_whitespace: true,
        }
    }

    /// Leaves the markup as written.
    pub fn untouched() -> Self {
        Self {
            remove_comments: false,
            remove_declarations: false,
            remove_metadata: false,
            collapse_whitespace: false,
        }
    }
}

impl Default for SpriteOptions {
    fn default() -> Self {
        Self::conservative()
    }
}

/// Regex-based [`SpriteOptimizer`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ConservativeSprite;

impl SpriteOptimizer for ConservativeSprite {
    fn optimize(&self, svg: &str, options: &SpriteOptions) -> Result<String> {
        if !SVG_OPEN_RE.is_match(svg) {
            return Err(SrcererError::transform(
                AssetKind::Sprite,
                "no <svg> element found",
            ));
        }

        let mut out = svg.to_string();
        if options.remove_comments {
            out = COMMENT_RE.replace_all(&out, "").into_owned();
        }
        if options.remove_declarations {
            out = DECLARATION_RE.replace_all(&out, "").into_owned();
            out = DOCTYPE_RE.replace_all(&out, "").into_owned();
        }
        if options.remove_metadata {
            out = METADATA_RE.replace_all(&out, "").into_owned();
        }
        if options.collapse_whitespace {
            out = BETWEEN_TAGS_RE.replace_all(&out, "><").into_owned();
        }

        Ok(out.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPRITE: &str = r#"<?xml version="1.0"?>
<!DOCTYPE svg PUBLIC "-//W3C//DTD SVG 1.1//EN" "http://www.w3.org/Graphics/SVG/1.1/DTD/svg11.dtd">
<svg xmlns="http://www.w3.org/2000/svg">
  <!-- icons -->
  <metadata>generator</metadata>
  <svg id="a" viewBox="0 0 10 10">
    <path d="M0 0 L10 10"/>
  </svg>
  <svg id="b" viewBox="0 0 20 20"><circle r="5"/></svg>
</svg>
"#;

    #[test]
    fn keeps_ids_viewboxes_and_paths() {
        let out = ConservativeSprite
            .optimize(SPRITE, &SpriteOptions::conservative())
            .unwrap();
        assert!(out.starts_with("<svg xmlns"));
        assert!(out.contains(r#"<svg id="a" viewBox="0 0 10 10"><path d="M0 0 L10 10"/></svg>"#));
        assert!(out.contains(r#"id="b" viewBox="0 0 20 20""#));
        assert!(!out.contains("icons"));
        assert!(!out.contains("metadata"));
        assert!(!out.contains("DOCTYPE"));
    }

    #[test]
    fn untouched_options_only_trim() {
        let out = ConservativeSprite
            .optimize(SPRITE, &SpriteOptions::untouched())
            .unwrap();
        assert_eq!(out, SPRITE.trim());
    }

    #[test]
    fn rejects_markup_without_svg() {
        let err = ConservativeSprite
            .optimize("<div/>", &SpriteOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            SrcererError::Transform {
                stage: AssetKind::Sprite,
                ..
            }
        ));
    }
}
