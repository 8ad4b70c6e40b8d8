// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Style transformation with lightningcss.
//!
//! Local `@import "name";` rules are inlined from the configured search
//! paths (first match wins, `.css` is appended when the name has no
//! extension). An import with a media query is inlined inside an `@media`
//! block. Remote imports (`http://`, `https://`, `//`) are kept and
//! hoisted to the top. The expanded sheet is then parsed, minified and
//! printed by lightningcss.

use super::StyleTransform;
use crate::error::{AssetKind, Result, SrcererError};
use lazy_static::lazy_static;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

lazy_static! {
    static ref IMPORT_RE: Regex =
        Regex::new(r#"@import\s+(?:url\(\s*)?["']([^"']+)["']\s*\)?([^;]*);"#).unwrap();
}

const MAX_IMPORT_DEPTH: usize = 16;

/// lightningcss-backed [`StyleTransform`].
#[derive(Debug, Clone)]
pub struct LightningStyle {
    minify: bool,
}

impl LightningStyle {
    /// Creates a transform that prints minified CSS.
    pub fn new() -> Self {
        Self { minify: true }
    }

    /// Toggles minified output.
    pub fn with_minify(mut self, minify: bool) -> Self {
        self.minify = minify;
        self
    }
}

impl Default for LightningStyle {
    fn default() -> Self {
        Self::new()
    }
}

impl StyleTransform for LightningStyle {
    fn transform(&self, source: &str, search_paths: &[PathBuf]) -> Result<String> {
        let mut remote = Vec::new();
        let mut visited = HashSet::new();
        let body = inline_imports(source, search_paths, &mut visited, &mut remote, 0)?;

        let mut expanded = remote.join("\n");
        if !expanded.is_empty() {
            expanded.push('\n');
        }
        expanded.push_str(&body);

        compile(&expanded, self.minify)
    }
}

fn compile(source: &str, minify: bool) -> Result<String> {
    let mut sheet = StyleSheet::parse(
        source,
        ParserOptions {
            filename: "srcerer".to_string(),
            ..ParserOptions::default()
        },
    )
    .map_err(|e| SrcererError::transform(AssetKind::Style, e.to_string()))?;

    sheet
        .minify(MinifyOptions::default())
        .map_err(|e| SrcererError::transform(AssetKind::Style, e.to_string()))?;

    let printed = sheet
        .to_css(PrinterOptions {
            minify,
            ..PrinterOptions::default()
        })
        .map_err(|e| SrcererError::transform(AssetKind::Style, e.to_string()))?;

    Ok(printed.code)
}

fn is_remote(target: &str) -> bool {
    target.starts_with("http://") || target.starts_with("https://") || target.starts_with("//")
}

fn inline_imports(
    source: &str,
    search_paths: &[PathBuf],
    visited: &mut HashSet<PathBuf>,
    remote: &mut Vec<String>,
    depth: usize,
) -> Result<String> {
    if depth > MAX_IMPORT_DEPTH {
        return Err(SrcererError::transform(
            AssetKind::Style,
            "imports nested too deeply",
        ));
    }

    let mut out = String::with_capacity(source.len());
    let mut last = 0;

    for caps in IMPORT_RE.captures_iter(source) {
        let whole = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
        let target = &caps[1];
        let media = caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default();
        out.push_str(&source[last..whole.start]);
        last = whole.end;

        if is_remote(target) {
            remote.push(source[whole].to_string());
            continue;
        }

        let path = find_import(target, search_paths).ok_or_else(|| {
            SrcererError::transform(
                AssetKind::Style,
                format!("import '{}' not found in style paths", target),
            )
        })?;

        let key = path.canonicalize().unwrap_or_else(|_| path.clone());
        if !visited.insert(key) {
            continue;
        }

        let imported = std::fs::read_to_string(&path).map_err(|e| {
            SrcererError::transform(
                AssetKind::Style,
                format!("cannot read import '{}': {}", path.display(), e),
            )
        })?;
        let inlined = inline_imports(&imported, search_paths, visited, remote, depth + 1)?;
        if media.is_empty() {
            out.push_str(&inlined);
        } else {
            out.push_str(&format!("@media {} {{\n{}\n}}", media, inlined));
        }
        out.push('\n');
    }

    out.push_str(&source[last..]);
    Ok(out)
}

fn find_import(target: &str, search_paths: &[PathBuf]) -> Option<PathBuf> {
    let names: Vec<String> = if Path::new(target).extension().is_some() {
        vec![target.to_string()]
    } else {
        vec![format!("{}.css", target), target.to_string()]
    };

    search_paths
        .iter()
        .flat_map(|dir| names.iter().map(move |n| dir.join(n)))
        .find(|p| p.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn minifies_plain_css() {
        let css = LightningStyle::new()
            .transform(".main {\n  color: #ff0000;\n}\n", &[])
            .unwrap();
        assert_eq!(css, ".main{color:red}");
    }

    #[test]
    fn inlines_imports_from_search_paths() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("colors.css"), ".accent { color: blue }").unwrap();

        let css = LightningStyle::new()
            .transform(
                "@import \"colors\";\n.main { margin: 0 }",
                &[dir.path().to_path_buf()],
            )
            .unwrap();
        assert!(css.starts_with(".accent{color:"));
        assert!(css.contains(".main{margin:0}"));
        assert!(!css.contains("@import"));
    }

    #[test]
    fn media_qualified_imports_keep_their_query() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("print.css"), ".nav { display: none }").unwrap();

        let css = LightningStyle::new()
            .transform(
                "@import \"print.css\" print;\n.main { margin: 0 }",
                &[dir.path().to_path_buf()],
            )
            .unwrap();
        assert!(css.contains("@media print{.nav{display:none}}"));
        assert!(css.contains(".main{margin:0}"));
        assert!(!css.starts_with(".nav"));
    }

    #[test]
    fn remote_imports_are_hoisted() {
        let css = LightningStyle::new()
            .transform(".main { margin: 0 }\n@import url(\"https://fonts.example/x.css\");", &[])
            .unwrap();
        assert!(css.starts_with("@import"));
        assert!(css.contains(".main{margin:0}"));
    }

    #[test]
    fn import_cycles_are_cut() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.css"), "@import 'b.css';\n.a { top: 0 }").unwrap();
        fs::write(dir.path().join("b.css"), "@import 'a.css';\n.b { top: 1px }").unwrap();

        let css = LightningStyle::new()
            .transform("@import 'a.css';", &[dir.path().to_path_buf()])
            .unwrap();
        assert!(css.contains(".a{top:0}"));
        assert!(css.contains(".b{top:1px}"));
    }

    #[test]
    fn missing_import_is_transform_error() {
        let err = LightningStyle::new()
            .transform("@import 'nowhere';", &[])
            .unwrap_err();
        assert!(matches!(
            err,
            SrcererError::Transform {
                stage: AssetKind::Style,
                ..
            }
        ));
    }
}
