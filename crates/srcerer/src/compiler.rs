// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Blob compilation.
//!
//! Descriptors are compiled concurrently (one [`Join`] across blobs). Inside
//! one blob the sub-assets are processed by a [`Sequence`]: style, sprite,
//! behavior, then the artifact write. Every present source is compiled, not
//! only the changed ones, because the artifact is always rewritten whole.
//!
//! A failing sub-asset is logged and left out of the artifact; the other
//! sub-assets and the write still happen.

use crate::artifact::{wrap_behavior, Artifact, ARTIFACT_EXTENSION};
use crate::error::{AssetKind, Result, SrcererError};
use crate::resolver::BlobDescriptor;
use crate::task::{Join, Sequence};
use crate::transform::{SpriteOptions, Transformers};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Settings shared by every blob of one build pass.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Debug builds keep behavior code readable and add source URLs.
    pub debug: bool,
    /// Directories searched by style imports, in order.
    pub style_paths: Vec<PathBuf>,
    /// Sprite cleanups.
    pub sprite: SpriteOptions,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            debug: false,
            style_paths: Vec::new(),
            sprite: SpriteOptions::conservative(),
        }
    }
}

/// What happened to one sub-asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartOutcome {
    /// The blob has no source of this kind.
    Absent,
    /// Compiled into the artifact.
    Compiled,
    /// Left out of the artifact.
    Failed(String),
}

/// Result of compiling one blob.
#[derive(Debug, Clone)]
pub struct BlobReport {
    /// Blob name.
    pub name: String,
    /// Artifact path.
    pub artifact: PathBuf,
    /// Style outcome.
    pub style: PartOutcome,
    /// Sprite outcome.
    pub sprite: PartOutcome,
    /// Behavior outcome.
    pub behavior: PartOutcome,
    /// Whether the artifact was written.
    pub written: bool,
}

impl BlobReport {
    fn new(name: &str, artifact: PathBuf) -> Self {
        Self {
            name: name.to_string(),
            artifact,
            style: PartOutcome::Absent,
            sprite: PartOutcome::Absent,
            behavior: PartOutcome::Absent,
            written: false,
        }
    }

    /// Outcome of the given sub-asset.
    pub fn part(&self, kind: AssetKind) -> &PartOutcome {
        match kind {
            AssetKind::Style => &self.style,
            AssetKind::Sprite => &self.sprite,
            AssetKind::Script => &self.behavior,
        }
    }

    fn part_mut(&mut self, kind: AssetKind) -> &mut PartOutcome {
        match kind {
            AssetKind::Style => &mut self.style,
            AssetKind::Sprite => &mut self.sprite,
            AssetKind::Script => &mut self.behavior,
        }
    }

    /// Whether any sub-asset failed.
    pub fn has_failures(&self) -> bool {
        [&self.style, &self.sprite, &self.behavior]
            .iter()
            .any(|p| matches!(p, PartOutcome::Failed(_)))
    }
}

/// Result of one compile pass.
#[derive(Debug, Clone, Default)]
pub struct CompileReport {
    /// Per-blob reports, in descriptor order.
    pub blobs: Vec<BlobReport>,
}

impl CompileReport {
    /// Number of artifacts written.
    pub fn written(&self) -> usize {
        self.blobs.iter().filter(|b| b.written).count()
    }

    /// Whether nothing was compiled.
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

struct Parts {
    artifact: Artifact,
    report: BlobReport,
}

/// Compiles blob descriptors into artifacts.
#[derive(Debug, Clone, Default)]
pub struct BlobCompiler {
    transformers: Transformers,
}

impl BlobCompiler {
    /// Creates a compiler using the given backends.
    pub fn new(transformers: Transformers) -> Self {
        Self { transformers }
    }

    /// The configured backends.
    pub fn transformers(&self) -> &Transformers {
        &self.transformers
    }

    /// Compiles every descriptor into `bin_dir`.
    pub async fn compile_all(
        &self,
        descriptors: Vec<BlobDescriptor>,
        bin_dir: &Path,
        options: &CompileOptions,
    ) -> CompileReport {
        let mut join: Join<'_, BlobReport> = Join::new();
        for descriptor in descriptors {
            join.push(self.compile(descriptor, bin_dir, options));
        }

        let blobs = join.run().await;
        tracing::debug!(
            blobs = blobs.len(),
            written = blobs.iter().filter(|b| b.written).count(),
            "compile pass finished"
        );
        CompileReport { blobs }
    }

    /// Compiles one descriptor into `<bin_dir>/<name>.js`.
    pub async fn compile(
        &self,
        descriptor: BlobDescriptor,
        bin_dir: &Path,
        options: &CompileOptions,
    ) -> BlobReport {
        let name = descriptor.name.as_str();
        let artifact_path = bin_dir.join(format!("{}.{}", name, ARTIFACT_EXTENSION));
        let parts = Mutex::new(Parts {
            artifact: Artifact::new(name),
            report: BlobReport::new(name, artifact_path.clone()),
        });

        tracing::info!(blob = %name, "compiling");

        let steps = Sequence::new();
        for kind in [AssetKind::Style, AssetKind::Sprite, AssetKind::Script] {
            let Some(source) = descriptor.source(kind) else {
                continue;
            };
            let parts = &parts;
            steps.push(async move {
                let result = self.compile_part(kind, name, &source.path, options).await;
                let mut parts = parts.lock().await;
                let outcome = match result {
                    Ok(code) => {
                        tracing::debug!(blob = %name, "{} compiled", kind);
                        match kind {
                            AssetKind::Style => parts.artifact.css = Some(code),
                            AssetKind::Sprite => parts.artifact.svg = Some(code),
                            AssetKind::Script => parts.artifact.mvc = Some(code),
                        }
                        PartOutcome::Compiled
                    }
                    Err(e) => {
                        tracing::error!(blob = %name, "{} left out: {}", kind, e);
                        PartOutcome::Failed(e.to_string())
                    }
                };
                *parts.report.part_mut(kind) = outcome;
            });
        }

        steps.push(async {
            let mut parts = parts.lock().await;
            let text = parts.artifact.encode(options.debug);
            match tokio::fs::write(&artifact_path, text).await {
                Ok(()) => parts.report.written = true,
                Err(e) => {
                    tracing::error!(blob = %name, path = %artifact_path.display(), "cannot write artifact: {}", e)
                }
            }
        });

        steps.run().await;
        parts.into_inner().report
    }

    async fn compile_part(
        &self,
        kind: AssetKind,
        name: &str,
        path: &Path,
        options: &CompileOptions,
    ) -> Result<String> {
        let source = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SrcererError::from_io(path, e))?;

        match kind {
            AssetKind::Style => {
                self.transform_style(source, options.style_paths.clone())
                    .await
            }
            AssetKind::Sprite => {
                let sprite = self.transformers.sprite.clone();
                let sprite_options = options.sprite;
                tokio::task::spawn_blocking(move || sprite.optimize(&source, &sprite_options))
                    .await?
            }
            AssetKind::Script => {
                let code = if options.debug {
                    source
                } else {
                    self.minify_script(source).await?
                };
                Ok(wrap_behavior(name, &code, options.debug))
            }
        }
    }

    /// Runs the style backend off the async runtime.
    pub async fn transform_style(&self, source: String, search_paths: Vec<PathBuf>) -> Result<String> {
        let style = self.transformers.style.clone();
        tokio::task::spawn_blocking(move || style.transform(&source, &search_paths)).await?
    }

    /// Runs the script backend off the async runtime.
    pub async fn minify_script(&self, source: String) -> Result<String> {
        let script = self.transformers.script.clone();
        tokio::task::spawn_blocking(move || script.minify(&source)).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ModificationCache;
    use crate::resolver::BlobResolver;
    use std::fs;
    use tempfile::TempDir;

    async fn descriptor(root: &Path, name: &str, files: &[(&str, &str)]) -> BlobDescriptor {
        let dir = root.join("blob").join(name);
        fs::create_dir_all(&dir).unwrap();
        for (ext, content) in files {
            fs::write(dir.join(format!("{}.{}", name, ext)), content).unwrap();
        }
        BlobResolver::new(ModificationCache::new())
            .describe(name.to_string(), dir)
            .await
    }

    fn bin(root: &Path) -> PathBuf {
        let bin = root.join("bin");
        fs::create_dir_all(&bin).unwrap();
        bin
    }

    #[tokio::test]
    async fn greeter_artifact_registers_behavior() {
        let dir = TempDir::new().unwrap();
        let d = descriptor(
            dir.path(),
            "greeter",
            &[
                ("css", ".greeter {\n  color: #ff0000;\n}"),
                ("js", "// greets\nreturn { view: function () { return { str: \"hi\" }; } };"),
            ],
        )
        .await;

        let report = BlobCompiler::default()
            .compile(d, &bin(dir.path()), &CompileOptions::default())
            .await;
        assert!(report.written);
        assert_eq!(report.style, PartOutcome::Compiled);
        assert_eq!(report.sprite, PartOutcome::Absent);

        let text = fs::read_to_string(&report.artifact).unwrap();
        assert!(text.contains("__srcerer.register(\"greeter\""));
        assert!(!text.contains("greets"));

        let artifact = Artifact::parse(&text).unwrap();
        assert_eq!(artifact.name, "greeter");
        assert_eq!(artifact.css.as_deref(), Some(".greeter{color:red}"));
        assert!(artifact.svg.is_none());
    }

    #[tokio::test]
    async fn broken_style_still_writes_artifact() {
        let dir = TempDir::new().unwrap();
        let d = descriptor(
            dir.path(),
            "main",
            &[("css", "@import 'missing';"), ("js", "return {};")],
        )
        .await;

        let report = BlobCompiler::default()
            .compile(d, &bin(dir.path()), &CompileOptions::default())
            .await;
        assert!(report.written);
        assert!(matches!(report.style, PartOutcome::Failed(_)));
        assert!(report.has_failures());

        let artifact = Artifact::parse(&fs::read_to_string(&report.artifact).unwrap()).unwrap();
        assert!(artifact.css.is_none());
        assert!(artifact.mvc.is_some());
    }

    #[tokio::test]
    async fn sprite_keeps_its_ids() {
        let dir = TempDir::new().unwrap();
        let d = descriptor(
            dir.path(),
            "icons",
            &[(
                "svg",
                "<svg>\n  <!-- set -->\n  <svg id=\"a\" viewBox=\"0 0 1 1\"/>\n  <svg id=\"b\"/>\n</svg>",
            )],
        )
        .await;

        let report = BlobCompiler::default()
            .compile(d, &bin(dir.path()), &CompileOptions::default())
            .await;
        let artifact = Artifact::parse(&fs::read_to_string(&report.artifact).unwrap()).unwrap();
        assert_eq!(
            artifact.svg.as_deref(),
            Some("<svg><svg id=\"a\" viewBox=\"0 0 1 1\"/><svg id=\"b\"/></svg>")
        );
        assert!(artifact.mvc.is_none());
    }

    #[tokio::test]
    async fn debug_keeps_source_and_urls() {
        let dir = TempDir::new().unwrap();
        let d = descriptor(dir.path(), "main", &[("js", "// keep me\nreturn {};")]).await;
        let options = CompileOptions {
            debug: true,
            ..Default::default()
        };

        let report = BlobCompiler::default()
            .compile(d, &bin(dir.path()), &options)
            .await;
        let text = fs::read_to_string(&report.artifact).unwrap();
        assert!(text.starts_with("//# sourceURL=main\n"));
        assert!(text.contains("// keep me"));
        assert!(text.contains("//# sourceURL=main.mvc"));
    }

    #[tokio::test]
    async fn compiles_every_descriptor() {
        let dir = TempDir::new().unwrap();
        let a = descriptor(dir.path(), "a", &[("js", "return {};")]).await;
        let b = descriptor(dir.path(), "b", &[("css", ".b{top:0}")]).await;

        let report = BlobCompiler::default()
            .compile_all(vec![a, b], &bin(dir.path()), &CompileOptions::default())
            .await;
        assert_eq!(report.written(), 2);
        assert_eq!(report.blobs[0].name, "a");
        assert_eq!(report.blobs[1].name, "b");
        assert!(dir.path().join("bin/a.js").is_file());
        assert!(dir.path().join("bin/b.js").is_file());
    }

    #[tokio::test]
    async fn missing_bin_dir_is_reported_not_fatal() {
        let dir = TempDir::new().unwrap();
        let d = descriptor(dir.path(), "main", &[("js", "return {};")]).await;
        let report = BlobCompiler::default()
            .compile(d, &dir.path().join("nowhere"), &CompileOptions::default())
            .await;
        assert!(!report.written);
    }
}
