// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Build orchestration for one application request.
//!
//! A build pass:
//!
//! 1. clears the modification cache when debug mode flipped since the last
//!    pass of this application (every blob is then rebuilt once),
//! 2. loads the manifest (re-parsed only when it changed),
//! 3. creates the artifact directory, forcing the pass when it was missing,
//! 4. resolves and compiles the changed blobs,
//! 5. compiles changed worker scripts,
//! 6. regenerates the shell when anything changed or it is missing.
//!
//! Passes for the same application are serialized; different applications
//! build concurrently.

use crate::cache::ModificationCache;
use crate::compiler::{BlobCompiler, CompileOptions, CompileReport};
use crate::error::{Result, SrcererError};
use crate::manifest::{Manifest, ManifestStore, MANIFEST_FILE};
use crate::resolver::BlobResolver;
use crate::shell::{PlatformInfo, ShellEmitter};
use crate::task::Join;
use crate::transform::{SpriteOptions, Transformers};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Directory under the static root that receives compiled workers.
pub const WORKER_DIR: &str = "worker";

/// Flags of one build request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildRequest {
    /// Debug build.
    pub debug: bool,
    /// Rebuild every blob regardless of modification times.
    pub force: bool,
}

/// Result of one build pass.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    /// Application name.
    pub app: String,
    /// Whether anything was rebuilt in this pass.
    pub modified: bool,
    /// Whether every blob was rebuilt.
    pub forced: bool,
    /// Blob compilation report.
    pub report: CompileReport,
    /// Ids of the workers written in this pass.
    pub workers: Vec<String>,
    /// Whether the shell was regenerated.
    pub shell_written: bool,
    /// The bootstrap document.
    pub document: String,
}

/// Runs build passes for any number of applications.
#[derive(Debug)]
pub struct BuildPipeline {
    cache: ModificationCache,
    manifests: ManifestStore,
    resolver: BlobResolver,
    compiler: BlobCompiler,
    shell: ShellEmitter,
    last_debug: Mutex<HashMap<PathBuf, bool>>,
    app_locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl Default for BuildPipeline {
    fn default() -> Self {
        Self::new(Transformers::default(), PlatformInfo::default())
    }
}

impl BuildPipeline {
    /// Creates a pipeline with its own modification cache.
    pub fn new(transformers: Transformers, platform: PlatformInfo) -> Self {
        Self::with_cache(ModificationCache::new(), transformers, platform)
    }

    /// Creates a pipeline backed by an existing cache.
    pub fn with_cache(cache: ModificationCache, transformers: Transformers, platform: PlatformInfo) -> Self {
        let compiler = BlobCompiler::new(transformers);
        Self {
            manifests: ManifestStore::new(cache.clone()),
            resolver: BlobResolver::new(cache.clone()),
            shell: ShellEmitter::new(compiler.clone(), platform),
            compiler,
            cache,
            last_debug: Mutex::new(HashMap::new()),
            app_locks: Mutex::new(HashMap::new()),
        }
    }

    /// The modification cache shared by every stage.
    pub fn cache(&self) -> &ModificationCache {
        &self.cache
    }

    /// Platform written into generated documents.
    pub fn platform(&self) -> &PlatformInfo {
        self.shell.platform()
    }

    /// Loads the manifest of the application at `app_root`.
    pub async fn manifest(&self, app_root: &Path) -> Result<Arc<Manifest>> {
        Ok(self.manifests.load(&app_root.join(MANIFEST_FILE)).await?.manifest)
    }

    /// Runs one build pass and returns the bootstrap document.
    ///
    /// # Errors
    ///
    /// Manifest errors abort the pass. Source and transform failures are
    /// logged and do not.
    pub async fn build(&self, app_root: &Path, request: BuildRequest) -> Result<BuildOutcome> {
        let lock = self.app_lock(app_root)?;
        let _guard = lock.lock().await;

        let mut force = request.force;
        let toggled = self.debug_toggled(app_root, request.debug)?;
        if toggled {
            tracing::info!(app_root = %app_root.display(), debug = request.debug, "debug mode changed, rebuilding");
            self.cache.clear()?;
            force = true;
        }

        let loaded = self.manifests.load(&app_root.join(MANIFEST_FILE)).await?;
        let manifest = loaded.manifest;

        let bin_dir = manifest.bin_dir(app_root);
        if !tokio::fs::try_exists(&bin_dir).await.unwrap_or(false) {
            tokio::fs::create_dir_all(&bin_dir)
                .await
                .map_err(|e| SrcererError::from_io(&bin_dir, e))?;
            tracing::info!(app = %manifest.name, path = %bin_dir.display(), "artifact directory created");
            force = true;
        }

        let options = CompileOptions {
            debug: request.debug,
            style_paths: manifest.style_search_paths(app_root),
            sprite: SpriteOptions::conservative(),
        };

        let descriptors = self.resolver.resolve(app_root, &manifest, force).await;
        let report = self.compiler.compile_all(descriptors, &bin_dir, &options).await;
        let workers = self.compile_workers(app_root, &manifest, request.debug, force).await;
        let shell_inputs_changed = self.shell_inputs_changed(app_root, &manifest).await;

        let modified = loaded.changed
            || force
            || !report.is_empty()
            || !workers.is_empty()
            || shell_inputs_changed;

        let index = manifest.index_path(app_root);
        let existing = if modified {
            None
        } else {
            tokio::fs::read_to_string(&index).await.ok()
        };

        let (document, shell_written) = match existing {
            Some(document) => (document, false),
            None => (self.shell.write(app_root, &manifest, request.debug).await?, true),
        };

        tracing::info!(
            app = %manifest.name,
            modified,
            forced = force,
            blobs = report.blobs.len(),
            workers = workers.len(),
            "build pass finished"
        );

        Ok(BuildOutcome {
            app: manifest.name.clone(),
            modified,
            forced: force,
            report,
            workers,
            shell_written,
            document,
        })
    }

    /// Resolves `rest` inside the static root of the application.
    ///
    /// # Errors
    ///
    /// [`SrcererError::NotFound`] when the path climbs out of the static root
    /// or names no file.
    pub async fn static_file(&self, app_root: &Path, rest: &str) -> Result<PathBuf> {
        let manifest = self.manifest(app_root).await?;
        let relative = Path::new(rest.trim_start_matches('/'));
        let root = manifest.static_dir(app_root);

        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(SrcererError::NotFound {
                path: root.join(relative),
            });
        }

        let path = root.join(relative);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            Ok(_) => Err(SrcererError::NotFound { path }),
            Err(e) => Err(SrcererError::from_io(path, e)),
        }
    }

    async fn compile_workers(&self, app_root: &Path, manifest: &Manifest, debug: bool, force: bool) -> Vec<String> {
        let out_dir = manifest.static_dir(app_root).join(WORKER_DIR);
        let mut join: Join<'_, Option<String>> = Join::new();

        for worker in &manifest.worker {
            let source = app_root.join(&worker.path);
            let target = out_dir.join(format!("{}.js", worker.id));
            join.push(async move {
                match self.cache.is_modified(&source).await {
                    Ok(m) if m.changed || force => {}
                    Ok(_) => return None,
                    Err(e) => {
                        tracing::warn!(worker = %worker.id, "worker source unavailable: {}", e);
                        return None;
                    }
                }
                match self.compile_worker(&source, &target, debug).await {
                    Ok(()) => {
                        tracing::info!(worker = %worker.id, "worker compiled");
                        Some(worker.id.clone())
                    }
                    Err(e) => {
                        tracing::error!(worker = %worker.id, "worker left out: {}", e);
                        None
                    }
                }
            });
        }

        join.run().await.into_iter().flatten().collect()
    }

    async fn compile_worker(&self, source: &Path, target: &Path, debug: bool) -> Result<()> {
        let code = tokio::fs::read_to_string(source)
            .await
            .map_err(|e| SrcererError::from_io(source, e))?;
        let code = if debug {
            code
        } else {
            self.compiler.minify_script(code).await?
        };
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SrcererError::from_io(parent, e))?;
        }
        tokio::fs::write(target, code)
            .await
            .map_err(|e| SrcererError::from_io(target, e))
    }

    /// Checks global style and library files. Every file is checked so the
    /// cache sees each of them on every pass.
    async fn shell_inputs_changed(&self, app_root: &Path, manifest: &Manifest) -> bool {
        let files = manifest.style.iter().map(|f| app_root.join(f)).chain(
            manifest
                .lib
                .iter()
                .flat_map(|b| b.files.iter().map(move |f| app_root.join(&b.path).join(f))),
        );

        let mut join: Join<'_, bool> = Join::new();
        for path in files {
            join.push(async move {
                self.cache
                    .is_modified(&path)
                    .await
                    .map(|m| m.changed)
                    .unwrap_or(false)
            });
        }
        join.then(|changed| changed.into_iter().any(|c| c)).await
    }

    fn debug_toggled(&self, app_root: &Path, debug: bool) -> Result<bool> {
        let mut last = self
            .last_debug
            .lock()
            .map_err(|_| SrcererError::Cache("Failed to acquire debug state lock".to_string()))?;
        let previous = last.insert(app_root.to_path_buf(), debug);
        Ok(previous.is_some_and(|p| p != debug))
    }

    fn app_lock(&self, app_root: &Path) -> Result<Arc<tokio::sync::Mutex<()>>> {
        let mut locks = self
            .app_locks
            .lock()
            .map_err(|_| SrcererError::Cache("Failed to acquire build lock table".to_string()))?;
        Ok(locks
            .entry(app_root.to_path_buf())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::Artifact;
    use std::fs;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    const APP: &str = r#"{
        "name": "hello",
        "server": "*",
        "blob": [{ "path": "blob" }],
        "static": "static",
        "worker": [{ "id": "tick", "path": "worker/tick.js" }]
    }"#;

    fn hello_app() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::write(root.join("app.json"), APP).unwrap();
        for (name, body) in [("main", "return { view: function () { return {}; } };"), ("world", "return {};")] {
            let blob = root.join("blob").join(name);
            fs::create_dir_all(&blob).unwrap();
            fs::write(blob.join(format!("{}.js", name)), body).unwrap();
            fs::write(blob.join(format!("{}.css", name)), format!(".{} {{ margin: 0 }}", name)).unwrap();
        }
        fs::create_dir_all(root.join("worker")).unwrap();
        fs::write(root.join("worker/tick.js"), "// tick\npostMessage(1);").unwrap();
        dir
    }

    fn touch(path: &Path) {
        let later = SystemTime::now() + Duration::from_secs(5);
        fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(later)
            .unwrap();
    }

    #[tokio::test]
    async fn first_pass_builds_everything() {
        let app = hello_app();
        let pipeline = BuildPipeline::default();
        let outcome = pipeline.build(app.path(), BuildRequest::default()).await.unwrap();

        assert_eq!(outcome.app, "hello");
        assert!(outcome.modified);
        assert!(outcome.forced, "missing bin dir forces the pass");
        assert_eq!(outcome.report.written(), 2);
        assert_eq!(outcome.workers, vec!["tick".to_string()]);
        assert!(outcome.shell_written);
        assert!(outcome.document.contains("<title>hello</title>"));

        let worker = fs::read_to_string(app.path().join("static/worker/tick.js")).unwrap();
        assert!(worker.starts_with("postMessage(1)"));
        assert!(!worker.contains("tick"));
        let main = fs::read_to_string(app.path().join("static/bin/main.js")).unwrap();
        assert!(Artifact::parse(&main).unwrap().css.is_some());
    }

    #[tokio::test]
    async fn second_pass_sees_no_changes_and_writes_nothing() {
        let app = hello_app();
        let pipeline = BuildPipeline::default();
        let first = pipeline.build(app.path(), BuildRequest::default()).await.unwrap();

        let artifact = app.path().join("static/bin/main.js");
        let written_at = fs::metadata(&artifact).unwrap().modified().unwrap();

        let second = pipeline.build(app.path(), BuildRequest::default()).await.unwrap();
        assert!(!second.modified);
        assert!(second.report.is_empty());
        assert!(second.workers.is_empty());
        assert!(!second.shell_written);
        assert_eq!(second.document, first.document);
        assert_eq!(fs::metadata(&artifact).unwrap().modified().unwrap(), written_at);
    }

    #[tokio::test]
    async fn only_touched_blob_is_rebuilt() {
        let app = hello_app();
        let pipeline = BuildPipeline::default();
        pipeline.build(app.path(), BuildRequest::default()).await.unwrap();

        touch(&app.path().join("blob/world/world.css"));
        let outcome = pipeline.build(app.path(), BuildRequest::default()).await.unwrap();
        assert!(outcome.modified);
        assert_eq!(outcome.report.blobs.len(), 1);
        assert_eq!(outcome.report.blobs[0].name, "world");
        assert!(outcome.shell_written);
    }

    #[tokio::test]
    async fn debug_toggle_rebuilds_every_blob_once() {
        let app = hello_app();
        let pipeline = BuildPipeline::default();
        pipeline.build(app.path(), BuildRequest::default()).await.unwrap();

        let debug = BuildRequest {
            debug: true,
            force: false,
        };
        let toggled = pipeline.build(app.path(), debug).await.unwrap();
        assert!(toggled.forced);
        assert_eq!(toggled.report.written(), 2);
        assert!(toggled.document.contains("no-cache"));
        let main = fs::read_to_string(app.path().join("static/bin/main.js")).unwrap();
        assert!(main.starts_with("//# sourceURL=main"));

        let again = pipeline.build(app.path(), debug).await.unwrap();
        assert!(again.report.is_empty());
        assert!(!again.modified);
    }

    #[tokio::test]
    async fn force_rebuilds_unchanged_blobs() {
        let app = hello_app();
        let pipeline = BuildPipeline::default();
        pipeline.build(app.path(), BuildRequest::default()).await.unwrap();

        let outcome = pipeline
            .build(
                app.path(),
                BuildRequest {
                    debug: false,
                    force: true,
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.report.written(), 2);
        assert!(outcome.shell_written);
    }

    #[tokio::test]
    async fn missing_shell_is_regenerated() {
        let app = hello_app();
        let pipeline = BuildPipeline::default();
        pipeline.build(app.path(), BuildRequest::default()).await.unwrap();

        fs::remove_file(app.path().join("static/index.html")).unwrap();
        let outcome = pipeline.build(app.path(), BuildRequest::default()).await.unwrap();
        assert!(!outcome.modified);
        assert!(outcome.shell_written);
        assert!(app.path().join("static/index.html").is_file());
    }

    #[tokio::test]
    async fn bad_manifest_aborts_the_pass() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("app.json"), r#"{ "name": "x" }"#).unwrap();
        let err = BuildPipeline::default()
            .build(dir.path(), BuildRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SrcererError::Config(_)));
    }

    #[tokio::test]
    async fn concurrent_builds_of_one_app_are_serialized() {
        let app = hello_app();
        let pipeline = Arc::new(BuildPipeline::default());

        let a = {
            let pipeline = pipeline.clone();
            let root = app.path().to_path_buf();
            tokio::spawn(async move { pipeline.build(&root, BuildRequest::default()).await })
        };
        let b = {
            let pipeline = pipeline.clone();
            let root = app.path().to_path_buf();
            tokio::spawn(async move { pipeline.build(&root, BuildRequest::default()).await })
        };

        let a = a.await.unwrap().unwrap();
        let b = b.await.unwrap().unwrap();
        assert_eq!(a.report.written() + b.report.written(), 2);
    }

    #[tokio::test]
    async fn static_files_stay_inside_the_static_root() {
        let app = hello_app();
        let pipeline = BuildPipeline::default();
        pipeline.build(app.path(), BuildRequest::default()).await.unwrap();

        let found = pipeline.static_file(app.path(), "bin/main.js").await.unwrap();
        assert!(found.ends_with("static/bin/main.js"));

        let err = pipeline.static_file(app.path(), "../app.json").await.unwrap_err();
        assert!(err.is_not_found());
        let err = pipeline.static_file(app.path(), "bin/nope.js").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
