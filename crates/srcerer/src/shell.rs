// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Application shell emission.
//!
//! The shell is the HTML bootstrap document of an application. It carries
//! no component markup: just meta data, the global style and the scripts
//! that start the component runtime. Script order is fixed: runtime
//! bootstrap, then external scripts, then inline libraries.

use crate::compiler::BlobCompiler;
use crate::error::{AssetKind, Result, SrcererError};
use crate::manifest::{Attribute, HeadTag, Manifest};
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const NO_CACHE_META: [(&str, &str); 3] = [
    ("Cache-Control", "no-cache, no-store, must-revalidate"),
    ("Pragma", "no-cache"),
    ("Expires", "0"),
];

/// Name and version of the platform, written into generation comments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformInfo {
    /// Platform name.
    pub name: String,
    /// Platform version.
    pub version: String,
}

impl Default for PlatformInfo {
    fn default() -> Self {
        Self {
            name: "srcerer".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Everything the bootstrap document is rendered from.
#[derive(Debug, Clone)]
pub struct ShellDocument {
    /// Application name, also the title.
    pub app_name: String,
    /// Application version.
    pub app_version: String,
    /// Platform that generated the document.
    pub platform: PlatformInfo,
    /// Generation time.
    pub generated_at: DateTime<Utc>,
    /// Adds no-cache meta tags.
    pub debug: bool,
    /// `<meta>` tags.
    pub meta: Vec<BTreeMap<String, String>>,
    /// Extra head tags.
    pub head: Vec<HeadTag>,
    /// Inline global CSS.
    pub style: Option<String>,
    /// Runtime bootstrap script URL.
    pub bootstrap: String,
    /// External script URLs.
    pub ext: Vec<String>,
    /// Inline library scripts.
    pub libs: Vec<String>,
    /// `<html>` attributes.
    pub html: Vec<Attribute>,
    /// `<body>` attributes.
    pub body: Vec<Attribute>,
}

impl ShellDocument {
    /// Starts a document from a manifest, without style or libraries.
    pub fn from_manifest(manifest: &Manifest, platform: PlatformInfo, debug: bool) -> Self {
        Self {
            app_name: manifest.name.clone(),
            app_version: manifest.version.clone(),
            platform,
            generated_at: Utc::now(),
            debug,
            meta: manifest.meta.clone(),
            head: manifest.head.clone(),
            style: None,
            bootstrap: manifest.bootstrap.clone(),
            ext: manifest.ext.clone(),
            libs: Vec::new(),
            html: manifest.html.clone(),
            body: manifest.body.clone(),
        }
    }

    /// Renders the HTML text.
    pub fn render(&self) -> String {
        let mut out = String::from("<!DOCTYPE html>\n");
        out.push_str(&format!(
            "<!-- {} {} | {} {} | {} -->\n",
            self.app_name,
            self.app_version,
            self.platform.name,
            self.platform.version,
            self.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
        ));

        out.push_str(&format!("<html{}>\n<head>\n", attributes(&self.html)));

        for meta in &self.meta {
            let attrs: String = meta
                .iter()
                .map(|(k, v)| format!(" {}=\"{}\"", k, escape(v)))
                .collect();
            out.push_str(&format!("<meta{}>\n", attrs));
        }
        out.push_str(&format!("<title>{}</title>\n", escape(&self.app_name)));

        for tag in &self.head {
            let attrs: String = tag
                .attrs
                .iter()
                .map(|(k, v)| format!(" {}=\"{}\"", k, escape(v)))
                .collect();
            match &tag.content {
                Some(content) => {
                    out.push_str(&format!("<{0}{1}>{2}</{0}>\n", tag.tag, attrs, content))
                }
                None => out.push_str(&format!("<{}{}>\n", tag.tag, attrs)),
            }
        }

        if self.debug {
            for (name, content) in NO_CACHE_META {
                out.push_str(&format!(
                    "<meta http-equiv=\"{}\" content=\"{}\">\n",
                    name, content
                ));
            }
        }

        if let Some(style) = &self.style {
            out.push_str(&format!("<style>{}</style>\n", style));
        }

        out.push_str(&format!(
            "<script src=\"{}\"></script>\n",
            escape(&self.bootstrap)
        ));
        for src in &self.ext {
            out.push_str(&format!("<script src=\"{}\"></script>\n", escape(src)));
        }
        for lib in &self.libs {
            out.push_str(&format!("<script>{}</script>\n", lib));
        }

        out.push_str(&format!(
            "</head>\n<body{}></body>\n</html>\n",
            attributes(&self.body)
        ));
        out
    }
}

fn attributes(attrs: &[Attribute]) -> String {
    attrs
        .iter()
        .map(|a| format!(" {}=\"{}\"", a.name, escape(&a.value)))
        .collect()
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Builds and writes bootstrap documents.
#[derive(Debug, Clone, Default)]
pub struct ShellEmitter {
    compiler: BlobCompiler,
    platform: PlatformInfo,
}

impl ShellEmitter {
    /// Creates an emitter that uses the compiler's style and script backends.
    pub fn new(compiler: BlobCompiler, platform: PlatformInfo) -> Self {
        Self { compiler, platform }
    }

    /// Platform written into generation comments.
    pub fn platform(&self) -> &PlatformInfo {
        &self.platform
    }

    /// Assembles the document for `manifest`.
    ///
    /// A failing global style or library is logged and left out.
    pub async fn document(&self, app_root: &Path, manifest: &Manifest, debug: bool) -> ShellDocument {
        let mut doc = ShellDocument::from_manifest(manifest, self.platform.clone(), debug);

        match self.global_style(app_root, manifest).await {
            Ok(style) => doc.style = style,
            Err(e) => tracing::error!(app = %manifest.name, "global style left out: {}", e),
        }

        for bundle in &manifest.lib {
            let dir = app_root.join(&bundle.path);
            for file in &bundle.files {
                let path = dir.join(file);
                match self.library(&path, debug).await {
                    Ok(code) => doc.libs.push(code),
                    Err(e) => tracing::error!(
                        app = %manifest.name,
                        lib = %path.display(),
                        "library left out: {}",
                        e
                    ),
                }
            }
        }

        doc
    }

    /// Writes the document to the index path and the deploy file, if any.
    ///
    /// Returns the rendered text.
    pub async fn write(&self, app_root: &Path, manifest: &Manifest, debug: bool) -> Result<String> {
        let html = self.document(app_root, manifest, debug).await.render();
        let index = manifest.index_path(app_root);

        if let Some(parent) = index.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SrcererError::from_io(parent, e))?;
        }
        tokio::fs::write(&index, &html)
            .await
            .map_err(|e| SrcererError::from_io(&index, e))?;
        tracing::info!(app = %manifest.name, path = %index.display(), "shell written");

        if let Some(deploy) = &manifest.deploy_file {
            let target: PathBuf = app_root.join(deploy);
            tokio::fs::write(&target, &html)
                .await
                .map_err(|e| SrcererError::from_io(&target, e))?;
            tracing::info!(app = %manifest.name, path = %target.display(), "shell deployed");
        }

        Ok(html)
    }

    async fn global_style(&self, app_root: &Path, manifest: &Manifest) -> Result<Option<String>> {
        if manifest.style.is_empty() {
            return Ok(None);
        }

        let mut source = String::new();
        for file in &manifest.style {
            let path = app_root.join(file);
            let text = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| SrcererError::from_io(&path, e))?;
            source.push_str(&text);
            source.push('\n');
        }

        let css = self
            .compiler
            .transform_style(source, manifest.style_search_paths(app_root))
            .await?;
        Ok(Some(css))
    }

    async fn library(&self, path: &Path, debug: bool) -> Result<String> {
        let code = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SrcererError::from_io(path, e))?;
        if debug {
            return Ok(code);
        }
        self.compiler.minify_script(code).await.map_err(|e| match e {
            SrcererError::Transform { message, .. } => SrcererError::transform(
                AssetKind::Script,
                format!("{}: {}", path.display(), message),
            ),
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn manifest(extra: &str) -> Manifest {
        Manifest::from_json(&format!(
            r#"{{ "name": "hello", "version": "1.0.0", "static": "static",
                 "meta": [{{ "charset": "utf-8" }}],
                 "ext": ["https://cdn.example/x.js"] {} }}"#,
            extra
        ))
        .unwrap()
    }

    #[test]
    fn scripts_are_ordered() {
        let mut doc = ShellDocument::from_manifest(&manifest(""), PlatformInfo::default(), false);
        doc.libs.push("var lib=1;".to_string());
        let html = doc.render();

        let bootstrap = html.find("<script src=\"srcerer.js\">").unwrap();
        let ext = html.find("<script src=\"https://cdn.example/x.js\">").unwrap();
        let lib = html.find("<script>var lib=1;</script>").unwrap();
        assert!(bootstrap < ext && ext < lib);
        assert!(html.contains("<title>hello</title>"));
        assert!(html.contains("<meta charset=\"utf-8\">"));
        assert!(html.contains("<!-- hello 1.0.0 | srcerer "));
    }

    #[test]
    fn no_cache_meta_only_in_debug() {
        let m = manifest("");
        let release = ShellDocument::from_manifest(&m, PlatformInfo::default(), false).render();
        let debug = ShellDocument::from_manifest(&m, PlatformInfo::default(), true).render();
        assert!(!release.contains("no-cache"));
        assert!(debug.contains("<meta http-equiv=\"Cache-Control\""));
    }

    #[test]
    fn html_and_body_attributes() {
        let m = manifest(
            r#", "html": [{ "name": "lang", "value": "en" }],
                "body": [{ "name": "class", "value": "app \"x\"" }]"#,
        );
        let html = ShellDocument::from_manifest(&m, PlatformInfo::default(), false).render();
        assert!(html.contains("<html lang=\"en\">"));
        assert!(html.contains("<body class=\"app &quot;x&quot;\"></body>"));
    }

    #[tokio::test]
    async fn writes_index_and_deploy_file() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("style")).unwrap();
        fs::create_dir_all(dir.path().join("lib")).unwrap();
        fs::write(dir.path().join("style/app.css"), "body { margin: 0px }").unwrap();
        fs::write(dir.path().join("lib/util.js"), "// util\nvar util = 1;").unwrap();

        let m = manifest(
            r#", "style": ["style/app.css"],
                "lib": [{ "path": "lib", "files": ["util.js"] }],
                "deployFile": "deployed.html""#,
        );
        let html = ShellEmitter::default()
            .write(dir.path(), &m, false)
            .await
            .unwrap();

        assert!(html.contains("<style>body{margin:0}</style>"));
        assert!(html.contains("<script>var util=1"));
        assert!(!html.contains("// util"));
        assert_eq!(
            fs::read_to_string(dir.path().join("static/index.html")).unwrap(),
            html
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("deployed.html")).unwrap(),
            html
        );
    }

    #[tokio::test]
    async fn missing_library_is_left_out() {
        let dir = TempDir::new().unwrap();
        let m = manifest(r#", "lib": [{ "path": "lib", "files": ["gone.js"] }]"#);
        let doc = ShellEmitter::default().document(dir.path(), &m, false).await;
        assert!(doc.libs.is_empty());
    }
}
