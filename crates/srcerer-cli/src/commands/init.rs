// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! App scaffolding: writes the two-component hello app.

use console::style;
use std::fs;
use std::path::Path;

const APP_JSON: &str = r#"{
  "name": "{{name}}",
  "version": "0.1.0",
  "server": "*",
  "static": "static",
  "blob": [{ "path": "blob" }],
  "meta": [
    { "charset": "utf-8" },
    { "name": "viewport", "content": "width=device-width, initial-scale=1" }
  ]
}
"#;

const MAIN_JS: &str = r#"this.model = function (next, ctx, input) {
   ctx.helloString = "Hello";
   ctx.worldString = "world";
   next();
};

this.view = function (next, setView, ctx) {
   setView({
      css: "main",
      elm: [{
         str: ctx.helloString,
         elm: [{
            svg: "ic_kettle_24px"
         }, {
            css: "world",
            blob: {
               name: "world",
               worldString: ctx.worldString
            }
         }]
      }]
   });
   next();
};

this.controller = function (next, ctx) {
   next();
};
"#;

const MAIN_CSS: &str = ".main {\n  font-family: system-ui, sans-serif;\n  padding: 1rem;\n}\n";

const MAIN_SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg">
  <svg id="ic_kettle_24px" viewBox="0 0 24 24"><path d="M4 20h16v-2H4zM6 8h12l-1 8H7z"/></svg>
</svg>
"#;

const WORLD_JS: &str = r#"this.model = function (next, ctx, input) {
   ctx.worldString = input.worldString;
   next();
};

this.view = function (next, setView, ctx) {
   setView({
      str: ctx.worldString,
      css: "world",
      elm: {
         svg: "ic_xilo_24px"
      }
   });
   next();
};
"#;

const WORLD_CSS: &str = ".world {\n  display: inline-block;\n  margin-left: 0.5em;\n}\n";

const WORLD_SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg">
  <svg id="ic_xilo_24px" viewBox="0 0 24 24"><rect x="4" y="10" width="16" height="4"/></svg>
</svg>
"#;

/// Scaffolds the hello app into `<name>/`. Existing files are kept.
pub async fn run(name: &str) -> anyhow::Result<()> {
    let app_dir = Path::new(name);
    let written = scaffold(app_dir, name)?;

    println!();
    println!(
        "{} {} ({} file(s) written)",
        style("Created app").green().bold(),
        style(name).cyan(),
        written
    );
    println!();
    println!("Next steps:");
    println!("  srcerer build {}", name);
    println!("  srcerer serve");
    println!();

    Ok(())
}

/// Writes the hello app into `app_dir` and returns how many files were
/// written.
pub fn scaffold(app_dir: &Path, name: &str) -> anyhow::Result<usize> {
    let files: [(&str, String); 7] = [
        ("app.json", APP_JSON.replace("{{name}}", name)),
        ("blob/main/main.js", MAIN_JS.to_string()),
        ("blob/main/main.css", MAIN_CSS.to_string()),
        ("blob/main/main.svg", MAIN_SVG.to_string()),
        ("blob/world/world.js", WORLD_JS.to_string()),
        ("blob/world/world.css", WORLD_CSS.to_string()),
        ("blob/world/world.svg", WORLD_SVG.to_string()),
    ];

    let mut written = 0;
    for (relative, content) in files {
        let path = app_dir.join(relative);
        if path.exists() {
            tracing::info!("Keeping existing file: {}", path.display());
            continue;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        written += 1;
    }

    fs::create_dir_all(app_dir.join("static"))?;
    Ok(written)
}
