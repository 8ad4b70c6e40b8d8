// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! File watcher command: rebuilds an app whenever its sources change.

use crate::watcher::FileWatcher;
use console::style;
use srcerer::{BuildPipeline, BuildRequest};
use std::path::{Path, PathBuf};
use tokio::signal;
use tokio::sync::mpsc;

use super::print_outcome;

/// Builds the app once, then rebuilds on every debounced source change.
pub async fn run(app_root: &Path, debug: bool) -> anyhow::Result<()> {
    let pipeline = BuildPipeline::default();
    let request = BuildRequest { debug, force: false };

    let outcome = pipeline.build(app_root, request).await?;
    print_outcome(&outcome);

    let manifest = pipeline.manifest(app_root).await?;
    let ignored = vec![manifest.static_dir(app_root)];

    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<PathBuf>>();
    let _watcher = FileWatcher::new(app_root, ignored, move |paths| {
        let _ = tx.send(paths);
    })?;

    println!();
    println!("Watching for changes in: {}", app_root.display());
    println!("Press Ctrl+C to stop...");
    println!();

    loop {
        tokio::select! {
            changed = rx.recv() => {
                let Some(paths) = changed else { break };
                let files = paths
                    .iter()
                    .map(|p| p.strip_prefix(app_root).unwrap_or(p).display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                println!("  {} {}", style("changed").cyan(), files);

                match pipeline.build(app_root, request).await {
                    Ok(outcome) => print_outcome(&outcome),
                    Err(e) => println!("{} {}", style("Error:").red().bold(), e),
                }
            }
            _ = signal::ctrl_c() => break,
        }
    }

    println!("\nStopping file watcher...");
    Ok(())
}
