// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! One build pass for a single app.

use console::style;
use srcerer::{BuildPipeline, BuildRequest};
use std::path::Path;
use std::time::Instant;

use super::print_outcome;

/// Builds the app at `app_root` once and prints the report.
pub async fn run(app_root: &Path, debug: bool, force: bool) -> anyhow::Result<()> {
    println!(
        "{} {}",
        style("Building app from:").cyan(),
        app_root.display()
    );

    let start = Instant::now();
    let pipeline = BuildPipeline::default();
    let outcome = pipeline.build(app_root, BuildRequest { debug, force }).await?;

    print_outcome(&outcome);

    let failures = outcome
        .report
        .blobs
        .iter()
        .filter(|b| b.has_failures())
        .count();
    println!();
    println!(
        "{} {} {} {}",
        style("Build complete!").green().bold(),
        style(format!("{} artifact(s) in", outcome.report.written())).dim(),
        style(format!("{}ms", start.elapsed().as_millis())).cyan(),
        if failures > 0 {
            style(format!("({} blob(s) with failures)", failures)).yellow()
        } else {
            style(String::new())
        }
    );

    Ok(())
}
