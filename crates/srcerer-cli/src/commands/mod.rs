// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! CLI command implementations.
//!
//! - `build`: Run one build pass for an app
//! - `init`: Scaffold a new app
//! - `serve`: Serve every mounted app
//! - `watch`: Rebuild an app on source changes

use console::style;
use srcerer::{AssetKind, BuildOutcome, PartOutcome};

/// Single build pass command.
pub mod build;
/// App scaffolding command.
pub mod init;
/// Server command.
pub mod serve;
/// File watch command.
pub mod watch;

/// Prints the per-blob lines of a build pass.
pub fn print_outcome(outcome: &BuildOutcome) {
    for blob in &outcome.report.blobs {
        let status = if blob.written {
            style("blob").green()
        } else {
            style("blob").red()
        };
        println!("{} {}", status, style(&blob.name).bold());

        for kind in [AssetKind::Style, AssetKind::Sprite, AssetKind::Script] {
            match blob.part(kind) {
                PartOutcome::Absent => {}
                PartOutcome::Compiled => println!("  {}", style(kind).dim()),
                PartOutcome::Failed(message) => {
                    println!("  {} {}", style(kind).yellow(), style(message).dim())
                }
            }
        }
    }

    for worker in &outcome.workers {
        println!("{} {}", style("worker").green(), worker);
    }

    if outcome.shell_written {
        println!("{} {}", style("shell").green(), outcome.app);
    } else if !outcome.modified {
        println!("{} {}", style("unchanged").dim(), outcome.app);
    }
}
