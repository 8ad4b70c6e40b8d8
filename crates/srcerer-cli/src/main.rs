// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use clap::{Parser, Subcommand};
use srcerer_cli::commands;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "srcerer")]
#[command(author = "Maravilla Labs")]
#[command(version)]
#[command(about = "Incremental component builds and app server", long_about = None)]
struct Cli {
    /// Log level: error, warn, info, debug, trace
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scaffold a new app
    Init {
        /// App directory name
        #[arg(default_value = "hello")]
        name: String,
    },
    /// Serve every mounted app, building on request
    Serve {
        /// Port to run the server on (overrides srcerer.toml)
        #[arg(short, long)]
        port: Option<u16>,
        /// Host to bind to (overrides srcerer.toml)
        #[arg(long)]
        host: Option<String>,
    },
    /// Run one build pass for an app
    Build {
        /// App directory (containing app.json)
        app: PathBuf,
        /// Debug build: unminified scripts with source URLs
        #[arg(long)]
        debug: bool,
        /// Rebuild every blob
        #[arg(long)]
        force: bool,
    },
    /// Rebuild an app whenever its sources change
    Watch {
        /// App directory (containing app.json)
        app: PathBuf,
        /// Debug build
        #[arg(long)]
        debug: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with the specified log level
    let filter = EnvFilter::try_new(&cli.log_level)
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    match cli.command {
        Commands::Init { name } => {
            commands::init::run(&name).await
        }
        Commands::Serve { port, host } => {
            commands::serve::run(host, port).await
        }
        Commands::Build { app, debug, force } => {
            commands::build::run(&app, debug, force).await
        }
        Commands::Watch { app, debug } => {
            commands::watch::run(&app, debug).await
        }
    }
}
