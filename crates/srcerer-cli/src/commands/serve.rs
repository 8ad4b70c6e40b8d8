// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Server command.
//!
//! Mounts every app under the apps root that allows this server and serves
//! them, building on request.

use console::style;

use crate::config::Config;
use crate::server::http::create_server;

/// Runs the server; `host` and `port` override `srcerer.toml`.
pub async fn run(host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let mut config = Config::load()?.server;
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }

    let working_dir = std::env::current_dir()?;

    println!(
        "{} {} v{}",
        style("Starting").cyan().bold(),
        config.name,
        config.version
    );

    create_server(&config, &working_dir).await
}
