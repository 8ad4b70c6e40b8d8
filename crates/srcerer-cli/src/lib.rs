// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]

//! srcerer CLI library.
//!
//! This crate provides the command-line interface and HTTP server for
//! srcerer apps.
//!
//! # Usage
//!
//! ```bash
//! srcerer serve            # Serve every mounted app
//! srcerer build apps/hello # One build pass
//! srcerer watch apps/hello # Rebuild on change
//! srcerer init hello       # Scaffold an app
//! ```
//!
//! # Configuration
//!
//! The server is configured via `srcerer.toml` in the working directory.

/// CLI commands (serve, build, watch, init).
pub mod commands;
/// Server configuration from `srcerer.toml`.
pub mod config;
/// HTTP server and app mounting.
pub mod server;
/// File system watching for rebuilds.
pub mod watcher;
