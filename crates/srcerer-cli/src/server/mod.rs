// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! App server components.
//!
//! # Components
//!
//! - `http`: HTTP server using Axum
//! - `mount`: App discovery under the apps root

/// HTTP server implementation using Axum.
pub mod http;
/// App discovery and mount table.
pub mod mount;
