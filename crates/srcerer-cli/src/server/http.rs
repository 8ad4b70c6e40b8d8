// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! HTTP server for mounted apps.
//!
//! - `/<app>` and `/<app>/` run a build pass and reply with the bootstrap
//!   document; `?debug=true` and `?force=true` set the build flags.
//! - `/<app>/<rest>` serves `<rest>` from the app's static root.
//! - `/` redirects to the configured root app.
//!
//! Every response carries an `x-powered-by` header with the server name.

use std::path::Path;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware,
    response::{Html, IntoResponse, Redirect, Response},
    Router,
};
use console::style;
use srcerer::{BuildPipeline, BuildRequest, SrcererError};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use super::mount::{discover, Mounts};
use crate::config::ServerConfig;

/// Shared application state for the server.
pub struct AppState {
    /// Build pipeline shared by every app.
    pub pipeline: BuildPipeline,
    /// Mounted apps.
    pub mounts: Mounts,
    /// Server configuration.
    pub config: ServerConfig,
    routes: matchit::Router<Target>,
}

impl AppState {
    /// Creates state with a fresh pipeline.
    pub fn new(config: ServerConfig, mounts: Mounts) -> Self {
        Self {
            pipeline: BuildPipeline::default(),
            mounts,
            config,
            routes: path_router(),
        }
    }
}

/// What a request path addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Document,
    Static,
}

/// Builds the router for `state`.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .fallback(fallback_handler)
        .layer(middleware::map_response_with_state(state.clone(), powered_by))
        .with_state(state)
}

/// Discovers apps and serves them until the process stops.
pub async fn create_server(config: &ServerConfig, base: &Path) -> anyhow::Result<()> {
    let apps_dir = config.apps_dir(base);
    let mounts = discover(&apps_dir, &config.name)?;
    if mounts.is_empty() {
        println!(
            "{} no app under {} allows server '{}'",
            style("Warning:").yellow(),
            apps_dir.display(),
            config.name
        );
    }

    let addr = config.addr();
    let state = Arc::new(AppState::new(config.clone(), mounts));
    let app = router(state);

    println!();
    println!(
        "{} {}",
        style("Server running at").green().bold(),
        style(format!("http://{}", addr)).cyan().underlined()
    );
    println!("{}", style("Press Ctrl+C to stop").dim());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn powered_by(State(state): State<Arc<AppState>>, mut response: Response) -> Response {
    if let Ok(value) = HeaderValue::from_str(&state.config.name) {
        response.headers_mut().insert("x-powered-by", value);
    }
    response
}

fn path_router() -> matchit::Router<Target> {
    let mut routes = matchit::Router::new();
    // static literal patterns; insertion cannot conflict
    let _ = routes.insert("/{app}", Target::Document);
    let _ = routes.insert("/{app}/{*rest}", Target::Static);
    routes
}

/// Main fallback handler that routes requests
async fn fallback_handler(State(state): State<Arc<AppState>>, request: Request<Body>) -> Response {
    let path = request.uri().path().to_string();
    let query = request.uri().query().unwrap_or_default().to_string();

    if path == "/" {
        return match &state.config.root {
            Some(root) => Redirect::temporary(&format!("/{}/", root)).into_response(),
            None => (StatusCode::NOT_FOUND, "Not found").into_response(),
        };
    }

    // `/<app>/` addresses the document too
    let normalized = match path.strip_suffix('/') {
        Some(app) if !app[1..].contains('/') => app,
        _ => path.as_str(),
    };

    let Ok(matched) = state.routes.at(normalized) else {
        return (StatusCode::NOT_FOUND, "Not found").into_response();
    };
    let target = *matched.value;
    let app = matched.params.get("app").unwrap_or_default().to_string();
    let rest = matched.params.get("rest").unwrap_or_default().to_string();

    let Some(app_root) = state.mounts.get(&app) else {
        tracing::warn!(app = %app, "request for unknown app");
        return (StatusCode::INTERNAL_SERVER_ERROR, format!("Unknown: {}", app)).into_response();
    };

    match target {
        Target::Document => serve_document(&state, app_root, &query).await,
        Target::Static => serve_static(&state, app_root, &rest, request).await,
    }
}

fn flag(query: &str, name: &str) -> bool {
    form_urlencoded::parse(query.as_bytes()).any(|(k, v)| k == name && v == "true")
}

async fn serve_document(state: &AppState, app_root: &Path, query: &str) -> Response {
    let request = BuildRequest {
        debug: flag(query, "debug"),
        force: flag(query, "force"),
    };

    match state.pipeline.build(app_root, request).await {
        Ok(outcome) => {
            tracing::info!(
                app = %outcome.app,
                modified = outcome.modified,
                written = outcome.report.written(),
                "build pass"
            );
            let mut response = Html(outcome.document).into_response();
            response
                .headers_mut()
                .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
            response
        }
        Err(e) => error_response(e),
    }
}

async fn serve_static(state: &AppState, app_root: &Path, rest: &str, request: Request<Body>) -> Response {
    let file = match state.pipeline.static_file(app_root, rest).await {
        Ok(file) => file,
        Err(e) => return error_response(e),
    };

    match ServeFile::new(file).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}

fn error_response(error: SrcererError) -> Response {
    match error {
        SrcererError::NotFound { path } => {
            tracing::debug!("not found: {}", path.display());
            (StatusCode::NOT_FOUND, "Not found").into_response()
        }
        other => {
            tracing::error!("{}", other);
            (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags() {
        assert!(flag("debug=true", "debug"));
        assert!(flag("force=true&debug=1", "force"));
        assert!(!flag("force=true&debug=1", "debug"));
        assert!(!flag("", "debug"));
    }

    #[test]
    fn routes_documents_and_files() {
        let routes = path_router();
        assert_eq!(*routes.at("/hello").unwrap().value, Target::Document);
        let matched = routes.at("/hello/bin/main.js").unwrap();
        assert_eq!(*matched.value, Target::Static);
        assert_eq!(matched.params.get("rest"), Some("bin/main.js"));
    }
}
