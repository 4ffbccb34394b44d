//! Purpose: Serve a directory of static editor assets over HTTP.
//! Exports: `ServeConfig`, `serve`.
//! Role: Axum-based static-file host; the rule codec never talks to it.
//! Invariants: Loopback-only unless explicitly allowed.
//! Invariants: No application API; every route resolves to a file on disk.
//! Invariants: Requests that escape the root directory are rejected.

use std::net::{IpAddr, SocketAddr};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use axum::extract::{Path as AxumPath, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use hyperlayer::core::error::{Error, ErrorKind};

#[derive(Clone, Debug)]
pub struct ServeConfig {
    pub bind: SocketAddr,
    pub root: PathBuf,
    pub allow_non_loopback: bool,
}

struct AppState {
    root: PathBuf,
}

pub async fn serve(config: ServeConfig) -> Result<(), Error> {
    validate_config(&config)?;

    init_tracing();

    let root = config.root.canonicalize().map_err(|err| {
        Error::new(ErrorKind::NotFound)
            .with_message("static directory does not exist")
            .with_path(&config.root)
            .with_source(err)
    })?;

    let state = Arc::new(AppState { root });
    let app = Router::new()
        .route("/", get(index))
        .route("/*path", get(asset))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to bind server")
                .with_source(err)
        })?;

    tracing::info!(bind = %config.bind, "serving static files");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("server failed")
                .with_source(err)
        })
}

fn validate_config(config: &ServeConfig) -> Result<(), Error> {
    if !is_loopback(config.bind.ip()) && !config.allow_non_loopback {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("non-loopback bind requires explicit opt-in")
            .with_hint("Re-run with --allow-non-loopback or use a loopback address."));
    }
    Ok(())
}

fn is_loopback(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(addr) => addr.is_loopback(),
        IpAddr::V6(addr) => addr.is_loopback(),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        let mut signal = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("install SIGTERM handler");
        signal.recv().await;
    };
    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    #[cfg(not(unix))]
    ctrl_c.await;
}

async fn index(State(state): State<Arc<AppState>>) -> Response {
    serve_file(&state.root, "index.html").await
}

async fn asset(State(state): State<Arc<AppState>>, AxumPath(path): AxumPath<String>) -> Response {
    serve_file(&state.root, &path).await
}

async fn serve_file(root: &Path, request_path: &str) -> Response {
    let Some(relative) = sanitize(request_path) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let path = root.join(relative);
    match tokio::fs::read(&path).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, content_type(&path))], bytes).into_response(),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

// Only plain path segments survive; anything that could climb out of the
// root (parent components, absolute paths) resolves to nothing.
fn sanitize(request_path: &str) -> Option<PathBuf> {
    let mut clean = PathBuf::new();
    for component in Path::new(request_path).components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if clean.as_os_str().is_empty() {
        None
    } else {
        Some(clean)
    }
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("html") => "text/html; charset=utf-8",
        Some("js") => "text/javascript",
        Some("css") => "text/css",
        Some("json") => "application/json",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}
