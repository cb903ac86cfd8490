//! The runtime stage: a static-file server for the built output tree.
//!
//! Request handling is a single fallback route: sanitize the path, resolve
//! it inside the root, and either serve the file, return a plain 404 for
//! asset-shaped misses, or fall back to the entry document so client-side
//! routes resolve. Every response carries the fixed security headers.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderValue, Method, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tracing::info;

use crate::assets;
use crate::config::SiteManifest;
use crate::error::{Result, StagehandError};

mod compress;
mod headers;

pub mod dev;

pub use compress::{accepted_encoding, maybe_compress, MIN_COMPRESS_BYTES};
pub use headers::{apply_security_headers, put_cache_headers, CachePolicy, SECURITY_HEADERS};

/// Everything the request handler needs, derived from the manifest.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directory served to clients, normally the build output.
    pub root: PathBuf,
    /// Entry document, relative to `root`.
    pub entry: PathBuf,
    pub port: u16,
    pub max_age_secs: u64,
    pub compress_types: Vec<String>,
}

impl ServerConfig {
    pub fn from_manifest(manifest: &SiteManifest) -> Self {
        Self {
            root: manifest.build.out_dir.clone(),
            entry: manifest.site.entry.clone(),
            port: manifest.server.port,
            max_age_secs: manifest.server.max_age_secs,
            compress_types: manifest.server.compress_types.clone(),
        }
    }
}

/// Build the router: one fallback handler behind the logging/header layer.
pub fn build_router(config: ServerConfig) -> Router {
    let state = Arc::new(config);
    Router::new()
        .fallback(serve_path)
        .layer(middleware::from_fn(request_layer))
        .with_state(state)
}

/// Bind the configured port and serve until ctrl-c.
pub async fn run_server(config: ServerConfig) -> Result<()> {
    if !config.root.is_dir() {
        return Err(StagehandError::server(format!(
            "root '{}' is not a directory (run `stagehand build` first?)",
            config.root.display()
        )));
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let root = config.root.clone();
    let app = build_router(config);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| StagehandError::server(format!("cannot bind {addr}: {e}")))?;
    info!(%addr, root = %root.display(), "serving");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| StagehandError::server(e.to_string()))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}

// ── Request layer ─────────────────────────────────────────────────────

/// Logs every request and stamps the security trio on every response,
/// fallbacks and errors included.
async fn request_layer(request: Request<Body>, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let mut response = next.run(request).await;
    apply_security_headers(response.headers_mut());

    info!(
        %method,
        path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request"
    );
    response
}

// ── Path resolution ───────────────────────────────────────────────────

enum Resolved {
    /// An existing file under the root.
    File(PathBuf),
    /// Miss that looked like an asset request: plain 404.
    NotFound,
    /// Anything else: serve the entry document (client-side routing).
    Fallback,
}

/// Turn a request path into a relative filesystem path. Percent-encoding
/// is decoded first so encoded dot segments cannot slip through; traversal
/// segments, backslashes, and NUL are rejected outright.
fn sanitize_request_path(raw: &str) -> Option<PathBuf> {
    let decoded = percent_decode(raw)?;
    if decoded.contains('\\') || decoded.contains('\0') {
        return None;
    }
    let mut rel = PathBuf::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => return None,
            seg => rel.push(seg),
        }
    }
    Some(rel)
}

fn percent_decode(raw: &str) -> Option<String> {
    if !raw.contains('%') {
        return Some(raw.to_string());
    }
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if i + 2 >= bytes.len() {
                return None;
            }
            let hi = (bytes[i + 1] as char).to_digit(16)?;
            let lo = (bytes[i + 2] as char).to_digit(16)?;
            out.push((hi * 16 + lo) as u8);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

fn resolve(config: &ServerConfig, request_path: &str) -> Resolved {
    let Some(rel) = sanitize_request_path(request_path) else {
        return Resolved::NotFound;
    };
    let mut candidate = config.root.join(&rel);
    if candidate.is_dir() {
        candidate = candidate.join(&config.entry);
    }
    if candidate.is_file() {
        return Resolved::File(candidate);
    }
    // Classify the miss on the decoded path, so `/app%2Ejs` is still an
    // asset-shaped request and not a client-side route.
    let decoded_name = rel.file_name().and_then(|n| n.to_str()).unwrap_or("");
    if assets::has_asset_extension(decoded_name) {
        return Resolved::NotFound;
    }
    Resolved::Fallback
}

/// Cache policy for a resolved file: the entry document must revalidate,
/// fingerprintable assets are immutable, everything else gets no directive.
fn cache_policy(config: &ServerConfig, path: &Path) -> CachePolicy {
    if path == config.root.join(&config.entry) {
        return CachePolicy::Revalidate;
    }
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") | Some("htm") => CachePolicy::Revalidate,
        _ if assets::is_fingerprintable(path) => CachePolicy::Immutable,
        _ => CachePolicy::None,
    }
}

// ── Handler ───────────────────────────────────────────────────────────

async fn serve_path(
    State(config): State<Arc<ServerConfig>>,
    request: Request<Body>,
) -> Response {
    if request.method() != Method::GET && request.method() != Method::HEAD {
        return method_not_allowed();
    }

    match resolve(&config, request.uri().path()) {
        Resolved::File(path) => serve_file(&config, &path, request.headers()).await,
        Resolved::NotFound => not_found(),
        Resolved::Fallback => {
            let entry = config.root.join(&config.entry);
            if entry.is_file() {
                serve_file(&config, &entry, request.headers()).await
            } else {
                not_found()
            }
        }
    }
}

async fn serve_file(
    config: &ServerConfig,
    path: &Path,
    request_headers: &axum::http::HeaderMap,
) -> Response {
    let bytes = match tokio::fs::read(path).await {
        Ok(b) => b,
        // Deleted between resolve and read: treat as a plain miss.
        Err(_) => return not_found(),
    };

    let content_type = assets::content_type(path);
    let compressible = assets::is_compressible(content_type, &config.compress_types);

    let (body, encoding) = if compressible {
        maybe_compress(request_headers, bytes)
    } else {
        (bytes, None)
    };

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = StatusCode::OK;
    response
        .headers_mut()
        .insert("content-type", HeaderValue::from_static(content_type));
    put_cache_headers(
        response.headers_mut(),
        cache_policy(config, path),
        config.max_age_secs,
    );
    if compressible {
        response
            .headers_mut()
            .insert("vary", HeaderValue::from_static("accept-encoding"));
    }
    if let Some(encoding) = encoding {
        response
            .headers_mut()
            .insert("content-encoding", HeaderValue::from_static(encoding));
    }
    response
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "not found\n").into_response()
}

fn method_not_allowed() -> Response {
    let mut response = (StatusCode::METHOD_NOT_ALLOWED, "method not allowed\n").into_response();
    response
        .headers_mut()
        .insert("allow", HeaderValue::from_static("GET, HEAD"));
    response
}
