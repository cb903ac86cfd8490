//! Hot-reload dev loop: watch the source tree, rebuild on change, and
//! push a browser reload through the livereload layer. A failed rebuild
//! keeps the previous output serving.

use std::net::SocketAddr;

use notify::{Event, RecursiveMode, Watcher};
use tower_livereload::LiveReloadLayer;
use tracing::{info, warn};

use crate::build;
use crate::config::SiteManifest;
use crate::error::{Result, StagehandError};

use super::{build_router, ServerConfig};

pub async fn run_dev_server(manifest: SiteManifest, port: u16) -> Result<()> {
    // Initial build must succeed so there is something to serve.
    let report = build::build_site(&manifest, false)?;
    info!(files = report.written.len(), "initial build");

    let livereload = LiveReloadLayer::new();
    let reloader = livereload.reloader();

    // Ignore events under the output directory, which may be nested
    // inside the watched source tree.
    let out_abs = manifest
        .build
        .out_dir
        .canonicalize()
        .unwrap_or_else(|_| manifest.build.out_dir.clone());
    let watch_manifest = manifest.clone();
    let mut watcher = notify::recommended_watcher(move |res: std::result::Result<Event, notify::Error>| {
        let Ok(event) = res else { return };
        if !(event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove()) {
            return;
        }
        if !event.paths.is_empty() && event.paths.iter().all(|p| p.starts_with(&out_abs)) {
            return;
        }
        match build::build_site(&watch_manifest, false) {
            Ok(report) => {
                info!(files = report.written.len(), "rebuilt");
                reloader.reload();
            }
            Err(e) => warn!("rebuild failed: {e}"),
        }
    })?;
    watcher.watch(&manifest.build.source_dir, RecursiveMode::Recursive)?;

    let mut config = ServerConfig::from_manifest(&manifest);
    config.port = port;
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let app = build_router(config).layer(livereload);

    info!(
        site = %manifest.site.name,
        source = %manifest.build.source_dir.display(),
        url = %format!("http://localhost:{port}/"),
        "dev server watching for changes"
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| StagehandError::server(format!("cannot bind {addr}: {e}")))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| StagehandError::server(e.to_string()))?;

    // Keep watcher alive until the server exits
    drop(watcher);
    Ok(())
}
