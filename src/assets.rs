//! Extension-based asset classification: MIME types, cache eligibility,
//! and the compressible-type allow-list consulted by the server.

use std::path::Path;

/// MIME type for a file path, by extension. Unknown extensions fall back
/// to `application/octet-stream`.
pub fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") | Some("mjs") => "text/javascript; charset=utf-8",
        Some("json") | Some("map") => "application/json",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("txt") => "text/plain; charset=utf-8",
        Some("xml") => "application/xml",
        Some("wasm") => "application/wasm",
        _ => "application/octet-stream",
    }
}

/// Whether a path has an extension we recognize as a static asset at all.
/// Extensionless paths are candidates for the SPA fallback instead.
pub fn has_asset_extension(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rsplit_once('.') {
        Some((stem, ext)) => !stem.is_empty() && !ext.is_empty() && !ext.contains('/'),
        None => false,
    }
}

/// Static assets eligible for content fingerprinting and far-future caching.
/// The entry document is deliberately not on this list: it must keep a
/// stable name and be revalidated on every load.
pub fn is_fingerprintable(path: &Path) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    matches!(
        ext.as_deref(),
        Some("css")
            | Some("js")
            | Some("mjs")
            | Some("json")
            | Some("map")
            | Some("svg")
            | Some("png")
            | Some("jpg")
            | Some("jpeg")
            | Some("gif")
            | Some("webp")
            | Some("ico")
            | Some("woff")
            | Some("woff2")
            | Some("ttf")
            | Some("wasm")
    )
}

/// Default allow-list of MIME types worth compressing. Mirrors the usual
/// static-server configuration: text formats only, images and fonts are
/// already compressed.
pub fn default_compress_types() -> Vec<String> {
    [
        "text/plain",
        "text/css",
        "text/javascript",
        "application/javascript",
        "application/json",
        "application/xml",
        "text/xml",
        "image/svg+xml",
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect()
}

/// Whether a response content type is on the compressible allow-list.
/// Matches on the bare MIME type, ignoring any `; charset=` suffix.
pub fn is_compressible(content_type: &str, allow_list: &[String]) -> bool {
    let bare = content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim();
    allow_list.iter().any(|t| t == bare)
}
