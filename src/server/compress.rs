//! Response compression: negotiate a coding from `Accept-Encoding` and
//! encode bodies for MIME types on the compressible allow-list. Brotli is
//! preferred when the client advertises both.

use std::io::Write;

use axum::http::HeaderMap;
use brotli::CompressorWriter;
use flate2::{write::GzEncoder, Compression};

/// Bodies below this size are not worth the encoding overhead.
pub const MIN_COMPRESS_BYTES: usize = 1024;

/// Pick a content coding from the request's `Accept-Encoding` header.
pub fn accepted_encoding(headers: &HeaderMap) -> Option<&'static str> {
    let accept = headers
        .get("accept-encoding")
        .and_then(|v| v.to_str().ok())?;
    if accept.contains("br") {
        Some("br")
    } else if accept.contains("gzip") {
        Some("gzip")
    } else {
        None
    }
}

/// Encode `bytes` with the negotiated coding, returning the body to send
/// and the `Content-Encoding` value to set (None means identity). Encoding
/// failures fall back to the identity body.
pub fn maybe_compress(headers: &HeaderMap, bytes: Vec<u8>) -> (Vec<u8>, Option<&'static str>) {
    if bytes.len() < MIN_COMPRESS_BYTES {
        return (bytes, None);
    }
    match accepted_encoding(headers) {
        Some("gzip") => match gzip_encode(&bytes) {
            Ok(compressed) => (compressed, Some("gzip")),
            Err(_) => (bytes, None),
        },
        Some("br") => match brotli_encode(&bytes) {
            Ok(compressed) => (compressed, Some("br")),
            Err(_) => (bytes, None),
        },
        _ => (bytes, None),
    }
}

fn gzip_encode(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(
        Vec::with_capacity((bytes.len() / 2).max(256)),
        Compression::fast(),
    );
    encoder.write_all(bytes)?;
    encoder.finish()
}

fn brotli_encode(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut compressed = Vec::with_capacity((bytes.len() / 2).max(256));
    {
        let mut writer = CompressorWriter::new(&mut compressed, 4096, 4, 22);
        writer.write_all(bytes)?;
    }
    Ok(compressed)
}
