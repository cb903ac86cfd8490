use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

/// Content fingerprint: first 8 hex chars of the sha256 digest. Enough to
/// make any content change produce a new URL, short enough to stay readable.
pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(8);
    for byte in digest.iter().take(4) {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// `assets/app.js` + `3f9c2d1a` -> `assets/app.3f9c2d1a.js`.
/// Extensionless paths get the hash appended as a suffix.
pub fn fingerprinted_name(rel: &Path, hash: &str) -> PathBuf {
    let stem = rel.file_stem().and_then(|s| s.to_str()).unwrap_or("asset");
    let name = match rel.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}.{hash}.{ext}"),
        None => format!("{stem}.{hash}"),
    };
    match rel.parent() {
        Some(parent) if parent.as_os_str().is_empty() => PathBuf::from(name),
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}
