//! stagehand — build and serve pipeline for single-page front-ends.
//!
//! Two stages, mirroring a conventional two-stage deployment:
//!
//! - **build**: scan a source tree, fingerprint static assets, rewrite
//!   references, and emit a deterministic output directory.
//! - **serve**: a static-file server over that output with SPA fallback,
//!   far-future caching for fingerprinted assets, fixed security headers,
//!   and negotiated gzip/brotli compression.

pub mod assets;
pub mod build;
pub mod config;
pub mod error;
pub mod server;

pub use config::SiteManifest;
pub use error::{Result, StagehandError};
