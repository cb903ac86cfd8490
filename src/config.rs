//! Site manifest: the `stagehand.toml` file that drives both the build
//! stage and the serving stage.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::assets;
use crate::error::{Result, StagehandError};

/// Default manifest filename looked up in the working directory.
pub const MANIFEST_FILENAME: &str = "stagehand.toml";

/// Default listening port for the runtime stage.
pub const DEFAULT_PORT: u16 = 8080;

/// Default far-future asset lifetime: one year, the conventional ceiling.
pub const DEFAULT_MAX_AGE_SECS: u64 = 31_536_000;

/// Top-level site manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteManifest {
    #[serde(default)]
    pub site: SiteSection,
    #[serde(default)]
    pub build: BuildSection,
    #[serde(default)]
    pub server: ServerSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteSection {
    /// Display name, used only in logs.
    #[serde(default = "default_site_name")]
    pub name: String,
    /// Entry document served at `/` and for SPA fallback routes.
    #[serde(default = "default_entry")]
    pub entry: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildSection {
    /// Directory scanned for source assets.
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,
    /// Directory the compiled output tree is written to.
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,
    /// Paths dropped from the build: either a literal path component
    /// (`node_modules`) or an extension pattern (`*.md`).
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_port")]
    pub port: u16,
    /// `max-age` used for fingerprinted asset responses.
    #[serde(default = "default_max_age")]
    pub max_age_secs: u64,
    /// MIME types eligible for response compression.
    #[serde(default = "assets::default_compress_types")]
    pub compress_types: Vec<String>,
}

fn default_site_name() -> String {
    "site".to_string()
}

fn default_entry() -> PathBuf {
    PathBuf::from("index.html")
}

fn default_source_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("dist")
}

fn default_exclude() -> Vec<String> {
    vec![
        "node_modules".to_string(),
        ".git".to_string(),
        MANIFEST_FILENAME.to_string(),
    ]
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_max_age() -> u64 {
    DEFAULT_MAX_AGE_SECS
}

impl Default for SiteSection {
    fn default() -> Self {
        Self {
            name: default_site_name(),
            entry: default_entry(),
        }
    }
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            out_dir: default_out_dir(),
            exclude: default_exclude(),
        }
    }
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            max_age_secs: default_max_age(),
            compress_types: assets::default_compress_types(),
        }
    }
}

impl Default for SiteManifest {
    fn default() -> Self {
        Self {
            site: SiteSection::default(),
            build: BuildSection::default(),
            server: ServerSection::default(),
        }
    }
}

impl SiteManifest {
    /// Read and validate a manifest file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| StagehandError::io(path, e))?;
        let manifest: SiteManifest =
            toml::from_str(&raw).map_err(|source| StagehandError::ManifestParse {
                path: path.to_path_buf(),
                source,
            })?;
        manifest.validate(path)?;
        Ok(manifest)
    }

    /// Zero-config manifest rooted at `dir`: build `dir` into `dir`-adjacent
    /// `dist`, serve on the default port.
    pub fn default_for(dir: &Path) -> Self {
        let mut manifest = SiteManifest::default();
        manifest.build.source_dir = dir.to_path_buf();
        manifest
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if self.site.entry.is_absolute() {
            return Err(StagehandError::manifest(
                path,
                "site.entry must be a path relative to the source directory",
            ));
        }
        if self.site.entry.extension().and_then(|e| e.to_str()) != Some("html") {
            return Err(StagehandError::manifest(
                path,
                format!(
                    "site.entry must be an .html document, got '{}'",
                    self.site.entry.display()
                ),
            ));
        }
        if self.build.source_dir == self.build.out_dir {
            return Err(StagehandError::manifest(
                path,
                "build.source_dir and build.out_dir must differ",
            ));
        }
        if self.server.port == 0 {
            return Err(StagehandError::manifest(path, "server.port must be nonzero"));
        }
        Ok(())
    }
}

/// Resolve which manifest to use: an explicit `--manifest` path must exist,
/// otherwise `stagehand.toml` in the working directory is picked up when
/// present, and defaults apply when it is not.
pub fn load_or_default(explicit: Option<&Path>) -> Result<SiteManifest> {
    match explicit {
        Some(path) => SiteManifest::load(path),
        None => {
            let candidate = Path::new(MANIFEST_FILENAME);
            if candidate.exists() {
                SiteManifest::load(candidate)
            } else {
                Ok(SiteManifest::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_manifest(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(MANIFEST_FILENAME);
        let mut f = fs::File::create(&path).expect("create manifest");
        f.write_all(contents.as_bytes()).expect("write manifest");
        (dir, path)
    }

    #[test]
    fn defaults_fill_missing_sections() {
        let (_dir, path) = write_manifest("[site]\nname = \"demo\"\n");
        let manifest = SiteManifest::load(&path).expect("load should succeed");
        assert_eq!(manifest.site.name, "demo");
        assert_eq!(manifest.site.entry, PathBuf::from("index.html"));
        assert_eq!(manifest.build.out_dir, PathBuf::from("dist"));
        assert_eq!(manifest.server.port, DEFAULT_PORT);
        assert_eq!(manifest.server.max_age_secs, DEFAULT_MAX_AGE_SECS);
        assert!(manifest
            .build
            .exclude
            .iter()
            .any(|p| p == "node_modules"));
    }

    #[test]
    fn full_manifest_round_trips() {
        let (_dir, path) = write_manifest(
            r#"
            [site]
            name = "landing"
            entry = "home.html"

            [build]
            source_dir = "web"
            out_dir = "public"
            exclude = ["node_modules", "*.md"]

            [server]
            port = 3000
            max_age_secs = 86400
            compress_types = ["text/css"]
            "#,
        );
        let manifest = SiteManifest::load(&path).expect("load should succeed");
        assert_eq!(manifest.site.entry, PathBuf::from("home.html"));
        assert_eq!(manifest.build.source_dir, PathBuf::from("web"));
        assert_eq!(manifest.server.port, 3000);
        assert_eq!(manifest.server.compress_types, vec!["text/css".to_string()]);
    }

    #[test]
    fn rejects_non_html_entry() {
        let (_dir, path) = write_manifest("[site]\nentry = \"main.js\"\n");
        let err = SiteManifest::load(&path).expect_err("should fail validation");
        assert!(err.to_string().contains(".html"));
    }

    #[test]
    fn rejects_source_equal_to_out() {
        let (_dir, path) =
            write_manifest("[build]\nsource_dir = \"web\"\nout_dir = \"web\"\n");
        let err = SiteManifest::load(&path).expect_err("should fail validation");
        assert!(err.to_string().contains("must differ"));
    }

    #[test]
    fn rejects_unknown_keys() {
        let (_dir, path) = write_manifest("[site]\nnmae = \"typo\"\n");
        assert!(SiteManifest::load(&path).is_err());
    }

    #[test]
    fn rejects_port_zero() {
        let (_dir, path) = write_manifest("[server]\nport = 0\n");
        assert!(SiteManifest::load(&path).is_err());
    }

    #[test]
    fn default_for_roots_the_source_dir() {
        let manifest = SiteManifest::default_for(Path::new("web"));
        assert_eq!(manifest.build.source_dir, PathBuf::from("web"));
        assert_eq!(manifest.build.out_dir, PathBuf::from("dist"));
        assert_eq!(manifest.server.port, DEFAULT_PORT);
    }

    #[test]
    fn missing_manifest_falls_back_to_defaults() {
        let manifest = load_or_default(None).expect("defaults");
        // Cwd during tests has no stagehand.toml next to the test binary,
        // but guard on the default shape either way.
        assert_eq!(manifest.site.entry, PathBuf::from("index.html"));
    }
}
