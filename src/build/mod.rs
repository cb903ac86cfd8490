//! The build stage: scan the source tree, drop excluded paths, fingerprint
//! static assets, rewrite references, and emit a self-contained output tree.
//!
//! The pipeline is deterministic: identical inputs produce byte-identical
//! output trees with identical fingerprints, so rebuilding is idempotent.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::assets;
use crate::config::SiteManifest;
use crate::error::{Result, StagehandError};

mod fingerprint;
mod rewrite;

pub use fingerprint::{fingerprint_bytes, fingerprinted_name};
pub use rewrite::rewrite_references;

/// How a planned file is materialized into the output tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Copied verbatim (fingerprinted or not).
    Copy,
    /// Stylesheet: references rewritten, then fingerprinted.
    Stylesheet,
    /// Markup: references rewritten, name kept stable.
    Markup,
}

/// One file the build will produce.
#[derive(Debug, Clone)]
pub struct PlannedFile {
    /// Path relative to the source directory.
    pub rel: PathBuf,
    /// Path relative to the output directory.
    pub out_rel: PathBuf,
    /// Content hash, present for fingerprinted assets.
    pub fingerprint: Option<String>,
    pub kind: FileKind,
}

/// The full set of outputs a build would write, computed without touching
/// the output directory. `stagehand check` stops here.
#[derive(Debug)]
pub struct BuildPlan {
    pub files: Vec<PlannedFile>,
    /// Original relative path (forward slashes) -> fingerprinted path.
    pub renames: BTreeMap<String, String>,
    /// Whether the entry document was found in the source tree.
    pub entry_present: bool,
    /// Exact rewritten bytes each stylesheet was hashed over. These are
    /// written verbatim so a fingerprinted URL always serves the content
    /// its hash was computed from.
    stylesheet_bodies: BTreeMap<PathBuf, Vec<u8>>,
}

/// Summary of an executed build.
#[derive(Debug)]
pub struct BuildReport {
    pub written: Vec<PlannedFile>,
    pub total_bytes: u64,
}

/// Plan and execute a build in one step.
pub fn build_site(manifest: &SiteManifest, strict: bool) -> Result<BuildReport> {
    let plan = plan_build(manifest, strict)?;
    execute_plan(manifest, &plan)
}

/// Scan the source tree and decide every output name, in three passes:
/// leaf assets are hashed first, stylesheets are rewritten against those
/// renames and then hashed themselves, and markup picks up the final map.
pub fn plan_build(manifest: &SiteManifest, strict: bool) -> Result<BuildPlan> {
    let source_dir = &manifest.build.source_dir;
    if !source_dir.is_dir() {
        return Err(StagehandError::build(format!(
            "source directory '{}' does not exist",
            source_dir.display()
        )));
    }

    let rels = collect_source_files(manifest)?;
    if rels.is_empty() {
        return Err(StagehandError::build(format!(
            "nothing to build: '{}' contains no files after exclusions",
            source_dir.display()
        )));
    }

    let entry_present = rels.iter().any(|r| r == &manifest.site.entry);
    if !entry_present {
        let message = format!(
            "entry document '{}' not found under '{}'",
            manifest.site.entry.display(),
            source_dir.display()
        );
        if strict {
            return Err(StagehandError::build(message));
        }
        warn!("{message}");
    }

    let mut renames: BTreeMap<String, String> = BTreeMap::new();
    let mut files: Vec<PlannedFile> = Vec::with_capacity(rels.len());
    let mut stylesheets: Vec<PathBuf> = Vec::new();
    let mut markup: Vec<PathBuf> = Vec::new();

    // Pass 1: leaf assets (everything fingerprintable except stylesheets,
    // which may themselves reference renamed assets).
    for rel in &rels {
        let is_css = rel.extension().and_then(|e| e.to_str()) == Some("css");
        let is_html = matches!(
            rel.extension().and_then(|e| e.to_str()),
            Some("html") | Some("htm")
        );
        if is_css {
            stylesheets.push(rel.clone());
        } else if is_html {
            markup.push(rel.clone());
        } else if assets::is_fingerprintable(rel) {
            let bytes = read_source(manifest, rel)?;
            let hash = fingerprint_bytes(&bytes);
            let out_rel = fingerprinted_name(rel, &hash);
            renames.insert(rel_key(rel), rel_key(&out_rel));
            files.push(PlannedFile {
                rel: rel.clone(),
                out_rel,
                fingerprint: Some(hash),
                kind: FileKind::Copy,
            });
        } else {
            files.push(PlannedFile {
                rel: rel.clone(),
                out_rel: rel.clone(),
                fingerprint: None,
                kind: FileKind::Copy,
            });
        }
    }

    // Pass 2: stylesheets are fingerprinted over their rewritten content so
    // that a renamed dependency busts the stylesheet's own cache entry.
    // Stylesheets can import each other, so iterate until the rename map
    // stops changing; the bytes hashed here are the bytes written later.
    let mut css_sources: BTreeMap<PathBuf, String> = BTreeMap::new();
    for rel in &stylesheets {
        let bytes = read_source(manifest, rel)?;
        css_sources.insert(rel.clone(), String::from_utf8_lossy(&bytes).into_owned());
    }
    let mut stylesheet_bodies: BTreeMap<PathBuf, Vec<u8>> = BTreeMap::new();
    let mut css_named: BTreeMap<PathBuf, (PathBuf, String)> = BTreeMap::new();
    let mut rounds = 0usize;
    loop {
        rounds += 1;
        let mut changed = false;
        for (rel, text) in &css_sources {
            let rewritten = rewrite_references(text, &renames);
            let hash = fingerprint_bytes(rewritten.as_bytes());
            let out_rel = fingerprinted_name(rel, &hash);
            let key = rel_key(rel);
            let value = rel_key(&out_rel);
            if renames.get(&key) != Some(&value) {
                renames.insert(key, value);
                changed = true;
            }
            stylesheet_bodies.insert(rel.clone(), rewritten.into_bytes());
            css_named.insert(rel.clone(), (out_rel, hash));
        }
        if !changed {
            break;
        }
        if rounds > stylesheets.len() {
            // A cyclic @import chain can never settle on stable hashes.
            warn!("stylesheet fingerprints did not converge after {rounds} rounds; cyclic @import?");
            break;
        }
    }
    for (rel, (out_rel, hash)) in css_named {
        files.push(PlannedFile {
            rel,
            out_rel,
            fingerprint: Some(hash),
            kind: FileKind::Stylesheet,
        });
    }

    // Pass 3: markup keeps its name (the server must always find the entry
    // document) and sees the complete rename map.
    for rel in &markup {
        files.push(PlannedFile {
            rel: rel.clone(),
            out_rel: rel.clone(),
            fingerprint: None,
            kind: FileKind::Markup,
        });
    }

    files.sort_by(|a, b| a.rel.cmp(&b.rel));
    Ok(BuildPlan {
        files,
        renames,
        entry_present,
        stylesheet_bodies,
    })
}

/// Write the planned output tree. The output directory is cleared first so
/// it contains exactly this build's files.
pub fn execute_plan(manifest: &SiteManifest, plan: &BuildPlan) -> Result<BuildReport> {
    let out_dir = &manifest.build.out_dir;
    if out_dir.exists() {
        fs::remove_dir_all(out_dir).map_err(|e| StagehandError::io(out_dir, e))?;
    }
    fs::create_dir_all(out_dir).map_err(|e| StagehandError::io(out_dir, e))?;

    let mut total_bytes = 0u64;
    for file in &plan.files {
        let out_path = out_dir.join(&file.out_rel);
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| StagehandError::io(parent, e))?;
        }

        let output: Vec<u8> = match file.kind {
            FileKind::Copy => read_source(manifest, &file.rel)?,
            // The exact bytes the fingerprint was computed over.
            FileKind::Stylesheet => match plan.stylesheet_bodies.get(&file.rel) {
                Some(bytes) => bytes.clone(),
                None => {
                    return Err(StagehandError::build(format!(
                        "no planned content for stylesheet '{}'",
                        file.rel.display()
                    )))
                }
            },
            FileKind::Markup => {
                let bytes = read_source(manifest, &file.rel)?;
                let text = String::from_utf8_lossy(&bytes);
                rewrite_references(&text, &plan.renames).into_bytes()
            }
        };

        fs::write(&out_path, &output).map_err(|e| StagehandError::io(&out_path, e))?;
        total_bytes += output.len() as u64;
        debug!(
            source = %file.rel.display(),
            output = %file.out_rel.display(),
            bytes = output.len(),
            "wrote"
        );
    }

    info!(
        files = plan.files.len(),
        total_bytes,
        out_dir = %out_dir.display(),
        "build complete"
    );
    Ok(BuildReport {
        written: plan.files.clone(),
        total_bytes,
    })
}

/// Remove the output directory entirely.
pub fn clean(manifest: &SiteManifest) -> Result<()> {
    let out_dir = &manifest.build.out_dir;
    if out_dir.exists() {
        fs::remove_dir_all(out_dir).map_err(|e| StagehandError::io(out_dir, e))?;
    }
    Ok(())
}

// ── Source scanning ───────────────────────────────────────────────────

/// Walk the source tree in a stable order, skipping excluded paths and the
/// output directory (which may be nested inside the source).
fn collect_source_files(manifest: &SiteManifest) -> Result<Vec<PathBuf>> {
    let source_dir = &manifest.build.source_dir;
    let out_abs = manifest
        .build
        .out_dir
        .canonicalize()
        .unwrap_or_else(|_| manifest.build.out_dir.clone());

    let mut rels = Vec::new();
    for entry in WalkDir::new(source_dir).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            StagehandError::build(format!("cannot walk '{}': {e}", source_dir.display()))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let abs = entry
            .path()
            .canonicalize()
            .unwrap_or_else(|_| entry.path().to_path_buf());
        if abs.starts_with(&out_abs) {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(source_dir)
            .map_err(|_| StagehandError::build("walked outside the source directory"))?
            .to_path_buf();
        if is_excluded(&rel, &manifest.build.exclude) {
            debug!(path = %rel.display(), "excluded");
            continue;
        }
        rels.push(rel);
    }
    rels.sort();
    Ok(rels)
}

/// Exclusion patterns: `*.ext` matches by extension, anything else matches
/// a whole path component anywhere in the relative path.
fn is_excluded(rel: &Path, patterns: &[String]) -> bool {
    for pattern in patterns {
        if let Some(ext) = pattern.strip_prefix("*.") {
            if rel
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(ext))
            {
                return true;
            }
        } else if rel
            .components()
            .any(|c| matches!(c, Component::Normal(name) if name.to_str() == Some(pattern)))
        {
            return true;
        }
    }
    false
}

fn read_source(manifest: &SiteManifest, rel: &Path) -> Result<Vec<u8>> {
    let path = manifest.build.source_dir.join(rel);
    fs::read(&path).map_err(|e| StagehandError::io(&path, e))
}

/// Stable forward-slash key for the rename map, independent of host OS.
fn rel_key(rel: &Path) -> String {
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(name) => name.to_str(),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
