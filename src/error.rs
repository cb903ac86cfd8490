use std::path::PathBuf;

use thiserror::Error;

/// All errors produced by the stagehand pipeline.
#[derive(Debug, Error)]
pub enum StagehandError {
    /// Filesystem failure with the path that caused it.
    #[error("{path}: {source}", path = .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Manifest could not be parsed.
    #[error("manifest {path}: {source}", path = .path.display())]
    ManifestParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Manifest parsed but fails validation.
    #[error("manifest {path}: {message}", path = .path.display())]
    ManifestInvalid { path: PathBuf, message: String },

    /// Build pipeline failure.
    #[error("build: {0}")]
    Build(String),

    /// Server startup or runtime failure.
    #[error("server: {0}")]
    Server(String),

    /// Source-tree watcher failure.
    #[error("watch: {0}")]
    Watch(#[from] notify::Error),
}

pub type Result<T> = std::result::Result<T, StagehandError>;

/// Shorthand constructors.
impl StagehandError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn manifest(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ManifestInvalid {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn build(message: impl Into<String>) -> Self {
        Self::Build(message.into())
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::Server(message.into())
    }
}
