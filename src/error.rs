use std::path::PathBuf;
use thiserror::Error;

/// Failures while reading a single priority file or study plan.
#[derive(Debug, Error)]
pub enum PriorityFileError {
    #[error("priority file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("priority file {} is malformed: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },

    #[error("priority file {} is not valid UTF-8", path.display())]
    NotUtf8 { path: PathBuf },

    #[error("failed to read priority file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PriorityFileError {
    pub(crate) fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        PriorityFileError::Malformed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Maps an I/O failure to the matching variant.
    pub(crate) fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => PriorityFileError::NotFound { path },
            std::io::ErrorKind::InvalidData => PriorityFileError::NotUtf8 { path },
            _ => PriorityFileError::Io { path, source },
        }
    }

    pub fn path(&self) -> &std::path::Path {
        match self {
            PriorityFileError::NotFound { path }
            | PriorityFileError::Malformed { path, .. }
            | PriorityFileError::NotUtf8 { path }
            | PriorityFileError::Io { path, .. } => path,
        }
    }
}

/// Failures while saving or loading a cached priority mapping.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to access priority cache {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("priority cache {} is not valid JSON: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid priority cache key '{key}': expected 2 or 3 '|'-separated parts")]
    InvalidKey { key: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Top-level error for merging priorities from every selected source.
#[derive(Debug, Error)]
pub enum SieveError {
    #[error(transparent)]
    PriorityFile(#[from] PriorityFileError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("collection frequency was selected but no collection source is available")]
    CollectionUnavailable,
}
