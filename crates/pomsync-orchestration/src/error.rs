//! Error types for version orchestration

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading, editing or propagating project versions
#[derive(Debug, Error)]
pub enum PomSyncError {
    #[error("Malformed version: {0:?}")]
    MalformedVersion(String),

    #[error("Version {0} cannot be incremented without overflowing")]
    VersionOverflow(String),

    #[error("Version of project {0} is inherited from its parent; change the parent instead")]
    VersionInherited(String),

    #[error("Duplicate project id: {0}")]
    DuplicateId(String),

    #[error("Descriptor not found: {}", .0.display())]
    DescriptorNotFound(PathBuf),

    #[error("Descriptor unreadable: {path}: {reason}")]
    DescriptorUnreadable { path: PathBuf, reason: String },

    #[error("Descriptor malformed: {path}: {reason}")]
    DescriptorMalformed { path: PathBuf, reason: String },

    #[error("Propagation exceeded {limit} distinct reference updates")]
    PropagationDepthExceeded { limit: usize },

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl PomSyncError {
    pub(crate) fn unreadable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        PomSyncError::DescriptorUnreadable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn malformed(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        PomSyncError::DescriptorMalformed {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Attaches a descriptor path to errors raised before the path was known
    pub(crate) fn at(self, location: &std::path::Path) -> Self {
        match self {
            PomSyncError::DescriptorUnreadable { path, reason } if path.as_os_str().is_empty() => {
                PomSyncError::unreadable(location, reason)
            }
            PomSyncError::DescriptorMalformed { path, reason } if path.as_os_str().is_empty() => {
                PomSyncError::malformed(location, reason)
            }
            other => other,
        }
    }
}

impl From<config::ConfigError> for PomSyncError {
    fn from(err: config::ConfigError) -> Self {
        PomSyncError::Configuration(err.to_string())
    }
}

/// Result type for orchestration operations
pub type Result<T> = std::result::Result<T, PomSyncError>;
