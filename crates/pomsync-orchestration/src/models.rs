//! Data models shared by the orchestration components

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analyzers::Version;

/// Outcome classification of a versioning event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogStatus {
    Success,
    Warning,
    Error,
}

impl fmt::Display for LogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LogStatus::Success => "SUCCESS",
            LogStatus::Warning => "WARNING",
            LogStatus::Error => "ERROR",
        };
        f.write_str(label)
    }
}

/// One entry of the versioning event stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersioningLoggerItem {
    /// Id of the project whose descriptor the event refers to
    pub project: String,

    /// Directory of that project
    pub project_path: PathBuf,

    /// Project whose version change caused this reference update
    pub original_project: Option<String>,

    pub status: LogStatus,

    pub old_version: Option<Version>,

    pub new_version: Option<Version>,

    pub message: String,

    pub timestamp: DateTime<Utc>,
}

impl VersioningLoggerItem {
    pub fn new(project: impl Into<String>, project_path: impl Into<PathBuf>, status: LogStatus) -> Self {
        Self {
            project: project.into(),
            project_path: project_path.into(),
            original_project: None,
            status,
            old_version: None,
            new_version: None,
            message: String::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_original_project(mut self, original_project: Option<String>) -> Self {
        self.original_project = original_project;
        self
    }

    pub fn with_versions(mut self, old_version: Option<Version>, new_version: Option<Version>) -> Self {
        self.old_version = old_version;
        self.new_version = new_version;
        self
    }

    pub fn append_to_message(mut self, text: &str) -> Self {
        self.message.push_str(text);
        self
    }
}

impl fmt::Display for VersioningLoggerItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.status, self.project, self.message)?;
        if let Some(origin) = &self.original_project {
            write!(f, " (from {})", origin)?;
        }
        Ok(())
    }
}

/// Reference to another artifact found in a descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactReference {
    pub artifact_id: String,

    /// Version text as written; may be a property placeholder
    pub version: Option<String>,

    pub kind: ReferenceKind,
}

/// Where in a descriptor a reference was declared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceKind {
    Dependency,
    ManagedDependency,
    Parent,
}

/// Result of asking one project to update its references to another
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceUpdate {
    /// Number of version elements rewritten
    pub modified: usize,

    /// Set when the rewritten parent reference also moved this project's
    /// inherited version; carries `(own id, old, new)` to announce next
    pub inherited_change: Option<(String, Option<Version>, Version)>,
}

impl ReferenceUpdate {
    pub fn is_modified(&self) -> bool {
        self.modified > 0
    }
}
