#![forbid(unsafe_code)]

//! Version coordination for multi-module Maven project universes
//!
//! A [`ProjectUniverse`] holds every [`MavenProject`] taking part in
//! coordinated versioning. Changing the version of one project rewrites its
//! `pom.xml` and then every reference to it in the other descriptors: direct
//! dependencies, managed dependencies and parent declarations. Projects that
//! inherit their version from a rewritten parent announce their own change in
//! turn, so a single bump cascades through the whole universe.
//!
//! Edits keep the rest of each descriptor intact: whitespace, comments and
//! element order outside the rewritten elements are written back unchanged.
//!
//! ```rust,no_run
//! use pomsync_orchestration::{MemoryLogger, ProjectUniverse, WorkspaceScanner};
//!
//! # fn main() -> pomsync_orchestration::Result<()> {
//! let logger = MemoryLogger::shared();
//! let mut universe = ProjectUniverse::new(logger.clone());
//! WorkspaceScanner::new("path/to/root").scan_into(&mut universe)?;
//!
//! universe.increment_minor_version_and_snapshot("core")?;
//! for item in logger.items() {
//!     println!("{}", item);
//! }
//! # Ok(())
//! # }
//! ```

pub mod analyzers;
pub mod config;
pub mod error;
pub mod logger;
pub mod managers;
pub mod models;

pub use analyzers::{Element, Encoding, Node, Version, WorkspaceScanner, XmlDocument};
pub use config::EngineConfig;
pub use error::{PomSyncError, Result};
pub use logger::{FanOutLogger, MemoryLogger, TracingLogger, VersioningLogger};
pub use managers::{MavenProject, ProjectUniverse, VersionChange};
pub use models::{ArtifactReference, LogStatus, ReferenceKind, ReferenceUpdate, VersioningLoggerItem};
