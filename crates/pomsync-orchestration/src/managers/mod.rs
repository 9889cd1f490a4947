//! Manager components for projects and their universe

pub mod project;
pub mod universe;

pub use project::MavenProject;
pub use universe::{ProjectUniverse, VersionChange};
