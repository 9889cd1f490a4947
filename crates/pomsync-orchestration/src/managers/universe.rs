//! Version coordination across all projects of a universe

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::analyzers::Version;
use crate::config::EngineConfig;
use crate::error::{PomSyncError, Result};
use crate::logger::VersioningLogger;
use crate::managers::MavenProject;
use crate::models::{LogStatus, VersioningLoggerItem};

/// A version change announced to the universe: `(id, old, new)`
pub type VersionChange = (String, Option<Version>, Version);

/// One pending announcement and the next project (by sorted position) to visit
struct Frame {
    change: VersionChange,
    next: usize,
}

/// Registry of projects that coordinates version changes between them
///
/// Projects are kept ordered by id, so every cascade visits them in the same
/// order and produces the same event stream for the same inputs.
pub struct ProjectUniverse {
    projects: BTreeMap<String, MavenProject>,
    logger: Arc<dyn VersioningLogger>,
    config: EngineConfig,
}

impl ProjectUniverse {
    /// Creates an empty universe with default settings
    pub fn new(logger: Arc<dyn VersioningLogger>) -> Self {
        Self::with_config(EngineConfig::default(), logger)
    }

    /// Creates an empty universe
    ///
    /// # Arguments
    ///
    /// * `config` - Settings used for loading projects and bounding cascades
    /// * `logger` - Sink shared with every project added later
    pub fn with_config(config: EngineConfig, logger: Arc<dyn VersioningLogger>) -> Self {
        Self {
            projects: BTreeMap::new(),
            logger,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn logger(&self) -> Arc<dyn VersioningLogger> {
        self.logger.clone()
    }

    /// Registers a project
    ///
    /// # Returns
    ///
    /// [`PomSyncError::DuplicateId`] if another project already uses the id
    pub fn register(&mut self, project: MavenProject) -> Result<()> {
        if self.projects.contains_key(project.id()) {
            return Err(PomSyncError::DuplicateId(project.id().to_string()));
        }
        debug!("Registering project {} at {:?}", project.id(), project.path());
        self.projects.insert(project.id().to_string(), project);
        Ok(())
    }

    /// Loads the project in `path` and registers it, returning its id
    pub fn add_project_path(&mut self, path: impl Into<PathBuf>) -> Result<String> {
        let project = MavenProject::load(path, &self.config, self.logger.clone())?;
        let id = project.id().to_string();
        self.register(project)?;
        Ok(id)
    }

    /// Gets the project registered under `id`
    pub fn lookup(&self, id: &str) -> Option<&MavenProject> {
        self.projects.get(id)
    }

    /// Gets the project registered under `id` for direct edits
    ///
    /// Edits made this way are not propagated; use the universe operations
    /// or [`ProjectUniverse::update_references_for`] afterwards.
    pub fn lookup_mut(&mut self, id: &str) -> Option<&mut MavenProject> {
        self.projects.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.projects.contains_key(id)
    }

    /// Registered ids in ascending order, the order every cascade visits them
    pub fn ids(&self) -> Vec<String> {
        self.projects.keys().cloned().collect()
    }

    pub fn projects(&self) -> impl Iterator<Item = &MavenProject> {
        self.projects.values()
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// Rewrites every reference to `id` from `old_version` to `new_version`
    ///
    /// Projects are asked in id order. When a project inherits its version
    /// from a parent that was just rewritten, its own change is announced
    /// right away, before the next project of the current announcement is
    /// visited. Every distinct `(id, old, new)` is announced at most once per
    /// cascade, which keeps cyclic parent/dependency graphs finite.
    ///
    /// # Arguments
    ///
    /// * `id` - Artifact id whose version changed
    /// * `old_version` - Version references must currently carry; `None` matches any
    /// * `new_version` - Version written into matching references
    ///
    /// # Returns
    ///
    /// The number of version elements rewritten, or
    /// [`PomSyncError::PropagationDepthExceeded`] when the cascade grows past
    /// the configured limit.
    pub fn update_references_for(
        &mut self,
        id: &str,
        old_version: Option<&Version>,
        new_version: &Version,
    ) -> Result<usize> {
        if old_version == Some(new_version) {
            return Ok(0);
        }

        let limit = self.config.max_propagation_depth;
        let ids = self.ids();
        let initial: VersionChange = (id.to_string(), old_version.cloned(), new_version.clone());
        info!(
            "Propagating {}: {} -> {}",
            id,
            old_version.map_or_else(|| "*".to_string(), ToString::to_string),
            new_version
        );

        let mut visited: HashSet<VersionChange> = HashSet::new();
        visited.insert(initial.clone());
        let mut stack = vec![Frame {
            change: initial,
            next: 0,
        }];
        let mut modified = 0;

        while let Some(frame) = stack.last_mut() {
            let Some(project_id) = ids.get(frame.next) else {
                stack.pop();
                continue;
            };
            frame.next += 1;
            let (target, old, new) = frame.change.clone();

            let Some(project) = self.projects.get_mut(project_id) else {
                continue;
            };
            let update = project.update_references_for(&target, old.as_ref(), &new)?;
            modified += update.modified;

            if let Some(change) = update.inherited_change {
                if change.1.as_ref() == Some(&change.2) || visited.contains(&change) {
                    debug!("Skipping already announced change of {}", change.0);
                    continue;
                }
                if visited.len() >= limit {
                    warn!("Propagation of {} stopped after {} announcements", id, limit);
                    return Err(PomSyncError::PropagationDepthExceeded { limit });
                }
                debug!("Inherited version of {} changed, propagating", change.0);
                visited.insert(change.clone());
                stack.push(Frame { change, next: 0 });
            }
        }

        info!("Propagation of {} rewrote {} references", id, modified);
        Ok(modified)
    }

    /// Sets the version of project `id` and updates all references to it
    ///
    /// A missing project is reported as a warning event and skipped.
    pub fn set_version(&mut self, id: &str, new_version: Version) -> Result<bool> {
        self.change_version(id, |_| Ok(new_version))
    }

    pub fn increment_major_version_and_snapshot(&mut self, id: &str) -> Result<bool> {
        self.change_version(id, Version::increment_major_and_snapshot)
    }

    pub fn increment_minor_version_and_snapshot(&mut self, id: &str) -> Result<bool> {
        self.change_version(id, Version::increment_minor_and_snapshot)
    }

    pub fn increment_bugfix_version_and_snapshot(&mut self, id: &str) -> Result<bool> {
        self.change_version(id, Version::increment_bugfix_and_snapshot)
    }

    pub fn use_release_version(&mut self, id: &str) -> Result<bool> {
        self.change_version(id, |v| Ok(v.release_version()))
    }

    pub fn use_snapshot_version(&mut self, id: &str) -> Result<bool> {
        self.change_version(id, |v| Ok(v.snapshot_version()))
    }

    /// Switches every project that declares its own version to the release version
    pub fn use_release_versions(&mut self) -> Result<usize> {
        self.change_all_versions(|v| Ok(v.release_version()))
    }

    /// Switches every project that declares its own version to the snapshot version
    pub fn use_snapshot_versions(&mut self) -> Result<usize> {
        self.change_all_versions(|v| Ok(v.snapshot_version()))
    }

    /// Writes `project/properties/<key>` of project `id`
    pub fn set_property(&mut self, id: &str, key: &str, value: &str) -> Result<bool> {
        match self.projects.get_mut(id) {
            Some(project) => {
                project.set_property(key, value)?;
                Ok(true)
            }
            None => {
                self.warn_missing(id);
                Ok(false)
            }
        }
    }

    fn change_version(&mut self, id: &str, derive: impl FnOnce(&Version) -> Result<Version>) -> Result<bool> {
        let Some(project) = self.projects.get_mut(id) else {
            self.warn_missing(id);
            return Ok(false);
        };
        let new_version = derive(&project.version()?)?;
        let old_version = project.set_version(new_version.clone())?;
        self.update_references_for(id, Some(&old_version), &new_version)?;
        Ok(true)
    }

    fn change_all_versions(&mut self, derive: fn(&Version) -> Result<Version>) -> Result<usize> {
        let mut changed = 0;
        for id in self.ids() {
            let inherited = self
                .projects
                .get(&id)
                .map_or(true, MavenProject::is_version_inherited);
            if !inherited && self.change_version(&id, derive)? {
                changed += 1;
            }
        }
        Ok(changed)
    }

    fn warn_missing(&self, id: &str) {
        warn!("No project with id {} in universe", id);
        let item = VersioningLoggerItem::new(id, PathBuf::new(), LogStatus::Warning)
            .append_to_message(&format!("No project with id {} found, skipped", id));
        self.logger.add_item(item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::MemoryLogger;
    use std::path::Path;

    fn write_pom(root: &Path, dir: &str, body: &str) -> PathBuf {
        let path = root.join(dir);
        std::fs::create_dir_all(&path).unwrap();
        std::fs::write(path.join("pom.xml"), format!("<project>\n{}\n</project>\n", body)).unwrap();
        path
    }

    fn universe(root: &Path, poms: &[(&str, &str)]) -> (ProjectUniverse, Arc<MemoryLogger>) {
        let logger = MemoryLogger::shared();
        let mut universe = ProjectUniverse::new(logger.clone());
        for (dir, body) in poms {
            universe.add_project_path(write_pom(root, dir, body)).unwrap();
        }
        (universe, logger)
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let body = "<artifactId>a</artifactId><version>1.0.0</version>";
        let (mut universe, _) = universe(dir.path(), &[("a", body)]);

        let again = write_pom(dir.path(), "a2", body);
        assert!(matches!(
            universe.add_project_path(again),
            Err(PomSyncError::DuplicateId(id)) if id == "a"
        ));
        assert_eq!(universe.len(), 1);
        assert!(universe.contains("a"));
        assert!(universe.lookup("b").is_none());
    }

    #[test]
    fn test_ids_are_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let (universe, _) = universe(
            dir.path(),
            &[
                ("z", "<artifactId>zeta</artifactId><version>1</version>"),
                ("a", "<artifactId>alpha</artifactId><version>1</version>"),
                ("m", "<artifactId>mu</artifactId><version>1</version>"),
            ],
        );
        assert_eq!(universe.ids(), vec!["alpha", "mu", "zeta"]);
    }

    #[test]
    fn test_missing_project_is_a_warning() {
        let dir = tempfile::tempdir().unwrap();
        let (mut universe, logger) = universe(dir.path(), &[]);

        assert!(!universe.use_release_version("ghost").unwrap());
        assert!(!universe.set_property("ghost", "k", "v").unwrap());
        assert_eq!(logger.count(LogStatus::Warning), 2);
    }

    #[test]
    fn test_equal_versions_short_circuit() {
        let dir = tempfile::tempdir().unwrap();
        let (mut universe, logger) = universe(
            dir.path(),
            &[("b", "<artifactId>b</artifactId><version>1.0.0</version><dependencies><dependency><artifactId>x</artifactId><version>1.0.0</version></dependency></dependencies>")],
        );
        let v = Version::new(1, 0, 0);
        assert_eq!(universe.update_references_for("x", Some(&v), &v).unwrap(), 0);
        assert!(logger.is_empty());
    }

    #[test]
    fn test_depth_cap_aborts_long_cascades() {
        let dir = tempfile::tempdir().unwrap();
        let logger = MemoryLogger::shared();
        let config = EngineConfig::default().with_max_propagation_depth(2);
        let mut universe = ProjectUniverse::with_config(config, logger);
        universe
            .add_project_path(write_pom(dir.path(), "p", "<artifactId>p</artifactId><version>1.0.0</version>"))
            .unwrap();
        for (child, parent) in [("c1", "p"), ("c2", "c1"), ("c3", "c2")] {
            let body = format!(
                "<parent><artifactId>{}</artifactId><version>1.0.0</version></parent><artifactId>{}</artifactId>",
                parent, child
            );
            universe.add_project_path(write_pom(dir.path(), child, &body)).unwrap();
        }

        let result = universe.increment_major_version_and_snapshot("p");
        assert!(matches!(result, Err(PomSyncError::PropagationDepthExceeded { limit: 2 })));
    }

    #[test]
    fn test_bulk_release_skips_inherited_projects() {
        let dir = tempfile::tempdir().unwrap();
        let (mut universe, _) = universe(
            dir.path(),
            &[
                ("p", "<artifactId>p</artifactId><version>1.0.0-SNAPSHOT</version>"),
                ("c", "<parent><artifactId>p</artifactId><version>1.0.0-SNAPSHOT</version></parent><artifactId>c</artifactId>"),
                ("d", "<artifactId>d</artifactId><version>3.1.0-SNAPSHOT</version>"),
            ],
        );

        assert_eq!(universe.use_release_versions().unwrap(), 2);
        assert_eq!(universe.lookup("p").unwrap().version().unwrap().to_string(), "1.0.0");
        assert_eq!(universe.lookup("c").unwrap().version().unwrap().to_string(), "1.0.0");
        assert_eq!(universe.lookup("d").unwrap().version().unwrap().to_string(), "3.1.0");
    }
}
