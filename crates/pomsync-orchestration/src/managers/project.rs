//! A single Maven project and the edits that can be applied to its descriptor

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::analyzers::{Element, Version, XmlDocument};
use crate::config::EngineConfig;
use crate::error::{PomSyncError, Result};
use crate::logger::VersioningLogger;
use crate::models::{ArtifactReference, LogStatus, ReferenceKind, ReferenceUpdate, VersioningLoggerItem};

const ARTIFACT_ID: &str = "project/artifactId";
const VERSION: &str = "project/version";
const PARENT_ID: &str = "project/parent/artifactId";
const PARENT_VERSION: &str = "project/parent/version";

/// A project rooted at a directory holding a `pom.xml`
///
/// The descriptor is parsed once when the project is loaded; from then on the
/// in-memory document is the source of truth and every mutation writes it
/// back to disk before returning.
pub struct MavenProject {
    path: PathBuf,
    pom_path: PathBuf,
    document: XmlDocument,
    id: String,
    old_version: Option<Version>,
    logger: Arc<dyn VersioningLogger>,
}

impl MavenProject {
    /// Loads the project in `path` using the configured descriptor name and encoding
    ///
    /// # Arguments
    ///
    /// * `path` - Project directory
    /// * `config` - Supplies the descriptor file name and default encoding
    /// * `logger` - Sink for the events of later mutations
    ///
    /// # Returns
    ///
    /// The loaded project. A missing descriptor gives
    /// [`PomSyncError::DescriptorNotFound`]; a descriptor without artifact id
    /// or any version gives [`PomSyncError::DescriptorMalformed`].
    pub fn load(path: impl Into<PathBuf>, config: &EngineConfig, logger: Arc<dyn VersioningLogger>) -> Result<Self> {
        let path = path.into();
        let pom_path = path.join(&config.descriptor_file_name);
        debug!("Loading project descriptor {:?}", pom_path);

        let bytes = fs::read(&pom_path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => PomSyncError::DescriptorNotFound(pom_path.clone()),
            _ => PomSyncError::unreadable(&pom_path, e),
        })?;
        let document = XmlDocument::from_bytes(&bytes, config.encoding()?).map_err(|e| e.at(&pom_path))?;

        Self::from_document(path, pom_path, document, logger)
    }

    /// Wraps an already parsed descriptor that lives at `pom_path`
    pub fn from_document(
        path: impl Into<PathBuf>,
        pom_path: impl Into<PathBuf>,
        document: XmlDocument,
        logger: Arc<dyn VersioningLogger>,
    ) -> Result<Self> {
        let pom_path = pom_path.into();

        let id = document
            .read_text(ARTIFACT_ID)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| PomSyncError::malformed(&pom_path, "missing project/artifactId"))?;

        if document.element(VERSION).is_none() && document.element(PARENT_VERSION).is_none() {
            return Err(PomSyncError::malformed(
                &pom_path,
                "neither project/version nor project/parent/version is declared",
            ));
        }

        Ok(Self {
            path: path.into(),
            pom_path,
            document,
            id,
            old_version: None,
            logger,
        })
    }

    /// Artifact id, the key of this project within a universe
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pom_path(&self) -> &Path {
        &self.pom_path
    }

    pub fn document(&self) -> &XmlDocument {
        &self.document
    }

    /// Version written directly in this descriptor, if any
    pub fn own_version(&self) -> Result<Option<Version>> {
        self.document.read_text(VERSION).map(|v| Version::parse(&v)).transpose()
    }

    /// Effective version: the own version, otherwise the parent's
    pub fn version(&self) -> Result<Version> {
        let text = self
            .document
            .read_text(VERSION)
            .or_else(|| self.document.read_text(PARENT_VERSION))
            .ok_or_else(|| PomSyncError::malformed(&self.pom_path, "no version declared"))?;
        Version::parse(&text)
    }

    /// True when the descriptor has no `project/version` of its own
    pub fn is_version_inherited(&self) -> bool {
        self.document.element(VERSION).is_none()
    }

    /// Version this project had before its most recent version change
    pub fn old_version(&self) -> Option<&Version> {
        self.old_version.as_ref()
    }

    pub fn parent(&self) -> Option<ArtifactReference> {
        let artifact_id = self.document.read_text(PARENT_ID)?;
        Some(ArtifactReference {
            artifact_id,
            version: self.document.read_text(PARENT_VERSION),
            kind: ReferenceKind::Parent,
        })
    }

    /// Direct and managed dependencies, then the parent, in document order
    pub fn dependencies(&self) -> Vec<ArtifactReference> {
        let root = self.document.root();
        let mut references = Vec::new();
        for (group, kind) in [
            ("dependencies", ReferenceKind::Dependency),
            ("dependencyManagement/dependencies", ReferenceKind::ManagedDependency),
        ] {
            if let Some(dependencies) = root.descendant(group) {
                references.extend(dependencies.elements().filter_map(|dependency| {
                    Some(ArtifactReference {
                        artifact_id: dependency.child("artifactId")?.trimmed_text(),
                        version: dependency.child("version").map(Element::trimmed_text),
                        kind,
                    })
                }));
            }
        }
        references.extend(self.parent());
        references
    }

    /// Sub-module directories listed under `project/modules`
    pub fn modules(&self) -> Vec<String> {
        self.document
            .element("project/modules")
            .map(|modules| {
                modules
                    .elements()
                    .filter(|m| m.name() == "module")
                    .map(Element::trimmed_text)
                    .filter(|m| !m.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn get_property(&self, key: &str) -> Option<String> {
        self.document.read_text(&format!("project/properties/{}", key))
    }

    /// Rewrites `project/version` and returns the previous version
    ///
    /// # Arguments
    ///
    /// * `new_version` - Version to write into this project's descriptor
    ///
    /// # Returns
    ///
    /// The version the project had before the call. Fails with
    /// [`PomSyncError::VersionInherited`] when the version comes from the
    /// parent; the parent has to be changed instead. When the descriptor
    /// cannot be written, the project keeps its previous version in memory
    /// too, so the call can simply be retried.
    pub fn set_version(&mut self, new_version: Version) -> Result<Version> {
        if self.is_version_inherited() {
            return Err(PomSyncError::VersionInherited(self.id.clone()));
        }
        let old_version = self.version()?;

        let mut document = self.document.clone();
        document
            .write_text(VERSION, &new_version.to_string())
            .map_err(|e| e.at(&self.pom_path))?;
        self.commit(document)?;

        self.old_version = Some(old_version.clone());
        self.log(
            LogStatus::Success,
            format!("{}: {} = {}", self.pom_path.display(), VERSION, new_version),
            Some(old_version.clone()),
            Some(new_version),
            None,
        );
        Ok(old_version)
    }

    pub fn increment_major_version_and_snapshot(&mut self) -> Result<Version> {
        let next = self.version()?.increment_major_and_snapshot()?;
        self.set_version(next)
    }

    pub fn increment_minor_version_and_snapshot(&mut self) -> Result<Version> {
        let next = self.version()?.increment_minor_and_snapshot()?;
        self.set_version(next)
    }

    pub fn increment_bugfix_version_and_snapshot(&mut self) -> Result<Version> {
        let next = self.version()?.increment_bugfix_and_snapshot()?;
        self.set_version(next)
    }

    pub fn use_release_version(&mut self) -> Result<Version> {
        let next = self.version()?.release_version();
        self.set_version(next)
    }

    pub fn use_snapshot_version(&mut self) -> Result<Version> {
        let next = self.version()?.snapshot_version();
        self.set_version(next)
    }

    /// Writes `project/properties/<key>`, creating the element if needed
    pub fn set_property(&mut self, key: &str, value: &str) -> Result<()> {
        let path = format!("project/properties/{}", key);
        let mut document = self.document.clone();
        document.write_text(&path, value).map_err(|e| e.at(&self.pom_path))?;
        self.commit(document)?;

        self.log(
            LogStatus::Success,
            format!("{}: {} = {}", self.pom_path.display(), path, value),
            None,
            None,
            None,
        );
        Ok(())
    }

    /// Rewrites every reference to `id` whose version matches `old_version`
    ///
    /// `None` as old version matches any declared version. Direct dependencies
    /// are visited first, then managed dependencies, then the parent. A match
    /// on the parent of a project without its own version means the project's
    /// effective version moved too; the returned update then carries that
    /// change so the caller can announce it.
    pub fn update_references_for(
        &mut self,
        id: &str,
        old_version: Option<&Version>,
        new_version: &Version,
    ) -> Result<ReferenceUpdate> {
        let mut update = ReferenceUpdate::default();
        if old_version == Some(new_version) {
            return Ok(update);
        }

        let new_text = new_version.to_string();
        let mut rewritten: Vec<String> = Vec::new();
        let mut document = self.document.clone();
        let root = document.root_mut();
        let inherited = root.child("version").is_none();

        for group in ["dependencies", "dependencyManagement/dependencies"] {
            if let Some(dependencies) = root.descendant_mut(group) {
                for (index, dependency) in dependencies.elements_mut().enumerate() {
                    if rewrite_reference(dependency, id, old_version, &new_text) {
                        rewritten.push(format!(
                            "project/{}/{}[{}]/version",
                            group,
                            dependency.name(),
                            index + 1
                        ));
                    }
                }
            }
        }

        if let Some(parent) = root.child_mut("parent") {
            if rewrite_reference(parent, id, old_version, &new_text) {
                rewritten.push(PARENT_VERSION.to_string());
                if inherited {
                    // our (inherited) version moved with the parent
                    update.inherited_change =
                        Some((self.id.clone(), old_version.cloned(), new_version.clone()));
                }
            }
        }

        if rewritten.is_empty() {
            return Ok(update);
        }
        self.commit(document)?;

        update.modified = rewritten.len();
        for element_path in rewritten {
            self.log(
                LogStatus::Success,
                format!("{}: {} = {}", self.pom_path.display(), element_path, new_version),
                old_version.cloned(),
                Some(new_version.clone()),
                Some(id.to_string()),
            );
        }
        Ok(update)
    }

    /// Writes `document` to disk, then makes it the in-memory document
    fn commit(&mut self, document: XmlDocument) -> Result<()> {
        let bytes = document.serialize().map_err(|e| e.at(&self.pom_path))?;
        fs::write(&self.pom_path, bytes).map_err(|e| PomSyncError::unreadable(&self.pom_path, e))?;
        debug!("Wrote {:?}", self.pom_path);
        self.document = document;
        Ok(())
    }

    fn log(
        &self,
        status: LogStatus,
        message: String,
        old_version: Option<Version>,
        new_version: Option<Version>,
        original_project: Option<String>,
    ) {
        let item = VersioningLoggerItem::new(self.id.clone(), self.path.clone(), status)
            .with_original_project(original_project)
            .with_versions(old_version, new_version)
            .append_to_message(&message);
        self.logger.add_item(item);
    }
}

/// Replaces the version of `reference` if it points at `id` with a matching version
fn rewrite_reference(reference: &mut Element, id: &str, old_version: Option<&Version>, new_text: &str) -> bool {
    let points_at_id = reference
        .child("artifactId")
        .map_or(false, |artifact| artifact.trimmed_text() == id);
    if !points_at_id {
        return false;
    }
    match reference.child_mut("version") {
        Some(version) if old_version.map_or(true, |old| old.matches_text(&version.text())) => {
            version.set_text(new_text);
            true
        }
        _ => false,
    }
}

impl fmt::Debug for MavenProject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MavenProject")
            .field("path", &self.path)
            .field("id", &self.id)
            .field("old_version", &self.old_version)
            .finish()
    }
}
