//! Project discovery through Maven module declarations

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::Result;
use crate::managers::ProjectUniverse;

/// Fills a universe starting from a root project
///
/// The scanner loads the root project and then every directory named in a
/// `project/modules/module` element, recursively. It does not walk the file
/// system on its own: only declared modules become members.
pub struct WorkspaceScanner {
    workspace_root: PathBuf,
}

impl WorkspaceScanner {
    /// Creates a new WorkspaceScanner for the given root project directory
    ///
    /// # Arguments
    ///
    /// * `workspace_root` - Directory holding the root `pom.xml`
    ///
    /// # Returns
    ///
    /// A new WorkspaceScanner instance
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        let workspace_root = workspace_root.into();
        debug!("Creating WorkspaceScanner for workspace: {:?}", workspace_root);
        Self { workspace_root }
    }

    /// Gets the root project directory
    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Registers the root project and all of its modules in `universe`
    ///
    /// Modules are followed depth first in declaration order. A module
    /// reachable through several aggregators is registered once.
    ///
    /// # Arguments
    ///
    /// * `universe` - Universe receiving the discovered projects
    ///
    /// # Returns
    ///
    /// The ids that were registered, in discovery order. A declared module
    /// without descriptor fails with [`crate::PomSyncError::DescriptorNotFound`].
    pub fn scan_into(&self, universe: &mut ProjectUniverse) -> Result<Vec<String>> {
        info!("Scanning workspace: {:?}", self.workspace_root);

        let mut registered = Vec::new();
        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut pending = vec![self.workspace_root.clone()];

        while let Some(dir) = pending.pop() {
            let key = normalize(&dir);
            if !seen.insert(key) {
                debug!("Module {:?} already scanned", dir);
                continue;
            }

            let id = universe.add_project_path(&dir)?;
            debug!("Discovered project {} in {:?}", id, dir);

            if let Some(project) = universe.lookup(&id) {
                // reversed so that modules are registered in declaration order
                for module in project.modules().iter().rev() {
                    pending.push(dir.join(module));
                }
            }
            registered.push(id);
        }

        info!("Discovered {} projects", registered.len());
        Ok(registered)
    }
}

/// Removes `.` and resolvable `..` components without touching the file system
fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
