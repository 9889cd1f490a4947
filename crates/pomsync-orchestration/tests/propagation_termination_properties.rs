//! Property-based tests for propagation over arbitrary, possibly cyclic, graphs
//!
//! Every generated project starts at 1.0.0 and may inherit its version from
//! a parent, so parent chains can loop back on themselves.

use proptest::prelude::*;
use pomsync_orchestration::{MemoryLogger, ProjectUniverse, Version};
use tempfile::TempDir;

#[derive(Debug, Clone)]
struct ProjectShape {
    parent: Option<usize>,
    own_version: bool,
    dependencies: Vec<usize>,
}

/// Strategy for generating a universe of 2 to 6 interlinked projects
fn universe_strategy() -> impl Strategy<Value = Vec<ProjectShape>> {
    (2usize..7).prop_flat_map(|n| {
        prop::collection::vec(
            (
                prop::option::of(1..n),
                any::<bool>(),
                prop::collection::vec(0..n, 0..3),
            ),
            n,
        )
        .prop_map(move |raw| {
            raw.into_iter()
                .enumerate()
                .map(|(i, (offset, own_version, dependencies))| {
                    // offset in 1..n never points a project at itself
                    let parent = offset.map(|offset| (i + offset) % n);
                    ProjectShape {
                        own_version: own_version || parent.is_none(),
                        parent,
                        dependencies,
                    }
                })
                .collect()
        })
    })
}

fn render(index: usize, shape: &ProjectShape) -> String {
    let mut body = String::from("<project>\n");
    if let Some(parent) = shape.parent {
        body.push_str(&format!(
            "  <parent>\n    <artifactId>p{}</artifactId>\n    <version>1.0.0</version>\n  </parent>\n",
            parent
        ));
    }
    body.push_str(&format!("  <artifactId>p{}</artifactId>\n", index));
    if shape.own_version {
        body.push_str("  <version>1.0.0</version>\n");
    }
    if !shape.dependencies.is_empty() {
        body.push_str("  <dependencies>\n");
        for dependency in &shape.dependencies {
            body.push_str(&format!(
                "    <dependency>\n      <artifactId>p{}</artifactId>\n      <version>1.0.0</version>\n    </dependency>\n",
                dependency
            ));
        }
        body.push_str("  </dependencies>\n");
    }
    body.push_str("</project>\n");
    body
}

fn load(shapes: &[ProjectShape]) -> (TempDir, ProjectUniverse, std::sync::Arc<MemoryLogger>) {
    let dir = TempDir::new().unwrap();
    let logger = MemoryLogger::shared();
    let mut universe = ProjectUniverse::new(logger.clone());
    for (index, shape) in shapes.iter().enumerate() {
        let path = dir.path().join(format!("p{}", index));
        std::fs::create_dir_all(&path).unwrap();
        std::fs::write(path.join("pom.xml"), render(index, shape)).unwrap();
        universe.add_project_path(path).unwrap();
    }
    (dir, universe, logger)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// A cascade over any graph finishes and a repeat finds nothing to do
    #[test]
    fn prop_propagation_terminates(shapes in universe_strategy()) {
        let (_dir, mut universe, _) = load(&shapes);
        let old = Version::new(1, 0, 0);
        let new = Version::new(2, 0, 0);

        universe.update_references_for("p0", Some(&old), &new).unwrap();
        prop_assert_eq!(universe.update_references_for("p0", Some(&old), &new).unwrap(), 0);
    }

    /// Direct children of p0 that inherit their version follow it
    #[test]
    fn prop_inherited_versions_follow_parent(shapes in universe_strategy()) {
        let (_dir, mut universe, _) = load(&shapes);
        universe
            .update_references_for("p0", Some(&Version::new(1, 0, 0)), &Version::new(2, 0, 0))
            .unwrap();

        for (index, shape) in shapes.iter().enumerate() {
            let project = universe.lookup(&format!("p{}", index)).unwrap();
            if shape.parent == Some(0) && !shape.own_version {
                prop_assert_eq!(project.version().unwrap(), Version::new(2, 0, 0));
            }
            if shape.own_version {
                prop_assert_eq!(project.own_version().unwrap(), Some(Version::new(1, 0, 0)));
            }
        }
    }

    /// The same graph and change always produce the same event stream
    #[test]
    fn prop_event_stream_is_deterministic(shapes in universe_strategy()) {
        let run = |shapes: &[ProjectShape]| {
            let (_dir, mut universe, logger) = load(shapes);
            universe
                .update_references_for("p0", Some(&Version::new(1, 0, 0)), &Version::new(1, 1, 0))
                .unwrap();
            logger
                .items()
                .into_iter()
                .map(|item| {
                    let tail = item.message.rsplit("pom.xml: ").next().unwrap_or_default().to_string();
                    (item.project, item.original_project, tail)
                })
                .collect::<Vec<_>>()
        };

        prop_assert_eq!(run(&shapes), run(&shapes));
    }
}
