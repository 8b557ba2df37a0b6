//! Builds the display tree from solution and project state, and loads the
//! children of any single node on demand.

use crate::error::{Result, SolscopeError};
use crate::identity;
use crate::parser::{ProjectRecord, ROOT_KEY, safety::normalize_manifest_path};
use crate::solution::SolutionEntity;
use crate::util::{file_name_string, path_string};
use solscope_api::{DisplayNode, NodeId, NodeKind};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Sibling order: solution folders, projects, loose items; then name, case-insensitively.
pub fn sibling_cmp(a: &DisplayNode, b: &DisplayNode) -> Ordering {
    a.kind
        .solution_rank()
        .cmp(&b.kind.solution_rank())
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        .then_with(|| a.name.cmp(&b.name))
}

struct LevelBuilder<'a> {
    solution: &'a SolutionEntity,
    hierarchy: HashMap<String, Vec<ProjectRecord>>,
    has_children: HashMap<PathBuf, bool>,
}

impl LevelBuilder<'_> {
    fn level(&self, key: &str, visiting: &mut HashSet<String>) -> Vec<DisplayNode> {
        if !visiting.insert(key.to_string()) {
            tracing::warn!("Ignoring cyclic nesting at {}", key);
            return Vec::new();
        }

        let mut nodes: Vec<DisplayNode> = self
            .hierarchy
            .get(key)
            .map(|records| {
                records
                    .iter()
                    .filter_map(|record| self.record_node(record, visiting))
                    .collect()
            })
            .unwrap_or_default();
        nodes.sort_by(sibling_cmp);

        visiting.remove(key);
        nodes
    }

    fn record_node(&self, record: &ProjectRecord, visiting: &mut HashSet<String>) -> Option<DisplayNode> {
        if record.is_solution_folder() {
            let mut children = self.level(&record.guid, visiting);
            children.extend(self.solution_items(record));
            children.sort_by(sibling_cmp);
            return Some(
                DisplayNode::new(
                    NodeKind::SolutionFolder {
                        guid: record.guid.clone(),
                    },
                    record.name.clone(),
                    record.path.clone(),
                    identity::solution_folder_id(&record.guid),
                )
                .with_children(children),
            );
        }

        let path = record.absolute_path.as_deref()?;
        let project = self.solution.project(path)?;
        let has_children = self.has_children.get(path).copied().unwrap_or(false);
        Some(
            DisplayNode::new(
                NodeKind::Project {
                    guid: project.guid().map(str::to_string),
                },
                record.name.clone(),
                path_string(path),
                identity::project_id(path),
            )
            .lazy(has_children),
        )
    }

    fn solution_items(&self, folder: &ProjectRecord) -> Vec<DisplayNode> {
        folder
            .solution_items()
            .into_iter()
            .map(|item| {
                let path = self.solution.dir().join(normalize_manifest_path(&item));
                DisplayNode::new(
                    NodeKind::SolutionItem,
                    file_name_string(&path),
                    path_string(&path),
                    identity::solution_item_id(&folder.guid, &item),
                )
                .leaf()
            })
            .collect()
    }
}

/// Builds the solution root with solution folders resolved eagerly and
/// projects as lazy nodes carrying only a cheap has-children probe.
pub async fn build_tree(solution: &SolutionEntity) -> DisplayNode {
    let mut has_children = HashMap::new();
    for project in solution.projects() {
        has_children.insert(project.path().to_path_buf(), project.has_any_children().await);
    }

    let builder = LevelBuilder {
        solution,
        hierarchy: solution.hierarchy(),
        has_children,
    };
    let children = builder.level(ROOT_KEY, &mut HashSet::new());

    let mut root = DisplayNode::new(
        NodeKind::Solution,
        solution.name(),
        path_string(solution.path()),
        identity::solution_id(solution.path()),
    )
    .with_children(children);
    root.expanded = true;
    root
}

/// Everything needed to load one node's children.
#[derive(Debug, Clone, Copy)]
pub struct LoadRequest<'a> {
    pub node_id: &'a NodeId,
    pub kind: &'a NodeKind,
    pub path: &'a str,
    /// Manifest path of the project the node belongs to, for nodes below a project.
    pub project: Option<&'a Path>,
}

/// Loads the children of one node. The single place where node kinds
/// decide how their children come into existence.
pub async fn load_children(solution: &mut SolutionEntity, request: LoadRequest<'_>) -> Result<Vec<DisplayNode>> {
    let project_path = || {
        request.project.ok_or_else(|| {
            SolscopeError::NotFound(format!("no owning project for node {}", request.node_id))
        })
    };

    match request.kind {
        NodeKind::Solution | NodeKind::SolutionFolder { .. } => {
            let tree = build_tree(solution).await;
            Ok(tree
                .find(request.node_id)
                .map(|node| node.children().to_vec())
                .unwrap_or_default())
        }
        NodeKind::Project { .. } => {
            let path = project_path()?;
            let project = project_mut(solution, path)?;
            let mut children = vec![project.dependencies_node()];
            children.extend(project.get_root_children().await);
            Ok(children)
        }
        NodeKind::DependenciesContainer => {
            let path = project_path()?;
            Ok(project_mut(solution, path)?.get_dependencies())
        }
        NodeKind::DependencyCategory { category } => {
            let path = project_path()?;
            Ok(project_mut(solution, path)?.get_dependencies_by_category(*category))
        }
        NodeKind::Folder => {
            let path = project_path()?;
            let folder = PathBuf::from(request.path);
            let project = project_mut(solution, path)?;
            project.ensure_loaded(&folder).await?;
            Ok(project.get_folder_children(&folder))
        }
        NodeKind::File | NodeKind::Dependency { .. } | NodeKind::SolutionItem => Ok(Vec::new()),
    }
}

fn project_mut<'a>(
    solution: &'a mut SolutionEntity,
    path: &Path,
) -> Result<&'a mut crate::project::ProjectEntity> {
    solution
        .project_mut(path)
        .ok_or_else(|| SolscopeError::NotFound(format!("project {}", path.display())))
}
