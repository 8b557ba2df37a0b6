//! Flat, id-keyed storage of a display tree.
//!
//! All mutation goes through [`TreeArena::update_node`], which keeps the
//! loaded/children invariant: a node that is not loaded owns no children.

use crate::error::{Result, SolscopeError};
use solscope_api::{DisplayNode, NodeId, NodeKind};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ArenaEntry {
    /// The node itself; `children` is always `None` here.
    pub node: DisplayNode,
    pub children: Option<Vec<NodeId>>,
    pub parent: Option<NodeId>,
    /// Manifest path of the owning project, for nodes at or below a project.
    pub project: Option<PathBuf>,
}

/// A partial update of one node.
#[derive(Debug, Default, Clone)]
pub struct NodePatch {
    pub expanded: Option<bool>,
    pub is_loading: Option<bool>,
    pub is_loaded: Option<bool>,
    pub has_children: Option<bool>,
    /// Replaces the node's subtree and marks it loaded.
    pub children: Option<Vec<DisplayNode>>,
}

impl NodePatch {
    pub fn expanded(expanded: bool) -> Self {
        Self {
            expanded: Some(expanded),
            ..Default::default()
        }
    }

    pub fn loading(is_loading: bool) -> Self {
        Self {
            is_loading: Some(is_loading),
            ..Default::default()
        }
    }

    pub fn children(children: Vec<DisplayNode>) -> Self {
        Self {
            is_loading: Some(false),
            children: Some(children),
            ..Default::default()
        }
    }

    pub fn unloaded() -> Self {
        Self {
            is_loaded: Some(false),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TreeArena {
    root: Option<NodeId>,
    entries: HashMap<NodeId, ArenaEntry>,
}

impl TreeArena {
    pub fn from_tree(root: DisplayNode) -> Self {
        let mut arena = Self::default();
        let root_id = root.node_id.clone();
        arena.insert_subtree(root, None, None);
        arena.root = Some(root_id);
        arena
    }

    fn insert_subtree(
        &mut self,
        mut node: DisplayNode,
        parent: Option<NodeId>,
        project: Option<&Path>,
    ) -> Option<NodeId> {
        if self.entries.contains_key(&node.node_id) {
            tracing::debug!("Duplicate node id {} skipped", node.node_id);
            return None;
        }

        let owner: Option<PathBuf> = match node.kind {
            NodeKind::Project { .. } => Some(PathBuf::from(&node.path)),
            _ => project.map(Path::to_path_buf),
        };
        let id = node.node_id.clone();
        let children = node.children.take();
        self.entries.insert(
            id.clone(),
            ArenaEntry {
                node,
                children: None,
                parent,
                project: owner.clone(),
            },
        );

        if let Some(children) = children {
            let ids = children
                .into_iter()
                .filter_map(|child| self.insert_subtree(child, Some(id.clone()), owner.as_deref()))
                .collect();
            if let Some(entry) = self.entries.get_mut(&id) {
                entry.children = Some(ids);
            }
        }
        Some(id)
    }

    fn remove_descendants(&mut self, id: &NodeId) {
        let mut pending: Vec<NodeId> = self
            .entries
            .get_mut(id)
            .and_then(|e| e.children.take())
            .unwrap_or_default();
        while let Some(child) = pending.pop() {
            if let Some(entry) = self.entries.remove(&child) {
                pending.extend(entry.children.unwrap_or_default());
            }
        }
    }

    pub fn root_id(&self) -> Option<&NodeId> {
        self.root.as_ref()
    }

    pub fn get(&self, id: &NodeId) -> Option<&ArenaEntry> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The single mutation entry point.
    pub fn update_node(&mut self, id: &NodeId, patch: NodePatch) -> Result<()> {
        let project = {
            let entry = self
                .entries
                .get_mut(id)
                .ok_or_else(|| SolscopeError::NotFound(format!("node {id}")))?;
            if let Some(expanded) = patch.expanded {
                entry.node.expanded = expanded;
            }
            if let Some(is_loading) = patch.is_loading {
                entry.node.is_loading = is_loading;
            }
            if let Some(has_children) = patch.has_children {
                entry.node.has_children = has_children;
            }
            entry.project.clone()
        };

        if let Some(children) = patch.children {
            self.remove_descendants(id);
            let has_children = !children.is_empty();
            let ids = children
                .into_iter()
                .filter_map(|child| self.insert_subtree(child, Some(id.clone()), project.as_deref()))
                .collect();
            if let Some(entry) = self.entries.get_mut(id) {
                entry.children = Some(ids);
                entry.node.is_loaded = true;
                entry.node.has_children = has_children;
            }
        } else if let Some(is_loaded) = patch.is_loaded {
            if !is_loaded {
                self.remove_descendants(id);
            }
            if let Some(entry) = self.entries.get_mut(id) {
                entry.node.is_loaded = is_loaded;
            }
        }
        Ok(())
    }

    /// Rebuilds the nested subtree rooted at `id`.
    pub fn subtree(&self, id: &NodeId) -> Option<DisplayNode> {
        let entry = self.entries.get(id)?;
        let mut node = entry.node.clone();
        node.children = entry.children.as_ref().map(|ids| {
            ids.iter()
                .filter_map(|child| self.subtree(child))
                .collect()
        });
        Some(node)
    }

    pub fn to_tree(&self) -> Option<DisplayNode> {
        self.subtree(self.root.as_ref()?)
    }

    /// Children of a loaded node as nested subtrees; `None` if it is not loaded.
    pub fn children_of(&self, id: &NodeId) -> Option<Vec<DisplayNode>> {
        let ids = self.entries.get(id)?.children.as_ref()?;
        Some(ids.iter().filter_map(|child| self.subtree(child)).collect())
    }

    /// Expanded node ids, parents before children.
    pub fn expanded_ids(&self) -> Vec<NodeId> {
        let mut ids = Vec::new();
        let mut queue: VecDeque<&NodeId> = self.root.iter().collect();
        while let Some(id) = queue.pop_front() {
            let Some(entry) = self.entries.get(id) else {
                continue;
            };
            if entry.node.expanded {
                ids.push(id.clone());
            }
            if let Some(children) = &entry.children {
                queue.extend(children.iter());
            }
        }
        ids
    }
}
