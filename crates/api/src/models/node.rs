use super::dependency::{DependencyCategory, DependencyKind};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable, content-derived identifier of a display node.
///
/// Ids are the only merge and lookup key for tree nodes. The `path` carried
/// by a [`DisplayNode`] is informational and may collide across kinds.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, JsonSchema)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Every kind of node the tree can contain.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, JsonSchema)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NodeKind {
    Solution,
    SolutionFolder {
        guid: String,
    },
    Project {
        guid: Option<String>,
    },
    DependenciesContainer,
    DependencyCategory {
        category: DependencyCategory,
    },
    Dependency {
        #[serde(rename = "dependencyKind")]
        kind: DependencyKind,
        version: Option<String>,
    },
    Folder,
    File,
    SolutionItem,
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Solution => "solution",
            NodeKind::SolutionFolder { .. } => "solutionFolder",
            NodeKind::Project { .. } => "project",
            NodeKind::DependenciesContainer => "dependenciesContainer",
            NodeKind::DependencyCategory { .. } => "dependencyCategory",
            NodeKind::Dependency { .. } => "dependency",
            NodeKind::Folder => "folder",
            NodeKind::File => "file",
            NodeKind::SolutionItem => "solutionItem",
        }
    }

    pub fn is_dependency_category(&self) -> bool {
        matches!(self, NodeKind::DependencyCategory { .. })
    }

    /// Ordering group among siblings at the solution level: solution folders,
    /// then projects, then loose solution items.
    pub fn solution_rank(&self) -> u8 {
        match self {
            NodeKind::SolutionFolder { .. } => 0,
            NodeKind::Project { .. } => 1,
            _ => 2,
        }
    }
}

/// UI-facing tree node.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DisplayNode {
    #[serde(flatten)]
    pub kind: NodeKind,
    pub name: String,
    pub path: String,
    pub node_id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<DisplayNode>>,
    #[serde(default)]
    pub expanded: bool,
    #[serde(default)]
    pub is_loading: bool,
    #[serde(default)]
    pub is_loaded: bool,
    #[serde(default)]
    pub has_children: bool,
}

impl DisplayNode {
    /// A collapsed, unloaded node.
    pub fn new(kind: NodeKind, name: impl Into<String>, path: impl Into<String>, node_id: NodeId) -> Self {
        Self {
            kind,
            name: name.into(),
            path: path.into(),
            node_id,
            children: None,
            expanded: false,
            is_loading: false,
            is_loaded: false,
            has_children: false,
        }
    }

    /// Marks the node as lazily expandable without materializing children.
    pub fn lazy(mut self, has_children: bool) -> Self {
        self.children = None;
        self.is_loaded = false;
        self.has_children = has_children;
        self
    }

    /// Attaches fully resolved children.
    pub fn with_children(mut self, children: Vec<DisplayNode>) -> Self {
        self.has_children = !children.is_empty();
        self.children = Some(children);
        self.is_loaded = true;
        self
    }

    /// A leaf: loaded, with nothing below it.
    pub fn leaf(mut self) -> Self {
        self.children = None;
        self.is_loaded = true;
        self.has_children = false;
        self
    }

    pub fn children(&self) -> &[DisplayNode] {
        self.children.as_deref().unwrap_or(&[])
    }

    pub fn find(&self, id: &NodeId) -> Option<&DisplayNode> {
        if &self.node_id == id {
            return Some(self);
        }
        self.children().iter().find_map(|child| child.find(id))
    }

    pub fn find_by_name(&self, name: &str) -> Option<&DisplayNode> {
        if self.name == name {
            return Some(self);
        }
        self.children()
            .iter()
            .find_map(|child| child.find_by_name(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_with_flat_type_tag() {
        let node = DisplayNode::new(
            NodeKind::DependencyCategory {
                category: DependencyCategory::Packages,
            },
            "Packages",
            "/src/App/App.csproj#packages",
            NodeId::new("cat:1"),
        )
        .with_children(Vec::new());

        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "dependencyCategory");
        assert_eq!(json["category"], "packages");
        assert_eq!(json["nodeId"], "cat:1");
        assert_eq!(json["isLoaded"], true);

        let back: DisplayNode = serde_json::from_value(json).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn test_find() {
        let mut leaf = DisplayNode::new(NodeKind::Folder, "src", "/p/src", NodeId::new("f:src"));
        leaf.expanded = true;
        let mut root = DisplayNode::new(NodeKind::Solution, "App", "/p/App.sln", NodeId::new("sln"))
            .with_children(vec![leaf]);
        root.expanded = true;

        assert!(root.find(&NodeId::new("f:src")).is_some());
        assert!(root.find(&NodeId::new("missing")).is_none());
        assert_eq!(root.find_by_name("src").map(|n| n.expanded), Some(true));
    }
}
