use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// The reference family a dependency was declared with in a project manifest.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum DependencyKind {
    Package,
    ProjectRef,
    AssemblyRef,
    FrameworkRef,
}

impl DependencyKind {
    /// Position of the kind in the display grouping:
    /// packages, project references, framework references, assemblies.
    pub fn sort_rank(self) -> u8 {
        match self {
            DependencyKind::Package => 0,
            DependencyKind::ProjectRef => 1,
            DependencyKind::FrameworkRef => 2,
            DependencyKind::AssemblyRef => 3,
        }
    }

    pub fn category(self) -> DependencyCategory {
        match self {
            DependencyKind::Package => DependencyCategory::Packages,
            DependencyKind::ProjectRef => DependencyCategory::Projects,
            DependencyKind::AssemblyRef => DependencyCategory::Assemblies,
            DependencyKind::FrameworkRef => DependencyCategory::Frameworks,
        }
    }
}

/// The four containers surfaced under every project's dependency node.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DependencyCategory {
    Packages,
    Projects,
    Assemblies,
    Frameworks,
}

impl DependencyCategory {
    pub const ALL: [DependencyCategory; 4] = [
        DependencyCategory::Packages,
        DependencyCategory::Projects,
        DependencyCategory::Assemblies,
        DependencyCategory::Frameworks,
    ];

    pub fn kind(self) -> DependencyKind {
        match self {
            DependencyCategory::Packages => DependencyKind::Package,
            DependencyCategory::Projects => DependencyKind::ProjectRef,
            DependencyCategory::Assemblies => DependencyKind::AssemblyRef,
            DependencyCategory::Frameworks => DependencyKind::FrameworkRef,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DependencyCategory::Packages => "packages",
            DependencyCategory::Projects => "projects",
            DependencyCategory::Assemblies => "assemblies",
            DependencyCategory::Frameworks => "frameworks",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DependencyCategory::Packages => "Packages",
            DependencyCategory::Projects => "Projects",
            DependencyCategory::Assemblies => "Assemblies",
            DependencyCategory::Frameworks => "Frameworks",
        }
    }
}

impl std::str::FromStr for DependencyCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "packages" => Ok(DependencyCategory::Packages),
            "projects" => Ok(DependencyCategory::Projects),
            "assemblies" => Ok(DependencyCategory::Assemblies),
            "frameworks" => Ok(DependencyCategory::Frameworks),
            other => Err(format!("unknown dependency category: {other}")),
        }
    }
}

/// One dependency extracted from a project manifest.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, JsonSchema)]
pub struct Dependency {
    pub name: String,
    pub version: Option<String>,
    pub kind: DependencyKind,
    pub path: Option<String>,
}

impl Dependency {
    pub fn new(name: impl Into<String>, kind: DependencyKind) -> Self {
        Self {
            name: name.into(),
            version: None,
            kind,
            path: None,
        }
    }

    pub fn with_version(mut self, version: Option<String>) -> Self {
        self.version = version;
        self
    }

    pub fn with_path(mut self, path: Option<String>) -> Self {
        self.path = path;
        self
    }

    /// Display ordering: grouped by kind, then alphabetical by name.
    pub fn display_cmp(&self, other: &Self) -> Ordering {
        self.kind
            .sort_rank()
            .cmp(&other.kind.sort_rank())
            .then_with(|| {
                self.name
                    .to_lowercase()
                    .cmp(&other.name.to_lowercase())
            })
            .then_with(|| self.name.cmp(&other.name))
            .then_with(|| self.version.cmp(&other.version))
    }
}
