#![allow(dead_code)]

use solscope_api::{DependencyCategory, NodeId, NodeKind};
use solscope_core::identity;
use solscope_core::watcher::RecordingWatchProvider;
use solscope_core::{MemoryStateStore, TreeConfig, TreeController};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub const SOLUTION_NAME: &str = "Demo";

/// A solution on disk plus the collaborators a controller needs.
pub struct Workspace {
    pub dir: TempDir,
    root: PathBuf,
    pub watcher: RecordingWatchProvider,
    pub store: Arc<MemoryStateStore>,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        // The controller works on canonical paths.
        let root = dir.path().canonicalize().unwrap();
        Self {
            dir,
            root,
            watcher: RecordingWatchProvider::new(),
            store: Arc::new(MemoryStateStore::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn write(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.root().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        path
    }

    pub fn solution_path(&self) -> PathBuf {
        self.root().join(format!("{SOLUTION_NAME}.sln"))
    }

    pub fn project_path(&self, name: &str) -> PathBuf {
        self.root().join(name).join(format!("{name}.csproj"))
    }

    pub fn write_solution(&self, projects: &[&str]) -> PathBuf {
        self.write(&format!("{SOLUTION_NAME}.sln"), &solution(projects))
    }

    pub fn write_project(&self, name: &str, packages: &[(&str, &str)]) -> PathBuf {
        self.write(&format!("{name}/{name}.csproj"), &csproj(packages))
    }

    pub async fn open(&self) -> Arc<TreeController> {
        self.open_with(config()).await
    }

    pub async fn open_with(&self, config: TreeConfig) -> Arc<TreeController> {
        TreeController::open(
            self.solution_path(),
            config,
            Arc::new(self.watcher.clone()),
            self.store.clone(),
        )
        .await
        .unwrap()
    }
}

pub fn config() -> TreeConfig {
    TreeConfig {
        settle_delay_ms: 0,
        ..TreeConfig::default()
    }
}

pub fn guid(index: usize) -> String {
    format!("{{00000000-0000-0000-0000-{index:012X}}}")
}

pub fn solution(projects: &[&str]) -> String {
    let mut text = String::from(
        "Microsoft Visual Studio Solution File, Format Version 12.00\n# Visual Studio Version 17\n",
    );
    for (index, name) in projects.iter().enumerate() {
        text.push_str(&format!(
            "Project(\"{{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}}\") = \"{name}\", \"{name}\\{name}.csproj\", \"{}\"\nEndProject\n",
            guid(index + 1)
        ));
    }
    text.push_str("Global\nEndGlobal\n");
    text
}

pub fn csproj(packages: &[(&str, &str)]) -> String {
    let mut text = String::from(
        "<Project Sdk=\"Microsoft.NET.Sdk\">\n  <PropertyGroup>\n    <TargetFramework>net8.0</TargetFramework>\n  </PropertyGroup>\n  <ItemGroup>\n",
    );
    for (name, version) in packages {
        text.push_str(&format!(
            "    <PackageReference Include=\"{name}\" Version=\"{version}\" />\n"
        ));
    }
    text.push_str("  </ItemGroup>\n</Project>\n");
    text
}

pub fn packages_id(project: &Path) -> NodeId {
    identity::dependency_category_id(project, DependencyCategory::Packages)
}

pub async fn expand_packages(controller: &TreeController, project: &Path) {
    controller.expand(&identity::project_id(project)).await.unwrap();
    controller
        .expand(&identity::dependencies_id(project))
        .await
        .unwrap();
    controller.expand(&packages_id(project)).await.unwrap();
}

/// Versions listed under a project's Packages node, loading it if needed.
pub async fn package_versions(controller: &TreeController, project: &Path) -> Vec<Option<String>> {
    controller
        .get_children(Some(&packages_id(project)))
        .await
        .unwrap()
        .into_iter()
        .filter_map(|node| match node.kind {
            NodeKind::Dependency { version, .. } => Some(version),
            _ => None,
        })
        .collect()
}
