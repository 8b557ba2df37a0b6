use super::file_tree::{FileKind, FileTreeNode};
use super::nesting::nest_files;
use crate::config::TreeConfig;
use crate::error::{Result, SolscopeError};
use crate::identity;
use crate::parser::read_project_manifest;
use crate::util::{display_cmp, file_name_string, path_string};
use crate::watcher::{WatchHandle, WatchProvider, WatchTarget};
use solscope_api::{Dependency, DependencyCategory, DisplayNode, NodeKind};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Runtime state of one project: dependencies, target frameworks and a lazily
/// listed file tree, plus the watches it owns.
pub struct ProjectEntity {
    path: PathBuf,
    dir: PathBuf,
    name: String,
    guid: Option<String>,
    dependencies: Vec<Dependency>,
    target_frameworks: Vec<String>,
    root: FileTreeNode,
    expanded: HashMap<PathBuf, bool>,
    folder_watches: HashMap<PathBuf, Box<dyn WatchHandle>>,
    manifest_watch: Option<Box<dyn WatchHandle>>,
    watcher: Arc<dyn WatchProvider>,
    config: Arc<TreeConfig>,
}

impl ProjectEntity {
    /// Loads the project manifest. Read or parse failures leave the project
    /// with empty dependency and framework lists.
    pub async fn load(
        path: PathBuf,
        guid: Option<String>,
        config: Arc<TreeConfig>,
        watcher: Arc<dyn WatchProvider>,
    ) -> Self {
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name_string(&path));

        let manifest_watch = match watcher.watch(&path, WatchTarget::ProjectManifest) {
            Ok(handle) => Some(handle),
            Err(err) => {
                tracing::warn!("Failed to watch {}: {}", path.display(), err);
                None
            }
        };

        let mut entity = Self {
            root: FileTreeNode::folder(dir.clone(), true),
            path,
            dir,
            name,
            guid,
            dependencies: Vec::new(),
            target_frameworks: Vec::new(),
            expanded: HashMap::new(),
            folder_watches: HashMap::new(),
            manifest_watch,
            watcher,
            config,
        };
        entity.reload_manifest().await;
        entity
    }

    /// Re-reads dependencies and target frameworks from disk.
    pub async fn reload_manifest(&mut self) {
        let data = read_project_manifest(&self.path, &self.config).await;
        tracing::debug!(
            "Loaded {} dependencies for {}",
            data.dependencies.len(),
            self.path.display()
        );
        self.dependencies = data.dependencies;
        self.target_frameworks = data.target_frameworks;
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn guid(&self) -> Option<&str> {
        self.guid.as_deref()
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    pub fn target_frameworks(&self) -> &[String] {
        &self.target_frameworks
    }

    pub fn root(&self) -> &FileTreeNode {
        &self.root
    }

    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.dir)
    }

    pub fn is_expanded(&self, folder: &Path) -> bool {
        self.expanded.get(folder).copied().unwrap_or(false)
    }

    pub fn is_loaded(&self, folder: &Path) -> bool {
        self.root.find(folder).map(|n| n.is_loaded()).unwrap_or(false)
    }

    /// Folders that currently hold a live watch.
    pub fn watched_folders(&self) -> Vec<PathBuf> {
        let mut folders: Vec<_> = self.folder_watches.keys().cloned().collect();
        folders.sort();
        folders
    }

    /// Lists the immediate entries of `folder`: sub-folders first, then
    /// files with nesting applied. Any I/O failure yields an empty list.
    pub async fn load_folder_children(&self, folder: &Path) -> Vec<FileTreeNode> {
        let mut entries = match tokio::fs::read_dir(folder).await {
            Ok(entries) => entries,
            Err(err) => {
                tracing::debug!("Failed to list {}: {}", folder.display(), err);
                return Vec::new();
            }
        };
        let at_root = folder == self.dir;

        let mut folders = Vec::new();
        let mut files = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(err) => {
                    tracing::debug!("Failed to read entry in {}: {}", folder.display(), err);
                    return Vec::new();
                }
            };
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            let Ok(file_type) = entry.file_type().await else {
                continue;
            };

            if file_type.is_dir() {
                if self.config.is_excluded_dir(&name) {
                    continue;
                }
                folders.push(path);
            } else {
                if path == self.path || (at_root && self.config.is_skipped_root_file(&name)) {
                    continue;
                }
                files.push(path);
            }
        }

        folders.sort_by(|a, b| display_cmp(&file_name_string(a), &file_name_string(b)));
        let mut children = Vec::with_capacity(folders.len() + files.len());
        for folder in folders {
            let hint = has_visible_entries(&folder, &self.config).await;
            children.push(FileTreeNode::folder(folder, hint));
        }
        children.extend(nest_files(files));
        children
    }

    /// Materializes every unloaded ancestor of `folder` so it can be found in the tree.
    async fn ensure_reachable(&mut self, folder: &Path) -> Result<()> {
        if !folder.starts_with(&self.dir) {
            return Err(SolscopeError::NotFound(format!(
                "{} is outside project {}",
                folder.display(),
                self.name
            )));
        }
        let relative = folder.strip_prefix(&self.dir).unwrap_or(folder).to_path_buf();
        let mut current = self.dir.clone();
        let mut components = relative.components().peekable();

        loop {
            let node_loaded = match self.root.find(&current) {
                Some(node) => node.is_loaded(),
                None => {
                    return Err(SolscopeError::NotFound(path_string(folder)));
                }
            };
            let Some(next) = components.next() else {
                return Ok(());
            };
            if !node_loaded {
                let children = self.load_folder_children(&current).await;
                if let Some(node) = self.root.find_mut(&current) {
                    node.set_children(children);
                }
            }
            current.push(next);
        }
    }

    /// Marks `folder` expanded, listing it first if it was never loaded, and
    /// starts watching it. Expanding a loaded folder only flips the flag.
    pub async fn expand_folder(&mut self, folder: &Path) -> Result<()> {
        self.ensure_loaded(folder).await?;
        self.expanded.insert(folder.to_path_buf(), true);

        if !self.folder_watches.contains_key(folder) {
            match self.watcher.watch(folder, WatchTarget::Folder) {
                Ok(handle) => {
                    self.folder_watches.insert(folder.to_path_buf(), handle);
                }
                Err(err) => tracing::warn!("Failed to watch {}: {}", folder.display(), err),
            }
        }
        Ok(())
    }

    /// Lists `folder` (and any unloaded ancestor) without changing its expanded state.
    pub async fn ensure_loaded(&mut self, folder: &Path) -> Result<()> {
        self.ensure_reachable(folder).await?;
        let needs_load = self
            .root
            .find(folder)
            .map(|n| n.is_folder() && !n.is_loaded())
            .unwrap_or(false);
        if needs_load {
            let children = self.load_folder_children(folder).await;
            if let Some(node) = self.root.find_mut(folder) {
                node.set_children(children);
            }
        }
        Ok(())
    }

    /// Marks `folder` collapsed and releases its watch. Loaded children are
    /// kept, and descendants keep their own watches.
    pub fn collapse_folder(&mut self, folder: &Path) {
        self.expanded.insert(folder.to_path_buf(), false);
        if self.folder_watches.remove(folder).is_some() {
            tracing::debug!("Released watch for {}", folder.display());
        }
    }

    /// Re-lists an already loaded folder after a change inside it.
    ///
    /// Expanded folders are re-read immediately, keeping the loaded state of
    /// sub-folders that still exist. Collapsed folders are unloaded so the next
    /// expand re-reads them. Returns `false` when the folder was never loaded.
    pub async fn invalidate_folder(&mut self, folder: &Path) -> bool {
        let Some(node) = self.root.find(folder) else {
            return false;
        };
        if !node.is_loaded() {
            return false;
        }

        if !self.is_expanded(folder) && folder != self.dir {
            if let Some(node) = self.root.find_mut(folder) {
                node.unload();
            }
            return true;
        }

        let mut fresh = self.load_folder_children(folder).await;
        let previous: HashMap<PathBuf, FileTreeNode> = self
            .root
            .find(folder)
            .map(|n| {
                n.children()
                    .iter()
                    .filter(|c| c.is_folder())
                    .map(|c| (c.path.clone(), c.clone()))
                    .collect()
            })
            .unwrap_or_default();

        for child in fresh.iter_mut().filter(|c| c.is_folder()) {
            if let Some(old) = previous.get(&child.path) {
                if old.is_loaded() {
                    *child = old.clone();
                }
            }
        }
        for vanished in previous.keys().filter(|p| !fresh.iter().any(|c| &c.path == *p)) {
            self.forget_subtree(vanished);
        }

        if let Some(node) = self.root.find_mut(folder) {
            node.set_children(fresh);
        }
        true
    }

    fn forget_subtree(&mut self, folder: &Path) {
        self.expanded.retain(|p, _| !p.starts_with(folder));
        self.folder_watches.retain(|p, _| !p.starts_with(folder));
    }

    /// Cheap probe: any dependency, or at least one visible entry at the project root.
    pub async fn has_any_children(&self) -> bool {
        if !self.dependencies.is_empty() {
            return true;
        }
        if self.root.is_loaded() {
            return !self.root.children().is_empty();
        }
        let Ok(mut entries) = tokio::fs::read_dir(&self.dir).await else {
            return false;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = entry.path();
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            if is_dir && self.config.is_excluded_dir(&name) {
                continue;
            }
            if !is_dir && (path == self.path || self.config.is_skipped_root_file(&name)) {
                continue;
            }
            return true;
        }
        false
    }

    /// Display nodes for the project root listing, loading it once if needed.
    pub async fn get_root_children(&mut self) -> Vec<DisplayNode> {
        if !self.root.is_loaded() {
            let children = self.load_folder_children(&self.dir).await;
            self.root.set_children(children);
        }
        self.display_children(&self.root)
    }

    /// Display nodes for a loaded folder; empty if it was never loaded.
    pub fn get_folder_children(&self, folder: &Path) -> Vec<DisplayNode> {
        match self.root.find(folder) {
            Some(node) if node.is_loaded() => self.display_children(node),
            _ => Vec::new(),
        }
    }

    /// The four dependency categories, always present even when empty.
    pub fn get_dependencies(&self) -> Vec<DisplayNode> {
        DependencyCategory::ALL
            .iter()
            .map(|&category| self.category_node(category))
            .collect()
    }

    pub fn get_dependencies_by_category(&self, category: DependencyCategory) -> Vec<DisplayNode> {
        let kind = category.kind();
        self.dependencies
            .iter()
            .filter(|d| d.kind == kind)
            .map(|d| {
                let display_path = format!(
                    "{}#{}/{}@{}",
                    path_string(&self.path),
                    category.as_str(),
                    d.name,
                    d.version.as_deref().unwrap_or("")
                );
                DisplayNode::new(
                    NodeKind::Dependency {
                        kind: d.kind,
                        version: d.version.clone(),
                    },
                    d.name.clone(),
                    display_path,
                    identity::dependency_id(&self.path, category, &d.name, d.version.as_deref()),
                )
                .leaf()
            })
            .collect()
    }

    pub fn dependencies_node(&self) -> DisplayNode {
        DisplayNode::new(
            NodeKind::DependenciesContainer,
            "Dependencies",
            format!("{}#dependencies", path_string(&self.path)),
            identity::dependencies_id(&self.path),
        )
        .lazy(true)
    }

    pub fn category_node(&self, category: DependencyCategory) -> DisplayNode {
        DisplayNode::new(
            NodeKind::DependencyCategory { category },
            category.label(),
            format!("{}#{}", path_string(&self.path), category.as_str()),
            identity::dependency_category_id(&self.path, category),
        )
        .with_children(self.get_dependencies_by_category(category))
    }

    fn display_children(&self, node: &FileTreeNode) -> Vec<DisplayNode> {
        node.children().iter().map(|c| self.display_node(c)).collect()
    }

    fn display_node(&self, node: &FileTreeNode) -> DisplayNode {
        match node.kind {
            FileKind::Folder => {
                let mut display = DisplayNode::new(
                    NodeKind::Folder,
                    node.name.clone(),
                    path_string(&node.path),
                    identity::folder_id(&self.path, &node.path),
                );
                display = if node.is_loaded() {
                    display.with_children(self.display_children(node))
                } else {
                    display.lazy(node.has_children_hint())
                };
                display.expanded = self.is_expanded(&node.path);
                display
            }
            FileKind::File => {
                let display = DisplayNode::new(
                    NodeKind::File,
                    node.name.clone(),
                    path_string(&node.path),
                    identity::file_id(&self.path, &node.path),
                );
                if node.children().is_empty() {
                    display.leaf()
                } else {
                    display.with_children(self.display_children(node))
                }
            }
        }
    }

    /// Releases every watch the project holds.
    pub fn dispose(&mut self) {
        tracing::info!("Disposing project {}", self.path.display());
        self.folder_watches.clear();
        self.manifest_watch = None;
    }
}

async fn has_visible_entries(folder: &Path, config: &TreeConfig) -> bool {
    let Ok(mut entries) = tokio::fs::read_dir(folder).await else {
        return false;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
        if is_dir && config.is_excluded_dir(&entry.file_name().to_string_lossy()) {
            continue;
        }
        return true;
    }
    false
}
