//! Solution entity: the parsed manifest plus one [`ProjectEntity`] per safe
//! project record.

pub mod sidecar;

use crate::config::TreeConfig;
use crate::parser::{ProjectRecord, SolutionManifest, build_project_hierarchy, load_solution};
use crate::project::ProjectEntity;
use crate::watcher::{WatchHandle, WatchProvider, WatchTarget};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use sidecar::{SidecarKey, SidecarSettings, sidecar_path};

/// What a changed path means to the solution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileRole {
    SolutionManifest,
    ProjectManifest(PathBuf),
    /// Any other file, with the project whose directory contains it.
    ProjectContent { project: PathBuf },
    Unrelated,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReloadSummary {
    pub added: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
}

impl ReloadSummary {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

pub struct SolutionEntity {
    path: PathBuf,
    dir: PathBuf,
    manifest: Arc<SolutionManifest>,
    projects: BTreeMap<PathBuf, ProjectEntity>,
    manifest_watch: Option<Box<dyn WatchHandle>>,
    watcher: Arc<dyn WatchProvider>,
    config: Arc<TreeConfig>,
    disposed: bool,
}

/// Records that should become project entities: real project files whose
/// path passed the safety checks.
fn loadable_projects<'a>(
    manifest: &'a SolutionManifest,
    config: &'a TreeConfig,
) -> impl Iterator<Item = (&'a ProjectRecord, &'a Path)> + 'a {
    manifest.projects.iter().filter_map(move |record| {
        if record.is_solution_folder() {
            return None;
        }
        let path = record.absolute_path.as_deref()?;
        config.is_project_file(path).then_some((record, path))
    })
}

impl SolutionEntity {
    /// Parses the solution and loads every safe project. Individual project
    /// failures degrade that project only.
    pub async fn load(
        path: PathBuf,
        config: Arc<TreeConfig>,
        watcher: Arc<dyn WatchProvider>,
    ) -> Self {
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let manifest_watch = match watcher.watch(&path, WatchTarget::SolutionManifest) {
            Ok(handle) => Some(handle),
            Err(err) => {
                tracing::warn!("Failed to watch {}: {}", path.display(), err);
                None
            }
        };

        let mut entity = Self {
            path,
            dir,
            manifest: Arc::new(SolutionManifest::default()),
            projects: BTreeMap::new(),
            manifest_watch,
            watcher,
            config,
            disposed: false,
        };
        entity.reload().await;
        entity
    }

    /// Re-parses the manifest and reconciles the project set. Entities for
    /// projects still referenced keep their file tree but re-read their own
    /// manifest; others are added or disposed.
    pub async fn reload(&mut self) -> ReloadSummary {
        let manifest = load_solution(&self.path, &self.config).await;
        for record in manifest.projects.iter().filter(|r| r.is_rejected()) {
            tracing::warn!(
                "Refusing project {} ({}): {}",
                record.name,
                record.path,
                record.rejection.as_deref().unwrap_or("unsafe path")
            );
        }

        let wanted: HashMap<PathBuf, Option<String>> = loadable_projects(&manifest, &self.config)
            .map(|(record, path)| (path.to_path_buf(), Some(record.guid.clone())))
            .collect();

        let mut summary = ReloadSummary::default();
        let stale: Vec<PathBuf> = self
            .projects
            .keys()
            .filter(|p| !wanted.contains_key(*p))
            .cloned()
            .collect();
        for path in stale {
            if let Some(mut project) = self.projects.remove(&path) {
                project.dispose();
            }
            summary.removed.push(path);
        }

        for (path, guid) in wanted {
            if let Some(project) = self.projects.get_mut(&path) {
                project.reload_manifest().await;
                continue;
            }
            let project =
                ProjectEntity::load(path.clone(), guid, self.config.clone(), self.watcher.clone())
                    .await;
            self.projects.insert(path.clone(), project);
            summary.added.push(path);
        }
        summary.added.sort();

        tracing::debug!(
            "Solution {} reloaded: {} projects (+{} -{})",
            self.path.display(),
            self.projects.len(),
            summary.added.len(),
            summary.removed.len()
        );
        self.manifest = Arc::new(manifest);
        summary
    }

    /// Creates the entity for a project file the manifest references but
    /// which was not loaded yet. Unreferenced project files are ignored.
    pub async fn add_project(&mut self, path: &Path) -> bool {
        if self.projects.contains_key(path) {
            return false;
        }
        let Some(guid) = loadable_projects(&self.manifest, &self.config)
            .find(|(_, p)| *p == path)
            .map(|(record, _)| record.guid.clone())
        else {
            tracing::debug!("Ignoring unreferenced project file {}", path.display());
            return false;
        };

        let project = ProjectEntity::load(
            path.to_path_buf(),
            Some(guid),
            self.config.clone(),
            self.watcher.clone(),
        )
        .await;
        self.projects.insert(path.to_path_buf(), project);
        true
    }

    /// Disposes and drops the entity for a project whose file disappeared.
    pub fn remove_project(&mut self, path: &Path) -> bool {
        match self.projects.remove(path) {
            Some(mut project) => {
                project.dispose();
                true
            }
            None => false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn name(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn manifest(&self) -> Arc<SolutionManifest> {
        self.manifest.clone()
    }

    pub fn hierarchy(&self) -> HashMap<String, Vec<ProjectRecord>> {
        build_project_hierarchy(&self.manifest)
    }

    pub fn projects(&self) -> impl Iterator<Item = &ProjectEntity> {
        self.projects.values()
    }

    pub fn project(&self, path: &Path) -> Option<&ProjectEntity> {
        self.projects.get(path)
    }

    pub fn project_mut(&mut self, path: &Path) -> Option<&mut ProjectEntity> {
        self.projects.get_mut(path)
    }

    pub fn project_by_guid(&self, guid: &str) -> Option<&ProjectEntity> {
        self.projects
            .values()
            .find(|p| p.guid().is_some_and(|g| g.eq_ignore_ascii_case(guid)))
    }

    /// The project whose directory contains `path`; the deepest directory wins.
    pub fn owning_project(&self, path: &Path) -> Option<&Path> {
        self.projects
            .values()
            .filter(|p| p.contains(path))
            .max_by_key(|p| p.dir().components().count())
            .map(ProjectEntity::path)
    }

    pub fn classify(&self, path: &Path) -> FileRole {
        if path == self.path {
            return FileRole::SolutionManifest;
        }
        if self.config.is_project_file(path) {
            return FileRole::ProjectManifest(path.to_path_buf());
        }
        match self.owning_project(path) {
            Some(project) => FileRole::ProjectContent {
                project: project.to_path_buf(),
            },
            None => FileRole::Unrelated,
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Releases the solution watch and disposes every project.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        tracing::info!("Disposing solution {}", self.path.display());
        for project in self.projects.values_mut() {
            project.dispose();
        }
        self.projects.clear();
        self.manifest_watch = None;
        self.disposed = true;
    }
}
