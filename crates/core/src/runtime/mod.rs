//! Tree controller: owns the solution entity and the cached display tree.
//!
//! The cached tree is an immutable [`TreeSnapshot`] behind an
//! `RwLock<Arc<..>>`:
//! - readers clone the `Arc` and never observe a half-merged tree
//! - writers build a complete new arena and swap it in
//!
//! Every operation that touches entities takes the solution lock first, so
//! loads, rebuilds and change handling never interleave.

use crate::config::TreeConfig;
use crate::error::{Result, SolscopeError};
use crate::solution::{SidecarKey, SidecarSettings, SolutionEntity, sidecar};
use crate::store::MemoryStateStore;
use crate::tree::{
    LoadRequest, NodePatch, TreeArena, build_tree, load_children, merge_children, merge_tree_states,
};
use crate::util::resolve_path;
use crate::watcher::{NoopWatchProvider, WatchProvider};
use solscope_api::{DisplayNode, EXPANDED_STATE_KEY, NodeId, NodeKind, StateStore};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

mod lifecycle;
pub mod limiter;
pub mod queue;
mod watch;

pub use limiter::RequestLimiter;
pub use queue::ChangeQueue;

/// One immutable version of the display tree.
#[derive(Debug, Clone)]
pub struct TreeSnapshot {
    arena: TreeArena,
    built_at: Instant,
}

impl TreeSnapshot {
    fn new(arena: TreeArena) -> Self {
        Self {
            arena,
            built_at: Instant::now(),
        }
    }

    pub fn empty() -> Self {
        Self::new(TreeArena::default())
    }

    pub fn arena(&self) -> &TreeArena {
        &self.arena
    }

    pub fn tree(&self) -> Option<DisplayNode> {
        self.arena.to_tree()
    }

    pub fn built_at(&self) -> Instant {
        self.built_at
    }
}

pub struct TreeController {
    solution_path: PathBuf,
    config: Arc<TreeConfig>,

    /// Entity state; held for the whole of any load, rebuild or change.
    solution: Mutex<SolutionEntity>,

    /// Current version of the tree (double Arc for MVCC)
    current: RwLock<Arc<TreeSnapshot>>,

    /// Set by `invalidate`; forces the next read to rebuild
    stale: AtomicBool,
    disposed: AtomicBool,

    queue: ChangeQueue,
    store: Arc<dyn StateStore>,

    /// Cancellation token for background tasks (like the watch loop)
    cancel_token: CancellationToken,
}

pub struct TreeControllerBuilder {
    solution_path: PathBuf,
    config: TreeConfig,
    watcher: Arc<dyn WatchProvider>,
    store: Arc<dyn StateStore>,
}

impl TreeControllerBuilder {
    pub fn new(solution_path: PathBuf) -> Self {
        Self {
            solution_path,
            config: TreeConfig::default(),
            watcher: Arc::new(NoopWatchProvider),
            store: Arc::new(MemoryStateStore::new()),
        }
    }

    pub fn with_config(mut self, config: TreeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_watcher(mut self, watcher: Arc<dyn WatchProvider>) -> Self {
        self.watcher = watcher;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = store;
        self
    }

    /// Loads the solution, builds the first tree and restores the persisted
    /// expansion state.
    pub async fn open(self) -> Result<Arc<TreeController>> {
        // Watch events carry absolute paths; relative ones would never match.
        let solution_path = resolve_path(&self.solution_path);
        if !tokio::fs::try_exists(&solution_path).await.unwrap_or(false) {
            return Err(SolscopeError::NotFound(format!(
                "solution {}",
                solution_path.display()
            )));
        }

        let config = Arc::new(self.config);
        let solution =
            SolutionEntity::load(solution_path.clone(), config.clone(), self.watcher).await;

        let controller = Arc::new(TreeController {
            solution_path,
            config,
            solution: Mutex::new(solution),
            current: RwLock::new(Arc::new(TreeSnapshot::empty())),
            stale: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            queue: ChangeQueue::new(),
            store: self.store,
            cancel_token: CancellationToken::new(),
        });

        controller.rebuild().await?;
        let restored = controller.load_expansion_state().await?;
        controller.restore_expansion(restored).await;
        tracing::info!("Opened solution {}", controller.solution_path.display());
        Ok(controller)
    }
}

impl Drop for TreeController {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

/// Kinds whose children come from a project entity and must be re-read
/// whenever they are shown expanded after a rebuild.
fn entity_backed(kind: &NodeKind) -> bool {
    matches!(
        kind,
        NodeKind::Project { .. }
            | NodeKind::DependenciesContainer
            | NodeKind::DependencyCategory { .. }
            | NodeKind::Folder
    )
}

struct NodeTarget {
    kind: NodeKind,
    path: String,
    project: Option<PathBuf>,
    loaded: bool,
}

impl TreeController {
    pub fn builder(solution_path: PathBuf) -> TreeControllerBuilder {
        TreeControllerBuilder::new(solution_path)
    }

    pub async fn open(
        solution_path: PathBuf,
        config: TreeConfig,
        watcher: Arc<dyn WatchProvider>,
        store: Arc<dyn StateStore>,
    ) -> Result<Arc<Self>> {
        Self::builder(solution_path)
            .with_config(config)
            .with_watcher(watcher)
            .with_store(store)
            .open()
            .await
    }

    pub fn solution_path(&self) -> &Path {
        &self.solution_path
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(SolscopeError::NotFound(format!(
                "solution {} is closed",
                self.solution_path.display()
            )));
        }
        Ok(())
    }

    /// Marks the cached tree stale; the next read rebuilds it.
    pub fn invalidate(&self) {
        self.stale.store(true, Ordering::Release);
    }

    async fn needs_rebuild(&self) -> bool {
        if self.is_disposed() {
            return false;
        }
        if self.stale.load(Ordering::Acquire) {
            return true;
        }
        self.current.read().await.built_at.elapsed() >= self.config.cache_ttl()
    }

    /// The current tree, rebuilt first if it expired or was invalidated.
    pub async fn snapshot(&self) -> Result<Arc<TreeSnapshot>> {
        if self.needs_rebuild().await {
            self.rebuild().await?;
        }
        Ok(self.current.read().await.clone())
    }

    pub async fn root(&self) -> Result<Option<DisplayNode>> {
        Ok(self.snapshot().await?.tree())
    }

    /// Rebuilds the tree from entity state and merges it over the cached one.
    pub async fn rebuild(&self) -> Result<()> {
        self.ensure_open()?;
        let mut solution = self.solution.lock().await;
        self.rebuild_locked(&mut solution).await;
        Ok(())
    }

    pub(crate) async fn rebuild_locked(&self, solution: &mut SolutionEntity) {
        let started = Instant::now();
        let fresh = build_tree(solution).await;
        let cached = self.current.read().await.tree();
        let merged = merge_tree_states(fresh, cached.as_ref());

        let mut arena = TreeArena::from_tree(merged);
        if let Some(root) = arena.root_id().cloned() {
            self.hydrate(&mut arena, solution, &root, false).await;
        }

        *self.current.write().await = Arc::new(TreeSnapshot::new(arena));
        self.stale.store(false, Ordering::Release);
        tracing::debug!(
            "Rebuilt tree for {} in {:?}",
            self.solution_path.display(),
            started.elapsed()
        );
    }

    /// Re-reads children of every expanded entity-backed node below `start`,
    /// top-down, merging each fresh list over what the arena holds.
    pub(crate) async fn hydrate(
        &self,
        arena: &mut TreeArena,
        solution: &mut SolutionEntity,
        start: &NodeId,
        force_start: bool,
    ) {
        let mut queue = VecDeque::from([start.clone()]);
        while let Some(id) = queue.pop_front() {
            let Some(entry) = arena.get(&id) else {
                continue;
            };
            let forced = force_start && &id == start && entry.node.is_loaded;
            if !entry.node.expanded && !forced {
                continue;
            }

            if entity_backed(&entry.node.kind) {
                let target = NodeTarget {
                    kind: entry.node.kind.clone(),
                    path: entry.node.path.clone(),
                    project: entry.project.clone(),
                    loaded: entry.node.is_loaded,
                };
                if entry.node.expanded {
                    sync_entity_expansion(solution, &target, true).await;
                }
                match fetch_children(solution, &id, &target).await {
                    Ok(children) => {
                        let cached = arena.children_of(&id).unwrap_or_default();
                        let merged = merge_children(children, &cached);
                        if let Err(err) = arena.update_node(&id, NodePatch::children(merged)) {
                            tracing::debug!("Failed to hydrate {}: {}", id, err);
                        }
                    }
                    Err(err) => tracing::warn!("Failed to refresh {}: {}", id, err),
                }
            }

            if let Some(children) = arena.get(&id).and_then(|e| e.children.clone()) {
                queue.extend(children);
            }
        }
    }

    /// Applies `update` to a copy of the current arena and swaps it in.
    async fn commit<F>(&self, update: F) -> Result<()>
    where
        F: FnOnce(&mut TreeArena) -> Result<()>,
    {
        let mut current = self.current.write().await;
        let mut arena = current.arena.clone();
        update(&mut arena)?;
        *current = Arc::new(TreeSnapshot {
            arena,
            built_at: current.built_at,
        });
        Ok(())
    }

    async fn target(&self, id: &NodeId) -> Result<NodeTarget> {
        let current = self.current.read().await;
        let entry = current
            .arena
            .get(id)
            .ok_or_else(|| SolscopeError::NotFound(format!("node {id}")))?;
        Ok(NodeTarget {
            kind: entry.node.kind.clone(),
            path: entry.node.path.clone(),
            project: entry.project.clone(),
            loaded: entry.node.is_loaded,
        })
    }

    /// Loads a node's children into the arena if they are not there yet.
    async fn load_node(
        &self,
        solution: &mut SolutionEntity,
        id: &NodeId,
    ) -> Result<Vec<DisplayNode>> {
        let target = self.target(id).await?;
        if target.loaded {
            if let Some(children) = self.current.read().await.arena.children_of(id) {
                return Ok(children);
            }
        }

        self.commit(|arena| arena.update_node(id, NodePatch::loading(true)))
            .await?;
        match fetch_children(solution, id, &target).await {
            Ok(children) => {
                let patch = NodePatch::children(children.clone());
                self.commit(|arena| arena.update_node(id, patch)).await?;
                Ok(children)
            }
            Err(err) => {
                self.commit(|arena| arena.update_node(id, NodePatch::loading(false)))
                    .await?;
                Err(err)
            }
        }
    }

    /// `None` returns the solution root; otherwise the node's children,
    /// loading them on first access.
    pub async fn get_children(&self, id: Option<&NodeId>) -> Result<Vec<DisplayNode>> {
        self.ensure_open()?;
        let snapshot = self.snapshot().await?;
        let Some(id) = id else {
            return Ok(snapshot.tree().into_iter().collect());
        };

        let mut solution = self.solution.lock().await;
        self.load_node(&mut solution, id).await
    }

    pub async fn expand(&self, id: &NodeId) -> Result<()> {
        self.expand_node(id).await?;
        self.persist_expansion().await;
        Ok(())
    }

    async fn expand_node(&self, id: &NodeId) -> Result<()> {
        self.ensure_open()?;
        if self.needs_rebuild().await {
            self.rebuild().await?;
        }

        let mut solution = self.solution.lock().await;
        let target = self.target(id).await?;
        sync_entity_expansion(&mut solution, &target, true).await;
        self.load_node(&mut solution, id).await?;
        self.commit(|arena| arena.update_node(id, NodePatch::expanded(true)))
            .await
    }

    /// Collapses a node. Loaded children stay in place.
    pub async fn collapse(&self, id: &NodeId) -> Result<()> {
        self.ensure_open()?;
        {
            let mut solution = self.solution.lock().await;
            let target = self.target(id).await?;
            sync_entity_expansion(&mut solution, &target, false).await;
            self.commit(|arena| arena.update_node(id, NodePatch::expanded(false)))
                .await?;
        }
        self.persist_expansion().await;
        Ok(())
    }

    async fn persist_expansion(&self) {
        let ids = self.current.read().await.arena.expanded_ids();
        if let Err(err) = self.save_expansion_state(&ids).await {
            tracing::warn!("Failed to persist expansion state: {}", err);
        }
    }

    pub async fn save_expansion_state(&self, ids: &[NodeId]) -> Result<()> {
        let value = serde_json::to_value(ids)?;
        self.store.set(EXPANDED_STATE_KEY, value).await?;
        Ok(())
    }

    pub async fn load_expansion_state(&self) -> Result<Vec<NodeId>> {
        match self.store.get(EXPANDED_STATE_KEY).await? {
            Some(value) => Ok(serde_json::from_value(value).unwrap_or_else(|err| {
                tracing::warn!("Ignoring malformed expansion state: {}", err);
                Vec::new()
            })),
            None => Ok(Vec::new()),
        }
    }

    /// Expands restored ids as their ancestors load; ids that never appear
    /// are dropped.
    pub async fn restore_expansion(&self, ids: Vec<NodeId>) {
        let mut remaining = ids;
        loop {
            let snapshot = self.current.read().await.clone();
            let (ready, waiting): (Vec<_>, Vec<_>) = remaining
                .into_iter()
                .partition(|id| snapshot.arena.contains(id));
            if ready.is_empty() {
                if !waiting.is_empty() {
                    tracing::debug!("{} saved expansion ids no longer exist", waiting.len());
                }
                break;
            }
            for id in &ready {
                if let Err(err) = self.expand_node(id).await {
                    tracing::debug!("Failed to restore expansion of {}: {}", id, err);
                }
            }
            remaining = waiting;
        }
    }

    pub async fn solution_settings(&self) -> SidecarSettings {
        SidecarSettings::read(&self.solution_path).await
    }

    /// Sets or clears the startup project. The GUID must name a loaded project.
    pub async fn set_startup_project(&self, guid: Option<&str>) -> Result<()> {
        let value = match guid {
            Some(guid) => {
                let normalized = sidecar::normalize_guid(guid);
                let solution = self.solution.lock().await;
                if solution.project_by_guid(&normalized).is_none() {
                    return Err(SolscopeError::NotFound(format!("project {normalized}")));
                }
                Some(normalized)
            }
            None => None,
        };
        SidecarSettings::write_key(
            &self.solution_path,
            SidecarKey::StartupProject,
            value.as_deref(),
        )
        .await
    }

    pub async fn set_active_framework(&self, framework: Option<&str>) -> Result<()> {
        SidecarSettings::write_key(&self.solution_path, SidecarKey::ActiveFramework, framework)
            .await
    }

    pub async fn set_framework_filter(&self, filter: Option<&str>) -> Result<()> {
        SidecarSettings::write_key(&self.solution_path, SidecarKey::FrameworkFilter, filter).await
    }
}

/// Mirrors an expand/collapse onto the owning project so its folder watches follow.
async fn sync_entity_expansion(solution: &mut SolutionEntity, target: &NodeTarget, expanded: bool) {
    let Some(project_path) = target.project.as_deref() else {
        return;
    };
    let Some(project) = solution.project_mut(project_path) else {
        return;
    };
    let folder = match target.kind {
        NodeKind::Folder => PathBuf::from(&target.path),
        NodeKind::Project { .. } => project.dir().to_path_buf(),
        _ => return,
    };
    if expanded {
        if let Err(err) = project.expand_folder(&folder).await {
            tracing::debug!("Failed to expand {}: {}", folder.display(), err);
        }
    } else {
        project.collapse_folder(&folder);
    }
}

async fn fetch_children(
    solution: &mut SolutionEntity,
    id: &NodeId,
    target: &NodeTarget,
) -> Result<Vec<DisplayNode>> {
    load_children(
        solution,
        LoadRequest {
            node_id: id,
            kind: &target.kind,
            path: &target.path,
            project: target.project.as_deref(),
        },
    )
    .await
}
