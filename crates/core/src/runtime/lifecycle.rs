use super::*;
use crate::identity;
use crate::solution::FileRole;
use solscope_api::{ChangeKind, FileChange};

impl TreeController {
    /// Queues a file change and drains the queue unless a drain is already
    /// running, in which case that drain picks the change up.
    pub async fn enqueue(&self, mut change: FileChange) {
        if self.is_disposed() {
            return;
        }
        change.path = resolve_path(&change.path);
        if self.queue.push(change) {
            self.process_queue().await;
        }
    }

    pub fn pending_changes(&self) -> usize {
        self.queue.len()
    }

    async fn process_queue(&self) {
        loop {
            {
                let Some(guard) = self.queue.begin_drain() else {
                    return;
                };
                while let Some(change) = guard.next() {
                    tokio::time::sleep(self.config.settle_delay()).await;
                    self.handle_change(change).await;
                }
            }
            // A push that raced the guard release is drained here.
            if self.queue.is_empty() {
                return;
            }
        }
    }

    async fn handle_change(&self, change: FileChange) {
        if self.is_disposed() {
            return;
        }
        let mut solution = self.solution.lock().await;
        let role = solution.classify(&change.path);
        tracing::debug!("{:?} {} ({:?})", change.kind, change.path.display(), role);

        match role {
            FileRole::SolutionManifest if change.kind == ChangeKind::Deleted => {
                tracing::warn!("Solution file {} was removed", change.path.display());
                solution.dispose();
                drop(solution);
                self.close().await;
            }
            FileRole::SolutionManifest => {
                let summary = solution.reload().await;
                if !summary.is_empty() {
                    tracing::info!(
                        "Solution projects changed: +{} -{}",
                        summary.added.len(),
                        summary.removed.len()
                    );
                }
                self.rebuild_locked(&mut solution).await;
            }
            FileRole::ProjectManifest(path) => {
                let changed = match change.kind {
                    ChangeKind::Created => solution.add_project(&path).await,
                    ChangeKind::Deleted => solution.remove_project(&path),
                    ChangeKind::Changed => match solution.project_mut(&path) {
                        Some(project) => {
                            project.reload_manifest().await;
                            true
                        }
                        None => false,
                    },
                };
                if changed {
                    self.rebuild_locked(&mut solution).await;
                }
            }
            FileRole::ProjectContent { project } => {
                let Some(folder) = change.path.parent() else {
                    return;
                };
                let Some(entity) = solution.project_mut(&project) else {
                    return;
                };
                if !entity.invalidate_folder(folder).await {
                    return;
                }
                if entity.is_loaded(folder) {
                    self.refresh_project(&mut solution, &project).await;
                } else {
                    self.mark_unloaded(&identity::folder_id(&project, folder)).await;
                }
            }
            FileRole::Unrelated => {}
        }
    }

    /// Re-projects one project's subtree into the cached tree.
    async fn refresh_project(&self, solution: &mut SolutionEntity, project: &Path) {
        let id = identity::project_id(project);
        let mut arena = self.current.read().await.arena.clone();
        if !arena.contains(&id) {
            return;
        }
        self.hydrate(&mut arena, solution, &id, true).await;

        let mut current = self.current.write().await;
        let built_at = current.built_at;
        *current = Arc::new(TreeSnapshot { arena, built_at });
    }

    /// Drops a collapsed folder's children so the next expand re-reads them.
    async fn mark_unloaded(&self, id: &NodeId) {
        let result = self
            .commit(|arena| {
                if !arena.contains(id) {
                    return Ok(());
                }
                arena.update_node(id, NodePatch::unloaded())
            })
            .await;
        if let Err(err) = result {
            tracing::debug!("Failed to unload {}: {}", id, err);
        }
    }

    async fn close(&self) {
        self.disposed.store(true, Ordering::Release);
        self.cancel_token.cancel();
        *self.current.write().await = Arc::new(TreeSnapshot::empty());
    }

    /// Releases every watch and stops background tasks.
    pub async fn dispose(&self) {
        if self.is_disposed() {
            return;
        }
        self.solution.lock().await.dispose();
        self.close().await;
    }
}
