//! File-system watch adapters.
//!
//! The core only ever asks to watch the solution manifest, each project
//! manifest and each explicitly expanded folder. A watch lives exactly as long
//! as the handle returned for it.

use crate::error::Result;
use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use solscope_api::{ChangeKind, FileChange};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchTarget {
    SolutionManifest,
    ProjectManifest,
    Folder,
}

/// Keeps a watch alive; dropping it releases the watch.
pub trait WatchHandle: Send + Sync {
    fn path(&self) -> &Path;
}

pub trait WatchProvider: Send + Sync {
    fn watch(&self, path: &Path, target: WatchTarget) -> Result<Box<dyn WatchHandle>>;
}

/// Provider for hosts without file watching.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopWatchProvider;

struct NoopHandle(PathBuf);

impl WatchHandle for NoopHandle {
    fn path(&self) -> &Path {
        &self.0
    }
}

impl WatchProvider for NoopWatchProvider {
    fn watch(&self, path: &Path, _target: WatchTarget) -> Result<Box<dyn WatchHandle>> {
        Ok(Box::new(NoopHandle(path.to_path_buf())))
    }
}

/// Records which paths are currently watched, for hosts that run their own
/// watch mechanism and need to know what to subscribe to.
#[derive(Default, Clone)]
pub struct RecordingWatchProvider {
    active: Arc<Mutex<Vec<(PathBuf, WatchTarget)>>>,
}

struct RecordingHandle {
    path: PathBuf,
    target: WatchTarget,
    active: Weak<Mutex<Vec<(PathBuf, WatchTarget)>>>,
}

impl WatchHandle for RecordingHandle {
    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RecordingHandle {
    fn drop(&mut self) {
        if let Some(active) = self.active.upgrade() {
            if let Ok(mut active) = active.lock() {
                if let Some(pos) = active
                    .iter()
                    .position(|(p, t)| p == &self.path && *t == self.target)
                {
                    active.remove(pos);
                }
            }
        }
    }
}

impl RecordingWatchProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Vec<(PathBuf, WatchTarget)> {
        self.active.lock().map(|a| a.clone()).unwrap_or_default()
    }

    pub fn is_watching(&self, path: &Path) -> bool {
        self.active().iter().any(|(p, _)| p == path)
    }

    pub fn count(&self, target: WatchTarget) -> usize {
        self.active().iter().filter(|(_, t)| *t == target).count()
    }
}

impl WatchProvider for RecordingWatchProvider {
    fn watch(&self, path: &Path, target: WatchTarget) -> Result<Box<dyn WatchHandle>> {
        if let Ok(mut active) = self.active.lock() {
            active.push((path.to_path_buf(), target));
        }
        Ok(Box::new(RecordingHandle {
            path: path.to_path_buf(),
            target,
            active: Arc::downgrade(&self.active),
        }))
    }
}

struct NotifyState {
    watcher: RecommendedWatcher,
    // Directory -> number of live handles sharing it
    counts: HashMap<PathBuf, usize>,
}

/// `notify`-backed provider.
///
/// Manifests are watched through their parent directory (editors replace
/// files by rename, which a direct file watch would lose), non-recursively.
/// Directory watches are reference counted across handles.
pub struct NotifyWatchProvider {
    state: Arc<Mutex<NotifyState>>,
}

struct NotifyHandle {
    path: PathBuf,
    dir: PathBuf,
    state: Weak<Mutex<NotifyState>>,
}

impl WatchHandle for NotifyHandle {
    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for NotifyHandle {
    fn drop(&mut self) {
        let Some(state) = self.state.upgrade() else {
            return;
        };
        let Ok(mut state) = state.lock() else {
            return;
        };
        let remaining = match state.counts.get_mut(&self.dir) {
            Some(count) => {
                *count = count.saturating_sub(1);
                *count
            }
            None => return,
        };
        if remaining == 0 {
            state.counts.remove(&self.dir);
            if let Err(err) = state.watcher.unwatch(&self.dir) {
                tracing::debug!("Failed to unwatch {}: {}", self.dir.display(), err);
            }
        }
    }
}

impl NotifyWatchProvider {
    /// Creates the provider and the receiving end of its change stream.
    pub fn new() -> Result<(Self, mpsc::UnboundedReceiver<FileChange>)> {
        let (tx, rx) = mpsc::unbounded_channel();

        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    for change in changes_from_event(&event) {
                        let _ = tx.send(change);
                    }
                }
                Err(err) => tracing::warn!("Watch error: {}", err),
            },
            Config::default(),
        )?;

        Ok((
            Self {
                state: Arc::new(Mutex::new(NotifyState {
                    watcher,
                    counts: HashMap::new(),
                })),
            },
            rx,
        ))
    }
}

impl WatchProvider for NotifyWatchProvider {
    fn watch(&self, path: &Path, target: WatchTarget) -> Result<Box<dyn WatchHandle>> {
        let dir = match target {
            WatchTarget::Folder => path.to_path_buf(),
            WatchTarget::SolutionManifest | WatchTarget::ProjectManifest => path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| path.to_path_buf()),
        };

        let mut state = self
            .state
            .lock()
            .map_err(|_| crate::error::SolscopeError::Internal("watch state poisoned".into()))?;
        let count = state.counts.get(&dir).copied().unwrap_or(0);
        if count == 0 {
            state.watcher.watch(&dir, RecursiveMode::NonRecursive)?;
            tracing::debug!("Watching {}", dir.display());
        }
        state.counts.insert(dir.clone(), count + 1);

        Ok(Box::new(NotifyHandle {
            path: path.to_path_buf(),
            dir,
            state: Arc::downgrade(&self.state),
        }))
    }
}

/// Maps a raw notify event onto zero or more normalized changes.
pub fn changes_from_event(event: &Event) -> Vec<FileChange> {
    let kind = match &event.kind {
        EventKind::Create(_) => ChangeKind::Created,
        EventKind::Remove(_) => ChangeKind::Deleted,
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::From => ChangeKind::Deleted,
            RenameMode::To => ChangeKind::Created,
            RenameMode::Both => {
                let mut changes = Vec::new();
                if let Some(from) = event.paths.first() {
                    changes.push(FileChange::deleted(from.clone()));
                }
                if let Some(to) = event.paths.get(1) {
                    changes.push(FileChange::created(to.clone()));
                }
                return changes;
            }
            _ => ChangeKind::Changed,
        },
        EventKind::Modify(_) => ChangeKind::Changed,
        _ => return Vec::new(),
    };

    event
        .paths
        .iter()
        .map(|p| FileChange::new(p.clone(), kind))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange};

    #[test]
    fn test_recording_handle_releases_on_drop() {
        let provider = RecordingWatchProvider::new();
        let handle = provider
            .watch(Path::new("/sln/App/Models"), WatchTarget::Folder)
            .unwrap();
        assert!(provider.is_watching(Path::new("/sln/App/Models")));
        assert_eq!(provider.count(WatchTarget::Folder), 1);

        drop(handle);
        assert!(provider.active().is_empty());
    }

    #[test]
    fn test_changes_from_event() {
        let created = Event::new(EventKind::Create(CreateKind::File)).add_path("/a/b.cs".into());
        assert_eq!(changes_from_event(&created)[0].kind, ChangeKind::Created);

        let modified = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path("/a/b.cs".into());
        assert_eq!(changes_from_event(&modified)[0].kind, ChangeKind::Changed);

        let renamed = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path("/a/old.cs".into())
            .add_path("/a/new.cs".into());
        let changes = changes_from_event(&renamed);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].kind, ChangeKind::Deleted);
        assert_eq!(changes[1].path, PathBuf::from("/a/new.cs"));

        let access = Event::new(EventKind::Access(notify::event::AccessKind::Any));
        assert!(changes_from_event(&access).is_empty());
    }
}
