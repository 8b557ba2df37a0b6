use solscope_api::FileChange;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// FIFO of pending file changes.
///
/// A change already waiting with the same path and kind is dropped on
/// enqueue. Draining is guarded so only one consumer processes the queue
/// at a time.
#[derive(Default)]
pub struct ChangeQueue {
    pending: Mutex<VecDeque<FileChange>>,
    processing: AtomicBool,
}

/// Held by the single active drainer; releases the guard on drop.
pub struct DrainGuard<'a> {
    queue: &'a ChangeQueue,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.queue.processing.store(false, Ordering::Release);
    }
}

impl DrainGuard<'_> {
    pub fn next(&self) -> Option<FileChange> {
        self.queue.pending.lock().ok()?.pop_front()
    }
}

impl ChangeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `change` unless an identical `(path, kind)` is already queued.
    pub fn push(&self, change: FileChange) -> bool {
        let Ok(mut pending) = self.pending.lock() else {
            return false;
        };
        if pending.iter().any(|queued| queued.same_change(&change)) {
            tracing::trace!("Dropping duplicate change for {}", change.path.display());
            return false;
        }
        pending.push_back(change);
        true
    }

    /// Claims the drain; `None` while another drain is running.
    pub fn begin_drain(&self) -> Option<DrainGuard<'_>> {
        self.processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| DrainGuard { queue: self })
    }

    pub fn len(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solscope_api::ChangeKind;

    #[test]
    fn test_dedupes_identical_pending_changes() {
        let queue = ChangeQueue::new();
        assert!(queue.push(FileChange::changed("/s/A.csproj")));
        assert!(!queue.push(FileChange::changed("/s/A.csproj")));
        assert!(queue.push(FileChange::deleted("/s/A.csproj")));
        assert!(queue.push(FileChange::changed("/s/B.csproj")));
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_drains_in_enqueue_order() {
        let queue = ChangeQueue::new();
        queue.push(FileChange::created("/s/a"));
        queue.push(FileChange::changed("/s/b"));
        queue.push(FileChange::deleted("/s/a"));

        let guard = queue.begin_drain().unwrap();
        let mut order = Vec::new();
        while let Some(change) = guard.next() {
            order.push((change.path.to_string_lossy().into_owned(), change.kind));
        }
        assert_eq!(
            order,
            vec![
                ("/s/a".to_string(), ChangeKind::Created),
                ("/s/b".to_string(), ChangeKind::Changed),
                ("/s/a".to_string(), ChangeKind::Deleted),
            ]
        );
    }

    #[test]
    fn test_single_drainer() {
        let queue = ChangeQueue::new();
        let guard = queue.begin_drain();
        assert!(guard.is_some());
        assert!(queue.begin_drain().is_none());
        drop(guard);
        assert!(queue.begin_drain().is_some());
    }

    #[test]
    fn test_change_is_queued_again_after_it_was_taken() {
        let queue = ChangeQueue::new();
        queue.push(FileChange::changed("/s/a"));
        let guard = queue.begin_drain().unwrap();
        assert!(guard.next().is_some());
        assert!(queue.push(FileChange::changed("/s/a")));
    }
}
