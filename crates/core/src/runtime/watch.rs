use super::*;
use solscope_api::FileChange;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

impl TreeController {
    /// Feeds watch events into the change queue.
    ///
    /// Events are collected until the stream has been quiet for the
    /// configured debounce interval, then enqueued in arrival order. The task
    /// exits when `cancel_token` fires, the stream ends or the controller is
    /// dropped.
    pub fn spawn_watch_loop(
        self: &Arc<Self>,
        mut rx: mpsc::UnboundedReceiver<FileChange>,
        cancel_token: CancellationToken,
    ) -> JoinHandle<()> {
        let controller_weak = Arc::downgrade(self);
        let own_token = self.cancel_token.clone();
        let debounce = self.config.debounce();
        let root = self.solution_path.clone();

        tokio::spawn(async move {
            tracing::info!("Started watching {}", root.display());
            let mut pending: Vec<FileChange> = Vec::new();

            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => break,
                    _ = own_token.cancelled() => break,
                    change = rx.recv() => {
                        match change {
                            Some(change) => pending.push(change),
                            None => break,
                        }
                    }
                    _ = tokio::time::sleep(debounce), if !pending.is_empty() => {
                        let Some(controller) = controller_weak.upgrade() else {
                            break;
                        };
                        tracing::debug!("Processing {} file changes", pending.len());
                        for change in pending.drain(..) {
                            controller.enqueue(change).await;
                        }
                    }
                }
            }
            tracing::info!("Watch loop ended for {}", root.display());
        })
    }
}
