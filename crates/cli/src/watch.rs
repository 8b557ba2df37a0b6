use solscope_core::watcher::NotifyWatchProvider;
use solscope_core::{JsonFileStateStore, TreeConfig, TreeController};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub async fn run(path: PathBuf, config: TreeConfig) -> Result<(), Box<dyn std::error::Error>> {
    let (watcher, rx) = NotifyWatchProvider::new()?;
    let store = JsonFileStateStore::for_solution(&path);
    info!("Persisting expansion state to {}", store.path().display());

    let controller = TreeController::builder(path.clone())
        .with_config(config)
        .with_watcher(Arc::new(watcher))
        .with_store(Arc::new(store))
        .open()
        .await?;

    let projects = controller.get_children(None).await?.len();
    info!("Loaded {} with {} top-level nodes", path.display(), projects);

    let cancel = controller.cancel_token();
    let task = controller.spawn_watch_loop(rx, cancel.clone());
    info!("Press Ctrl+C to stop.");

    tokio::select! {
        res = tokio::signal::ctrl_c() => res?,
        _ = cancel.cancelled() => info!("Solution closed"),
    }

    controller.dispose().await;
    let _ = task.await;
    info!("Watcher stopped.");
    Ok(())
}
