use solscope_api::NodeId;
use solscope_core::{TreeConfig, TreeController};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub async fn run(
    path: PathBuf,
    config: TreeConfig,
    expand_all: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let controller = TreeController::builder(path).with_config(config).open().await?;

    if expand_all {
        let count = expand_everything(&controller).await?;
        info!("Expanded {} nodes", count);
    }

    let tree = controller.root().await?;
    println!("{}", serde_json::to_string_pretty(&tree)?);
    controller.dispose().await;
    Ok(())
}

async fn expand_everything(controller: &Arc<TreeController>) -> solscope_core::Result<usize> {
    let mut count = 0;
    let mut queue: VecDeque<NodeId> = controller
        .get_children(None)
        .await?
        .into_iter()
        .filter(|n| n.has_children)
        .map(|n| n.node_id)
        .collect();

    while let Some(id) = queue.pop_front() {
        controller.expand(&id).await?;
        count += 1;
        for child in controller.get_children(Some(&id)).await? {
            if child.has_children {
                queue.push_back(child.node_id);
            }
        }
    }
    Ok(count)
}
