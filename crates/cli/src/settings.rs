use serde_json::json;
use solscope_core::{TreeConfig, TreeController};
use std::path::PathBuf;

pub struct Changes {
    pub startup: Option<String>,
    pub framework: Option<String>,
    pub filter: Option<String>,
}

/// `Some("")` clears a key, `None` leaves it untouched.
fn value(arg: &Option<String>) -> Option<Option<&str>> {
    arg.as_deref().map(|v| if v.is_empty() { None } else { Some(v) })
}

pub async fn run(
    path: PathBuf,
    config: TreeConfig,
    changes: Changes,
) -> Result<(), Box<dyn std::error::Error>> {
    let controller = TreeController::builder(path).with_config(config).open().await?;

    if let Some(guid) = value(&changes.startup) {
        controller.set_startup_project(guid).await?;
    }
    if let Some(framework) = value(&changes.framework) {
        controller.set_active_framework(framework).await?;
    }
    if let Some(filter) = value(&changes.filter) {
        controller.set_framework_filter(filter).await?;
    }

    let settings = controller.solution_settings().await;
    let output = json!({
        "activeFramework": settings.active_framework,
        "frameworkFilter": settings.framework_filter,
        "startupProject": settings.startup_project,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    controller.dispose().await;
    Ok(())
}
