use serde_json::json;
use solscope_api::DependencyCategory;
use solscope_core::TreeConfig;
use solscope_core::project::ProjectEntity;
use solscope_core::watcher::NoopWatchProvider;
use std::path::PathBuf;
use std::sync::Arc;

pub async fn run(path: PathBuf, config: TreeConfig) -> Result<(), Box<dyn std::error::Error>> {
    if !path.is_file() {
        return Err(format!("Project file not found: {}", path.display()).into());
    }
    let mut project = ProjectEntity::load(
        path,
        None,
        Arc::new(config),
        Arc::new(NoopWatchProvider),
    )
    .await;

    let categories: Vec<_> = DependencyCategory::ALL
        .into_iter()
        .map(|category| {
            json!({
                "category": category.label(),
                "items": project.get_dependencies_by_category(category),
            })
        })
        .collect();

    let output = json!({
        "project": project.name(),
        "targetFrameworks": project.target_frameworks(),
        "dependencies": categories,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    project.dispose();
    Ok(())
}
