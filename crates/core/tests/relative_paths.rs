mod common;

use common::{Workspace, expand_packages, package_versions};
use solscope_api::FileChange;
use solscope_core::TreeController;
use solscope_core::watcher::WatchTarget;
use std::path::PathBuf;
use std::sync::Arc;

// Changes the working directory, so it lives alone in this test binary.
#[tokio::test]
async fn test_relative_solution_path_follows_absolute_events() {
    let ws = Workspace::new();
    let p = ws.write_project("P", &[("Foo", "1.0.0")]);
    ws.write_solution(&["P"]);
    std::env::set_current_dir(ws.root()).unwrap();

    let controller = TreeController::open(
        PathBuf::from("Demo.sln"),
        common::config(),
        Arc::new(ws.watcher.clone()),
        ws.store.clone(),
    )
    .await
    .unwrap();
    assert_eq!(controller.solution_path(), ws.solution_path());
    assert!(ws.watcher.is_watching(&ws.solution_path()));
    assert!(ws.watcher.is_watching(&p));
    assert_eq!(ws.watcher.count(WatchTarget::ProjectManifest), 1);

    expand_packages(&controller, &p).await;

    ws.write_project("P", &[("Foo", "2.0.0")]);
    controller.enqueue(FileChange::changed(p.clone())).await;
    assert_eq!(
        package_versions(&controller, &p).await,
        vec![Some("2.0.0".to_string())]
    );

    // Relative event paths resolve against the same directory.
    ws.write_project("P", &[("Foo", "3.0.0")]);
    controller
        .enqueue(FileChange::changed(PathBuf::from("P").join("P.csproj")))
        .await;
    assert_eq!(
        package_versions(&controller, &p).await,
        vec![Some("3.0.0".to_string())]
    );
}
