mod common;

use common::{Workspace, expand_packages, packages_id};
use solscope_api::{DisplayNode, FileChange, NodeId, NodeKind};
use solscope_core::identity;
use solscope_core::watcher::WatchTarget;

fn names(nodes: &[DisplayNode]) -> Vec<&str> {
    nodes.iter().map(|n| n.name.as_str()).collect()
}

async fn node(controller: &solscope_core::TreeController, id: &NodeId) -> DisplayNode {
    let tree = controller.root().await.unwrap().unwrap();
    tree.find(id)
        .cloned()
        .unwrap_or_else(|| panic!("node {id} missing from tree"))
}

#[tokio::test]
async fn test_dependency_version_change_keeps_sibling_expanded() {
    let ws = Workspace::new();
    let p = ws.write_project("P", &[("Foo", "1.0.0")]);
    let q = ws.write_project("Q", &[("Bar", "2.0.0")]);
    ws.write_solution(&["P", "Q"]);
    let controller = ws.open().await;

    expand_packages(&controller, &p).await;
    expand_packages(&controller, &q).await;

    ws.write_project("P", &[("Foo", "2.0.0")]);
    controller.enqueue(FileChange::changed(p.clone())).await;

    let packages = controller.get_children(Some(&packages_id(&p))).await.unwrap();
    let foos: Vec<_> = packages.iter().filter(|n| n.name == "Foo").collect();
    assert_eq!(foos.len(), 1);
    assert_eq!(
        foos[0].kind,
        NodeKind::Dependency {
            kind: solscope_api::DependencyKind::Package,
            version: Some("2.0.0".to_string()),
        }
    );

    let q_node = node(&controller, &identity::project_id(&q)).await;
    assert!(q_node.expanded);
    let q_deps = node(&controller, &identity::dependencies_id(&q)).await;
    assert!(q_deps.expanded);
    let q_packages = node(&controller, &packages_id(&q)).await;
    assert!(q_packages.expanded);
    assert!(q_packages.is_loaded);
    assert_eq!(names(q_packages.children()), vec!["Bar"]);
}

#[tokio::test]
async fn test_collapse_then_reexpand_reuses_loaded_children() {
    let ws = Workspace::new();
    let p = ws.write_project("P", &[]);
    ws.write("P/Models/User.cs", "");
    ws.write_solution(&["P"]);
    let controller = ws.open().await;

    let models = ws.root().join("P").join("Models");
    let models_id = identity::folder_id(&p, &models);
    controller.expand(&identity::project_id(&p)).await.unwrap();
    controller.expand(&models_id).await.unwrap();
    assert!(ws.watcher.is_watching(&models));

    controller.collapse(&models_id).await.unwrap();
    assert!(!ws.watcher.is_watching(&models));
    let collapsed = node(&controller, &models_id).await;
    assert!(!collapsed.expanded);
    assert!(collapsed.is_loaded);
    assert_eq!(names(collapsed.children()), vec!["User.cs"]);

    // Written without an event: not picked up by the re-expand.
    ws.write("P/Models/Late.cs", "");
    controller.expand(&models_id).await.unwrap();
    assert!(ws.watcher.is_watching(&models));
    let children = controller.get_children(Some(&models_id)).await.unwrap();
    assert_eq!(names(&children), vec!["User.cs"]);
}

#[tokio::test]
async fn test_change_in_collapsed_folder_reloads_on_next_expand() {
    let ws = Workspace::new();
    let p = ws.write_project("P", &[]);
    ws.write("P/Models/User.cs", "");
    ws.write_solution(&["P"]);
    let controller = ws.open().await;

    let models = ws.root().join("P").join("Models");
    let models_id = identity::folder_id(&p, &models);
    controller.expand(&identity::project_id(&p)).await.unwrap();
    controller.expand(&models_id).await.unwrap();
    controller.collapse(&models_id).await.unwrap();

    let late = ws.write("P/Models/Late.cs", "");
    controller.enqueue(FileChange::created(late)).await;
    assert!(!node(&controller, &models_id).await.is_loaded);

    controller.expand(&models_id).await.unwrap();
    let children = controller.get_children(Some(&models_id)).await.unwrap();
    assert_eq!(names(&children), vec!["Late.cs", "User.cs"]);
}

#[tokio::test]
async fn test_change_in_expanded_folder_refreshes_in_place() {
    let ws = Workspace::new();
    let p = ws.write_project("P", &[]);
    ws.write("P/Models/User.cs", "");
    ws.write_solution(&["P"]);
    let controller = ws.open().await;

    let models = ws.root().join("P").join("Models");
    let models_id = identity::folder_id(&p, &models);
    controller.expand(&identity::project_id(&p)).await.unwrap();
    controller.expand(&models_id).await.unwrap();

    let order = ws.write("P/Models/Order.cs", "");
    controller.enqueue(FileChange::created(order)).await;

    let models_node = node(&controller, &models_id).await;
    assert!(models_node.expanded);
    assert_eq!(names(models_node.children()), vec!["Order.cs", "User.cs"]);
}

#[tokio::test]
async fn test_change_in_unloaded_folder_is_ignored() {
    let ws = Workspace::new();
    let p = ws.write_project("P", &[]);
    ws.write("P/Models/User.cs", "");
    ws.write_solution(&["P"]);
    let controller = ws.open().await;
    let before = controller.snapshot().await.unwrap();

    let late = ws.write("P/Models/Late.cs", "");
    controller.enqueue(FileChange::created(late)).await;

    let after = controller.snapshot().await.unwrap();
    assert!(std::sync::Arc::ptr_eq(&before, &after));
    let project = node(&controller, &identity::project_id(&p)).await;
    assert!(!project.is_loaded);
}

#[tokio::test]
async fn test_solution_reload_preserves_foreign_expansion() {
    let ws = Workspace::new();
    let q = ws.write_project("Q", &[]);
    ws.write("Q/Models/User.cs", "");
    let sln = ws.write_solution(&["Q"]);
    let controller = ws.open().await;

    let models_id = identity::folder_id(&q, &ws.root().join("Q").join("Models"));
    controller.expand(&identity::project_id(&q)).await.unwrap();
    controller.expand(&models_id).await.unwrap();

    let r = ws.write_project("R", &[]);
    ws.write_solution(&["Q", "R"]);
    controller.enqueue(FileChange::changed(sln)).await;

    let tree = controller.root().await.unwrap().unwrap();
    assert_eq!(names(tree.children()), vec!["Q", "R"]);
    assert!(tree.find(&identity::project_id(&q)).unwrap().expanded);
    let models = tree.find(&models_id).unwrap();
    assert!(models.expanded);
    assert_eq!(names(models.children()), vec!["User.cs"]);
    assert!(!tree.find(&identity::project_id(&r)).unwrap().expanded);
    assert_eq!(ws.watcher.count(WatchTarget::ProjectManifest), 2);
}

#[tokio::test]
async fn test_project_manifest_deleted_and_recreated() {
    let ws = Workspace::new();
    let p = ws.write_project("P", &[]);
    let q = ws.write_project("Q", &[]);
    ws.write_solution(&["P", "Q"]);
    let controller = ws.open().await;

    std::fs::remove_file(&p).unwrap();
    controller.enqueue(FileChange::deleted(p.clone())).await;
    let tree = controller.root().await.unwrap().unwrap();
    assert_eq!(names(tree.children()), vec!["Q"]);

    ws.write_project("P", &[("Foo", "1.0.0")]);
    controller.enqueue(FileChange::created(p.clone())).await;
    let tree = controller.root().await.unwrap().unwrap();
    assert_eq!(names(tree.children()), vec!["P", "Q"]);
    assert!(tree.find(&identity::project_id(&q)).is_some());
}

#[tokio::test]
async fn test_every_project_has_four_dependency_categories() {
    let ws = Workspace::new();
    let p = ws.write_project("P", &[]);
    ws.write_solution(&["P"]);
    let controller = ws.open().await;

    controller.expand(&identity::project_id(&p)).await.unwrap();
    let categories = controller
        .get_children(Some(&identity::dependencies_id(&p)))
        .await
        .unwrap();
    assert_eq!(
        names(&categories),
        vec!["Packages", "Projects", "Assemblies", "Frameworks"]
    );
    assert!(categories.iter().all(|c| c.children().is_empty()));
}

#[tokio::test]
async fn test_unsafe_project_is_skipped() {
    let ws = Workspace::new();
    ws.write_project("P", &[]);
    let mut text = common::solution(&["P"]);
    text = text.replacen(
        "Global\n",
        "Project(\"{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}\") = \"Evil\", \"..\\..\\..\\..\\etc\\passwd.csproj\", \"{00000000-0000-0000-0000-0000000000EE}\"\nEndProject\nGlobal\n",
        1,
    );
    ws.write("Demo.sln", &text);

    let controller = ws.open().await;
    let tree = controller.root().await.unwrap().unwrap();
    assert_eq!(names(tree.children()), vec!["P"]);
    assert!(tree.find_by_name("Evil").is_none());

    let manifest =
        solscope_core::parser::load_solution(&ws.solution_path(), controller.config()).await;
    let evil = manifest.projects.iter().find(|p| p.name == "Evil").unwrap();
    assert!(evil.is_rejected());
    assert!(evil.target_frameworks.is_none());
}

#[tokio::test]
async fn test_malformed_solution_opens_empty() {
    let ws = Workspace::new();
    ws.write("Demo.sln", "Not a valid solution file\nRandom content here");
    let controller = ws.open().await;

    let tree = controller.root().await.unwrap().unwrap();
    assert_eq!(tree.name, "Demo");
    assert!(tree.children().is_empty());
}

#[tokio::test]
async fn test_expansion_state_survives_reopen() {
    let ws = Workspace::new();
    let p = ws.write_project("P", &[]);
    ws.write("P/Models/User.cs", "");
    ws.write_solution(&["P"]);

    let models_id = identity::folder_id(&p, &ws.root().join("P").join("Models"));
    {
        let controller = ws.open().await;
        controller.expand(&identity::project_id(&p)).await.unwrap();
        controller.expand(&models_id).await.unwrap();
        let saved = controller.load_expansion_state().await.unwrap();
        assert!(saved.contains(&models_id));
        controller.dispose().await;
    }

    let controller = ws.open().await;
    let models = node(&controller, &models_id).await;
    assert!(models.expanded);
    assert_eq!(names(models.children()), vec!["User.cs"]);
}

#[tokio::test]
async fn test_deleting_solution_disposes_controller() {
    let ws = Workspace::new();
    ws.write_project("P", &[]);
    let sln = ws.write_solution(&["P"]);
    let controller = ws.open().await;
    assert!(!ws.watcher.active().is_empty());

    std::fs::remove_file(&sln).unwrap();
    controller.enqueue(FileChange::deleted(sln)).await;

    assert!(controller.is_disposed());
    assert!(ws.watcher.active().is_empty());
    assert!(controller.get_children(None).await.is_err());
}

#[tokio::test]
async fn test_concurrent_enqueues_are_all_applied() {
    let ws = Workspace::new();
    let p = ws.write_project("P", &[("Foo", "1.0.0")]);
    let q = ws.write_project("Q", &[("Bar", "1.0.0")]);
    ws.write_solution(&["P", "Q"]);
    let controller = ws.open().await;
    expand_packages(&controller, &p).await;
    expand_packages(&controller, &q).await;

    ws.write_project("P", &[("Foo", "2.0.0")]);
    ws.write_project("Q", &[("Bar", "3.0.0")]);
    tokio::join!(
        controller.enqueue(FileChange::changed(p.clone())),
        controller.enqueue(FileChange::changed(q.clone())),
        controller.enqueue(FileChange::changed(p.clone())),
    );
    assert_eq!(controller.pending_changes(), 0);

    for (project, expected) in [(&p, "2.0.0"), (&q, "3.0.0")] {
        let packages = controller.get_children(Some(&packages_id(project))).await.unwrap();
        assert_eq!(packages.len(), 1);
        assert!(matches!(
            &packages[0].kind,
            NodeKind::Dependency { version: Some(v), .. } if v == expected
        ));
    }
}

#[tokio::test]
async fn test_sidecar_settings_through_controller() {
    let ws = Workspace::new();
    ws.write_project("P", &[]);
    ws.write_solution(&["P"]);
    let controller = ws.open().await;

    let guid = common::guid(1);
    controller.set_startup_project(Some(&guid.to_lowercase())).await.unwrap();
    controller.set_active_framework(Some("net8.0")).await.unwrap();
    assert!(controller.set_startup_project(Some("{DEADBEEF}")).await.is_err());

    controller.set_startup_project(None).await.unwrap();
    let settings = controller.solution_settings().await;
    assert_eq!(settings.startup_project, None);
    assert_eq!(settings.active_framework.as_deref(), Some("net8.0"));
}
