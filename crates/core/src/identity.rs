//! Stable node identifiers.
//!
//! Every id is a hash of the node kind plus the inputs that identify it:
//! the owning project path and a disambiguating key. Display order and
//! display paths never feed into an id.

use solscope_api::{DependencyCategory, NodeId};
use std::path::Path;
use xxhash_rust::xxh3::xxh3_128;

const SEPARATOR: char = '\u{1f}';

fn derive(prefix: &str, parts: &[&str]) -> NodeId {
    let mut key = String::from(prefix);
    for part in parts {
        key.push(SEPARATOR);
        key.push_str(part);
    }
    NodeId::new(format!("{prefix}:{:032x}", xxh3_128(key.as_bytes())))
}

fn lossy(path: &Path) -> std::borrow::Cow<'_, str> {
    path.to_string_lossy()
}

/// Path of `path` relative to the project directory, or the full path if it lies elsewhere.
fn project_relative<'a>(project_path: &Path, path: &'a Path) -> std::borrow::Cow<'a, str> {
    project_path
        .parent()
        .and_then(|dir| path.strip_prefix(dir).ok())
        .map(|rel| rel.to_string_lossy())
        .unwrap_or_else(|| path.to_string_lossy())
}

pub fn solution_id(solution_path: &Path) -> NodeId {
    derive("sln", &[&lossy(solution_path)])
}

pub fn solution_folder_id(guid: &str) -> NodeId {
    derive("sfolder", &[&guid.to_ascii_uppercase()])
}

pub fn solution_item_id(folder_guid: &str, item: &str) -> NodeId {
    derive("sitem", &[&folder_guid.to_ascii_uppercase(), item])
}

pub fn project_id(project_path: &Path) -> NodeId {
    derive("proj", &[&lossy(project_path)])
}

pub fn dependencies_id(project_path: &Path) -> NodeId {
    derive("deps", &[&lossy(project_path)])
}

pub fn dependency_category_id(project_path: &Path, category: DependencyCategory) -> NodeId {
    derive("depcat", &[&lossy(project_path), category.as_str()])
}

pub fn dependency_id(
    project_path: &Path,
    category: DependencyCategory,
    name: &str,
    version: Option<&str>,
) -> NodeId {
    derive(
        "dep",
        &[
            &lossy(project_path),
            category.as_str(),
            name,
            version.unwrap_or(""),
        ],
    )
}

pub fn folder_id(project_path: &Path, folder: &Path) -> NodeId {
    derive("folder", &[&lossy(project_path), &project_relative(project_path, folder)])
}

pub fn file_id(project_path: &Path, file: &Path) -> NodeId {
    derive("file", &[&lossy(project_path), &project_relative(project_path, file)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_deterministic() {
        let project = Path::new("/sln/App/App.csproj");
        assert_eq!(project_id(project), project_id(project));
        assert_eq!(
            dependency_id(project, DependencyCategory::Packages, "Serilog", Some("3.1.1")),
            dependency_id(project, DependencyCategory::Packages, "Serilog", Some("3.1.1"))
        );
    }

    #[test]
    fn test_versions_and_categories_disambiguate() {
        let project = Path::new("/sln/App/App.csproj");
        let v1 = dependency_id(project, DependencyCategory::Packages, "Foo", Some("1.0.0"));
        let v2 = dependency_id(project, DependencyCategory::Packages, "Foo", Some("2.0.0"));
        let asm = dependency_id(project, DependencyCategory::Assemblies, "Foo", Some("1.0.0"));
        assert_ne!(v1, v2);
        assert_ne!(v1, asm);
    }

    #[test]
    fn test_kinds_do_not_collide_on_same_path() {
        let project = Path::new("/sln/App/App.csproj");
        let path = Path::new("/sln/App/Models");
        assert_ne!(folder_id(project, path), file_id(project, path));
        assert_ne!(project_id(project), dependencies_id(project));
        assert!(project_id(project).as_str().starts_with("proj:"));
    }

    #[test]
    fn test_same_relative_path_in_other_project_differs() {
        let a = Path::new("/sln/A/A.csproj");
        let b = Path::new("/sln/B/B.csproj");
        assert_ne!(
            folder_id(a, Path::new("/sln/A/Models")),
            folder_id(b, Path::new("/sln/B/Models"))
        );
    }
}
