//! XML project manifest parser.
//!
//! Extracts dependencies and target frameworks only; this is not an MSBuild
//! evaluator. The file-level entry points never fail and degrade to empty
//! structures.

use super::safety::{check_not_denied, normalize_manifest_path};
use crate::config::TreeConfig;
use crate::error::Result;
use crate::util::path_string;
use solscope_api::{Dependency, DependencyKind};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectManifestData {
    pub dependencies: Vec<Dependency>,
    pub target_frameworks: Vec<String>,
}

/// Result of scanning a project: manifest dependencies plus its files on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectFileInfo {
    pub files: Vec<PathBuf>,
    pub directories: Vec<PathBuf>,
    pub dependencies: Vec<Dependency>,
}

fn reference_kind(tag: &str) -> Option<DependencyKind> {
    match tag {
        "PackageReference" => Some(DependencyKind::Package),
        "ProjectReference" => Some(DependencyKind::ProjectRef),
        "FrameworkReference" => Some(DependencyKind::FrameworkRef),
        "Reference" => Some(DependencyKind::AssemblyRef),
        _ => None,
    }
}

fn child_text(node: &roxmltree::Node<'_, '_>, name: &str) -> Option<String> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

fn attribute_or_child(node: &roxmltree::Node<'_, '_>, name: &str) -> Option<String> {
    node.attribute(name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| child_text(node, name))
}

/// `Name, Version=1.2.3.4, Culture=neutral` -> (`Name`, `1.2.3.4`)
fn split_assembly_identity(include: &str) -> (String, Option<String>) {
    let mut parts = include.split(',').map(str::trim);
    let name = parts.next().unwrap_or_default().to_string();
    let version = parts.find_map(|token| {
        let (key, value) = token.split_once('=')?;
        (key.trim() == "Version").then(|| value.trim().to_string())
    });
    (name, version)
}

fn dependency_from_element(node: &roxmltree::Node<'_, '_>, kind: DependencyKind) -> Option<Dependency> {
    let include = node.attribute("Include")?.trim();
    if include.is_empty() {
        return None;
    }

    let dependency = match kind {
        DependencyKind::Package | DependencyKind::FrameworkRef => {
            Dependency::new(include, kind).with_version(attribute_or_child(node, "Version"))
        }
        DependencyKind::ProjectRef => {
            let path = normalize_manifest_path(include);
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| include.to_string());
            Dependency::new(name, kind).with_path(Some(path_string(&path)))
        }
        DependencyKind::AssemblyRef => {
            let (name, version) = split_assembly_identity(include);
            let hint = child_text(node, "HintPath").map(|h| path_string(&normalize_manifest_path(&h)));
            Dependency::new(name, kind)
                .with_version(version)
                .with_path(hint)
        }
    };
    Some(dependency)
}

fn frameworks_from_document(doc: &roxmltree::Document<'_>) -> Vec<String> {
    let mut plural = None;
    let mut singular = None;

    for group in doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "PropertyGroup")
    {
        if plural.is_none() {
            plural = child_text(&group, "TargetFrameworks");
        }
        if singular.is_none() {
            singular = child_text(&group, "TargetFramework");
        }
    }

    match (plural, singular) {
        (Some(list), _) => list
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        (None, Some(single)) => vec![single],
        (None, None) => Vec::new(),
    }
}

/// Collects `TargetFrameworks` (preferred, semicolon separated) or `TargetFramework`.
pub fn parse_target_frameworks(text: &str) -> Result<Vec<String>> {
    let doc = roxmltree::Document::parse(text)?;
    Ok(frameworks_from_document(&doc))
}

/// Parses project XML into sorted dependencies and target frameworks.
pub fn parse_project_manifest(text: &str) -> Result<ProjectManifestData> {
    let doc = roxmltree::Document::parse(text)?;

    let mut dependencies: Vec<Dependency> = doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "ItemGroup")
        .flat_map(|group| group.children().filter(|n| n.is_element()))
        .filter_map(|item| {
            let kind = reference_kind(item.tag_name().name())?;
            dependency_from_element(&item, kind)
        })
        .collect();
    dependencies.sort_by(Dependency::display_cmp);

    Ok(ProjectManifestData {
        dependencies,
        target_frameworks: frameworks_from_document(&doc),
    })
}

/// Reads and parses a project manifest, degrading every failure to empty data.
pub async fn read_project_manifest(path: &Path, config: &TreeConfig) -> ProjectManifestData {
    if let Err(err) = check_not_denied(path, &config.denied_roots) {
        tracing::warn!("Refusing to read project manifest: {}", err);
        return ProjectManifestData::default();
    }

    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(err) => {
            tracing::warn!("Failed to read project {}: {}", path.display(), err);
            return ProjectManifestData::default();
        }
    };

    parse_project_manifest(&text).unwrap_or_else(|err| {
        tracing::warn!("Failed to parse project {}: {}", path.display(), err);
        ProjectManifestData::default()
    })
}

/// Lists a project's files (recursively, minus excluded directories) and
/// its manifest dependencies. Never fails.
pub async fn load_project_file(path: &Path, config: &TreeConfig) -> ProjectFileInfo {
    if let Err(err) = check_not_denied(path, &config.denied_roots) {
        tracing::warn!("Refusing to load project: {}", err);
        return ProjectFileInfo::default();
    }
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        tracing::debug!("Project file {} does not exist", path.display());
        return ProjectFileInfo::default();
    }

    let manifest = read_project_manifest(path, config).await;

    let project_file = path.to_path_buf();
    let cfg = config.clone();
    let (files, directories) = tokio::task::spawn_blocking(move || discover_files(&project_file, &cfg))
        .await
        .unwrap_or_else(|err| {
            tracing::error!("File discovery task failed: {}", err);
            (Vec::new(), Vec::new())
        });

    ProjectFileInfo {
        files,
        directories,
        dependencies: manifest.dependencies,
    }
}

fn discover_files(project_file: &Path, config: &TreeConfig) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let Some(root) = project_file.parent() else {
        return (Vec::new(), Vec::new());
    };

    let mut files = Vec::new();
    let mut directories = BTreeSet::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 || !entry.file_type().is_dir() {
                return true;
            }
            !config.is_excluded_dir(&entry.file_name().to_string_lossy())
        });

    for entry in walker.filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path == project_file {
            continue;
        }
        if entry.depth() == 1 && config.is_skipped_root_file(&entry.file_name().to_string_lossy()) {
            continue;
        }

        if let Ok(relative) = path.strip_prefix(root) {
            let mut parent = relative.parent();
            while let Some(dir) = parent.filter(|d| !d.as_os_str().is_empty()) {
                directories.insert(root.join(dir));
                parent = dir.parent();
            }
        }
        files.push(path.to_path_buf());
    }

    files.sort();
    (files, directories.into_iter().collect())
}
