//! Line-oriented solution manifest parser.
//!
//! Parsing never fails: unrecognized headers, sections and lines are skipped
//! and the best-effort partial manifest is returned.

use super::project::parse_target_frameworks;
use super::safety::{normalize_manifest_path, resolve_project_path};
use crate::config::TreeConfig;
use crate::util::path_string;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Type tag of a virtual solution folder.
pub const SOLUTION_FOLDER_TYPE_GUID: &str = "{2150E333-8FDC-42A3-9474-1A3956D46DE8}";

/// Hierarchy key for records that are not nested under any folder.
pub const ROOT_KEY: &str = "ROOT";

const NESTED_PROJECTS_SECTION: &str = "NestedProjects";
const SOLUTION_ITEMS_SECTION: &str = "SolutionItems";

static HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^Microsoft Visual Studio Solution File, Format Version\s+([0-9.]+)")
        .expect("valid header regex")
});

static VERSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(VisualStudioVersion|MinimumVisualStudioVersion)\s*=\s*(.+)$")
        .expect("valid version regex")
});

static PROJECT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^Project\("(\{[^}]*\})"\)\s*=\s*"([^"]*)"\s*,\s*"([^"]*)"\s*,\s*"(\{[^}]*\})""#,
    )
    .expect("valid project regex")
});

static SECTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(ProjectSection|GlobalSection)\(([^)]*)\)\s*=\s*(\w+)")
        .expect("valid section regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SectionTiming {
    PreSolution,
    PostSolution,
    PreProject,
    PostProject,
}

impl SectionTiming {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "preSolution" => Some(SectionTiming::PreSolution),
            "postSolution" => Some(SectionTiming::PostSolution),
            "preProject" => Some(SectionTiming::PreProject),
            "postProject" => Some(SectionTiming::PostProject),
            _ => None,
        }
    }
}

/// A `GlobalSection` or `ProjectSection` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    pub timing: SectionTiming,
    pub entries: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestingEdge {
    pub child: String,
    pub parent: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub type_guid: String,
    pub name: String,
    /// Platform-normalized path as written; equals `name` for solution folders.
    pub path: String,
    pub guid: String,
    pub sections: Vec<Section>,
    pub target_frameworks: Option<Vec<String>>,
    /// Resolved location, set only for records whose path passed the safety checks.
    pub absolute_path: Option<PathBuf>,
    /// Why the path was refused, if it was.
    pub rejection: Option<String>,
}

impl ProjectRecord {
    pub fn is_solution_folder(&self) -> bool {
        self.type_guid.eq_ignore_ascii_case(SOLUTION_FOLDER_TYPE_GUID)
    }

    pub fn is_rejected(&self) -> bool {
        self.rejection.is_some()
    }

    /// Loose files attached to a solution folder, relative to the solution directory.
    pub fn solution_items(&self) -> Vec<String> {
        self.sections
            .iter()
            .filter(|s| s.name == SOLUTION_ITEMS_SECTION)
            .flat_map(|s| s.entries.keys().cloned())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolutionManifest {
    pub format_version: String,
    pub visual_studio_version: Option<String>,
    pub minimum_visual_studio_version: Option<String>,
    pub projects: Vec<ProjectRecord>,
    pub global_sections: Vec<Section>,
    pub nested_projects: Vec<NestingEdge>,
}

impl SolutionManifest {
    pub fn project_by_guid(&self, guid: &str) -> Option<&ProjectRecord> {
        self.projects
            .iter()
            .find(|p| p.guid.eq_ignore_ascii_case(guid))
    }

    pub fn global_section(&self, name: &str) -> Option<&Section> {
        self.global_sections.iter().find(|s| s.name == name)
    }
}

fn normalize_guid(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

/// Parses solution manifest text. Never fails.
pub fn parse_solution(text: &str, base_dir: &Path, config: &TreeConfig) -> SolutionManifest {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let mut manifest = SolutionManifest::default();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        if PROJECT_RE.is_match(line) || line == "Global" {
            break;
        }
        if let Some(caps) = HEADER_RE.captures(line) {
            manifest.format_version = caps[1].to_string();
        } else if let Some(caps) = VERSION_RE.captures(line) {
            let value = caps[2].trim().to_string();
            if &caps[1] == "VisualStudioVersion" {
                manifest.visual_studio_version = Some(value);
            } else {
                manifest.minimum_visual_studio_version = Some(value);
            }
        }
        i += 1;
    }

    while i < lines.len() {
        let line = lines[i];
        if let Some(caps) = PROJECT_RE.captures(line) {
            let mut record = project_record(&caps, base_dir, config);
            i = parse_project_body(&lines, i + 1, &mut record.sections);
            manifest.projects.push(record);
            continue;
        }
        if line == "Global" {
            i = parse_global(&lines, i + 1, &mut manifest.global_sections);
            continue;
        }
        i += 1;
    }

    manifest.nested_projects = nesting_edges(&manifest);
    manifest
}

fn project_record(caps: &regex::Captures<'_>, base_dir: &Path, config: &TreeConfig) -> ProjectRecord {
    let type_guid = normalize_guid(&caps[1]);
    let name = caps[2].to_string();
    let raw_path = &caps[3];
    let guid = normalize_guid(&caps[4]);

    let mut record = ProjectRecord {
        type_guid,
        name: name.clone(),
        path: name.clone(),
        guid,
        sections: Vec::new(),
        target_frameworks: None,
        absolute_path: None,
        rejection: None,
    };

    if record.is_solution_folder() {
        return record;
    }

    record.path = path_string(&normalize_manifest_path(raw_path));
    match resolve_project_path(raw_path, base_dir, &config.denied_roots) {
        Ok(resolved) => record.absolute_path = Some(resolved),
        Err(err) => {
            tracing::warn!("Rejected project '{}' ({}): {}", name, raw_path, err);
            record.rejection = Some(err.to_string());
        }
    }
    record
}

/// Consumes lines up to and including `EndProject`; returns the next index.
fn parse_project_body(lines: &[&str], mut i: usize, sections: &mut Vec<Section>) -> usize {
    while i < lines.len() {
        let line = lines[i];
        if line == "EndProject" {
            return i + 1;
        }
        // A new declaration without EndProject: leave it for the outer scan.
        if PROJECT_RE.is_match(line) || line == "Global" {
            return i;
        }
        if let Some((section, next)) = parse_section(lines, i, "ProjectSection") {
            sections.extend(section);
            i = next;
            continue;
        }
        i += 1;
    }
    i
}

/// Consumes lines up to and including `EndGlobal`; returns the next index.
fn parse_global(lines: &[&str], mut i: usize, sections: &mut Vec<Section>) -> usize {
    while i < lines.len() {
        let line = lines[i];
        if line == "EndGlobal" {
            return i + 1;
        }
        if let Some((section, next)) = parse_section(lines, i, "GlobalSection") {
            sections.extend(section);
            i = next;
            continue;
        }
        i += 1;
    }
    i
}

/// Parses a `<kind>(Name) = timing` block starting at `start`.
///
/// Returns the section (absent when its timing keyword is unknown) and the
/// index after the matching `End<kind>` line.
fn parse_section(lines: &[&str], start: usize, kind: &str) -> Option<(Option<Section>, usize)> {
    let caps = SECTION_RE.captures(lines[start])?;
    if &caps[1] != kind {
        return None;
    }
    let end_marker = format!("End{kind}");
    let name = caps[2].trim().to_string();

    let mut entries = IndexMap::new();
    let mut i = start + 1;
    while i < lines.len() && lines[i] != end_marker {
        if let Some((key, value)) = lines[i].split_once('=') {
            entries.insert(key.trim().to_string(), value.trim().to_string());
        }
        i += 1;
    }

    let section = match SectionTiming::parse(&caps[3]) {
        Some(timing) => Some(Section {
            name,
            timing,
            entries,
        }),
        None => {
            tracing::debug!("Skipping section '{}' with unknown timing '{}'", name, &caps[3]);
            None
        }
    };
    Some((section, i + 1))
}

/// Edges from the `NestedProjects` section whose endpoints both exist.
fn nesting_edges(manifest: &SolutionManifest) -> Vec<NestingEdge> {
    let Some(section) = manifest.global_section(NESTED_PROJECTS_SECTION) else {
        return Vec::new();
    };
    let known: HashSet<&str> = manifest.projects.iter().map(|p| p.guid.as_str()).collect();

    section
        .entries
        .iter()
        .filter_map(|(child, parent)| {
            let edge = NestingEdge {
                child: normalize_guid(child),
                parent: normalize_guid(parent),
            };
            if known.contains(edge.child.as_str()) && known.contains(edge.parent.as_str()) {
                Some(edge)
            } else {
                tracing::debug!("Dropping dangling nesting edge {} -> {}", edge.child, edge.parent);
                None
            }
        })
        .collect()
}

/// Groups records by parent GUID; records never named as a child go under [`ROOT_KEY`].
pub fn build_project_hierarchy(manifest: &SolutionManifest) -> HashMap<String, Vec<ProjectRecord>> {
    let parents: HashMap<&str, &str> = manifest
        .nested_projects
        .iter()
        .map(|e| (e.child.as_str(), e.parent.as_str()))
        .collect();

    let mut hierarchy: HashMap<String, Vec<ProjectRecord>> = HashMap::new();
    for record in &manifest.projects {
        let key = parents
            .get(record.guid.as_str())
            .map(|p| p.to_string())
            .unwrap_or_else(|| ROOT_KEY.to_string());
        hierarchy.entry(key).or_default().push(record.clone());
    }
    hierarchy
}

/// Fills `target_frameworks` for every safe project-file record.
///
/// Each record is read independently; a failure leaves that record without
/// framework info and the rest continue.
pub async fn enrich_target_frameworks(manifest: &mut SolutionManifest, config: &TreeConfig) {
    for record in manifest.projects.iter_mut() {
        let Some(path) = record.absolute_path.as_ref() else {
            continue;
        };
        if !config.is_project_file(path) {
            continue;
        }
        record.target_frameworks = match tokio::fs::read_to_string(path).await {
            Ok(text) => match parse_target_frameworks(&text) {
                Ok(frameworks) => Some(frameworks),
                Err(err) => {
                    tracing::warn!("Failed to parse {}: {}", path.display(), err);
                    None
                }
            },
            Err(err) => {
                tracing::warn!("Failed to read {}: {}", path.display(), err);
                None
            }
        };
    }
}

/// Reads, parses and enriches a solution file. Never fails.
pub async fn load_solution(path: &Path, config: &TreeConfig) -> SolutionManifest {
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(err) => {
            tracing::warn!("Failed to read solution {}: {}", path.display(), err);
            return SolutionManifest::default();
        }
    };
    let mut manifest = parse_solution(&text, base_dir, config);
    enrich_target_frameworks(&mut manifest, config).await;
    manifest
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
Microsoft Visual Studio Solution File, Format Version 12.00
# Visual Studio Version 17
VisualStudioVersion = 17.0.31903.59
MinimumVisualStudioVersion = 10.0.40219.1
Project("{2150E333-8FDC-42A3-9474-1A3956D46DE8}") = "src", "src", "{11111111-1111-1111-1111-111111111111}"
EndProject
Project("{2150E333-8FDC-42A3-9474-1A3956D46DE8}") = "Solution Items", "Solution Items", "{33333333-3333-3333-3333-333333333333}"
	ProjectSection(SolutionItems) = preProject
		Directory.Build.props = Directory.Build.props
		README.md = README.md
	EndProjectSection
EndProject
Project("{9A19103F-16F7-4668-BE54-9A1E7A4F7556}") = "App", "src\App\App.csproj", "{22222222-2222-2222-2222-222222222222}"
EndProject
Project("{9A19103F-16F7-4668-BE54-9A1E7A4F7556}") = "Tests", "tests\Tests\Tests.csproj", "{44444444-4444-4444-4444-444444444444}"
EndProject
Global
	GlobalSection(SolutionConfigurationPlatforms) = preSolution
		Debug|Any CPU = Debug|Any CPU
		Release|Any CPU = Release|Any CPU
	EndGlobalSection
	GlobalSection(NestedProjects) = preSolution
		{22222222-2222-2222-2222-222222222222} = {11111111-1111-1111-1111-111111111111}
		{99999999-9999-9999-9999-999999999999} = {11111111-1111-1111-1111-111111111111}
	EndGlobalSection
EndGlobal
"#;

    fn parse(text: &str) -> SolutionManifest {
        parse_solution(text, Path::new("/work/sln"), &TreeConfig::default())
    }

    #[test]
    fn test_parse_header_and_projects() {
        let manifest = parse(SAMPLE);
        assert_eq!(manifest.format_version, "12.00");
        assert_eq!(
            manifest.visual_studio_version.as_deref(),
            Some("17.0.31903.59")
        );
        assert_eq!(manifest.projects.len(), 4);

        let folder = &manifest.projects[0];
        assert!(folder.is_solution_folder());
        assert_eq!(folder.path, "src");
        assert!(folder.absolute_path.is_none());

        let app = manifest.project_by_guid("{22222222-2222-2222-2222-222222222222}").unwrap();
        assert_eq!(app.name, "App");
        assert_eq!(
            app.absolute_path.as_deref(),
            Some(Path::new("/work/sln/src/App/App.csproj"))
        );
    }

    #[test]
    fn test_solution_items_and_sections() {
        let manifest = parse(SAMPLE);
        let items = manifest.projects[1].solution_items();
        assert_eq!(items, vec!["Directory.Build.props", "README.md"]);

        let configs = manifest
            .global_section("SolutionConfigurationPlatforms")
            .unwrap();
        assert_eq!(configs.timing, SectionTiming::PreSolution);
        assert_eq!(configs.entries.get("Debug|Any CPU").unwrap(), "Debug|Any CPU");
    }

    #[test]
    fn test_dangling_nesting_edges_are_dropped() {
        let manifest = parse(SAMPLE);
        assert_eq!(
            manifest.nested_projects,
            vec![NestingEdge {
                child: "{22222222-2222-2222-2222-222222222222}".to_string(),
                parent: "{11111111-1111-1111-1111-111111111111}".to_string(),
            }]
        );
    }

    #[test]
    fn test_build_project_hierarchy() {
        let manifest = parse(SAMPLE);
        let hierarchy = build_project_hierarchy(&manifest);

        let root: Vec<_> = hierarchy[ROOT_KEY].iter().map(|r| r.name.as_str()).collect();
        assert_eq!(root, vec!["src", "Solution Items", "Tests"]);

        let nested = &hierarchy["{11111111-1111-1111-1111-111111111111}"];
        assert_eq!(nested.len(), 1);
        assert_eq!(nested[0].name, "App");
    }

    #[test]
    fn test_malformed_input_yields_empty_manifest() {
        let manifest = parse("Not a valid solution file\nRandom content here");
        assert_eq!(manifest, SolutionManifest::default());
        assert_eq!(manifest.format_version, "");
        assert!(manifest.projects.is_empty());
        assert!(manifest.global_sections.is_empty());
        assert!(manifest.nested_projects.is_empty());
    }

    #[test]
    fn test_reparse_is_idempotent() {
        assert_eq!(parse(SAMPLE), parse(SAMPLE));
    }

    #[test]
    fn test_unsafe_project_is_flagged_not_fatal() {
        let text = r#"
Microsoft Visual Studio Solution File, Format Version 12.00
Project("{9A19103F-16F7-4668-BE54-9A1E7A4F7556}") = "Evil", "/etc/passwd", "{55555555-5555-5555-5555-555555555555}"
EndProject
Project("{9A19103F-16F7-4668-BE54-9A1E7A4F7556}") = "Up", "..\outside\Up.csproj", "{66666666-6666-6666-6666-666666666666}"
EndProject
Project("{9A19103F-16F7-4668-BE54-9A1E7A4F7556}") = "Good", "Good\Good.csproj", "{77777777-7777-7777-7777-777777777777}"
EndProject
"#;
        let manifest = parse(text);
        assert_eq!(manifest.projects.len(), 3);
        assert!(manifest.projects[0].is_rejected());
        assert!(manifest.projects[0].absolute_path.is_none());
        assert!(manifest.projects[1].is_rejected());
        assert!(!manifest.projects[2].is_rejected());
    }

    #[test]
    fn test_missing_end_project_does_not_swallow_next_declaration() {
        let text = r#"
Project("{9A19103F-16F7-4668-BE54-9A1E7A4F7556}") = "A", "A\A.csproj", "{AAAAAAAA-AAAA-AAAA-AAAA-AAAAAAAAAAAA}"
Project("{9A19103F-16F7-4668-BE54-9A1E7A4F7556}") = "B", "B\B.csproj", "{BBBBBBBB-BBBB-BBBB-BBBB-BBBBBBBBBBBB}"
EndProject
"#;
        let manifest = parse(text);
        let names: Vec<_> = manifest.projects.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(manifest.format_version, "");
    }
}
