//! Per-user solution settings kept in a `<solution>.user` file next to the
//! manifest, in the manifest's own section grammar:
//!
//! ```text
//! Global
//!     GlobalSection(SolutionExplorerSettings) = preSolution
//!         StartupProject = {GUID}
//!         ActiveFramework = net8.0
//!     EndGlobalSection
//! EndGlobal
//! ```
//!
//! Writes are line edits; every line they do not target is kept verbatim.

use crate::error::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const SETTINGS_SECTION: &str = "SolutionExplorerSettings";

static SECTION_START_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*GlobalSection\(SolutionExplorerSettings\)").expect("valid section regex")
});
static SECTION_END_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*EndGlobalSection\s*$").expect("valid section end regex"));
static GLOBAL_END_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*EndGlobal\s*$").expect("valid global end regex"));
static ENTRY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(ActiveFramework|FrameworkFilter|StartupProject)\s*=\s*(.*?)\s*$")
        .expect("valid entry regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidecarKey {
    ActiveFramework,
    FrameworkFilter,
    StartupProject,
}

impl SidecarKey {
    pub fn as_str(self) -> &'static str {
        match self {
            SidecarKey::ActiveFramework => "ActiveFramework",
            SidecarKey::FrameworkFilter => "FrameworkFilter",
            SidecarKey::StartupProject => "StartupProject",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "ActiveFramework" => Some(SidecarKey::ActiveFramework),
            "FrameworkFilter" => Some(SidecarKey::FrameworkFilter),
            "StartupProject" => Some(SidecarKey::StartupProject),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SidecarSettings {
    pub active_framework: Option<String>,
    pub framework_filter: Option<String>,
    pub startup_project: Option<String>,
}

pub fn sidecar_path(solution_path: &Path) -> PathBuf {
    let mut name = solution_path.as_os_str().to_owned();
    name.push(".user");
    PathBuf::from(name)
}

/// Wraps a project GUID in braces and uppercases it.
pub fn normalize_guid(raw: &str) -> String {
    let inner = raw.trim().trim_start_matches('{').trim_end_matches('}');
    format!("{{{}}}", inner.to_ascii_uppercase())
}

/// Line range `[start, end]` of the settings section, if present and closed.
fn section_bounds(lines: &[&str]) -> Option<(usize, usize)> {
    let start = lines.iter().position(|l| SECTION_START_RE.is_match(l))?;
    let end = lines[start + 1..]
        .iter()
        .position(|l| SECTION_END_RE.is_match(l))
        .map(|offset| start + 1 + offset)?;
    Some((start, end))
}

impl SidecarSettings {
    pub fn parse(text: &str) -> Self {
        let lines: Vec<&str> = text.lines().collect();
        let mut settings = Self::default();
        let Some((start, end)) = section_bounds(&lines) else {
            return settings;
        };

        for line in &lines[start + 1..end] {
            let Some(caps) = ENTRY_RE.captures(line) else {
                continue;
            };
            let value = caps[2].to_string();
            match SidecarKey::parse(&caps[1]) {
                Some(SidecarKey::ActiveFramework) => settings.active_framework = Some(value),
                Some(SidecarKey::FrameworkFilter) => settings.framework_filter = Some(value),
                Some(SidecarKey::StartupProject) => settings.startup_project = Some(value),
                None => {}
            }
        }
        settings
    }

    /// Reads the sidecar of `solution_path`; a missing or unreadable file yields defaults.
    pub async fn read(solution_path: &Path) -> Self {
        let path = sidecar_path(solution_path);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Self::parse(&text),
            Err(err) => {
                tracing::debug!("No sidecar at {}: {}", path.display(), err);
                Self::default()
            }
        }
    }

    /// Sets (`Some`) or removes (`None`) one key in the sidecar file.
    pub async fn write_key(solution_path: &Path, key: SidecarKey, value: Option<&str>) -> Result<()> {
        let path = sidecar_path(solution_path);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(err) => return Err(err.into()),
        };
        let edited = edit(&text, key, value);
        if edited != text {
            tokio::fs::write(&path, edited).await?;
            tracing::debug!("Updated {} in {}", key.as_str(), path.display());
        }
        Ok(())
    }
}

/// Applies one key edit to sidecar text.
pub fn edit(text: &str, key: SidecarKey, value: Option<&str>) -> String {
    let newline = if text.contains("\r\n") { "\r\n" } else { "\n" };
    let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
    let entry = value.map(|v| format!("\t\t{} = {}", key.as_str(), v));

    let borrowed: Vec<&str> = lines.iter().map(String::as_str).collect();
    match section_bounds(&borrowed) {
        Some((start, end)) => {
            let existing = (start + 1..end).find(|&i| {
                ENTRY_RE
                    .captures(&lines[i])
                    .is_some_and(|caps| &caps[1] == key.as_str())
            });
            match (existing, entry) {
                (Some(i), Some(entry)) => lines[i] = entry,
                (Some(i), None) => {
                    lines.remove(i);
                }
                (None, Some(entry)) => lines.insert(end, entry),
                (None, None) => return text.to_string(),
            }
        }
        None => {
            let Some(entry) = entry else {
                return text.to_string();
            };
            let section = [
                format!("\tGlobalSection({SETTINGS_SECTION}) = preSolution"),
                entry,
                "\tEndGlobalSection".to_string(),
            ];
            match lines.iter().rposition(|l| GLOBAL_END_RE.is_match(l)) {
                Some(global_end) => {
                    for (offset, line) in section.into_iter().enumerate() {
                        lines.insert(global_end + offset, line);
                    }
                }
                None => {
                    lines.push("Global".to_string());
                    lines.extend(section);
                    lines.push("EndGlobal".to_string());
                }
            }
        }
    }

    let mut out = lines.join(newline);
    out.push_str(newline);
    out
}
