//! Path normalization and safety checks for paths read out of manifests.

use crate::error::{Result, SolscopeError};
use crate::util::{normalize_lexically, resolve_path};
use std::path::{Component, MAIN_SEPARATOR, Path, PathBuf};

/// Converts a path as literally written in a manifest into platform form.
///
/// A single leading separator on an otherwise relative path (`\src\App.csproj`)
/// is dropped. UNC prefixes, drive letters and `/`-rooted paths are kept.
pub fn normalize_manifest_path(raw: &str) -> PathBuf {
    let trimmed = raw.trim();
    let stripped = if trimmed.starts_with('\\') && !trimmed.starts_with("\\\\") {
        &trimmed[1..]
    } else {
        trimmed
    };

    let translated: String = stripped
        .chars()
        .map(|c| if c == '\\' || c == '/' { MAIN_SEPARATOR } else { c })
        .collect();
    PathBuf::from(translated)
}

/// Rejects paths that land inside an OS-owned directory, either as written
/// or once symlinks along the existing part of the path are followed.
pub fn check_not_denied(path: &Path, denied_roots: &[PathBuf]) -> Result<()> {
    let normalized = normalize_lexically(path);
    let resolved = resolve_path(&normalized);
    for root in denied_roots {
        let canonical_root = root.canonicalize().ok();
        let hit = [&normalized, &resolved].into_iter().any(|candidate| {
            candidate.starts_with(root)
                || canonical_root.as_ref().is_some_and(|r| candidate.starts_with(r))
        });
        if hit {
            return Err(SolscopeError::UnsafePath {
                path: normalized,
                reason: format!("resolves into system directory {}", root.display()),
            });
        }
    }
    Ok(())
}

/// Resolves a manifest-relative project path against the solution directory.
///
/// The resolved path must stay outside the denied roots, must not contain
/// parent-directory components and must remain under `base_dir`.
pub fn resolve_project_path(raw: &str, base_dir: &Path, denied_roots: &[PathBuf]) -> Result<PathBuf> {
    let relative = normalize_manifest_path(raw);
    let joined = if relative.is_absolute() {
        relative.clone()
    } else {
        base_dir.join(&relative)
    };
    let resolved = normalize_lexically(&joined);

    check_not_denied(&resolved, denied_roots)?;

    if relative
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(SolscopeError::UnsafePath {
            path: resolved,
            reason: "contains a parent-directory component".to_string(),
        });
    }

    let base = normalize_lexically(base_dir);
    if !resolved.starts_with(&base) {
        return Err(SolscopeError::UnsafePath {
            path: resolved,
            reason: format!("escapes solution directory {}", base.display()),
        });
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TreeConfig;

    #[test]
    fn test_strips_spurious_leading_separator() {
        let path = normalize_manifest_path("\\src\\App\\App.csproj");
        assert_eq!(path, Path::new("src").join("App").join("App.csproj"));
    }

    #[test]
    fn test_resolves_inside_base() {
        let denied = TreeConfig::default().denied_roots;
        let resolved =
            resolve_project_path("src\\App\\App.csproj", Path::new("/work/sln"), &denied).unwrap();
        assert_eq!(resolved, PathBuf::from("/work/sln/src/App/App.csproj"));
    }

    #[test]
    fn test_rejects_system_directories() {
        let denied = TreeConfig::default().denied_roots;
        let err = resolve_project_path("/etc/passwd", Path::new("/work/sln"), &denied).unwrap_err();
        assert!(matches!(err, SolscopeError::UnsafePath { .. }));

        let err = resolve_project_path("/proc/self/environ", Path::new("/work/sln"), &denied)
            .unwrap_err();
        assert!(err.to_string().contains("system directory"));
    }

    #[test]
    fn test_rejects_traversal_and_escape() {
        let denied = TreeConfig::default().denied_roots;
        assert!(
            resolve_project_path("..\\Other\\Other.csproj", Path::new("/work/sln"), &denied)
                .is_err()
        );
        assert!(resolve_project_path("/opt/x/x.csproj", Path::new("/work/sln"), &denied).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_rejects_symlink_into_system_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink("/etc", dir.path().join("evil")).unwrap();

        let denied = TreeConfig::default().denied_roots;
        let err = resolve_project_path("evil\\Evil.csproj", dir.path(), &denied).unwrap_err();
        assert!(err.to_string().contains("system directory"));
    }
}
