use std::cmp::Ordering;
use std::path::{Component, Path, PathBuf};

/// Resolves `.` and `..` components without touching the file system.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Alphabetical order used for every sibling list in the tree:
/// case-insensitive first, then case-sensitive to keep it total.
pub fn display_cmp(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Absolute, symlink-free form of `path`.
///
/// Paths that no longer (or do not yet) exist resolve through their parent
/// directory; anything else falls back to a lexical join with the working
/// directory.
pub fn resolve_path(path: &Path) -> PathBuf {
    if let Ok(resolved) = path.canonicalize() {
        return resolved;
    }
    if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
        if let Ok(parent) = parent.canonicalize() {
            return parent.join(name);
        }
    }
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|dir| dir.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    normalize_lexically(&absolute)
}

pub fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

pub fn file_name_string(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path_string(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_lexically() {
        assert_eq!(
            normalize_lexically(Path::new("/a/b/../c/./d")),
            PathBuf::from("/a/c/d")
        );
        assert_eq!(normalize_lexically(Path::new("../x")), PathBuf::from("../x"));
    }

    #[test]
    fn test_display_cmp_is_case_insensitive_first() {
        let mut names = vec!["beta", "Alpha", "alpha", "Gamma"];
        names.sort_by(|a, b| display_cmp(a, b));
        assert_eq!(names, vec!["Alpha", "alpha", "beta", "Gamma"]);
    }

    #[test]
    fn test_resolve_path_is_absolute() {
        let resolved = resolve_path(Path::new("no-such-dir/./file.sln"));
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("no-such-dir/file.sln"));
    }

    #[test]
    fn test_resolve_path_of_deleted_file_uses_parent() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("gone.cs");
        assert_eq!(
            resolve_path(&gone),
            dir.path().canonicalize().unwrap().join("gone.cs")
        );

        std::fs::write(&gone, "").unwrap();
        assert_eq!(resolve_path(&gone), gone.canonicalize().unwrap());
    }
}
