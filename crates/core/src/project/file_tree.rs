use crate::util::file_name_string;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    File,
    Folder,
}

/// One entry of a project's lazily populated file tree.
///
/// An unloaded folder never holds children. Files are always loaded; their
/// children are nested files attached when the parent folder was listed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTreeNode {
    pub name: String,
    pub path: PathBuf,
    pub kind: FileKind,
    children: Vec<FileTreeNode>,
    is_loaded: bool,
    has_children_hint: bool,
}

impl FileTreeNode {
    pub fn folder(path: impl Into<PathBuf>, has_children_hint: bool) -> Self {
        let path = path.into();
        Self {
            name: file_name_string(&path),
            path,
            kind: FileKind::Folder,
            children: Vec::new(),
            is_loaded: false,
            has_children_hint,
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: file_name_string(&path),
            path,
            kind: FileKind::File,
            children: Vec::new(),
            is_loaded: true,
            has_children_hint: false,
        }
    }

    pub fn is_folder(&self) -> bool {
        self.kind == FileKind::Folder
    }

    pub fn is_loaded(&self) -> bool {
        self.is_loaded
    }

    pub fn has_children_hint(&self) -> bool {
        self.has_children_hint
    }

    pub fn children(&self) -> &[FileTreeNode] {
        &self.children
    }

    /// Installs listed children and marks the node loaded.
    pub fn set_children(&mut self, children: Vec<FileTreeNode>) {
        self.has_children_hint = !children.is_empty();
        self.children = children;
        self.is_loaded = true;
    }

    /// Drops loaded children so the next expand re-lists the folder.
    pub fn unload(&mut self) {
        if self.kind == FileKind::Folder {
            self.children.clear();
            self.is_loaded = false;
        }
    }

    /// Finds the folder (or this node) at `path`, descending through folders only.
    pub fn find(&self, path: &Path) -> Option<&FileTreeNode> {
        if self.path == path {
            return Some(self);
        }
        if !path.starts_with(&self.path) {
            return None;
        }
        self.children
            .iter()
            .filter(|c| c.is_folder())
            .find_map(|c| c.find(path))
    }

    pub fn find_mut(&mut self, path: &Path) -> Option<&mut FileTreeNode> {
        if self.path == path {
            return Some(self);
        }
        if !path.starts_with(&self.path) {
            return None;
        }
        self.children
            .iter_mut()
            .filter(|c| c.kind == FileKind::Folder)
            .find_map(|c| c.find_mut(path))
    }
}
