//! File nesting by naming convention.
//!
//! `Foo.cs` nests `Foo.Designer.cs`: a file nests under another when it starts
//! with the other's stem plus a dot, ends with the same extension, and is
//! longer. With several candidates the longest parent name wins, so nesting
//! can go more than one level deep.

use super::file_tree::FileTreeNode;
use crate::util::display_cmp;
use std::collections::HashMap;
use std::path::PathBuf;

fn split_extension(name: &str) -> Option<(&str, &str)> {
    let dot = name.rfind('.').filter(|&pos| pos > 0)?;
    Some((&name[..dot], &name[dot..]))
}

fn nests_under(child: &str, parent: &str) -> bool {
    let Some((stem, ext)) = split_extension(parent) else {
        return false;
    };
    child.len() > parent.len()
        && child.starts_with(stem)
        && child[stem.len()..].starts_with('.')
        && child.ends_with(ext)
}

fn nesting_parent<'a>(child: &str, names: &'a [String]) -> Option<&'a str> {
    names
        .iter()
        .filter(|candidate| nests_under(child, candidate))
        .max_by_key(|candidate| candidate.len())
        .map(String::as_str)
}

/// Arranges the files of one directory into a nested, alphabetically ordered forest.
pub fn nest_files(files: Vec<PathBuf>) -> Vec<FileTreeNode> {
    let mut names: Vec<String> = files
        .iter()
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();
    names.sort_by(|a, b| display_cmp(a, b));

    let by_name: HashMap<String, PathBuf> = files
        .into_iter()
        .filter_map(|p| {
            let name = p.file_name()?.to_string_lossy().into_owned();
            Some((name, p))
        })
        .collect();

    let mut children_of: HashMap<Option<String>, Vec<String>> = HashMap::new();
    for name in &names {
        let parent = nesting_parent(name, &names).map(str::to_string);
        children_of.entry(parent).or_default().push(name.clone());
    }

    fn build(
        name: &str,
        by_name: &HashMap<String, PathBuf>,
        children_of: &HashMap<Option<String>, Vec<String>>,
    ) -> Option<FileTreeNode> {
        let mut node = FileTreeNode::file(by_name.get(name)?.clone());
        let nested: Vec<FileTreeNode> = children_of
            .get(&Some(name.to_string()))
            .map(|kids| {
                kids.iter()
                    .filter_map(|kid| build(kid, by_name, children_of))
                    .collect()
            })
            .unwrap_or_default();
        if !nested.is_empty() {
            node.set_children(nested);
        }
        Some(node)
    }

    children_of
        .get(&None)
        .map(|top| {
            top.iter()
                .filter_map(|name| build(name, &by_name, &children_of))
                .collect()
        })
        .unwrap_or_default()
}
