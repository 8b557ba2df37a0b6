//! Merging a freshly built tree against the previously rendered one.
//!
//! Nodes are matched by `node_id` only. A matched node takes over the cached
//! `expanded` and `is_loading` flags; expanded cached subtrees are carried
//! into fresh nodes that were built lazily, so a rebuild never collapses
//! anything the user had open. Dependency categories keep their expanded
//! flag but always come out unloaded, forcing their contents to be re-read.

use solscope_api::DisplayNode;
use std::collections::HashMap;

pub fn merge_tree_states(fresh: DisplayNode, cached: Option<&DisplayNode>) -> DisplayNode {
    let mut fresh = fresh;
    if let Some(cached) = cached {
        if cached.node_id == fresh.node_id {
            merge_node(&mut fresh, cached);
        }
    }
    fresh
}

/// Merges fresh sibling lists against cached siblings, matching by id.
pub fn merge_children(fresh: Vec<DisplayNode>, cached: &[DisplayNode]) -> Vec<DisplayNode> {
    let by_id: HashMap<_, _> = cached.iter().map(|c| (&c.node_id, c)).collect();
    fresh
        .into_iter()
        .map(|mut node| {
            if let Some(cached) = by_id.get(&node.node_id) {
                merge_node(&mut node, cached);
            }
            node
        })
        .collect()
}

fn merge_node(fresh: &mut DisplayNode, cached: &DisplayNode) {
    fresh.expanded = cached.expanded;
    fresh.is_loading = cached.is_loading;

    if fresh.kind.is_dependency_category() {
        fresh.children = None;
        fresh.is_loaded = false;
        return;
    }

    if !cached.expanded {
        return;
    }
    let Some(cached_children) = cached.children.as_deref() else {
        return;
    };

    match fresh.children.take() {
        Some(children) => {
            fresh.children = Some(merge_children(children, cached_children));
        }
        None => {
            // Built lazily: keep what was on screen until it is re-hydrated.
            fresh.children = Some(carry_forward(cached_children));
            fresh.is_loaded = cached.is_loaded;
            fresh.has_children = cached.has_children || !cached_children.is_empty();
        }
    }
}

fn carry_forward(cached: &[DisplayNode]) -> Vec<DisplayNode> {
    cached
        .iter()
        .map(|node| {
            let mut node = node.clone();
            refresh_categories(&mut node);
            node
        })
        .collect()
}

fn refresh_categories(node: &mut DisplayNode) {
    if node.kind.is_dependency_category() {
        node.children = None;
        node.is_loaded = false;
        return;
    }
    if let Some(children) = node.children.as_mut() {
        for child in children {
            refresh_categories(child);
        }
    }
}
