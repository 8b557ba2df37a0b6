pub mod arena;
pub mod builder;
pub mod reconcile;

pub use arena::{ArenaEntry, NodePatch, TreeArena};
pub use builder::{LoadRequest, build_tree, load_children, sibling_cmp};
pub use reconcile::{merge_children, merge_tree_states};
