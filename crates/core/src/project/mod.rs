pub mod entity;
pub mod file_tree;
pub mod nesting;

pub use entity::ProjectEntity;
pub use file_tree::{FileKind, FileTreeNode};
pub use nesting::nest_files;
