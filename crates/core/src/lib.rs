pub mod config;
pub mod error;
pub mod identity;
pub mod logging;
pub mod parser;
pub mod project;
pub mod runtime;
pub mod solution;
pub mod store;
pub mod tree;
pub mod util;
pub mod watcher;

pub use config::TreeConfig;
pub use error::{Result, SolscopeError};
pub use runtime::{RequestLimiter, TreeController, TreeControllerBuilder, TreeSnapshot};
pub use store::{JsonFileStateStore, MemoryStateStore};
