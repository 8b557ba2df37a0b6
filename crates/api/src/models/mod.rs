pub mod change;
pub mod dependency;
pub mod node;

pub use change::*;
pub use dependency::*;
pub use node::*;
