pub mod focus_stack;
mod ids;
pub mod tree;

pub use focus_stack::FocusStack;
pub use ids::{OutputId, WindowId};
pub use tree::{Node, NodeId, NodeKind, Split, Tree};
