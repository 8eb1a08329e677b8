pub mod engine;
mod error;
mod floating;
pub mod geometry;
pub(crate) mod graph;
pub mod render;
pub mod workspaces;

pub use engine::{EventResponse, FocusChange, LayoutCommand, LayoutEngine, LayoutEvent};
pub use error::{LayoutError, Target};
pub use geometry::Rect;
pub use graph::{Direction, LayoutKind, Orientation};
pub use render::{OutputRender, Placement, RenderTree};
pub use workspaces::{Active, Output, Workspace, WorkspaceId, WorkspaceManager};
