//! The snapshot handed to the rendering collaborator.

use serde::{Deserialize, Serialize};

use super::geometry::{self, Rect};
use super::workspaces::WorkspaceManager;
use crate::common::config::LayoutSettings;
use crate::model::{OutputId, WindowId};

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RenderTree {
    /// Ordered by output id.
    pub outputs: Vec<OutputRender>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OutputRender {
    pub output: OutputId,
    pub name: String,
    pub rect: Rect,
    pub workspace: Option<String>,
    /// Bottom to top: tiled windows in traversal order, then floating
    /// windows in stacking order.
    pub placements: Vec<Placement>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub window: WindowId,
    pub rect: Rect,
    pub z: u32,
    pub floating: bool,
    pub focused: bool,
}

impl RenderTree {
    pub fn placement(&self, window: WindowId) -> Option<&Placement> {
        self.outputs.iter().flat_map(|o| &o.placements).find(|p| p.window == window)
    }

    pub fn windows(&self) -> impl Iterator<Item = WindowId> + '_ {
        self.outputs.iter().flat_map(|o| o.placements.iter().map(|p| p.window))
    }
}

/// Lays out the active workspace of every output.
pub fn render(manager: &WorkspaceManager, settings: &LayoutSettings) -> RenderTree {
    let focused = manager.focused_window();
    let mut outputs = Vec::new();
    for output in manager.outputs() {
        let workspace = manager
            .active()
            .workspace_on(output.id)
            .and_then(|ws| manager.workspace(ws));
        let mut placements = Vec::new();
        if let Some(ws) = workspace {
            let gaps = settings.gaps.effective_for_output(&output.name);
            let tiled = geometry::tile_rects(ws.tree(), output.rect, &gaps)
                .into_iter()
                .map(|(w, r)| (w, r, false));
            let floating = ws.floating_windows().iter().map(|&(w, r)| (w, r, true));
            for (z, (window, rect, floating)) in tiled.chain(floating).enumerate() {
                placements.push(Placement {
                    window,
                    rect,
                    z: z as u32,
                    floating,
                    focused: focused == Some(window),
                });
            }
        }
        outputs.push(OutputRender {
            output: output.id,
            name: output.name.clone(),
            rect: output.rect,
            workspace: workspace.map(|ws| ws.name.clone()),
            placements,
        });
    }
    RenderTree { outputs }
}
