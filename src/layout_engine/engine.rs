use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::render::{self, RenderTree};
use super::workspaces::{Active, WorkspaceId, WorkspaceManager};
use super::{Direction, LayoutError, LayoutKind, Rect, Target};
use crate::common::collections::{BTreeSet, HashMap};
use crate::common::config::{Config, LayoutSettings};
use crate::model::{OutputId, WindowId};

#[non_exhaustive]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum LayoutCommand {
    FocusDirection(Direction),
    MoveContainer(Direction),
    ToggleFloat,
    ToggleFocusFloating,
    ToggleOrientation,
    SetLayout(LayoutKind),
    ResizeBy { amount: f64 },
    CloseFocused,
    SwitchWorkspace(String),
    MoveWindowToWorkspace(String),
    CreateWorkspace(String),
    NoOp,
}

#[non_exhaustive]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum LayoutEvent {
    OutputAdded { id: OutputId, name: String, rect: Rect },
    OutputRemoved { id: OutputId },
    OutputResized { id: OutputId, rect: Rect },
    WindowMapped { id: WindowId, requested_geometry: Rect },
    WindowUnmapped { id: WindowId },
    WindowGeometryRequest { id: WindowId, rect: Rect },
    /// Focus moved outside of any command, e.g. a click.
    WindowFocused { id: WindowId },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FocusChange {
    pub workspace: String,
    pub window: Option<WindowId>,
}

#[must_use]
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct EventResponse {
    /// One entry per workspace whose focused window changed.
    pub focus_changed: Vec<FocusChange>,
    pub workspace_changed_to: Option<String>,
    /// The window was dropped from the layout; its client should be asked
    /// to close.
    pub close_requested: Option<WindowId>,
}

impl EventResponse {
    pub fn is_empty(&self) -> bool { *self == EventResponse::default() }
}

#[derive(Debug, Clone)]
pub struct LayoutEngine {
    manager: WorkspaceManager,
    layout_settings: LayoutSettings,
    bindings: HashMap<String, LayoutCommand>,
}

impl LayoutEngine {
    pub fn new(config: &Config) -> Self {
        LayoutEngine {
            manager: WorkspaceManager::new(&config.workspaces),
            layout_settings: config.settings.layout.clone(),
            bindings: config.bindings.clone(),
        }
    }

    pub fn set_layout_settings(&mut self, settings: &LayoutSettings) {
        self.layout_settings = settings.clone();
    }

    /// Applies a reloaded config. Existing workspaces and windows are kept.
    pub fn update_config(&mut self, config: &Config) {
        self.set_layout_settings(&config.settings.layout);
        self.manager.update_settings(&config.workspaces);
        self.bindings = config.bindings.clone();
    }

    #[inline]
    pub fn manager(&self) -> &WorkspaceManager { &self.manager }

    #[inline]
    pub fn layout_settings(&self) -> &LayoutSettings { &self.layout_settings }

    pub fn focused_window(&self) -> Option<WindowId> { self.manager.focused_window() }

    pub fn active_workspace_name(&self) -> Option<&str> {
        let ws = self.manager.active_workspace()?;
        self.manager.workspace(ws).map(|ws| ws.name.as_str())
    }

    pub fn render_tree(&self) -> RenderTree { render::render(&self.manager, &self.layout_settings) }

    /// ASCII drawing of the active workspace's tree.
    pub fn draw_tree(&self) -> String {
        match self.manager.active_workspace().and_then(|ws| self.manager.workspace(ws)) {
            Some(ws) => ws.tree().draw_tree(),
            None => "<no workspace>".to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), LayoutError> { self.manager.validate() }

    pub fn handle_event(&mut self, event: LayoutEvent) -> Result<EventResponse, LayoutError> {
        debug!(?event);
        let direction = self.new_window_direction();
        self.transact(|manager, _| match event {
            LayoutEvent::OutputAdded { id, name, rect } => {
                manager.add_output(id, name, rect).map(drop)
            }
            LayoutEvent::OutputRemoved { id } => manager.remove_output(id),
            LayoutEvent::OutputResized { id, rect } => manager.resize_output(id, rect),
            LayoutEvent::WindowMapped { id, requested_geometry } => {
                manager.add_window(id, requested_geometry, direction).map(drop)
            }
            LayoutEvent::WindowUnmapped { id } => manager.remove_window(id).map(drop),
            LayoutEvent::WindowGeometryRequest { id, rect } => manager.request_geometry(id, rect),
            LayoutEvent::WindowFocused { id } => manager.focus_window(id),
        })
    }

    pub fn handle_command(&mut self, command: &LayoutCommand) -> Result<EventResponse, LayoutError> {
        debug!(?command);
        if *command == LayoutCommand::NoOp {
            return Ok(EventResponse::default());
        }
        let direction = self.new_window_direction();
        let min_ratio = self.layout_settings.min_ratio;
        let gaps = self.layout_settings.gaps.clone();

        self.transact(|manager, response| {
            match command {
                LayoutCommand::SwitchWorkspace(name) => return manager.switch_workspace(name).map(drop),
                LayoutCommand::CreateWorkspace(name) => return manager.create_workspace(name).map(drop),
                _ => {}
            }

            let Some(ws) = manager.active_workspace() else {
                return Ok(());
            };
            let Some(focused) = manager.active().focused(ws) else {
                debug!(?command, "nothing focused");
                return Ok(());
            };
            let workspace = manager
                .workspace_mut(ws)
                .ok_or_else(|| LayoutError::invariant("active workspace is missing"))?;
            let floating = workspace.is_floating(focused);

            match command {
                LayoutCommand::FocusDirection(dir) => {
                    let next = if floating {
                        workspace.floating.cycle(focused, *dir)
                    } else {
                        workspace.tree.neighbor(focused, *dir, &workspace.focus)?
                    };
                    if let Some(next) = next {
                        manager.focus_window(next)?;
                    }
                }
                LayoutCommand::MoveContainer(dir) if !floating => {
                    workspace.tree.move_window(focused, *dir)?;
                    workspace.tree.select(focused)?;
                }
                LayoutCommand::ToggleFloat => manager.toggle_float(focused, direction, &gaps)?,
                LayoutCommand::ToggleFocusFloating => {
                    let next = if floating {
                        workspace.active_leaf(Some(focused))
                    } else {
                        workspace
                            .floating
                            .last_focus()
                            .or_else(|| workspace.floating.windows().last())
                    };
                    if let Some(next) = next {
                        manager.focus_window(next)?;
                    }
                }
                LayoutCommand::ToggleOrientation if !floating => {
                    workspace.tree.toggle_orientation(focused)?;
                }
                LayoutCommand::SetLayout(layout) if !floating => {
                    workspace.tree.set_layout(focused, *layout)?;
                }
                LayoutCommand::ResizeBy { amount } if !floating => {
                    workspace.tree.resize(focused, *amount, min_ratio)?;
                }
                LayoutCommand::CloseFocused => {
                    manager.remove_window(focused)?;
                    response.close_requested = Some(focused);
                }
                LayoutCommand::MoveWindowToWorkspace(name) => {
                    manager.move_window_to_workspace(focused, name, direction)?;
                }
                _ => {}
            }
            Ok(())
        })
    }

    /// Runs the command bound to `name`.
    pub fn invoke_binding(&mut self, name: &str) -> Result<EventResponse, LayoutError> {
        let command = self
            .bindings
            .get(name)
            .cloned()
            .ok_or_else(|| LayoutError::NotFound(Target::Binding(name.to_string())))?;
        self.handle_command(&command)
    }

    fn new_window_direction(&self) -> Direction { self.layout_settings.new_window_direction() }

    /// Applies `apply` to the workspace state and checks every invariant
    /// afterwards. On any error the state is put back exactly as it was.
    fn transact(
        &mut self,
        apply: impl FnOnce(&mut WorkspaceManager, &mut EventResponse) -> Result<(), LayoutError>,
    ) -> Result<EventResponse, LayoutError> {
        let snapshot = self.manager.clone();
        let mut response = EventResponse::default();
        let result = apply(&mut self.manager, &mut response).and_then(|()| self.manager.validate());
        if let Err(err) = result {
            warn!(%err, "operation rolled back");
            self.manager = snapshot;
            return Err(err);
        }

        self.diff_focus(snapshot.active(), &mut response);
        if let Some(ws) = self.manager.active_workspace().and_then(|ws| self.manager.workspace(ws)) {
            debug!("Tree {}\n{}", ws.name, ws.tree().draw_tree().trim());
        }
        Ok(response)
    }

    fn diff_focus(&self, before: &Active, response: &mut EventResponse) {
        let after = self.manager.active();
        let touched: BTreeSet<WorkspaceId> = before
            .focus_entries()
            .chain(after.focus_entries())
            .map(|(ws, _)| ws)
            .collect();
        for ws in touched {
            let window = after.focused(ws);
            if before.focused(ws) == window {
                continue;
            }
            if let Some(workspace) = self.manager.workspace(ws) {
                response.focus_changed.push(FocusChange {
                    workspace: workspace.name.clone(),
                    window,
                });
            }
        }
        let active = self.manager.active_workspace();
        if before.workspace() != active {
            response.workspace_changed_to =
                active.and_then(|ws| self.manager.workspace(ws)).map(|ws| ws.name.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn w(idx: u64) -> WindowId { WindowId::new(idx) }

    fn engine() -> LayoutEngine {
        let mut engine = LayoutEngine::new(&Config::default());
        let _ = engine
            .handle_event(LayoutEvent::OutputAdded {
                id: OutputId::new(1),
                name: "eDP-1".into(),
                rect: Rect::new(0, 0, 1000, 500),
            })
            .unwrap();
        engine
    }

    fn map(engine: &mut LayoutEngine, idx: u64) -> EventResponse {
        engine
            .handle_event(LayoutEvent::WindowMapped {
                id: w(idx),
                requested_geometry: Rect::default(),
            })
            .unwrap()
    }

    #[test]
    fn mapping_reports_the_focus_change() {
        let mut engine = engine();
        let response = map(&mut engine, 1);
        assert_eq!(response.focus_changed, vec![FocusChange {
            workspace: "1".into(),
            window: Some(w(1)),
        }]);
        assert_eq!(response.workspace_changed_to, None);
    }

    #[test]
    fn first_output_reports_its_workspace() {
        let mut engine = LayoutEngine::new(&Config::default());
        let response = engine
            .handle_event(LayoutEvent::OutputAdded {
                id: OutputId::new(1),
                name: "eDP-1".into(),
                rect: Rect::new(0, 0, 10, 10),
            })
            .unwrap();
        assert_eq!(response.workspace_changed_to.as_deref(), Some("1"));
    }

    #[test]
    fn failed_event_leaves_state_untouched() {
        let mut engine = engine();
        let _ = map(&mut engine, 1);
        let before = engine.render_tree();
        let err = engine
            .handle_event(LayoutEvent::WindowMapped {
                id: w(1),
                requested_geometry: Rect::default(),
            })
            .unwrap_err();
        assert_eq!(err, LayoutError::AlreadyExists(Target::Window(w(1))));
        assert_eq!(engine.render_tree(), before);
    }

    #[test]
    fn focus_commands_without_focus_do_nothing() {
        let mut engine = engine();
        for command in [
            LayoutCommand::FocusDirection(Direction::Left),
            LayoutCommand::MoveContainer(Direction::Up),
            LayoutCommand::ToggleFloat,
            LayoutCommand::CloseFocused,
            LayoutCommand::ResizeBy { amount: 0.1 },
        ] {
            let response = engine.handle_command(&command).unwrap();
            assert!(response.is_empty(), "{command:?} produced {response:?}");
        }
    }

    #[test]
    fn close_focused_requests_close() {
        let mut engine = engine();
        let _ = map(&mut engine, 1);
        let _ = map(&mut engine, 2);
        let response = engine.handle_command(&LayoutCommand::CloseFocused).unwrap();
        assert_eq!(response.close_requested, Some(w(2)));
        assert_eq!(engine.focused_window(), Some(w(1)));
        assert_eq!(
            engine.handle_event(LayoutEvent::WindowUnmapped { id: w(2) }).unwrap_err(),
            LayoutError::window(w(2))
        );
    }

    #[test]
    fn unknown_binding_is_not_found() {
        let mut engine = engine();
        assert_eq!(
            engine.invoke_binding("mod4+nothing").unwrap_err(),
            LayoutError::NotFound(Target::Binding("mod4+nothing".into()))
        );
    }

    #[test]
    fn bindings_dispatch_their_command() {
        let mut engine = engine();
        let _ = map(&mut engine, 1);
        let _ = map(&mut engine, 2);
        let response = engine.invoke_binding("mod4+h").unwrap();
        assert_eq!(engine.focused_window(), Some(w(1)));
        assert_eq!(response.focus_changed.len(), 1);
    }

    #[test]
    fn switching_reports_the_new_workspace() {
        let mut engine = engine();
        let response = engine
            .handle_command(&LayoutCommand::SwitchWorkspace("2".into()))
            .unwrap();
        assert_eq!(response.workspace_changed_to.as_deref(), Some("2"));
        assert_eq!(engine.active_workspace_name(), Some("2"));
    }
}
