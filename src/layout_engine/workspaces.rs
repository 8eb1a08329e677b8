//! Outputs, their workspaces, and the Active pointer.
//!
//! The manager owns every workspace tree and floating layer. Only its
//! transition functions write the Active pointer: which output is active,
//! which workspace each output shows, and which window each workspace has
//! focused.

use serde::{Deserialize, Serialize};
use slotmap::{SlotMap, new_key_type};
use tracing::{debug, info};

use super::floating::FloatingLayer;
use super::geometry::{self, Rect};
use super::{Direction, LayoutError, Target};
use crate::common::collections::{BTreeMap, HashMap, HashSet};
use crate::common::config::{GapSettings, WorkspaceSettings};
use crate::model::{FocusStack, OutputId, Tree, WindowId};

new_key_type! {
    pub struct WorkspaceId;
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Output {
    pub id: OutputId,
    pub name: String,
    pub rect: Rect,
    workspaces: Vec<WorkspaceId>,
}

impl Output {
    pub fn workspaces(&self) -> &[WorkspaceId] { &self.workspaces }
}

#[derive(Clone, Debug)]
pub struct Workspace {
    pub name: String,
    pub output: OutputId,
    pub(crate) tree: Tree,
    pub(crate) floating: FloatingLayer,
    pub(crate) focus: FocusStack,
}

impl Workspace {
    fn new(name: String, output: OutputId) -> Self {
        Workspace {
            name,
            output,
            tree: Tree::new(),
            floating: FloatingLayer::new(),
            focus: FocusStack::new(),
        }
    }

    #[inline]
    pub fn tree(&self) -> &Tree { &self.tree }

    #[inline]
    pub fn focus_stack(&self) -> &FocusStack { &self.focus }

    #[inline]
    pub fn is_floating(&self, wid: WindowId) -> bool { self.floating.is_floating(wid) }

    #[inline]
    pub fn contains(&self, wid: WindowId) -> bool {
        self.tree.contains(wid) || self.floating.is_floating(wid)
    }

    pub fn is_empty(&self) -> bool { self.tree.is_empty() && self.floating.is_empty() }

    /// Tiled windows in traversal order, then floating windows bottom-up.
    pub fn windows(&self) -> Vec<WindowId> {
        let mut windows = self.tree.windows();
        windows.extend(self.floating.windows());
        windows
    }

    pub fn floating_rect(&self, wid: WindowId) -> Option<Rect> { self.floating.rect(wid) }

    /// Floating windows with their rects, bottom of the stack first.
    pub fn floating_windows(&self) -> &[(WindowId, Rect)] { self.floating.stacking_order() }

    /// The tiled window new tiles attach to: the most recently focused one.
    pub(crate) fn active_leaf(&self, excluding: Option<WindowId>) -> Option<WindowId> {
        self.focus
            .iter()
            .find(|&w| Some(w) != excluding && self.tree.contains(w))
    }

    /// Takes the window out of the tree or the floating layer. Returns its
    /// floating rect if it was floating.
    fn detach(&mut self, wid: WindowId) -> Result<Option<Rect>, LayoutError> {
        self.focus.remove(wid);
        if let Some(rect) = self.floating.remove_floating(wid) {
            return Ok(Some(rect));
        }
        self.tree.remove(wid)?;
        Ok(None)
    }
}

/// Which output is active, which workspace each output shows, and which
/// window each workspace has focused.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Active {
    output: Option<OutputId>,
    workspaces: BTreeMap<OutputId, WorkspaceId>,
    focused: BTreeMap<WorkspaceId, WindowId>,
}

impl Active {
    #[inline]
    pub fn output(&self) -> Option<OutputId> { self.output }

    #[inline]
    pub fn workspace_on(&self, output: OutputId) -> Option<WorkspaceId> {
        self.workspaces.get(&output).copied()
    }

    pub fn workspace(&self) -> Option<WorkspaceId> {
        self.output.and_then(|o| self.workspace_on(o))
    }

    #[inline]
    pub fn focused(&self, workspace: WorkspaceId) -> Option<WindowId> {
        self.focused.get(&workspace).copied()
    }

    /// Focused window of the active workspace.
    pub fn focused_window(&self) -> Option<WindowId> {
        self.workspace().and_then(|ws| self.focused(ws))
    }

    pub fn focus_entries(&self) -> impl Iterator<Item = (WorkspaceId, WindowId)> + '_ {
        self.focused.iter().map(|(ws, w)| (*ws, *w))
    }

    fn set_active_output(&mut self, output: Option<OutputId>) { self.output = output; }

    fn set_active_workspace(&mut self, output: OutputId, workspace: WorkspaceId) {
        self.workspaces.insert(output, workspace);
    }

    fn set_focus(&mut self, workspace: WorkspaceId, window: Option<WindowId>) {
        match window {
            Some(w) => self.focused.insert(workspace, w),
            None => self.focused.remove(&workspace),
        };
    }

    fn forget_output(&mut self, output: OutputId) {
        self.workspaces.remove(&output);
        if self.output == Some(output) {
            self.output = None;
        }
    }
}

#[derive(Clone, Debug)]
pub struct WorkspaceManager {
    workspaces: SlotMap<WorkspaceId, Workspace>,
    outputs: BTreeMap<OutputId, Output>,
    active: Active,
    window_to_workspace: HashMap<WindowId, WorkspaceId>,
    /// Geometry clients asked for, used when their window floats.
    requested: HashMap<WindowId, Rect>,
    configured_names: Vec<String>,
}

impl WorkspaceManager {
    pub fn new(settings: &WorkspaceSettings) -> Self {
        WorkspaceManager {
            workspaces: SlotMap::default(),
            outputs: BTreeMap::new(),
            active: Active::default(),
            window_to_workspace: HashMap::default(),
            requested: HashMap::default(),
            configured_names: settings.names.clone(),
        }
    }

    pub fn update_settings(&mut self, settings: &WorkspaceSettings) {
        self.configured_names = settings.names.clone();
    }

    #[inline]
    pub fn active(&self) -> &Active { &self.active }

    pub fn outputs(&self) -> impl Iterator<Item = &Output> { self.outputs.values() }

    #[inline]
    pub fn output(&self, id: OutputId) -> Option<&Output> { self.outputs.get(&id) }

    #[inline]
    pub fn workspace(&self, id: WorkspaceId) -> Option<&Workspace> { self.workspaces.get(id) }

    pub(crate) fn workspace_mut(&mut self, id: WorkspaceId) -> Option<&mut Workspace> {
        self.workspaces.get_mut(id)
    }

    pub fn workspaces(&self) -> impl Iterator<Item = (WorkspaceId, &Workspace)> {
        self.workspaces.iter()
    }

    pub fn workspace_by_name(&self, name: &str) -> Option<WorkspaceId> {
        self.workspaces.iter().find(|(_, ws)| ws.name == name).map(|(id, _)| id)
    }

    #[inline]
    pub fn workspace_of(&self, wid: WindowId) -> Option<WorkspaceId> {
        self.window_to_workspace.get(&wid).copied()
    }

    pub fn active_workspace(&self) -> Option<WorkspaceId> { self.active.workspace() }

    pub fn focused_window(&self) -> Option<WindowId> { self.active.focused_window() }

    pub fn requested_geometry(&self, wid: WindowId) -> Option<Rect> {
        self.requested.get(&wid).copied()
    }

    /// Registers an output and gives it a workspace of its own. The first
    /// output becomes the active one.
    pub fn add_output(
        &mut self,
        id: OutputId,
        name: String,
        rect: Rect,
    ) -> Result<WorkspaceId, LayoutError> {
        if self.outputs.contains_key(&id) {
            return Err(LayoutError::AlreadyExists(Target::Output(id)));
        }
        self.outputs.insert(id, Output { id, name, rect, workspaces: vec![] });
        let ws_name = self.next_free_name();
        let ws = self.create_workspace_on(ws_name, id)?;
        self.active.set_active_workspace(id, ws);
        if self.active.output().is_none() {
            self.active.set_active_output(Some(id));
        }
        info!(output = %id, workspace = %self.workspaces[ws].name, "output added");
        Ok(ws)
    }

    /// Moves the output's workspaces to the first remaining output.
    pub fn remove_output(&mut self, id: OutputId) -> Result<(), LayoutError> {
        if !self.outputs.contains_key(&id) {
            return Err(LayoutError::NotFound(Target::Output(id)));
        }
        if self.outputs.len() == 1 {
            return Err(LayoutError::invariant("cannot remove the last output"));
        }
        let Some(removed) = self.outputs.remove(&id) else {
            return Err(LayoutError::NotFound(Target::Output(id)));
        };
        let Some(target) = self.outputs.values_mut().next() else {
            return Err(LayoutError::invariant("no output left to adopt workspaces"));
        };
        for ws in &removed.workspaces {
            if let Some(workspace) = self.workspaces.get_mut(*ws) {
                workspace.output = target.id;
            }
        }
        target.workspaces.extend(removed.workspaces.iter().copied());
        let target = target.id;
        let was_active = self.active.output() == Some(id);
        self.active.forget_output(id);
        if was_active {
            self.active.set_active_output(Some(target));
        }
        info!(output = %id, adopted_by = %target, "output removed");
        Ok(())
    }

    pub fn resize_output(&mut self, id: OutputId, rect: Rect) -> Result<(), LayoutError> {
        let output = self
            .outputs
            .get_mut(&id)
            .ok_or(LayoutError::NotFound(Target::Output(id)))?;
        output.rect = rect;
        Ok(())
    }

    /// Creates an empty workspace on the active output without showing it.
    pub fn create_workspace(&mut self, name: &str) -> Result<WorkspaceId, LayoutError> {
        let output = self
            .active
            .output()
            .ok_or(LayoutError::NotFound(Target::ActiveOutput))?;
        self.create_workspace_on(name.to_string(), output)
    }

    fn create_workspace_on(
        &mut self,
        name: String,
        output: OutputId,
    ) -> Result<WorkspaceId, LayoutError> {
        if self.workspace_by_name(&name).is_some() {
            return Err(LayoutError::AlreadyExists(Target::Workspace(name)));
        }
        let out = self
            .outputs
            .get_mut(&output)
            .ok_or(LayoutError::NotFound(Target::Output(output)))?;
        let ws = self.workspaces.insert(Workspace::new(name, output));
        out.workspaces.push(ws);
        debug!(workspace = %self.workspaces[ws].name, %output, "created workspace");
        Ok(ws)
    }

    /// Looks a workspace up by name, creating it on the active output if the
    /// name is configured but not yet in use.
    fn ensure_workspace(&mut self, name: &str) -> Result<WorkspaceId, LayoutError> {
        if let Some(ws) = self.workspace_by_name(name) {
            return Ok(ws);
        }
        if self.configured_names.iter().any(|n| n == name) && self.active.output().is_some() {
            return self.create_workspace(name);
        }
        Err(LayoutError::workspace(name))
    }

    fn next_free_name(&self) -> String {
        let taken: HashSet<&str> = self.workspaces.values().map(|ws| ws.name.as_str()).collect();
        if let Some(name) = self.configured_names.iter().find(|n| !taken.contains(n.as_str())) {
            return name.clone();
        }
        (1..)
            .map(|i: usize| i.to_string())
            .find(|n| !taken.contains(n.as_str()))
            .unwrap_or_default()
    }

    /// Shows the named workspace on its output and makes that output active.
    ///
    /// Works the same for empty workspaces: nothing here assumes a tree has
    /// a leaf.
    pub fn switch_workspace(&mut self, name: &str) -> Result<WorkspaceId, LayoutError> {
        let ws = self.ensure_workspace(name)?;
        self.activate(ws);
        if self.active.focused(ws).is_none() {
            let fallback = self.workspaces[ws].focus.front();
            self.set_workspace_focus(ws, fallback)?;
        }
        info!(workspace = name, "switched workspace");
        Ok(ws)
    }

    fn activate(&mut self, ws: WorkspaceId) {
        let output = self.workspaces[ws].output;
        self.active.set_active_output(Some(output));
        self.active.set_active_workspace(output, ws);
    }

    /// Places a new window in the active workspace, next to the most
    /// recently focused tile, and focuses it.
    pub fn add_window(
        &mut self,
        wid: WindowId,
        requested: Rect,
        direction: Direction,
    ) -> Result<WorkspaceId, LayoutError> {
        if self.window_to_workspace.contains_key(&wid) {
            return Err(LayoutError::AlreadyExists(Target::Window(wid)));
        }
        let ws = self
            .active
            .workspace()
            .ok_or(LayoutError::NotFound(Target::ActiveOutput))?;
        let workspace = &mut self.workspaces[ws];
        let target = workspace.active_leaf(None);
        workspace.tree.add(target, wid, direction)?;
        workspace.focus.push_back(wid);
        self.window_to_workspace.insert(wid, ws);
        self.requested.insert(wid, requested);
        self.set_workspace_focus(ws, Some(wid))?;
        Ok(ws)
    }

    /// Forgets a window. If it had focus, its workspace falls back to the
    /// most recently focused survivor, or to no focus at all.
    pub fn remove_window(&mut self, wid: WindowId) -> Result<WorkspaceId, LayoutError> {
        let ws = self.workspace_of(wid).ok_or(LayoutError::window(wid))?;
        self.workspaces[ws].detach(wid)?;
        self.window_to_workspace.remove(&wid);
        self.requested.remove(&wid);
        self.refocus_after_removal(ws, wid)?;
        Ok(ws)
    }

    fn refocus_after_removal(&mut self, ws: WorkspaceId, wid: WindowId) -> Result<(), LayoutError> {
        if self.active.focused(ws) != Some(wid) {
            return Ok(());
        }
        let mut excluded = HashSet::default();
        excluded.insert(wid);
        let next = self.workspaces[ws].focus.most_recent_excluding(&excluded);
        debug!(closed = %wid, ?next, "recency fallback");
        self.set_workspace_focus(ws, next)
    }

    /// Records `wid` as the focus of workspace `ws` without changing which
    /// workspace is shown.
    fn set_workspace_focus(
        &mut self,
        ws: WorkspaceId,
        wid: Option<WindowId>,
    ) -> Result<(), LayoutError> {
        let workspace = self
            .workspaces
            .get_mut(ws)
            .ok_or_else(|| LayoutError::invariant("focus on a missing workspace"))?;
        if let Some(wid) = wid {
            if !workspace.contains(wid) {
                return Err(LayoutError::invariant(format!(
                    "{wid} focused outside workspace {}",
                    workspace.name
                )));
            }
            workspace.focus.record_focus(wid);
            if workspace.floating.is_floating(wid) {
                workspace.floating.raise(wid);
                workspace.floating.set_last_focus(Some(wid));
            } else {
                workspace.tree.select(wid)?;
            }
        }
        self.active.set_focus(ws, wid);
        Ok(())
    }

    /// Focuses the window and shows its workspace.
    pub fn focus_window(&mut self, wid: WindowId) -> Result<(), LayoutError> {
        let ws = self.workspace_of(wid).ok_or(LayoutError::window(wid))?;
        self.activate(ws);
        self.set_workspace_focus(ws, Some(wid))
    }

    /// Moves a tiled window to the top of the floating layer, or a floating
    /// window back into the tree next to the most recently focused tile.
    ///
    /// Either side may be empty: a floating window returning to an empty tree
    /// becomes its root leaf.
    pub fn toggle_float(
        &mut self,
        wid: WindowId,
        direction: Direction,
        gaps: &GapSettings,
    ) -> Result<(), LayoutError> {
        let ws = self.workspace_of(wid).ok_or(LayoutError::window(wid))?;
        let output = self.outputs.get(&self.workspaces[ws].output);
        let output_rect = output.map(|o| o.rect);
        let gaps = output.map(|o| gaps.effective_for_output(&o.name)).unwrap_or_default();
        let requested = self.requested.get(&wid).copied().filter(|r| !r.is_empty());
        let focused = self.active.focused(ws) == Some(wid);
        let workspace = &mut self.workspaces[ws];

        if workspace.floating.remove_floating(wid).is_some() {
            let target = workspace.active_leaf(Some(wid));
            workspace.tree.add(target, wid, direction)?;
            if focused {
                workspace.tree.select(wid)?;
            }
            debug!(%wid, "tiled");
            return Ok(());
        }

        let output_rect = output_rect.unwrap_or_default();
        let tiled_rect = geometry::tile_rects(&workspace.tree, output_rect, &gaps)
            .into_iter()
            .find(|(w, _)| *w == wid)
            .map(|(_, r)| r);
        workspace.tree.remove(wid)?;
        let rect = requested
            .or(tiled_rect)
            .unwrap_or_else(|| output_rect.centered(output_rect.width / 2, output_rect.height / 2));
        workspace.floating.add_floating(wid, rect);
        if focused {
            workspace.floating.set_last_focus(Some(wid));
        }
        debug!(%wid, ?rect, "floated");
        Ok(())
    }

    /// Moves a window to the named workspace, keeping it tiled or floating.
    pub fn move_window_to_workspace(
        &mut self,
        wid: WindowId,
        name: &str,
        direction: Direction,
    ) -> Result<WorkspaceId, LayoutError> {
        let from = self.workspace_of(wid).ok_or(LayoutError::window(wid))?;
        let to = self.ensure_workspace(name)?;
        if from == to {
            return Ok(to);
        }
        let floating_rect = self.workspaces[from].detach(wid)?;
        self.refocus_after_removal(from, wid)?;

        let target = &mut self.workspaces[to];
        match floating_rect {
            Some(rect) => target.floating.add_floating(wid, rect),
            None => {
                let leaf = target.active_leaf(None);
                target.tree.add(leaf, wid, direction)?;
            }
        }
        target.focus.push_back(wid);
        self.window_to_workspace.insert(wid, to);
        if self.active.focused(to).is_none() {
            self.set_workspace_focus(to, Some(wid))?;
        }
        info!(%wid, workspace = name, "moved window to workspace");
        Ok(to)
    }

    /// Records the geometry a client asked for. Floating windows get it
    /// immediately; tiled windows keep it for when they float.
    pub fn request_geometry(&mut self, wid: WindowId, rect: Rect) -> Result<(), LayoutError> {
        let ws = self.workspace_of(wid).ok_or(LayoutError::window(wid))?;
        self.requested.insert(wid, rect);
        self.workspaces[ws].floating.set_rect(wid, rect);
        Ok(())
    }

    /// Checks that every window lives in exactly one place, focus stacks
    /// and the Active pointer only name live windows, and every tree is
    /// well formed.
    pub fn validate(&self) -> Result<(), LayoutError> {
        let mut seen: HashSet<WindowId> = HashSet::default();
        for (id, ws) in &self.workspaces {
            ws.tree.validate()?;
            if !self.outputs.get(&ws.output).is_some_and(|o| o.workspaces.contains(&id)) {
                return Err(LayoutError::invariant(format!(
                    "workspace {} is not listed by {}",
                    ws.name, ws.output
                )));
            }
            for wid in ws.windows() {
                if !seen.insert(wid) {
                    return Err(LayoutError::invariant(format!("{wid} is owned twice")));
                }
                if self.window_to_workspace.get(&wid) != Some(&id) {
                    return Err(LayoutError::invariant(format!(
                        "{wid} is indexed outside workspace {}",
                        ws.name
                    )));
                }
                if !ws.focus.contains(wid) {
                    return Err(LayoutError::invariant(format!(
                        "{wid} is missing from the focus stack of {}",
                        ws.name
                    )));
                }
            }
            if let Some(stale) = ws.focus.iter().find(|&w| !ws.contains(w)) {
                return Err(LayoutError::invariant(format!(
                    "stale {stale} in the focus stack of {}",
                    ws.name
                )));
            }
            if let Some(focused) = self.active.focused(id) {
                if !ws.contains(focused) {
                    return Err(LayoutError::invariant(format!(
                        "{} focuses missing {focused}",
                        ws.name
                    )));
                }
            }
        }
        if seen.len() != self.window_to_workspace.len() {
            return Err(LayoutError::invariant("window index holds unknown windows"));
        }
        for (output, ws) in &self.active.workspaces {
            if self.workspaces.get(*ws).map(|w| w.output) != Some(*output) {
                return Err(LayoutError::invariant(format!(
                    "{output} shows a workspace it does not own"
                )));
            }
        }
        if let Some(output) = self.active.output() {
            if !self.outputs.contains_key(&output) {
                return Err(LayoutError::invariant(format!("active {output} is gone")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn w(idx: u64) -> WindowId { WindowId::new(idx) }

    fn screen() -> Rect { Rect::new(0, 0, 1920, 1080) }

    fn manager() -> WorkspaceManager {
        let mut m = WorkspaceManager::new(&WorkspaceSettings::default());
        m.add_output(OutputId::new(1), "eDP-1".into(), screen()).unwrap();
        m
    }

    fn name_of(m: &WorkspaceManager, ws: WorkspaceId) -> &str { &m.workspace(ws).unwrap().name }

    fn no_gaps() -> GapSettings { GapSettings::default() }

    #[test]
    fn first_output_gets_first_configured_workspace() {
        let m = manager();
        let ws = m.active_workspace().unwrap();
        assert_eq!(name_of(&m, ws), "1");
        assert_eq!(m.active().output(), Some(OutputId::new(1)));
        m.validate().unwrap();
    }

    #[test]
    fn outputs_beyond_configured_names_get_numbers() {
        let settings = WorkspaceSettings { names: vec!["web".into()] };
        let mut m = WorkspaceManager::new(&settings);
        let a = m.add_output(OutputId::new(1), "a".into(), screen()).unwrap();
        let b = m.add_output(OutputId::new(2), "b".into(), screen()).unwrap();
        assert_eq!(name_of(&m, a), "web");
        assert_eq!(name_of(&m, b), "1");
        assert_eq!(m.active().output(), Some(OutputId::new(1)));
    }

    #[test]
    fn duplicate_output_is_rejected() {
        let mut m = manager();
        let err = m.add_output(OutputId::new(1), "again".into(), screen()).unwrap_err();
        assert_eq!(err, LayoutError::AlreadyExists(Target::Output(OutputId::new(1))));
    }

    #[test]
    fn add_window_focuses_it() {
        let mut m = manager();
        m.add_window(w(1), Rect::default(), Direction::Right).unwrap();
        m.add_window(w(2), Rect::default(), Direction::Right).unwrap();
        assert_eq!(m.focused_window(), Some(w(2)));
        let ws = m.active_workspace().unwrap();
        assert_eq!(m.workspace(ws).unwrap().tree().windows(), vec![w(1), w(2)]);
        m.validate().unwrap();
    }

    #[test]
    fn add_window_without_output_is_not_found() {
        let mut m = WorkspaceManager::new(&WorkspaceSettings::default());
        let err = m.add_window(w(1), Rect::default(), Direction::Right).unwrap_err();
        assert_eq!(err, LayoutError::NotFound(Target::ActiveOutput));
    }

    #[test]
    fn removing_focused_window_falls_back_by_recency() {
        let mut m = manager();
        for i in 1..=3 {
            m.add_window(w(i), Rect::default(), Direction::Right).unwrap();
        }
        m.focus_window(w(2)).unwrap();
        m.focus_window(w(1)).unwrap();
        m.focus_window(w(3)).unwrap();
        m.focus_window(w(2)).unwrap();
        m.remove_window(w(2)).unwrap();
        assert_eq!(m.focused_window(), Some(w(3)));
        m.validate().unwrap();
    }

    #[test]
    fn removing_last_window_clears_focus() {
        let mut m = manager();
        m.add_window(w(1), Rect::default(), Direction::Right).unwrap();
        m.remove_window(w(1)).unwrap();
        assert_eq!(m.focused_window(), None);
        m.validate().unwrap();
    }

    #[test]
    fn switch_to_configured_workspace_creates_it() {
        let mut m = manager();
        let ws = m.switch_workspace("3").unwrap();
        assert_eq!(m.active_workspace(), Some(ws));
        assert!(m.workspace(ws).unwrap().is_empty());
        assert_eq!(m.focused_window(), None);
        m.validate().unwrap();
    }

    #[test]
    fn switch_to_unknown_workspace_is_not_found() {
        let mut m = manager();
        assert_eq!(
            m.switch_workspace("nope").unwrap_err(),
            LayoutError::workspace("nope")
        );
    }

    #[test]
    fn switching_back_restores_focus() {
        let mut m = manager();
        m.add_window(w(1), Rect::default(), Direction::Right).unwrap();
        m.add_window(w(2), Rect::default(), Direction::Right).unwrap();
        m.focus_window(w(1)).unwrap();
        m.switch_workspace("2").unwrap();
        assert_eq!(m.focused_window(), None);
        m.switch_workspace("1").unwrap();
        assert_eq!(m.focused_window(), Some(w(1)));
    }

    #[test]
    fn toggle_float_round_trip_keeps_window() {
        let mut m = manager();
        m.add_window(w(1), Rect::default(), Direction::Right).unwrap();
        m.add_window(w(2), Rect::new(5, 5, 300, 200), Direction::Right).unwrap();
        let ws = m.active_workspace().unwrap();

        m.toggle_float(w(2), Direction::Right, &no_gaps()).unwrap();
        let workspace = m.workspace(ws).unwrap();
        assert!(workspace.is_floating(w(2)));
        assert_eq!(workspace.tree().windows(), vec![w(1)]);
        assert_eq!(workspace.floating_windows(), &[(w(2), Rect::new(5, 5, 300, 200))]);
        m.validate().unwrap();

        m.toggle_float(w(2), Direction::Right, &no_gaps()).unwrap();
        let workspace = m.workspace(ws).unwrap();
        assert!(!workspace.is_floating(w(2)));
        assert_eq!(workspace.tree().windows(), vec![w(1), w(2)]);
        m.validate().unwrap();
    }

    #[test]
    fn floating_without_request_keeps_tiled_rect() {
        let mut m = manager();
        m.add_window(w(1), Rect::default(), Direction::Right).unwrap();
        m.add_window(w(2), Rect::default(), Direction::Right).unwrap();
        m.toggle_float(w(2), Direction::Right, &no_gaps()).unwrap();
        let ws = m.workspace(m.active_workspace().unwrap()).unwrap();
        assert_eq!(ws.floating_windows(), &[(w(2), Rect::new(960, 0, 960, 1080))]);
    }

    #[test]
    fn floating_without_request_keeps_the_gapped_tile() {
        let mut gaps = GapSettings::default();
        gaps.outer.top = 10;
        gaps.outer.left = 10;
        gaps.outer.bottom = 10;
        gaps.outer.right = 10;
        gaps.inner.horizontal = 10;
        gaps.inner.vertical = 10;

        let mut m = manager();
        m.add_window(w(1), Rect::default(), Direction::Right).unwrap();
        m.add_window(w(2), Rect::default(), Direction::Right).unwrap();
        m.toggle_float(w(2), Direction::Right, &gaps).unwrap();
        let ws = m.workspace(m.active_workspace().unwrap()).unwrap();
        assert_eq!(ws.floating_windows(), &[(w(2), Rect::new(965, 15, 940, 1050))]);
    }

    #[test]
    fn floating_last_window_leaves_empty_tree() {
        let mut m = manager();
        m.add_window(w(1), Rect::default(), Direction::Right).unwrap();
        m.toggle_float(w(1), Direction::Right, &no_gaps()).unwrap();
        let ws = m.workspace(m.active_workspace().unwrap()).unwrap();
        assert!(ws.tree().is_empty());
        assert_eq!(m.focused_window(), Some(w(1)));
        m.toggle_float(w(1), Direction::Right, &no_gaps()).unwrap();
        let ws = m.workspace(m.active_workspace().unwrap()).unwrap();
        assert_eq!(ws.tree().windows(), vec![w(1)]);
        m.validate().unwrap();
    }

    #[test]
    fn move_window_to_workspace_keeps_mode() {
        let mut m = manager();
        m.add_window(w(1), Rect::default(), Direction::Right).unwrap();
        m.add_window(w(2), Rect::new(1, 1, 50, 50), Direction::Right).unwrap();
        m.toggle_float(w(2), Direction::Right, &no_gaps()).unwrap();
        let to = m.move_window_to_workspace(w(2), "2", Direction::Right).unwrap();
        assert_eq!(m.workspace_of(w(2)), Some(to));
        assert!(m.workspace(to).unwrap().is_floating(w(2)));
        assert_eq!(m.focused_window(), Some(w(1)));
        assert_eq!(m.active().focused(to), Some(w(2)));
        m.validate().unwrap();
    }

    #[test]
    fn removing_an_output_migrates_its_workspaces() {
        let mut m = manager();
        m.add_output(OutputId::new(2), "HDMI-1".into(), screen()).unwrap();
        let ws = m.active().workspace_on(OutputId::new(2)).unwrap();
        m.remove_output(OutputId::new(2)).unwrap();
        assert_eq!(m.workspace(ws).unwrap().output, OutputId::new(1));
        assert!(m.output(OutputId::new(1)).unwrap().workspaces().contains(&ws));
        m.validate().unwrap();
    }

    #[test]
    fn removing_the_last_output_is_refused() {
        let mut m = manager();
        let err = m.remove_output(OutputId::new(1)).unwrap_err();
        assert!(err.is_invariant_violation());
        assert_eq!(m.outputs().count(), 1);
    }

    #[test]
    fn create_workspace_rejects_duplicates() {
        let mut m = manager();
        m.create_workspace("scratch").unwrap();
        assert_eq!(
            m.create_workspace("scratch").unwrap_err(),
            LayoutError::AlreadyExists(Target::Workspace("scratch".into()))
        );
        assert_eq!(name_of(&m, m.active_workspace().unwrap()), "1");
    }

    #[test]
    fn geometry_request_updates_floating_rect() {
        let mut m = manager();
        m.add_window(w(1), Rect::default(), Direction::Right).unwrap();
        m.toggle_float(w(1), Direction::Right, &no_gaps()).unwrap();
        m.request_geometry(w(1), Rect::new(9, 9, 90, 90)).unwrap();
        let ws = m.workspace(m.active_workspace().unwrap()).unwrap();
        assert_eq!(ws.floating_windows(), &[(w(1), Rect::new(9, 9, 90, 90))]);
        assert_eq!(
            m.request_geometry(w(5), Rect::default()).unwrap_err(),
            LayoutError::window(w(5))
        );
    }
}
