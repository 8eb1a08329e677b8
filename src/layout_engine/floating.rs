use serde::{Deserialize, Serialize};

use crate::layout_engine::{Direction, Rect};
use crate::model::WindowId;

/// Floating windows of one workspace in stacking order, bottom first.
///
/// The whole layer is composited above the tiled tree; order within the
/// layer follows focus.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct FloatingLayer {
    windows: Vec<(WindowId, Rect)>,
    last_floating_focus: Option<WindowId>,
}

impl FloatingLayer {
    pub(crate) fn new() -> Self { Self::default() }

    pub(crate) fn is_floating(&self, window_id: WindowId) -> bool {
        self.windows.iter().any(|(w, _)| *w == window_id)
    }

    /// Puts the window on top of the layer.
    pub(crate) fn add_floating(&mut self, window_id: WindowId, rect: Rect) {
        self.remove_floating(window_id);
        self.windows.push((window_id, rect));
    }

    pub(crate) fn remove_floating(&mut self, window_id: WindowId) -> Option<Rect> {
        if self.last_floating_focus == Some(window_id) {
            self.last_floating_focus = None;
        }
        let idx = self.windows.iter().position(|(w, _)| *w == window_id)?;
        Some(self.windows.remove(idx).1)
    }

    pub(crate) fn rect(&self, window_id: WindowId) -> Option<Rect> {
        self.windows.iter().find(|(w, _)| *w == window_id).map(|(_, r)| *r)
    }

    pub(crate) fn set_rect(&mut self, window_id: WindowId, rect: Rect) -> bool {
        match self.windows.iter_mut().find(|(w, _)| *w == window_id) {
            Some((_, r)) => {
                *r = rect;
                true
            }
            None => false,
        }
    }

    /// Moves the window to the top of the stacking order.
    pub(crate) fn raise(&mut self, window_id: WindowId) {
        if let Some(idx) = self.windows.iter().position(|(w, _)| *w == window_id) {
            let entry = self.windows.remove(idx);
            self.windows.push(entry);
        }
    }

    /// Windows with their rects, bottom of the stack first.
    pub(crate) fn stacking_order(&self) -> &[(WindowId, Rect)] { &self.windows }

    pub(crate) fn windows(&self) -> impl Iterator<Item = WindowId> + '_ {
        self.windows.iter().map(|(w, _)| *w)
    }

    pub(crate) fn is_empty(&self) -> bool { self.windows.is_empty() }

    pub(crate) fn last_focus(&self) -> Option<WindowId> { self.last_floating_focus }

    pub(crate) fn set_last_focus(&mut self, window_id: Option<WindowId>) {
        self.last_floating_focus = window_id;
    }

    /// The floating window after (`Right`/`Down`) or before `from`, in
    /// placement order. Wraps around.
    pub(crate) fn cycle(&self, from: WindowId, direction: Direction) -> Option<WindowId> {
        let mut ids: Vec<WindowId> = self.windows().collect();
        ids.sort();
        let idx = ids.iter().position(|w| *w == from)?;
        let len = ids.len();
        let next = if direction.is_forward() { (idx + 1) % len } else { (idx + len - 1) % len };
        (ids[next] != from).then_some(ids[next])
    }
}
