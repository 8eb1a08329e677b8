use serde::{Deserialize, Serialize};

use crate::common::collections::{HashSet, VecDeque};
use crate::model::WindowId;

/// Focus history of one workspace, most recently focused first.
///
/// An id appears at most once. Focusing an id that is already present moves
/// it to the front, so the order is a strict recency order and ties cannot
/// occur.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusStack {
    entries: VecDeque<WindowId>,
}

impl FocusStack {
    pub fn new() -> Self { Self::default() }

    pub fn record_focus(&mut self, wid: WindowId) {
        self.remove(wid);
        self.entries.push_front(wid);
    }

    /// Tracks a window that was not focused, as the least recent entry.
    pub fn push_back(&mut self, wid: WindowId) {
        if !self.contains(wid) {
            self.entries.push_back(wid);
        }
    }

    pub fn remove(&mut self, wid: WindowId) { self.entries.retain(|&w| w != wid); }

    /// First entry not in `excluded`, scanning from the most recent.
    ///
    /// When several windows close at once, pass all of them: the survivor
    /// focused most recently wins.
    pub fn most_recent_excluding(&self, excluded: &HashSet<WindowId>) -> Option<WindowId> {
        self.entries.iter().copied().find(|w| !excluded.contains(w))
    }

    #[inline]
    pub fn front(&self) -> Option<WindowId> { self.entries.front().copied() }

    #[inline]
    pub fn contains(&self, wid: WindowId) -> bool { self.entries.contains(&wid) }

    pub fn iter(&self) -> impl Iterator<Item = WindowId> + '_ { self.entries.iter().copied() }

    #[inline]
    pub fn len(&self) -> usize { self.entries.len() }

    #[inline]
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn retain(&mut self, keep: impl FnMut(&WindowId) -> bool) { self.entries.retain(keep) }
}
