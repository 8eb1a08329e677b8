//! The tiled container tree of a single workspace.
//!
//! Nodes live in a slotmap arena and refer to each other by [`NodeId`]. A
//! node is either a [`Split`] with at least two children or a leaf holding
//! one window. Every mutation goes through a small set of primitives
//! (`detach`, `insert_child`, `replace_child`) that only ever attach nodes
//! which are currently detached, so the structure cannot grow a cycle.

use serde::{Deserialize, Serialize};
use slotmap::{SlotMap, new_key_type};
use tracing::trace;

use crate::common::collections::{HashMap, HashSet};
use crate::layout_engine::{Direction, LayoutError, LayoutKind, Target};
use crate::model::{FocusStack, WindowId};

new_key_type! {
    pub struct NodeId;
}

const RATIO_EPSILON: f64 = 1e-6;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Split {
    pub layout: LayoutKind,
    pub children: Vec<NodeId>,
    /// The child shown by group layouts, and the one focus returns to.
    pub selected: usize,
}

impl Split {
    fn new(layout: LayoutKind) -> Self {
        Split {
            layout,
            children: Vec::with_capacity(2),
            selected: 0,
        }
    }

    pub fn position(&self, child: NodeId) -> Option<usize> {
        self.children.iter().position(|&c| c == child)
    }

    pub fn selected_child(&self) -> Option<NodeId> { self.children.get(self.selected).copied() }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    Split(Split),
    Leaf(WindowId),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub parent: Option<NodeId>,
    /// Share of the parent's rect along the parent's axis.
    pub ratio: f64,
    pub kind: NodeKind,
}

impl Node {
    fn leaf(wid: WindowId) -> Self {
        Node {
            parent: None,
            ratio: 1.0,
            kind: NodeKind::Leaf(wid),
        }
    }

    pub fn window(&self) -> Option<WindowId> {
        match self.kind {
            NodeKind::Leaf(wid) => Some(wid),
            NodeKind::Split(_) => None,
        }
    }

    pub fn as_split(&self) -> Option<&Split> {
        match &self.kind {
            NodeKind::Split(split) => Some(split),
            NodeKind::Leaf(_) => None,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Tree {
    nodes: SlotMap<NodeId, Node>,
    root: Option<NodeId>,
    windows: HashMap<WindowId, NodeId>,
}

impl Tree {
    pub fn new() -> Self { Self::default() }

    #[inline]
    pub fn root(&self) -> Option<NodeId> { self.root }

    #[inline]
    pub fn node(&self, id: NodeId) -> Option<&Node> { self.nodes.get(id) }

    #[inline]
    pub fn len(&self) -> usize { self.windows.len() }

    #[inline]
    pub fn is_empty(&self) -> bool { self.root.is_none() }

    #[inline]
    pub fn contains(&self, wid: WindowId) -> bool { self.windows.contains_key(&wid) }

    #[inline]
    pub fn leaf_of(&self, wid: WindowId) -> Option<NodeId> { self.windows.get(&wid).copied() }

    pub fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node).and_then(|n| n.parent)
    }

    pub fn split(&self, node: NodeId) -> Option<&Split> {
        self.nodes.get(node).and_then(Node::as_split)
    }

    fn split_mut(&mut self, node: NodeId) -> Option<&mut Split> {
        match self.nodes.get_mut(node).map(|n| &mut n.kind) {
            Some(NodeKind::Split(split)) => Some(split),
            _ => None,
        }
    }

    /// Walks from `node` (exclusive) up to the root.
    pub fn ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent_of(node), move |&n| self.parent_of(n))
    }

    pub fn traverse_preorder(&self, from: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let mut stack = vec![from];
        std::iter::from_fn(move || {
            let next = stack.pop()?;
            if let Some(split) = self.split(next) {
                stack.extend(split.children.iter().rev());
            }
            Some(next)
        })
    }

    /// All windows in traversal order.
    pub fn windows(&self) -> Vec<WindowId> {
        match self.root {
            Some(root) => self.windows_under(root),
            None => vec![],
        }
    }

    pub fn windows_under(&self, node: NodeId) -> Vec<WindowId> {
        self.traverse_preorder(node)
            .filter_map(|n| self.nodes.get(n).and_then(Node::window))
            .collect()
    }

    /// Windows that get a rect: group layouts only show their selected child.
    pub fn visible_windows(&self) -> Vec<WindowId> {
        let mut out = Vec::with_capacity(self.windows.len());
        if let Some(root) = self.root {
            self.collect_visible(root, &mut out);
        }
        out
    }

    fn visible_under(&self, node: NodeId) -> Vec<WindowId> {
        let mut out = vec![];
        self.collect_visible(node, &mut out);
        out
    }

    fn collect_visible(&self, node: NodeId, out: &mut Vec<WindowId>) {
        match self.nodes.get(node).map(|n| &n.kind) {
            Some(NodeKind::Leaf(wid)) => out.push(*wid),
            Some(NodeKind::Split(split)) if split.layout.is_group() => {
                if let Some(child) = split.selected_child() {
                    self.collect_visible(child, out);
                }
            }
            Some(NodeKind::Split(split)) => {
                for &child in &split.children {
                    self.collect_visible(child, out);
                }
            }
            None => {}
        }
    }

    fn last_leaf(&self) -> Option<NodeId> {
        let root = self.root?;
        self.traverse_preorder(root)
            .filter(|&n| matches!(self.nodes[n].kind, NodeKind::Leaf(_)))
            .last()
    }

    /// Adds `wid` right after the leaf of `target` in that leaf's parent
    /// split, whatever the split's axis. A target without a parent is split
    /// in place along `direction`.
    ///
    /// With no target the window goes after the last leaf, or becomes the
    /// root leaf when the tree is empty.
    pub fn add(
        &mut self,
        target: Option<WindowId>,
        wid: WindowId,
        direction: Direction,
    ) -> Result<NodeId, LayoutError> {
        self.place(target, wid, direction, true)
    }

    /// Adds `wid` next to the leaf of `target`, splitting it along
    /// `direction` when its parent runs along the other axis.
    ///
    /// With no target the window goes next to the last leaf, or becomes the
    /// root leaf when the tree is empty.
    pub fn insert(
        &mut self,
        target: Option<WindowId>,
        wid: WindowId,
        direction: Direction,
    ) -> Result<NodeId, LayoutError> {
        self.place(target, wid, direction, false)
    }

    fn place(
        &mut self,
        target: Option<WindowId>,
        wid: WindowId,
        direction: Direction,
        join_parent: bool,
    ) -> Result<NodeId, LayoutError> {
        if self.contains(wid) {
            return Err(LayoutError::AlreadyExists(Target::Window(wid)));
        }
        let target = match target {
            Some(t) => Some(self.leaf_of(t).ok_or(LayoutError::window(t))?),
            None => self.last_leaf(),
        };
        let leaf = self.nodes.insert(Node::leaf(wid));
        self.windows.insert(wid, leaf);
        match target {
            None => self.root = Some(leaf),
            Some(target) => self.attach_beside(target, leaf, direction, join_parent),
        }
        trace!(?wid, ?leaf, "inserted");
        Ok(leaf)
    }

    /// Removes the leaf holding `wid`. Returns the node now occupying the
    /// slot of the affected parent, if any remains.
    pub fn remove(&mut self, wid: WindowId) -> Result<Option<NodeId>, LayoutError> {
        let leaf = self.leaf_of(wid).ok_or(LayoutError::window(wid))?;
        let affected = self.detach(leaf)?;
        self.nodes.remove(leaf);
        self.windows.remove(&wid);
        trace!(?wid, ?affected, "removed");
        Ok(affected)
    }

    /// Moves the window one step in `direction`: swapping with a sibling,
    /// escaping into the nearest ancestor along the same axis, or wrapping the
    /// whole tree in a new split when no such ancestor exists.
    pub fn move_window(&mut self, wid: WindowId, direction: Direction) -> Result<(), LayoutError> {
        let leaf = self.leaf_of(wid).ok_or(LayoutError::window(wid))?;
        let Some(parent) = self.parent_of(leaf) else {
            return Ok(());
        };
        let axis = direction.orientation();
        let parent_split = self.expect_split(parent)?;
        let parent_matches = parent_split.layout.orientation() == axis;
        if parent_matches {
            let idx = self.position_in(parent, leaf)?;
            if let Some(other) = direction.step(idx, parent_split.children.len()) {
                self.swap_children(parent, idx, other)?;
                return Ok(());
            }
        }

        let mut child = parent;
        let mut ancestor = self.parent_of(parent);
        while let Some(a) = ancestor {
            if self.expect_split(a)?.layout.orientation() == axis {
                break;
            }
            child = a;
            ancestor = self.parent_of(a);
        }

        match ancestor {
            Some(ancestor) => {
                let idx = self.position_in(ancestor, child)?;
                // The leaf sits strictly below `child`, so detaching it can
                // only rewrite the contents of that slot, not its index.
                self.detach(leaf)?;
                let at = if direction.is_forward() { idx + 1 } else { idx };
                self.insert_child(ancestor, at, leaf)?;
            }
            None if parent_matches && self.root == Some(parent) => {}
            None => {
                self.detach(leaf)?;
                let rest = self
                    .root
                    .ok_or_else(|| LayoutError::invariant("tree emptied while moving"))?;
                let wrapper = self.nodes.insert(Node {
                    parent: None,
                    ratio: 1.0,
                    kind: NodeKind::Split(Split::new(LayoutKind::from(axis))),
                });
                let children = if direction.is_forward() { [rest, leaf] } else { [leaf, rest] };
                for child in children {
                    let node = &mut self.nodes[child];
                    node.parent = Some(wrapper);
                    node.ratio = 0.5;
                }
                let split = self.split_mut(wrapper).ok_or_else(|| LayoutError::invariant("wrapper"))?;
                split.children.extend(children);
                split.selected = if direction.is_forward() { 1 } else { 0 };
                self.root = Some(wrapper);
            }
        }
        trace!(?wid, ?direction, "moved");
        Ok(())
    }

    /// Marks the path from the root down to `wid` as selected.
    pub fn select(&mut self, wid: WindowId) -> Result<(), LayoutError> {
        let mut node = self.leaf_of(wid).ok_or(LayoutError::window(wid))?;
        while let Some(parent) = self.parent_of(node) {
            let idx = self.position_in(parent, node)?;
            if let Some(split) = self.split_mut(parent) {
                split.selected = idx;
            }
            node = parent;
        }
        Ok(())
    }

    /// Changes the layout of the split holding `wid`. A root leaf has no
    /// split and is left alone.
    pub fn set_layout(&mut self, wid: WindowId, layout: LayoutKind) -> Result<(), LayoutError> {
        let leaf = self.leaf_of(wid).ok_or(LayoutError::window(wid))?;
        if let Some(parent) = self.parent_of(leaf) {
            if let Some(split) = self.split_mut(parent) {
                split.layout = layout;
            }
        }
        Ok(())
    }

    pub fn toggle_orientation(&mut self, wid: WindowId) -> Result<(), LayoutError> {
        let leaf = self.leaf_of(wid).ok_or(LayoutError::window(wid))?;
        if let Some(parent) = self.parent_of(leaf) {
            if let Some(split) = self.split_mut(parent) {
                split.layout = split.layout.toggle_orientation();
            }
        }
        Ok(())
    }

    /// Grows the slot holding `wid` by `amount` of its parent's extent,
    /// taking the space proportionally from the siblings. Group layouts are
    /// skipped since all of their children share one rect.
    pub fn resize(&mut self, wid: WindowId, amount: f64, min_ratio: f64) -> Result<(), LayoutError> {
        if !amount.is_finite() || !min_ratio.is_finite() {
            return Err(LayoutError::invariant(format!(
                "cannot resize by {amount} with minimum ratio {min_ratio}"
            )));
        }
        let mut node = self.leaf_of(wid).ok_or(LayoutError::window(wid))?;
        let parent = loop {
            let Some(parent) = self.parent_of(node) else {
                return Ok(());
            };
            if !self.expect_split(parent)?.layout.is_group() {
                break parent;
            }
            node = parent;
        };

        let children = self.expect_split(parent)?.children.clone();
        let n = children.len() as f64;
        let max = (1.0 - min_ratio * (n - 1.0)).max(min_ratio);
        let old = self.nodes[node].ratio;
        let new = (old + amount).clamp(min_ratio, max);
        let others_old = 1.0 - old;
        let others_new = 1.0 - new;
        for &child in &children {
            let ratio = &mut self.nodes[child].ratio;
            *ratio = if child == node {
                new
            } else if others_old > RATIO_EPSILON {
                (*ratio * others_new / others_old).max(min_ratio)
            } else {
                (others_new / (n - 1.0)).max(min_ratio)
            };
        }
        self.renormalize(parent);
        Ok(())
    }

    /// The window focus should move to from `wid` in `direction`.
    ///
    /// Climbs to the nearest split along `direction`'s axis that has a
    /// sibling on that side, then descends into the sibling, preferring the
    /// most recently focused window in it.
    pub fn neighbor(
        &self,
        wid: WindowId,
        direction: Direction,
        recency: &FocusStack,
    ) -> Result<Option<WindowId>, LayoutError> {
        let mut node = self.leaf_of(wid).ok_or(LayoutError::window(wid))?;
        while let Some(parent) = self.parent_of(node) {
            let split = self.expect_split(parent)?;
            if split.layout.orientation() == direction.orientation() {
                let idx = self.position_in(parent, node)?;
                if let Some(next) = direction.step(idx, split.children.len()) {
                    let candidates = self.visible_under(split.children[next]);
                    let preferred = recency.iter().find(|w| candidates.contains(w));
                    return Ok(preferred.or_else(|| candidates.first().copied()));
                }
            }
            node = parent;
        }
        Ok(None)
    }

    pub fn draw_tree(&self) -> String {
        let Some(root) = self.root else {
            return "<empty>".to_string();
        };
        let mut out = String::new();
        if ascii_tree::write_tree(&mut out, &self.ascii_tree(root)).is_err() {
            out.clear();
        }
        out
    }

    fn ascii_tree(&self, node: NodeId) -> ascii_tree::Tree {
        let status = match self.parent_of(node).and_then(|p| self.split(p)) {
            None => "",
            Some(split) if split.selected_child() == Some(node) => "☒ ",
            Some(_) => "☐ ",
        };
        let ratio = self.nodes[node].ratio;
        match &self.nodes[node].kind {
            NodeKind::Leaf(wid) => ascii_tree::Tree::Leaf(vec![format!("{status}{wid} {ratio:.3}")]),
            NodeKind::Split(split) => ascii_tree::Tree::Node(
                format!("{status}{:?} {ratio:.3}", split.layout),
                split.children.iter().map(|&c| self.ascii_tree(c)).collect(),
            ),
        }
    }

    /// Checks the structural invariants: links agree in both directions,
    /// splits have two or more children whose ratios are positive and sum
    /// to one, every node is reachable exactly once from the root, and the
    /// window index matches the leaves.
    pub fn validate(&self) -> Result<(), LayoutError> {
        let Some(root) = self.root else {
            if !self.nodes.is_empty() || !self.windows.is_empty() {
                return Err(LayoutError::invariant(format!(
                    "empty tree still holds {} nodes",
                    self.nodes.len()
                )));
            }
            return Ok(());
        };
        let root_node = self
            .nodes
            .get(root)
            .ok_or_else(|| LayoutError::invariant("root is not in the arena"))?;
        if root_node.parent.is_some() {
            return Err(LayoutError::invariant("root has a parent"));
        }

        let mut seen = HashSet::default();
        let mut stack = vec![root];
        let mut leaves = 0;
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                return Err(LayoutError::invariant(format!("{id:?} reached twice")));
            }
            let node = self
                .nodes
                .get(id)
                .ok_or_else(|| LayoutError::invariant(format!("dangling child {id:?}")))?;
            match &node.kind {
                NodeKind::Leaf(wid) => {
                    leaves += 1;
                    if self.windows.get(wid) != Some(&id) {
                        return Err(LayoutError::invariant(format!(
                            "{wid} is not indexed at its leaf"
                        )));
                    }
                }
                NodeKind::Split(split) => {
                    if split.children.len() < 2 {
                        return Err(LayoutError::invariant(format!(
                            "split {id:?} has {} children",
                            split.children.len()
                        )));
                    }
                    if split.selected >= split.children.len() {
                        return Err(LayoutError::invariant(format!(
                            "split {id:?} selects child {} of {}",
                            split.selected,
                            split.children.len()
                        )));
                    }
                    let mut sum = 0.0;
                    for &child in &split.children {
                        let child_node = self.nodes.get(child).ok_or_else(|| {
                            LayoutError::invariant(format!("dangling child {child:?}"))
                        })?;
                        if child_node.parent != Some(id) {
                            return Err(LayoutError::invariant(format!(
                                "{child:?} does not point back to {id:?}"
                            )));
                        }
                        if !(child_node.ratio > 0.0) {
                            return Err(LayoutError::invariant(format!(
                                "{child:?} has ratio {}",
                                child_node.ratio
                            )));
                        }
                        sum += child_node.ratio;
                        stack.push(child);
                    }
                    if (sum - 1.0).abs() > RATIO_EPSILON {
                        return Err(LayoutError::invariant(format!(
                            "ratios of {id:?} sum to {sum}"
                        )));
                    }
                }
            }
        }
        if seen.len() != self.nodes.len() {
            return Err(LayoutError::invariant(format!(
                "{} nodes are not reachable from the root",
                self.nodes.len() - seen.len()
            )));
        }
        if leaves != self.windows.len() {
            return Err(LayoutError::invariant(format!(
                "{} leaves but {} indexed windows",
                leaves,
                self.windows.len()
            )));
        }
        Ok(())
    }

    fn expect_split(&self, node: NodeId) -> Result<&Split, LayoutError> {
        self.split(node)
            .ok_or_else(|| LayoutError::invariant(format!("{node:?} is not a split")))
    }

    fn position_in(&self, parent: NodeId, child: NodeId) -> Result<usize, LayoutError> {
        self.expect_split(parent)?
            .position(child)
            .ok_or_else(|| LayoutError::invariant(format!("{child:?} missing from {parent:?}")))
    }

    fn attach_beside(
        &mut self,
        target: NodeId,
        new: NodeId,
        direction: Direction,
        join_parent: bool,
    ) {
        let parent = self.parent_of(target);
        let joins_parent = parent.and_then(|p| self.split(p)).is_some_and(|split| {
            join_parent
                || split.layout.is_group()
                || split.layout.orientation() == direction.orientation()
        });
        if let (Some(parent), true) = (parent, joins_parent) {
            if let Ok(idx) = self.position_in(parent, target) {
                let at = if join_parent || direction.is_forward() { idx + 1 } else { idx };
                // Cannot fail: `parent` was just checked to be a split.
                let _ = self.insert_child(parent, at, new);
                return;
            }
        }

        let split = self.nodes.insert(Node {
            parent: None,
            ratio: 1.0,
            kind: NodeKind::Split(Split::new(LayoutKind::from(direction.orientation()))),
        });
        self.replace_child(parent, target, split);
        let children = if direction.is_forward() { [target, new] } else { [new, target] };
        for child in children {
            let node = &mut self.nodes[child];
            node.parent = Some(split);
            node.ratio = 0.5;
        }
        if let Some(s) = self.split_mut(split) {
            s.children.extend(children);
            s.selected = if direction.is_forward() { 0 } else { 1 };
        }
    }

    /// Puts `new` at index `at` of `parent`, shrinking the existing children
    /// to make room for an equal share.
    fn insert_child(&mut self, parent: NodeId, at: usize, new: NodeId) -> Result<(), LayoutError> {
        let children = self.expect_split(parent)?.children.clone();
        let n = children.len() as f64;
        for child in children {
            self.nodes[child].ratio *= n / (n + 1.0);
        }
        let node = &mut self.nodes[new];
        node.parent = Some(parent);
        node.ratio = 1.0 / (n + 1.0);
        let split = self
            .split_mut(parent)
            .ok_or_else(|| LayoutError::invariant("parent stopped being a split"))?;
        let at = at.min(split.children.len());
        split.children.insert(at, new);
        if split.selected >= at && split.children.len() > 1 {
            split.selected += 1;
        }
        Ok(())
    }

    /// Points `parent`'s slot for `old` (or the root) at `new`, which takes
    /// over `old`'s ratio. `old` is left detached.
    fn replace_child(&mut self, parent: Option<NodeId>, old: NodeId, new: NodeId) {
        let ratio = self.nodes[old].ratio;
        match parent {
            None => self.root = Some(new),
            Some(p) => {
                if let Some(split) = self.split_mut(p) {
                    for child in split.children.iter_mut().filter(|c| **c == old) {
                        *child = new;
                    }
                }
            }
        }
        let node = &mut self.nodes[new];
        node.parent = parent;
        node.ratio = ratio;
        self.nodes[old].parent = None;
    }

    fn swap_children(&mut self, parent: NodeId, a: usize, b: usize) -> Result<(), LayoutError> {
        let split = self
            .split_mut(parent)
            .ok_or_else(|| LayoutError::invariant("swap outside a split"))?;
        split.children.swap(a, b);
        if split.selected == a {
            split.selected = b;
        } else if split.selected == b {
            split.selected = a;
        }
        let (na, nb) = (split.children[a], split.children[b]);
        let ra = self.nodes[na].ratio;
        self.nodes[na].ratio = self.nodes[nb].ratio;
        self.nodes[nb].ratio = ra;
        Ok(())
    }

    /// Unlinks `node` from its parent, collapsing the parent if it is left
    /// with a single child. The node stays in the arena.
    fn detach(&mut self, node: NodeId) -> Result<Option<NodeId>, LayoutError> {
        let Some(parent) = self.parent_of(node) else {
            if self.root == Some(node) {
                self.root = None;
            }
            return Ok(None);
        };
        let idx = self.position_in(parent, node)?;
        let remaining = {
            let split = self
                .split_mut(parent)
                .ok_or_else(|| LayoutError::invariant("detach outside a split"))?;
            split.children.remove(idx);
            if split.selected > idx || split.selected >= split.children.len() {
                split.selected = split.selected.saturating_sub(1);
            }
            split.children.clone()
        };
        self.nodes[node].parent = None;

        match remaining.as_slice() {
            [] => Err(LayoutError::invariant(format!("{parent:?} had a single child"))),
            [only] => {
                let only = *only;
                let grandparent = self.parent_of(parent);
                self.replace_child(grandparent, parent, only);
                self.nodes.remove(parent);
                Ok(Some(only))
            }
            _ => {
                self.renormalize(parent);
                Ok(Some(parent))
            }
        }
    }

    fn renormalize(&mut self, parent: NodeId) {
        let Some(children) = self.split(parent).map(|s| s.children.clone()) else {
            return;
        };
        let sum: f64 = children.iter().map(|&c| self.nodes[c].ratio).sum();
        let n = children.len() as f64;
        for child in children {
            let ratio = &mut self.nodes[child].ratio;
            *ratio = if sum > RATIO_EPSILON { *ratio / sum } else { 1.0 / n };
        }
    }
}
