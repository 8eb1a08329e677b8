//! Rectangle partitioning for container trees.
//!
//! Everything here is pure: the same tree and rect always produce the same
//! placements, and nothing in the tree is touched.

use serde::{Deserialize, Serialize};

use crate::common::config::GapSettings;
use crate::layout_engine::Orientation;
use crate::model::{NodeId, NodeKind, Tree, WindowId};

/// An integer pixel rectangle. Width and height of zero or less mean the
/// rect covers nothing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Rect { x, y, width, height }
    }

    #[inline]
    pub fn is_empty(&self) -> bool { self.width <= 0 || self.height <= 0 }

    #[inline]
    pub fn area(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.width as i64 * self.height as i64
        }
    }

    #[inline]
    pub fn max_x(&self) -> i32 { self.x.saturating_add(self.width) }

    #[inline]
    pub fn max_y(&self) -> i32 { self.y.saturating_add(self.height) }

    /// Shrinks each edge by the given amount, never below zero size.
    pub fn inset(&self, left: i32, top: i32, right: i32, bottom: i32) -> Rect {
        Rect {
            x: self.x.saturating_add(left),
            y: self.y.saturating_add(top),
            width: self.width.saturating_sub(left).saturating_sub(right).max(0),
            height: self.height.saturating_sub(top).saturating_sub(bottom).max(0),
        }
    }

    /// A rect of `width` x `height` centered in `self`.
    pub fn centered(&self, width: i32, height: i32) -> Rect {
        Rect {
            x: self.x.saturating_add(self.width.saturating_sub(width) / 2),
            y: self.y.saturating_add(self.height.saturating_sub(height) / 2),
            width,
            height,
        }
    }

    fn extent(&self, axis: Orientation) -> i32 {
        match axis {
            Orientation::Horizontal => self.width,
            Orientation::Vertical => self.height,
        }
    }

    /// The slice `[start, end)` of this rect along `axis`.
    fn slice(&self, axis: Orientation, start: i32, end: i32) -> Rect {
        match axis {
            Orientation::Horizontal => {
                Rect::new(self.x.saturating_add(start), self.y, end - start, self.height)
            }
            Orientation::Vertical => {
                Rect::new(self.x, self.y.saturating_add(start), self.width, end - start)
            }
        }
    }
}

/// Computes the rect of every visible window of `tree` inside `rect`, in
/// traversal order.
///
/// Each split divides its rect along its axis in proportion to the child
/// ratios. Boundaries are rounded from the running ratio sum and the last
/// child always ends exactly at the parent's edge, so siblings tile their
/// parent without gaps or overlap. An empty tree or empty rect yields no
/// placements.
pub fn layout(tree: &Tree, rect: Rect) -> Vec<(WindowId, Rect)> {
    let mut out = Vec::with_capacity(tree.len());
    if rect.is_empty() {
        return out;
    }
    if let Some(root) = tree.root() {
        layout_node(tree, root, rect, &mut out);
    }
    out
}

fn layout_node(tree: &Tree, node: NodeId, rect: Rect, out: &mut Vec<(WindowId, Rect)>) {
    let Some(node) = tree.node(node) else { return };
    match &node.kind {
        NodeKind::Leaf(wid) => out.push((*wid, rect)),
        NodeKind::Split(split) if split.layout.is_group() => {
            if let Some(child) = split.selected_child() {
                layout_node(tree, child, rect, out);
            }
        }
        NodeKind::Split(split) => {
            let axis = split.layout.orientation();
            let ratios: Vec<f64> = split
                .children
                .iter()
                .map(|&c| tree.node(c).map_or(0.0, |n| n.ratio))
                .collect();
            for (child, part) in split.children.iter().zip(partition(rect, axis, &ratios)) {
                if !part.is_empty() {
                    layout_node(tree, *child, part, out);
                }
            }
        }
    }
}

/// Splits `rect` along `axis` into one slice per ratio.
pub fn partition(rect: Rect, axis: Orientation, ratios: &[f64]) -> Vec<Rect> {
    let total: f64 = ratios.iter().sum();
    let length = rect.extent(axis);
    let mut slices = Vec::with_capacity(ratios.len());
    let mut start = 0;
    let mut acc = 0.0;
    for (i, ratio) in ratios.iter().enumerate() {
        acc += ratio;
        let end = if i + 1 == ratios.len() || total <= 0.0 {
            length
        } else {
            ((length as f64) * acc / total).round() as i32
        };
        let end = end.clamp(start, length);
        slices.push(rect.slice(axis, start, end));
        start = end;
    }
    slices
}

/// The part of an output left for tiling after the outer gaps.
pub fn tiling_area(output: Rect, gaps: &GapSettings) -> Rect {
    let outer = &gaps.outer;
    output.inset(outer.left, outer.top, outer.right, outer.bottom)
}

/// Shrinks a tile by half the inner gap on each side, so neighbouring
/// tiles end up one full gap apart.
pub fn apply_inner_gap(rect: Rect, gaps: &GapSettings) -> Rect {
    let (h, v) = (gaps.inner.horizontal, gaps.inner.vertical);
    rect.inset(h / 2, v / 2, h - h / 2, v - v / 2)
}

/// Tiled rects of `tree` on an output, after outer and inner gaps.
pub fn tile_rects(tree: &Tree, output: Rect, gaps: &GapSettings) -> Vec<(WindowId, Rect)> {
    layout(tree, tiling_area(output, gaps))
        .into_iter()
        .map(|(w, r)| (w, apply_inner_gap(r, gaps)))
        .collect()
}
