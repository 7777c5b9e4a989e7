//! Hit testing and buffer-iteration primitives (spec.md §4.G).

use crate::scene::geometry::node_coords;
use crate::scene::node::{BufferNode, Node, NodeTag, RectNode, TreeNode};
use crate::scene::output::SceneOutput;
use crate::utils::{Logical, Rectangle};

/// The result of a successful [`crate::scene::Scene::node_at`] query.
#[derive(Debug, Clone)]
pub struct Hit {
    /// The node that was hit.
    pub node: Node,
    /// The hit point, translated into `node`'s own local coordinates.
    pub local_x: i32,
    pub local_y: i32,
}

/// Depth-first hit test starting at `root`, honoring `enabled` and z-order
/// (children are tested topmost-first).
pub(crate) fn node_at(root: &TreeNode, lx: i32, ly: i32) -> Option<Hit> {
    search(root.node(), lx, ly)
}

fn search(node: &Node, px: i32, py: i32) -> Option<Hit> {
    if !node.enabled() {
        return None;
    }
    let (nx, ny) = node.position();
    let lx = px - nx;
    let ly = py - ny;

    match node.tag() {
        NodeTag::Tree => {
            let tree = TreeNode::from_node(node.clone())?;
            for child in tree.children().into_iter().rev() {
                if let Some(hit) = search(&child, lx, ly) {
                    return Some(hit);
                }
            }
            None
        }
        NodeTag::Rect => {
            let rect = RectNode::from_node(node.clone())?;
            let (w, h) = rect.size();
            (lx >= 0 && ly >= 0 && lx < w && ly < h).then(|| Hit {
                node: node.clone(),
                local_x: lx,
                local_y: ly,
            })
        }
        NodeTag::Buffer => {
            let buffer = BufferNode::from_node(node.clone())?;
            buffer.point_accepts_input(lx, ly).then(|| Hit {
                node: node.clone(),
                local_x: lx,
                local_y: ly,
            })
        }
    }
}

/// Enabled-aware pre-order traversal invoking `f(buffer, global_x,
/// global_y)` for every `Buffer` descendant of `root`.
pub(crate) fn for_each_buffer(root: &TreeNode, mut f: impl FnMut(&BufferNode, i32, i32)) {
    walk(root.node(), &mut f);
}

fn walk(node: &Node, f: &mut impl FnMut(&BufferNode, i32, i32)) {
    if !node.enabled() {
        return;
    }
    match node.tag() {
        NodeTag::Tree => {
            if let Some(tree) = TreeNode::from_node(node.clone()) {
                for child in tree.children() {
                    walk(&child, f);
                }
            }
        }
        NodeTag::Buffer => {
            if let Some(buffer) = BufferNode::from_node(node.clone()) {
                let (gx, gy, _) = node_coords(node);
                f(&buffer, gx, gy);
            }
        }
        NodeTag::Rect => {}
    }
}

/// Like [`for_each_buffer`], filtered to `Buffer` descendants whose
/// bounding box intersects `output`'s viewport.
pub(crate) fn output_for_each_buffer(root: &TreeNode, output: &SceneOutput, mut f: impl FnMut(&BufferNode, i32, i32)) {
    let viewport = output.viewport();
    walk_filtered(root.node(), viewport, &mut f);
}

fn walk_filtered(node: &Node, viewport: Rectangle<i32, Logical>, f: &mut impl FnMut(&BufferNode, i32, i32)) {
    if !node.enabled() {
        return;
    }
    match node.tag() {
        NodeTag::Tree => {
            if let Some(tree) = TreeNode::from_node(node.clone()) {
                for child in tree.children() {
                    walk_filtered(&child, viewport, f);
                }
            }
        }
        NodeTag::Buffer => {
            if let Some(buffer) = BufferNode::from_node(node.clone()) {
                let (gx, gy, _) = node_coords(node);
                let (w, h) = buffer.size();
                let box_: Rectangle<i32, Logical> = Rectangle::from_loc_and_size((gx, gy), (w, h));
                if box_.overlaps(viewport) {
                    f(&buffer, gx, gy);
                }
            }
        }
        NodeTag::Rect => {}
    }
}
