//! Output-membership tracking: keeping each `Buffer` node's
//! `active_outputs`/`primary_output` in sync with the tree's geometry
//! (spec.md §4.E).

use std::cell::RefCell;
use std::rc::Rc;

use crate::scene::geometry::node_coords;
use crate::scene::node::{BufferNode, Node, NodeTag, TreeNode};
use crate::scene::SceneInner;
use crate::utils::{Logical, Rectangle};

/// Reruns membership for `node`'s own subtree (a `Buffer` leaf, or every
/// `Buffer` descendant of a `Tree`/`Rect`).
pub(crate) fn recompute_subtree(node: &Node) {
    if let Some(scene) = node.scene_handle() {
        recompute_node(node, &scene, None);
    }
}

/// Reruns membership for the whole scene tree. `ignore_output`, when set,
/// excludes that output's contribution — used while it is being destroyed,
/// so `Buffer` nodes still tracking it see it leave.
pub(crate) fn recompute_scene(scene: &Rc<RefCell<SceneInner>>, ignore_output: Option<usize>) {
    let root = scene.borrow().root.node().clone();
    recompute_node(&root, scene, ignore_output);
}

fn recompute_node(node: &Node, scene: &Rc<RefCell<SceneInner>>, ignore_output: Option<usize>) {
    match node.tag() {
        NodeTag::Tree => {
            if let Some(tree) = TreeNode::from_node(node.clone()) {
                for child in tree.children() {
                    recompute_node(&child, scene, ignore_output);
                }
            }
        }
        NodeTag::Buffer => {
            if let Some(buffer) = BufferNode::from_node(node.clone()) {
                update_buffer_membership(&buffer, scene, ignore_output);
            }
        }
        NodeTag::Rect => {}
    }
}

fn update_buffer_membership(buffer: &BufferNode, scene: &Rc<RefCell<SceneInner>>, ignore_output: Option<usize>) {
    // A disabled (along its ancestor chain) Buffer is left exactly as it
    // was: membership is only re-evaluated lazily, the next time something
    // triggers a recompute while the node is enabled again (spec.md §9).
    let (lx, ly, enabled) = node_coords(buffer.node());
    if !enabled {
        return;
    }

    let (w, h) = buffer.size();
    let buffer_box: Rectangle<i32, Logical> = Rectangle::from_loc_and_size((lx, ly), (w, h));

    let old_active = buffer.active_outputs();
    let mut active = 0u64;
    let mut largest_overlap: i64 = 0;
    let mut primary = None;

    let outputs = crate::scene::output::snapshot_outputs(scene);
    for output in &outputs {
        if ignore_output == Some(output.index()) {
            continue;
        }
        if let Some(overlap) = buffer_box.intersection(output.viewport()) {
            if !overlap.is_empty() {
                active |= 1u64 << output.index();
                let area = overlap.size.w as i64 * overlap.size.h as i64;
                if area > largest_overlap {
                    largest_overlap = area;
                    primary = Some(output.index());
                }
            }
        }
    }

    let entered = active & !old_active;
    let left = !active & old_active;

    // The write happens before any signal fires, so handlers always observe
    // a coherent (active_outputs, primary_output) pair (spec.md §4.E, §5).
    buffer.set_membership(active, primary);

    if entered == 0 && left == 0 {
        return;
    }

    for output in &outputs {
        if entered & (1u64 << output.index()) != 0 {
            buffer.emit_output_enter(output.index());
        }
    }
    for output in &outputs {
        if left & (1u64 << output.index()) != 0 {
            buffer.emit_output_leave(output.index());
        }
    }
}
