//! Damage emission: translating scene mutations into per-output dirty
//! rectangles (spec.md §4.C).

use crate::scene::geometry::{node_coords, scale_box};
use crate::scene::node::{BufferNode, Node, NodeTag, RectNode, TreeNode};
use crate::utils::{Buffer as BufferCoord, Physical, Rectangle, Size};

/// Damages the whole footprint of `node` on every output it could be
/// visible on. No-ops if `node` (or an ancestor) is disabled, or the node
/// isn't attached to a scene.
///
/// For a `Tree`, recurses into children instead of damaging a box of its
/// own — trees have no intrinsic size, but their children may extend beyond
/// wherever the tree itself sits.
pub(crate) fn damage_whole(node: &Node) {
    let (lx, ly, enabled) = node_coords(node);
    if !enabled {
        return;
    }

    match node.tag() {
        NodeTag::Tree => {
            if let Some(tree) = TreeNode::from_node(node.clone()) {
                for child in tree.children() {
                    damage_whole(&child);
                }
            }
        }
        NodeTag::Rect => {
            if let Some(rect) = RectNode::from_node(node.clone()) {
                let (w, h) = rect.size();
                emit_box_damage(node, lx, ly, w, h);
            }
        }
        NodeTag::Buffer => {
            if let Some(buffer) = BufferNode::from_node(node.clone()) {
                let (w, h) = buffer.size();
                emit_box_damage(node, lx, ly, w, h);
            }
        }
    }
}

fn emit_box_damage(node: &Node, lx: i32, ly: i32, w: i32, h: i32) {
    if w <= 0 || h <= 0 {
        return;
    }
    let Some(scene) = node.scene_handle() else {
        return;
    };
    for output in crate::scene::output::snapshot_outputs(&scene) {
        let (ox, oy) = output.position();
        let box_ = scale_box(lx - ox, ly - oy, w, h, output.scale());
        output.with_damage_mut(|damage| damage.add_box(box_));
    }
}

/// Translates a buffer-local damage region (as supplied to
/// [`crate::scene::buffer::BufferNode::set_buffer_with_damage`]) into each
/// output's local damage, per spec.md §4.C's "partial buffer damage"
/// algorithm.
pub(crate) fn damage_buffer_region(node: &BufferNode, region: Rectangle<i32, BufferCoord>) {
    let (lx, ly, enabled) = node_coords(node.node());
    if !enabled {
        return;
    }
    let Some(scene) = node.scene_handle() else {
        return;
    };
    let Some((buf_w, buf_h)) = node.buffer_dimensions() else {
        return;
    };
    if buf_w <= 0 || buf_h <= 0 {
        return;
    }

    let transform = node.transform();
    let area = Size::<f64, BufferCoord>::from((buf_w as f64, buf_h as f64));
    let transformed_region = transform.transform_rect_in(region.to_f64(), &area);

    let src = node.source_box();
    let src = if src.is_empty() {
        let natural = transform.transform_size(Size::<f64, BufferCoord>::from((buf_w as f64, buf_h as f64)));
        Rectangle::from_loc_and_size((0.0, 0.0), natural)
    } else {
        src
    };

    let Some(cropped) = transformed_region.intersection(src) else {
        return;
    };
    if cropped.is_empty() {
        return;
    }

    let (dst_w, dst_h) = node.size();
    let natural = transform.transform_size(Size::<i32, BufferCoord>::from((buf_w, buf_h)));
    let dst_w = if dst_w > 0 { dst_w as f64 } else { natural.w as f64 };
    let dst_h = if dst_h > 0 { dst_h as f64 } else { natural.h as f64 };
    let scale_x = dst_w / src.size.w;
    let scale_y = dst_h / src.size.h;

    let rel_x = (cropped.loc.x - src.loc.x) * scale_x;
    let rel_y = (cropped.loc.y - src.loc.y) * scale_y;
    let rel_w = cropped.size.w * scale_x;
    let rel_h = cropped.size.h * scale_y;

    for output in crate::scene::output::snapshot_outputs(&scene) {
        let (ox, oy) = output.position();
        let output_scale = output.scale();
        let x = ((lx - ox) as f64 + rel_x) * output_scale;
        let y = ((ly - oy) as f64 + rel_y) * output_scale;
        let w = rel_w * output_scale;
        let h = rel_h * output_scale;
        let box_ = Rectangle::<f64, Physical>::from_loc_and_size((x, y), (w, h)).to_i32_round();
        output.with_damage_mut(|damage| damage.add_box(box_));
    }
}
