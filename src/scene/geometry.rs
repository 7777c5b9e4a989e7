//! Coordinate accumulation and scale-aware box math (spec.md §4.B).

use crate::scene::node::Node;
use crate::utils::{Physical, Rectangle};

/// Walks from `node` to the scene root, accumulating `(x, y)` and AND-ing the
/// `enabled` flag along the way (the node's own `enabled` included).
pub(crate) fn node_coords(node: &Node) -> (i32, i32, bool) {
    let mut x = 0;
    let mut y = 0;
    let mut enabled = true;
    let mut current = Some(node.clone());
    while let Some(n) = current {
        let (nx, ny) = n.position();
        x += nx;
        y += ny;
        enabled &= n.enabled();
        current = n.parent().map(|p| p.node().clone());
    }
    (x, y, enabled)
}

/// Scales an axis-aligned box `(x, y, w, h)` by `s`, computing the far edge
/// from the rounded coordinate rather than by rounding the size
/// independently. This is the formula from spec.md §4.B; implementations
/// must reproduce it bit-exactly so that horizontally or vertically adjacent
/// boxes scale to contiguous pixel runs with no gap or overlap (spec.md §8,
/// property 7).
pub(crate) fn scale_box(x: i32, y: i32, w: i32, h: i32, s: f64) -> Rectangle<i32, Physical> {
    let round = |v: f64| v.round() as i32;
    let sx = round(x as f64 * s);
    let sy = round(y as f64 * s);
    let sw = round((x + w) as f64 * s) - sx;
    let sh = round((y + h) as f64 * s) - sy;
    Rectangle::from_loc_and_size((sx, sy), (sw, sh))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_box_adjacent_runs_are_contiguous() {
        let s = 1.5;
        let left = scale_box(0, 0, 10, 10, s);
        let right = scale_box(10, 0, 7, 10, s);
        assert_eq!(left.loc.x + left.size.w, right.loc.x);
    }

    #[test]
    fn scale_box_identity_at_unit_scale() {
        let b = scale_box(3, 4, 5, 6, 1.0);
        assert_eq!((b.loc.x, b.loc.y, b.size.w, b.size.h), (3, 4, 5, 6));
    }
}
