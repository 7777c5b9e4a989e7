//! The `Rect` variant: a solid-colored rectangle (spec.md §4.A).

use crate::scene::node::{Node, NodeKind, RectNode};

pub(crate) struct RectState {
    pub(crate) width: i32,
    pub(crate) height: i32,
    pub(crate) color: [f32; 4],
}

impl RectNode {
    /// The rectangle's current size, in scene units.
    pub fn size(&self) -> (i32, i32) {
        self.with_inner(|inner| {
            let NodeKind::Rect(state) = &inner.kind else {
                unreachable!("RectNode always wraps a Rect-kind node")
            };
            (state.width, state.height)
        })
    }

    /// The rectangle's current fill color, as straight (non-premultiplied)
    /// RGBA in `[0.0, 1.0]`.
    pub fn color(&self) -> [f32; 4] {
        self.with_inner(|inner| {
            let NodeKind::Rect(state) = &inner.kind else {
                unreachable!("RectNode always wraps a Rect-kind node")
            };
            state.color
        })
    }

    /// Resizes the rectangle, damaging both the old and the new footprint.
    pub fn set_size(&self, width: i32, height: i32) {
        if self.size() == (width, height) {
            return;
        }
        crate::scene::damage::damage_whole(self.node());
        self.with_inner_mut(|inner| {
            let NodeKind::Rect(state) = &mut inner.kind else {
                unreachable!("RectNode always wraps a Rect-kind node")
            };
            state.width = width;
            state.height = height;
        });
        crate::scene::damage::damage_whole(self.node());
    }

    /// Changes the rectangle's fill color, damaging its whole footprint.
    pub fn set_color(&self, color: [f32; 4]) {
        if self.color() == color {
            return;
        }
        self.with_inner_mut(|inner| {
            let NodeKind::Rect(state) = &mut inner.kind else {
                unreachable!("RectNode always wraps a Rect-kind node")
            };
            state.color = color;
        });
        crate::scene::damage::damage_whole(self.node());
    }
}
