//! The `Buffer` variant: a node that samples an external pixel buffer
//! (spec.md §3, §4.A).

use std::any::Any;
use std::rc::Rc;

use crate::backend::buffer::SceneBuffer;
use crate::scene::node::{BufferNode, Node, NodeKind};
use crate::utils::signaling::{SignalToken, Signaler};
use crate::utils::{Buffer as BufferCoord, Monotonic, Rectangle, Size, Time, Transform};

pub(crate) struct BufferState {
    pub(crate) buffer: Option<Rc<dyn SceneBuffer>>,
    pub(crate) src_box: Rectangle<f64, BufferCoord>,
    pub(crate) dst_width: i32,
    pub(crate) dst_height: i32,
    pub(crate) transform: Transform,
    texture: Option<Box<dyn Any>>,
    pub(crate) active_outputs: u64,
    pub(crate) primary_output: Option<usize>,
    point_accepts_input: Option<Box<dyn Fn(i32, i32) -> bool>>,
    output_enter: Signaler<usize>,
    output_leave: Signaler<usize>,
    output_present: Signaler<()>,
    frame_done: Signaler<Time<Monotonic>>,
}

impl BufferState {
    pub(crate) fn new() -> Self {
        BufferState {
            buffer: None,
            src_box: Rectangle::from_loc_and_size((0.0, 0.0), (0.0, 0.0)),
            dst_width: 0,
            dst_height: 0,
            transform: Transform::Normal,
            texture: None,
            active_outputs: 0,
            primary_output: None,
            point_accepts_input: None,
            output_enter: Signaler::new(),
            output_leave: Signaler::new(),
            output_present: Signaler::new(),
            frame_done: Signaler::new(),
        }
    }
}

impl BufferNode {
    /// The buffer's natural dimensions, ignoring `dst_size`/`transform`, or
    /// `None` if no buffer is attached.
    pub(crate) fn buffer_dimensions(&self) -> Option<(i32, i32)> {
        self.with_inner(|inner| {
            let NodeKind::Buffer(state) = &inner.kind else {
                unreachable!("BufferNode always wraps a Buffer-kind node")
            };
            state.buffer.as_ref().map(|b| (b.width(), b.height()))
        })
    }

    /// The effective size in scene units: `(dst_width, dst_height)` when both
    /// are positive, else the buffer's natural size with the node's
    /// transform applied, else `(0, 0)` with no buffer.
    pub fn size(&self) -> (i32, i32) {
        self.with_inner(|inner| {
            let NodeKind::Buffer(state) = &inner.kind else {
                unreachable!("BufferNode always wraps a Buffer-kind node")
            };
            if state.dst_width > 0 && state.dst_height > 0 {
                return (state.dst_width, state.dst_height);
            }
            match &state.buffer {
                Some(buf) => {
                    let natural = state
                        .transform
                        .transform_size(Size::<i32, BufferCoord>::from((buf.width(), buf.height())));
                    (natural.w, natural.h)
                }
                None => (0, 0),
            }
        })
    }

    /// The source sub-rectangle currently sampled; empty means "whole
    /// buffer".
    pub fn source_box(&self) -> Rectangle<f64, BufferCoord> {
        self.with_inner(|inner| {
            let NodeKind::Buffer(state) = &inner.kind else {
                unreachable!("BufferNode always wraps a Buffer-kind node")
            };
            state.src_box
        })
    }

    pub(crate) fn transform(&self) -> Transform {
        self.with_inner(|inner| {
            let NodeKind::Buffer(state) = &inner.kind else {
                unreachable!("BufferNode always wraps a Buffer-kind node")
            };
            state.transform
        })
    }

    /// Bitmask of outputs this buffer currently overlaps.
    pub fn active_outputs(&self) -> u64 {
        self.with_inner(|inner| {
            let NodeKind::Buffer(state) = &inner.kind else {
                unreachable!("BufferNode always wraps a Buffer-kind node")
            };
            state.active_outputs
        })
    }

    /// The output with the largest overlap, if any.
    pub fn primary_output(&self) -> Option<usize> {
        self.with_inner(|inner| {
            let NodeKind::Buffer(state) = &inner.kind else {
                unreachable!("BufferNode always wraps a Buffer-kind node")
            };
            state.primary_output
        })
    }

    pub(crate) fn set_membership(&self, active: u64, primary: Option<usize>) {
        self.with_inner_mut(|inner| {
            let NodeKind::Buffer(state) = &mut inner.kind else {
                unreachable!("BufferNode always wraps a Buffer-kind node")
            };
            state.active_outputs = active;
            state.primary_output = primary;
        });
    }

    pub(crate) fn emit_output_enter(&self, index: usize) {
        let signal = self.with_inner(|inner| {
            let NodeKind::Buffer(state) = &inner.kind else {
                unreachable!("BufferNode always wraps a Buffer-kind node")
            };
            state.output_enter.clone()
        });
        signal.signal(index);
    }

    pub(crate) fn emit_output_leave(&self, index: usize) {
        let signal = self.with_inner(|inner| {
            let NodeKind::Buffer(state) = &inner.kind else {
                unreachable!("BufferNode always wraps a Buffer-kind node")
            };
            state.output_leave.clone()
        });
        signal.signal(index);
    }

    /// Replaces the attached buffer, locking the new one and unlocking the
    /// old, and invalidates any cached texture. Damages the whole old and new
    /// footprint and reruns output membership. No-op if `buffer` is the same
    /// pointer as the one already attached.
    pub fn set_buffer(&self, buffer: Option<Rc<dyn SceneBuffer>>) {
        let differs = self.with_inner(|inner| {
            let NodeKind::Buffer(state) = &inner.kind else {
                unreachable!("BufferNode always wraps a Buffer-kind node")
            };
            match (&state.buffer, &buffer) {
                (None, None) => false,
                (Some(a), Some(b)) => !Rc::ptr_eq(a, b),
                _ => true,
            }
        });
        if !differs {
            return;
        }
        crate::scene::damage::damage_whole(self.node());
        self.replace_buffer(buffer);
        crate::scene::membership::recompute_subtree(self.node());
        crate::scene::damage::damage_whole(self.node());
    }

    /// Replaces the attached buffer like [`BufferNode::set_buffer`], but
    /// without damaging the whole node; instead, `region` (in buffer-local
    /// pixels) is translated into each output's local damage. Unlike
    /// `set_buffer`, this always emits damage for `region`, even when
    /// `buffer` is the same pointer as before — the contents may still have
    /// changed (spec.md §9).
    pub fn set_buffer_with_damage(&self, buffer: Option<Rc<dyn SceneBuffer>>, region: Rectangle<i32, BufferCoord>) {
        self.replace_buffer(buffer);
        crate::scene::membership::recompute_subtree(self.node());
        crate::scene::damage::damage_buffer_region(self, region);
    }

    /// Swaps in `buffer`, always invalidating the cached texture (the
    /// contents may have changed even when the pointer hasn't), but only
    /// unlocking the old buffer and locking the new one when they actually
    /// differ — re-attaching the same pointer must not cycle its lock, or a
    /// client could reclaim it in the gap between the two calls.
    fn replace_buffer(&self, buffer: Option<Rc<dyn SceneBuffer>>) {
        let scene = self.scene_handle();
        let old_texture = self.with_inner_mut(|inner| {
            let NodeKind::Buffer(state) = &mut inner.kind else {
                unreachable!("BufferNode always wraps a Buffer-kind node")
            };
            let old_texture = state.texture.take();
            let same_pointer = match (&state.buffer, &buffer) {
                (Some(a), Some(b)) => Rc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            };
            if !same_pointer {
                if let Some(old) = state.buffer.take() {
                    old.unlock();
                }
                if let Some(ref new) = buffer {
                    new.lock();
                }
            }
            state.buffer = buffer;
            old_texture
        });
        if let (Some(scene), Some(texture)) = (scene, old_texture) {
            crate::scene::queue_texture_destroy(&scene, texture);
        }
    }

    /// Sets the sub-rectangle of the buffer to sample; an empty box means
    /// "whole buffer". Does not affect the node's size or output membership.
    pub fn set_source_box(&self, src_box: Rectangle<f64, BufferCoord>) {
        if self.source_box() == src_box {
            return;
        }
        crate::scene::damage::damage_whole(self.node());
        self.with_inner_mut(|inner| {
            let NodeKind::Buffer(state) = &mut inner.kind else {
                unreachable!("BufferNode always wraps a Buffer-kind node")
            };
            state.src_box = src_box;
        });
        crate::scene::damage::damage_whole(self.node());
    }

    /// Sets the destination size in scene units; `(0, 0)` reverts to the
    /// buffer's natural (transformed) size.
    pub fn set_dest_size(&self, width: i32, height: i32) {
        let changed = self.with_inner(|inner| {
            let NodeKind::Buffer(state) = &inner.kind else {
                unreachable!("BufferNode always wraps a Buffer-kind node")
            };
            (state.dst_width, state.dst_height) != (width, height)
        });
        if !changed {
            return;
        }
        crate::scene::damage::damage_whole(self.node());
        self.with_inner_mut(|inner| {
            let NodeKind::Buffer(state) = &mut inner.kind else {
                unreachable!("BufferNode always wraps a Buffer-kind node")
            };
            state.dst_width = width;
            state.dst_height = height;
        });
        crate::scene::damage::damage_whole(self.node());
        crate::scene::membership::recompute_subtree(self.node());
    }

    /// Sets the orientation applied when sampling the buffer.
    pub fn set_transform(&self, transform: Transform) {
        if self.transform() == transform {
            return;
        }
        crate::scene::damage::damage_whole(self.node());
        self.with_inner_mut(|inner| {
            let NodeKind::Buffer(state) = &mut inner.kind else {
                unreachable!("BufferNode always wraps a Buffer-kind node")
            };
            state.transform = transform;
        });
        crate::scene::damage::damage_whole(self.node());
        crate::scene::membership::recompute_subtree(self.node());
    }

    /// Overrides bounding-box hit testing with an arbitrary predicate over
    /// node-local coordinates. `None` reverts to the bounding-box test.
    pub fn set_point_accepts_input(&self, predicate: Option<Box<dyn Fn(i32, i32) -> bool>>) {
        self.with_inner_mut(|inner| {
            let NodeKind::Buffer(state) = &mut inner.kind else {
                unreachable!("BufferNode always wraps a Buffer-kind node")
            };
            state.point_accepts_input = predicate;
        });
    }

    pub(crate) fn point_accepts_input(&self, lx: i32, ly: i32) -> bool {
        self.with_inner(|inner| {
            let NodeKind::Buffer(state) = &inner.kind else {
                unreachable!("BufferNode always wraps a Buffer-kind node")
            };
            match &state.point_accepts_input {
                Some(predicate) => predicate(lx, ly),
                None => {
                    let (w, h) = self.size();
                    lx >= 0 && ly >= 0 && lx < w && ly < h
                }
            }
        })
    }

    /// Fires `frame_done(now)` on the attached buffer.
    pub fn send_frame_done(&self, now: Time<Monotonic>) {
        let signal = self.with_inner(|inner| {
            let NodeKind::Buffer(state) = &inner.kind else {
                unreachable!("BufferNode always wraps a Buffer-kind node")
            };
            state.frame_done.clone()
        });
        signal.signal(now);
    }

    /// Registers a callback for when this buffer enters `output`'s viewport.
    pub fn on_output_enter(&self, callback: impl FnMut(&usize) + 'static) -> SignalToken {
        self.with_inner(|inner| {
            let NodeKind::Buffer(state) = &inner.kind else {
                unreachable!("BufferNode always wraps a Buffer-kind node")
            };
            state.output_enter.register(callback)
        })
    }

    /// Registers a callback for when this buffer leaves an output's
    /// viewport.
    pub fn on_output_leave(&self, callback: impl FnMut(&usize) + 'static) -> SignalToken {
        self.with_inner(|inner| {
            let NodeKind::Buffer(state) = &inner.kind else {
                unreachable!("BufferNode always wraps a Buffer-kind node")
            };
            state.output_leave.register(callback)
        })
    }

    /// Registers a callback fired every time this buffer is presented (either
    /// by scanout or composition).
    pub fn on_output_present(&self, callback: impl FnMut(&()) + 'static) -> SignalToken {
        self.with_inner(|inner| {
            let NodeKind::Buffer(state) = &inner.kind else {
                unreachable!("BufferNode always wraps a Buffer-kind node")
            };
            state.output_present.register(callback)
        })
    }

    /// Registers a callback for [`BufferNode::send_frame_done`].
    pub fn on_frame_done(&self, callback: impl FnMut(&Time<Monotonic>) + 'static) -> SignalToken {
        self.with_inner(|inner| {
            let NodeKind::Buffer(state) = &inner.kind else {
                unreachable!("BufferNode always wraps a Buffer-kind node")
            };
            state.frame_done.register(callback)
        })
    }

    pub(crate) fn present_signal(&self) -> Signaler<()> {
        self.with_inner(|inner| {
            let NodeKind::Buffer(state) = &inner.kind else {
                unreachable!("BufferNode always wraps a Buffer-kind node")
            };
            state.output_present.clone()
        })
    }

    pub(crate) fn emit_present(&self) {
        self.present_signal().signal(());
    }

    /// The currently attached buffer, if any.
    pub(crate) fn buffer_ref(&self) -> Option<Rc<dyn SceneBuffer>> {
        self.with_inner(|inner| {
            let NodeKind::Buffer(state) = &inner.kind else {
                unreachable!("BufferNode always wraps a Buffer-kind node")
            };
            state.buffer.clone()
        })
    }

    /// Prefers the underlying buffer's own client-side texture; falls back
    /// to the node's cache; otherwise calls `create` to import one and caches
    /// the result. `T` is the renderer's concrete texture type.
    pub(crate) fn texture_for<T: 'static + Clone>(
        &self,
        create: impl FnOnce(&dyn SceneBuffer) -> Option<T>,
    ) -> Option<T> {
        let client_texture = self.with_inner(|inner| {
            let NodeKind::Buffer(state) = &inner.kind else {
                unreachable!("BufferNode always wraps a Buffer-kind node")
            };
            state
                .buffer
                .as_ref()
                .and_then(|buf| buf.client_texture())
                .and_then(|any| any.downcast_ref::<T>())
                .cloned()
        });
        if let Some(texture) = client_texture {
            return Some(texture);
        }

        let cached = self.with_inner(|inner| {
            let NodeKind::Buffer(state) = &inner.kind else {
                unreachable!("BufferNode always wraps a Buffer-kind node")
            };
            state.texture.as_ref().and_then(|t| t.downcast_ref::<T>()).cloned()
        });
        if let Some(texture) = cached {
            return Some(texture);
        }

        let buffer = self.with_inner(|inner| {
            let NodeKind::Buffer(state) = &inner.kind else {
                unreachable!("BufferNode always wraps a Buffer-kind node")
            };
            state.buffer.clone()
        })?;
        let texture = create(buffer.as_ref())?;
        self.with_inner_mut(|inner| {
            let NodeKind::Buffer(state) = &mut inner.kind else {
                unreachable!("BufferNode always wraps a Buffer-kind node")
            };
            state.texture = Some(Box::new(texture.clone()));
        });
        Some(texture)
    }
}

/// Runs the `Buffer`-specific part of node destruction (spec.md §4.A):
/// `output_leave` for every active output, queue the cached texture for
/// destruction through the renderer, unlock the buffer.
pub(crate) fn teardown(node: &Node) {
    let Some(buffer_node) = BufferNode::from_node(node.clone()) else {
        return;
    };

    let (active, leave_signal) = buffer_node.with_inner(|inner| {
        let NodeKind::Buffer(state) = &inner.kind else {
            unreachable!("BufferNode always wraps a Buffer-kind node")
        };
        (state.active_outputs, state.output_leave.clone())
    });
    for index in 0..64 {
        if active & (1 << index) != 0 {
            leave_signal.signal(index);
        }
    }

    let scene = buffer_node.scene_handle();
    let old_texture = buffer_node.with_inner_mut(|inner| {
        let NodeKind::Buffer(state) = &mut inner.kind else {
            unreachable!("BufferNode always wraps a Buffer-kind node")
        };
        state.active_outputs = 0;
        state.primary_output = None;
        let old_texture = state.texture.take();
        if let Some(buf) = state.buffer.take() {
            buf.unlock();
        }
        old_texture
    });
    if let (Some(scene), Some(texture)) = (scene, old_texture) {
        crate::scene::queue_texture_destroy(&scene, texture);
    }
}
