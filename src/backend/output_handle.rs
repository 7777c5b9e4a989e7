//! The display abstraction each [`crate::scene::output::SceneOutput`] binds to.

use cgmath::Matrix3;

use crate::backend::buffer::SceneBuffer;
use crate::utils::{Logical, Physical, Rectangle, Scale, Size, Transform};

/// A per-display damage accumulator.
///
/// Geometric and content changes on the scene graph feed rectangles into
/// this accumulator; [`OutputDamage::attach_render`] drains it into the
/// region a renderer should scissor the next frame against. Grounded on
/// `smithay::backend::renderer::damage::OutputDamageTracker`: a concrete,
/// reusable accumulator rather than a trait, since its bookkeeping (a flat
/// list of physical rectangles) is the same regardless of display backend.
#[derive(Debug, Default, Clone)]
pub struct OutputDamage {
    rects: Vec<Rectangle<i32, Physical>>,
}

impl OutputDamage {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an arbitrary set of rectangles to the accumulated damage.
    pub fn add(&mut self, region: &[Rectangle<i32, Physical>]) {
        self.rects.extend(region.iter().copied().filter(|r| !r.is_empty()));
    }

    /// Adds a single rectangle to the accumulated damage.
    pub fn add_box(&mut self, box_: Rectangle<i32, Physical>) {
        self.add(std::slice::from_ref(&box_));
    }

    /// Marks the entire output (of the given physical size) as damaged,
    /// superseding any previously accumulated partial damage.
    pub fn add_whole(&mut self, output_size: Size<i32, Physical>) {
        self.rects.clear();
        if !output_size.is_empty() {
            self.rects.push(Rectangle::from_size(output_size));
        }
    }

    /// Prepares to render: returns whether a frame is actually needed, and
    /// takes the damage region to scissor the render against. The embedder
    /// must [`OutputHandle::rollback`] instead of committing when
    /// `needs_frame` is false.
    pub fn attach_render(&mut self) -> (bool, Vec<Rectangle<i32, Physical>>) {
        let damage = std::mem::take(&mut self.rects);
        (!damage.is_empty(), damage)
    }

    /// The damage currently accumulated, without consuming it.
    pub fn current(&self) -> &[Rectangle<i32, Physical>] {
        &self.rects
    }
}

/// A single physical display a [`crate::scene::Scene`] can present to.
pub trait OutputHandle: std::fmt::Debug {
    /// The effective (pre-transform, pre-scale) resolution, in scene units.
    fn resolution(&self) -> Size<i32, Logical>;

    /// The resolution after applying [`OutputHandle::transform`], in
    /// physical pixels.
    fn transformed_resolution(&self) -> Size<i32, Physical>;

    /// The logical-to-physical scale factor.
    fn scale(&self) -> Scale<f64>;

    /// The orientation this display presents content in.
    fn transform(&self) -> Transform;

    /// A 3x3 matrix equivalent to [`OutputHandle::transform`], for use by
    /// [`crate::backend::RenderFrame::render_rect`] and
    /// [`crate::backend::RenderFrame::render_textured_quad`].
    fn transform_matrix(&self) -> Matrix3<f32> {
        self.transform().matrix()
    }

    /// The accumulated damage for this display.
    fn damage_mut(&mut self) -> &mut OutputDamage;

    /// Attaches `buffer` for direct scanout. Never fails; acceptance is
    /// determined by a subsequent [`OutputHandle::test`].
    fn attach_buffer(&mut self, buffer: &dyn SceneBuffer);

    /// Tests whether the currently attached state (buffer, damage) would be
    /// accepted by the display controller, without presenting it.
    fn test(&mut self) -> bool;

    /// Discards the currently attached (but not yet committed) state.
    fn rollback(&mut self);

    /// Presents the currently attached state. Returns whether the commit
    /// succeeded.
    fn commit(&mut self) -> bool;

    /// Like [`OutputHandle::commit`], additionally passing the frame's
    /// damage region (in physical pixels, already corrected for this
    /// display's transform) as a hint to the display controller.
    fn commit_with_damage(&mut self, damage: &[Rectangle<i32, Physical>]) -> bool {
        let _ = damage;
        self.commit()
    }

    /// Requests another frame callback even though nothing is currently
    /// pending (used to keep animating debug-highlight overlays alive).
    fn schedule_frame(&mut self);

    /// Draws any software cursors over the given (physical) damage region.
    fn render_software_cursors(&mut self, damage: &[Rectangle<i32, Physical>]);
}
