//! The output registry: per-display bookkeeping bound into a scene
//! (spec.md §3, §4.D).

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::backend::buffer::SceneBuffer;
use crate::backend::output_handle::{OutputDamage, OutputHandle};
use crate::error::OutputCreateError;
use crate::scene::SceneInner;
use crate::utils::signaling::{SignalToken, Signaler};
use crate::utils::{Logical, Physical, Rectangle, Size, Transform};

pub(crate) struct SceneOutputInner {
    scene: Weak<RefCell<SceneInner>>,
    handle: Box<dyn OutputHandle>,
    x: i32,
    y: i32,
    index: usize,
    prev_scanout: bool,
    destroy_signal: Signaler<()>,
}

/// A single display bound into a [`crate::scene::Scene`].
///
/// Cloning copies the handle (`Rc`-like); all clones observe the same
/// underlying display binding.
#[derive(Clone)]
pub struct SceneOutput(pub(crate) Rc<RefCell<SceneOutputInner>>);

impl std::fmt::Debug for SceneOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.0.borrow();
        f.debug_struct("SceneOutput")
            .field("index", &inner.index)
            .field("x", &inner.x)
            .field("y", &inner.y)
            .finish()
    }
}

impl PartialEq for SceneOutput {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for SceneOutput {}

fn allocate_index(existing: &[usize]) -> Option<usize> {
    let mut sorted = existing.to_vec();
    sorted.sort_unstable();
    let mut expected = 0usize;
    for idx in sorted {
        if idx == expected {
            expected += 1;
        } else {
            break;
        }
    }
    if expected < 64 {
        Some(expected)
    } else {
        None
    }
}

/// Binds `handle` into `scene` at scene-local position `(x, y)`.
///
/// Allocates the smallest unused index in `[0, 64)` (filling gaps left by
/// destroyed outputs), marks the whole output damaged, and reruns membership
/// for the whole scene tree so already-existing `Buffer` nodes discover it
/// (spec.md §4.D).
pub(crate) fn create(
    scene: &Rc<RefCell<SceneInner>>,
    handle: Box<dyn OutputHandle>,
    x: i32,
    y: i32,
) -> Result<SceneOutput, OutputCreateError> {
    let existing: Vec<usize> = scene.borrow().outputs.iter().map(SceneOutput::index).collect();
    let index = allocate_index(&existing).ok_or(OutputCreateError::TooManyOutputs)?;

    let output = SceneOutput(Rc::new(RefCell::new(SceneOutputInner {
        scene: Rc::downgrade(scene),
        handle,
        x,
        y,
        index,
        prev_scanout: false,
        destroy_signal: Signaler::new(),
    })));

    let insert_at = scene
        .borrow()
        .outputs
        .partition_point(|o| o.index() < index);
    scene.borrow_mut().outputs.insert(insert_at, output.clone());

    output.mark_whole_damaged();
    crate::scene::membership::recompute_scene(scene, None);

    tracing::debug!(index, x, y, "output bound to scene");

    Ok(output)
}

/// Snapshot of a scene's currently bound outputs, safe to iterate while the
/// scene's own output list may be mutated (signals firing mid-iteration).
pub(crate) fn snapshot_outputs(scene: &Rc<RefCell<SceneInner>>) -> Vec<SceneOutput> {
    scene.borrow().outputs.clone()
}

impl SceneOutput {
    /// This output's stable index in `[0, 64)`, used as its bit in
    /// `active_outputs` bitmasks.
    pub fn index(&self) -> usize {
        self.0.borrow().index
    }

    /// This output's position in scene coordinates.
    pub fn position(&self) -> (i32, i32) {
        let inner = self.0.borrow();
        (inner.x, inner.y)
    }

    /// The uniform logical-to-physical scale factor.
    pub fn scale(&self) -> f64 {
        self.0.borrow().handle.scale().x
    }

    /// The orientation this display presents content in.
    pub fn transform(&self) -> Transform {
        self.0.borrow().handle.transform()
    }

    pub(crate) fn transform_matrix(&self) -> cgmath::Matrix3<f32> {
        self.0.borrow().handle.transform_matrix()
    }

    /// The effective (pre-transform) resolution, in scene units.
    pub fn resolution(&self) -> Size<i32, Logical> {
        self.0.borrow().handle.resolution()
    }

    /// The resolution after applying [`SceneOutput::transform`], in physical
    /// pixels.
    pub fn transformed_resolution(&self) -> Size<i32, Physical> {
        self.0.borrow().handle.transformed_resolution()
    }

    /// This output's viewport in scene coordinates.
    pub(crate) fn viewport(&self) -> Rectangle<i32, crate::utils::Logical> {
        let (x, y) = self.position();
        Rectangle::from_loc_and_size((x, y), self.resolution())
    }

    pub(crate) fn was_scanout_last_frame(&self) -> bool {
        self.0.borrow().prev_scanout
    }

    pub(crate) fn set_scanout_last_frame(&self, scanout: bool) {
        self.0.borrow_mut().prev_scanout = scanout;
    }

    pub(crate) fn with_damage_mut<R>(&self, f: impl FnOnce(&mut OutputDamage) -> R) -> R {
        f(self.0.borrow_mut().handle.damage_mut())
    }

    pub(crate) fn with_handle_mut<R>(&self, f: impl FnOnce(&mut dyn OutputHandle) -> R) -> R {
        f(self.0.borrow_mut().handle.as_mut())
    }

    pub(crate) fn mark_whole_damaged(&self) {
        let size = self.transformed_resolution();
        self.with_damage_mut(|d| d.add_whole(size));
    }

    /// Moves this output to a new scene-local position, damaging it whole
    /// and rerunning membership for the whole scene.
    pub fn set_position(&self, x: i32, y: i32) {
        let scene = self.0.borrow().scene.upgrade();
        self.0.borrow_mut().x = x;
        self.0.borrow_mut().y = y;
        self.mark_whole_damaged();
        if let Some(scene) = scene {
            crate::scene::membership::recompute_scene(&scene, None);
        }
    }

    /// Called by the embedder when the underlying display's `commit` signal
    /// fires. If the committed delta touched mode, transform, or scale,
    /// reruns membership for the whole scene tree.
    pub fn notify_commit(&self, mode_transform_or_scale_changed: bool) {
        if mode_transform_or_scale_changed {
            if let Some(scene) = self.0.borrow().scene.upgrade() {
                crate::scene::membership::recompute_scene(&scene, None);
            }
        }
    }

    /// Called by the embedder when the underlying display's `mode` signal
    /// fires. Unconditionally reruns membership for the whole scene tree.
    pub fn notify_mode_change(&self) {
        if let Some(scene) = self.0.borrow().scene.upgrade() {
            crate::scene::membership::recompute_scene(&scene, None);
        }
    }

    /// Registers a callback to run when this output is unbound from its
    /// scene.
    pub fn on_destroy(&self, callback: impl FnMut(&()) + 'static) -> SignalToken {
        self.0.borrow().destroy_signal.register(callback)
    }

    /// Unbinds this output from its scene: fires the destroy signal, reruns
    /// membership ignoring this output's contribution (so `Buffer` nodes
    /// still tracking it emit `output_leave`), and frees its index for
    /// reuse.
    pub fn destroy(&self) {
        let Some(scene) = self.0.borrow().scene.upgrade() else {
            return;
        };

        let signal = self.0.borrow().destroy_signal.clone();
        signal.signal(());

        crate::scene::membership::recompute_scene(&scene, Some(self.index()));

        scene.borrow_mut().outputs.retain(|o| o != self);
    }

    /// Attaches `buffer` for direct scanout without committing.
    pub(crate) fn attach_buffer(&self, buffer: &dyn SceneBuffer) {
        self.with_handle_mut(|h| h.attach_buffer(buffer));
    }

    pub(crate) fn test(&self) -> bool {
        self.with_handle_mut(|h| h.test())
    }

    pub(crate) fn rollback(&self) {
        self.with_handle_mut(|h| h.rollback());
    }

    pub(crate) fn commit(&self) -> bool {
        self.with_handle_mut(|h| h.commit())
    }

    pub(crate) fn commit_with_damage(&self, damage: &[Rectangle<i32, Physical>]) -> bool {
        self.with_handle_mut(|h| h.commit_with_damage(damage))
    }

    pub(crate) fn schedule_frame(&self) {
        self.with_handle_mut(|h| h.schedule_frame());
    }

    pub(crate) fn render_software_cursors(&self, damage: &[Rectangle<i32, Physical>]) {
        self.with_handle_mut(|h| h.render_software_cursors(damage));
    }
}
