//! The scene graph core: a mutable tree of drawable nodes, damage-tracked
//! per output, with a composite-or-scanout commit pipeline.
//!
//! See the crate root for the overall purpose; this module implements every
//! piece described there. [`Scene`] is the entry point: it owns the root
//! [`TreeNode`] and the set of [`SceneOutput`]s bound to it.

use std::any::Any;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use crate::backend::output_handle::OutputHandle;
use crate::backend::presentation::PresentationFeedback;
use crate::backend::renderer::Renderer;
use crate::config::DebugDamageMode;
use crate::error::OutputCreateError;
use crate::utils::{Monotonic, Physical, Rectangle, Time};

mod buffer;
mod damage;
mod geometry;
mod membership;
mod node;
mod output;
mod query;
mod rect;
mod render;
mod tree;

pub use node::{BufferNode, Node, NodeTag, RectNode, TreeNode};
pub use output::SceneOutput;
pub use query::Hit;

pub(crate) use node::NodeKind;

/// A pending damage-highlight overlay (`WLR_SCENE_DEBUG_DAMAGE=highlight`).
///
/// Tracked at the scene level even though each region belongs to a single
/// output (`output_index`), matching how the rest of the scene's records
/// (outputs, highlight history) are kept in one place rather than
/// distributed across per-output state.
pub(crate) struct HighlightRegion {
    pub(crate) output_index: usize,
    pub(crate) region: Vec<Rectangle<i32, Physical>>,
    pub(crate) when: Time<Monotonic>,
}

pub(crate) struct SceneInner {
    pub(crate) root: TreeNode,
    pub(crate) outputs: Vec<SceneOutput>,
    pub(crate) highlight_regions: VecDeque<HighlightRegion>,
    pub(crate) debug_mode: DebugDamageMode,
    presentation_feedback: Option<Rc<dyn PresentationFeedback>>,
    pending_destroyed_textures: Vec<Box<dyn Any>>,
}

/// Queues a type-erased texture for destruction through whichever renderer
/// next opens a frame for this scene (see [`render::drain_texture_destroys`]).
///
/// `BufferNode`'s texture cache is keyed by the renderer's own `TextureId`
/// type, but invalidation happens from places (`set_buffer`, node teardown)
/// that have no `&mut Renderer` in hand; the real GPU resource behind the
/// handle can only be released by the renderer that created it, so the
/// handle waits here until one is available.
pub(crate) fn queue_texture_destroy(scene: &Rc<RefCell<SceneInner>>, texture: Box<dyn Any>) {
    scene.borrow_mut().pending_destroyed_textures.push(texture);
}

/// The root of a scene graph: owns the node tree and the outputs bound to
/// it.
///
/// Cloning a [`Scene`] copies the handle, not the graph — all clones observe
/// and mutate the same tree, like an `Rc`.
#[derive(Clone)]
pub struct Scene(pub(crate) Rc<RefCell<SceneInner>>);

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.0.borrow();
        f.debug_struct("Scene")
            .field("outputs", &inner.outputs.len())
            .field("debug_mode", &inner.debug_mode)
            .finish()
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    /// Creates an empty scene: one root `Tree`, no outputs.
    ///
    /// Reads `WLR_SCENE_DEBUG_DAMAGE` once, here, per spec.md §6.
    pub fn new() -> Scene {
        let debug_mode = DebugDamageMode::from_env();
        let inner = Rc::new_cyclic(|weak: &Weak<RefCell<SceneInner>>| {
            let root = Node::new(weak.clone(), None, 0, 0, NodeKind::Tree(tree::TreeState::new()));
            RefCell::new(SceneInner {
                root: TreeNode::from_node(root).expect("a freshly created Tree node is always a Tree"),
                outputs: Vec::new(),
                highlight_regions: VecDeque::new(),
                debug_mode,
                presentation_feedback: None,
                pending_destroyed_textures: Vec::new(),
            })
        });
        tracing::debug!(?debug_mode, "scene created");
        Scene(inner)
    }

    /// The scene's root tree. Every other node descends from here.
    pub fn root(&self) -> TreeNode {
        self.0.borrow().root.clone()
    }

    /// The current debug-damage visualization mode.
    pub fn debug_damage_mode(&self) -> DebugDamageMode {
        self.0.borrow().debug_mode
    }

    /// Binds a display into this scene at scene-local position `(x, y)`.
    ///
    /// See [`output::create`] for the full allocation/damage/membership
    /// sequence (spec.md §4.D).
    pub fn create_output(&self, handle: Box<dyn OutputHandle>, x: i32, y: i32) -> Result<SceneOutput, OutputCreateError> {
        output::create(&self.0, handle, x, y)
    }

    /// A snapshot of the outputs currently bound to this scene.
    pub fn outputs(&self) -> Vec<SceneOutput> {
        output::snapshot_outputs(&self.0)
    }

    /// Stores an owned reference to `feedback` (spec.md §3), replacing
    /// whatever the scene was previously holding. The scene drops its own
    /// reference as soon as `feedback` is destroyed, so [`Scene::presentation_feedback`]
    /// never hands back a reference to a dead object.
    pub fn set_presentation_feedback(&self, feedback: Rc<dyn PresentationFeedback>) {
        let weak_scene = Rc::downgrade(&self.0);
        let watched = feedback.clone();
        feedback.on_destroy(Box::new(move || {
            let Some(scene) = weak_scene.upgrade() else {
                return;
            };
            let mut inner = scene.borrow_mut();
            if matches!(&inner.presentation_feedback, Some(current) if Rc::ptr_eq(current, &watched)) {
                inner.presentation_feedback = None;
            }
        }));
        self.0.borrow_mut().presentation_feedback = Some(feedback);
    }

    /// The presentation-feedback object most recently registered via
    /// [`Scene::set_presentation_feedback`], or `None` if it has since been
    /// destroyed or none was ever set.
    pub fn presentation_feedback(&self) -> Option<Rc<dyn PresentationFeedback>> {
        self.0.borrow().presentation_feedback.clone()
    }

    /// Renders and presents one frame for `output` (spec.md §4.F).
    pub fn render_output<R: Renderer>(&self, output: &SceneOutput, renderer: &mut R) -> bool {
        render::scene_output_commit(&self.0, output, renderer)
    }

    /// Fires `frame_done` on every `Buffer` node whose `primary_output` is
    /// `output` (spec.md §4.F).
    pub fn output_send_frame_done(&self, output: &SceneOutput, now: Time<Monotonic>) {
        render::send_frame_done(&self.0, output, now);
    }

    /// Hit-tests the scene at scene-local `(lx, ly)` (spec.md §4.G).
    pub fn node_at(&self, lx: i32, ly: i32) -> Option<Hit> {
        query::node_at(&self.root(), lx, ly)
    }

    /// Invokes `f(buffer, global_x, global_y)` for every enabled `Buffer`
    /// descendant of the root (spec.md §4.G).
    pub fn for_each_buffer(&self, f: impl FnMut(&BufferNode, i32, i32)) {
        query::for_each_buffer(&self.root(), f);
    }

    /// Like [`Scene::for_each_buffer`], additionally filtered to buffers
    /// intersecting `output`'s viewport.
    pub fn output_for_each_buffer(&self, output: &SceneOutput, f: impl FnMut(&BufferNode, i32, i32)) {
        query::output_for_each_buffer(&self.root(), output, f);
    }
}

/// Runs the scene-root-specific part of destroying the root `Tree`: destroy
/// every output, drop all pending highlight regions, release the scene's own
/// reference to its presentation-feedback object, and drop any texture still
/// waiting on a renderer to destroy it — the scene is going away with no
/// further frames to drain that queue (spec.md §4.A).
pub(crate) fn destroy_root_extras(scene: &Rc<RefCell<SceneInner>>) {
    for output in output::snapshot_outputs(scene) {
        output.destroy();
    }
    let mut inner = scene.borrow_mut();
    inner.highlight_regions.clear();
    inner.presentation_feedback = None;
    inner.pending_destroyed_textures.clear();
}
