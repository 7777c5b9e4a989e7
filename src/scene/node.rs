//! The common node header shared by every scene-tree node.
//!
//! Mirrors `spec.md`'s "tagged variant" data model (§3, §9): `Tree`, `Rect`
//! and `Buffer` are disjoint concrete states behind one reference-counted
//! cell, discriminated by [`NodeKind`]. [`Node`] exposes the operations
//! common to all three; [`TreeNode`], [`RectNode`] and [`BufferNode`] are
//! thin typed views over it so that e.g. `set_size` is only reachable on a
//! node you already know is a rectangle, without a runtime tag check at the
//! call site.

use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::scene::buffer::BufferState;
use crate::scene::rect::RectState;
use crate::scene::tree::TreeState;
use crate::scene::SceneInner;
use crate::utils::alive_tracker::AliveTracker;
use crate::utils::signaling::Signaler;
use crate::utils::user_data::UserDataMap;

pub(crate) type Inner = Rc<RefCell<NodeInner>>;
pub(crate) type WeakInner = Weak<RefCell<NodeInner>>;

/// Discriminant for a node's concrete variant, without borrowing its state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeTag {
    /// A [`TreeNode`]: a pure grouping node with no intrinsic size.
    Tree,
    /// A [`RectNode`]: a solid-colored rectangle.
    Rect,
    /// A [`BufferNode`]: a sampled pixel buffer.
    Buffer,
}

pub(crate) enum NodeKind {
    Tree(TreeState),
    Rect(RectState),
    Buffer(BufferState),
}

impl NodeKind {
    fn tag(&self) -> NodeTag {
        match self {
            NodeKind::Tree(_) => NodeTag::Tree,
            NodeKind::Rect(_) => NodeTag::Rect,
            NodeKind::Buffer(_) => NodeTag::Buffer,
        }
    }
}

pub(crate) struct NodeInner {
    pub(crate) scene: Weak<RefCell<SceneInner>>,
    pub(crate) parent: Option<WeakInner>,
    pub(crate) x: i32,
    pub(crate) y: i32,
    pub(crate) enabled: bool,
    pub(crate) alive: AliveTracker,
    pub(crate) destroy_signal: Signaler<()>,
    pub(crate) addons: UserDataMap,
    pub(crate) kind: NodeKind,
}

/// A handle to a node in the scene tree.
///
/// Cloning a [`Node`] (or any of [`TreeNode`]/[`RectNode`]/[`BufferNode`])
/// copies the handle, not the node: all clones observe the same underlying
/// state, exactly like cloning an `Rc`.
#[derive(Clone)]
pub struct Node(pub(crate) Inner);

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.0.borrow();
        f.debug_struct("Node")
            .field("tag", &inner.kind.tag())
            .field("x", &inner.x)
            .field("y", &inner.y)
            .field("enabled", &inner.enabled)
            .field("alive", &inner.alive.alive())
            .finish()
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for Node {}

impl crate::utils::alive_tracker::IsAlive for Node {
    fn alive(&self) -> bool {
        self.0.borrow().alive.alive()
    }
}

impl Node {
    pub(crate) fn new(
        scene: Weak<RefCell<SceneInner>>,
        parent: Option<WeakInner>,
        x: i32,
        y: i32,
        kind: NodeKind,
    ) -> Node {
        Node(Rc::new(RefCell::new(NodeInner {
            scene,
            parent,
            x,
            y,
            enabled: true,
            alive: AliveTracker::default(),
            destroy_signal: Signaler::new(),
            addons: UserDataMap::new(),
            kind,
        })))
    }

    pub(crate) fn downgrade(&self) -> WeakInner {
        Rc::downgrade(&self.0)
    }

    /// This node's variant.
    pub fn tag(&self) -> NodeTag {
        self.0.borrow().kind.tag()
    }

    /// The node's parent tree, or `None` for the scene root.
    pub fn parent(&self) -> Option<TreeNode> {
        self.0
            .borrow()
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|inner| TreeNode(Node(inner)))
    }

    /// Whether this node is still part of the scene tree.
    pub fn is_alive(&self) -> bool {
        self.0.borrow().alive.alive()
    }

    /// Position relative to the parent tree.
    pub fn position(&self) -> (i32, i32) {
        let inner = self.0.borrow();
        (inner.x, inner.y)
    }

    /// Whether this node is enabled. Disabled subtrees are invisible and
    /// inert (see spec.md §3's `enabled` invariant).
    pub fn enabled(&self) -> bool {
        self.0.borrow().enabled
    }

    /// Extension-data slot. Keyed by type, like
    /// `smithay::utils::user_data::UserDataMap`.
    pub fn user_data(&self) -> Ref<'_, UserDataMap> {
        Ref::map(self.0.borrow(), |inner| &inner.addons)
    }

    /// Registers a callback to run exactly once, before this node's children
    /// are recursively destroyed.
    pub fn on_destroy(&self, callback: impl FnMut(&()) + 'static) -> crate::utils::signaling::SignalToken {
        self.0.borrow().destroy_signal.register(callback)
    }

    pub(crate) fn scene_handle(&self) -> Option<Rc<RefCell<SceneInner>>> {
        self.0.borrow().scene.upgrade()
    }

    pub(crate) fn scene_weak(&self) -> Weak<RefCell<SceneInner>> {
        self.0.borrow().scene.clone()
    }

    /// Sets this node's position relative to its parent.
    ///
    /// Emits whole-node damage at both the old and the new footprint (see
    /// spec.md §4.A, §4.C) and reruns output membership.
    pub fn set_position(&self, x: i32, y: i32) {
        let old = self.position();
        if old == (x, y) {
            return;
        }
        crate::scene::damage::damage_whole(self);
        self.0.borrow_mut().x = x;
        self.0.borrow_mut().y = y;
        crate::scene::damage::damage_whole(self);
        crate::scene::membership::recompute_subtree(self);
    }

    /// Enables or disables this node.
    ///
    /// A disabled subtree is invisible and inert: damage emission for it
    /// (and its descendants) is suppressed, but `active_outputs`/
    /// `primary_output` bookkeeping on any `Buffer` descendants is *not*
    /// eagerly updated — it is re-evaluated the next time membership runs
    /// (spec.md §9 Open Question, resolved in DESIGN.md).
    pub fn set_enabled(&self, enabled: bool) {
        if self.0.borrow().enabled == enabled {
            return;
        }
        crate::scene::damage::damage_whole(self);
        self.0.borrow_mut().enabled = enabled;
        crate::scene::damage::damage_whole(self);
    }

    /// Destroys this node and, recursively, its children.
    ///
    /// The destroy signal fires for a node *before* its children are
    /// destroyed (spec.md §3 Lifecycle), so observers may detach children
    /// early.
    pub fn destroy(&self) {
        if !self.is_alive() {
            return;
        }
        crate::scene::tree::destroy_node(self);
    }

    pub(crate) fn with_inner<R>(&self, f: impl FnOnce(&NodeInner) -> R) -> R {
        f(&self.0.borrow())
    }

    pub(crate) fn with_inner_mut<R>(&self, f: impl FnOnce(&mut NodeInner) -> R) -> R {
        f(&mut self.0.borrow_mut())
    }
}

/// A grouping node with no intrinsic size; see spec.md §4.A.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeNode(pub(crate) Node);

/// A solid-colored rectangle; see spec.md §4.A.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RectNode(pub(crate) Node);

/// A node that samples an external pixel buffer; see spec.md §4.A.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BufferNode(pub(crate) Node);

macro_rules! typed_node {
    ($ty:ident, $tag:ident) => {
        impl $ty {
            /// Attempts to view `node` as this variant; `None` if the tags
            /// don't match.
            pub fn from_node(node: Node) -> Option<$ty> {
                if node.tag() == NodeTag::$tag {
                    Some($ty(node))
                } else {
                    None
                }
            }

            /// The common node handle underlying this typed view.
            pub fn node(&self) -> &Node {
                &self.0
            }
        }

        impl std::ops::Deref for $ty {
            type Target = Node;
            fn deref(&self) -> &Node {
                &self.0
            }
        }

        impl From<$ty> for Node {
            fn from(value: $ty) -> Node {
                value.0
            }
        }
    };
}

typed_node!(TreeNode, Tree);
typed_node!(RectNode, Rect);
typed_node!(BufferNode, Buffer);
