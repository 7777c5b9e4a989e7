//! The `Tree` variant: a pure grouping node, and the sibling-list
//! operations shared by every node kind (spec.md §4.A).
//!
//! Sibling order is modeled as a plain `Vec<Node>` rather than an intrusive
//! doubly-linked list — `smithay`'s own `desktop::space::Space` keeps its
//! z-ordered windows in an `IndexSet`/insertion-order container for the same
//! reason: at the tree sizes this core deals with, a vector relink is simpler
//! to reason about than manual intrusive-list surgery and has the same
//! observable behavior. Index 0 is the back (bottommost, painted first); the
//! last element is the front (topmost, painted last, hit-tested first).

use crate::scene::node::{Node, NodeKind, NodeTag, TreeNode};

pub(crate) struct TreeState {
    pub(crate) children: Vec<Node>,
}

impl TreeState {
    pub(crate) fn new() -> Self {
        TreeState { children: Vec::new() }
    }
}

pub(crate) fn children_snapshot(node: &Node) -> Vec<Node> {
    node.with_inner(|inner| match &inner.kind {
        NodeKind::Tree(state) => state.children.clone(),
        _ => Vec::new(),
    })
}

fn is_self_or_descendant(candidate: &Node, target: &Node) -> bool {
    if candidate == target {
        return true;
    }
    let mut current = candidate.parent();
    while let Some(p) = current {
        if &p.0 == target {
            return true;
        }
        current = p.parent();
    }
    false
}

impl TreeNode {
    /// Returns a snapshot of this tree's children, back-to-front.
    pub fn children(&self) -> Vec<Node> {
        children_snapshot(self)
    }

    /// Creates a new, empty `Tree` as the topmost child of this tree.
    pub fn create_tree(&self) -> TreeNode {
        let child = Node::new(
            self.scene_weak(),
            Some(self.downgrade()),
            0,
            0,
            NodeKind::Tree(TreeState::new()),
        );
        self.push_child(child.clone());
        TreeNode(child)
    }

    /// Creates a new solid-colored `Rect` as the topmost child of this tree.
    pub fn create_rect(&self, width: i32, height: i32, color: [f32; 4]) -> RectNodeHandle {
        use crate::scene::rect::RectState;
        let child = Node::new(
            self.scene_weak(),
            Some(self.downgrade()),
            0,
            0,
            NodeKind::Rect(RectState { width, height, color }),
        );
        self.push_child(child.clone());
        crate::scene::damage::damage_whole(&child);
        crate::scene::node::RectNode(child)
    }

    /// Creates a new, initially empty `Buffer` node as the topmost child of
    /// this tree.
    pub fn create_buffer(&self) -> BufferNodeHandle {
        use crate::scene::buffer::BufferState;
        let child = Node::new(
            self.scene_weak(),
            Some(self.downgrade()),
            0,
            0,
            NodeKind::Buffer(BufferState::new()),
        );
        self.push_child(child.clone());
        crate::scene::damage::damage_whole(&child);
        crate::scene::membership::recompute_subtree(&child);
        crate::scene::node::BufferNode(child)
    }

    fn push_child(&self, child: Node) {
        self.with_inner_mut(|inner| {
            let NodeKind::Tree(state) = &mut inner.kind else {
                unreachable!("TreeNode always wraps a Tree-kind node")
            };
            state.children.push(child);
        });
    }
}

// Aliases so doc links above resolve without forward-declaring the concrete
// types defined in `node`.
type RectNodeHandle = crate::scene::node::RectNode;
type BufferNodeHandle = crate::scene::node::BufferNode;

impl Node {
    /// Places this node immediately above `sibling` in their shared parent's
    /// child order. Both nodes must share the same parent. No-op if already
    /// in that relation.
    pub fn place_above(&self, sibling: &Node) {
        reorder(self, sibling, true);
    }

    /// Places this node immediately below `sibling` in their shared parent's
    /// child order. Both nodes must share the same parent. No-op if already
    /// in that relation.
    pub fn place_below(&self, sibling: &Node) {
        reorder(self, sibling, false);
    }

    /// Raises this node to the top (front) of its parent's child order.
    pub fn raise_to_top(&self) {
        let parent = self.parent().expect("node has no parent");
        let changed = parent.with_inner_mut(|inner| {
            let NodeKind::Tree(state) = &mut inner.kind else {
                unreachable!("parent is always a Tree")
            };
            let idx = state
                .children
                .iter()
                .position(|c| c == self)
                .expect("node not found among its parent's children");
            if idx == state.children.len() - 1 {
                return false;
            }
            let node = state.children.remove(idx);
            state.children.push(node);
            true
        });
        if changed {
            crate::scene::damage::damage_whole(self);
        }
    }

    /// Lowers this node to the bottom (back) of its parent's child order.
    pub fn lower_to_bottom(&self) {
        let parent = self.parent().expect("node has no parent");
        let changed = parent.with_inner_mut(|inner| {
            let NodeKind::Tree(state) = &mut inner.kind else {
                unreachable!("parent is always a Tree")
            };
            let idx = state
                .children
                .iter()
                .position(|c| c == self)
                .expect("node not found among its parent's children");
            if idx == 0 {
                return false;
            }
            let node = state.children.remove(idx);
            state.children.insert(0, node);
            true
        });
        if changed {
            crate::scene::damage::damage_whole(self);
        }
    }

    /// Moves this node (and its subtree) to be the topmost child of
    /// `new_parent`.
    ///
    /// # Panics
    ///
    /// Panics if `new_parent` is this node itself or one of its descendants
    /// — reparenting under your own descendant would create a cycle
    /// (spec.md §4.A, §7).
    pub fn reparent(&self, new_parent: &TreeNode) {
        assert!(
            !is_self_or_descendant(new_parent.node(), self),
            "cannot reparent a node under itself or one of its own descendants"
        );

        crate::scene::damage::damage_whole(self);

        if let Some(old_parent) = self.parent() {
            old_parent.with_inner_mut(|inner| {
                let NodeKind::Tree(state) = &mut inner.kind else {
                    unreachable!("parent is always a Tree")
                };
                state.children.retain(|c| c != self);
            });
        }

        self.with_inner_mut(|inner| {
            inner.parent = Some(new_parent.downgrade());
        });

        new_parent.with_inner_mut(|inner| {
            let NodeKind::Tree(state) = &mut inner.kind else {
                unreachable!("parent is always a Tree")
            };
            state.children.push(self.clone());
        });

        crate::scene::damage::damage_whole(self);
        crate::scene::membership::recompute_subtree(self);
    }
}

fn reorder(node: &Node, sibling: &Node, place_above: bool) {
    assert_ne!(node, sibling, "a node cannot be placed relative to itself");
    let parent = node.parent().expect("node has no parent");
    let sibling_parent = sibling.parent().expect("sibling has no parent");
    assert_eq!(
        parent, sibling_parent,
        "place_above/place_below requires both nodes to share a parent"
    );

    let changed = parent.with_inner_mut(|inner| {
        let NodeKind::Tree(state) = &mut inner.kind else {
            unreachable!("parent is always a Tree")
        };
        let node_idx = state.children.iter().position(|c| c == node).unwrap();
        let removed = state.children.remove(node_idx);
        let sib_idx = state.children.iter().position(|c| c == sibling).unwrap();
        let insert_at = if place_above { sib_idx + 1 } else { sib_idx };
        if insert_at == node_idx {
            state.children.insert(node_idx, removed);
            false
        } else {
            state.children.insert(insert_at, removed);
            true
        }
    });

    if changed {
        crate::scene::damage::damage_whole(node);
        crate::scene::damage::damage_whole(sibling);
    }
}

/// Destroys `node` and, recursively, its children.
///
/// Implements spec.md §4.A's destruction order: damage, then the destroy
/// signal, then this node is marked dead, then variant-specific teardown,
/// then (for a Tree) recursion into whatever children remain once observers
/// have had a chance to detach some during the signal, then unlinking from
/// the parent.
pub(crate) fn destroy_node(node: &Node) {
    crate::scene::damage::damage_whole(node);

    let signal = node.with_inner(|inner| inner.destroy_signal.clone());
    signal.signal(());

    node.with_inner_mut(|inner| inner.alive.destroy_notify());

    match node.tag() {
        NodeTag::Buffer => crate::scene::buffer::teardown(node),
        NodeTag::Tree => {
            if node.parent().is_none() {
                if let Some(scene) = node.scene_handle() {
                    crate::scene::destroy_root_extras(&scene);
                }
            }
        }
        NodeTag::Rect => {}
    }

    if let NodeTag::Tree = node.tag() {
        for child in children_snapshot(node) {
            if child.is_alive() {
                destroy_node(&child);
            }
        }
    }

    if let Some(parent) = node.parent() {
        parent.with_inner_mut(|inner| {
            let NodeKind::Tree(state) = &mut inner.kind else {
                unreachable!("parent is always a Tree")
            };
            state.children.retain(|c| c != node);
        });
    }
}
