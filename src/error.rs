//! Error types for the fallible operations this crate owns.
//!
//! Most rejections described by the scene graph's contract are programmer
//! errors (reparenting a node under its own descendant, relating siblings
//! with different parents) and are enforced with `assert!`/`debug_assert!`
//! rather than a `Result`, matching how [`crate::scene`]'s own invariants are
//! documented. The one condition below — running out of the 64-output
//! bitmask's address space — is a genuine runtime condition a well-behaved
//! caller can hit and must be able to recover from.

/// Failure creating a [`crate::scene::SceneOutput`].
#[derive(Debug, thiserror::Error)]
pub enum OutputCreateError {
    /// The scene already tracks the maximum of 64 outputs (the bitmask width
    /// used by [`crate::scene::buffer::BufferNode::active_outputs`]).
    #[error("scene already has the maximum of 64 outputs")]
    TooManyOutputs,
}
