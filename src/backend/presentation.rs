//! The presentation-feedback subsystem.
//!
//! Out of scope per this crate's purpose; the scene graph only stores a
//! reference to the embedder's feedback object and needs to be told when it
//! is destroyed, so it can drop its own reference in turn.

/// A handle to an external presentation-feedback object.
pub trait PresentationFeedback {
    /// Registers `on_destroy` to run exactly once, when this feedback object
    /// is destroyed.
    fn on_destroy(&self, on_destroy: Box<dyn FnOnce()>);
}
