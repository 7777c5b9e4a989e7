//! The buffer abstraction: a lockable, refcounted pixel source.

use std::any::Any;

/// A single pixel buffer a [`crate::scene::buffer::BufferNode`] can sample from.
///
/// Mirrors the handful of operations `smithay`'s renderer import path needs
/// from a `wl_buffer`/dmabuf/shm buffer: a reference count the scene graph
/// participates in via `lock`/`unlock`, raw dimensions, and an optional
/// pre-uploaded texture a client-side renderer may already have attached.
pub trait SceneBuffer: std::fmt::Debug {
    /// Called exactly once when a node starts referencing this buffer.
    fn lock(&self);

    /// Called exactly once when a node stops referencing this buffer
    /// (replaced or destroyed). Balances a prior [`SceneBuffer::lock`].
    fn unlock(&self);

    /// Width of the buffer, in buffer-local pixels.
    fn width(&self) -> i32;

    /// Height of the buffer, in buffer-local pixels.
    fn height(&self) -> i32;

    /// A texture already uploaded by the client, if any. Type-erased because
    /// the concrete texture type is owned by whichever [`crate::backend::Renderer`]
    /// is driving the current commit; the render pipeline downcasts this
    /// against the active renderer's `TextureId` and falls back to importing
    /// the buffer itself on a mismatch or absence, exactly as it falls back
    /// for an unset client texture.
    fn client_texture(&self) -> Option<&dyn Any> {
        None
    }
}
