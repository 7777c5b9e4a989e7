//! The rendering backend the scene graph draws through.
//!
//! Mirrors `smithay::backend::renderer`'s `Renderer`/`Frame`/`Texture` split:
//! a [`Renderer`] is long-lived and knows how to upload textures and open a
//! [`RenderFrame`], which in turn owns the begin/end-bracketed sequence of
//! scissor/clear/draw calls for exactly one `begin`/`end` pair.

use cgmath::Matrix3;

use crate::backend::buffer::SceneBuffer;
use crate::utils::{Buffer as BufferCoord, Physical, Rectangle};

/// A renderer-owned texture handle.
///
/// Concrete texture types are cheap to clone (a GL name, a `Vk` image view,
/// ...), like `smithay`'s own GLES/Vulkan texture handles — `BufferNode`'s
/// texture cache relies on this to hand out a copy without going back
/// through the renderer.
pub trait Texture: std::fmt::Debug + Clone + 'static {
    /// Width of the texture, in texture pixels.
    fn width(&self) -> i32;
    /// Height of the texture, in texture pixels.
    fn height(&self) -> i32;
}

/// The rendering operations available while a frame is open, between
/// [`Renderer::begin`] and [`RenderFrame::finish`].
pub trait RenderFrame {
    /// Error type returned by the rendering operations of this frame.
    type Error: std::error::Error + 'static;
    /// Texture handle type used by the owning renderer.
    type TextureId: Texture;

    /// Clears the whole target to an opaque color.
    fn clear(&mut self, rgba: [f32; 4]) -> Result<(), Self::Error>;

    /// Restricts subsequent draws to `region`, or removes the restriction
    /// when `None`.
    fn scissor(&mut self, region: Option<Rectangle<i32, Physical>>) -> Result<(), Self::Error>;

    /// Draws a solid-colored rectangle.
    fn render_rect(
        &mut self,
        box_: Rectangle<i32, Physical>,
        rgba: [f32; 4],
        matrix: Matrix3<f32>,
    ) -> Result<(), Self::Error>;

    /// Draws `src` (in buffer-local coordinates) of `texture`, transformed by
    /// `matrix`, at `alpha` opacity.
    fn render_textured_quad(
        &mut self,
        texture: &Self::TextureId,
        src: Rectangle<f64, BufferCoord>,
        matrix: Matrix3<f32>,
        alpha: f32,
    ) -> Result<(), Self::Error>;

    /// Ends this frame, flushing any buffered draw state.
    fn finish(self) -> Result<(), Self::Error>;
}

/// A GPU rendering context.
pub trait Renderer {
    /// Error type shared by this renderer and the frames it opens.
    type Error: std::error::Error + 'static;
    /// Texture handle type produced by [`Renderer::texture_from_buffer`].
    type TextureId: Texture;
    /// The in-progress-frame type opened by [`Renderer::begin`].
    type Frame<'a>: RenderFrame<Error = Self::Error, TextureId = Self::TextureId>
    where
        Self: 'a;

    /// Opens a new frame targeting a surface of the given physical size.
    fn begin(&mut self, width: i32, height: i32) -> Result<Self::Frame<'_>, Self::Error>;

    /// Uploads (or re-samples) the contents of `buffer` into a texture.
    fn texture_from_buffer(&mut self, buffer: &dyn SceneBuffer) -> Result<Self::TextureId, Self::Error>;

    /// Releases a texture. The default implementation simply drops it;
    /// renderers that pool textures can override this to recycle storage.
    fn destroy_texture(&mut self, texture: Self::TextureId) {
        drop(texture);
    }
}
