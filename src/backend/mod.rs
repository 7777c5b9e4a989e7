//! External collaborators.
//!
//! The scene graph deliberately does not rasterize, does not own a display
//! abstraction, and does not own a buffer abstraction: those are provided by
//! the compositor embedding this crate. This module defines the trait
//! surface the scene graph needs from each of them, grounded on
//! `smithay`'s own `Renderer`/`Frame`/`Texture` family
//! (`backend::renderer::mod`) and its output/damage-accumulator split
//! (`desktop::space`, `output`).

pub mod buffer;
pub mod output_handle;
pub mod presentation;
pub mod renderer;

pub use buffer::SceneBuffer;
pub use output_handle::{OutputDamage, OutputHandle};
pub use presentation::PresentationFeedback;
pub use renderer::{RenderFrame, Renderer, Texture};
