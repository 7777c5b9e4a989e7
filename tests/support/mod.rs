//! Fake `Renderer`/`OutputHandle`/`SceneBuffer` implementations used to drive
//! the commit pipeline end-to-end in `tests/scenarios.rs`, without an actual
//! GPU or display.

#![allow(dead_code)]

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Once;

use wayland_scene::backend::{OutputDamage, OutputHandle, RenderFrame, Renderer, SceneBuffer, Texture};
use wayland_scene::utils::{Buffer as BufferCoord, Logical, Physical, Rectangle, Scale, Size, Transform};

static INIT_LOGGING: Once = Once::new();

/// Installs a `tracing-subscriber` `fmt` layer, honoring `RUST_LOG` like the
/// teacher's own `smallvil`/`test_clients` examples do. Guarded by `Once`
/// since every scenario test in this binary calls it and
/// `tracing_subscriber::fmt().init()` panics if the global subscriber is
/// already set.
pub fn init_logging() {
    INIT_LOGGING.call_once(|| {
        if let Ok(env_filter) = tracing_subscriber::EnvFilter::try_from_default_env() {
            tracing_subscriber::fmt().with_env_filter(env_filter).init();
        } else {
            tracing_subscriber::fmt().init();
        }
    });
}

/// A pixel buffer with no backing storage: just dimensions and a lock count.
#[derive(Debug)]
pub struct FakeBuffer {
    width: i32,
    height: i32,
    locks: RefCell<i32>,
}

impl FakeBuffer {
    pub fn new(width: i32, height: i32) -> Rc<Self> {
        Rc::new(FakeBuffer {
            width,
            height,
            locks: RefCell::new(0),
        })
    }

    pub fn lock_count(&self) -> i32 {
        *self.locks.borrow()
    }
}

impl SceneBuffer for FakeBuffer {
    fn lock(&self) {
        *self.locks.borrow_mut() += 1;
    }

    fn unlock(&self) {
        *self.locks.borrow_mut() -= 1;
    }

    fn width(&self) -> i32 {
        self.width
    }

    fn height(&self) -> i32 {
        self.height
    }
}

/// A texture handle with nothing behind it but the buffer size it was
/// imported from.
#[derive(Debug, Clone)]
pub struct FakeTexture {
    width: i32,
    height: i32,
}

impl Texture for FakeTexture {
    fn width(&self) -> i32 {
        self.width
    }

    fn height(&self) -> i32 {
        self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawCall {
    Scissor(Option<Rectangle<i32, Physical>>),
    Clear,
    Rect { dst: Rectangle<i32, Physical> },
    TexturedQuad { src: Rectangle<f64, BufferCoord> },
}

/// Records every draw call issued while a [`FakeFrame`] is open.
#[derive(Debug, Default)]
pub struct FrameLog {
    pub calls: Vec<DrawCall>,
}

#[derive(Debug)]
pub struct FakeRenderError;

impl fmt::Display for FakeRenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("fake render error")
    }
}
impl std::error::Error for FakeRenderError {}

pub struct FakeFrame<'a> {
    log: &'a RefCell<FrameLog>,
}

impl RenderFrame for FakeFrame<'_> {
    type Error = FakeRenderError;
    type TextureId = FakeTexture;

    fn clear(&mut self, _rgba: [f32; 4]) -> Result<(), Self::Error> {
        self.log.borrow_mut().calls.push(DrawCall::Clear);
        Ok(())
    }

    fn scissor(&mut self, region: Option<Rectangle<i32, Physical>>) -> Result<(), Self::Error> {
        self.log.borrow_mut().calls.push(DrawCall::Scissor(region));
        Ok(())
    }

    fn render_rect(
        &mut self,
        box_: Rectangle<i32, Physical>,
        _rgba: [f32; 4],
        _matrix: cgmath::Matrix3<f32>,
    ) -> Result<(), Self::Error> {
        self.log.borrow_mut().calls.push(DrawCall::Rect { dst: box_ });
        Ok(())
    }

    fn render_textured_quad(
        &mut self,
        _texture: &Self::TextureId,
        src: Rectangle<f64, BufferCoord>,
        _matrix: cgmath::Matrix3<f32>,
        _alpha: f32,
    ) -> Result<(), Self::Error> {
        self.log.borrow_mut().calls.push(DrawCall::TexturedQuad { src });
        Ok(())
    }

    fn finish(self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// A renderer that never touches a GPU: it hands out [`FakeTexture`]s sized
/// after the buffer they were imported from, and records every draw call
/// issued against the frames it opens.
#[derive(Debug, Default)]
pub struct FakeRenderer {
    pub import_count: RefCell<u32>,
    log: RefCell<FrameLog>,
}

impl FakeRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<DrawCall> {
        self.log.borrow().calls.clone()
    }
}

impl Renderer for FakeRenderer {
    type Error = FakeRenderError;
    type TextureId = FakeTexture;
    type Frame<'a>
        = FakeFrame<'a>
    where
        Self: 'a;

    fn begin(&mut self, _width: i32, _height: i32) -> Result<Self::Frame<'_>, Self::Error> {
        self.log.borrow_mut().calls.clear();
        Ok(FakeFrame { log: &self.log })
    }

    fn texture_from_buffer(&mut self, buffer: &dyn SceneBuffer) -> Result<Self::TextureId, Self::Error> {
        *self.import_count.borrow_mut() += 1;
        Ok(FakeTexture {
            width: buffer.width(),
            height: buffer.height(),
        })
    }
}

#[derive(Debug, Default)]
struct FakeOutputState {
    scanout_buffer: Option<(i32, i32)>,
    scanout_test_result: bool,
    commits: u32,
    rollbacks: u32,
    presents: Vec<(i32, i32)>,
    frames_scheduled: u32,
    cursor_damage_calls: Vec<Vec<Rectangle<i32, Physical>>>,
}

/// A display with no real scanout hardware behind it: `test`/`commit` always
/// succeed unless explicitly told to fail, and every call is recorded for the
/// test to assert on via a cloned [`FakeOutputProbe`].
///
/// `resolution`/`scale`/`transform` are fixed at construction (nothing in
/// these tests reconfigures a display mid-scene) and `damage` is held
/// directly rather than behind the shared probe state, since
/// [`OutputHandle::damage_mut`] must hand back a plain `&mut` into it.
#[derive(Debug)]
pub struct FakeOutput {
    resolution: Size<i32, Logical>,
    scale: Scale<f64>,
    transform: Transform,
    damage: OutputDamage,
    state: Rc<RefCell<FakeOutputState>>,
}

/// A cloneable handle onto a [`FakeOutput`]'s recorded activity, kept by the
/// test after the `FakeOutput` itself has been boxed and handed to
/// [`wayland_scene::Scene::create_output`].
#[derive(Debug, Clone)]
pub struct FakeOutputProbe(Rc<RefCell<FakeOutputState>>);

impl FakeOutputProbe {
    pub fn reject_scanout(&self) {
        self.0.borrow_mut().scanout_test_result = false;
    }

    pub fn commit_count(&self) -> u32 {
        self.0.borrow().commits
    }

    pub fn rollback_count(&self) -> u32 {
        self.0.borrow().rollbacks
    }

    pub fn presented_buffers(&self) -> Vec<(i32, i32)> {
        self.0.borrow().presents.clone()
    }

    pub fn frames_scheduled(&self) -> u32 {
        self.0.borrow().frames_scheduled
    }

    pub fn last_scanout_attach(&self) -> Option<(i32, i32)> {
        self.0.borrow().scanout_buffer
    }
}

impl FakeOutput {
    /// Builds a boxed `OutputHandle` ready for `Scene::create_output`,
    /// alongside a probe the test keeps to inspect what happened to it.
    pub fn new(width: i32, height: i32, scale: f64, transform: Transform) -> (Box<dyn OutputHandle>, FakeOutputProbe) {
        let state = Rc::new(RefCell::new(FakeOutputState {
            scanout_test_result: true,
            ..Default::default()
        }));
        let output = FakeOutput {
            resolution: Size::from((width, height)),
            scale: Scale::from(scale),
            transform,
            damage: OutputDamage::new(),
            state: state.clone(),
        };
        (Box::new(output), FakeOutputProbe(state))
    }
}

impl OutputHandle for FakeOutput {
    fn resolution(&self) -> Size<i32, Logical> {
        self.resolution
    }

    fn transformed_resolution(&self) -> Size<i32, Physical> {
        let physical = self.resolution.to_f64().to_physical(self.scale).to_i32_round();
        self.transform.transform_size(physical)
    }

    fn scale(&self) -> Scale<f64> {
        self.scale
    }

    fn transform(&self) -> Transform {
        self.transform
    }

    fn damage_mut(&mut self) -> &mut OutputDamage {
        &mut self.damage
    }

    fn attach_buffer(&mut self, buffer: &dyn SceneBuffer) {
        self.state.borrow_mut().scanout_buffer = Some((buffer.width(), buffer.height()));
    }

    fn test(&mut self) -> bool {
        self.state.borrow().scanout_test_result
    }

    fn rollback(&mut self) {
        let mut state = self.state.borrow_mut();
        state.rollbacks += 1;
        state.scanout_buffer = None;
    }

    fn commit(&mut self) -> bool {
        let mut state = self.state.borrow_mut();
        state.commits += 1;
        if let Some(dims) = state.scanout_buffer.take() {
            state.presents.push(dims);
        }
        true
    }

    fn schedule_frame(&mut self) {
        self.state.borrow_mut().frames_scheduled += 1;
    }

    fn render_software_cursors(&mut self, damage: &[Rectangle<i32, Physical>]) {
        self.state.borrow_mut().cursor_damage_calls.push(damage.to_vec());
    }
}
