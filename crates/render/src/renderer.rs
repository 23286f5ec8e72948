use crate::layout::Vertex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Errors from renderer operations.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("texture {0:?} not found")]
    UnknownTexture(TextureRef),
    #[error("invalid texture size {width}x{height}")]
    TextureSize { width: u32, height: u32 },
    #[error("texture data too short: expected {expected} bytes, got {actual}")]
    TextureData { expected: usize, actual: usize },
    #[error("index {index} out of range for {len} vertices")]
    IndexOutOfRange { index: u32, len: usize },
    #[error("index count {0} is not a multiple of 3")]
    IncompleteTriangle(usize),
    #[error("invalid scale {x} x {y}")]
    Scale { x: f32, y: f32 },
    #[error("surface error: {0}")]
    Surface(String),
    #[error("backend error: {0}")]
    Backend(String),
}

/// RGBA color with straight 8-bit channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Self = Self::rgba(0, 0, 0, 255);

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

/// Integer rectangle: origin plus size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClipRect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl ClipRect {
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    pub fn is_empty(&self) -> bool {
        self.w <= 0 || self.h <= 0
    }

    /// Overlap of two rectangles; empty rectangles come back with zero size.
    pub fn intersect(&self, other: &ClipRect) -> ClipRect {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        ClipRect::new(x0, y0, span(x0.into(), x1), span(y0.into(), y1))
    }

    /// Multiply origin and size by a scale, rounding outward. Results
    /// saturate at the `i32` range.
    pub fn scaled(&self, sx: f32, sy: f32) -> ClipRect {
        let x0 = (f64::from(self.x) * f64::from(sx)).floor();
        let y0 = (f64::from(self.y) * f64::from(sy)).floor();
        let x1 = (self.right() as f64 * f64::from(sx)).ceil();
        let y1 = (self.bottom() as f64 * f64::from(sy)).ceil();
        let (x0, y0) = (x0 as i32, y0 as i32);
        ClipRect::new(x0, y0, span(x0.into(), x1 as i64), span(y0.into(), y1 as i64))
    }

    fn right(&self) -> i64 {
        i64::from(self.x) + i64::from(self.w)
    }

    fn bottom(&self) -> i64 {
        i64::from(self.y) + i64::from(self.h)
    }
}

/// Non-negative distance from `start` to `end`, saturated to `i32`.
fn span(start: i64, end: i64) -> i32 {
    (end - start).clamp(0, i64::from(i32::MAX)) as i32
}

/// Renderer-owned texture handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureRef(u32);

impl TextureRef {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn id(self) -> u32 {
        self.0
    }
}

/// How a texture's pixels combine with the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    /// Overwrite the target.
    None,
    /// Premultiplied-alpha "over" blending.
    #[default]
    Blend,
}

/// Identification of a renderer backend.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RendererInfo {
    /// Backend name, e.g. `vulkan`, `metal`, `recording`.
    pub name: String,
    /// Adapter or device name.
    pub device: String,
    /// Driver version string, if the backend reports one.
    pub driver_version: String,
}

/// Renderer-agnostic interface for clipped, textured 2D triangle geometry.
///
/// State (draw color, scale, clip rectangle) persists between calls until the
/// next `set_*`. Everything drawn since the last [`Renderer::present`] becomes
/// visible when `present` is called.
pub trait Renderer {
    fn info(&self) -> RendererInfo;

    /// Whether clip rectangles must be clamped to non-negative origin and
    /// viewport size before being set. Backends with a known clipping bug
    /// return `true`.
    fn needs_clip_clamp(&self) -> bool {
        false
    }

    /// Size of the render target in physical pixels.
    fn output_size(&self) -> Result<(u32, u32), RenderError>;

    /// Resize the render target after the window changed size.
    fn resize(&mut self, width: u32, height: u32);

    fn draw_color(&self) -> Color;
    fn set_draw_color(&mut self, color: Color) -> Result<(), RenderError>;

    /// Fill the whole target with the draw color, discarding pending geometry.
    fn clear(&mut self) -> Result<(), RenderError>;

    fn scale(&self) -> (f32, f32);
    fn set_scale(&mut self, x: f32, y: f32) -> Result<(), RenderError>;

    /// Drawable area in logical units (output size divided by scale).
    fn viewport(&self) -> ClipRect;

    fn clip_rect(&self) -> Option<ClipRect>;

    /// Set the clip rectangle in logical units; `None` disables clipping.
    fn set_clip_rect(&mut self, rect: Option<ClipRect>) -> Result<(), RenderError>;

    /// Create an RGBA8 texture. Contents are undefined until updated.
    fn create_texture(&mut self, width: u32, height: u32) -> Result<TextureRef, RenderError>;

    /// Upload RGBA8 pixels into `region` (or the whole texture). `pitch` is the
    /// byte distance between rows of `pixels`.
    fn update_texture(
        &mut self,
        texture: TextureRef,
        region: Option<ClipRect>,
        pixels: &[u8],
        pitch: usize,
    ) -> Result<(), RenderError>;

    fn set_texture_blend_mode(
        &mut self,
        texture: TextureRef,
        mode: BlendMode,
    ) -> Result<(), RenderError>;

    fn destroy_texture(&mut self, texture: TextureRef) -> Result<(), RenderError>;

    /// Draw indexed triangles. Indices address `vertices`; `None` draws
    /// untextured (vertex colors only).
    fn render_geometry(
        &mut self,
        texture: Option<TextureRef>,
        vertices: &[Vertex],
        indices: &[u32],
    ) -> Result<(), RenderError>;

    fn present(&mut self) -> Result<(), RenderError>;

    /// Release the renderer. Textures still alive are released with it.
    fn destroy(self) -> Result<(), RenderError>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// Number of bytes an RGBA8 upload of `width` x `height` with `pitch` needs.
pub fn required_bytes(width: u32, height: u32, pitch: usize) -> usize {
    if width == 0 || height == 0 {
        return 0;
    }
    pitch * (height as usize - 1) + width as usize * 4
}

/// One recorded renderer call.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderCall {
    SetDrawColor(Color),
    Clear(Color),
    SetScale(f32, f32),
    SetClipRect(Option<ClipRect>),
    CreateTexture {
        texture: TextureRef,
        width: u32,
        height: u32,
    },
    UpdateTexture {
        texture: TextureRef,
        region: Option<ClipRect>,
        bytes: usize,
    },
    SetBlendMode(TextureRef, BlendMode),
    DestroyTexture(TextureRef),
    Geometry {
        texture: Option<TextureRef>,
        clip: Option<ClipRect>,
        vertices: usize,
        indices: Vec<u32>,
    },
    Present,
}

#[derive(Debug, Clone, Copy)]
struct RecordedTexture {
    width: u32,
    height: u32,
}

/// Renderer that records calls instead of drawing.
///
/// Useful for headless runs and for testing code written against
/// [`Renderer`]. Indices are checked against the vertex slice so that bad
/// buffer slicing shows up as an error.
#[derive(Debug)]
pub struct RecordingRenderer {
    output: (u32, u32),
    draw_color: Color,
    scale: (f32, f32),
    clip: Option<ClipRect>,
    textures: BTreeMap<TextureRef, RecordedTexture>,
    next_texture: u32,
    calls: Vec<RenderCall>,
    clip_quirk: bool,
    fail_geometry: bool,
    fail_texture_updates: bool,
    live_textures: Arc<AtomicUsize>,
}

impl RecordingRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            output: (width, height),
            draw_color: Color::BLACK,
            scale: (1.0, 1.0),
            clip: None,
            textures: BTreeMap::new(),
            next_texture: 1,
            calls: Vec::new(),
            clip_quirk: false,
            fail_geometry: false,
            fail_texture_updates: false,
            live_textures: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Count created-but-not-destroyed textures in `counter`, which outlives
    /// the renderer. Textures released only by [`Renderer::destroy`] stay
    /// counted.
    pub fn with_live_texture_counter(mut self, counter: Arc<AtomicUsize>) -> Self {
        self.live_textures = counter;
        self
    }

    /// Report the clip-rectangle quirk from [`Renderer::needs_clip_clamp`].
    pub fn with_clip_quirk(mut self, quirk: bool) -> Self {
        self.clip_quirk = quirk;
        self
    }

    /// Make every following `render_geometry` call fail.
    pub fn set_fail_geometry(&mut self, fail: bool) {
        self.fail_geometry = fail;
    }

    /// Make every following `update_texture` call fail.
    pub fn set_fail_texture_updates(&mut self, fail: bool) {
        self.fail_texture_updates = fail;
    }

    pub fn calls(&self) -> &[RenderCall] {
        &self.calls
    }

    /// Drain the recorded calls.
    pub fn take_calls(&mut self) -> Vec<RenderCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn texture_size(&self, texture: TextureRef) -> Option<(u32, u32)> {
        self.textures.get(&texture).map(|t| (t.width, t.height))
    }

    fn texture(&self, texture: TextureRef) -> Result<RecordedTexture, RenderError> {
        self.textures
            .get(&texture)
            .copied()
            .ok_or(RenderError::UnknownTexture(texture))
    }
}

impl Renderer for RecordingRenderer {
    fn info(&self) -> RendererInfo {
        RendererInfo {
            name: "recording".into(),
            device: "none".into(),
            driver_version: env!("CARGO_PKG_VERSION").into(),
        }
    }

    fn needs_clip_clamp(&self) -> bool {
        self.clip_quirk
    }

    fn output_size(&self) -> Result<(u32, u32), RenderError> {
        Ok(self.output)
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.output = (width, height);
    }

    fn draw_color(&self) -> Color {
        self.draw_color
    }

    fn set_draw_color(&mut self, color: Color) -> Result<(), RenderError> {
        self.draw_color = color;
        self.calls.push(RenderCall::SetDrawColor(color));
        Ok(())
    }

    fn clear(&mut self) -> Result<(), RenderError> {
        self.calls.push(RenderCall::Clear(self.draw_color));
        Ok(())
    }

    fn scale(&self) -> (f32, f32) {
        self.scale
    }

    fn set_scale(&mut self, x: f32, y: f32) -> Result<(), RenderError> {
        if !(x > 0.0 && y > 0.0 && x.is_finite() && y.is_finite()) {
            return Err(RenderError::Scale { x, y });
        }
        self.scale = (x, y);
        self.calls.push(RenderCall::SetScale(x, y));
        Ok(())
    }

    fn viewport(&self) -> ClipRect {
        ClipRect::new(
            0,
            0,
            (self.output.0 as f32 / self.scale.0) as i32,
            (self.output.1 as f32 / self.scale.1) as i32,
        )
    }

    fn clip_rect(&self) -> Option<ClipRect> {
        self.clip
    }

    fn set_clip_rect(&mut self, rect: Option<ClipRect>) -> Result<(), RenderError> {
        self.clip = rect;
        self.calls.push(RenderCall::SetClipRect(rect));
        Ok(())
    }

    fn create_texture(&mut self, width: u32, height: u32) -> Result<TextureRef, RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::TextureSize { width, height });
        }
        let texture = TextureRef::new(self.next_texture);
        self.next_texture += 1;
        self.textures
            .insert(texture, RecordedTexture { width, height });
        self.live_textures.fetch_add(1, Ordering::Relaxed);
        self.calls.push(RenderCall::CreateTexture {
            texture,
            width,
            height,
        });
        Ok(texture)
    }

    fn update_texture(
        &mut self,
        texture: TextureRef,
        region: Option<ClipRect>,
        pixels: &[u8],
        pitch: usize,
    ) -> Result<(), RenderError> {
        let recorded = self.texture(texture)?;
        if self.fail_texture_updates {
            return Err(RenderError::Backend("texture update rejected".into()));
        }
        let (width, height) = match region {
            Some(r) => (r.w.max(0) as u32, r.h.max(0) as u32),
            None => (recorded.width, recorded.height),
        };
        let expected = required_bytes(width, height, pitch);
        if pixels.len() < expected {
            return Err(RenderError::TextureData {
                expected,
                actual: pixels.len(),
            });
        }
        self.calls.push(RenderCall::UpdateTexture {
            texture,
            region,
            bytes: pixels.len(),
        });
        Ok(())
    }

    fn set_texture_blend_mode(
        &mut self,
        texture: TextureRef,
        mode: BlendMode,
    ) -> Result<(), RenderError> {
        self.texture(texture)?;
        self.calls.push(RenderCall::SetBlendMode(texture, mode));
        Ok(())
    }

    fn destroy_texture(&mut self, texture: TextureRef) -> Result<(), RenderError> {
        self.textures
            .remove(&texture)
            .ok_or(RenderError::UnknownTexture(texture))?;
        self.live_textures.fetch_sub(1, Ordering::Relaxed);
        self.calls.push(RenderCall::DestroyTexture(texture));
        Ok(())
    }

    fn render_geometry(
        &mut self,
        texture: Option<TextureRef>,
        vertices: &[Vertex],
        indices: &[u32],
    ) -> Result<(), RenderError> {
        if self.fail_geometry {
            return Err(RenderError::Backend("geometry rejected".into()));
        }
        if let Some(texture) = texture {
            self.texture(texture)?;
        }
        if indices.len() % 3 != 0 {
            return Err(RenderError::IncompleteTriangle(indices.len()));
        }
        if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            return Err(RenderError::IndexOutOfRange {
                index,
                len: vertices.len(),
            });
        }
        self.calls.push(RenderCall::Geometry {
            texture,
            clip: self.clip,
            vertices: vertices.len(),
            indices: indices.to_vec(),
        });
        Ok(())
    }

    fn present(&mut self) -> Result<(), RenderError> {
        self.calls.push(RenderCall::Present);
        Ok(())
    }
}
