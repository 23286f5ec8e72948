use std::collections::HashMap;
use std::time::Instant;

use egui::{ImageData, OutputCommand, Pos2, Rect, TextureId, Vec2, ViewportId};
use framebridge_input::{EventHandler, EventOutcome, EventType, InputEvent, InputSession, KeyBindings};
use framebridge_render::{
    BlendMode, ClipRect, Color, Renderer, TextureRef, VERTEX_ALIGNMENT, VERTEX_LAYOUT,
    VERTEX_SIZE, validate_layout, view_vertices,
};

use crate::convert::{Scratch, clamp_clip_rect, clip_rect_of};
use crate::error::{DriverError, InitStep, ListenerError};
use crate::gui::{ConvertConfig, Font, FontAtlas, GuiDriver, NullTexture};
use crate::window::{Window, WindowDriver};

/// Called for every event after translation, with its classification.
pub type EventListener = Box<dyn FnMut(&InputEvent, EventOutcome) -> Result<(), ListenerError>>;

/// Largest UI scale [`Driver::set_ui_scale`] accepts.
pub const MAX_UI_SCALE: f32 = 5.0;

/// UI scales above this use the large font.
const LARGE_FONT_THRESHOLD: f32 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Uninitialized,
    Initialized,
    InFrame,
    Destroyed,
}

/// Owns the window, renderer and GUI resources and runs the frame
/// lifecycle: [`init`](Driver::init), then [`pre_render`](Driver::pre_render)
/// and [`post_render`](Driver::post_render) around each frame's GUI code,
/// then [`destroy`](Driver::destroy).
///
/// Every resource is optional so teardown works from any partially
/// initialized state.
pub struct Driver<W: WindowDriver, G: GuiDriver> {
    window_driver: W,
    gui_driver: G,
    listener: Option<EventListener>,
    handler: EventHandler,
    state: State,
    platform_up: bool,

    window: Option<W::Window>,
    renderer: Option<W::Renderer>,
    textures: HashMap<TextureId, TextureRef>,

    context: Option<egui::Context>,
    atlas: Option<FontAtlas>,
    font: Option<Font>,
    large_font: Option<Font>,
    null: Option<NullTexture>,
    convert: Option<ConvertConfig>,
    scratch: Option<Scratch>,

    ui_scale: f32,
    bg_color: Color,
    clamp_override: Option<bool>,
    clamp_clip_rect: bool,
    clipboard: Option<String>,
    next_user_texture: u64,
    started: Instant,
    modifiers: egui::Modifiers,
    pointer: Pos2,
    events: Vec<InputEvent>,
}

impl<W: WindowDriver, G: GuiDriver> Driver<W, G> {
    pub fn new(
        window_driver: W,
        gui_driver: G,
        bindings: KeyBindings,
        listener: Option<EventListener>,
    ) -> Self {
        Self {
            window_driver,
            gui_driver,
            listener,
            handler: EventHandler::new(bindings),
            state: State::Uninitialized,
            platform_up: false,
            window: None,
            renderer: None,
            textures: HashMap::new(),
            context: None,
            atlas: None,
            font: None,
            large_font: None,
            null: None,
            convert: None,
            scratch: None,
            ui_scale: 1.0,
            bg_color: Color::BLACK,
            clamp_override: None,
            clamp_clip_rect: false,
            clipboard: None,
            next_user_texture: 0,
            started: Instant::now(),
            modifiers: egui::Modifiers::NONE,
            pointer: Pos2::ZERO,
            events: Vec::new(),
        }
    }

    pub fn window(&self) -> Option<&W::Window> {
        self.window.as_ref()
    }

    pub fn window_mut(&mut self) -> Option<&mut W::Window> {
        self.window.as_mut()
    }

    pub fn renderer(&self) -> Option<&W::Renderer> {
        self.renderer.as_ref()
    }

    pub fn renderer_mut(&mut self) -> Option<&mut W::Renderer> {
        self.renderer.as_mut()
    }

    pub fn context(&self) -> Option<&egui::Context> {
        self.context.as_ref()
    }

    pub fn window_driver(&self) -> &W {
        &self.window_driver
    }

    pub fn gui_driver(&self) -> &G {
        &self.gui_driver
    }

    pub fn bindings(&self) -> &KeyBindings {
        self.handler.bindings()
    }

    pub fn null_texture(&self) -> Option<NullTexture> {
        self.null
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self.state, State::Initialized | State::InFrame)
    }

    pub fn in_frame(&self) -> bool {
        self.state == State::InFrame
    }

    pub fn bg_color(&self) -> Color {
        self.bg_color
    }

    pub fn set_bg_color(&mut self, color: Color) {
        self.bg_color = color;
    }

    pub fn ui_scale(&self) -> f32 {
        self.ui_scale
    }

    /// Whether clip rectangles are clamped before being set.
    pub fn clamp_clip_rect(&self) -> bool {
        self.clamp_clip_rect
    }

    /// Force clip-rectangle clamping on or off, overriding what the renderer
    /// reports through [`Renderer::needs_clip_clamp`].
    pub fn set_clamp_clip_rect(&mut self, clamp: bool) {
        self.clamp_override = Some(clamp);
        self.clamp_clip_rect = clamp;
    }

    /// Text the GUI last copied, pasted back on `Paste`.
    pub fn clipboard_text(&self) -> Option<&str> {
        self.clipboard.as_deref()
    }

    pub fn set_clipboard_text(&mut self, text: Option<String>) {
        self.clipboard = text;
    }

    /// Set the UI scale: the renderer scale applied while drawing the GUI.
    ///
    /// `0` detects the scale from the ratio of renderer output size to
    /// logical window size, which needs an initialized driver. NaN and
    /// values outside `[0, 5]` are rejected, as is any call between
    /// [`pre_render`](Driver::pre_render) and [`post_render`](Driver::post_render).
    #[doc(alias = "set_render_scale")]
    pub fn set_ui_scale(&mut self, ui_scale: f32) -> Result<(), DriverError> {
        if self.state == State::InFrame {
            return Err(DriverError::MidFrame);
        }
        if ui_scale.is_nan() || !(0.0..=MAX_UI_SCALE).contains(&ui_scale) {
            return Err(DriverError::ScaleOutOfRange(ui_scale));
        }
        if ui_scale == 0.0 {
            self.ui_scale = self.detect_ui_scale()?;
        } else {
            self.ui_scale = ui_scale;
        }
        tracing::debug!(ui_scale = self.ui_scale, "ui scale set");
        Ok(())
    }

    fn detect_ui_scale(&self) -> Result<f32, DriverError> {
        let (Some(window), Some(renderer)) = (&self.window, &self.renderer) else {
            return Err(DriverError::NotInitialized);
        };
        let (render_w, render_h) = renderer
            .output_size()
            .map_err(DriverError::render("getting renderer output size"))?;
        let (window_w, window_h) = window.size();
        if window_w == 0 || window_h == 0 {
            tracing::warn!("window has no area, keeping ui scale {}", self.ui_scale);
            return Ok(self.ui_scale);
        }
        let scale_x = render_w as f32 / window_w as f32;
        let scale_y = render_h as f32 / window_h as f32;
        if scale_x != scale_y {
            tracing::warn!("display is scaled inconsistently ({scale_x} x {scale_y})");
        }
        Ok(scale_y)
    }

    /// Make a renderer texture drawable from GUI code.
    pub fn register_texture(&mut self, texture: TextureRef) -> TextureId {
        let id = TextureId::User(self.next_user_texture);
        self.next_user_texture += 1;
        self.textures.insert(id, texture);
        id
    }

    /// Forget a texture from [`Driver::register_texture`]. The renderer
    /// texture itself stays alive.
    pub fn unregister_texture(&mut self, id: TextureId) -> Option<TextureRef> {
        match id {
            TextureId::User(_) => self.textures.remove(&id),
            TextureId::Managed(_) => None,
        }
    }

    /// Create every resource. On failure everything acquired so far is
    /// released and the error names the step that failed.
    pub fn init(&mut self) -> Result<(), DriverError> {
        if self.state != State::Uninitialized {
            return Err(DriverError::AlreadyInitialized);
        }
        if let Err(err) = self.init_steps() {
            tracing::debug!(error = %err, "init failed, tearing down");
            if let Err(teardown) = self.destroy() {
                tracing::warn!(error = %teardown, "teardown after failed init");
            }
            return Err(err);
        }
        self.state = State::Initialized;
        tracing::info!(ui_scale = self.ui_scale, "driver initialized");
        Ok(())
    }

    fn init_steps(&mut self) -> Result<(), DriverError> {
        use InitStep as S;

        self.window_driver
            .init_platform()
            .map_err(DriverError::step(S::InitializingPlatform))?;
        self.platform_up = true;

        let window = self
            .window_driver
            .create_window()
            .map_err(DriverError::step(S::CreatingWindow))?;
        let window = self.window.insert(window);

        let renderer = self
            .window_driver
            .create_renderer(window)
            .map_err(DriverError::step(S::CreatingRenderer))?;
        self.clamp_clip_rect = self
            .clamp_override
            .unwrap_or_else(|| renderer.needs_clip_clamp());
        if self.clamp_clip_rect {
            tracing::debug!(renderer = %renderer.info().name, "clamping clip rectangles");
        }
        self.renderer = Some(renderer);

        let context = self
            .gui_driver
            .create_context()
            .map_err(DriverError::step(S::CreatingContext))?;
        self.context = Some(context);

        let atlas = self
            .gui_driver
            .create_font_atlas()
            .map_err(DriverError::step(S::CreatingFontAtlas))?;
        let atlas = self.atlas.insert(atlas);
        let font = self
            .gui_driver
            .create_font(atlas, 1.0)
            .map_err(DriverError::step(S::CreatingFont))?;
        self.font = Some(font);
        let large_font = self
            .gui_driver
            .create_font(atlas, 2.0)
            .map_err(DriverError::step(S::CreatingLargeFont))?;
        self.large_font = Some(large_font);

        let null = self.bake_font().map_err(DriverError::step(S::BakingFont))?;
        self.null = Some(null);

        let convert =
            self.gui_driver
                .create_convert_config(&VERTEX_LAYOUT, VERTEX_SIZE, VERTEX_ALIGNMENT, null);
        validate_layout(convert.layout, convert.vertex_size, convert.vertex_alignment)
            .map_err(|e| DriverError::step(S::CreatingConvertConfig)(e.into()))?;
        if let Some(context) = &self.context {
            context.options_mut(|o| o.tessellation_options = convert.tessellation);
        }
        self.convert = Some(convert);

        self.scratch = Some(Scratch::new());
        Ok(())
    }

    /// Rasterize the fonts and upload the result as the GUI's font texture.
    fn bake_font(&mut self) -> Result<NullTexture, DriverError> {
        let (Some(context), Some(atlas), Some(renderer), Some(font)) =
            (&self.context, &mut self.atlas, &mut self.renderer, &self.font)
        else {
            return Err(DriverError::NotInitialized);
        };
        let definitions = atlas
            .take_definitions()
            .ok_or_else(|| DriverError::FontBake("font atlas is already baked".into()))?;
        context.set_fonts(definitions);

        let mut raw = egui::RawInput::default();
        raw.viewports
            .entry(ViewportId::ROOT)
            .or_default()
            .native_pixels_per_point = Some(font.raster_scale);
        let output = context.run(raw, |_| {});
        apply_texture_deltas(renderer, &mut self.textures, &output.textures_delta)?;

        let Some(&texture) = self.textures.get(&TextureId::default()) else {
            return Err(DriverError::FontBake("no font image was produced".into()));
        };
        renderer
            .set_texture_blend_mode(texture, BlendMode::Blend)
            .map_err(DriverError::render("setting texture blend mode"))?;
        atlas.cleanup();
        tracing::info!(texture = texture.id(), "font atlas baked");
        Ok(NullTexture::default())
    }

    /// Start a frame: drain and translate pending input, then clear the
    /// renderer to the background color.
    ///
    /// Returns [`DriverError::Quit`] once the queue is drained if a quit was
    /// requested; no frame is open then.
    pub fn pre_render(&mut self) -> Result<(), DriverError> {
        match self.state {
            State::Initialized => {}
            State::InFrame => return Err(DriverError::MidFrame),
            State::Uninitialized | State::Destroyed => return Err(DriverError::NotInitialized),
        }
        let (Some(window), Some(renderer), Some(context)) =
            (&mut self.window, &mut self.renderer, &self.context)
        else {
            return Err(DriverError::NotInitialized);
        };
        let font = if self.ui_scale > LARGE_FONT_THRESHOLD {
            self.large_font.as_ref()
        } else {
            self.font.as_ref()
        }
        .ok_or(DriverError::NotInitialized)?;

        let mut session = InputSession::begin(1.0 / self.ui_scale)
            .with_state(self.modifiers, self.pointer)
            .with_clipboard(self.clipboard.clone());
        let mut events = std::mem::take(&mut self.events);
        window.poll_events(&mut events);
        let mut alive = true;
        let mut failed = None;
        let mut handled = 0;
        for event in &events {
            handled += 1;
            if let InputEvent::Resized { width, height } = *event {
                renderer.resize(width, height);
            }
            let outcome = self.handler.handle_event(&mut session, event);
            tracing::trace!(?event, kind = ?outcome.kind, used = outcome.used, "event");
            match &mut self.listener {
                Some(listener) => {
                    if let Err(err) = listener(event, outcome) {
                        if err.downcast_ref::<DriverError>().is_some_and(DriverError::is_quit) {
                            alive = false;
                        } else {
                            failed = Some(err);
                            break;
                        }
                    }
                }
                None if outcome.kind == EventType::Quit => alive = false,
                None => {}
            }
        }
        // Events after a listener failure wait for the next pre_render.
        events.drain(..handled);
        self.events = events;
        self.modifiers = session.modifiers();
        self.pointer = session.pointer();
        if let Some(err) = failed {
            return Err(DriverError::Listener(err));
        }
        let mut raw = session.end();
        if !alive {
            return Err(DriverError::Quit);
        }

        let (width, height) = renderer
            .output_size()
            .map_err(DriverError::render("getting renderer output size"))?;
        raw.screen_rect = Some(Rect::from_min_size(
            Pos2::ZERO,
            Vec2::new(width as f32, height as f32) / self.ui_scale,
        ));
        raw.time = Some(self.started.elapsed().as_secs_f64());
        raw.viewports
            .entry(ViewportId::ROOT)
            .or_default()
            .native_pixels_per_point = Some(font.raster_scale);
        let font_id = font.id.clone();
        context.style_mut(|style| style.override_font_id = Some(font_id));
        context.begin_pass(raw);
        self.state = State::InFrame;

        let old = renderer.draw_color();
        let cleared = renderer
            .set_draw_color(self.bg_color)
            .map_err(DriverError::render("setting renderer draw color"))
            .and_then(|()| {
                renderer
                    .clear()
                    .map_err(DriverError::render("clearing renderer"))
            });
        let restored = renderer
            .set_draw_color(old)
            .map_err(DriverError::render("restoring renderer draw color"));
        cleared.and(restored)
    }

    /// Finish a frame: convert the GUI's output to geometry, draw it and
    /// present.
    pub fn post_render(&mut self) -> Result<(), DriverError> {
        match self.state {
            State::InFrame => {}
            State::Initialized => return Err(DriverError::NoFrame),
            State::Uninitialized | State::Destroyed => return Err(DriverError::NotInitialized),
        }
        let (Some(window), Some(renderer), Some(context), Some(convert), Some(scratch)) = (
            &mut self.window,
            &mut self.renderer,
            &self.context,
            &self.convert,
            &mut self.scratch,
        ) else {
            return Err(DriverError::NotInitialized);
        };
        let output = context.end_pass();
        self.state = State::Initialized;

        window.set_cursor(output.platform_output.cursor_icon);
        for command in output.platform_output.commands {
            if let OutputCommand::CopyText(text) = command {
                if !text.is_empty() {
                    self.clipboard = Some(text);
                }
            }
        }
        apply_texture_deltas(renderer, &mut self.textures, &output.textures_delta)?;

        let primitives = context.tessellate(output.shapes, output.pixels_per_point);
        let frame = Frame {
            ui_scale: self.ui_scale,
            clamp_clip_rect: self.clamp_clip_rect,
            textures: &self.textures,
        };
        let drawn = frame.draw(renderer, scratch, convert, &primitives);

        for id in &output.textures_delta.free {
            if let Some(texture) = self.textures.remove(id) {
                renderer
                    .destroy_texture(texture)
                    .map_err(DriverError::render("freeing texture"))?;
            }
        }
        drawn
    }

    /// Release every resource. Safe on a driver in any state; the first
    /// error is returned after all releases have been attempted.
    pub fn destroy(&mut self) -> Result<(), DriverError> {
        if self.state == State::Destroyed {
            return Ok(());
        }
        let mut first: Option<DriverError> = None;
        let mut keep = |result: Result<(), DriverError>| {
            if let Err(err) = result {
                first.get_or_insert(err);
            }
        };

        let gui_owned: Vec<TextureRef> = self
            .textures
            .drain()
            .filter_map(|(id, texture)| matches!(id, TextureId::Managed(_)).then_some(texture))
            .collect();
        if let Some(renderer) = self.renderer.as_mut() {
            for texture in gui_owned {
                keep(
                    renderer
                        .destroy_texture(texture)
                        .map_err(DriverError::render("destroying texture")),
                );
            }
        }
        if let Some(renderer) = self.renderer.take() {
            keep(renderer.destroy().map_err(DriverError::render("destroying renderer")));
        }
        if let Some(window) = self.window.take() {
            keep(window.destroy());
        }

        self.context = None;
        self.atlas = None;
        self.font = None;
        self.large_font = None;
        self.null = None;
        self.convert = None;
        self.scratch = None;
        self.events = Vec::new();

        if self.platform_up {
            self.window_driver.quit_platform();
            self.platform_up = false;
        }
        self.state = State::Destroyed;
        tracing::info!("driver destroyed");
        first.map_or(Ok(()), Err)
    }
}

impl<W: WindowDriver, G: GuiDriver> Drop for Driver<W, G> {
    fn drop(&mut self) {
        if self.state != State::Destroyed {
            if let Err(err) = self.destroy() {
                tracing::warn!(error = %err, "destroying driver on drop");
            }
        }
    }
}

/// Per-frame draw settings.
struct Frame<'a> {
    ui_scale: f32,
    clamp_clip_rect: bool,
    textures: &'a HashMap<TextureId, TextureRef>,
}

impl Frame<'_> {
    /// Draw at the UI scale, restoring the renderer's scale afterwards
    /// whether or not drawing succeeded.
    fn draw<R: Renderer>(
        &self,
        renderer: &mut R,
        scratch: &mut Scratch,
        convert: &ConvertConfig,
        primitives: &[egui::ClippedPrimitive],
    ) -> Result<(), DriverError> {
        let (old_x, old_y) = renderer.scale();
        renderer
            .set_scale(self.ui_scale, self.ui_scale)
            .map_err(DriverError::render("setting renderer scale"))?;
        let drawn = self.draw_scaled(renderer, scratch, convert, primitives);
        let restored = renderer
            .set_scale(old_x, old_y)
            .map_err(DriverError::render("restoring renderer scale"));
        drawn.and(restored)
    }

    fn draw_scaled<R: Renderer>(
        &self,
        renderer: &mut R,
        scratch: &mut Scratch,
        convert: &ConvertConfig,
        primitives: &[egui::ClippedPrimitive],
    ) -> Result<(), DriverError> {
        scratch.clear();
        scratch.convert(primitives, convert)?;

        let old_clip = renderer.clip_rect();
        let viewport = renderer.viewport();
        let vertices = view_vertices(&scratch.vertices)?;
        let drawn = self.draw_commands(renderer, scratch, &vertices, viewport);
        let restored = renderer
            .set_clip_rect(old_clip)
            .map_err(DriverError::render("restoring clip rect"));
        drawn.and(restored)?;
        renderer
            .present()
            .map_err(DriverError::render("presenting frame"))
    }

    fn draw_commands<R: Renderer>(
        &self,
        renderer: &mut R,
        scratch: &Scratch,
        vertices: &[framebridge_render::Vertex],
        viewport: ClipRect,
    ) -> Result<(), DriverError> {
        let mut offset = 0;
        for command in &scratch.commands {
            if command.elem_count == 0 {
                continue;
            }
            let mut clip = clip_rect_of(command.clip_rect, viewport);
            if self.clamp_clip_rect {
                clip = clamp_clip_rect(clip, viewport);
            }
            renderer
                .set_clip_rect(Some(clip))
                .map_err(DriverError::render("setting renderer clip rectangle"))?;
            let texture = self
                .textures
                .get(&command.texture)
                .copied()
                .ok_or(DriverError::UnknownTexture(command.texture))?;
            let end = offset + command.elem_count as usize;
            renderer
                .render_geometry(Some(texture), vertices, &scratch.elements[offset..end])
                .map_err(DriverError::render("rendering geometry"))?;
            offset = end;
        }
        Ok(())
    }
}

/// Upload new and changed GUI textures. A full image whose size changed
/// replaces the old texture.
fn apply_texture_deltas<R: Renderer>(
    renderer: &mut R,
    textures: &mut HashMap<TextureId, TextureRef>,
    delta: &egui::TexturesDelta,
) -> Result<(), DriverError> {
    for (id, image_delta) in &delta.set {
        let [width, height] = image_delta.image.size();
        let (width, height) = (width as u32, height as u32);
        let pixels = rgba_bytes(&image_delta.image);
        let pitch = width as usize * 4;
        match (image_delta.pos, textures.get(id).copied()) {
            (Some([x, y]), Some(texture)) => {
                let region = ClipRect::new(x as i32, y as i32, width as i32, height as i32);
                renderer
                    .update_texture(texture, Some(region), &pixels, pitch)
                    .map_err(DriverError::render("updating texture region"))?;
            }
            (Some(_), None) => {
                tracing::warn!(?id, "partial update for a texture that was never uploaded");
            }
            (None, existing) => {
                if let Some(old) = existing {
                    renderer
                        .destroy_texture(old)
                        .map_err(DriverError::render("replacing texture"))?;
                    textures.remove(id);
                }
                let texture = renderer
                    .create_texture(width, height)
                    .map_err(DriverError::render("creating texture"))?;
                textures.insert(*id, texture);
                renderer
                    .update_texture(texture, None, &pixels, pitch)
                    .map_err(DriverError::render("uploading texture"))?;
                renderer
                    .set_texture_blend_mode(texture, BlendMode::Blend)
                    .map_err(DriverError::render("setting texture blend mode"))?;
                tracing::debug!(?id, width, height, "texture uploaded");
            }
        }
    }
    Ok(())
}

/// Premultiplied RGBA8 bytes of an egui image.
fn rgba_bytes(image: &ImageData) -> Vec<u8> {
    match image {
        ImageData::Color(image) => image.pixels.iter().flat_map(|c| c.to_array()).collect(),
        ImageData::Font(image) => image.srgba_pixels(None).flat_map(|c| c.to_array()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gui::DefaultGuiDriver;
    use crate::headless::{HeadlessFailure, HeadlessWindowDriver};
    use framebridge_input::default_bindings;
    use framebridge_render::{RecordingRenderer, RenderCall};

    type TestDriver = Driver<HeadlessWindowDriver, DefaultGuiDriver>;

    fn driver(window: HeadlessWindowDriver) -> TestDriver {
        Driver::new(
            window,
            DefaultGuiDriver::default(),
            default_bindings().clone(),
            None,
        )
    }

    fn ready() -> TestDriver {
        let mut d = driver(HeadlessWindowDriver::new(320, 240));
        d.init().unwrap();
        d
    }

    fn recorder(d: &mut TestDriver) -> &mut RecordingRenderer {
        d.renderer_mut().unwrap()
    }

    #[test]
    fn init_populates_resources() {
        let d = ready();
        assert!(d.is_initialized());
        assert!(d.window().is_some());
        assert!(d.renderer().is_some());
        assert!(d.context().is_some());
        assert_eq!(d.null_texture(), Some(NullTexture::default()));
        assert_eq!(d.renderer().unwrap().texture_count(), 1);
    }

    #[test]
    fn font_texture_is_uploaded_with_blending() {
        let mut d = ready();
        let calls = recorder(&mut d).take_calls();
        assert!(matches!(calls[0], RenderCall::CreateTexture { .. }));
        assert!(matches!(calls[1], RenderCall::UpdateTexture { region: None, .. }));
        assert!(
            calls
                .iter()
                .any(|c| matches!(c, RenderCall::SetBlendMode(_, BlendMode::Blend)))
        );
    }

    #[test]
    fn init_twice_is_refused() {
        let mut d = ready();
        assert!(matches!(d.init(), Err(DriverError::AlreadyInitialized)));
    }

    #[test]
    fn failed_init_tears_down() {
        let mut d = driver(HeadlessWindowDriver::new(10, 10).fail_at(HeadlessFailure::CreateRenderer));
        let err = d.init().unwrap_err();
        assert_eq!(err.init_step(), Some(InitStep::CreatingRenderer));
        assert!(d.window().is_none());
        assert!(!d.window_driver().platform_up());
        assert_eq!(d.window_driver().quit_calls(), 1);
        assert!(d.destroy().is_ok());
    }

    #[test]
    fn platform_failure_skips_quit_platform() {
        let mut d = driver(HeadlessWindowDriver::new(10, 10).fail_at(HeadlessFailure::InitPlatform));
        assert_eq!(d.init().unwrap_err().init_step(), Some(InitStep::InitializingPlatform));
        assert_eq!(d.window_driver().quit_calls(), 0);
    }

    #[test]
    fn frame_methods_need_init() {
        let mut d = driver(HeadlessWindowDriver::new(10, 10));
        assert!(matches!(d.pre_render(), Err(DriverError::NotInitialized)));
        assert!(matches!(d.post_render(), Err(DriverError::NotInitialized)));
    }

    #[test]
    fn post_render_without_pre_render() {
        let mut d = ready();
        assert!(matches!(d.post_render(), Err(DriverError::NoFrame)));
    }

    #[test]
    fn pre_render_twice_is_mid_frame() {
        let mut d = ready();
        d.pre_render().unwrap();
        assert!(matches!(d.pre_render(), Err(DriverError::MidFrame)));
        d.post_render().unwrap();
    }

    #[test]
    fn ui_scale_validation() {
        let mut d = driver(HeadlessWindowDriver::new(10, 10));
        for bad in [-0.1, 5.01, f32::NAN, f32::INFINITY] {
            assert!(matches!(
                d.set_ui_scale(bad),
                Err(DriverError::ScaleOutOfRange(_))
            ));
        }
        for good in [0.01, 1.0, 2.5, 5.0] {
            d.set_ui_scale(good).unwrap();
            assert_eq!(d.ui_scale(), good);
        }
        assert!(matches!(d.set_ui_scale(0.0), Err(DriverError::NotInitialized)));
    }

    #[test]
    fn ui_scale_auto_detects_pixel_ratio() {
        let mut d = driver(HeadlessWindowDriver::new(200, 100).with_pixel_ratio(2));
        d.init().unwrap();
        d.set_ui_scale(0.0).unwrap();
        assert_eq!(d.ui_scale(), 2.0);
    }

    #[test]
    fn ui_scale_refused_mid_frame() {
        let mut d = ready();
        d.pre_render().unwrap();
        assert!(matches!(d.set_ui_scale(2.0), Err(DriverError::MidFrame)));
        d.post_render().unwrap();
        d.set_ui_scale(2.0).unwrap();
    }

    #[test]
    fn pre_render_clears_with_background_and_restores_color() {
        let mut d = ready();
        let bg = Color::rgba(10, 20, 30, 255);
        d.set_bg_color(bg);
        recorder(&mut d).take_calls();
        d.pre_render().unwrap();
        let r = recorder(&mut d);
        assert_eq!(
            r.calls(),
            &[
                RenderCall::SetDrawColor(bg),
                RenderCall::Clear(bg),
                RenderCall::SetDrawColor(Color::BLACK),
            ]
        );
        assert_eq!(r.draw_color(), Color::BLACK);
    }

    #[test]
    fn clip_restored_to_none_and_scale_restored() {
        let mut d = ready();
        d.set_ui_scale(2.0).unwrap();
        d.pre_render().unwrap();
        egui::CentralPanel::default().show(d.context().unwrap(), |ui| ui.label("hello"));
        d.post_render().unwrap();
        let r = recorder(&mut d);
        assert_eq!(r.clip_rect(), None);
        assert_eq!(r.scale(), (1.0, 1.0));
        let calls = r.calls();
        assert!(calls.iter().any(|c| matches!(c, RenderCall::Geometry { .. })));
        assert!(calls.contains(&RenderCall::SetScale(2.0, 2.0)));
        assert_eq!(calls.last(), Some(&RenderCall::Present));
    }

    #[test]
    fn geometry_failure_aborts_frame_but_restores_state() {
        let mut d = ready();
        d.pre_render().unwrap();
        egui::CentralPanel::default().show(d.context().unwrap(), |ui| ui.label("hello"));
        recorder(&mut d).set_fail_geometry(true);
        let err = d.post_render().unwrap_err();
        assert!(matches!(err, DriverError::Render { op: "rendering geometry", .. }));
        let r = recorder(&mut d);
        assert_eq!(r.clip_rect(), None);
        assert_eq!(r.scale(), (1.0, 1.0));
        assert!(!r.calls().contains(&RenderCall::Present));
        assert!(!d.in_frame());
    }

    #[test]
    fn quit_event_is_reported_after_drain() {
        let mut d = ready();
        let w = d.window_mut().unwrap();
        w.push_event(InputEvent::Quit);
        w.push_event(InputEvent::PointerMoved { x: 1.0, y: 1.0 });
        assert!(d.pre_render().unwrap_err().is_quit());
        assert_eq!(d.window().unwrap().pending(), 0);
        assert!(!d.in_frame());
    }

    #[test]
    fn listener_decides_quit() {
        let mut d = Driver::new(
            HeadlessWindowDriver::new(10, 10),
            DefaultGuiDriver::default(),
            default_bindings().clone(),
            Some(Box::new(|event: &InputEvent, outcome: EventOutcome| {
                if matches!(event, InputEvent::Text(_)) {
                    assert_eq!(outcome.kind, EventType::Text);
                    return Err(DriverError::Quit.into());
                }
                Ok(())
            })),
        );
        d.init().unwrap();
        // Without a listener this would quit; the listener ignores it.
        d.window_mut().unwrap().push_event(InputEvent::Quit);
        d.pre_render().unwrap();
        d.post_render().unwrap();
        d.window_mut().unwrap().push_event(InputEvent::Text("q".into()));
        assert!(d.pre_render().unwrap_err().is_quit());
    }

    #[test]
    fn listener_error_aborts() {
        let mut d = Driver::new(
            HeadlessWindowDriver::new(10, 10),
            DefaultGuiDriver::default(),
            default_bindings().clone(),
            Some(Box::new(|_: &InputEvent, _: EventOutcome| Err("boom".into()))),
        );
        d.init().unwrap();
        d.window_mut().unwrap().push_event(InputEvent::PointerLeft);
        assert!(matches!(d.pre_render(), Err(DriverError::Listener(_))));
    }

    #[test]
    fn events_after_listener_error_are_kept() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        let mut d = Driver::new(
            HeadlessWindowDriver::new(10, 10),
            DefaultGuiDriver::default(),
            default_bindings().clone(),
            Some(Box::new(move |event: &InputEvent, _: EventOutcome| {
                log.borrow_mut().push(event.clone());
                match event {
                    InputEvent::PointerLeft => Err("boom".into()),
                    _ => Ok(()),
                }
            })),
        );
        d.init().unwrap();
        let w = d.window_mut().unwrap();
        w.push_event(InputEvent::PointerLeft);
        w.push_event(InputEvent::Text("a".into()));
        assert!(matches!(d.pre_render(), Err(DriverError::Listener(_))));
        assert_eq!(*seen.borrow(), vec![InputEvent::PointerLeft]);

        d.window_mut().unwrap().push_event(InputEvent::Text("b".into()));
        d.pre_render().unwrap();
        assert_eq!(
            *seen.borrow(),
            vec![
                InputEvent::PointerLeft,
                InputEvent::Text("a".into()),
                InputEvent::Text("b".into()),
            ]
        );
        d.post_render().unwrap();
    }

    #[test]
    fn zero_count_commands_are_skipped_without_consuming_indices() {
        let mut renderer = RecordingRenderer::new(100, 100);
        let texture = renderer.create_texture(1, 1).unwrap();
        let textures = HashMap::from([(TextureId::default(), texture)]);
        let frame = Frame {
            ui_scale: 1.0,
            clamp_clip_rect: false,
            textures: &textures,
        };
        let command = |elem_count| crate::convert::DrawCommand {
            clip_rect: Rect::EVERYTHING,
            texture: TextureId::default(),
            elem_count,
        };
        let mut scratch = Scratch::new();
        scratch.commands = vec![command(3), command(0), command(3)];
        scratch.elements = vec![0, 1, 2, 3, 4, 5];
        let vertex = framebridge_render::Vertex {
            position: [0.0, 0.0],
            color: [255; 4],
            tex_coord: [0.0, 0.0],
        };
        let vertices = vec![vertex; 6];
        let viewport = renderer.viewport();
        renderer.take_calls();

        frame
            .draw_commands(&mut renderer, &scratch, &vertices, viewport)
            .unwrap();
        let geometry: Vec<Vec<u32>> = renderer
            .calls()
            .iter()
            .filter_map(|c| match c {
                RenderCall::Geometry { indices, .. } => Some(indices.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(geometry, vec![vec![0, 1, 2], vec![3, 4, 5]]);
        assert_eq!(renderer.clip_rect(), Some(ClipRect::new(0, 0, 100, 100)));
    }

    #[test]
    fn unbounded_clip_draws_inside_the_viewport() {
        let mut d = ready();
        d.set_clamp_clip_rect(true);
        d.pre_render().unwrap();
        let ctx = d.context().unwrap().clone();
        egui::Painter::new(ctx, egui::LayerId::background(), Rect::EVERYTHING).rect_filled(
            Rect::from_min_size(Pos2::new(4.0, 4.0), Vec2::splat(8.0)),
            0.0,
            egui::Color32::RED,
        );
        d.post_render().unwrap();
        let clips: Vec<_> = recorder(&mut d)
            .calls()
            .iter()
            .filter_map(|c| match c {
                RenderCall::Geometry { clip, .. } => Some(*clip),
                _ => None,
            })
            .collect();
        assert!(!clips.is_empty());
        for clip in clips {
            let clip = clip.unwrap();
            assert!(!clip.is_empty(), "{clip:?}");
            assert!(clip.x >= 0 && clip.y >= 0, "{clip:?}");
            assert!(clip.x + clip.w <= 320 && clip.y + clip.h <= 240, "{clip:?}");
        }
    }

    #[test]
    fn resize_event_resizes_renderer() {
        let mut d = ready();
        d.window_mut().unwrap().push_event(InputEvent::Resized {
            width: 640,
            height: 480,
        });
        d.pre_render().unwrap();
        assert_eq!(d.renderer().unwrap().output_size().unwrap(), (640, 480));
        d.post_render().unwrap();
    }

    #[test]
    fn copied_text_reaches_clipboard() {
        let mut d = ready();
        d.pre_render().unwrap();
        d.context().unwrap().copy_text("copied".into());
        d.post_render().unwrap();
        assert_eq!(d.clipboard_text(), Some("copied"));
    }

    #[test]
    fn clamp_flag_follows_renderer_unless_overridden() {
        let mut d = driver(HeadlessWindowDriver::new(10, 10).with_clip_quirk(true));
        d.init().unwrap();
        assert!(d.clamp_clip_rect());

        let mut d = driver(HeadlessWindowDriver::new(10, 10).with_clip_quirk(true));
        d.set_clamp_clip_rect(false);
        d.init().unwrap();
        assert!(!d.clamp_clip_rect());
    }

    #[test]
    fn user_texture_registration() {
        let mut d = ready();
        let texture = recorder(&mut d).create_texture(2, 2).unwrap();
        let id = d.register_texture(texture);
        assert!(matches!(id, TextureId::User(0)));
        assert_eq!(d.unregister_texture(id), Some(texture));
        assert_eq!(d.unregister_texture(TextureId::default()), None);
    }

    #[test]
    fn destroy_releases_everything_once() {
        let mut d = ready();
        d.destroy().unwrap();
        assert!(d.window().is_none());
        assert!(d.renderer().is_none());
        assert!(d.context().is_none());
        assert_eq!(d.window_driver().quit_calls(), 1);
        d.destroy().unwrap();
        assert_eq!(d.window_driver().quit_calls(), 1);
        assert!(matches!(d.pre_render(), Err(DriverError::NotInitialized)));
        assert!(matches!(d.init(), Err(DriverError::AlreadyInitialized)));
    }

    #[test]
    fn destroy_without_init() {
        let mut d = driver(HeadlessWindowDriver::new(10, 10));
        assert!(d.destroy().is_ok());
        assert_eq!(d.window_driver().quit_calls(), 0);
    }
}
