//! Window driver without a display: a scripted event queue and a
//! [`RecordingRenderer`].

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use framebridge_input::InputEvent;
use framebridge_render::RecordingRenderer;

use crate::error::DriverError;
use crate::window::{Window, WindowDriver};

/// Which creation step a [`HeadlessWindowDriver`] should fail at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadlessFailure {
    InitPlatform,
    CreateWindow,
    CreateRenderer,
    /// Every texture upload on the created renderer fails.
    UploadTexture,
}

#[derive(Debug, Clone)]
pub struct HeadlessWindowDriver {
    width: u32,
    height: u32,
    pixel_ratio: u32,
    clip_quirk: bool,
    fail_at: Option<HeadlessFailure>,
    platform_up: bool,
    quit_calls: usize,
    live_textures: Arc<AtomicUsize>,
}

impl HeadlessWindowDriver {
    /// A driver whose windows are `width` x `height` logical units.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixel_ratio: 1,
            clip_quirk: false,
            fail_at: None,
            platform_up: false,
            quit_calls: 0,
            live_textures: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Physical pixels per logical unit of the created renderer.
    pub fn with_pixel_ratio(mut self, ratio: u32) -> Self {
        self.pixel_ratio = ratio.max(1);
        self
    }

    /// Give created renderers the clip-rectangle quirk.
    pub fn with_clip_quirk(mut self, quirk: bool) -> Self {
        self.clip_quirk = quirk;
        self
    }

    pub fn fail_at(mut self, step: HeadlessFailure) -> Self {
        self.fail_at = Some(step);
        self
    }

    pub fn platform_up(&self) -> bool {
        self.platform_up
    }

    /// Textures created on this driver's renderers and not yet destroyed
    /// through [`Renderer::destroy_texture`](framebridge_render::Renderer::destroy_texture).
    pub fn live_textures(&self) -> usize {
        self.live_textures.load(Ordering::Relaxed)
    }

    /// How many times [`WindowDriver::quit_platform`] ran.
    pub fn quit_calls(&self) -> usize {
        self.quit_calls
    }

    fn check(&self, step: HeadlessFailure) -> Result<(), DriverError> {
        if self.fail_at != Some(step) {
            return Ok(());
        }
        let reason = format!("scripted failure at {step:?}");
        Err(match step {
            HeadlessFailure::InitPlatform => DriverError::Platform(reason),
            HeadlessFailure::CreateWindow => DriverError::Window(reason),
            HeadlessFailure::CreateRenderer | HeadlessFailure::UploadTexture => {
                DriverError::Render {
                    op: "creating renderer",
                    source: framebridge_render::RenderError::Backend(reason),
                }
            }
        })
    }
}

impl WindowDriver for HeadlessWindowDriver {
    type Window = ScriptedWindow;
    type Renderer = RecordingRenderer;

    fn init_platform(&mut self) -> Result<(), DriverError> {
        self.check(HeadlessFailure::InitPlatform)?;
        self.platform_up = true;
        Ok(())
    }

    fn create_window(&mut self) -> Result<ScriptedWindow, DriverError> {
        self.check(HeadlessFailure::CreateWindow)?;
        Ok(ScriptedWindow::new(self.width, self.height).with_pixel_ratio(self.pixel_ratio))
    }

    fn create_renderer(
        &mut self,
        window: &mut ScriptedWindow,
    ) -> Result<RecordingRenderer, DriverError> {
        self.check(HeadlessFailure::CreateRenderer)?;
        let (width, height) = window.physical_size();
        let mut renderer = RecordingRenderer::new(width, height)
            .with_clip_quirk(self.clip_quirk)
            .with_live_texture_counter(self.live_textures.clone());
        renderer.set_fail_texture_updates(self.fail_at == Some(HeadlessFailure::UploadTexture));
        Ok(renderer)
    }

    fn quit_platform(&mut self) {
        self.platform_up = false;
        self.quit_calls += 1;
    }
}

/// Window whose event queue the caller fills.
#[derive(Debug, Clone)]
pub struct ScriptedWindow {
    width: u32,
    height: u32,
    pixel_ratio: u32,
    queue: VecDeque<InputEvent>,
    cursor: egui::CursorIcon,
}

impl ScriptedWindow {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixel_ratio: 1,
            queue: VecDeque::new(),
            cursor: egui::CursorIcon::Default,
        }
    }

    pub fn with_pixel_ratio(mut self, ratio: u32) -> Self {
        self.pixel_ratio = ratio.max(1);
        self
    }

    pub fn physical_size(&self) -> (u32, u32) {
        (self.width * self.pixel_ratio, self.height * self.pixel_ratio)
    }

    /// Queue an event for the next poll. `Resized` carries the physical
    /// size and resizes the window with it.
    pub fn push_event(&mut self, event: InputEvent) {
        if let InputEvent::Resized { width, height } = event {
            self.width = width / self.pixel_ratio;
            self.height = height / self.pixel_ratio;
        }
        self.queue.push_back(event);
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn cursor(&self) -> egui::CursorIcon {
        self.cursor
    }
}

impl Window for ScriptedWindow {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn poll_events(&mut self, out: &mut Vec<InputEvent>) {
        out.extend(self.queue.drain(..));
    }

    fn set_cursor(&mut self, cursor: egui::CursorIcon) {
        self.cursor = cursor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use framebridge_render::Renderer;

    #[test]
    fn poll_drains_queue() {
        let mut w = ScriptedWindow::new(10, 10);
        w.push_event(InputEvent::Quit);
        w.push_event(InputEvent::PointerLeft);
        let mut out = Vec::new();
        w.poll_events(&mut out);
        assert_eq!(out, vec![InputEvent::Quit, InputEvent::PointerLeft]);
        assert_eq!(w.pending(), 0);
        w.poll_events(&mut out);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn renderer_uses_pixel_ratio() {
        let mut d = HeadlessWindowDriver::new(400, 300).with_pixel_ratio(2);
        d.init_platform().unwrap();
        let mut w = d.create_window().unwrap();
        let r = d.create_renderer(&mut w).unwrap();
        assert_eq!(r.output_size().unwrap(), (800, 600));
        assert_eq!(w.size(), (400, 300));
    }

    #[test]
    fn resize_event_updates_logical_size() {
        let mut w = ScriptedWindow::new(400, 300).with_pixel_ratio(2);
        w.push_event(InputEvent::Resized {
            width: 1000,
            height: 500,
        });
        assert_eq!(w.size(), (500, 250));
        assert_eq!(w.physical_size(), (1000, 500));
    }

    #[test]
    fn scripted_failures() {
        let mut d = HeadlessWindowDriver::new(1, 1).fail_at(HeadlessFailure::CreateWindow);
        d.init_platform().unwrap();
        assert!(matches!(d.create_window(), Err(DriverError::Window(_))));
    }

    #[test]
    fn upload_failure_is_set_on_the_renderer() {
        let mut d = HeadlessWindowDriver::new(4, 4).fail_at(HeadlessFailure::UploadTexture);
        d.init_platform().unwrap();
        let mut w = d.create_window().unwrap();
        let mut r = d.create_renderer(&mut w).unwrap();
        let t = r.create_texture(1, 1).unwrap();
        assert!(r.update_texture(t, None, &[0; 4], 4).is_err());
        assert_eq!(d.live_textures(), 1);
        r.destroy_texture(t).unwrap();
        assert_eq!(d.live_textures(), 0);
    }

    #[test]
    fn quit_platform_is_counted() {
        let mut d = HeadlessWindowDriver::new(1, 1);
        d.init_platform().unwrap();
        assert!(d.platform_up());
        d.quit_platform();
        assert!(!d.platform_up());
        assert_eq!(d.quit_calls(), 1);
    }
}
