//! Default window driver: winit window, wgpu renderer.
//!
//! winit owns its event loop, so the loop is pumped with a zero timeout on
//! every [`Window::poll_events`] instead of being run. That keeps the frame
//! loop in the caller's hands.

use std::sync::Arc;
use std::time::Duration;

use framebridge_input::{InputEvent, KeyMods, MouseButton, ScrollUnit};
use framebridge_render::RenderError;
use framebridge_render_wgpu::WgpuRenderer;
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalPosition};
use winit::error::OsError;
use winit::event::{ElementState, Ime, KeyEvent, Modifiers, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{ModifiersKeyState, PhysicalKey};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{CursorIcon, WindowAttributes, WindowId};

use crate::error::DriverError;
use crate::window::{
    DriverName, InitOpts, RenderOpts, Window, WindowDriver, WindowOpts, pick_preferred,
};

/// Pumps allowed for the platform to deliver the first resume.
const CREATE_ATTEMPTS: usize = 16;
const CREATE_PUMP_TIMEOUT: Duration = Duration::from_millis(10);

/// [`WindowDriver`] creating a winit window and a [`WgpuRenderer`] on it.
#[derive(Default)]
pub struct DefaultWindowDriver {
    pub init: InitOpts,
    pub window: WindowOpts,
    pub render: RenderOpts,
    event_loop: Option<EventLoop<()>>,
    instance: Option<wgpu::Instance>,
}

impl DefaultWindowDriver {
    pub fn new(init: InitOpts, window: WindowOpts, render: RenderOpts) -> Self {
        Self {
            init,
            window,
            render,
            event_loop: None,
            instance: None,
        }
    }

    fn attributes(&self) -> WindowAttributes {
        let opts = &self.window;
        let mut attrs = winit::window::Window::default_attributes()
            .with_title(opts.title.clone())
            .with_inner_size(LogicalSize::new(opts.width, opts.height))
            .with_resizable(opts.resizable)
            .with_decorations(opts.decorations)
            .with_maximized(opts.maximized)
            .with_visible(opts.visible);
        if let Some((x, y)) = opts.position {
            attrs = attrs.with_position(PhysicalPosition::new(x, y));
        }
        attrs
    }

    fn select_adapter(
        &self,
        instance: &wgpu::Instance,
        surface: &wgpu::Surface<'_>,
    ) -> Result<wgpu::Adapter, DriverError> {
        if self.render.drivers.is_empty() {
            return pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: self.init.power_preference,
                compatible_surface: Some(surface),
                force_fallback_adapter: false,
            }))
            .ok_or_else(|| DriverError::Render {
                op: "requesting adapter",
                source: RenderError::Backend("no adapter compatible with the window".into()),
            });
        }

        let mut adapters: Vec<wgpu::Adapter> = instance
            .enumerate_adapters(self.init.backends)
            .into_iter()
            .filter(|a| a.is_surface_supported(surface))
            .collect();
        let names: Vec<DriverName> = adapters
            .iter()
            .map(|a| {
                let info = a.get_info();
                DriverName {
                    backend: info.backend.to_str().to_owned(),
                    device: info.name,
                }
            })
            .collect();
        let index = pick_preferred(&self.render.drivers, &names)?;
        Ok(adapters.swap_remove(index))
    }
}

impl WindowDriver for DefaultWindowDriver {
    type Window = WinitWindow;
    type Renderer = WgpuRenderer;

    fn init_platform(&mut self) -> Result<(), DriverError> {
        let event_loop = EventLoop::new().map_err(|e| DriverError::Platform(e.to_string()))?;
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: self.init.backends,
            flags: self.init.flags,
            ..Default::default()
        });
        self.event_loop = Some(event_loop);
        self.instance = Some(instance);
        tracing::debug!(backends = ?self.init.backends, "platform initialized");
        Ok(())
    }

    fn create_window(&mut self) -> Result<WinitWindow, DriverError> {
        let mut event_loop = self
            .event_loop
            .take()
            .ok_or_else(|| DriverError::Platform("platform not initialized".into()))?;
        let mut state = EventState::creating(self.attributes());
        for _ in 0..CREATE_ATTEMPTS {
            if let PumpStatus::Exit(code) =
                event_loop.pump_app_events(Some(CREATE_PUMP_TIMEOUT), &mut state)
            {
                return Err(DriverError::Window(format!(
                    "event loop exited with code {code} before the window was created"
                )));
            }
            if state.created.is_some() {
                break;
            }
        }
        let window = match state.created.take() {
            Some(Ok(window)) => Arc::new(window),
            Some(Err(e)) => return Err(DriverError::Window(e.to_string())),
            None => return Err(DriverError::Window("platform never resumed".into())),
        };
        tracing::debug!(title = %self.window.title, "window created");
        Ok(WinitWindow {
            event_loop,
            window,
            state,
            cursor: None,
        })
    }

    fn create_renderer(&mut self, window: &mut WinitWindow) -> Result<WgpuRenderer, DriverError> {
        let instance = self
            .instance
            .as_ref()
            .ok_or_else(|| DriverError::Platform("platform not initialized".into()))?;
        let surface = instance
            .create_surface(window.window.clone())
            .map_err(|e| DriverError::Render {
                op: "creating surface",
                source: RenderError::Surface(e.to_string()),
            })?;
        let adapter = self.select_adapter(instance, &surface)?;
        let info = adapter.get_info();
        tracing::info!(
            backend = info.backend.to_str(),
            device = %info.name,
            "render driver selected"
        );
        let size = window.window.inner_size();
        WgpuRenderer::new(surface, &adapter, size.width, size.height, self.render.vsync)
            .map_err(DriverError::render("creating renderer"))
    }

    fn quit_platform(&mut self) {
        self.instance = None;
        self.event_loop = None;
    }
}

/// A winit window together with the event loop feeding it.
pub struct WinitWindow {
    event_loop: EventLoop<()>,
    window: Arc<winit::window::Window>,
    state: EventState,
    cursor: Option<egui::CursorIcon>,
}

impl WinitWindow {
    pub fn winit(&self) -> &winit::window::Window {
        &self.window
    }
}

impl Window for WinitWindow {
    fn size(&self) -> (u32, u32) {
        let size = self
            .window
            .inner_size()
            .to_logical::<u32>(self.window.scale_factor());
        (size.width, size.height)
    }

    fn poll_events(&mut self, out: &mut Vec<InputEvent>) {
        let status = self
            .event_loop
            .pump_app_events(Some(Duration::ZERO), &mut self.state);
        if let PumpStatus::Exit(code) = status {
            if !self.state.exited {
                tracing::debug!(code, "event loop exited");
                self.state.exited = true;
                self.state.events.push(InputEvent::Quit);
            }
        }
        out.append(&mut self.state.events);
    }

    fn set_cursor(&mut self, cursor: egui::CursorIcon) {
        if self.cursor == Some(cursor) {
            return;
        }
        self.cursor = Some(cursor);
        match to_winit_cursor(cursor) {
            Some(icon) => {
                self.window.set_cursor_visible(true);
                self.window.set_cursor(icon);
            }
            None => self.window.set_cursor_visible(false),
        }
    }
}

/// Application handler the event loop is pumped with.
struct EventState {
    pending: Option<WindowAttributes>,
    created: Option<Result<winit::window::Window, OsError>>,
    window_id: Option<WindowId>,
    events: Vec<InputEvent>,
    mods: KeyMods,
    cursor: (f32, f32),
    exited: bool,
}

impl EventState {
    fn creating(attrs: WindowAttributes) -> Self {
        Self {
            pending: Some(attrs),
            created: None,
            window_id: None,
            events: Vec::new(),
            mods: KeyMods::empty(),
            cursor: (0.0, 0.0),
            exited: false,
        }
    }

    fn create_pending(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(attrs) = self.pending.take() {
            let created = event_loop.create_window(attrs);
            if let Ok(window) = &created {
                self.window_id = Some(window.id());
            }
            self.created = Some(created);
        }
    }

    fn translate(&mut self, event: WindowEvent) {
        let translated = match event {
            WindowEvent::CloseRequested => InputEvent::Quit,
            WindowEvent::Resized(size) => InputEvent::Resized {
                width: size.width,
                height: size.height,
            },
            WindowEvent::Focused(focused) => InputEvent::Focused(focused),
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = (position.x as f32, position.y as f32);
                InputEvent::PointerMoved {
                    x: self.cursor.0,
                    y: self.cursor.1,
                }
            }
            WindowEvent::CursorLeft { .. } => InputEvent::PointerLeft,
            WindowEvent::MouseInput { state, button, .. } => InputEvent::PointerButton {
                button: mouse_button(button),
                x: self.cursor.0,
                y: self.cursor.1,
                pressed: state == ElementState::Pressed,
            },
            WindowEvent::MouseWheel { delta, .. } => match delta {
                MouseScrollDelta::LineDelta(dx, dy) => InputEvent::Scroll {
                    dx,
                    dy,
                    unit: ScrollUnit::Line,
                },
                MouseScrollDelta::PixelDelta(p) => InputEvent::Scroll {
                    dx: p.x as f32,
                    dy: p.y as f32,
                    unit: ScrollUnit::Pixel,
                },
            },
            WindowEvent::ModifiersChanged(modifiers) => {
                self.mods = key_mods(&modifiers);
                return;
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key,
                        state,
                        text,
                        ..
                    },
                ..
            } => {
                let pressed = state == ElementState::Pressed;
                if let PhysicalKey::Code(code) = physical_key {
                    self.events.push(InputEvent::Key {
                        code,
                        mods: self.mods,
                        pressed,
                    });
                }
                match text {
                    Some(text) if pressed => InputEvent::Text(text.to_string()),
                    _ => return,
                }
            }
            WindowEvent::Ime(Ime::Commit(text)) => InputEvent::Text(text),
            _ => return,
        };
        tracing::trace!(event = ?translated, "window event");
        self.events.push(translated);
    }
}

impl ApplicationHandler for EventState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        self.create_pending(event_loop);
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        self.create_pending(event_loop);
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, id: WindowId, event: WindowEvent) {
        if self.window_id.is_some_and(|ours| ours != id) {
            return;
        }
        self.translate(event);
    }
}

fn mouse_button(button: winit::event::MouseButton) -> MouseButton {
    use winit::event::MouseButton as W;
    match button {
        W::Left => MouseButton::Left,
        W::Right => MouseButton::Right,
        W::Middle => MouseButton::Middle,
        W::Back => MouseButton::Back,
        W::Forward => MouseButton::Forward,
        W::Other(n) => MouseButton::Other(n),
    }
}

/// Sided bits for one modifier family. Platforms that cannot tell the
/// sides apart report the left key.
fn sided(
    held: bool,
    left_state: ModifiersKeyState,
    right_state: ModifiersKeyState,
    left: KeyMods,
    right: KeyMods,
) -> KeyMods {
    let mut bits = KeyMods::empty();
    if left_state == ModifiersKeyState::Pressed {
        bits |= left;
    }
    if right_state == ModifiersKeyState::Pressed {
        bits |= right;
    }
    if held && bits.is_empty() {
        bits = left;
    }
    bits
}

fn key_mods(modifiers: &Modifiers) -> KeyMods {
    let state = modifiers.state();
    sided(
        state.shift_key(),
        modifiers.lshift_state(),
        modifiers.rshift_state(),
        KeyMods::LSHIFT,
        KeyMods::RSHIFT,
    ) | sided(
        state.control_key(),
        modifiers.lcontrol_state(),
        modifiers.rcontrol_state(),
        KeyMods::LCTRL,
        KeyMods::RCTRL,
    ) | sided(
        state.alt_key(),
        modifiers.lalt_state(),
        modifiers.ralt_state(),
        KeyMods::LALT,
        KeyMods::RALT,
    ) | sided(
        state.super_key(),
        modifiers.lsuper_state(),
        modifiers.rsuper_state(),
        KeyMods::LGUI,
        KeyMods::RGUI,
    )
}

/// `None` hides the cursor.
fn to_winit_cursor(cursor: egui::CursorIcon) -> Option<CursorIcon> {
    use egui::CursorIcon as E;
    Some(match cursor {
        E::None => return None,
        E::Default => CursorIcon::Default,
        E::ContextMenu => CursorIcon::ContextMenu,
        E::Help => CursorIcon::Help,
        E::PointingHand => CursorIcon::Pointer,
        E::Progress => CursorIcon::Progress,
        E::Wait => CursorIcon::Wait,
        E::Cell => CursorIcon::Cell,
        E::Crosshair => CursorIcon::Crosshair,
        E::Text => CursorIcon::Text,
        E::VerticalText => CursorIcon::VerticalText,
        E::Alias => CursorIcon::Alias,
        E::Copy => CursorIcon::Copy,
        E::Move => CursorIcon::Move,
        E::NoDrop => CursorIcon::NoDrop,
        E::NotAllowed => CursorIcon::NotAllowed,
        E::Grab => CursorIcon::Grab,
        E::Grabbing => CursorIcon::Grabbing,
        E::AllScroll => CursorIcon::AllScroll,
        E::ResizeHorizontal => CursorIcon::EwResize,
        E::ResizeNeSw => CursorIcon::NeswResize,
        E::ResizeNwSe => CursorIcon::NwseResize,
        E::ResizeVertical => CursorIcon::NsResize,
        E::ResizeEast => CursorIcon::EResize,
        E::ResizeSouthEast => CursorIcon::SeResize,
        E::ResizeSouth => CursorIcon::SResize,
        E::ResizeSouthWest => CursorIcon::SwResize,
        E::ResizeWest => CursorIcon::WResize,
        E::ResizeNorthWest => CursorIcon::NwResize,
        E::ResizeNorth => CursorIcon::NResize,
        E::ResizeNorthEast => CursorIcon::NeResize,
        E::ResizeColumn => CursorIcon::ColResize,
        E::ResizeRow => CursorIcon::RowResize,
        E::ZoomIn => CursorIcon::ZoomIn,
        E::ZoomOut => CursorIcon::ZoomOut,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::keyboard::ModifiersState;

    #[test]
    fn unsided_modifiers_report_left() {
        let mods = key_mods(&Modifiers::from(
            ModifiersState::SHIFT | ModifiersState::CONTROL,
        ));
        assert_eq!(mods, KeyMods::LSHIFT | KeyMods::LCTRL);
    }

    #[test]
    fn no_modifiers_held() {
        assert!(key_mods(&Modifiers::default()).is_empty());
    }

    #[test]
    fn sided_state_is_kept() {
        let bits = sided(
            true,
            ModifiersKeyState::Unknown,
            ModifiersKeyState::Pressed,
            KeyMods::LALT,
            KeyMods::RALT,
        );
        assert_eq!(bits, KeyMods::RALT);
    }

    #[test]
    fn cursor_mapping() {
        assert_eq!(to_winit_cursor(egui::CursorIcon::None), None);
        assert_eq!(
            to_winit_cursor(egui::CursorIcon::PointingHand),
            Some(CursorIcon::Pointer)
        );
        assert_eq!(
            to_winit_cursor(egui::CursorIcon::ResizeHorizontal),
            Some(CursorIcon::EwResize)
        );
    }

    #[test]
    fn buttons_map_one_to_one() {
        assert_eq!(
            mouse_button(winit::event::MouseButton::Back),
            MouseButton::Back
        );
        assert_eq!(
            mouse_button(winit::event::MouseButton::Other(7)),
            MouseButton::Other(7)
        );
    }

    #[test]
    fn close_request_becomes_quit() {
        let mut state = EventState::creating(winit::window::Window::default_attributes());
        state.translate(WindowEvent::CloseRequested);
        state.translate(WindowEvent::Focused(true));
        assert_eq!(state.events, vec![InputEvent::Quit, InputEvent::Focused(true)]);
    }
}
