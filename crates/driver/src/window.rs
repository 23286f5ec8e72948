//! Window/renderer resource driver.

use framebridge_input::InputEvent;
use framebridge_render::Renderer;

use crate::error::DriverError;

/// A live window as the frame driver sees it.
pub trait Window {
    /// Size in logical units. Divided into the renderer's output size this
    /// gives the display scale.
    fn size(&self) -> (u32, u32);

    /// Append every currently queued event to `out` without blocking.
    fn poll_events(&mut self, out: &mut Vec<InputEvent>);

    fn set_cursor(&mut self, cursor: egui::CursorIcon);

    fn destroy(self) -> Result<(), DriverError>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// Creates the platform resources: platform state, window, renderer.
///
/// Implement this to substitute a different window or renderer, or wrap
/// [`crate::DefaultWindowDriver`] to change one step only.
pub trait WindowDriver {
    type Window: Window;
    type Renderer: Renderer;

    fn init_platform(&mut self) -> Result<(), DriverError>;

    fn create_window(&mut self) -> Result<Self::Window, DriverError>;

    fn create_renderer(&mut self, window: &mut Self::Window)
    -> Result<Self::Renderer, DriverError>;

    /// Release platform-global state. Called last during teardown, and only
    /// after a successful [`WindowDriver::init_platform`].
    fn quit_platform(&mut self) {}
}

/// Options applied when the platform is initialized.
#[derive(Debug, Clone)]
pub struct InitOpts {
    pub backends: wgpu::Backends,
    pub flags: wgpu::InstanceFlags,
    pub power_preference: wgpu::PowerPreference,
}

impl Default for InitOpts {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::all(),
            flags: wgpu::InstanceFlags::default(),
            power_preference: wgpu::PowerPreference::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WindowOpts {
    pub title: String,
    /// Outer position in physical pixels; `None` lets the platform decide.
    pub position: Option<(i32, i32)>,
    /// Inner size in logical units.
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
    pub decorations: bool,
    pub maximized: bool,
    pub visible: bool,
}

impl Default for WindowOpts {
    fn default() -> Self {
        Self {
            title: "framebridge".into(),
            position: None,
            width: 800,
            height: 600,
            resizable: true,
            decorations: true,
            maximized: false,
            visible: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderOpts {
    /// Preferred render drivers, most preferred first. Each entry matches
    /// an adapter's backend name (`vulkan`, `metal`, `dx12`, `gl`) or its
    /// device name. Empty means the platform chooses.
    pub drivers: Vec<String>,
    pub vsync: bool,
}

impl Default for RenderOpts {
    fn default() -> Self {
        Self {
            drivers: Vec::new(),
            vsync: true,
        }
    }
}

/// Name pair identifying an available render driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverName {
    pub backend: String,
    pub device: String,
}

impl DriverName {
    fn matches(&self, wanted: &str) -> bool {
        self.backend.eq_ignore_ascii_case(wanted) || self.device == wanted
    }
}

/// Index into `available` of the first match for the most preferred name.
pub fn pick_preferred(
    wanted: &[String],
    available: &[DriverName],
) -> Result<usize, DriverError> {
    wanted
        .iter()
        .find_map(|name| available.iter().position(|d| d.matches(name)))
        .ok_or_else(|| DriverError::NoPreferredDriver {
            wanted: wanted.to_vec(),
            available: available
                .iter()
                .map(|d| format!("{} ({})", d.backend, d.device))
                .collect(),
        })
}
