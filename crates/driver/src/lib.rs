//! Frame Driver: egui bound to a window and a [`Renderer`](framebridge_render::Renderer).
//!
//! # Invariants
//! - Every frame is exactly one [`Driver::pre_render`] followed by one
//!   [`Driver::post_render`]; the GUI is built in between.
//! - Renderer scale, clip rectangle and draw color are restored after each
//!   frame, including frames that fail.
//! - [`Driver::destroy`] is safe from any state and releases resources in
//!   reverse creation order.
//!
//! [`DefaultWindowDriver`] opens a winit window with a wgpu renderer;
//! [`HeadlessWindowDriver`] scripts input and records draw calls.

pub mod convert;
pub mod driver;
pub mod error;
pub mod gui;
pub mod headless;
pub mod window;

#[cfg(not(any(target_arch = "wasm32", target_os = "ios", target_os = "android")))]
pub mod desktop;

pub use convert::{DrawCommand, Scratch, clamp_clip_rect, clip_rect_of};
#[cfg(not(any(target_arch = "wasm32", target_os = "ios", target_os = "android")))]
pub use desktop::{DefaultWindowDriver, WinitWindow};
pub use driver::{Driver, EventListener, MAX_UI_SCALE};
pub use error::{DriverError, InitStep, ListenerError};
pub use gui::{
    ConvertConfig, ConvertOpts, DefaultGuiDriver, Font, FontAtlas, FontOpts, GuiDriver,
    NullTexture,
};
pub use headless::{HeadlessFailure, HeadlessWindowDriver, ScriptedWindow};
pub use window::{
    DriverName, InitOpts, RenderOpts, Window, WindowDriver, WindowOpts, pick_preferred,
};
