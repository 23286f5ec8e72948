//! Input Translator: platform input events mapped onto egui's input protocol.
//!
//! # Invariants
//! - Translation is a pure function of the event, the binding table and the
//!   open [`InputSession`].
//! - Binding tables never contain modifier aliases; `Ctrl` is stored as
//!   `LCtrl` and `RCtrl`.

pub mod action;
pub mod bindings;
pub mod event;
pub mod keys;
pub mod session;

pub use action::{KeyAction, UiKey};
pub use bindings::{BindingError, KeyBindings, default_binding_table, default_bindings};
pub use event::{EventHandler, EventOutcome, EventType, InputEvent, MouseButton, ScrollUnit};
pub use keys::{KeyInput, KeyMods};
pub use session::InputSession;
pub use winit::keyboard::KeyCode;
