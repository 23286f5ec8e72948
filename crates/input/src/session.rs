use egui::{Event, Key, Modifiers, MouseWheelUnit, PointerButton, Pos2, RawInput, Vec2};

use crate::action::UiKey;
use crate::event::ScrollUnit;
use crate::keys::KeyMods;

/// One frame's worth of GUI input.
///
/// Opened at frame start and closed with [`InputSession::end`], which hands
/// the accumulated [`RawInput`] to the GUI context. Pointer coordinates are
/// given in physical pixels and stored in points.
#[derive(Debug)]
pub struct InputSession {
    raw: RawInput,
    points_per_pixel: f32,
    modifiers: Modifiers,
    pointer: Pos2,
    clipboard: Option<String>,
}

impl InputSession {
    pub fn begin(points_per_pixel: f32) -> Self {
        Self {
            raw: RawInput::default(),
            points_per_pixel,
            modifiers: Modifiers::NONE,
            pointer: Pos2::ZERO,
            clipboard: None,
        }
    }

    /// Seed the session with the current state carried over between frames.
    pub fn with_state(mut self, modifiers: Modifiers, pointer: Pos2) -> Self {
        self.modifiers = modifiers;
        self.pointer = pointer;
        self
    }

    /// Text pasted when a `Paste` key arrives this frame.
    pub fn with_clipboard(mut self, text: Option<String>) -> Self {
        self.clipboard = text;
        self
    }

    pub fn events(&self) -> &[Event] {
        &self.raw.events
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    pub fn pointer(&self) -> Pos2 {
        self.pointer
    }

    fn to_points(&self, x: f32, y: f32) -> Pos2 {
        Pos2::new(x * self.points_per_pixel, y * self.points_per_pixel)
    }

    pub fn motion(&mut self, x: f32, y: f32) {
        self.pointer = self.to_points(x, y);
        self.raw.events.push(Event::PointerMoved(self.pointer));
    }

    pub fn button(&mut self, button: PointerButton, x: f32, y: f32, down: bool) {
        self.pointer = self.to_points(x, y);
        self.raw.events.push(Event::PointerButton {
            pos: self.pointer,
            button,
            pressed: down,
            modifiers: self.modifiers,
        });
    }

    pub fn pointer_gone(&mut self) {
        self.raw.events.push(Event::PointerGone);
    }

    pub fn scroll(&mut self, dx: f32, dy: f32, unit: ScrollUnit) {
        let (unit, delta) = match unit {
            ScrollUnit::Line => (MouseWheelUnit::Line, Vec2::new(dx, dy)),
            ScrollUnit::Pixel => (
                MouseWheelUnit::Point,
                Vec2::new(dx, dy) * self.points_per_pixel,
            ),
        };
        self.raw.events.push(Event::MouseWheel {
            unit,
            delta,
            modifiers: self.modifiers,
        });
    }

    /// Replace the held-modifier state with `mods`.
    pub fn set_modifiers(&mut self, mods: KeyMods) {
        self.modifiers = mods.to_egui();
    }

    /// Press or release an abstract key.
    pub fn key(&mut self, key: UiKey, down: bool) {
        use UiKey as U;

        let (key, extra) = match key {
            U::Shift => {
                self.modifiers.shift = down;
                return;
            }
            U::Ctrl => {
                self.modifiers.ctrl = down;
                if !cfg!(target_os = "macos") {
                    self.modifiers.command = down;
                }
                return;
            }
            U::Copy | U::Cut | U::Paste => {
                if down {
                    self.clipboard_event(key);
                }
                return;
            }
            U::Delete => (Key::Delete, Modifiers::NONE),
            U::Enter => (Key::Enter, Modifiers::NONE),
            U::Tab => (Key::Tab, Modifiers::NONE),
            U::Backspace => (Key::Backspace, Modifiers::NONE),
            U::Up => (Key::ArrowUp, Modifiers::NONE),
            U::Down => (Key::ArrowDown, Modifiers::NONE),
            U::Left => (Key::ArrowLeft, Modifiers::NONE),
            U::Right => (Key::ArrowRight, Modifiers::NONE),
            U::TextInsertMode | U::TextReplaceMode => (Key::Insert, Modifiers::NONE),
            U::TextResetMode => (Key::Escape, Modifiers::NONE),
            U::TextLineStart | U::ScrollStart => (Key::Home, Modifiers::NONE),
            U::TextLineEnd | U::ScrollEnd => (Key::End, Modifiers::NONE),
            U::TextStart => (Key::Home, Modifiers::COMMAND),
            U::TextEnd => (Key::End, Modifiers::COMMAND),
            U::TextUndo => (Key::Z, Modifiers::COMMAND),
            U::TextRedo => (Key::Z, Modifiers::COMMAND | Modifiers::SHIFT),
            U::TextSelectAll => (Key::A, Modifiers::COMMAND),
            U::TextWordLeft => (Key::ArrowLeft, Modifiers::ALT),
            U::TextWordRight => (Key::ArrowRight, Modifiers::ALT),
            U::ScrollUp => (Key::PageUp, Modifiers::NONE),
            U::ScrollDown => (Key::PageDown, Modifiers::NONE),
        };
        self.raw.events.push(Event::Key {
            key,
            physical_key: None,
            pressed: down,
            repeat: false,
            modifiers: self.modifiers | extra,
        });
    }

    fn clipboard_event(&mut self, key: UiKey) {
        let event = match key {
            UiKey::Copy => Event::Copy,
            UiKey::Cut => Event::Cut,
            _ => match &self.clipboard {
                Some(text) if !text.is_empty() => Event::Paste(text.clone()),
                _ => return,
            },
        };
        self.raw.events.push(event);
    }

    /// Committed text. Control characters are dropped; the GUI receives
    /// those through [`InputSession::key`].
    pub fn unicode(&mut self, text: &str) {
        let text: String = text.chars().filter(|c| !c.is_control()).collect();
        if !text.is_empty() {
            self.raw.events.push(Event::Text(text));
        }
    }

    pub fn focused(&mut self, focused: bool) {
        self.raw.focused = focused;
        self.raw.events.push(Event::WindowFocused(focused));
    }

    /// Close the session, yielding the input for this frame.
    pub fn end(mut self) -> RawInput {
        self.raw.modifiers = self.modifiers;
        self.raw
    }
}
