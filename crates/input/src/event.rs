use egui::PointerButton;
use winit::keyboard::KeyCode;

use crate::bindings::KeyBindings;
use crate::keys::{KeyInput, KeyMods};
use crate::session::InputSession;

/// Platform input event, already reduced from the window library's own
/// event type. Positions are physical pixels of the render target.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Quit,
    PointerMoved { x: f32, y: f32 },
    PointerButton {
        button: MouseButton,
        x: f32,
        y: f32,
        pressed: bool,
    },
    PointerLeft,
    Scroll { dx: f32, dy: f32, unit: ScrollUnit },
    /// `mods` is the modifier state at the time of the event. The modifier
    /// bit of the key itself, if it is a modifier key, is removed during
    /// translation.
    Key {
        code: KeyCode,
        mods: KeyMods,
        pressed: bool,
    },
    Text(String),
    Focused(bool),
    Resized { width: u32, height: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Back,
    Forward,
    Other(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollUnit {
    Line,
    Pixel,
}

/// How an event was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Quit,
    Motion,
    Button,
    Scroll,
    Key,
    Text,
    Unhandled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventOutcome {
    pub kind: EventType,
    /// Whether the event was forwarded to the GUI.
    pub used: bool,
}

impl EventOutcome {
    const fn new(kind: EventType, used: bool) -> Self {
        Self { kind, used }
    }
}

fn pointer_button(button: MouseButton) -> Option<PointerButton> {
    match button {
        MouseButton::Left => Some(PointerButton::Primary),
        MouseButton::Right => Some(PointerButton::Secondary),
        MouseButton::Middle => Some(PointerButton::Middle),
        MouseButton::Back => Some(PointerButton::Extra1),
        MouseButton::Forward => Some(PointerButton::Extra2),
        MouseButton::Other(_) => None,
    }
}

/// Translates [`InputEvent`]s into an open [`InputSession`] through a
/// binding table.
#[derive(Debug, Clone)]
pub struct EventHandler {
    bindings: KeyBindings,
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new(crate::bindings::default_bindings().clone())
    }
}

impl EventHandler {
    pub fn new(bindings: KeyBindings) -> Self {
        Self { bindings }
    }

    pub fn bindings(&self) -> &KeyBindings {
        &self.bindings
    }

    /// Find the action bound to `input`. A shifted key with no binding of
    /// its own falls back to the unshifted one; shift still reaches the GUI
    /// as a held modifier, so shift-extended selection keeps working.
    fn lookup(&self, input: KeyInput) -> Option<crate::action::KeyAction> {
        self.bindings.get(&input).or_else(|| {
            let unshifted = input.mods.difference(KeyMods::SHIFT);
            (unshifted != input.mods)
                .then(|| self.bindings.get(&KeyInput::new(input.code, unshifted)))
                .flatten()
        })
    }

    pub fn handle_event(&self, session: &mut InputSession, event: &InputEvent) -> EventOutcome {
        match event {
            InputEvent::Quit => EventOutcome::new(EventType::Quit, false),
            InputEvent::PointerMoved { x, y } => {
                session.motion(*x, *y);
                EventOutcome::new(EventType::Motion, true)
            }
            InputEvent::PointerButton {
                button,
                x,
                y,
                pressed,
            } => {
                match pointer_button(*button) {
                    Some(b) => session.button(b, *x, *y, *pressed),
                    None => tracing::trace!(?button, "pointer button has no GUI counterpart"),
                }
                EventOutcome::new(EventType::Button, true)
            }
            InputEvent::PointerLeft => {
                session.pointer_gone();
                EventOutcome::new(EventType::Motion, true)
            }
            InputEvent::Scroll { dx, dy, unit } => {
                session.scroll(*dx, *dy, *unit);
                EventOutcome::new(EventType::Scroll, true)
            }
            InputEvent::Key {
                code,
                mods,
                pressed,
            } => {
                let mods = mods.difference(KeyMods::of_modifier_key(*code));
                session.set_modifiers(mods);
                let input = KeyInput::new(*code, mods);
                match self.lookup(input) {
                    Some(action) if !action.is_empty() => {
                        for key in action.keys() {
                            session.key(key, *pressed);
                        }
                        EventOutcome::new(EventType::Key, true)
                    }
                    _ => {
                        tracing::trace!(%input, "unbound key");
                        EventOutcome::new(EventType::Key, false)
                    }
                }
            }
            InputEvent::Text(text) => {
                session.unicode(text);
                EventOutcome::new(EventType::Text, true)
            }
            InputEvent::Focused(focused) => {
                session.focused(*focused);
                EventOutcome::new(EventType::Unhandled, false)
            }
            InputEvent::Resized { .. } => EventOutcome::new(EventType::Unhandled, false),
        }
    }
}
