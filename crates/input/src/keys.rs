use std::fmt;
use winit::keyboard::KeyCode;

bitflags::bitflags! {
    /// Modifier mask distinguishing left and right keys.
    ///
    /// `SHIFT`, `CTRL`, `ALT` and `GUI` are aliases meaning "either side";
    /// binding tables expand them into the explicit variants.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct KeyMods: u16 {
        const LSHIFT = 1 << 0;
        const RSHIFT = 1 << 1;
        const LCTRL = 1 << 2;
        const RCTRL = 1 << 3;
        const LALT = 1 << 4;
        const RALT = 1 << 5;
        const LGUI = 1 << 6;
        const RGUI = 1 << 7;

        const SHIFT = Self::LSHIFT.bits() | Self::RSHIFT.bits();
        const CTRL = Self::LCTRL.bits() | Self::RCTRL.bits();
        const ALT = Self::LALT.bits() | Self::RALT.bits();
        const GUI = Self::LGUI.bits() | Self::RGUI.bits();
    }
}

/// (alias, left, right, display name) for each modifier family.
pub(crate) const MODIFIER_FAMILIES: [(KeyMods, KeyMods, KeyMods, &str); 4] = [
    (KeyMods::CTRL, KeyMods::LCTRL, KeyMods::RCTRL, "Ctrl"),
    (KeyMods::SHIFT, KeyMods::LSHIFT, KeyMods::RSHIFT, "Shift"),
    (KeyMods::ALT, KeyMods::LALT, KeyMods::RALT, "Alt"),
    (KeyMods::GUI, KeyMods::LGUI, KeyMods::RGUI, "GUI"),
];

impl KeyMods {
    /// The bit a modifier key contributes by itself, empty for other keys.
    pub fn of_modifier_key(code: KeyCode) -> KeyMods {
        match code {
            KeyCode::ShiftLeft => KeyMods::LSHIFT,
            KeyCode::ShiftRight => KeyMods::RSHIFT,
            KeyCode::ControlLeft => KeyMods::LCTRL,
            KeyCode::ControlRight => KeyMods::RCTRL,
            KeyCode::AltLeft => KeyMods::LALT,
            KeyCode::AltRight => KeyMods::RALT,
            KeyCode::SuperLeft => KeyMods::LGUI,
            KeyCode::SuperRight => KeyMods::RGUI,
            _ => KeyMods::empty(),
        }
    }

    /// egui's view of this mask. `command` follows the platform convention:
    /// the GUI key on macOS, Ctrl elsewhere.
    pub fn to_egui(self) -> egui::Modifiers {
        let ctrl = self.intersects(KeyMods::CTRL);
        let gui = self.intersects(KeyMods::GUI);
        let mac = cfg!(target_os = "macos");
        egui::Modifiers {
            alt: self.intersects(KeyMods::ALT),
            ctrl,
            shift: self.intersects(KeyMods::SHIFT),
            mac_cmd: mac && gui,
            command: if mac { gui } else { ctrl },
        }
    }
}

/// Key code plus modifier mask: the lookup key of a binding table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyInput {
    pub code: KeyCode,
    pub mods: KeyMods,
}

impl KeyInput {
    pub const fn new(code: KeyCode, mods: KeyMods) -> Self {
        Self { code, mods }
    }

    pub const fn plain(code: KeyCode) -> Self {
        Self {
            code,
            mods: KeyMods::empty(),
        }
    }

    /// Render as `Ctrl+Shift+Z`, naming the GUI key (Meta, Super, Cmd, Win)
    /// with `gui_key_name`. Both sides of a family collapse to the alias.
    pub fn to_string_with(&self, gui_key_name: &str) -> String {
        let mut parts: Vec<String> = Vec::new();
        for (both, left, right, name) in MODIFIER_FAMILIES {
            let name = if both == KeyMods::GUI { gui_key_name } else { name };
            if self.mods.contains(both) {
                parts.push(name.to_owned());
                continue;
            }
            if self.mods.contains(left) {
                parts.push(format!("L{name}"));
            }
            if self.mods.contains(right) {
                parts.push(format!("R{name}"));
            }
        }
        parts.push(key_name(self.code));
        parts.join("+")
    }
}

impl fmt::Display for KeyInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_with("GUI"))
    }
}

/// Short human name of a key code: `KeyZ` becomes `Z`, `Digit1` becomes `1`.
pub fn key_name(code: KeyCode) -> String {
    let name = format!("{code:?}");
    name.strip_prefix("Key")
        .or_else(|| name.strip_prefix("Digit"))
        .map(str::to_owned)
        .unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_cover_both_sides() {
        assert_eq!(KeyMods::CTRL, KeyMods::LCTRL | KeyMods::RCTRL);
        assert!(KeyMods::SHIFT.contains(KeyMods::RSHIFT));
        assert!(!KeyMods::LALT.contains(KeyMods::ALT));
    }

    #[test]
    fn display_uses_alias_when_both_sides_set() {
        let input = KeyInput::new(KeyCode::KeyZ, KeyMods::CTRL | KeyMods::LSHIFT);
        assert_eq!(input.to_string(), "Ctrl+LShift+Z");
    }

    #[test]
    fn display_names_gui_key() {
        let input = KeyInput::new(KeyCode::KeyQ, KeyMods::RGUI);
        assert_eq!(input.to_string_with("Cmd"), "RCmd+Q");
        assert_eq!(input.to_string(), "RGUI+Q");
    }

    #[test]
    fn display_plain_key() {
        assert_eq!(KeyInput::plain(KeyCode::Enter).to_string(), "Enter");
        assert_eq!(KeyInput::plain(KeyCode::Digit7).to_string(), "7");
    }

    #[test]
    fn modifier_keys_report_their_own_bit() {
        assert_eq!(KeyMods::of_modifier_key(KeyCode::ShiftRight), KeyMods::RSHIFT);
        assert_eq!(KeyMods::of_modifier_key(KeyCode::SuperLeft), KeyMods::LGUI);
        assert!(KeyMods::of_modifier_key(KeyCode::KeyA).is_empty());
    }

    #[test]
    fn egui_modifiers_from_mask() {
        let m = (KeyMods::RCTRL | KeyMods::LSHIFT).to_egui();
        assert!(m.ctrl);
        assert!(m.shift);
        assert!(!m.alt);
        if cfg!(target_os = "macos") {
            assert!(!m.command);
        } else {
            assert!(m.command);
        }
    }
}
