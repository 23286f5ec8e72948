use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::LazyLock;

use winit::keyboard::KeyCode;

use crate::action::{KeyAction, UiKey};
use crate::keys::{KeyInput, KeyMods, MODIFIER_FAMILIES};

#[derive(Debug, thiserror::Error)]
pub enum BindingError {
    #[error("{input} is bound to both {first:?} and {second:?}")]
    Conflict {
        input: KeyInput,
        first: KeyAction,
        second: KeyAction,
    },
}

/// Lookup table from concrete key inputs to GUI key actions.
///
/// Built from a source table that may use the `SHIFT`/`CTRL`/`ALT`/`GUI`
/// aliases; every alias is expanded into its left and right variants so
/// lookups never need to consider them.
#[derive(Debug, Clone, Default)]
pub struct KeyBindings {
    map: HashMap<KeyInput, KeyAction>,
}

impl KeyBindings {
    pub fn new<I>(source: I) -> Result<Self, BindingError>
    where
        I: IntoIterator<Item = (KeyInput, KeyAction)>,
    {
        let mut map = HashMap::new();
        for (input, action) in source {
            for concrete in expand(input) {
                match map.entry(concrete) {
                    Entry::Vacant(slot) => {
                        slot.insert(action);
                    }
                    Entry::Occupied(slot) if *slot.get() != action => {
                        return Err(BindingError::Conflict {
                            input: concrete,
                            first: *slot.get(),
                            second: action,
                        });
                    }
                    Entry::Occupied(_) => {}
                }
            }
        }
        tracing::debug!(bindings = map.len(), "key bindings built");
        Ok(Self { map })
    }

    pub fn get(&self, input: &KeyInput) -> Option<KeyAction> {
        self.map.get(input).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&KeyInput, &KeyAction)> {
        self.map.iter()
    }
}

/// Replace each alias in `input` with its left and right variants,
/// producing every combination.
fn expand(input: KeyInput) -> Vec<KeyInput> {
    let mut out = vec![input];
    for (both, left, right, _) in MODIFIER_FAMILIES {
        for i in 0..out.len() {
            let current = out[i];
            if !current.mods.contains(both) {
                continue;
            }
            let base = current.mods.difference(both);
            out[i] = KeyInput::new(current.code, base | left);
            out.push(KeyInput::new(current.code, base | right));
        }
    }
    out
}

/// The stock binding table in source form, aliases unexpanded. Extend it
/// and pass it to [`KeyBindings::new`] to customise.
pub fn default_binding_table() -> Vec<(KeyInput, KeyAction)> {
    use KeyCode as K;
    use UiKey as U;

    let plain = |code, key| (KeyInput::plain(code), KeyAction::new(key));
    let ctrl = |code, key| (KeyInput::new(code, KeyMods::CTRL), KeyAction::new(key));

    vec![
        plain(K::ShiftLeft, U::Shift),
        plain(K::ShiftRight, U::Shift),
        plain(K::Enter, U::Enter),
        plain(K::Tab, U::Tab),
        plain(K::Backspace, U::Backspace),
        plain(K::Delete, U::Delete),
        (
            KeyInput::plain(K::Home),
            KeyAction::pair(U::TextStart, U::ScrollStart),
        ),
        (
            KeyInput::plain(K::End),
            KeyAction::pair(U::TextEnd, U::ScrollEnd),
        ),
        plain(K::PageUp, U::ScrollUp),
        plain(K::PageDown, U::ScrollDown),
        plain(K::ArrowUp, U::Up),
        plain(K::ArrowDown, U::Down),
        plain(K::ArrowLeft, U::Left),
        plain(K::ArrowRight, U::Right),
        ctrl(K::KeyC, U::Copy),
        ctrl(K::KeyX, U::Cut),
        ctrl(K::KeyV, U::Paste),
        ctrl(K::KeyA, U::TextLineStart),
        ctrl(K::KeyE, U::TextLineEnd),
        ctrl(K::KeyZ, U::TextUndo),
        (
            KeyInput::new(K::KeyZ, KeyMods::CTRL | KeyMods::SHIFT),
            KeyAction::new(U::TextRedo),
        ),
    ]
}

static DEFAULT_BINDINGS: LazyLock<KeyBindings> = LazyLock::new(|| {
    KeyBindings::new(default_binding_table()).expect("stock key bindings are conflict-free")
});

/// The stock bindings, built once.
pub fn default_bindings() -> &'static KeyBindings {
    &DEFAULT_BINDINGS
}
