/// An abstract key of the GUI toolkit.
///
/// Physical keys never reach the GUI directly; the binding table maps them
/// onto these. Several entries (copy, undo, word movement) are editing
/// commands rather than keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UiKey {
    Shift,
    Ctrl,
    Delete,
    Enter,
    Tab,
    Backspace,
    Copy,
    Cut,
    Paste,
    Up,
    Down,
    Left,
    Right,
    TextInsertMode,
    TextReplaceMode,
    TextResetMode,
    TextLineStart,
    TextLineEnd,
    TextStart,
    TextEnd,
    TextUndo,
    TextRedo,
    TextSelectAll,
    TextWordLeft,
    TextWordRight,
    ScrollStart,
    ScrollEnd,
    ScrollUp,
    ScrollDown,
}

/// What to emit when a bound key is pressed or released: up to two
/// abstract keys, in order. `None` means "no key".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct KeyAction {
    pub key1: Option<UiKey>,
    pub key2: Option<UiKey>,
}

impl KeyAction {
    pub const fn new(key: UiKey) -> Self {
        Self {
            key1: Some(key),
            key2: None,
        }
    }

    pub const fn pair(first: UiKey, second: UiKey) -> Self {
        Self {
            key1: Some(first),
            key2: Some(second),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.key1.is_none() && self.key2.is_none()
    }

    /// The keys this action emits, in order.
    pub fn keys(&self) -> impl Iterator<Item = UiKey> {
        self.key1.into_iter().chain(self.key2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_key_action() {
        let a = KeyAction::new(UiKey::Enter);
        assert_eq!(a.keys().collect::<Vec<_>>(), vec![UiKey::Enter]);
        assert!(!a.is_empty());
    }

    #[test]
    fn paired_action_keeps_order() {
        let a = KeyAction::pair(UiKey::TextStart, UiKey::ScrollStart);
        assert_eq!(
            a.keys().collect::<Vec<_>>(),
            vec![UiKey::TextStart, UiKey::ScrollStart]
        );
    }

    #[test]
    fn second_key_alone_still_emits() {
        let a = KeyAction {
            key1: None,
            key2: Some(UiKey::ScrollDown),
        };
        assert_eq!(a.keys().collect::<Vec<_>>(), vec![UiKey::ScrollDown]);
    }

    #[test]
    fn default_action_is_empty() {
        assert!(KeyAction::default().is_empty());
    }
}
