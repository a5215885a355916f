//! Keyboard shortcut mapping and documentation.

use super::ToolKind;
use crate::input::{Key, KeyEvent};
use kurbo::Vec2;

/// Editor command triggered from the keyboard.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Undo,
    Redo,
    Copy,
    Paste,
    Duplicate,
    SelectAll,
    Save,
    ZoomIn,
    ZoomOut,
    ResetZoom,
    Group,
    Ungroup,
    DeleteSelection,
    /// Clear the selection and return to the select tool.
    Cancel,
    SetTool(ToolKind),
    /// Pan one step in the given unit direction.
    Pan(Vec2),
    ShowShortcuts,
}

/// Map a key press to a command.
///
/// Nothing fires while a text-editing control has focus.
pub fn resolve_shortcut(event: &KeyEvent) -> Option<Command> {
    if event.text_input_focused {
        return None;
    }

    let mods = event.modifiers;
    if mods.command() {
        let c = event.char()?;
        return match c {
            'z' if mods.shift => Some(Command::Redo),
            'z' => Some(Command::Undo),
            'y' => Some(Command::Redo),
            'c' => Some(Command::Copy),
            'v' => Some(Command::Paste),
            'd' => Some(Command::Duplicate),
            'a' => Some(Command::SelectAll),
            's' => Some(Command::Save),
            'g' if mods.shift => Some(Command::Ungroup),
            'g' => Some(Command::Group),
            '=' | '+' => Some(Command::ZoomIn),
            '-' => Some(Command::ZoomOut),
            '0' => Some(Command::ResetZoom),
            _ => None,
        };
    }

    match event.key {
        Key::Delete | Key::Backspace => Some(Command::DeleteSelection),
        Key::Escape => Some(Command::Cancel),
        Key::F1 => Some(Command::ShowShortcuts),
        Key::ArrowLeft => Some(Command::Pan(Vec2::new(1.0, 0.0))),
        Key::ArrowRight => Some(Command::Pan(Vec2::new(-1.0, 0.0))),
        Key::ArrowUp => Some(Command::Pan(Vec2::new(0.0, 1.0))),
        Key::ArrowDown => Some(Command::Pan(Vec2::new(0.0, -1.0))),
        Key::Char('?') => Some(Command::ShowShortcuts),
        Key::Char(c) => ToolKind::from_shortcut(c).map(Command::SetTool),
        Key::Enter => None,
    }
}

/// A keyboard shortcut definition.
#[derive(Debug, Clone)]
pub struct Shortcut {
    pub key: &'static str,
    pub ctrl: bool,
    pub shift: bool,
    pub description: &'static str,
}

impl Shortcut {
    pub const fn new(key: &'static str, ctrl: bool, shift: bool, description: &'static str) -> Self {
        Self {
            key,
            ctrl,
            shift,
            description,
        }
    }

    /// Format the shortcut for display (e.g., "Ctrl+S").
    pub fn format(&self) -> String {
        let mut parts = Vec::new();
        if self.ctrl {
            parts.push("Ctrl");
        }
        if self.shift {
            parts.push("Shift");
        }
        parts.push(self.key);
        parts.join("+")
    }
}

/// Registry of all keyboard shortcuts, for the help overlay.
pub struct ShortcutRegistry;

impl ShortcutRegistry {
    pub fn all() -> Vec<Shortcut> {
        vec![
            Shortcut::new("V", false, false, "Select tool"),
            Shortcut::new("T", false, false, "Text tool"),
            Shortcut::new("S", false, false, "Shape tool"),
            Shortcut::new("I", false, false, "Image tool"),
            Shortcut::new("D", false, false, "Document tool"),
            Shortcut::new("Z", true, false, "Undo"),
            Shortcut::new("Z", true, true, "Redo"),
            Shortcut::new("Y", true, false, "Redo"),
            Shortcut::new("C", true, false, "Copy"),
            Shortcut::new("V", true, false, "Paste"),
            Shortcut::new("D", true, false, "Duplicate"),
            Shortcut::new("A", true, false, "Select all"),
            Shortcut::new("S", true, false, "Save now"),
            Shortcut::new("G", true, false, "Group selection"),
            Shortcut::new("G", true, true, "Ungroup selection"),
            Shortcut::new("=", true, false, "Zoom in"),
            Shortcut::new("-", true, false, "Zoom out"),
            Shortcut::new("0", true, false, "Reset zoom"),
            Shortcut::new("Delete", false, false, "Delete selection"),
            Shortcut::new("Escape", false, false, "Clear selection"),
            Shortcut::new("Arrows", false, false, "Pan the canvas"),
            Shortcut::new("?", false, false, "Show shortcuts"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Modifiers;

    #[test]
    fn test_command_shortcuts() {
        assert_eq!(resolve_shortcut(&KeyEvent::ctrl('z')), Some(Command::Undo));
        assert_eq!(
            resolve_shortcut(&KeyEvent::new(Key::Char('Z'), Modifiers::CTRL_SHIFT)),
            Some(Command::Redo)
        );
        assert_eq!(resolve_shortcut(&KeyEvent::ctrl('y')), Some(Command::Redo));
        assert_eq!(resolve_shortcut(&KeyEvent::ctrl('s')), Some(Command::Save));
        assert_eq!(resolve_shortcut(&KeyEvent::ctrl('+')), Some(Command::ZoomIn));
        assert_eq!(resolve_shortcut(&KeyEvent::ctrl('0')), Some(Command::ResetZoom));
    }

    #[test]
    fn test_meta_acts_as_ctrl() {
        let mods = Modifiers {
            meta: true,
            ..Default::default()
        };
        assert_eq!(resolve_shortcut(&KeyEvent::new(Key::Char('c'), mods)), Some(Command::Copy));
    }

    #[test]
    fn test_plain_keys_switch_tools() {
        assert_eq!(resolve_shortcut(&KeyEvent::plain('s')), Some(Command::SetTool(ToolKind::Shape)));
        assert_eq!(
            resolve_shortcut(&KeyEvent::new(Key::Backspace, Modifiers::NONE)),
            Some(Command::DeleteSelection)
        );
        assert_eq!(resolve_shortcut(&KeyEvent::new(Key::Escape, Modifiers::NONE)), Some(Command::Cancel));
    }

    #[test]
    fn test_ignored_while_typing() {
        assert_eq!(resolve_shortcut(&KeyEvent::plain('t').in_text_input()), None);
        assert_eq!(resolve_shortcut(&KeyEvent::ctrl('z').in_text_input()), None);
    }

    #[test]
    fn test_format() {
        assert_eq!(Shortcut::new("G", true, true, "").format(), "Ctrl+Shift+G");
        assert!(ShortcutRegistry::all().iter().any(|s| s.description == "Undo"));
    }
}
