use crossterm::event::{Event, KeyEvent};
use tui_input::backend::crossterm::EventHandler;
use tui_input::Input;

use crate::contact::FormField;

/// Text input bound to one form field at a time.
#[derive(Default)]
pub struct FieldEditor {
    target: Option<FormField>,
    input: Input,
}

impl FieldEditor {
    pub fn start(&mut self, current: &str, target: FormField) {
        self.target = Some(target);
        self.input = Input::new(current.to_string());
    }

    pub fn cancel(&mut self) {
        self.target = None;
        self.input.reset();
    }

    pub fn target(&self) -> Option<FormField> {
        self.target
    }

    pub fn is_active(&self) -> bool {
        self.target.is_some()
    }

    pub fn value(&self) -> &str {
        self.input.value()
    }

    /// Cursor position as a char index into the value.
    pub fn cursor(&self) -> usize {
        self.input.cursor()
    }

    /// Returns true when the value changed.
    pub fn handle_key_event(&mut self, key: KeyEvent) -> bool {
        if self.target.is_none() {
            return false;
        }
        self.input
            .handle_event(&Event::Key(key))
            .map_or(false, |change| change.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyModifiers};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_typing_edits_the_target_value() {
        let mut editor = FieldEditor::default();
        assert!(!editor.handle_key_event(key(KeyCode::Char('x'))));

        editor.start("Bo", FormField::FirstName);
        assert!(editor.handle_key_event(key(KeyCode::Char('b'))));
        assert_eq!(editor.value(), "Bob");
        assert_eq!(editor.cursor(), 3);

        // Cursor movement is not a change
        assert!(!editor.handle_key_event(key(KeyCode::Left)));
        assert!(editor.handle_key_event(key(KeyCode::Backspace)));
        assert_eq!(editor.value(), "Bb");

        editor.cancel();
        assert!(!editor.is_active());
        assert_eq!(editor.value(), "");
    }
}
