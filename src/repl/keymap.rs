use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::completion::Key;

/// What the terminal loop should do with a key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Hand the key to the completion engine.
    Feed(Key),
    /// Leave the demo.
    Quit,
    /// Nothing the engine understands.
    Ignore,
}

/// Translate a crossterm key event.
///
/// CTRL-C and CTRL-D quit. Tab is sent as CTRL-I, the way a terminal does.
pub fn translate(event: KeyEvent) -> Action {
    if event.kind == KeyEventKind::Release {
        return Action::Ignore;
    }
    let ctrl = event.modifiers.contains(KeyModifiers::CONTROL);
    let shift = event.modifiers.contains(KeyModifiers::SHIFT);

    let key = match event.code {
        KeyCode::Char('c') | KeyCode::Char('d') if ctrl => return Action::Quit,
        KeyCode::Char(c) if ctrl => Key::Ctrl(c.to_ascii_lowercase()),
        KeyCode::Char(c) => Key::Char(c),
        KeyCode::Enter => Key::Enter,
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Esc => Key::Escape,
        KeyCode::Tab => Key::Ctrl('i'),
        KeyCode::Up if shift => Key::ShiftUp,
        KeyCode::Down if shift => Key::ShiftDown,
        KeyCode::Up => Key::Up,
        KeyCode::Down => Key::Down,
        KeyCode::PageUp => Key::PageUp,
        KeyCode::PageDown => Key::PageDown,
        _ => return Action::Ignore,
    };
    Action::Feed(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode, modifiers: KeyModifiers) -> Action {
        translate(KeyEvent::new(code, modifiers))
    }

    #[test]
    fn test_control_keys() {
        assert_eq!(
            press(KeyCode::Char('n'), KeyModifiers::CONTROL),
            Action::Feed(Key::Ctrl('n'))
        );
        assert_eq!(
            press(KeyCode::Char('X'), KeyModifiers::CONTROL | KeyModifiers::SHIFT),
            Action::Feed(Key::Ctrl('x'))
        );
        assert_eq!(press(KeyCode::Char('c'), KeyModifiers::CONTROL), Action::Quit);
    }

    #[test]
    fn test_plain_and_named_keys() {
        assert_eq!(press(KeyCode::Char('a'), KeyModifiers::NONE), Action::Feed(Key::Char('a')));
        assert_eq!(press(KeyCode::Tab, KeyModifiers::NONE), Action::Feed(Key::Ctrl('i')));
        assert_eq!(press(KeyCode::Up, KeyModifiers::SHIFT), Action::Feed(Key::ShiftUp));
        assert_eq!(press(KeyCode::F(1), KeyModifiers::NONE), Action::Ignore);
    }
}
