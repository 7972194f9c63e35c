//! Keys as seen by the completion engine, and the `<C-x>` key notation
//! used by the scripted driver and the tests.

use crate::error::{KeyError, Result};

/// A single key press delivered to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// A printable character.
    Char(char),
    /// A control character, stored as its lower-case letter (`Ctrl('n')`).
    /// `]` is used for CTRL-].
    Ctrl(char),
    Enter,
    Backspace,
    Escape,
    Up,
    Down,
    PageUp,
    PageDown,
    ShiftUp,
    ShiftDown,
    /// Mouse movement or scrolling.
    Mouse,
    /// An event the editor injects into the input stream.
    Event,
    /// End of a select-mode mapping.
    Select,
}

impl Key {
    /// Keys that never start, continue or end a session.
    pub fn is_passive(&self) -> bool {
        matches!(self, Key::Mouse | Key::Event | Key::Select)
    }

    /// Keys that only have a completion meaning while the menu is visible.
    pub fn is_menu_key(&self) -> bool {
        matches!(
            self,
            Key::PageUp | Key::PageDown | Key::ShiftUp | Key::ShiftDown | Key::Up | Key::Down
        )
    }

    pub fn is_ctrl(&self, c: char) -> bool {
        *self == Key::Ctrl(c)
    }

    /// Whether navigating with this key moves towards the start of the list.
    pub fn is_backward(&self) -> bool {
        matches!(
            self,
            Key::Ctrl('p') | Key::Ctrl('l') | Key::PageUp | Key::ShiftUp | Key::Up
        )
    }

    /// Page keys move a whole menu height at once.
    pub fn is_page_key(&self) -> bool {
        matches!(
            self,
            Key::PageUp | Key::PageDown | Key::ShiftUp | Key::ShiftDown
        )
    }

    /// Arrow and page keys change the selection without inserting it.
    pub fn inserts_match(&self) -> bool {
        !matches!(self, Key::Up | Key::Down | Key::PageUp | Key::PageDown)
    }

    /// Number of entries to move for this key given the menu height.
    pub fn step_count(&self, menu_height: Option<usize>) -> usize {
        match menu_height {
            Some(h) if self.is_page_key() => h.saturating_sub(1).max(1),
            _ => 1,
        }
    }
}

/// Parse key notation such as `"<C-x><C-n>abc<BS><CR>"`.
///
/// `<Tab>` is CTRL-I, `<lt>` a literal `<`.
pub fn parse_keys(input: &str) -> Result<Vec<Key>> {
    let mut keys = Vec::new();
    let mut rest = input;

    while let Some(c) = rest.chars().next() {
        if c != '<' {
            keys.push(key_for_char(c));
            rest = &rest[c.len_utf8()..];
            continue;
        }
        let Some(end) = rest.find('>') else {
            return Err(KeyError::Unterminated(rest.to_string()).into());
        };
        let name = &rest[1..end];
        keys.push(parse_named(name)?);
        rest = &rest[end + 1..];
    }

    Ok(keys)
}

fn key_for_char(c: char) -> Key {
    match c {
        '\n' | '\r' => Key::Enter,
        '\t' => Key::Ctrl('i'),
        c => Key::Char(c),
    }
}

fn parse_named(name: &str) -> Result<Key> {
    let lower = name.to_ascii_lowercase();
    let key = match lower.as_str() {
        "cr" | "enter" | "return" => Key::Enter,
        "bs" | "backspace" => Key::Backspace,
        "esc" => Key::Escape,
        "tab" => Key::Ctrl('i'),
        "up" => Key::Up,
        "down" => Key::Down,
        "pageup" => Key::PageUp,
        "pagedown" => Key::PageDown,
        "s-up" => Key::ShiftUp,
        "s-down" => Key::ShiftDown,
        "lt" => Key::Char('<'),
        "space" => Key::Char(' '),
        "mouse" => Key::Mouse,
        "event" => Key::Event,
        _ => {
            let ctrl = lower.strip_prefix("c-").and_then(|rest| {
                let mut chars = rest.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(c),
                    _ => None,
                }
            });
            match ctrl {
                Some(c) => Key::Ctrl(c),
                None => return Err(KeyError::UnknownKey(name.to_string()).into()),
            }
        }
    };
    Ok(key)
}
