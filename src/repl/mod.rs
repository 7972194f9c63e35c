//! Interactive terminal demo
//!
//! Edits one buffer in raw mode and routes every key through the completion
//! engine, so the popup menu, mode line and status messages can be tried
//! out by hand:
//! - `keymap`: crossterm key events to engine keys
//! - `menu`: the popup menu renderer and its drawing

mod keymap;
mod menu;

use std::cell::RefCell;
use std::io::{self, Stdout, Write};
use std::rc::Rc;

use crossterm::cursor::MoveTo;
use crossterm::event::{self, Event};
use crossterm::style::Print;
use crossterm::terminal::{
    self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode,
    enable_raw_mode,
};
use crossterm::{execute, queue};
use nu_ansi_term::{Color, Style};
use tracing::{debug, warn};
use unicode_width::UnicodeWidthStr;

use crate::completion::CompletionEngine;
use crate::config::DisplayConfig;
use crate::error::Result;

pub use keymap::{Action, translate};
pub use menu::{MenuState, PopupMenu, render};

/// Raw-mode editing loop around a completion engine.
pub struct ReplEngine {
    engine: CompletionEngine,
    menu: Rc<RefCell<MenuState>>,
    display: DisplayConfig,
    running: bool,
}

impl ReplEngine {
    /// Wrap `engine`, installing a popup menu renderer on it.
    pub fn new(mut engine: CompletionEngine, display: DisplayConfig) -> Self {
        let popup = PopupMenu::new(display.pumheight);
        let menu = popup.state();
        engine.collaborators_mut().menu = Some(Box::new(popup));
        Self {
            engine,
            menu,
            display,
            running: false,
        }
    }

    pub fn engine(&self) -> &CompletionEngine {
        &self.engine
    }

    pub fn into_engine(self) -> CompletionEngine {
        self.engine
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Run until CTRL-C or CTRL-D. The terminal is restored even when the
    /// loop fails.
    pub fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode()?;
        execute!(stdout, EnterAlternateScreen)?;

        self.running = true;
        let outcome = self.event_loop(&mut stdout);
        self.running = false;

        execute!(stdout, LeaveAlternateScreen)?;
        disable_raw_mode()?;
        outcome
    }

    fn event_loop(&mut self, stdout: &mut Stdout) -> Result<()> {
        while self.running {
            self.draw(stdout)?;
            let Event::Key(key_event) = event::read()? else {
                continue;
            };
            match translate(key_event) {
                Action::Quit => self.running = false,
                Action::Ignore => {}
                Action::Feed(key) => {
                    if let Err(e) = self.engine.handle_key(key) {
                        warn!(error = %e, ?key, "key failed");
                    }
                    for done in self.engine.take_events() {
                        debug!(word = %done.word, reason = ?done.reason, "complete done");
                    }
                }
            }
        }
        Ok(())
    }

    fn draw(&self, stdout: &mut Stdout) -> Result<()> {
        let (cols, rows) = terminal::size()?;
        let (cols, rows) = (cols as usize, rows as usize);
        let text_rows = rows.saturating_sub(1).max(1);

        let editor = self.engine.editor();
        let cursor = editor.cursor;
        let top = cursor.line.saturating_sub(text_rows - 1);

        queue!(stdout, Clear(ClearType::All))?;
        for row in 0..text_rows {
            let Some(line) = editor.buffer.line(top + row) else {
                break;
            };
            queue!(stdout, MoveTo(0, row as u16), Print(line))?;
        }

        let cursor_row = cursor.line - top;
        let prefix = editor.current_line().get(..cursor.col).unwrap_or_default();
        let cursor_x = prefix.width();

        // the menu goes below the cursor line, or above when there is no room
        let menu = self.menu.borrow();
        let below = text_rows.saturating_sub(cursor_row + 1);
        let above = cursor_row;
        let room = below.max(above);
        let menu_rows = render(&menu, room, cols.saturating_sub(cursor_x).max(1), self.display.colors);
        let menu_top = if menu_rows.len() <= below {
            cursor_row + 1
        } else {
            cursor_row.saturating_sub(menu_rows.len())
        };
        for (i, row) in menu_rows.iter().enumerate() {
            queue!(stdout, MoveTo(cursor_x as u16, (menu_top + i) as u16), Print(row))?;
        }

        queue!(stdout, MoveTo(0, (rows - 1) as u16), Print(self.status_line(cols)))?;
        queue!(stdout, MoveTo(cursor_x as u16, cursor_row as u16))?;
        stdout.flush()?;
        Ok(())
    }

    /// Mode line followed by the status or error message.
    fn status_line(&self, width: usize) -> String {
        let mode = self.engine.mode_message().unwrap_or_default();
        let (extra, is_error) = match self.engine.error_message() {
            Some(e) => (e.to_string(), true),
            None => (
                self.engine.status_message().unwrap_or_default().to_string(),
                false,
            ),
        };
        let mut text = mode.trim_start().to_string();
        if !extra.is_empty() {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(&extra);
        }
        let text: String = text.chars().take(width).collect();
        if !self.display.colors {
            return text;
        }
        let style = if is_error {
            Style::new().fg(Color::Red).bold()
        } else {
            Style::new().bold()
        };
        style.paint(text).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LineBuffer;
    use crate::completion::{Collaborators, Editor, Position, parse_keys};
    use crate::config::CompletionConfig;

    fn repl(lines: &[&str], cursor: Position) -> ReplEngine {
        let editor = Editor::new(Box::new(LineBuffer::from_lines("demo", lines)), cursor);
        let engine =
            CompletionEngine::new(CompletionConfig::default(), editor, Collaborators::default())
                .unwrap();
        let display = DisplayConfig {
            pumheight: 5,
            colors: false,
        };
        ReplEngine::new(engine, display)
    }

    #[test]
    fn test_menu_state_follows_engine() {
        let mut r = repl(&["hello help", "he"], Position::new(1, 2));
        assert!(!r.is_running());
        r.engine.feed_keys(&parse_keys("<C-N>").unwrap()).unwrap();
        {
            let menu = r.menu.borrow();
            assert!(menu.visible);
            assert_eq!(menu.items.len(), 2);
            assert_eq!(menu.selected, Some(0));
        }
        r.engine.feed_keys(&parse_keys("<C-Y>").unwrap()).unwrap();
        assert!(!r.menu.borrow().visible);
    }

    #[test]
    fn test_status_line() {
        let mut r = repl(&["hello help", "he"], Position::new(1, 2));
        r.engine.feed_keys(&parse_keys("<C-N>").unwrap()).unwrap();
        assert_eq!(r.status_line(80), "Keyword completion (^N^P) match 1 of 2");
        assert_eq!(r.status_line(7), "Keyword");
    }
}
