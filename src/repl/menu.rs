//! Popup menu drawn below the cursor line

use std::cell::RefCell;
use std::rc::Rc;

use nu_ansi_term::{Color, Style};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::completion::{MenuItem, MenuRenderer};

/// What the menu currently shows. Shared between the renderer owned by the
/// engine and the terminal loop that draws the screen.
#[derive(Debug, Clone, Default)]
pub struct MenuState {
    pub items: Vec<MenuItem>,
    pub selected: Option<usize>,
    pub visible: bool,
}

/// Menu renderer that records the menu for the next screen refresh.
#[derive(Debug, Clone)]
pub struct PopupMenu {
    state: Rc<RefCell<MenuState>>,
    max_height: usize,
}

impl PopupMenu {
    /// `max_height` of 0 means as many rows as there are items.
    pub fn new(max_height: usize) -> Self {
        Self {
            state: Rc::default(),
            max_height,
        }
    }

    /// Handle for the drawing side.
    pub fn state(&self) -> Rc<RefCell<MenuState>> {
        Rc::clone(&self.state)
    }

    fn rows(&self, count: usize) -> usize {
        if self.max_height == 0 {
            count
        } else {
            count.min(self.max_height)
        }
    }
}

impl MenuRenderer for PopupMenu {
    fn display(&mut self, items: &[MenuItem], selected: Option<usize>, changed: bool) {
        let mut state = self.state.borrow_mut();
        if changed || !state.visible {
            state.items = items.to_vec();
        }
        state.selected = selected;
        state.visible = true;
    }

    fn undisplay(&mut self) {
        let mut state = self.state.borrow_mut();
        state.visible = false;
        state.items.clear();
        state.selected = None;
    }

    fn height(&self) -> Option<usize> {
        let state = self.state.borrow();
        state.visible.then(|| self.rows(state.items.len()))
    }
}

/// Render the menu as terminal rows, at most `rows` of them, each at most
/// `width` columns wide. The window scrolls to keep the selection visible.
pub fn render(state: &MenuState, rows: usize, width: usize, colors: bool) -> Vec<String> {
    if !state.visible || state.items.is_empty() || rows == 0 {
        return Vec::new();
    }
    let first = match state.selected {
        Some(sel) if sel >= rows => sel + 1 - rows,
        _ => 0,
    };
    let text_width = state
        .items
        .iter()
        .map(|i| i.text.width())
        .max()
        .unwrap_or(0);
    let kind_width = state
        .items
        .iter()
        .filter_map(|i| i.kind.as_deref())
        .map(UnicodeWidthStr::width)
        .max()
        .unwrap_or(0);

    state
        .items
        .iter()
        .enumerate()
        .skip(first)
        .take(rows)
        .map(|(idx, item)| {
            let mut row = format!(" {}", pad(&item.text, text_width));
            if kind_width > 0 {
                row.push(' ');
                row.push_str(&pad(item.kind.as_deref().unwrap_or(""), kind_width));
            }
            if let Some(extra) = &item.extra {
                row.push(' ');
                row.push_str(extra);
            }
            row.push(' ');
            let row = truncate(&row, width);
            if !colors {
                let marker = if state.selected == Some(idx) { '>' } else { ' ' };
                return format!("{marker}{row}");
            }
            let style = if state.selected == Some(idx) {
                Style::new().fg(Color::Black).on(Color::LightGray)
            } else {
                Style::new().fg(Color::White).on(Color::DarkGray)
            };
            style.paint(row).to_string()
        })
        .collect()
}

fn pad(text: &str, width: usize) -> String {
    let fill = width.saturating_sub(text.width());
    format!("{text}{}", " ".repeat(fill))
}

fn truncate(text: &str, width: usize) -> String {
    let mut used = 0;
    let mut out = String::new();
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        used += w;
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(text: &str, kind: Option<&str>) -> MenuItem {
        MenuItem {
            text: text.to_string(),
            kind: kind.map(str::to_string),
            extra: None,
            info: None,
        }
    }

    #[test]
    fn test_renderer_records_state() {
        let mut menu = PopupMenu::new(2);
        let state = menu.state();
        assert_eq!(menu.height(), None);

        menu.display(&[item("a", None), item("b", None), item("c", None)], Some(1), true);
        assert_eq!(menu.height(), Some(2));
        assert_eq!(state.borrow().selected, Some(1));

        menu.display(&[], Some(2), false);
        assert_eq!(state.borrow().items.len(), 3);
        assert_eq!(state.borrow().selected, Some(2));

        menu.undisplay();
        assert!(!state.borrow().visible);
        assert_eq!(menu.height(), None);
    }

    #[test]
    fn test_render_plain_rows() {
        let state = MenuState {
            items: vec![item("hello", Some("v")), item("hi", None)],
            selected: Some(1),
            visible: true,
        };
        let rows = render(&state, 10, 80, false);
        assert_eq!(rows, ["  hello v ", "> hi      "]);
    }

    #[test]
    fn test_render_scrolls_to_selection() {
        let state = MenuState {
            items: vec![item("a", None), item("b", None), item("c", None)],
            selected: Some(2),
            visible: true,
        };
        let rows = render(&state, 2, 80, false);
        assert_eq!(rows, ["  b ", "> c "]);
    }

    #[test]
    fn test_truncate_wide_chars() {
        assert_eq!(truncate("日本語", 5), "日本");
        assert_eq!(pad("日", 3), "日 ");
    }
}
