use std::fs;
use std::path::Path;

use crate::completion::leader::floor_char_boundary;
use crate::completion::provider::{Position, TextBuffer};
use crate::error::Result;

/// Text held as a vector of lines.
#[derive(Debug, Clone)]
pub struct LineBuffer {
    name: String,
    lines: Vec<String>,
    tick: u64,
    visible: bool,
    loaded: bool,
    listed: bool,
}

impl LineBuffer {
    pub fn from_lines<S: AsRef<str>>(name: impl Into<String>, lines: &[S]) -> Self {
        let mut lines: Vec<String> = lines.iter().map(|l| l.as_ref().to_string()).collect();
        if lines.is_empty() {
            lines.push(String::new());
        }
        Self {
            name: name.into(),
            lines,
            tick: 0,
            visible: false,
            loaded: true,
            listed: true,
        }
    }

    /// Split `text` on line breaks. A trailing line break does not add an
    /// empty last line.
    pub fn from_text(name: impl Into<String>, text: &str) -> Self {
        let lines: Vec<&str> = text.lines().collect();
        Self::from_lines(name, &lines)
    }

    /// Load a file; the buffer is named after the file name.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        Ok(Self::from_text(name, &text))
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn set_loaded(&mut self, loaded: bool) {
        self.loaded = loaded;
    }

    pub fn set_listed(&mut self, listed: bool) {
        self.listed = listed;
    }

    /// `pos` moved onto the nearest existing line and char boundary.
    fn clamp(&self, pos: Position) -> Position {
        let line = pos.line.min(self.lines.len() - 1);
        let col = floor_char_boundary(&self.lines[line], pos.col);
        Position::new(line, col)
    }
}

impl TextBuffer for LineBuffer {
    fn line_count(&self) -> usize {
        self.lines.len()
    }

    fn line(&self, lnum: usize) -> Option<&str> {
        self.lines.get(lnum).map(String::as_str)
    }

    fn replace_range(&mut self, start: Position, end: Position, text: &str) -> Position {
        let start = self.clamp(start);
        let end = self.clamp(end).max(start);

        let head = &self.lines[start.line][..start.col];
        let tail = &self.lines[end.line][end.col..];
        let joined = format!("{head}{text}{tail}");
        let new_lines: Vec<String> = joined.split('\n').map(str::to_string).collect();

        let last = start.line + new_lines.len() - 1;
        let col = new_lines[new_lines.len() - 1].len() - tail.len();
        self.lines.splice(start.line..=end.line, new_lines);
        self.tick += 1;
        Position::new(last, col)
    }

    fn mark_changed(&mut self) {
        self.tick += 1;
    }

    fn changed_tick(&self) -> u64 {
        self.tick
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_listed(&self) -> bool {
        self.listed
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn is_visible(&self) -> bool {
        self.visible
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_within_line() {
        let mut buf = LineBuffer::from_lines("t", &["hello world"]);
        let end = buf.replace_range(Position::new(0, 5), Position::new(0, 5), ", dear");
        assert_eq!(buf.line(0), Some("hello, dear world"));
        assert_eq!(end, Position::new(0, 11));
        assert_eq!(buf.changed_tick(), 1);
    }

    #[test]
    fn test_insert_line_break() {
        let mut buf = LineBuffer::from_lines("t", &["ab"]);
        let end = buf.replace_range(Position::new(0, 1), Position::new(0, 1), "x\ny");
        assert_eq!(buf.lines(), ["ax", "yb"]);
        assert_eq!(end, Position::new(1, 1));
    }

    #[test]
    fn test_delete_across_lines() {
        let mut buf = LineBuffer::from_text("t", "one\ntwo\nthree\n");
        assert_eq!(buf.line_count(), 3);
        let end = buf.replace_range(Position::new(0, 2), Position::new(2, 2), "");
        assert_eq!(buf.lines(), ["onree"]);
        assert_eq!(end, Position::new(0, 2));
    }

    #[test]
    fn test_positions_are_clamped() {
        let mut buf = LineBuffer::from_lines("t", &["é"]);
        // column 1 is inside the two-byte character
        let end = buf.replace_range(Position::new(0, 1), Position::new(0, 1), "x");
        assert_eq!(buf.line(0), Some("xé"));
        assert_eq!(end, Position::new(0, 1));

        let end = buf.replace_range(Position::new(0, 1), Position::new(5, 9), "!");
        assert_eq!(buf.line(0), Some("x!"));
        assert_eq!(end, Position::new(0, 2));
    }

    #[test]
    fn test_flags_and_tick() {
        let mut buf = LineBuffer::from_text("scratch", "");
        assert_eq!(buf.line_count(), 1);
        assert!(buf.is_listed() && buf.is_loaded() && !buf.is_visible());
        buf.set_listed(false);
        buf.set_visible(true);
        assert!(!buf.is_listed() && buf.is_visible());
        buf.mark_changed();
        assert_eq!(buf.changed_tick(), 1);
        assert_eq!(buf.name(), "scratch");
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, "alpha\nbeta\n").unwrap();
        let buf = LineBuffer::from_file(&path).unwrap();
        assert_eq!(buf.name(), "notes.txt");
        assert_eq!(buf.text(), "alpha\nbeta");
    }
}
