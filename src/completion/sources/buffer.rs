//! Buffer scanning for keyword and whole-line completion
//!
//! A [`BufferScan`] is resumable: each [`step`](BufferScan::step) searches
//! on from where the previous one stopped and returns as soon as one new
//! candidate was added. The current buffer wraps around at its end; other
//! buffers are scanned once from one end to the other.

use super::super::candidate::{CandidateFlags, Direction};
use super::super::leader::{
    find_word_end, find_word_start, floor_char_boundary, is_keyword_char, leading_white,
};
use super::super::provider::{CompiledPattern, Editor, Position, TextBuffer};
use super::{BufferRef, Collector};

/// Longest text a continued (adding) match may grow to.
pub const MAX_ADDED_TEXT_LEN: usize = 1024;

/// Longest typed prefix kept when continuing a completion.
pub const MAX_CONTINUED_PREFIX: usize = MAX_ADDED_TEXT_LEN - 75;

/// Fixed inputs of a scan.
pub struct ScanParams<'a> {
    pub pattern: &'a dyn CompiledPattern,
    /// Match whole lines by their first non-blank text.
    pub line_search: bool,
    /// Whole-line completion: candidates are lines, not words.
    pub line_mode: bool,
    /// Continuing a previous completion.
    pub adding: bool,
    /// Length of the typed text.
    pub length: usize,
    /// Where the typed text starts. While adding, the text before the
    /// cursor matches itself there, so that match is skipped.
    pub start: Position,
    pub cursor_line: usize,
    /// Score current-buffer matches by their distance from the cursor.
    pub nearest: bool,
    pub joinspaces: bool,
}

/// Outcome of one scan step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Found,
    Exhausted,
}

#[derive(Debug, Clone)]
pub struct BufferScan {
    target: BufferRef,
    dir: Direction,
    wrap: bool,
    /// Position of the last match; `None` before the first search of a
    /// buffer scanned end to end.
    pos: Option<Position>,
    first_match: Option<Position>,
    prev_match: Option<Position>,
    looped: bool,
}

impl BufferScan {
    /// Prepare a scan of `target` starting at the typed text.
    pub fn new(
        target: BufferRef,
        dir: Direction,
        start: Position,
        buf: &dyn TextBuffer,
        keyword_mode: bool,
    ) -> Self {
        let pos = match target {
            BufferRef::Current if dir.is_forward() && keyword_mode => {
                // one back, so a word right at the start position is seen
                Some(step_back(buf, start))
            }
            BufferRef::Current => Some(start),
            BufferRef::Other(_) => None,
        };
        Self {
            target,
            dir,
            wrap: target == BufferRef::Current,
            pos,
            first_match: None,
            prev_match: None,
            looped: false,
        }
    }

    /// Search for the next new candidate and add it.
    pub fn step(&mut self, editor: &Editor, params: &ScanParams<'_>, out: &mut Collector<'_>) -> Step {
        let buf: &dyn TextBuffer = match self.target {
            BufferRef::Current => editor.buffer.as_ref(),
            BufferRef::Other(i) => match editor.others.get(i) {
                Some(b) => b.as_ref(),
                None => return Step::Exhausted,
            },
        };
        let in_current = self.target == BufferRef::Current;

        loop {
            let found = if params.line_search {
                search_line(buf, self.pos, self.dir, params.pattern, self.wrap)
            } else {
                search_word(buf, self.pos, self.dir, params.pattern, self.wrap)
            };
            let Some(found) = found else {
                return Step::Exhausted;
            };

            match self.first_match {
                None => self.first_match = Some(found),
                Some(first) if first == found => return Step::Exhausted,
                Some(_) => {}
            }
            if let Some(prev) = self.prev_match {
                let wrapped = match self.dir {
                    Direction::Forward => prev >= found,
                    Direction::Backward => prev <= found,
                };
                if wrapped {
                    if self.looped {
                        return Step::Exhausted;
                    }
                    self.looped = true;
                }
            }
            self.prev_match = Some(found);
            self.pos = Some(found);

            if in_current && params.adding && found == params.start {
                continue;
            }

            let Some((text, joined)) = extract(buf, found, params) else {
                continue;
            };

            let score = if params.nearest && in_current {
                found.line.abs_diff(params.cursor_line) as i32 + 1
            } else {
                0
            };
            let fname = (!in_current).then(|| buf.name());
            let flags = if joined {
                CandidateFlags::CONT_S_IPOS
            } else {
                CandidateFlags::empty()
            };
            if out.add_word(&text, fname, flags, score) {
                return Step::Found;
            }
        }
    }
}

/// The position one character before `pos`, or the end of the buffer.
fn step_back(buf: &dyn TextBuffer, pos: Position) -> Position {
    if pos.col > 0 {
        let line = buf.line(pos.line).unwrap_or_default();
        let col = line[..pos.col.min(line.len())]
            .char_indices()
            .next_back()
            .map_or(0, |(i, _)| i);
        return Position::new(pos.line, col);
    }
    if pos.line > 0 {
        let len = buf.line(pos.line - 1).map_or(0, str::len);
        return Position::new(pos.line - 1, len);
    }
    let last = buf.line_count().saturating_sub(1);
    Position::new(last, buf.line(last).map_or(0, str::len))
}

/// Match starts on `line`, in order.
fn matches_in(text: &str, pattern: &dyn CompiledPattern) -> Vec<usize> {
    let mut starts = Vec::new();
    let mut from = 0;
    while from <= text.len() {
        let Some(range) = pattern.find_at(text, from) else {
            break;
        };
        starts.push(range.start);
        from = match text[range.start..].chars().next() {
            Some(c) => range.start + c.len_utf8(),
            None => break,
        };
    }
    starts
}

/// Next match strictly after (forward) or before (backward) `pos`.
fn search_word(
    buf: &dyn TextBuffer,
    pos: Option<Position>,
    dir: Direction,
    pattern: &dyn CompiledPattern,
    wrap: bool,
) -> Option<Position> {
    let count = buf.line_count();
    if count == 0 {
        return None;
    }
    let hit = |lnum: usize, keep: &dyn Fn(usize) -> bool| -> Option<Position> {
        let text = buf.line(lnum)?;
        let starts = matches_in(text, pattern).into_iter().filter(|&c| keep(c));
        let col = match dir {
            Direction::Forward => starts.min(),
            Direction::Backward => starts.max(),
        }?;
        Some(Position::new(lnum, col))
    };

    match (dir, pos) {
        (Direction::Forward, None) => (0..count).find_map(|l| hit(l, &|_| true)),
        (Direction::Backward, None) => (0..count).rev().find_map(|l| hit(l, &|_| true)),
        (Direction::Forward, Some(p)) => hit(p.line, &|c| c > p.col)
            .or_else(|| (p.line + 1..count).find_map(|l| hit(l, &|_| true)))
            .or_else(|| {
                if !wrap {
                    return None;
                }
                (0..p.line)
                    .find_map(|l| hit(l, &|_| true))
                    .or_else(|| hit(p.line, &|c| c <= p.col))
            }),
        (Direction::Backward, Some(p)) => hit(p.line, &|c| c < p.col)
            .or_else(|| (0..p.line).rev().find_map(|l| hit(l, &|_| true)))
            .or_else(|| {
                if !wrap {
                    return None;
                }
                (p.line + 1..count)
                    .rev()
                    .find_map(|l| hit(l, &|_| true))
                    .or_else(|| hit(p.line, &|c| c >= p.col))
            }),
    }
}

/// Next line after (or before) `pos` whose first non-blank text matches.
fn search_line(
    buf: &dyn TextBuffer,
    pos: Option<Position>,
    dir: Direction,
    pattern: &dyn CompiledPattern,
    wrap: bool,
) -> Option<Position> {
    let count = buf.line_count();
    if count == 0 {
        return None;
    }
    let hit = |lnum: usize| -> Option<Position> {
        let text = buf.line(lnum)?;
        pattern
            .find_at(text, 0)
            .map(|_| Position::new(lnum, leading_white(text)))
    };

    let order: Vec<usize> = match (dir, pos) {
        (Direction::Forward, None) => (0..count).collect(),
        (Direction::Backward, None) => (0..count).rev().collect(),
        (Direction::Forward, Some(p)) => {
            let mut v: Vec<usize> = (p.line + 1..count).collect();
            if wrap {
                v.extend(0..=p.line.min(count - 1));
            }
            v
        }
        (Direction::Backward, Some(p)) => {
            let mut v: Vec<usize> = (0..p.line.min(count)).rev().collect();
            if wrap {
                v.extend((p.line.min(count - 1)..count).rev());
            }
            v
        }
    };
    order.into_iter().find_map(hit)
}

/// Text of the candidate found at `pos`, and whether a word from the next
/// line was joined onto it.
fn extract(buf: &dyn TextBuffer, pos: Position, params: &ScanParams<'_>) -> Option<(String, bool)> {
    let line = buf.line(pos.line)?;

    if params.line_mode {
        if params.adding {
            let next = buf.line(pos.line + 1)?;
            return Some((next[leading_white(next)..].to_string(), false));
        }
        return Some((line.get(pos.col..)?.to_string(), false));
    }

    let mut end = pos.col;
    if params.adding && params.length <= line.len() - pos.col {
        let after = floor_char_boundary(line, pos.col + params.length);
        if line[after..].chars().next().is_some_and(is_keyword_char) {
            return None;
        }
        end = find_word_start(line, after);
    }
    let end = find_word_end(line, end).max(pos.col);
    let mut text = line[pos.col..end].to_string();
    let mut joined = false;

    if params.adding && text.len() == params.length {
        if let Some(next) = buf.line(pos.line + 1) {
            let from = leading_white(next);
            let word_end = find_word_end(next, find_word_start(next, from));
            if word_end > from {
                let last = text.chars().next_back();
                if !next[from..].starts_with(')') && last != Some('\t') {
                    if last != Some(' ') {
                        text.push(' ');
                    }
                    if params.joinspaces && matches!(last, Some('.' | '?' | '!')) {
                        text.push(' ');
                    }
                }
                let piece = &next[from..word_end];
                let room = MAX_ADDED_TEXT_LEN.saturating_sub(text.len() + 1);
                text.push_str(&piece[..floor_char_boundary(piece, room)]);
                joined = true;
            }
        }
        if text.len() == params.length {
            return None;
        }
    }
    Some((text, joined))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{LineBuffer, RegexMatcher};
    use crate::completion::mode::ModeState;
    use crate::completion::provider::{PatternMatcher, SearchPattern};
    use crate::completion::sources::PollState;
    use crate::completion::store::CandidateStore;

    fn keyword(prefix: &str) -> Box<dyn CompiledPattern> {
        let min_tail = match prefix.chars().count() {
            0 => 2,
            1 => 1,
            _ => 0,
        };
        RegexMatcher
            .compile(
                &SearchPattern::Keyword {
                    prefix: prefix.into(),
                    min_tail,
                },
                false,
            )
            .unwrap()
    }

    fn params<'a>(pattern: &'a dyn CompiledPattern, start: Position) -> ScanParams<'a> {
        ScanParams {
            pattern,
            line_search: false,
            line_mode: false,
            adding: false,
            length: 0,
            start,
            cursor_line: start.line,
            nearest: false,
            joinspaces: false,
        }
    }

    fn scan_all(editor: &Editor, target: BufferRef, dir: Direction, params: &ScanParams<'_>) -> Vec<String> {
        let mut store = CandidateStore::new();
        let mut poll = PollState::default();
        let mode = ModeState::Idle;
        let buf = match target {
            BufferRef::Current => editor.buffer.as_ref(),
            BufferRef::Other(i) => editor.others[i].as_ref(),
        };
        let mut scan = BufferScan::new(target, dir, params.start, buf, !params.line_mode);
        let mut out = Collector {
            store: &mut store,
            poll: &mut poll,
            keys: None,
            mode: &mode,
            pum_visible: false,
            dir,
            icase: false,
            infer_from: None,
            source: None,
            keep_best_score: params.nearest,
            added: 0,
        };
        while scan.step(editor, params, &mut out) == Step::Found {}
        store.iter().map(|(_, c)| c.text.clone()).collect()
    }

    fn editor(lines: &[&str], cursor: Position) -> Editor {
        Editor::new(Box::new(LineBuffer::from_lines("main", lines)), cursor)
    }

    #[test]
    fn test_forward_wraps_from_cursor() {
        // the typed "he" is already taken out of the last line
        let ed = editor(&["hello", "help", "held", ""], Position::new(3, 0));
        let pat = keyword("he");
        let words = scan_all(&ed, BufferRef::Current, Direction::Forward, &params(pat.as_ref(), Position::new(3, 0)));
        assert_eq!(words, ["hello", "help", "held"]);
    }

    #[test]
    fn test_backward_walks_up_from_cursor() {
        let ed = editor(&["hello", "help", "held", ""], Position::new(3, 0));
        let pat = keyword("he");
        let words = scan_all(&ed, BufferRef::Current, Direction::Backward, &params(pat.as_ref(), Position::new(3, 0)));
        // backward insertion puts the nearest word last
        assert_eq!(words, ["hello", "help", "held"]);
    }

    #[test]
    fn test_word_after_cursor_is_found() {
        let ed = editor(&[" foobar"], Position::new(0, 0));
        let pat = keyword("fo");
        let words = scan_all(&ed, BufferRef::Current, Direction::Forward, &params(pat.as_ref(), Position::new(0, 0)));
        assert_eq!(words, ["foobar"]);
    }

    #[test]
    fn test_other_buffer_has_fname_and_no_wrap() {
        let ed = editor(&["x"], Position::new(0, 1)).with_buffers(vec![Box::new(
            LineBuffer::from_lines("notes.txt", &["alpha beta", "alphabet"]),
        )]);
        let pat = keyword("al");
        let mut store = CandidateStore::new();
        let mut poll = PollState::default();
        let mode = ModeState::Idle;
        let p = params(pat.as_ref(), Position::new(0, 0));
        let mut scan = BufferScan::new(BufferRef::Other(0), Direction::Forward, p.start, ed.others[0].as_ref(), true);
        let mut out = Collector {
            store: &mut store,
            poll: &mut poll,
            keys: None,
            mode: &mode,
            pum_visible: false,
            dir: Direction::Forward,
            icase: false,
            infer_from: None,
            source: Some(2),
            keep_best_score: false,
            added: 0,
        };
        assert_eq!(scan.step(&ed, &p, &mut out), Step::Found);
        assert_eq!(scan.step(&ed, &p, &mut out), Step::Found);
        assert_eq!(scan.step(&ed, &p, &mut out), Step::Exhausted);
        let first = store.first().unwrap();
        assert_eq!(store[first].fname.as_deref(), Some("notes.txt"));
        assert_eq!(store[first].source, Some(2));
    }

    #[test]
    fn test_nearest_scores_by_distance() {
        let ed = editor(&["far_word", "", "", "near_word", ""], Position::new(4, 0));
        let pat = keyword("nea");
        let mut p = params(pat.as_ref(), Position::new(4, 0));
        p.nearest = true;
        let mut store = CandidateStore::new();
        let mut poll = PollState::default();
        let mode = ModeState::Idle;
        let mut scan = BufferScan::new(BufferRef::Current, Direction::Forward, p.start, ed.buffer.as_ref(), true);
        let mut out = Collector {
            store: &mut store,
            poll: &mut poll,
            keys: None,
            mode: &mode,
            pum_visible: false,
            dir: Direction::Forward,
            icase: false,
            infer_from: None,
            source: None,
            keep_best_score: true,
            added: 0,
        };
        while scan.step(&ed, &p, &mut out) == Step::Found {}
        let (_, cand) = store.iter().next().unwrap();
        assert_eq!(cand.text, "near_word");
        assert_eq!(cand.score, 2);
    }

    #[test]
    fn test_adding_joins_next_line() {
        let ed = editor(&["the end.", "  Next words", "the end"], Position::new(2, 7));
        let pat = RegexMatcher
            .compile(
                &SearchPattern::Continued {
                    text: "the end".into(),
                    word_start: true,
                },
                false,
            )
            .unwrap();
        let mut p = params(pat.as_ref(), Position::new(2, 0));
        p.adding = true;
        p.length = "the end".len();
        p.joinspaces = true;
        let words = scan_all(&ed, BufferRef::Current, Direction::Forward, &p);
        assert_eq!(words, ["the end."]);

        let ed = editor(&["the end", "  Next words", "the end"], Position::new(2, 7));
        let words = scan_all(&ed, BufferRef::Current, Direction::Forward, &p);
        assert_eq!(words, ["the end Next"]);
    }

    #[test]
    fn test_joined_text_is_capped_on_char_boundary() {
        let long = "é".repeat(MAX_ADDED_TEXT_LEN);
        let lines = ["ab", long.as_str(), "ab"];
        let ed = editor(&lines, Position::new(2, 2));
        let pat = RegexMatcher
            .compile(
                &SearchPattern::Continued {
                    text: "ab".into(),
                    word_start: true,
                },
                false,
            )
            .unwrap();
        let mut p = params(pat.as_ref(), Position::new(2, 0));
        p.adding = true;
        p.length = 2;
        let words = scan_all(&ed, BufferRef::Current, Direction::Forward, &p);
        assert_eq!(words.len(), 1);
        assert!(words[0].len() < MAX_ADDED_TEXT_LEN);
        assert!(words[0].starts_with("ab é"));
    }

    #[test]
    fn test_whole_line_search() {
        let ed = editor(&["  let x = 1;", "let y = 2;", ""], Position::new(2, 0));
        let pat = RegexMatcher
            .compile(&SearchPattern::LinePrefix("le".into()), false)
            .unwrap();
        let mut p = params(pat.as_ref(), Position::new(2, 0));
        p.line_search = true;
        p.line_mode = true;
        let lines = scan_all(&ed, BufferRef::Current, Direction::Forward, &p);
        assert_eq!(lines, ["let x = 1;", "let y = 2;"]);
    }
}
