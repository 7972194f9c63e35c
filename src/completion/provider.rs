//! Collaborators consumed by the engine
//!
//! The engine never owns text storage, regex syntax, tag lookup, spelling or
//! a scripting runtime. It talks to them through the traits below; the
//! `backend` module carries default implementations.

use std::collections::HashMap;
use std::fmt;
use std::ops::Range;

use super::candidate::CompletionItem;
use super::keys::Key;
use crate::error::Result;

/// A position in a buffer: 0-based line, byte column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    pub line: usize,
    pub col: usize,
}

impl Position {
    pub fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line + 1, self.col + 1)
    }
}

/// Line oriented text storage.
pub trait TextBuffer {
    fn line_count(&self) -> usize;

    /// Text of line `lnum` without the line break.
    fn line(&self, lnum: usize) -> Option<&str>;

    /// Replace the text between `start` and `end` (exclusive) with `text`,
    /// which may contain line breaks. Returns the position just after the
    /// inserted text.
    fn replace_range(&mut self, start: Position, end: Position, text: &str) -> Position;

    /// Bump the change counter without touching the text.
    fn mark_changed(&mut self);

    /// Counter that grows on every change.
    fn changed_tick(&self) -> u64;

    /// Short display name, shown next to matches from this buffer.
    fn name(&self) -> &str;

    fn is_listed(&self) -> bool {
        true
    }

    fn is_loaded(&self) -> bool {
        true
    }

    /// Shown in a window.
    fn is_visible(&self) -> bool {
        false
    }
}

/// What the engine searches for while scanning text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchPattern {
    /// A word starting with `prefix` and followed by at least `min_tail`
    /// more keyword characters.
    Keyword { prefix: String, min_tail: usize },
    /// Literal text of a continued completion, optionally anchored at a
    /// word start.
    Continued { text: String, word_start: bool },
    /// Lines whose first non-blank text starts with the given prefix.
    LinePrefix(String),
}

impl SearchPattern {
    /// The literal text the pattern is built from.
    pub fn text(&self) -> &str {
        match self {
            SearchPattern::Keyword { prefix, .. } => prefix,
            SearchPattern::Continued { text, .. } => text,
            SearchPattern::LinePrefix(text) => text,
        }
    }
}

/// A pattern ready for matching.
pub trait CompiledPattern {
    /// Byte range of the first match starting at or after `from`.
    fn find_at(&self, line: &str, from: usize) -> Option<Range<usize>>;

    fn is_match(&self, text: &str) -> bool {
        self.find_at(text, 0).is_some()
    }
}

pub trait PatternMatcher {
    fn compile(&self, pattern: &SearchPattern, ignore_case: bool)
    -> Result<Box<dyn CompiledPattern>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagMatch {
    pub name: String,
    pub kind: Option<String>,
    pub file: Option<String>,
}

pub trait TagIndex {
    /// Tags whose name starts with `prefix`, at most `limit` of them.
    fn find_tags(&self, prefix: &str, ignore_case: bool, limit: usize) -> Vec<TagMatch>;
}

pub trait SpellEngine {
    /// Start column of a misspelled word ending at or before `col`.
    fn bad_word_start(&self, line: &str, col: usize) -> Option<usize>;

    fn suggestions(&self, word: &str, limit: usize) -> Vec<String>;
}

/// The buffer and cursor handed to a user callback. Both may be changed by
/// the callback; the engine checks afterwards.
pub struct CallbackContext<'a> {
    pub buffer: &'a mut dyn TextBuffer,
    pub cursor: &'a mut Position,
}

/// Reply of the find-start probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindStart {
    /// Completion starts at this byte column.
    Column(usize),
    /// Start at the cursor.
    Cursor,
    /// No completion now, stay in the mode.
    NotNow,
    /// No completion, leave the mode.
    CancelMode,
}

/// Reply of the completion call.
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackReply {
    List(Vec<CompletionItem>),
    Mapping {
        words: Vec<CompletionItem>,
        /// Ask to be called again whenever the leader changes.
        refresh_always: bool,
    },
    NotNow,
    CancelMode,
}

/// A user defined completion function.
pub trait UserCallback {
    fn find_start(&mut self, ctx: &mut CallbackContext<'_>) -> FindStart;

    fn complete(&mut self, base: &str, ctx: &mut CallbackContext<'_>) -> CallbackReply;
}

/// A callback built from two closures.
pub struct FnCallback<S, C> {
    find_start: S,
    complete: C,
}

impl<S, C> FnCallback<S, C>
where
    S: FnMut(&mut CallbackContext<'_>) -> FindStart,
    C: FnMut(&str, &mut CallbackContext<'_>) -> CallbackReply,
{
    pub fn new(find_start: S, complete: C) -> Self {
        Self {
            find_start,
            complete,
        }
    }
}

impl<S, C> UserCallback for FnCallback<S, C>
where
    S: FnMut(&mut CallbackContext<'_>) -> FindStart,
    C: FnMut(&str, &mut CallbackContext<'_>) -> CallbackReply,
{
    fn find_start(&mut self, ctx: &mut CallbackContext<'_>) -> FindStart {
        (self.find_start)(ctx)
    }

    fn complete(&mut self, base: &str, ctx: &mut CallbackContext<'_>) -> CallbackReply {
        (self.complete)(base, ctx)
    }
}

/// A callback that offers a fixed word list, filtered by the typed base.
/// Completion starts at the beginning of the word before the cursor.
pub struct WordListCallback {
    words: Vec<String>,
}

impl WordListCallback {
    pub fn new<I, T>(words: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            words: words.into_iter().map(Into::into).collect(),
        }
    }
}

impl UserCallback for WordListCallback {
    fn find_start(&mut self, ctx: &mut CallbackContext<'_>) -> FindStart {
        let line = ctx.buffer.line(ctx.cursor.line).unwrap_or_default();
        let before = &line[..ctx.cursor.col.min(line.len())];
        let start = before
            .char_indices()
            .rev()
            .take_while(|&(_, c)| super::leader::is_keyword_char(c))
            .last()
            .map_or(ctx.cursor.col, |(i, _)| i);
        FindStart::Column(start)
    }

    fn complete(&mut self, base: &str, _ctx: &mut CallbackContext<'_>) -> CallbackReply {
        CallbackReply::List(
            self.words
                .iter()
                .filter(|w| w.starts_with(base))
                .map(|w| CompletionItem::word(w.as_str()))
                .collect(),
        )
    }
}

/// One row handed to the menu renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    pub text: String,
    pub kind: Option<String>,
    pub extra: Option<String>,
    pub info: Option<String>,
}

pub trait MenuRenderer {
    /// Show `items`. `changed` is false when only the selection moved.
    fn display(&mut self, items: &[MenuItem], selected: Option<usize>, changed: bool);

    fn undisplay(&mut self);

    /// Height of the visible menu, `None` when hidden.
    fn height(&self) -> Option<usize>;
}

/// Source of pending input, polled during long scans.
pub trait KeySource {
    fn peek_key(&mut self) -> Option<Key>;

    fn take_key(&mut self) -> Option<Key>;
}

pub trait RegisterStore {
    /// Contents of every non-empty register.
    fn contents(&self) -> Vec<String>;
}

/// Command-line grammar used by ^X^V.
pub trait CommandGrammar {
    /// Column where the argument under the cursor starts.
    fn find_start(&self, line: &str, col: usize) -> usize;

    /// Expansions for `prefix` in the context of `line`.
    fn expand(&self, line: &str, prefix: &str) -> Vec<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeMatch {
    pub text: String,
    pub fname: Option<String>,
}

/// Searching included files for keywords (^X^I) or definitions (^X^D).
pub trait IncludeSearch {
    fn find(&self, prefix: &str, ignore_case: bool, defines: bool) -> Vec<IncludeMatch>;
}

/// Every collaborator the engine may call.
pub struct Collaborators {
    pub matcher: Box<dyn PatternMatcher>,
    pub keys: Option<Box<dyn KeySource>>,
    pub menu: Option<Box<dyn MenuRenderer>>,
    pub tags: Option<Box<dyn TagIndex>>,
    pub spell: Option<Box<dyn SpellEngine>>,
    pub registers: Option<Box<dyn RegisterStore>>,
    pub cmdline: Option<Box<dyn CommandGrammar>>,
    pub includes: Option<Box<dyn IncludeSearch>>,
    callbacks: HashMap<String, Box<dyn UserCallback>>,
}

impl Collaborators {
    pub fn new(matcher: Box<dyn PatternMatcher>) -> Self {
        Self {
            matcher,
            keys: None,
            menu: None,
            tags: None,
            spell: None,
            registers: None,
            cmdline: None,
            includes: None,
            callbacks: HashMap::new(),
        }
    }

    /// Register a callback under `name`, replacing an older one.
    pub fn register_callback(&mut self, name: impl Into<String>, cb: Box<dyn UserCallback>) {
        self.callbacks.insert(name.into(), cb);
    }

    pub fn callback_mut(&mut self, name: &str) -> Option<&mut (dyn UserCallback + 'static)> {
        self.callbacks.get_mut(name).map(|cb| cb.as_mut())
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self::new(Box::new(crate::backend::RegexMatcher))
    }
}

/// The text being edited: the current buffer with its cursor, plus other
/// buffers that may be scanned.
pub struct Editor {
    pub buffer: Box<dyn TextBuffer>,
    pub cursor: Position,
    pub others: Vec<Box<dyn TextBuffer>>,
}

impl Editor {
    pub fn new(buffer: Box<dyn TextBuffer>, cursor: Position) -> Self {
        Self {
            buffer,
            cursor,
            others: Vec::new(),
        }
    }

    pub fn with_buffers(mut self, others: Vec<Box<dyn TextBuffer>>) -> Self {
        self.others = others;
        self
    }

    /// Text of the cursor line.
    pub fn current_line(&self) -> &str {
        self.buffer.line(self.cursor.line).unwrap_or_default()
    }

    /// Insert `text` at the cursor and move the cursor after it.
    pub fn insert_text(&mut self, text: &str) {
        let at = self.cursor;
        self.cursor = self.buffer.replace_range(at, at, text);
    }

    /// Delete from `start` up to the cursor and leave the cursor at `start`.
    pub fn delete_to_cursor(&mut self, start: Position) {
        if start >= self.cursor {
            return;
        }
        self.buffer.replace_range(start, self.cursor, "");
        self.cursor = start;
    }

    /// Delete the character before the cursor, joining lines at column 0.
    pub fn backspace(&mut self) {
        let Position { line, col } = self.cursor;
        let start = if col > 0 {
            let text = self.current_line();
            let prev = text[..col.min(text.len())]
                .char_indices()
                .next_back()
                .map_or(0, |(i, _)| i);
            Position::new(line, prev)
        } else if line > 0 {
            let len = self.buffer.line(line - 1).map_or(0, str::len);
            Position::new(line - 1, len)
        } else {
            return;
        };
        self.delete_to_cursor(start);
    }
}
