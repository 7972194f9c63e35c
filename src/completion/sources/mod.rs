//! Candidate sources and the multiplexer that walks them
//!
//! The `complete` option is parsed into an ordered list of [`SourceSpec`]s.
//! During keyword completion the [`SourceMultiplexer`] hands out one
//! [`ScanUnit`] at a time: a single buffer, a set of word files, a callback,
//! and so on. Buffer scans are resumable and yield one new match per step;
//! everything else is collected in one go. Specialized submodes (^X^K, ^X^U,
//! ...) bypass the list and scan exactly one unit.

pub mod buffer;
pub mod dictionary;
pub mod external;
pub mod filenames;
pub mod function;
pub mod register;

use std::collections::HashSet;

use tracing::trace;

use super::candidate::{Candidate, CandidateFlags, Direction};
use super::keys::Key;
use super::leader::infer_case;
use super::mode::{ModeState, WordFiles};
use super::provider::{Editor, KeySource};
use super::store::{CandidateStore, InsertOutcome};
use crate::config::CompletionConfig;
use crate::error::{ConfigError, Result};

/// What a `complete` entry scans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// `.`
    CurrentBuffer,
    /// `w`: buffers shown in other windows.
    WindowBuffers,
    /// `b`: other loaded, listed buffers.
    ListedBuffers,
    /// `u`: unloaded, listed buffers.
    UnloadedBuffers,
    /// `U`: unlisted buffers.
    UnlistedBuffers,
    /// `k`: word list files, the `dictionary` option when no file is given.
    Dictionary(Option<String>),
    /// `s`: thesaurus files, the `thesaurus` option when no file is given.
    Thesaurus(Option<String>),
    /// `F`: a callback, `completefunc` when no name is given.
    Function(Option<String>),
    /// `o`: the omni callback.
    Omni,
    /// `i`
    Includes,
    /// `d`
    Defines,
    /// `f`: names of other buffers.
    BufferNames,
    /// `t` or `]`
    Tags,
}

impl SourceKind {
    pub fn is_buffer(&self) -> bool {
        matches!(
            self,
            SourceKind::CurrentBuffer
                | SourceKind::WindowBuffers
                | SourceKind::ListedBuffers
                | SourceKind::UnloadedBuffers
                | SourceKind::UnlistedBuffers
        )
    }

    pub fn is_callback(&self) -> bool {
        matches!(self, SourceKind::Function(_) | SourceKind::Omni)
    }
}

/// One parsed `complete` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    pub kind: SourceKind,
    /// Most menu entries this source may contribute, 0 for no limit.
    pub max_matches: usize,
}

impl SourceSpec {
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            max_matches: 0,
        }
    }

    /// Parse a `complete` value such as `".,w,kwords.txt^5,Fcomplete_emoji"`.
    ///
    /// Entries are comma separated; a literal comma inside a file name is
    /// written `\,`. Any entry may end in `^N` to cap it at N menu entries.
    pub fn parse_list(value: &str) -> Result<Vec<SourceSpec>> {
        split_entries(value)
            .into_iter()
            .filter(|e| !e.is_empty())
            .map(|entry| Self::parse_entry(&entry))
            .collect()
    }

    fn parse_entry(entry: &str) -> Result<SourceSpec> {
        let invalid = || ConfigError::InvalidValue {
            field: "complete".into(),
            value: entry.to_string(),
        };

        let (body, max_matches) = match entry.rsplit_once('^') {
            Some((body, cap)) if !cap.is_empty() && cap.bytes().all(|b| b.is_ascii_digit()) => {
                (body, cap.parse::<usize>().map_err(|_| invalid())?)
            }
            _ => (entry, 0),
        };

        let mut chars = body.chars();
        let Some(letter) = chars.next() else {
            return Err(invalid().into());
        };
        let param = chars.as_str().trim();
        let param = (!param.is_empty()).then(|| param.to_string());

        let kind = match letter {
            '.' => SourceKind::CurrentBuffer,
            'w' => SourceKind::WindowBuffers,
            'b' => SourceKind::ListedBuffers,
            'u' => SourceKind::UnloadedBuffers,
            'U' => SourceKind::UnlistedBuffers,
            'k' => SourceKind::Dictionary(param),
            's' => SourceKind::Thesaurus(param),
            'F' => SourceKind::Function(param),
            'o' => SourceKind::Omni,
            'i' => SourceKind::Includes,
            'd' => SourceKind::Defines,
            'f' => SourceKind::BufferNames,
            't' | ']' => SourceKind::Tags,
            _ => return Err(invalid().into()),
        };
        Ok(SourceSpec { kind, max_matches })
    }
}

fn split_entries(value: &str) -> Vec<String> {
    let mut entries = Vec::new();
    let mut entry = String::new();
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&',') => {
                entry.push(',');
                chars.next();
            }
            ',' => entries.push(std::mem::take(&mut entry)),
            c => entry.push(c),
        }
    }
    entries.push(entry);
    entries.into_iter().map(|e| e.trim().to_string()).collect()
}

/// Start column reported by a callback source for this session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartCol {
    /// Not probed yet.
    #[default]
    Unknown,
    /// The callback declined; it contributes nothing this session.
    Cancelled,
    Column(usize),
}

/// A buffer the scan can visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferRef {
    Current,
    Other(usize),
}

/// One step of work handed out by the multiplexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanUnit {
    Buffer(BufferRef),
    Dictionary { files: WordFiles, thesaurus: bool },
    Function { name: Option<String>, omni: bool },
    Tags,
    Includes { defines: bool },
    BufferNames,
}

/// Walks the source list for one session.
#[derive(Debug, Default)]
pub struct SourceMultiplexer {
    specs: Vec<SourceSpec>,
    start_cols: Vec<StartCol>,
    refresh_always: Vec<bool>,
    next_spec: usize,
    /// Source index of the unit being scanned.
    current: Option<usize>,
    /// Buffers still to visit for the current `w`/`b`/`u`/`U` entry.
    queued_buffers: Vec<BufferRef>,
    scanned: HashSet<BufferRef>,
}

impl SourceMultiplexer {
    pub fn new(specs: Vec<SourceSpec>) -> Self {
        let n = specs.len();
        Self {
            specs,
            start_cols: vec![StartCol::Unknown; n],
            refresh_always: vec![false; n],
            ..Default::default()
        }
    }

    pub fn specs(&self) -> &[SourceSpec] {
        &self.specs
    }

    /// Index of the source whose unit is being scanned.
    pub fn current(&self) -> Option<usize> {
        self.current
    }

    pub fn start_col(&self, index: usize) -> StartCol {
        self.start_cols.get(index).copied().unwrap_or_default()
    }

    pub fn set_start_col(&mut self, index: usize, col: StartCol) {
        if let Some(slot) = self.start_cols.get_mut(index) {
            *slot = col;
        }
    }

    fn refresh_always(&self, index: usize) -> bool {
        self.refresh_always.get(index).copied().unwrap_or(false)
    }

    pub fn set_refresh_always(&mut self, index: usize, value: bool) {
        if let Some(slot) = self.refresh_always.get_mut(index) {
            *slot = value;
        }
    }

    /// Indexes of sources that asked to be refreshed on every leader change.
    pub fn refreshing_sources(&self) -> Vec<usize> {
        (0..self.specs.len())
            .filter(|&i| self.refresh_always(i))
            .collect()
    }

    /// Indexes of callback sources.
    pub fn callback_sources(&self) -> Vec<usize> {
        (0..self.specs.len())
            .filter(|&i| self.specs[i].kind.is_callback())
            .collect()
    }

    /// Remember that a buffer was scanned to the end.
    pub fn mark_scanned(&mut self, buf: BufferRef) {
        self.scanned.insert(buf);
    }

    /// Hand out the next unit of work, or `None` once the list is done.
    ///
    /// In whole-line mode only buffer entries are used.
    pub fn next_unit(
        &mut self,
        editor: &Editor,
        cfg: &CompletionConfig,
        line_mode: bool,
    ) -> Option<ScanUnit> {
        loop {
            if let Some(buf) = self.queued_buffers.pop() {
                if !self.scanned.contains(&buf) {
                    return Some(ScanUnit::Buffer(buf));
                }
                continue;
            }

            let index = self.next_spec;
            let spec = self.specs.get(index)?.clone();
            self.next_spec += 1;
            self.current = Some(index);
            trace!(index, kind = ?spec.kind, "next completion source");

            if line_mode && !spec.kind.is_buffer() {
                continue;
            }

            let unit = match spec.kind {
                SourceKind::CurrentBuffer => {
                    if self.scanned.contains(&BufferRef::Current) {
                        continue;
                    }
                    ScanUnit::Buffer(BufferRef::Current)
                }
                SourceKind::WindowBuffers => {
                    self.queue_buffers(editor, |b| b.is_visible());
                    continue;
                }
                SourceKind::ListedBuffers => {
                    self.queue_buffers(editor, |b| b.is_listed() && b.is_loaded());
                    continue;
                }
                SourceKind::UnloadedBuffers => {
                    self.queue_buffers(editor, |b| b.is_listed() && !b.is_loaded());
                    continue;
                }
                SourceKind::UnlistedBuffers => {
                    self.queue_buffers(editor, |b| !b.is_listed());
                    continue;
                }
                SourceKind::Dictionary(path) => ScanUnit::Dictionary {
                    files: word_files(path, &cfg.dictionary),
                    thesaurus: false,
                },
                SourceKind::Thesaurus(path) => ScanUnit::Dictionary {
                    files: word_files(path, &cfg.thesaurus),
                    thesaurus: true,
                },
                SourceKind::Function(name) => {
                    if self.start_col(index) == StartCol::Cancelled {
                        continue;
                    }
                    ScanUnit::Function {
                        name: name.or_else(|| cfg.completefunc.clone()),
                        omni: false,
                    }
                }
                SourceKind::Omni => {
                    if self.start_col(index) == StartCol::Cancelled {
                        continue;
                    }
                    ScanUnit::Function {
                        name: cfg.omnifunc.clone(),
                        omni: true,
                    }
                }
                SourceKind::Includes => ScanUnit::Includes { defines: false },
                SourceKind::Defines => ScanUnit::Includes { defines: true },
                SourceKind::BufferNames => ScanUnit::BufferNames,
                SourceKind::Tags => ScanUnit::Tags,
            };
            return Some(unit);
        }
    }

    fn queue_buffers<F>(&mut self, editor: &Editor, wanted: F)
    where
        F: Fn(&dyn super::provider::TextBuffer) -> bool,
    {
        // popped from the back, so push in reverse to keep buffer order
        self.queued_buffers = (0..editor.others.len())
            .rev()
            .filter(|&i| wanted(editor.others[i].as_ref()))
            .map(BufferRef::Other)
            .collect();
    }
}

fn word_files(param: Option<String>, option: &[String]) -> WordFiles {
    match param {
        Some(path) => WordFiles {
            paths: vec![path],
            exact: false,
        },
        None => WordFiles {
            paths: option.to_vec(),
            exact: false,
        },
    }
}

/// Key polling state carried through a collection run.
#[derive(Debug, Default)]
pub struct PollState {
    counter: u32,
    /// Navigation keys typed during the scan, applied by the engine after
    /// the current step.
    pub queued: Vec<Key>,
    /// A key that ends the session was typed.
    pub interrupted: bool,
}

impl PollState {
    /// Check for typed keys every `frequency` calls (0 checks every time).
    ///
    /// Navigation keys are taken from the input and queued; any other key
    /// except ^R marks the scan as interrupted and stays in the input.
    pub fn check(
        &mut self,
        keys: Option<&mut (dyn KeySource + 'static)>,
        mode: &ModeState,
        pum_visible: bool,
        frequency: u32,
    ) -> bool {
        self.counter += 1;
        if self.counter < frequency {
            return self.interrupted;
        }
        self.counter = 0;

        let Some(keys) = keys else {
            return self.interrupted;
        };
        if let Some(key) = keys.peek_key() {
            if mode.is_ctrl_x_key(key, pum_visible) && key != Key::Ctrl('x') && key != Key::Ctrl('r')
            {
                keys.take_key();
                self.queued.push(key);
            } else if !key.is_passive() && key != Key::Ctrl('r') {
                trace!(?key, "completion interrupted by typed key");
                self.interrupted = true;
            }
        }
        self.interrupted
    }
}

/// Everything a source needs to add candidates.
pub struct Collector<'a> {
    pub store: &'a mut CandidateStore,
    pub poll: &'a mut PollState,
    pub keys: Option<&'a mut (dyn KeySource + 'static)>,
    pub mode: &'a ModeState,
    pub pum_visible: bool,
    pub dir: Direction,
    /// Compare with the leader ignoring case.
    pub icase: bool,
    /// Typed text whose case is copied onto matches.
    pub infer_from: Option<&'a str>,
    pub source: Option<usize>,
    /// Duplicates keep the smallest distance score.
    pub keep_best_score: bool,
    /// Candidates added through this collector.
    pub added: usize,
}

impl Collector<'_> {
    /// Add a candidate as is. Returns whether it was new.
    pub fn add(&mut self, mut cand: Candidate) -> bool {
        if cand.source.is_none() {
            cand.source = self.source;
        }
        match self.store.insert(cand, self.dir, self.keep_best_score) {
            InsertOutcome::Added(_) => {
                self.added += 1;
                true
            }
            InsertOutcome::Duplicate(_) => false,
        }
    }

    /// Add a word found in text, applying case rules.
    pub fn add_word(
        &mut self,
        word: &str,
        fname: Option<&str>,
        flags: CandidateFlags,
        score: i32,
    ) -> bool {
        if word.is_empty() {
            return false;
        }
        let text = match self.infer_from {
            Some(typed) => infer_case(typed, word),
            None => word.to_string(),
        };
        let mut flags = flags;
        flags.set(CandidateFlags::ICASE, self.icase);
        let cand = Candidate::new(text)
            .with_flags(flags)
            .with_fname(fname.map(str::to_string))
            .with_score(score);
        self.add(cand)
    }

    /// Poll for typed keys; see [`PollState::check`].
    pub fn check_keys(&mut self, frequency: u32) -> bool {
        self.poll.check(
            self.keys.as_deref_mut(),
            self.mode,
            self.pum_visible,
            frequency,
        )
    }

    pub fn interrupted(&self) -> bool {
        self.poll.interrupted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{KeyQueue, LineBuffer};
    use crate::completion::mode::Submode;
    use crate::completion::provider::Position;

    #[test]
    fn test_parse_default_list() {
        let specs = SourceSpec::parse_list(".,w,b").unwrap();
        let kinds: Vec<_> = specs.iter().map(|s| s.kind.clone()).collect();
        assert_eq!(
            kinds,
            [
                SourceKind::CurrentBuffer,
                SourceKind::WindowBuffers,
                SourceKind::ListedBuffers
            ]
        );
    }

    #[test]
    fn test_parse_params_and_caps() {
        let specs = SourceSpec::parse_list("Fa^1, Fb,k/usr/share/dict/words^10,t,s").unwrap();
        assert_eq!(specs[0].kind, SourceKind::Function(Some("a".into())));
        assert_eq!(specs[0].max_matches, 1);
        assert_eq!(specs[1].kind, SourceKind::Function(Some("b".into())));
        assert_eq!(specs[1].max_matches, 0);
        assert_eq!(
            specs[2].kind,
            SourceKind::Dictionary(Some("/usr/share/dict/words".into()))
        );
        assert_eq!(specs[2].max_matches, 10);
        assert_eq!(specs[3].kind, SourceKind::Tags);
        assert_eq!(specs[4].kind, SourceKind::Thesaurus(None));
    }

    #[test]
    fn test_parse_escaped_comma() {
        let specs = SourceSpec::parse_list(r"kwords\,old.txt,.").unwrap();
        assert_eq!(
            specs[0].kind,
            SourceKind::Dictionary(Some("words,old.txt".into()))
        );
        assert_eq!(specs.len(), 2);
    }

    #[test]
    fn test_parse_rejects_unknown_letter() {
        assert!(SourceSpec::parse_list(".,x").is_err());
        assert!(SourceSpec::parse_list("").unwrap().is_empty());
    }

    fn editor() -> Editor {
        let mut shown = LineBuffer::from_text("shown", "one");
        shown.set_visible(true);
        let mut hidden = LineBuffer::from_text("hidden", "two");
        hidden.set_loaded(false);
        let mut scratch = LineBuffer::from_text("scratch", "three");
        scratch.set_listed(false);
        Editor::new(
            Box::new(LineBuffer::from_text("main", "zero")),
            Position::default(),
        )
        .with_buffers(vec![Box::new(shown), Box::new(hidden), Box::new(scratch)])
    }

    fn units(list: &str, line_mode: bool) -> Vec<ScanUnit> {
        let editor = editor();
        let cfg = CompletionConfig::default();
        let mut mux = SourceMultiplexer::new(SourceSpec::parse_list(list).unwrap());
        std::iter::from_fn(|| mux.next_unit(&editor, &cfg, line_mode)).collect()
    }

    #[test]
    fn test_buffer_entries_expand() {
        assert_eq!(
            units(".,w,b,u,U", false),
            [
                ScanUnit::Buffer(BufferRef::Current),
                ScanUnit::Buffer(BufferRef::Other(0)),
                ScanUnit::Buffer(BufferRef::Other(0)),
                ScanUnit::Buffer(BufferRef::Other(1)),
                ScanUnit::Buffer(BufferRef::Other(2)),
            ]
        );
    }

    #[test]
    fn test_line_mode_skips_non_buffer_entries() {
        assert_eq!(
            units(".,k,t,Ffoo", true),
            [ScanUnit::Buffer(BufferRef::Current)]
        );
    }

    #[test]
    fn test_scanned_buffers_are_skipped() {
        let editor = editor();
        let cfg = CompletionConfig::default();
        let mut mux = SourceMultiplexer::new(SourceSpec::parse_list(".,w").unwrap());
        mux.mark_scanned(BufferRef::Other(0));
        assert_eq!(
            mux.next_unit(&editor, &cfg, false),
            Some(ScanUnit::Buffer(BufferRef::Current))
        );
        assert_eq!(mux.next_unit(&editor, &cfg, false), None);
    }

    #[test]
    fn test_cancelled_callback_source_is_skipped() {
        let editor = editor();
        let cfg = CompletionConfig::default();
        let mut mux = SourceMultiplexer::new(SourceSpec::parse_list("Fa,Fb").unwrap());
        mux.set_start_col(0, StartCol::Cancelled);
        assert_eq!(
            mux.next_unit(&editor, &cfg, false),
            Some(ScanUnit::Function {
                name: Some("b".into()),
                omni: false
            })
        );
        assert_eq!(mux.current(), Some(1));
    }

    #[test]
    fn test_poll_queues_navigation_and_flags_interrupt() {
        let mode = ModeState::Active(Submode::Keyword);
        let mut keys = KeyQueue::from_keys([Key::Ctrl('n'), Key::Char('x')]);
        let mut poll = PollState::default();

        assert!(!poll.check(Some(&mut keys), &mode, false, 0));
        assert_eq!(poll.queued, [Key::Ctrl('n')]);
        assert!(poll.check(Some(&mut keys), &mode, false, 0));
        // the interrupting key stays in the input
        assert_eq!(keys.peek_key(), Some(Key::Char('x')));
    }

    #[test]
    fn test_poll_frequency() {
        let mode = ModeState::Active(Submode::Keyword);
        let mut keys = KeyQueue::from_keys([Key::Char('x')]);
        let mut poll = PollState::default();
        assert!(!poll.check(Some(&mut keys), &mode, false, 3));
        assert!(!poll.check(Some(&mut keys), &mode, false, 3));
        assert!(poll.check(Some(&mut keys), &mode, false, 3));
    }
}
