//! Starting a session, walking the candidate ring and collecting new
//! candidates from the sources.

use tracing::{debug, trace, warn};

use super::CompletionEngine;
use crate::completion::candidate::{Candidate, CandidateFlags, Direction};
use crate::completion::fuzzy::sort_nearest;
use crate::completion::keys::Key;
use crate::completion::leader::{
    ceil_char_boundary, char_class, common_prefix_len, is_filename_char, is_ident_char,
    is_keyword_char, leading_white,
};
use crate::completion::mode::{ModeState, Submode, LOCAL_MESSAGE};
use crate::completion::options::CompleteOptions;
use crate::completion::provider::{KeySource, Position, SearchPattern};
use crate::completion::session::{ContMode, ContStatus, Session};
use crate::completion::sources::buffer::{BufferScan, ScanParams, Step, MAX_CONTINUED_PREFIX};
use crate::completion::sources::function::{self, Fetch, Probe};
use crate::completion::sources::{
    dictionary, external, filenames, register, BufferRef, Collector, PollState, ScanUnit,
    SourceKind, SourceMultiplexer, SourceSpec, StartCol,
};
use crate::completion::store::{CandidateStore, NodeId};
use crate::error::{CompletionError, ConfigError, Result, SourceError};

/// How candidates collected in one step are added.
#[derive(Debug, Clone, Copy)]
struct Settings {
    pum_visible: bool,
    dir: Direction,
    icase: bool,
    infer: bool,
    source: Option<usize>,
    keep_best_score: bool,
}

fn collector<'a>(
    store: &'a mut CandidateStore,
    poll: &'a mut PollState,
    keys: Option<&'a mut (dyn KeySource + 'static)>,
    mode: &'a ModeState,
    typed: Option<&'a str>,
    s: Settings,
) -> Collector<'a> {
    Collector {
        store,
        poll,
        keys,
        mode,
        pum_visible: s.pum_visible,
        dir: s.dir,
        icase: s.icase,
        infer_from: typed.filter(|_| s.infer),
        source: s.source,
        keep_best_score: s.keep_best_score,
        added: 0,
    }
}

fn key_direction(key: Key) -> Direction {
    if key.is_backward() {
        Direction::Backward
    } else {
        Direction::Forward
    }
}

/// Start of the run of characters before `cursor` accepted by `keep`.
fn run_start(line: &str, cursor: usize, keep: impl Fn(char) -> bool) -> usize {
    line.get(..cursor)
        .unwrap_or(line)
        .char_indices()
        .rev()
        .take_while(|&(_, c)| keep(c))
        .last()
        .map_or(cursor, |(i, _)| i)
}

impl CompletionEngine {
    /// Collect if needed, move to the next candidate and update the menu.
    /// Returns false when no session could be started.
    pub(super) fn complete(&mut self, key: Key, enable_pum: bool) -> Result<bool> {
        self.session.direction = key_direction(key);
        if !self.session.started && !self.start()? {
            return Ok(false);
        }

        self.session.shown = self.session.store.current();
        self.session.shows_dir = self.session.direction;

        let count = key.step_count(self.menu_height());
        if let Some(n) = self.next(true, count, key.inserts_match())? {
            if n > 1 {
                self.session.matches = n;
            }
        }
        self.session.store.set_current(self.session.shown);
        self.session.direction = self.session.shows_dir;

        let store = &self.session.store;
        let only_anchor = store.first().and_then(|f| store.next(f)) == store.first();
        let path_mode = matches!(
            self.mode.submode(),
            Some(Submode::PathPatterns | Submode::PathDefines)
        );
        if only_anchor && (self.length > 1 || self.adding() || (self.mode.is_ctrl_x() && !path_mode)) {
            // nothing found: a following ^X^N must not try to extend
            self.cont.remove(ContStatus::N_ADDS);
        }
        let s_ipos = store
            .current()
            .and_then(|id| store.get(id))
            .is_some_and(|c| c.flags.contains(CandidateFlags::CONT_S_IPOS));
        self.cont.set(ContStatus::S_IPOS, s_ipos);

        self.show_statusmsg();
        let interrupted = self.session.poll.interrupted;
        if enable_pum && !interrupted {
            self.show_pum();
        }
        self.was_interrupted = interrupted;
        self.session.poll.interrupted = false;
        Ok(true)
    }

    /// Begin a session: work out what was typed and add the anchor.
    fn start(&mut self) -> Result<bool> {
        let cursor = self.editor.cursor;
        self.session.pending = 0;
        self.lnum = cursor.line;

        if self.cont.contains(ContStatus::INTRPT) && self.cont_mode == ContMode::of(&self.mode) {
            self.continue_search();
        } else {
            self.cont &= ContStatus::LOCAL;
        }

        if !self.adding() {
            self.cont_mode = ContMode::of(&self.mode);
            if self.mode.is_ctrl_x() {
                self.cont = ContStatus::empty();
            }
            self.cont |= ContStatus::N_ADDS;
            self.startpos = cursor;
        }

        let empty_option = match self.mode.submode() {
            Some(Submode::Dictionary(files)) if files.paths.is_empty() => Some("dictionary"),
            Some(Submode::Thesaurus(files)) if files.paths.is_empty() => Some("thesaurus"),
            _ => None,
        };
        if let Some(option) = empty_option {
            self.mode = ModeState::Idle;
            self.msg = None;
            self.report(ConfigError::EmptyOption(option).into());
            return Ok(false);
        }

        let Some(pattern) = self.get_info()? else {
            return Ok(false);
        };

        let typed = pattern.text();
        self.session.icase = if self.cfg.infercase || self.opts.fuzzy() {
            self.cfg.ignorecase
        } else {
            self.ignorecase_for(typed)
        };
        let compiled = match self.collab.matcher.compile(&pattern, self.session.icase) {
            Ok(c) => c,
            Err(e) => {
                self.report(e);
                return Ok(false);
            }
        };

        if self.adding() {
            self.msg_pre = Some(" Adding");
            if self.mode.is_line_or_eval() {
                // the next line is completed on a line of its own
                self.startpos = Position::new(cursor.line, self.col);
                self.editor.insert_text("\n");
                self.length = 0;
                self.col = self.editor.cursor.col;
                self.lnum = self.editor.cursor.line;
            }
        } else {
            self.msg_pre = None;
            self.startpos.col = self.col;
        }
        self.msg = if self.cont.contains(ContStatus::LOCAL) {
            Some(LOCAL_MESSAGE)
        } else {
            self.mode.message(false)
        };

        let orig = self
            .editor
            .current_line()
            .get(self.col..self.col + self.length)
            .unwrap_or_default()
            .to_string();
        self.session.store.insert(
            Candidate::original(orig.clone(), self.cfg.ignorecase),
            self.session.direction,
            false,
        );
        debug!(
            col = self.col,
            length = self.length,
            orig = %orig,
            adding = self.adding(),
            icase = self.session.icase,
            "completion started"
        );
        self.session.orig_text = Some(orig);
        self.session.pattern = Some(pattern);
        self.session.compiled = Some(compiled);
        self.msg_extra = Some("-- Searching...".to_string());
        Ok(true)
    }

    /// Work out the start column, the length and the search pattern for the
    /// current submode. `None` means completion cannot start here.
    fn get_info(&mut self) -> Result<Option<SearchPattern>> {
        let line = self.editor.current_line().to_string();
        let cursor = self.editor.cursor.col.min(line.len());
        let submode = self.mode.submode().cloned().unwrap_or(Submode::Keyword);

        let (name, option) = match &submode {
            Submode::WholeLine => {
                self.col = leading_white(&line).min(cursor);
                self.length = cursor - self.col;
                let text = line.get(self.col..cursor).unwrap_or_default();
                return Ok(Some(SearchPattern::LinePrefix(text.to_string())));
            }
            Submode::Files => {
                self.col = run_start(&line, cursor, is_filename_char);
                return Ok(Some(self.typed_pattern(&line, cursor)));
            }
            Submode::Cmdline => {
                self.col = self
                    .collab
                    .cmdline
                    .as_deref()
                    .map_or(cursor, |g| g.find_start(&line, cursor).min(cursor));
                return Ok(Some(self.typed_pattern(&line, cursor)));
            }
            Submode::Spell => {
                let bad = self
                    .collab
                    .spell
                    .as_deref()
                    .and_then(|s| s.bad_word_start(&line, cursor));
                let start = bad.unwrap_or_else(|| run_start(&line, cursor, is_keyword_char));
                self.col = if start >= cursor { cursor } else { start };
                return Ok(Some(self.typed_pattern(&line, cursor)));
            }
            Submode::Function(name) => (name.clone(), "completefunc"),
            Submode::Omni(name) => (name.clone(), "omnifunc"),
            _ => return Ok(Some(self.normal_info(&line, cursor))),
        };

        let Some(name) = name else {
            self.report(ConfigError::EmptyOption(option).into());
            return Ok(None);
        };
        let Some(cb) = self.collab.callback_mut(&name) else {
            self.report(ConfigError::MissingCallback(name).into());
            return Ok(None);
        };
        match function::probe_start(&name, cb, &mut self.editor) {
            Probe::Start(col) => {
                self.col = col;
                self.session.refresh_always = false;
                Ok(Some(self.typed_pattern(&line, cursor)))
            }
            Probe::NotNow => Ok(None),
            Probe::CancelMode => {
                self.mode = ModeState::Idle;
                self.msg = None;
                Ok(None)
            }
            Probe::Mutated => {
                self.report(SourceError::ExternalMutation { source: name }.into());
                Ok(None)
            }
        }
    }

    /// Set `length` from `col` and use the typed text as the pattern.
    fn typed_pattern(&mut self, line: &str, cursor: usize) -> SearchPattern {
        self.length = cursor.saturating_sub(self.col);
        SearchPattern::Keyword {
            prefix: line.get(self.col..cursor).unwrap_or_default().to_string(),
            min_tail: 0,
        }
    }

    /// Keyword-like submodes: the word before the cursor, or the text being
    /// extended when adding.
    fn normal_info(&mut self, line: &str, cursor: usize) -> SearchPattern {
        let defines = matches!(self.mode.submode(), Some(Submode::PathDefines));
        if self.cont.contains(ContStatus::SOL) || defines {
            if !self.adding() {
                self.col = run_start(line, cursor, is_ident_char);
                self.length = cursor - self.col;
            }
            let text = line.get(self.col..self.col + self.length).unwrap_or_default();
            return SearchPattern::LinePrefix(text.to_string());
        }

        if self.adding() {
            let text = line.get(self.col..self.col + self.length).unwrap_or_default();
            let at = line.get(self.col..).and_then(|s| s.chars().next());
            let before = line.get(..self.col).and_then(|s| s.chars().next_back());
            return SearchPattern::Continued {
                text: text.to_string(),
                word_start: at.is_some_and(is_keyword_char)
                    && !before.is_some_and(is_keyword_char),
            };
        }

        let prev = line.get(..cursor).and_then(|s| s.chars().next_back());
        let class = match prev {
            Some(c) if char_class(c) >= 2 => char_class(c),
            _ => {
                // nothing typed: any word of two or more characters
                self.col = cursor;
                self.length = 0;
                return SearchPattern::Keyword {
                    prefix: String::new(),
                    min_tail: 2,
                };
            }
        };
        self.col = run_start(line, cursor, |c| char_class(c) == class);
        self.length = cursor - self.col;
        SearchPattern::Keyword {
            prefix: line[self.col..cursor].to_string(),
            min_tail: usize::from(self.length == 1),
        }
    }

    /// ^X^N after a completed word: extend it with what follows the match.
    fn continue_search(&mut self) {
        self.cont.remove(ContStatus::INTRPT);
        let line = self.editor.current_line().to_string();
        let cursor = self.editor.cursor;
        let path_mode = matches!(
            self.mode.submode(),
            Some(Submode::PathPatterns | Submode::PathDefines)
        );

        if self.mode.is_normal() || path_mode {
            if self.startpos.line != cursor.line {
                self.col = leading_white(&line);
                self.startpos = Position::new(cursor.line, self.col);
                self.cont.remove(ContStatus::SOL);
            } else {
                if self.cont.contains(ContStatus::S_IPOS) {
                    // the last word came from the start of a line
                    self.cont |= ContStatus::SOL;
                    let from = ceil_char_boundary(&line, self.startpos.col + self.length);
                    self.startpos.col = from + leading_white(&line[from..]);
                }
                self.col = self.startpos.col;
            }
            self.length = cursor.col.saturating_sub(self.col);
            if self.length > MAX_CONTINUED_PREFIX {
                self.cont.remove(ContStatus::SOL);
                self.col = ceil_char_boundary(&line, cursor.col - MAX_CONTINUED_PREFIX);
                self.length = cursor.col - self.col;
            }
            self.cont |= ContStatus::ADDING | ContStatus::N_ADDS;
            if self.length < 1 {
                self.cont &= ContStatus::LOCAL;
            }
        } else if self.mode.is_line_or_eval() {
            self.cont = ContStatus::ADDING | ContStatus::N_ADDS;
        } else {
            self.cont &= ContStatus::LOCAL;
        }
        trace!(col = self.col, length = self.length, cont = ?self.cont, "continuing completion");
    }

    /* ============================ navigation ============================ */

    /// Move `count` candidates in the shown direction, collecting more when
    /// `allow_get` is set, and put the result in the text.
    ///
    /// # Returns
    /// * `Ok(Some(n))` - collection ran and the ring now has `n` candidates
    /// * `Ok(None)` - no collection happened, or there is nothing to move to
    pub(super) fn next(&mut self, allow_get: bool, count: usize, insert: bool) -> Result<Option<usize>> {
        let started = self.session.started;
        if self.session.shown.is_none() {
            return Ok(None);
        }
        let noinsert = self.opts.contains(CompleteOptions::NOINSERT);
        let preinsert = self.opts.preinsert();

        if self.session.leader.is_some() && !self.session.shows_original() && !self.opts.fuzzy() {
            self.update_shown_match();
        }
        if allow_get && insert && (!self.get_longest || self.used_match) {
            self.delete_completed(false);
        }

        // with "longest" the first ^N stays on the common text
        let mut advance = count != 1 || !allow_get || !self.get_longest;
        if self.restarting {
            advance = false;
            self.restarting = false;
        }

        let num = match self.find_next_match(allow_get, count, advance) {
            Ok(n) => n,
            Err(CompletionError::ExhaustedDirection { pending }) => {
                trace!(pending, "no more candidates in this direction");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        if noinsert && !started && !preinsert {
            let orig = self.session.orig_text.clone().unwrap_or_default();
            if let Some(rest) = orig.get(self.compl_len()..).filter(|r| !r.is_empty()) {
                self.insert_bytes(rest);
            }
            self.used_match = false;
        } else if insert {
            if !self.get_longest || self.used_match {
                self.insert_shown(true);
            } else {
                let text = self
                    .session
                    .leader
                    .clone()
                    .or_else(|| self.session.orig_text.clone())
                    .unwrap_or_default();
                if let Some(rest) = text.get(self.compl_len()..).filter(|r| !r.is_empty()) {
                    self.insert_bytes(rest);
                }
            }
        } else {
            self.used_match = false;
        }

        if !allow_get {
            self.show_pum();
            // still collecting: the typed text must not match itself
            self.delete_completed(false);
        }

        self.enter_selects = if noinsert && !started {
            true
        } else {
            !insert && self.session.pum.is_some()
        };
        Ok(num)
    }

    fn find_next_match(&mut self, allow_get: bool, count: usize, advance: bool) -> Result<Option<usize>> {
        let no_select = self.opts.contains(CompleteOptions::NOSELECT);
        let fuzzy = self.opts.fuzzy();
        let mut num = None;
        let mut todo = count;
        let mut found: Option<NodeId> = None;

        while todo > 0 {
            todo -= 1;
            let found_end;
            let Some(shown) = self.session.shown else {
                break;
            };
            let dir = self.session.shows_dir;

            if self.session.store.step(shown, dir).is_some() {
                let new = self.step_in_menu(shown, dir);
                let store = &self.session.store;
                found_end = match dir {
                    Direction::Forward => {
                        store.is_first(store.next(new)) || store.is_first(Some(new))
                    }
                    Direction::Backward => {
                        store.is_first(Some(shown)) || store.is_first(Some(new))
                    }
                };
                self.session.shown = Some(new);
            } else {
                if !allow_get {
                    if advance {
                        self.session.pending += dir.sign() * (todo as i32 + 1);
                    }
                    return Err(CompletionError::ExhaustedDirection {
                        pending: self.session.pending,
                    });
                }
                if !no_select && advance {
                    self.session.pending += dir.sign();
                }

                num = self.get_exp()?;

                // steps typed while collecting
                while self.session.pending != 0
                    && self.session.direction == self.session.shows_dir
                    && advance
                {
                    let Some(cur) = self.session.shown else {
                        break;
                    };
                    if self.session.pending > 0 {
                        if let Some(n) = self.session.store.next(cur) {
                            self.session.shown = Some(n);
                            self.session.pending -= 1;
                        }
                    }
                    let Some(cur) = self.session.shown else {
                        break;
                    };
                    match self.session.store.prev(cur) {
                        Some(p) if self.session.pending < 0 => {
                            self.session.shown = Some(p);
                            self.session.pending += 1;
                        }
                        _ => break,
                    }
                }
                found_end = false;
            }

            let Some(shown) = self.session.shown else {
                break;
            };
            let usable = self.session.store.get(shown).is_some_and(|c| {
                c.is_original() || (fuzzy && c.score > 0)
            }) || self.leader_accepts(shown);
            if usable {
                found = Some(shown);
            } else {
                todo += 1;
            }

            if found_end {
                if found.is_some() {
                    self.session.shown = found;
                    break;
                }
                // wrapped around: take the first usable one
                todo = 1;
            }
        }
        Ok(num)
    }

    /// One step in `dir`, skipping candidates the menu does not show.
    fn step_in_menu(&self, from: NodeId, dir: Direction) -> NodeId {
        let store = &self.session.store;
        let Some(pum) = &self.session.pum else {
            return store.step(from, dir).unwrap_or(from);
        };
        let mut id = from;
        loop {
            let Some(n) = store.step(id, dir) else {
                return id;
            };
            id = n;
            if store.next(id).is_none() || pum.contains(id) || store[id].is_original() {
                return id;
            }
        }
    }

    /// Move the shown candidate to one that fits the leader.
    fn update_shown_match(&mut self) {
        let Some(mut shown) = self.session.shown else {
            return;
        };
        let store = &self.session.store;
        while !self.leader_accepts(shown) {
            match store.next(shown) {
                Some(n) if !store.is_first(Some(n)) => shown = n,
                _ => break,
            }
        }

        let at_end = store.next(shown).is_none_or(|n| store.is_first(Some(n)));
        if !self.session.shows_dir.is_forward() && !self.leader_accepts(shown) && at_end {
            while !self.leader_accepts(shown) {
                match store.prev(shown) {
                    Some(p) if !store.is_first(Some(p)) => shown = p,
                    _ => break,
                }
            }
        }
        self.session.shown = Some(shown);
    }

    /// Poll for keys typed while collecting and apply them.
    pub(super) fn check_keys(&mut self, frequency: u32) -> Result<()> {
        let pum = self.pum_visible();
        self.session
            .poll
            .check(self.collab.keys.as_deref_mut(), &self.mode, pum, frequency);

        let queued = std::mem::take(&mut self.session.poll.queued);
        for key in queued {
            self.session.shows_dir = key_direction(key);
            let count = key.step_count(self.menu_height());
            self.next(false, count, key.inserts_match())?;
        }

        if self.session.pending != 0 && !self.opts.contains(CompleteOptions::NOINSERT) {
            let todo = self.session.pending.unsigned_abs() as usize;
            self.session.pending = 0;
            self.next(false, todo, true)?;
        }
        Ok(())
    }

    /* ============================ collection ============================ */

    /// Collect candidates until one is found, the sources run out or the
    /// user types something.
    ///
    /// # Returns
    /// * `Some(n)` - the ring was closed and holds `n` candidates
    /// * `None` - collection stopped early and the list stays open
    fn get_exp(&mut self) -> Result<Option<usize>> {
        let specialized = self.mode.is_ctrl_x() && !self.mode.is_line_or_eval();
        let line_mode = self.mode.is_line_or_eval();
        let list_mode = self.mode.is_normal() || line_mode;
        let local = self.cont.contains(ContStatus::LOCAL);
        let old = self.session.store.current();

        if !self.session.started {
            let specs = if local {
                vec![SourceSpec::new(SourceKind::CurrentBuffer)]
            } else {
                self.specs.clone()
            };
            self.session.source_prefix = vec![None; specs.len()];
            self.session.sources = SourceMultiplexer::new(specs);
            self.session.found_all = false;
            self.session.scan = None;
            self.session.unit = None;
            if self.mode.is_normal() && !local {
                self.probe_callback_sources();
            }
        }

        let mut found = false;
        let mut list_ended = false;
        loop {
            if list_mode && (!self.session.started || self.session.found_all) {
                match self.session.sources.next_unit(&self.editor, &self.cfg, line_mode) {
                    Some(unit) => self.begin_unit(unit),
                    None => {
                        list_ended = true;
                        break;
                    }
                }
            }
            // matches handed in from outside: nothing to search for
            if self.session.pattern.is_none() {
                break;
            }

            found = if specialized {
                self.collect_specialized()?
            } else {
                self.collect_unit()?
            };
            if found {
                self.hide_pum();
                if self.get_longest {
                    self.reduce_to_longest();
                }
            }

            if specialized || found {
                self.check_keys(0)?;
                if specialized || self.session.poll.interrupted {
                    break;
                }
                self.session.started = true;
            } else {
                if let Some(ScanUnit::Buffer(buf)) = self.session.unit {
                    self.session.sources.mark_scanned(buf);
                }
                self.session.started = false;
            }

            if !self.session.direction.is_forward() {
                let first = self.session.store.first();
                self.session.store.set_current(first);
            }
        }
        self.session.started = true;
        if list_mode && list_ended {
            found = false;
        }

        let mut num = None;
        if !found || specialized {
            num = Some(self.session.store.make_cyclic());
        }
        if let Some(old) = old {
            let moved = self.session.store.step(old, self.session.direction);
            self.session.store.set_current(moved.or(Some(old)));
        }
        if self.opts.contains(CompleteOptions::NEAREST) && !self.opts.fuzzy() && !self.opts.preinsert() {
            sort_nearest(&mut self.session.store, self.session.direction);
        }
        trace!(?num, found, list_ended, "collection step done");
        Ok(num)
    }

    fn begin_unit(&mut self, unit: ScanUnit) {
        self.session.found_all = false;
        self.session.scan = None;
        match &unit {
            ScanUnit::Buffer(BufferRef::Other(i)) => {
                let name = self.editor.others.get(*i).map(|b| b.name()).unwrap_or_default();
                self.notice = Some(format!("Scanning: {name}"));
                self.session.started = true;
            }
            ScanUnit::Dictionary { files, .. } => {
                self.notice = Some(format!("Scanning dictionary: {}", files.paths.join(",")));
            }
            ScanUnit::Tags => self.notice = Some("Scanning tags.".to_string()),
            _ => {}
        }
        trace!(?unit, source = ?self.session.sources.current(), "scanning");
        self.session.unit = Some(unit);
    }

    fn settings(&self, source: Option<usize>) -> Settings {
        Settings {
            pum_visible: self.pum_visible(),
            dir: self.session.direction,
            icase: self.session.icase,
            infer: self.cfg.ignorecase && self.cfg.infercase,
            source,
            keep_best_score: self.opts.contains(CompleteOptions::NEAREST),
        }
    }

    /// One step of the unit handed out by the source list. Returns whether
    /// anything new was found.
    fn collect_unit(&mut self) -> Result<bool> {
        let Some(unit) = self.session.unit.clone() else {
            self.session.found_all = true;
            return Ok(false);
        };
        let source = self.session.sources.current();
        let settings = self.settings(source);
        let adding = self.adding();
        let frequency = self.cfg.poll_frequency;
        let orig = self.session.orig_text.clone().unwrap_or_default();

        let added = match unit {
            ScanUnit::Buffer(target) => return Ok(self.step_buffer(target, settings)),
            ScanUnit::Function { .. } => {
                match source.and_then(|i| Some((i, self.callback_name(i)?))) {
                    Some((index, name)) => self.fetch_source(index, &name, &orig)?,
                    None => 0,
                }
            }
            unit => {
                let Self {
                    session,
                    collab,
                    mode,
                    editor,
                    ..
                } = self;
                let Session {
                    store,
                    poll,
                    orig_text,
                    compiled,
                    ..
                } = session;
                let mut out = collector(
                    store,
                    poll,
                    collab.keys.as_deref_mut(),
                    mode,
                    orig_text.as_deref(),
                    settings,
                );
                match unit {
                    ScanUnit::Dictionary { files, thesaurus } => {
                        if let Some(pattern) = compiled.as_deref() {
                            for err in dictionary::scan(&files, pattern, thesaurus, adding, frequency, &mut out) {
                                warn!(error = %err, "word file skipped");
                            }
                        }
                        out.added
                    }
                    ScanUnit::Tags => collab
                        .tags
                        .as_deref()
                        .map_or(0, |t| external::collect_tags(t, &orig, &mut out)),
                    ScanUnit::Includes { defines } => collab
                        .includes
                        .as_deref()
                        .map_or(0, |s| external::collect_includes(s, &orig, defines, &mut out)),
                    ScanUnit::BufferNames => register::collect_buffer_names(editor, &orig, &mut out),
                    ScanUnit::Buffer(_) | ScanUnit::Function { .. } => 0,
                }
            }
        };
        self.session.found_all = true;
        Ok(added > 0)
    }

    /// Search a buffer for the next new match.
    fn step_buffer(&mut self, target: BufferRef, settings: Settings) -> bool {
        let line_mode = self.mode.is_line_or_eval();
        let line_search = self.cont.contains(ContStatus::SOL) || line_mode;
        let keyword_mode = self.mode.is_normal();
        let adding = self.adding();
        let length = self.length;
        let start = self.startpos;
        let cursor_line = self.lnum;
        let nearest = self.opts.contains(CompleteOptions::NEAREST) && !self.opts.fuzzy();
        let joinspaces = self.cfg.joinspaces;

        let Self {
            session,
            collab,
            mode,
            editor,
            ..
        } = self;
        let Session {
            store,
            poll,
            orig_text,
            compiled,
            scan,
            found_all,
            ..
        } = session;
        let Some(pattern) = compiled.as_deref() else {
            *found_all = true;
            return false;
        };
        let scan = scan.get_or_insert_with(|| {
            BufferScan::new(target, settings.dir, start, editor.buffer.as_ref(), keyword_mode)
        });
        let params = ScanParams {
            pattern,
            line_search,
            line_mode,
            adding,
            length,
            start,
            cursor_line,
            nearest,
            joinspaces,
        };
        let mut out = collector(
            store,
            poll,
            collab.keys.as_deref_mut(),
            mode,
            orig_text.as_deref(),
            settings,
        );
        match scan.step(editor, &params, &mut out) {
            Step::Found => true,
            Step::Exhausted => {
                *found_all = true;
                false
            }
        }
    }

    /// Collect everything a specialized submode offers.
    fn collect_specialized(&mut self) -> Result<bool> {
        let Some(submode) = self.mode.submode().cloned() else {
            return Ok(false);
        };
        let settings = self.settings(None);
        let adding = self.adding();
        let frequency = self.cfg.poll_frequency;
        let orig = self.session.orig_text.clone().unwrap_or_default();
        let cmd_line = {
            let line = self.editor.current_line();
            format!("{}{}", line.get(..self.col).unwrap_or(line), orig)
        };

        let thesaurus = matches!(submode, Submode::Thesaurus(_));
        let defines = matches!(submode, Submode::PathDefines);

        let added = match submode {
            Submode::Function(Some(name)) | Submode::Omni(Some(name)) => {
                self.fetch_callback(None, &name, &orig)?
            }
            submode => {
                let Self {
                    session,
                    collab,
                    mode,
                    ..
                } = self;
                let Session {
                    store,
                    poll,
                    orig_text,
                    compiled,
                    ..
                } = session;
                let mut out = collector(
                    store,
                    poll,
                    collab.keys.as_deref_mut(),
                    mode,
                    orig_text.as_deref(),
                    settings,
                );
                match submode {
                    Submode::Files => filenames::collect(&orig, settings.icase, &mut out),
                    Submode::Dictionary(files) | Submode::Thesaurus(files) => {
                        if let Some(pattern) = compiled.as_deref() {
                            for err in dictionary::scan(&files, pattern, thesaurus, adding, frequency, &mut out) {
                                warn!(error = %err, "word file skipped");
                            }
                        }
                        out.added
                    }
                    Submode::Tags => collab
                        .tags
                        .as_deref()
                        .map_or(0, |t| external::collect_tags(t, &orig, &mut out)),
                    Submode::PathPatterns | Submode::PathDefines => collab
                        .includes
                        .as_deref()
                        .map_or(0, |s| external::collect_includes(s, &orig, defines, &mut out)),
                    Submode::Cmdline => collab
                        .cmdline
                        .as_deref()
                        .map_or(0, |g| external::collect_cmdline(g, &cmd_line, &orig, &mut out)),
                    Submode::Spell => collab
                        .spell
                        .as_deref()
                        .map_or(0, |s| external::collect_spell(s, &orig, &mut out)),
                    Submode::Register => collab
                        .registers
                        .as_deref()
                        .map_or(0, |r| register::collect_registers(r, &orig, adding, &mut out)),
                    _ => 0,
                }
            }
        };
        Ok(added > 0)
    }

    /// Set the leader to the longest text all candidates share.
    fn reduce_to_longest(&mut self) {
        let mut longest: Option<String> = None;
        for (_, cand) in self.session.store.iter().filter(|(_, c)| !c.is_original()) {
            longest = Some(match longest {
                None => cand.text.clone(),
                Some(l) => {
                    let n = common_prefix_len(&l, &cand.text, cand.is_icase());
                    l[..n].to_string()
                }
            });
        }
        if let Some(longest) = longest {
            self.session.leader = Some(longest);
            self.used_match = false;
        }
    }

    /* ========================== callback sources ========================== */

    fn callback_name(&self, index: usize) -> Option<String> {
        match &self.session.sources.specs().get(index)?.kind {
            SourceKind::Function(name) => name.clone().or_else(|| self.cfg.completefunc.clone()),
            SourceKind::Omni => self.cfg.omnifunc.clone(),
            _ => None,
        }
    }

    /// Ask every callback in the source list where its completion starts.
    /// The typed text is put back while they look.
    fn probe_callback_sources(&mut self) {
        let callbacks = self.session.sources.callback_sources();
        if callbacks.is_empty() {
            return;
        }
        let orig = self.session.orig_text.clone().unwrap_or_default();
        if let Some(rest) = orig.get(self.compl_len()..).filter(|r| !r.is_empty()) {
            self.insert_bytes(rest);
        }
        for index in callbacks {
            let col = self.probe_source(index);
            self.session.sources.set_start_col(index, col);
        }
        self.delete_completed(false);
    }

    fn probe_source(&mut self, index: usize) -> StartCol {
        let Some(name) = self.callback_name(index) else {
            return StartCol::Cancelled;
        };
        let Some(cb) = self.collab.callback_mut(&name) else {
            debug!(name, "no completion function registered");
            return StartCol::Cancelled;
        };
        match function::probe_start(&name, cb, &mut self.editor) {
            Probe::Start(col) => {
                let prefix = (col < self.col).then(|| {
                    let line = self.editor.current_line();
                    line.get(col..self.col).unwrap_or_default().to_string()
                });
                if let Some(slot) = self.session.source_prefix.get_mut(index) {
                    *slot = prefix;
                }
                StartCol::Column(col)
            }
            Probe::NotNow => StartCol::Cancelled,
            Probe::CancelMode => {
                self.session.sources.set_refresh_always(index, false);
                StartCol::Cancelled
            }
            Probe::Mutated => {
                self.report(SourceError::ExternalMutation { source: name }.into());
                StartCol::Cancelled
            }
        }
    }

    /// Fetch from the callback source at `index` for `typed`.
    fn fetch_source(&mut self, index: usize, name: &str, typed: &str) -> Result<usize> {
        let StartCol::Column(start) = self.session.sources.start_col(index) else {
            return Ok(0);
        };
        let base = match self.session.source_prefix.get(index).and_then(|p| p.as_deref()) {
            Some(prefix) => format!("{prefix}{typed}"),
            None => typed
                .get(start.saturating_sub(self.col)..)
                .unwrap_or(typed)
                .to_string(),
        };
        self.fetch_callback(Some(index), name, &base)
    }

    /// Call a completion function and add what it returns. With `index`
    /// the items belong to that source of the list.
    fn fetch_callback(&mut self, index: Option<usize>, name: &str, base: &str) -> Result<usize> {
        let Some(cb) = self.collab.callback_mut(name) else {
            return Ok(0);
        };
        match function::fetch(name, cb, base, &mut self.editor) {
            Fetch::Items {
                items,
                refresh_always,
            } => {
                match index {
                    Some(i) => self.session.sources.set_refresh_always(i, refresh_always),
                    None => self.session.refresh_always = refresh_always,
                }
                let settings = self.settings(index);
                let Self {
                    session,
                    collab,
                    mode,
                    ..
                } = self;
                let mut out = collector(
                    &mut session.store,
                    &mut session.poll,
                    collab.keys.as_deref_mut(),
                    mode,
                    None,
                    settings,
                );
                Ok(function::add_items(items, &mut out))
            }
            Fetch::Mutated => {
                self.report(
                    SourceError::ExternalMutation {
                        source: name.to_string(),
                    }
                    .into(),
                );
                Ok(0)
            }
            Fetch::NotNow | Fetch::CancelMode => Ok(0),
        }
    }

    /// Fetch again from sources that asked for it after the leader changed.
    pub(super) fn refresh_callback_sources(&mut self) -> Result<()> {
        let dir = self.session.direction;
        let leader = self.session.leader.clone().unwrap_or_default();
        self.session.store.make_linear();

        for index in self.session.sources.refreshing_sources() {
            let at = self.session.store.remove_source(index, dir);
            self.session.store.set_current(at);
            let start = self.probe_source(index);
            self.session.sources.set_start_col(index, start);
            let Some(name) = self.callback_name(index) else {
                continue;
            };
            if matches!(start, StartCol::Column(_)) {
                let added = self.fetch_source(index, &name, &leader)?;
                trace!(index, added, "callback source refreshed");
            }
        }

        self.session.matches = self.session.store.make_cyclic();
        let store = &self.session.store;
        if self.session.shown.is_none_or(|s| !store.contains(s)) {
            self.session.shown = store.anchor();
        }
        let current = store.current().filter(|&c| store.contains(c));
        if current.is_none() {
            let shown = self.session.shown;
            self.session.store.set_current(shown);
        }
        Ok(())
    }
}
