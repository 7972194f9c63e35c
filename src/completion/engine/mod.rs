//! The completion engine
//!
//! [`CompletionEngine`] owns the text being edited and runs at most one
//! completion session at a time. Keys are fed in one at a time. A key either
//! drives the session (navigation, leader edits, accept, cancel) or ends it
//! and falls through to plain editing.
//!
//! While candidates are being collected the typed text is removed from the
//! buffer, so a scan never offers the word being completed.

mod collect;

use tracing::{debug, trace, warn};

use super::candidate::{Candidate, CompletionItem, Direction};
use super::fuzzy::{fuzzy_score, sort_fuzzy};
use super::info::{CompleteDone, CompleteInfo, DoneReason, InfoItem};
use super::keys::Key;
use super::leader::{candidate_matches, common_prefix_len};
use super::menu::{self, MenuFilter};
use super::mode::{ModeState, Submode, SELECT_MESSAGE};
use super::options::CompleteOptions;
use super::provider::{Collaborators, Editor, Position};
use super::session::{ContMode, ContStatus, Session};
use super::sources::SourceSpec;
use super::store::NodeId;
use crate::config::CompletionConfig;
use crate::error::{CompletionError, Result};

type DoneListener = Box<dyn FnMut(&CompleteDone)>;

/// Insert-mode completion over an [`Editor`].
pub struct CompletionEngine {
    cfg: CompletionConfig,
    opts: CompleteOptions,
    specs: Vec<SourceSpec>,
    editor: Editor,
    collab: Collaborators,
    mode: ModeState,
    session: Session,
    cont: ContStatus,
    cont_mode: ContMode,
    /// Where scanning starts; a match found here is the typed text itself.
    startpos: Position,
    /// Column the completed text starts at.
    col: usize,
    /// Length of the text that was searched for.
    length: usize,
    /// Line the session inserts on.
    lnum: usize,
    /// Column just after the last inserted text.
    ins_end_col: usize,
    /// The shown candidate was inserted and not edited since.
    used_match: bool,
    /// Insert only the longest common text of the matches.
    get_longest: bool,
    /// Enter accepts the selected entry instead of starting a new line.
    enter_selects: bool,
    /// Collection restarts after a leader change; don't move off the anchor.
    restarting: bool,
    was_interrupted: bool,
    /// ^X was typed in command-line completion.
    cmdline_ctrl_x: bool,
    /// Menu row highlighted the last time the menu was drawn.
    selected_item: Option<usize>,
    msg: Option<&'static str>,
    msg_pre: Option<&'static str>,
    msg_extra: Option<String>,
    notice: Option<String>,
    error: Option<String>,
    events: Vec<CompleteDone>,
    listener: Option<DoneListener>,
}

impl CompletionEngine {
    /// Create an engine for `editor`.
    ///
    /// # Arguments
    /// * `cfg` - completion options; `complete` and `completeopt` are parsed here
    /// * `editor` - the buffer being edited, its cursor and the other buffers
    /// * `collab` - pattern matcher, menu renderer and optional sources
    ///
    /// # Returns
    /// * `Result<Self>` - fails when an option value does not parse
    pub fn new(cfg: CompletionConfig, editor: Editor, collab: Collaborators) -> Result<Self> {
        let opts = CompleteOptions::parse(&cfg.completeopt)?;
        let specs = SourceSpec::parse_list(&cfg.complete)?;
        debug!(complete = %cfg.complete, completeopt = %cfg.completeopt, "completion engine created");
        Ok(Self {
            cfg,
            opts,
            specs,
            editor,
            collab,
            mode: ModeState::Idle,
            session: Session::default(),
            cont: ContStatus::empty(),
            cont_mode: ContMode::Normal,
            startpos: Position::default(),
            col: 0,
            length: 0,
            lnum: 0,
            ins_end_col: 0,
            used_match: false,
            get_longest: false,
            enter_selects: false,
            restarting: false,
            was_interrupted: false,
            cmdline_ctrl_x: false,
            selected_item: None,
            msg: None,
            msg_pre: None,
            msg_extra: None,
            notice: None,
            error: None,
            events: Vec::new(),
            listener: None,
        })
    }

    /// Replace the options. Takes effect for the next session.
    pub fn configure(&mut self, cfg: CompletionConfig) -> Result<()> {
        self.opts = CompleteOptions::parse(&cfg.completeopt)?;
        self.specs = SourceSpec::parse_list(&cfg.complete)?;
        self.cfg = cfg;
        Ok(())
    }

    pub fn config(&self) -> &CompletionConfig {
        &self.cfg
    }

    pub fn editor(&self) -> &Editor {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut Editor {
        &mut self.editor
    }

    pub fn collaborators_mut(&mut self) -> &mut Collaborators {
        &mut self.collab
    }

    pub fn mode(&self) -> &ModeState {
        &self.mode
    }

    /// Whether a session is running.
    pub fn is_active(&self) -> bool {
        self.session.started
    }

    /// Text between the start column and the cursor as the session sees it.
    pub fn current_leader(&self) -> String {
        if let Some(leader) = &self.session.leader {
            return leader.clone();
        }
        if !self.session.started {
            return String::new();
        }
        let line = self.editor.current_line();
        line.get(self.col..self.editor.cursor.col)
            .unwrap_or_default()
            .to_string()
    }

    /// Mode line, e.g. `" Adding Keyword completion (^N^P)"`.
    pub fn mode_message(&self) -> Option<String> {
        let msg = self.msg?;
        Some(format!("{}{}", self.msg_pre.unwrap_or_default(), msg))
    }

    /// Status next to the mode line, e.g. `"match 1 of 3"`.
    pub fn status_message(&self) -> Option<&str> {
        self.msg_extra.as_deref()
    }

    /// Last "Scanning ..." notice.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Error reported while handling the last key.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Call `f` every time a session ends.
    pub fn on_complete_done<F>(&mut self, f: F)
    where
        F: FnMut(&CompleteDone) + 'static,
    {
        self.listener = Some(Box::new(f));
    }

    /// Every session end seen so far.
    pub fn events(&self) -> &[CompleteDone] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<CompleteDone> {
        std::mem::take(&mut self.events)
    }

    /* ============================ key handling ============================ */

    /// Offer `key` to completion.
    ///
    /// # Returns
    /// * `Ok(true)` - completion consumed the key
    /// * `Ok(false)` - the key should get its ordinary editing meaning
    pub fn feed(&mut self, key: Key) -> Result<bool> {
        self.error = None;
        trace!(?key, mode = ?self.mode, "feed");

        if self.session.started
            && self.opts.menu_wanted()
            && self.editor.cursor.col >= self.col
            && self.session.has_shown_match()
        {
            if key == Key::Backspace
                && self.editor.cursor.col > self.col
                && self.backspace_leader()?
            {
                return Ok(true);
            }

            if !self.used_match {
                if key.is_ctrl('l') && (!self.mode.is_line_or_eval() || self.long_shown_match()) {
                    self.add_from_match()?;
                    return Ok(true);
                }
                if let Key::Char(c) = key {
                    if self.mode.accepts_char(c) {
                        self.add_leader(c)?;
                        return Ok(true);
                    }
                }
                if key.is_ctrl('y') || (self.enter_selects && key == Key::Enter) {
                    self.delete_completed(false);
                    self.insert_shown(false);
                }
            }
        }

        self.get_longest = false;
        if self.prep(key)? {
            return Ok(true);
        }
        self.dispatch(key)
    }

    /// Feed `key` and apply its editing meaning when completion did not
    /// consume it.
    pub fn handle_key(&mut self, key: Key) -> Result<()> {
        if self.feed(key)? {
            return Ok(());
        }
        match key {
            Key::Char(c) => {
                let mut buf = [0u8; 4];
                self.editor.insert_text(c.encode_utf8(&mut buf));
            }
            Key::Ctrl('i') => self.editor.insert_text("\t"),
            Key::Enter => self.editor.insert_text("\n"),
            Key::Backspace => self.editor.backspace(),
            _ => {}
        }
        Ok(())
    }

    pub fn feed_keys(&mut self, keys: &[Key]) -> Result<()> {
        for &key in keys {
            self.handle_key(key)?;
        }
        Ok(())
    }

    /// Accept the selected entry, as with CTRL-Y.
    pub fn accept(&mut self) -> Result<bool> {
        self.feed(Key::Ctrl('y'))
    }

    /// Go back to the typed text, as with CTRL-E.
    pub fn cancel(&mut self) -> Result<bool> {
        self.feed(Key::Ctrl('e'))
    }

    /// Update the mode for `key` and stop the session when the key is not
    /// part of it. Returns whether the key was consumed.
    fn prep(&mut self, key: Key) -> Result<bool> {
        let mut consumed = false;
        let prev_mode = self.mode.clone();
        let pum = self.pum_visible();

        if !key.is_ctrl('r') && self.mode.is_ctrl_x_key(key, pum) {
            self.msg_extra = None;
        }
        if key.is_passive() {
            return Ok(false);
        }

        if self.cmdline_ctrl_x && !key.is_ctrl('x') {
            self.cmdline_ctrl_x = false;
            let plain = key.is_ctrl('v')
                || key.is_ctrl('q')
                || key.is_ctrl('z')
                || (pum && key.is_menu_key())
                || !ModeState::Selecting.is_ctrl_x_key(key, pum);
            if plain {
                consumed = key.is_ctrl('z');
            } else {
                // another ^X submode: stop this one first
                self.prep(Key::Char(' '))?;
                self.mode = ModeState::Selecting;
            }
        }

        if self.mode == ModeState::Selecting || (self.mode.is_normal() && !self.session.started) {
            self.get_longest = self.opts.contains(CompleteOptions::LONGEST);
            self.used_match = true;
        }

        if self.mode == ModeState::Selecting {
            consumed = self.set_ctrl_x_mode(key);
        } else if self.mode.is_ctrl_x() && !self.mode.is_ctrl_x_key(key, pum) {
            self.mode = if self.mode == ModeState::Active(Submode::Scroll) {
                ModeState::Idle
            } else {
                ModeState::Finished
            };
            self.msg = None;
        }

        let ends_normal = self.mode.is_normal()
            && !key.is_ctrl('n')
            && !key.is_ctrl('p')
            && !key.is_ctrl('r')
            && !(pum && key.is_menu_key());
        if (ends_normal || self.mode == ModeState::Finished)
            && (self.session.started || self.mode == ModeState::Finished)
        {
            consumed = self.stop(key, &prev_mode, consumed);
        }

        let pum = self.pum_visible();
        if !self.mode.is_ctrl_x_key(key, pum) {
            self.cont = ContStatus::empty();
            self.cont_mode = ContMode::Normal;
        }
        Ok(consumed)
    }

    /// Pick the submode for the key typed after CTRL-X.
    fn set_ctrl_x_mode(&mut self, key: Key) -> bool {
        let transition = ModeState::after_ctrl_x(key, &self.cfg);
        self.mode = transition.next;

        match key {
            Key::Ctrl('n') | Key::Ctrl('p') => {
                if !self.cont.contains(ContStatus::INTRPT) {
                    self.cont |= ContStatus::LOCAL;
                } else if self.cont_mode != ContMode::Normal {
                    self.cont.remove(ContStatus::LOCAL);
                }
            }
            Key::Ctrl('r') => {
                // CTRL-R = inserts an expression, not register words
                let next = self.collab.keys.as_mut().and_then(|k| k.peek_key());
                if next == Some(Key::Char('=')) {
                    self.mode = ModeState::Idle;
                }
            }
            Key::Ctrl('x') => {
                if self.cont_mode != ContMode::Normal {
                    self.cont = ContStatus::empty();
                } else {
                    self.cont_mode = ContMode::Undefined;
                }
            }
            _ => {}
        }

        self.msg = match self.mode {
            ModeState::Idle if !key.is_ctrl('n') && !key.is_ctrl('p') => None,
            _ => self.mode.message(self.cont.contains(ContStatus::LOCAL)),
        };
        trace!(?key, mode = ?self.mode, "submode selected");
        transition.consumed
    }

    /// CTRL-X typed outside of a submode selection.
    fn ctrl_x(&mut self) {
        if matches!(self.mode, ModeState::Active(Submode::Cmdline)) {
            self.cmdline_ctrl_x = true;
            return;
        }
        if self.cont.contains(ContStatus::N_ADDS) {
            self.cont |= ContStatus::INTRPT;
        } else {
            self.cont = ContStatus::empty();
        }
        self.mode = ModeState::Selecting;
        self.msg = Some(SELECT_MESSAGE);
        self.msg_pre = None;
    }

    /// End the session. Returns whether `key` was consumed.
    fn stop(&mut self, key: Key, prev_mode: &ModeState, mut consumed: bool) -> bool {
        if self.preinsert_effect() {
            self.delete_completed(false);
        }

        let mut word = None;
        if (key.is_ctrl('y') || (self.enter_selects && key == Key::Enter)) && self.pum_visible() {
            word = self.session.shown_text().map(str::to_string);
            consumed = true;
        }

        if key.is_ctrl('e') {
            self.delete_completed(false);
            let text = match &self.session.leader {
                Some(leader) => Some(leader.clone()),
                None if self.session.store.first().is_some() => self.session.orig_text.clone(),
                None => None,
            };
            if let Some(rest) = text.as_deref().and_then(|t| t.get(self.compl_len()..)) {
                if !rest.is_empty() {
                    let rest = rest.to_string();
                    self.insert_bytes(&rest);
                }
            }
            consumed = true;
        }

        let reason = if word.is_some() {
            DoneReason::Accept
        } else if key.is_ctrl('e') {
            DoneReason::Cancel
        } else {
            DoneReason::Discard
        };
        let done = CompleteDone {
            word: word.unwrap_or_default(),
            mode: prev_mode.info_name(true).to_string(),
            reason,
        };
        debug!(word = %done.word, mode = %done.mode, %reason, "completion done");

        self.hide_pum();
        self.session = Session::default();
        self.mode = ModeState::Idle;
        self.enter_selects = false;
        self.selected_item = None;
        self.msg = None;
        self.msg_pre = None;

        if let Some(listener) = self.listener.as_mut() {
            listener(&done);
        }
        self.events.push(done);
        consumed
    }

    /// Run the completion meaning of `key`. Returns whether it was consumed.
    fn dispatch(&mut self, key: Key) -> Result<bool> {
        if key.is_ctrl('x') {
            self.ctrl_x();
            return Ok(true);
        }
        if self.completes_in_mode(key) {
            return self.docomplete(key);
        }
        if key.is_ctrl('n') || key.is_ctrl('p') {
            let plain = self.mode.is_normal()
                || self.mode == ModeState::Active(Submode::WholeLine);
            if self.specs.is_empty() && plain && !self.cont.contains(ContStatus::LOCAL) {
                return Ok(false);
            }
            return self.docomplete(key);
        }
        if key.is_menu_key() && self.pum_visible() {
            return self.docomplete(key);
        }
        if self.mode == ModeState::Active(Submode::Scroll) && (key.is_ctrl('y') || key.is_ctrl('e')) {
            return Ok(true);
        }
        Ok(false)
    }

    /// Keys that trigger collection in their own submode.
    fn completes_in_mode(&self, key: Key) -> bool {
        match (self.mode.submode(), key) {
            (Some(Submode::Tags), Key::Ctrl(']'))
            | (Some(Submode::Files), Key::Ctrl('f'))
            | (Some(Submode::PathDefines), Key::Ctrl('d'))
            | (Some(Submode::PathPatterns), Key::Ctrl('i'))
            | (Some(Submode::Dictionary(_)), Key::Ctrl('k'))
            | (Some(Submode::Thesaurus(_)), Key::Ctrl('t'))
            | (Some(Submode::WholeLine), Key::Ctrl('l'))
            | (Some(Submode::Function(_)), Key::Ctrl('u'))
            | (Some(Submode::Omni(_)), Key::Ctrl('o'))
            | (Some(Submode::Spell), Key::Char('s') | Key::Ctrl('s'))
            | (Some(Submode::Cmdline), Key::Ctrl('v') | Key::Ctrl('q')) => true,
            (Some(Submode::Register), Key::Ctrl('r')) => !self.session.started,
            _ => false,
        }
    }

    fn docomplete(&mut self, key: Key) -> Result<bool> {
        if !self.complete(key, true)? {
            self.cont = ContStatus::empty();
        }
        Ok(true)
    }

    /* ============================ leader edits ============================ */

    /// Backspace inside the completed text: shorten the leader. Returns
    /// false when the key should end the session instead.
    fn backspace_leader(&mut self) -> Result<bool> {
        let prev = {
            let line = self.editor.current_line();
            let cursor = self.editor.cursor.col.min(line.len());
            line.get(..cursor)
                .and_then(|s| s.char_indices().next_back())
                .map_or(0, |(i, _)| i)
        };
        let omni = matches!(self.mode.submode(), Some(Submode::Omni(_)));
        if prev < self.col
            || (prev == self.col && !omni)
            || self.mode == ModeState::Active(Submode::Eval)
        {
            return Ok(false);
        }

        if self.editor.cursor.col <= self.col + self.length || self.need_restart() {
            self.restart();
        }

        let leader = self.editor.current_line().get(self.col..prev).unwrap_or_default();
        self.session.leader = Some(leader.to_string());
        self.new_leader()?;
        if let Some(shown) = self.session.shown {
            self.session.store.set_current(Some(shown));
        }
        Ok(true)
    }

    /// Type `c` into the leader.
    fn add_leader(&mut self, c: char) -> Result<()> {
        if self.preinsert_effect() {
            self.delete_completed(false);
        }
        let mut buf = [0u8; 4];
        self.editor.insert_text(c.encode_utf8(&mut buf));

        if self.need_restart() {
            self.restart();
        }
        let leader = self
            .editor
            .current_line()
            .get(self.col..self.editor.cursor.col)
            .unwrap_or_default();
        self.session.leader = Some(leader.to_string());
        self.new_leader()
    }

    /// CTRL-L: copy one more character of the shown match into the leader.
    fn add_from_match(&mut self) -> Result<()> {
        let len = self.editor.cursor.col.saturating_sub(self.col);
        let Some(shown) = self.session.shown else {
            return Ok(());
        };
        let store = &self.session.store;
        let Some(cand) = store.get(shown) else {
            return Ok(());
        };

        let mut text = cand.text.as_str();
        if text.len() <= len {
            // at the anchor: use the first entry that fits the leader
            if !cand.is_original() {
                return Ok(());
            }
            let leader = self.session.leader.as_deref();
            let strict = self.strict_case();
            let mut found = None;
            let mut walk = store.next(shown);
            while let Some(id) = walk {
                if store.is_first(Some(id)) {
                    break;
                }
                if leader.is_none_or(|l| candidate_matches(&store[id], l, strict)) {
                    found = Some(store[id].text.as_str());
                    break;
                }
                walk = store.next(id);
            }
            match found {
                Some(t) if t.len() > len => text = t,
                _ => return Ok(()),
            }
        }

        let Some(c) = text.get(len..).and_then(|s| s.chars().next()) else {
            return Ok(());
        };
        self.add_leader(c)
    }

    /// The leader changed: put it in the text and narrow or recollect.
    fn new_leader(&mut self) -> Result<()> {
        self.hide_pum();
        self.delete_completed(true);
        let leader = self.session.leader.clone().unwrap_or_default();
        if let Some(rest) = leader.get(self.compl_len()..) {
            if !rest.is_empty() {
                self.insert_bytes(rest);
            }
        }
        self.used_match = false;

        if self.session.started {
            if let Some(anchor) = self.session.store.anchor() {
                self.session.store[anchor].text = leader.clone();
            }
            if !self.session.sources.refreshing_sources().is_empty() {
                self.refresh_callback_sources()?;
            }
        } else {
            // candidates were dropped; collect again without moving off the anchor
            self.restarting = true;
            if !self.complete(Key::Ctrl('n'), true)? {
                self.cont = ContStatus::empty();
            }
            self.restarting = false;
        }

        if self.opts.fuzzy() {
            self.set_fuzzy_scores();
            if !self.opts.contains(CompleteOptions::NOSORT) {
                sort_fuzzy(&mut self.session.store, self.session.direction);
                if self.opts.contains(CompleteOptions::NOINSERT)
                    && !self.opts.contains(CompleteOptions::NOSELECT)
                {
                    let first = self.session.store.first();
                    self.session.shown = if self.session.shows_dir.is_forward() {
                        first.and_then(|f| self.session.store.next(f))
                    } else {
                        first
                    };
                }
            }
        }

        self.enter_selects = !self.used_match && self.selected_item.is_some();
        self.show_pum();
        if self.session.pum.is_none() {
            self.enter_selects = false;
        } else if self.opts.preinsert() && !leader.is_empty() {
            self.insert_shown(true);
        }
        if self.refresh_always() {
            self.enter_selects = false;
        }
        Ok(())
    }

    fn set_fuzzy_scores(&mut self) {
        let Some(leader) = self.session.leader.clone().filter(|l| !l.is_empty()) else {
            return;
        };
        let ids: Vec<NodeId> = self.session.store.ids().collect();
        for id in ids {
            let prefix = self.source_prefix(id).unwrap_or_default().to_string();
            let cand = &mut self.session.store[id];
            cand.score = fuzzy_score(&cand.text, &format!("{prefix}{leader}"));
        }
    }

    /// Drop every candidate; the next collection starts from scratch.
    fn restart(&mut self) {
        debug!("completion restarted");
        self.hide_pum();
        self.session = Session::default();
        self.cont = ContStatus::empty();
        self.cont_mode = ContMode::Normal;
    }

    fn need_restart(&self) -> bool {
        self.was_interrupted
            || (matches!(
                self.mode.submode(),
                Some(Submode::Function(_) | Submode::Omni(_))
            ) && self.session.refresh_always)
    }

    fn refresh_always(&self) -> bool {
        let callback_mode = matches!(
            self.mode.submode(),
            Some(Submode::Function(_) | Submode::Omni(_))
        );
        (callback_mode && self.session.refresh_always)
            || !self.session.sources.refreshing_sources().is_empty()
    }

    /* ============================ text changes ============================ */

    /// Length of the typed text still in the buffer.
    fn compl_len(&self) -> usize {
        self.editor.cursor.col.saturating_sub(self.col)
    }

    /// Length of the leader, or of the typed text before one exists.
    fn leader_len(&self) -> usize {
        self.session
            .leader
            .as_ref()
            .or(self.session.orig_text.as_ref())
            .map_or(0, String::len)
    }

    fn adding(&self) -> bool {
        self.cont.contains(ContStatus::ADDING)
    }

    /// The shown match is previewed after the cursor.
    fn preinsert_effect(&self) -> bool {
        self.opts.preinsert() && self.editor.cursor.col < self.ins_end_col
    }

    /// Remove the inserted completion text, keeping the part of the typed
    /// text that is still wanted.
    fn delete_completed(&mut self, new_leader: bool) {
        let orig_col = match (&self.session.orig_text, &self.session.leader) {
            (Some(orig), Some(leader)) if new_leader => common_prefix_len(orig, leader, false),
            _ => 0,
        };
        let mut col = self.col + if self.adding() { self.length } else { orig_col };
        if self.preinsert_effect() {
            col += self.leader_len();
            self.editor.cursor.col = self.ins_end_col;
        }

        let cursor = self.editor.cursor;
        if cursor.line > self.lnum || cursor.col > col {
            let line_len = self.editor.buffer.line(self.lnum).map_or(0, str::len);
            self.editor
                .delete_to_cursor(Position::new(self.lnum, col.min(line_len)));
            self.ins_end_col = self.editor.cursor.col;
        }
    }

    fn insert_bytes(&mut self, text: &str) {
        self.editor.insert_text(text);
        self.ins_end_col = self.editor.cursor.col;
    }

    /// Insert the part of the shown match that is not in the text yet.
    fn insert_shown(&mut self, move_cursor: bool) {
        let Some(id) = self.session.shown else {
            return;
        };
        let Some(cand) = self.session.store.get(id) else {
            return;
        };
        let is_original = cand.is_original();
        let text = match self.source_prefix(id) {
            Some(p) => cand.text.strip_prefix(p).unwrap_or(&cand.text),
            None => cand.text.as_str(),
        }
        .to_string();

        let preinsert = self.opts.preinsert();
        let n = self.compl_len();
        if n < text.len() {
            if let Some(rest) = text.get(n..) {
                self.insert_bytes(rest);
                if preinsert && move_cursor && !text.contains('\n') {
                    let back = text.len().saturating_sub(self.leader_len());
                    self.editor.cursor.col = self.editor.cursor.col.saturating_sub(back);
                }
            }
        }
        // a preinserted match is still open for typing
        self.used_match = !(is_original || preinsert);
    }

    /// Text a callback source needs in front of the leader.
    fn source_prefix(&self, id: NodeId) -> Option<&str> {
        let source = self.session.store.get(id)?.source?;
        self.session.source_prefix.get(source)?.as_deref()
    }

    /// Whether the candidate passes the leader test.
    fn leader_accepts(&self, id: NodeId) -> bool {
        let Some(leader) = self.session.leader.as_deref() else {
            return true;
        };
        let Some(cand) = self.session.store.get(id) else {
            return false;
        };
        let strict = self.strict_case();
        match self.source_prefix(id) {
            Some(p) => candidate_matches(cand, &format!("{p}{leader}"), strict),
            None => candidate_matches(cand, leader, strict),
        }
    }

    /// Whether `text` is compared ignoring case, with smartcase applied.
    pub(super) fn ignorecase_for(&self, text: &str) -> bool {
        self.cfg.ignorecase && !(self.cfg.smartcase && text.chars().any(char::is_uppercase))
    }

    /// An upper-case leader under smartcase makes the leader test case
    /// sensitive again, even for matches collected ignoring case.
    fn strict_case(&self) -> bool {
        let Some(leader) = self.session.leader.as_deref() else {
            return false;
        };
        self.mode.is_normal()
            && !self.cfg.infercase
            && !self.opts.fuzzy()
            && !self.ignorecase_for(leader)
    }

    fn long_shown_match(&self) -> bool {
        self.session
            .shown_text()
            .is_some_and(|t| t.len() > self.editor.cursor.col.saturating_sub(self.col))
    }

    /* ================================ menu ================================ */

    fn pum_visible(&self) -> bool {
        self.session.pum.is_some()
    }

    fn menu_height(&self) -> Option<usize> {
        self.collab.menu.as_ref().and_then(|m| m.height())
    }

    /// Show the menu, or move its highlight to the shown candidate.
    fn show_pum(&mut self) {
        let menuone = self.opts.contains(CompleteOptions::MENUONE);
        if !self.opts.menu_wanted() || !menu::enough_matches(&self.session.store, menuone) {
            return;
        }

        let changed = match self.session.pum.as_mut() {
            Some(pum) => {
                let shown = self.session.shown;
                pum.selected = shown.and_then(|s| pum.row_of(s));
                false
            }
            None => {
                let caps: Vec<usize> = self
                    .session
                    .sources
                    .specs()
                    .iter()
                    .map(|s| s.max_matches)
                    .collect();
                let projection = {
                    let filter = MenuFilter {
                        leader: self.session.leader.as_deref(),
                        orig_text: self.session.orig_text.as_deref(),
                        strict_case: self.strict_case(),
                        fuzzy: self.opts.fuzzy(),
                        fuzzy_sort: !self.opts.contains(CompleteOptions::NOSORT),
                        no_select: self.opts.contains(CompleteOptions::NOSELECT),
                        forward: self.session.shows_dir.is_forward(),
                        caps: &caps,
                        source_prefix: &self.session.source_prefix,
                    };
                    menu::project(&self.session.store, self.session.shown, &filter)
                };
                let Some(projection) = projection else {
                    return;
                };
                self.session.shown = projection.shown;
                self.session.pum = Some(projection);
                true
            }
        };

        let Some(pum) = &self.session.pum else {
            return;
        };
        self.selected_item = pum.selected;
        trace!(items = pum.items.len(), selected = ?pum.selected, changed, "menu");
        if let Some(renderer) = self.collab.menu.as_mut() {
            let items = menu::menu_items(&self.session.store, &pum.items);
            renderer.display(&items, pum.selected, changed);
        }
    }

    fn hide_pum(&mut self) {
        if self.session.pum.take().is_some() {
            if let Some(renderer) = self.collab.menu.as_mut() {
                renderer.undisplay();
            }
        }
    }

    /// Set the status text for the shown candidate.
    fn show_statusmsg(&mut self) {
        let has_matches = self.session.has_matches();
        let hit_end = self.adding() && self.length > 1;
        let from_other_line = self.cont.contains(ContStatus::S_IPOS);
        let store = &mut self.session.store;
        let text = if !has_matches {
            if hit_end {
                "Hit end of paragraph".to_string()
            } else {
                "Pattern not found".to_string()
            }
        } else {
            let Some(cur) = store.current() else {
                return;
            };
            if store[cur].is_original() {
                "Back at original".to_string()
            } else if from_other_line {
                "Word from other line".to_string()
            } else if store.next(cur) == store.prev(cur) {
                store[cur].number = Some(1);
                "The only match".to_string()
            } else {
                if store[cur].number.is_none() {
                    store.update_sequence_numbers(self.session.direction);
                }
                match (store[cur].number, self.session.matches) {
                    (Some(n), total) if total > 0 => format!("match {n} of {total}"),
                    (Some(n), _) => format!("match {n}"),
                    (None, _) => return,
                }
            }
        };
        self.msg_extra = Some(text);
    }

    fn report(&mut self, err: CompletionError) {
        warn!(error = %err, "completion error");
        self.error = Some(err.to_string());
    }

    /* ============================= outside API ============================= */

    /// Start a session with matches supplied by the caller, replacing the
    /// text from `start_col` to the cursor.
    pub fn set_completion(&mut self, start_col: usize, items: Vec<CompletionItem>) -> Result<()> {
        if self.session.started || self.mode.is_ctrl_x() {
            self.prep(Key::Char(' '))?;
        }
        self.hide_pum();
        self.session = Session::default();
        self.get_longest = self.opts.contains(CompleteOptions::LONGEST);

        let cursor = self.editor.cursor;
        self.session.direction = Direction::Forward;
        self.col = start_col.min(cursor.col);
        self.lnum = cursor.line;
        self.length = cursor.col - self.col;
        let orig = self
            .editor
            .current_line()
            .get(self.col..cursor.col)
            .unwrap_or_default()
            .to_string();

        let icase = self.cfg.ignorecase;
        let store = &mut self.session.store;
        store.insert(Candidate::original(orig.clone(), icase), Direction::Forward, false);
        self.session.orig_text = Some(orig);
        self.mode = ModeState::Active(Submode::Eval);

        let total = items.len();
        for item in items {
            if let Some(cand) = item.into_candidate(icase) {
                store.insert(cand, Direction::Forward, false);
            }
        }
        self.session.matches = store.make_cyclic();
        self.session.started = true;
        self.used_match = true;
        self.cont = ContStatus::empty();
        store.set_current(store.first());
        debug!(total, matches = self.session.matches, col = self.col, "external matches");

        let no_select = self.opts.contains(CompleteOptions::NOSELECT) || self.get_longest;
        if self.opts.contains(CompleteOptions::NOINSERT) || no_select {
            self.complete(Key::Down, false)?;
            if no_select {
                self.complete(Key::Up, false)?;
            }
        } else {
            self.complete(Key::Ctrl('n'), false)?;
        }
        self.enter_selects = self.opts.contains(CompleteOptions::NOINSERT);
        if !self.session.poll.interrupted {
            self.show_pum();
        }
        Ok(())
    }

    /// Snapshot of the session for callers.
    pub fn complete_info(&self) -> CompleteInfo {
        let store = &self.session.store;
        let mode = self.mode.info_name(self.session.started).to_string();
        let ids: Vec<NodeId> = match &self.session.pum {
            Some(pum) => pum.items.clone(),
            None => store
                .iter()
                .filter(|(_, c)| !c.is_original())
                .map(|(id, _)| id)
                .collect(),
        };
        let selected = match &self.session.pum {
            Some(pum) => pum.selected,
            None => self
                .session
                .shown
                .and_then(|s| ids.iter().position(|&id| id == s)),
        };
        let completed = self
            .session
            .shown
            .filter(|_| self.used_match)
            .and_then(|id| store.get(id))
            .filter(|c| !c.is_original())
            .map(InfoItem::from);

        CompleteInfo {
            mode,
            pum_visible: self.session.pum.is_some(),
            items: ids.iter().filter_map(|&id| store.get(id)).map(InfoItem::from).collect(),
            selected: selected.map_or(-1, |s| s as i64),
            completed,
        }
    }
}
