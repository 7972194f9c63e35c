//! State of one completion session and the flags that survive between
//! sessions so a completion can be continued.

use super::candidate::Direction;
use super::menu::Projection;
use super::mode::{ModeState, Submode};
use super::provider::{CompiledPattern, SearchPattern};
use super::sources::buffer::BufferScan;
use super::sources::{PollState, ScanUnit, SourceMultiplexer};
use super::store::{CandidateStore, NodeId};

bitflags::bitflags! {
    /// Continuation state carried from one session to the next.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ContStatus: u8 {
        /// ^X was typed while a continuable session existed.
        const INTRPT = 1;
        /// The session extends the previous match.
        const ADDING = 1 << 1;
        /// A following ^X<key> may continue this session.
        const N_ADDS = 1 << 2;
        /// The last match came from the next line.
        const S_IPOS = 1 << 3;
        /// Match only at the start of a line.
        const SOL = 1 << 4;
        /// Only the current buffer is scanned (^X^N / ^X^P).
        const LOCAL = 1 << 5;
    }
}

/// The mode a continuation must match.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ContMode {
    #[default]
    Normal,
    Mode(Submode),
    /// ^X^X was typed; nothing continues.
    Undefined,
}

impl ContMode {
    pub fn of(mode: &ModeState) -> Self {
        match mode {
            ModeState::Idle | ModeState::Active(Submode::Keyword) => ContMode::Normal,
            ModeState::Active(m) => ContMode::Mode(m.clone()),
            ModeState::Selecting | ModeState::Finished => ContMode::Undefined,
        }
    }
}

/// Everything that lives exactly as long as one session. Dropping it
/// releases every candidate.
#[derive(Default)]
pub struct Session {
    pub store: CandidateStore,
    /// The candidate shown in the text and highlighted in the menu.
    pub shown: Option<NodeId>,
    /// Direction candidates are collected in.
    pub direction: Direction,
    /// Direction the shown candidate moves in.
    pub shows_dir: Direction,
    /// Text between the start column and the cursor, once edited.
    pub leader: Option<String>,
    /// Text that was there when the session started.
    pub orig_text: Option<String>,
    pub pattern: Option<SearchPattern>,
    pub compiled: Option<Box<dyn CompiledPattern>>,
    pub icase: bool,
    /// Navigation steps owed to the user while collection is running.
    pub pending: i32,
    /// Total number of candidates, 0 while unknown.
    pub matches: usize,
    /// Collection ran at least once.
    pub started: bool,
    pub sources: SourceMultiplexer,
    /// The unit being collected from.
    pub unit: Option<ScanUnit>,
    /// Per source: text between a callback's own start column and the
    /// completion column.
    pub source_prefix: Vec<Option<String>>,
    /// Resumable scan of the buffer being searched.
    pub scan: Option<BufferScan>,
    /// The current buffer was scanned to the end.
    pub found_all: bool,
    pub poll: PollState,
    /// A function/omni callback asked to be called on every leader change.
    pub refresh_always: bool,
    /// What the menu shows, `None` when hidden.
    pub pum: Option<Projection>,
}

impl Session {
    /// Whether anything besides the anchor was found.
    pub fn has_matches(&self) -> bool {
        self.store.match_count() > 0
    }

    /// Whether the shown candidate is the anchor.
    pub fn shows_original(&self) -> bool {
        self.shown
            .and_then(|id| self.store.get(id))
            .is_some_and(|c| c.is_original())
    }

    /// False only when the shown node is alone in its ring.
    pub fn has_shown_match(&self) -> bool {
        match self.shown {
            None => true,
            Some(id) => self.store.next(id) != Some(id),
        }
    }

    pub fn shown_text(&self) -> Option<&str> {
        self.shown
            .and_then(|id| self.store.get(id))
            .map(|c| c.text.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::candidate::Candidate;
    use crate::completion::mode::WordFiles;

    #[test]
    fn test_cont_mode_of() {
        assert_eq!(ContMode::of(&ModeState::Idle), ContMode::Normal);
        assert_eq!(
            ContMode::of(&ModeState::Active(Submode::Keyword)),
            ContMode::Normal
        );
        assert_eq!(
            ContMode::of(&ModeState::Active(Submode::Dictionary(WordFiles::default()))),
            ContMode::Mode(Submode::Dictionary(WordFiles::default()))
        );
        assert_eq!(ContMode::of(&ModeState::Selecting), ContMode::Undefined);
    }

    #[test]
    fn test_shown_helpers() {
        let mut s = Session::default();
        let anchor = match s.store.insert(Candidate::original("he", false), Direction::Forward, false) {
            crate::completion::store::InsertOutcome::Added(id) => id,
            _ => unreachable!(),
        };
        s.store.make_cyclic();
        s.shown = Some(anchor);
        assert!(s.shows_original());
        // a lone anchor points at itself
        assert!(!s.has_shown_match());

        s.store.insert(Candidate::new("hello"), Direction::Forward, false);
        s.store.make_cyclic();
        assert!(s.has_shown_match());
        assert!(s.has_matches());
        assert_eq!(s.shown_text(), Some("he"));
    }
}
