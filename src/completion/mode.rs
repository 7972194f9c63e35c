//! Completion mode state machine
//!
//! After CTRL-X the next key picks a submode. While a submode is active
//! only its own keys (plus the menu keys) keep the session alive; anything
//! else moves the machine to `Finished`, which ends the session.
//!
//! ```text
//! Idle --^X--> Selecting --^K--> Active(Dictionary) --a--> Finished --> Idle
//!   \                   \--^Z--> Idle
//!    \--^N/^P--> Active(Keyword)
//! ```

use super::keys::Key;
use super::leader::{is_filename_char, is_ident_char, is_keyword_char, is_path_sep};
use crate::config::CompletionConfig;

/// Word list files of the dictionary and thesaurus submodes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WordFiles {
    pub paths: Vec<String>,
    /// Use the paths as given, without glob expansion.
    pub exact: bool,
}

/// The active completion behaviour, with whatever it needs to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submode {
    /// ^N / ^P over the configured source list.
    Keyword,
    WholeLine,
    Files,
    Tags,
    PathPatterns,
    PathDefines,
    Dictionary(WordFiles),
    Thesaurus(WordFiles),
    Cmdline,
    /// User defined completion through the named callback.
    Function(Option<String>),
    Omni(Option<String>),
    Spell,
    Register,
    Scroll,
    /// Matches handed in from outside.
    Eval,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ModeState {
    #[default]
    Idle,
    /// CTRL-X was typed, the submode is not known yet.
    Selecting,
    Active(Submode),
    /// The submode was left; the session stops on this key.
    Finished,
}

/// Result of the key typed after CTRL-X.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: ModeState,
    /// The key must not be inserted.
    pub consumed: bool,
}

impl Submode {
    /// Submodes completing identifiers accept only identifier characters
    /// while the menu is visible.
    pub fn wants_ident(&self) -> bool {
        matches!(
            self,
            Submode::Tags
                | Submode::PathPatterns
                | Submode::PathDefines
                | Submode::Dictionary(_)
                | Submode::Thesaurus(_)
        )
    }

    /// Line oriented submodes.
    pub fn is_line_or_eval(&self) -> bool {
        matches!(self, Submode::WholeLine | Submode::Eval)
    }

    /// Name reported by `complete_info()`.
    pub fn name(&self) -> &'static str {
        match self {
            Submode::Keyword => "keyword",
            Submode::WholeLine => "whole_line",
            Submode::Files => "files",
            Submode::Tags => "tags",
            Submode::PathPatterns => "path_patterns",
            Submode::PathDefines => "path_defines",
            Submode::Dictionary(_) => "dictionary",
            Submode::Thesaurus(_) => "thesaurus",
            Submode::Cmdline => "cmdline",
            Submode::Function(_) => "function",
            Submode::Omni(_) => "omni",
            Submode::Spell => "spell",
            Submode::Register => "register",
            Submode::Scroll => "scroll",
            Submode::Eval => "eval",
        }
    }

    pub fn message(&self) -> Option<&'static str> {
        Some(match self {
            Submode::Keyword => " Keyword completion (^N^P)",
            Submode::WholeLine => " Whole line completion (^L^N^P)",
            Submode::Files => " File name completion (^F^N^P)",
            Submode::Tags => " Tag completion (^]^N^P)",
            Submode::PathPatterns => " Path pattern completion (^N^P)",
            Submode::PathDefines => " Definition completion (^D^N^P)",
            Submode::Dictionary(_) => " Dictionary completion (^K^N^P)",
            Submode::Thesaurus(_) => " Thesaurus completion (^T^N^P)",
            Submode::Cmdline => " Command-line completion (^V^N^P)",
            Submode::Function(_) => " User defined completion (^U^N^P)",
            Submode::Omni(_) => " Omni completion (^O^N^P)",
            Submode::Spell => " Spelling suggestion (^S^N^P)",
            Submode::Register => " Register completion (^N^P)",
            Submode::Scroll => SCROLL_MESSAGE,
            Submode::Eval => return None,
        })
    }

    /// Keys that keep this submode going.
    fn own_keys(&self, key: Key) -> bool {
        let nav = key.is_ctrl('n') || key.is_ctrl('p');
        match self {
            Submode::Keyword => nav || key.is_ctrl('x'),
            Submode::Scroll => key.is_ctrl('y') || key.is_ctrl('e'),
            Submode::WholeLine => nav || key.is_ctrl('l'),
            Submode::Files => nav || key.is_ctrl('f'),
            Submode::Dictionary(_) => nav || key.is_ctrl('k'),
            Submode::Thesaurus(_) => nav || key.is_ctrl('t'),
            Submode::Tags => nav || key.is_ctrl(']'),
            Submode::PathPatterns => nav,
            Submode::PathDefines => nav || key.is_ctrl('d'),
            Submode::Cmdline => {
                nav || key.is_ctrl('v') || key.is_ctrl('q') || key.is_ctrl('x')
            }
            Submode::Function(_) => nav || key.is_ctrl('u'),
            Submode::Omni(_) => nav || key.is_ctrl('o'),
            Submode::Spell => nav || key.is_ctrl('s'),
            Submode::Eval => nav,
            Submode::Register => nav || key.is_ctrl('r'),
        }
    }
}

pub const SELECT_MESSAGE: &str = " ^X mode (^]^D^E^F^I^K^L^N^O^P^Rs^U^V^Y)";
pub const LOCAL_MESSAGE: &str = " Keyword Local completion (^N^P)";
const SCROLL_MESSAGE: &str = " (insert) Scroll (^E/^Y)";

/// Keys that select a submode after CTRL-X.
const SELECT_KEYS: &[char] = &[
    'x', 'y', 'e', 'l', 'f', ']', 'i', 'd', 'p', 'n', 't', 'v', 'q', 'u', 'o', 's', 'k', 'z',
    'r',
];

impl ModeState {
    pub fn submode(&self) -> Option<&Submode> {
        match self {
            ModeState::Active(m) => Some(m),
            _ => None,
        }
    }

    /// Idle and plain keyword completion behave the same way.
    pub fn is_normal(&self) -> bool {
        matches!(self, ModeState::Idle | ModeState::Active(Submode::Keyword))
    }

    /// Any state other than normal.
    pub fn is_ctrl_x(&self) -> bool {
        !self.is_normal()
    }

    pub fn is_line_or_eval(&self) -> bool {
        self.submode().is_some_and(Submode::is_line_or_eval)
    }

    /// Whether `key` is a completion key in this state.
    pub fn is_ctrl_x_key(&self, key: Key, pum_visible: bool) -> bool {
        if key.is_ctrl('r') && !matches!(self, ModeState::Active(Submode::Register)) {
            return true;
        }
        if pum_visible && key.is_menu_key() {
            return true;
        }
        match self {
            ModeState::Idle => Submode::Keyword.own_keys(key),
            ModeState::Selecting => {
                matches!(key, Key::Ctrl(c) if SELECT_KEYS.contains(&c)) || key == Key::Char('s')
            }
            ModeState::Active(mode) => mode.own_keys(key),
            ModeState::Finished => false,
        }
    }

    /// Whether typing `c` with the menu visible extends the leader instead
    /// of ending the session.
    pub fn accepts_char(&self, c: char) -> bool {
        match self.submode() {
            Some(m) if m.wants_ident() => is_ident_char(c),
            Some(Submode::Files) => is_filename_char(c) && !is_path_sep(c),
            Some(Submode::Cmdline | Submode::Omni(_)) => !c.is_control() && !c.is_whitespace(),
            Some(Submode::WholeLine) => !c.is_control(),
            _ => is_keyword_char(c),
        }
    }

    /// Pick the submode for the key typed after CTRL-X.
    pub fn after_ctrl_x(key: Key, cfg: &CompletionConfig) -> Transition {
        let active = |m| Transition {
            next: ModeState::Active(m),
            consumed: false,
        };
        let dictionary = |paths: &[String]| WordFiles {
            paths: paths.to_vec(),
            exact: false,
        };
        match key {
            Key::Ctrl('e') | Key::Ctrl('y') => active(Submode::Scroll),
            Key::Ctrl('l') => active(Submode::WholeLine),
            Key::Ctrl('f') => active(Submode::Files),
            Key::Ctrl('k') => active(Submode::Dictionary(dictionary(&cfg.dictionary))),
            Key::Ctrl('r') => active(Submode::Register),
            Key::Ctrl('t') => active(Submode::Thesaurus(dictionary(&cfg.thesaurus))),
            Key::Ctrl('u') => active(Submode::Function(cfg.completefunc.clone())),
            Key::Ctrl('o') => active(Submode::Omni(cfg.omnifunc.clone())),
            Key::Char('s') | Key::Ctrl('s') => active(Submode::Spell),
            Key::Ctrl(']') => active(Submode::Tags),
            Key::Ctrl('i') => active(Submode::PathPatterns),
            Key::Ctrl('d') => active(Submode::PathDefines),
            Key::Ctrl('v') | Key::Ctrl('q') => active(Submode::Cmdline),
            Key::Ctrl('z') => Transition {
                next: ModeState::Idle,
                consumed: true,
            },
            Key::Ctrl('n') | Key::Ctrl('p') => active(Submode::Keyword),
            _ => Transition {
                next: ModeState::Idle,
                consumed: false,
            },
        }
    }

    /// Name reported by `complete_info()`; empty when nothing is going on.
    pub fn info_name(&self, started: bool) -> &'static str {
        match self {
            ModeState::Selecting => "ctrl_x",
            ModeState::Active(Submode::Scroll) => "scroll",
            ModeState::Active(m) if started => m.name(),
            ModeState::Idle if started => "keyword",
            ModeState::Finished if started => "unknown",
            _ => "",
        }
    }

    /// Mode line text.
    pub fn message(&self, local: bool) -> Option<&'static str> {
        match self {
            ModeState::Selecting => Some(SELECT_MESSAGE),
            ModeState::Active(Submode::Keyword) | ModeState::Idle if local => Some(LOCAL_MESSAGE),
            ModeState::Active(m) => m.message(),
            ModeState::Idle => Submode::Keyword.message(),
            ModeState::Finished => None,
        }
    }
}
