//! Candidate records and the item format accepted from completion callbacks.

use serde::{Deserialize, Deserializer, Serialize};

/// Direction in which the candidate ring is being walked or filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

impl Direction {
    pub fn is_forward(self) -> bool {
        self == Direction::Forward
    }

    pub fn sign(self) -> i32 {
        match self {
            Direction::Forward => 1,
            Direction::Backward => -1,
        }
    }
}

bitflags::bitflags! {
    /// Per-candidate flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CandidateFlags: u8 {
        /// The anchor: the text that was there before completion started.
        const ORIGINAL = 1;
        /// Always passes the leader test.
        const EQUAL = 1 << 1;
        /// Compared with the leader ignoring case.
        const ICASE = 1 << 2;
        /// Produced by a bulk source, cheap interrupt checks only.
        const FAST = 1 << 3;
        /// Kept even when the same text is already in the list.
        const DUP = 1 << 4;
        /// Text was joined with a word from the next line.
        const CONT_S_IPOS = 1 << 5;
    }
}

/// One proposed replacement text plus everything shown next to it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Candidate {
    pub text: String,
    pub abbr: Option<String>,
    pub menu: Option<String>,
    pub kind: Option<String>,
    pub info: Option<String>,
    /// File or buffer the match came from.
    pub fname: Option<String>,
    /// Index of the owning entry in the source list, `None` outside
    /// source-list completion.
    pub source: Option<usize>,
    /// 1-based position in the ring, assigned lazily. The anchor is 0.
    pub number: Option<usize>,
    pub score: i32,
    pub flags: CandidateFlags,
    pub user_data: Option<serde_json::Value>,
    pub abbr_hl: Option<String>,
    pub kind_hl: Option<String>,
}

impl Candidate {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// The anchor candidate holding the originally typed text.
    pub fn original(text: impl Into<String>, icase: bool) -> Self {
        let mut flags = CandidateFlags::ORIGINAL;
        flags.set(CandidateFlags::ICASE, icase);
        Self {
            text: text.into(),
            number: Some(0),
            flags,
            ..Default::default()
        }
    }

    pub fn with_flags(mut self, flags: CandidateFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn with_fname(mut self, fname: Option<String>) -> Self {
        self.fname = fname;
        self
    }

    pub fn with_score(mut self, score: i32) -> Self {
        self.score = score;
        self
    }

    pub fn is_original(&self) -> bool {
        self.flags.contains(CandidateFlags::ORIGINAL)
    }

    pub fn is_icase(&self) -> bool {
        self.flags.contains(CandidateFlags::ICASE)
    }

    /// Text shown in the menu: the abbreviation when there is one.
    pub fn display_text(&self) -> &str {
        self.abbr.as_deref().unwrap_or(&self.text)
    }

    /// Secondary label: the menu text, or the file name it came from.
    pub fn extra_text(&self) -> Option<&str> {
        self.menu.as_deref().or(self.fname.as_deref())
    }
}

/// A completion item as returned by a user callback.
///
/// Either a bare string or a mapping with the fields below. Flags accept
/// booleans as well as `0`/`1`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "ItemRepr")]
pub struct CompletionItem {
    pub word: String,
    pub abbr: Option<String>,
    pub menu: Option<String>,
    pub kind: Option<String>,
    pub info: Option<String>,
    pub user_data: Option<serde_json::Value>,
    pub icase: Option<bool>,
    pub dup: bool,
    pub empty: bool,
    pub equal: bool,
    pub abbr_hlgroup: Option<String>,
    pub kind_hlgroup: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ItemRepr {
    Word(String),
    Full(ItemFields),
}

#[derive(Deserialize)]
struct ItemFields {
    word: String,
    #[serde(default)]
    abbr: Option<String>,
    #[serde(default)]
    menu: Option<String>,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    info: Option<String>,
    #[serde(default)]
    user_data: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "flag_opt")]
    icase: Option<bool>,
    #[serde(default, deserialize_with = "flag")]
    dup: bool,
    #[serde(default, deserialize_with = "flag")]
    empty: bool,
    #[serde(default, deserialize_with = "flag")]
    equal: bool,
    #[serde(default)]
    abbr_hlgroup: Option<String>,
    #[serde(default)]
    kind_hlgroup: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FlagRepr {
    Bool(bool),
    Int(i64),
}

fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(match FlagRepr::deserialize(d)? {
        FlagRepr::Bool(b) => b,
        FlagRepr::Int(n) => n != 0,
    })
}

fn flag_opt<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
    flag(d).map(Some)
}

impl From<ItemRepr> for CompletionItem {
    fn from(repr: ItemRepr) -> Self {
        match repr {
            ItemRepr::Word(word) => CompletionItem::word(word),
            ItemRepr::Full(f) => CompletionItem {
                word: f.word,
                abbr: f.abbr,
                menu: f.menu,
                kind: f.kind,
                info: f.info,
                user_data: f.user_data,
                icase: f.icase,
                dup: f.dup,
                empty: f.empty,
                equal: f.equal,
                abbr_hlgroup: f.abbr_hlgroup,
                kind_hlgroup: f.kind_hlgroup,
            },
        }
    }
}

impl From<&str> for CompletionItem {
    fn from(word: &str) -> Self {
        CompletionItem::word(word)
    }
}

impl From<String> for CompletionItem {
    fn from(word: String) -> Self {
        CompletionItem::word(word)
    }
}

impl CompletionItem {
    pub fn word(word: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            ..Default::default()
        }
    }

    pub fn with_menu(mut self, menu: impl Into<String>) -> Self {
        self.menu = Some(menu.into());
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Convert into a candidate. Items with an empty word are dropped unless
    /// they ask to be kept.
    pub fn into_candidate(self, default_icase: bool) -> Option<Candidate> {
        if self.word.is_empty() && !self.empty {
            return None;
        }
        let mut flags = CandidateFlags::empty();
        flags.set(CandidateFlags::ICASE, self.icase.unwrap_or(default_icase));
        flags.set(CandidateFlags::DUP, self.dup);
        flags.set(CandidateFlags::EQUAL, self.equal);
        Some(Candidate {
            text: self.word,
            abbr: self.abbr.filter(|s| !s.is_empty()),
            menu: self.menu.filter(|s| !s.is_empty()),
            kind: self.kind.filter(|s| !s.is_empty()),
            info: self.info.filter(|s| !s.is_empty()),
            user_data: self.user_data,
            abbr_hl: self.abbr_hlgroup,
            kind_hl: self.kind_hlgroup,
            flags,
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_from_plain_string() {
        let item: CompletionItem = serde_json::from_str(r#""alpha""#).unwrap();
        assert_eq!(item.word, "alpha");
        assert!(!item.dup);
    }

    #[test]
    fn test_item_flags_accept_numbers() {
        let item: CompletionItem = serde_json::from_str(
            r#"{"word": "Beta", "menu": "[x]", "icase": 1, "dup": true, "equal": 0}"#,
        )
        .unwrap();
        assert_eq!(item.icase, Some(true));
        assert!(item.dup);
        assert!(!item.equal);

        let cand = item.into_candidate(false).unwrap();
        assert!(cand.is_icase());
        assert!(cand.flags.contains(CandidateFlags::DUP));
        assert_eq!(cand.extra_text(), Some("[x]"));
    }

    #[test]
    fn test_empty_word_dropped_unless_allowed() {
        assert!(CompletionItem::word("").into_candidate(false).is_none());
        let mut item = CompletionItem::word("");
        item.empty = true;
        assert!(item.into_candidate(false).is_some());
    }

    #[test]
    fn test_original_candidate() {
        let c = Candidate::original("he", true);
        assert!(c.is_original());
        assert!(c.is_icase());
        assert_eq!(c.number, Some(0));
        assert_eq!(c.display_text(), "he");
    }
}
