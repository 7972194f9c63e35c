//! Introspection snapshot and the notification sent when a session ends.

use std::fmt;

use serde::Serialize;

use super::candidate::Candidate;

/// One menu entry as reported by [`CompleteInfo`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InfoItem {
    pub word: String,
    pub abbr: String,
    pub menu: String,
    pub kind: String,
    pub info: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data: Option<serde_json::Value>,
}

impl From<&Candidate> for InfoItem {
    fn from(c: &Candidate) -> Self {
        Self {
            word: c.text.clone(),
            abbr: c.abbr.clone().unwrap_or_default(),
            menu: c.menu.clone().unwrap_or_default(),
            kind: c.kind.clone().unwrap_or_default(),
            info: c.info.clone().unwrap_or_default(),
            user_data: c.user_data.clone(),
        }
    }
}

/// State of completion as seen from outside.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompleteInfo {
    /// Submode name, empty when idle.
    pub mode: String,
    pub pum_visible: bool,
    pub items: Vec<InfoItem>,
    /// Index into `items`, -1 when nothing is selected.
    pub selected: i64,
    /// The candidate currently inserted, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<InfoItem>,
}

impl CompleteInfo {
    pub fn idle() -> Self {
        Self {
            mode: String::new(),
            pum_visible: false,
            items: Vec::new(),
            selected: -1,
            completed: None,
        }
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DoneReason {
    /// ^Y, or Enter on a selected entry.
    Accept,
    /// ^E
    Cancel,
    /// Any other key.
    Discard,
}

impl fmt::Display for DoneReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DoneReason::Accept => "accept",
            DoneReason::Cancel => "cancel",
            DoneReason::Discard => "discard",
        })
    }
}

/// Sent to listeners whenever a session stops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompleteDone {
    /// The accepted text, empty unless accepted.
    pub word: String,
    pub mode: String,
    pub reason: DoneReason,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_serializes_like_a_dict() {
        let mut cand = Candidate::new("hello");
        cand.menu = Some("[buf]".into());
        let info = CompleteInfo {
            mode: "keyword".into(),
            pum_visible: true,
            items: vec![InfoItem::from(&cand)],
            selected: 0,
            completed: None,
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["mode"], "keyword");
        assert_eq!(json["items"][0]["word"], "hello");
        assert_eq!(json["items"][0]["menu"], "[buf]");
        assert_eq!(json["items"][0]["abbr"], "");
        assert!(json.get("completed").is_none());
        assert_eq!(CompleteInfo::idle().selected, -1);
    }

    #[test]
    fn test_done_reason_names() {
        assert_eq!(DoneReason::Cancel.to_string(), "cancel");
        let done = CompleteDone {
            word: String::new(),
            mode: "dictionary".into(),
            reason: DoneReason::Discard,
        };
        assert_eq!(serde_json::to_value(&done).unwrap()["reason"], "discard");
    }
}
