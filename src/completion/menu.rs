//! Menu projection: which candidates are shown, in what order, and which
//! one is highlighted.

use std::borrow::Cow;
use std::collections::HashMap;

use super::candidate::Candidate;
use super::leader::candidate_matches;
use super::provider::MenuItem;
use super::store::{CandidateStore, NodeId};

/// Filtering rules for one projection.
#[derive(Debug, Clone, Copy, Default)]
pub struct MenuFilter<'a> {
    pub leader: Option<&'a str>,
    /// Text typed before completion started. When the leader is back to it,
    /// a shown match that is not the anchor restarts from the top.
    pub orig_text: Option<&'a str>,
    /// The leader has upper case under smartcase: ignore icase flags.
    pub strict_case: bool,
    pub fuzzy: bool,
    /// Fuzzy matches are ordered by score.
    pub fuzzy_sort: bool,
    pub no_select: bool,
    pub forward: bool,
    /// Per-source caps, indexed by source; 0 means no cap. Empty outside
    /// source-list completion.
    pub caps: &'a [usize],
    /// Text a source needs in front of the leader because its matches start
    /// before the completion column.
    pub source_prefix: &'a [Option<String>],
}

impl MenuFilter<'_> {
    /// The leader as seen by `cand`'s source.
    pub fn leader_for(&self, cand: &Candidate) -> Option<Cow<'_, str>> {
        let leader = self.leader?;
        let prefix = cand
            .source
            .and_then(|s| self.source_prefix.get(s))
            .and_then(|p| p.as_deref());
        Some(match prefix {
            Some(p) => Cow::Owned(format!("{p}{leader}")),
            None => Cow::Borrowed(leader),
        })
    }

    /// Whether `cand` passes the leader test.
    pub fn accepts(&self, cand: &Candidate) -> bool {
        match self.leader_for(cand) {
            None => true,
            Some(leader) => {
                candidate_matches(cand, &leader, self.strict_case)
                    || (self.fuzzy && !leader.is_empty() && cand.score > 0)
            }
        }
    }

    fn cap(&self, source: Option<usize>) -> usize {
        match source {
            Some(s) if self.forward => self.caps.get(s).copied().unwrap_or(0),
            _ => 0,
        }
    }
}

/// The visible part of the candidate ring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    pub items: Vec<NodeId>,
    /// Highlighted row.
    pub selected: Option<usize>,
    /// The shown candidate after projection: when the one shown before was
    /// filtered out, the first visible entry after it takes its place, or
    /// the last visible one when nothing follows.
    pub shown: Option<NodeId>,
    rows: HashMap<NodeId, usize>,
}

impl Projection {
    /// Row of `id` in the menu, if it is shown.
    pub fn row_of(&self, id: NodeId) -> Option<usize> {
        self.rows.get(&id).copied()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.rows.contains_key(&id)
    }
}

/// Whether there are enough matches to show a menu at all.
pub fn enough_matches(store: &CandidateStore, menuone: bool) -> bool {
    let count = store
        .iter()
        .filter(|(_, c)| !c.is_original())
        .take(2)
        .count();
    if menuone { count >= 1 } else { count >= 2 }
}

/// Build the projection for the current ring. Returns `None` when nothing
/// is eligible.
pub fn project(
    store: &CandidateStore,
    shown: Option<NodeId>,
    filter: &MenuFilter<'_>,
) -> Option<Projection> {
    let mut items = Vec::new();
    let mut counts = vec![0usize; filter.caps.len()];
    let mut shown = shown;
    let mut selected = None;
    let mut shown_ok = false;
    let at_anchor = shown.and_then(|id| store.get(id)).is_some_and(Candidate::is_original);
    if !at_anchor && filter.leader.is_some() && filter.leader == filter.orig_text {
        let first = store.first();
        shown = if filter.no_select { first } else { first.and_then(|f| store.next(f)) };
    }
    let mut found_shown = false;
    let mut last_visible: Option<NodeId> = None;
    let mut first_visible: Option<NodeId> = None;
    let mut best_score = i32::MIN;

    for (id, cand) in store.iter() {
        if !cand.is_original() && filter.accepts(cand) {
            let cap = filter.cap(cand.source);
            let over_cap = match cand.source {
                Some(s) if cap > 0 => {
                    let n = &mut counts[s];
                    *n += 1;
                    *n > cap
                }
                _ => false,
            };

            if !over_cap {
                let row = items.len();
                items.push(id);
                if !shown_ok && !filter.fuzzy {
                    if Some(id) == shown || found_shown {
                        shown = Some(id);
                        found_shown = true;
                        shown_ok = true;
                    } else {
                        last_visible = Some(id);
                    }
                    selected = Some(row);
                } else if filter.fuzzy {
                    if row == 0 {
                        first_visible = Some(id);
                    }
                    if filter.fuzzy_sort && cand.score > best_score {
                        found_shown = true;
                        best_score = cand.score;
                        if !filter.no_select {
                            shown = Some(id);
                        }
                    }
                    if !shown_ok && Some(id) == shown && !filter.no_select {
                        selected = Some(row);
                        shown_ok = true;
                    }
                }
            }
        }

        if Some(id) == shown && !filter.fuzzy {
            found_shown = true;
            if cand.is_original() {
                shown_ok = true;
            }
        }
    }

    if items.is_empty() {
        return None;
    }
    if !shown_ok && !filter.fuzzy && found_shown && last_visible.is_some() {
        // nothing visible after the shown entry; `selected` is on the last row
        shown = last_visible;
        shown_ok = true;
    }
    if filter.fuzzy && !filter.fuzzy_sort && !filter.no_select && !shown_ok {
        shown = first_visible;
        shown_ok = true;
        selected = Some(0);
    }
    if !shown_ok {
        selected = None;
    }
    let rows = items.iter().enumerate().map(|(row, &id)| (id, row)).collect();
    Some(Projection {
        items,
        selected,
        shown,
        rows,
    })
}

/// Rows handed to the renderer.
pub fn menu_items(store: &CandidateStore, items: &[NodeId]) -> Vec<MenuItem> {
    items
        .iter()
        .map(|&id| {
            let c = &store[id];
            MenuItem {
                text: c.display_text().to_string(),
                kind: c.kind.clone(),
                extra: c.extra_text().map(str::to_string),
                info: c.info.clone(),
            }
        })
        .collect()
}
