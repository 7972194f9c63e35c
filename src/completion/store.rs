//! The candidate ring.
//!
//! Candidates live in an arena and are linked through `next`/`prev` indices,
//! so a [`NodeId`] stays valid while other nodes are inserted around it.
//! While sources are still being scanned the list is linear (the last node
//! has no `next`); once collection is complete it is closed into a ring.

use std::cmp::Ordering;
use std::ops::{Index, IndexMut};

use super::candidate::{Candidate, CandidateFlags, Direction};

/// Stable handle to a candidate in a [`CandidateStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug)]
struct Node {
    cand: Candidate,
    next: Option<NodeId>,
    prev: Option<NodeId>,
}

/// Result of [`CandidateStore::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Added(NodeId),
    /// The text was already present; holds the existing node.
    Duplicate(NodeId),
}

#[derive(Debug, Default)]
pub struct CandidateStore {
    slots: Vec<Option<Node>>,
    free: Vec<usize>,
    first: Option<NodeId>,
    current: Option<NodeId>,
    len: usize,
}

impl CandidateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn first(&self) -> Option<NodeId> {
        self.first
    }

    pub fn current(&self) -> Option<NodeId> {
        self.current
    }

    pub fn set_current(&mut self, id: Option<NodeId>) {
        self.current = id;
    }

    pub fn contains(&self, id: NodeId) -> bool {
        matches!(self.slots.get(id.0), Some(Some(_)))
    }

    pub fn get(&self, id: NodeId) -> Option<&Candidate> {
        self.node(id).map(|n| &n.cand)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Candidate> {
        self.slots
            .get_mut(id.0)
            .and_then(|slot| slot.as_mut())
            .map(|n| &mut n.cand)
    }

    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.next)
    }

    pub fn prev(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.prev)
    }

    /// Step one node in `dir`.
    pub fn step(&self, id: NodeId, dir: Direction) -> Option<NodeId> {
        match dir {
            Direction::Forward => self.next(id),
            Direction::Backward => self.prev(id),
        }
    }

    pub fn is_first(&self, id: Option<NodeId>) -> bool {
        id.is_some() && id == self.first
    }

    pub fn is_cyclic(&self) -> bool {
        self.first.and_then(|f| self.prev(f)).is_some()
    }

    /// The last node of the list (the one before `first` in a ring).
    pub fn last(&self) -> Option<NodeId> {
        let first = self.first?;
        if let Some(p) = self.prev(first) {
            return Some(p);
        }
        let mut id = first;
        while let Some(n) = self.next(id) {
            id = n;
        }
        Some(id)
    }

    /// The node holding the original text.
    pub fn anchor(&self) -> Option<NodeId> {
        let first = self.first?;
        if self[first].is_original() {
            return Some(first);
        }
        self.ids().find(|&id| self[id].is_original())
    }

    /// Node ids in list order, starting at `first`.
    pub fn ids(&self) -> Ids<'_> {
        Ids {
            store: self,
            next: self.first,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Candidate)> {
        self.ids().map(move |id| (id, &self[id]))
    }

    /// Number of candidates excluding the anchor.
    pub fn match_count(&self) -> usize {
        self.iter().filter(|(_, c)| !c.is_original()).count()
    }

    /// Insert a candidate next to the current node.
    ///
    /// Unless the candidate carries [`CandidateFlags::DUP`], an existing
    /// non-original node with the same text makes this a no-op that reports
    /// [`InsertOutcome::Duplicate`]. When `keep_best_score` is set, a smaller
    /// positive score still replaces the existing node's score.
    pub fn insert(
        &mut self,
        cand: Candidate,
        dir: Direction,
        keep_best_score: bool,
    ) -> InsertOutcome {
        if !cand.flags.contains(CandidateFlags::DUP) {
            let existing = self
                .ids()
                .find(|&id| !self[id].is_original() && self[id].text == cand.text);
            if let Some(id) = existing {
                if keep_best_score {
                    let node = &mut self[id];
                    if cand.score > 0 && cand.score < node.score {
                        node.score = cand.score;
                    }
                }
                return InsertOutcome::Duplicate(id);
            }
        }

        let anchor = self
            .current
            .filter(|&c| self.contains(c))
            .or_else(|| self.last());
        let id = self.alloc(cand);
        match anchor {
            None => {
                self.first = Some(id);
            }
            Some(cur) => {
                let (prev, next) = match dir {
                    Direction::Forward => (Some(cur), self.next(cur)),
                    Direction::Backward => (self.prev(cur), Some(cur)),
                };
                self.link(prev, id, next);
                if prev.is_none() {
                    self.first = Some(id);
                }
            }
        }
        self.current = Some(id);
        InsertOutcome::Added(id)
    }

    /// Release every candidate.
    pub fn free_all(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.first = None;
        self.current = None;
        self.len = 0;
    }

    /// Close the list into a ring. Returns the number of candidates not
    /// counting the anchor.
    pub fn make_cyclic(&mut self) -> usize {
        let Some(first) = self.first else {
            return 0;
        };
        let mut last = first;
        let mut count = 0;
        while let Some(n) = self.next(last) {
            if n == first {
                break;
            }
            last = n;
            count += 1;
        }
        self.set_next(last, Some(first));
        self.set_prev(first, Some(last));
        count
    }

    /// Open the ring between the last and the first node.
    pub fn make_linear(&mut self) {
        let Some(first) = self.first else {
            return;
        };
        if let Some(last) = self.prev(first) {
            self.set_next(last, None);
            self.set_prev(first, None);
        }
    }

    /// Assign sequence numbers to the run of unnumbered nodes around the
    /// current node, counting on from the nearest numbered node behind it.
    pub fn update_sequence_numbers(&mut self, dir: Direction) {
        let Some(cur) = self.current else {
            return;
        };
        let back = match dir {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        };

        let mut number = 0;
        let mut found = self.step(cur, back);
        while let Some(id) = found {
            if self.is_first(Some(id)) {
                break;
            }
            if let Some(n) = self[id].number {
                number = n;
                break;
            }
            found = self.step(id, back);
        }

        let Some(start) = found else {
            return;
        };
        let mut walk = self.step(start, dir);
        while let Some(id) = walk {
            if self[id].number.is_some() {
                break;
            }
            number += 1;
            self[id].number = Some(number);
            walk = self.step(id, dir);
        }
    }

    /// Stable sort of every candidate except the anchor, which stays at the
    /// head (forward) or the tail (backward). Node ids are preserved, so the
    /// current node is still current afterwards, at its sorted place.
    pub fn sort_by<F>(&mut self, dir: Direction, compare: F)
    where
        F: FnMut(&Candidate, &Candidate) -> Ordering,
    {
        self.sort_where(dir, |_| true, compare);
    }

    /// Like [`sort_by`](Self::sort_by), but only candidates accepted by
    /// `movable` are reordered among the slots they occupy; the others keep
    /// their place.
    pub fn sort_where<M, F>(&mut self, dir: Direction, movable: M, mut compare: F)
    where
        M: Fn(&Candidate) -> bool,
        F: FnMut(&Candidate, &Candidate) -> Ordering,
    {
        let anchor = self.anchor();
        let mut order: Vec<NodeId> = self.ids().filter(|&id| Some(id) != anchor).collect();
        let slots: Vec<usize> = (0..order.len())
            .filter(|&i| movable(&self[order[i]]))
            .collect();
        if slots.len() < 2 {
            return;
        }
        let mut moving: Vec<NodeId> = slots.iter().map(|&i| order[i]).collect();
        moving.sort_by(|&a, &b| compare(&self[a], &self[b]));
        for (&slot, id) in slots.iter().zip(moving) {
            order[slot] = id;
        }

        if let Some(anchor) = anchor {
            match dir {
                Direction::Forward => order.insert(0, anchor),
                Direction::Backward => order.push(anchor),
            }
        }
        self.relink(&order);
    }

    /// Remove every candidate owned by `source`.
    ///
    /// Returns the node new candidates from that source should be inserted
    /// next to (in `dir`) so they land where the old ones were.
    pub fn remove_source(&mut self, source: usize, dir: Direction) -> Option<NodeId> {
        let rank = |c: &Candidate| c.source.map_or(-1, |s| s as i64);
        let target = source as i64;

        let mut insert_at = None;
        let mut doomed = Vec::new();
        for id in self.ids() {
            let r = rank(&self[id]);
            if r < target && (dir.is_forward() || insert_at.is_none()) {
                insert_at = Some(id);
            }
            if r == target {
                doomed.push(id);
            }
            if dir.is_forward() && r > target {
                break;
            }
        }

        for id in doomed {
            self.unlink(id);
        }
        insert_at
    }

    /// Unlink and release a single node.
    pub fn remove(&mut self, id: NodeId) {
        self.unlink(id);
    }

    /* -------------------------- internals -------------------------- */

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.slots.get(id.0).and_then(|slot| slot.as_ref())
    }

    fn alloc(&mut self, cand: Candidate) -> NodeId {
        let node = Node {
            cand,
            next: None,
            prev: None,
        };
        self.len += 1;
        match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(node);
                NodeId(idx)
            }
            None => {
                self.slots.push(Some(node));
                NodeId(self.slots.len() - 1)
            }
        }
    }

    fn link(&mut self, prev: Option<NodeId>, id: NodeId, next: Option<NodeId>) {
        self.set_prev(id, prev);
        self.set_next(id, next);
        if let Some(p) = prev {
            self.set_next(p, Some(id));
        }
        if let Some(n) = next {
            self.set_prev(n, Some(id));
        }
    }

    fn unlink(&mut self, id: NodeId) {
        let Some(node) = self.slots.get_mut(id.0).and_then(|slot| slot.take()) else {
            return;
        };
        self.free.push(id.0);
        self.len -= 1;

        let (prev, next) = (node.prev, node.next);
        // A single node ring points at itself.
        let prev = prev.filter(|&p| p != id);
        let next = next.filter(|&n| n != id);
        if let Some(p) = prev {
            self.set_next(p, next);
        }
        if let Some(n) = next {
            self.set_prev(n, prev);
        }
        if self.first == Some(id) {
            self.first = next;
        }
        if self.current == Some(id) {
            self.current = prev.or(next);
        }
        if self.len == 0 {
            self.first = None;
            self.current = None;
        }
    }

    fn relink(&mut self, order: &[NodeId]) {
        for (i, &id) in order.iter().enumerate() {
            let prev = order[(i + order.len() - 1) % order.len()];
            let next = order[(i + 1) % order.len()];
            self.set_prev(id, Some(prev));
            self.set_next(id, Some(next));
        }
        self.first = order.first().copied();
    }

    fn set_next(&mut self, id: NodeId, next: Option<NodeId>) {
        if let Some(Some(node)) = self.slots.get_mut(id.0) {
            node.next = next;
        }
    }

    fn set_prev(&mut self, id: NodeId, prev: Option<NodeId>) {
        if let Some(Some(node)) = self.slots.get_mut(id.0) {
            node.prev = prev;
        }
    }
}

impl Index<NodeId> for CandidateStore {
    type Output = Candidate;

    fn index(&self, id: NodeId) -> &Candidate {
        match self.node(id) {
            Some(node) => &node.cand,
            None => panic!("stale candidate id {id:?}"),
        }
    }
}

impl IndexMut<NodeId> for CandidateStore {
    fn index_mut(&mut self, id: NodeId) -> &mut Candidate {
        match self.get_mut(id) {
            Some(cand) => cand,
            None => panic!("stale candidate id {id:?}"),
        }
    }
}

/// Iterator over node ids in list order; stops at the end of a linear list
/// or when a ring comes back to the first node.
pub struct Ids<'a> {
    store: &'a CandidateStore,
    next: Option<NodeId>,
}

impl Iterator for Ids<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.next?;
        self.next = self
            .store
            .next(id)
            .filter(|&n| Some(n) != self.store.first);
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(words: &[&str]) -> CandidateStore {
        let mut store = CandidateStore::new();
        store.insert(Candidate::original("he", false), Direction::Forward, false);
        for w in words {
            store.insert(Candidate::new(*w), Direction::Forward, false);
        }
        store
    }

    fn texts(store: &CandidateStore) -> Vec<String> {
        store.iter().map(|(_, c)| c.text.clone()).collect()
    }

    #[test]
    fn test_forward_insert_order() {
        let store = store_with(&["hello", "help", "held"]);
        assert_eq!(texts(&store), ["he", "hello", "help", "held"]);
        assert_eq!(store.match_count(), 3);
    }

    #[test]
    fn test_backward_insert_moves_first() {
        let mut store = CandidateStore::new();
        store.insert(Candidate::original("x", false), Direction::Backward, false);
        store.insert(Candidate::new("one"), Direction::Backward, false);
        store.insert(Candidate::new("two"), Direction::Backward, false);
        assert_eq!(texts(&store), ["two", "one", "x"]);
        assert_eq!(store.anchor().map(|id| store[id].text.as_str()), Some("x"));
    }

    #[test]
    fn test_ring_closure() {
        let mut store = store_with(&["a1", "a2", "a3", "a4"]);
        assert_eq!(store.make_cyclic(), 4);
        assert!(store.is_cyclic());

        let ids: Vec<_> = store.ids().collect();
        for &start in &ids {
            let mut fwd = start;
            let mut back = start;
            for _ in 0..ids.len() {
                fwd = store.next(fwd).unwrap();
                back = store.prev(back).unwrap();
            }
            assert_eq!(fwd, start);
            assert_eq!(back, start);
        }

        // closing twice is harmless
        assert_eq!(store.make_cyclic(), 4);
        store.make_linear();
        assert!(!store.is_cyclic());
        assert_eq!(store.next(store.last().unwrap()), None);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut store = store_with(&["hello"]);
        let outcome = store.insert(Candidate::new("hello"), Direction::Forward, false);
        assert!(matches!(outcome, InsertOutcome::Duplicate(_)));
        assert_eq!(store.match_count(), 1);

        let dup = Candidate::new("hello").with_flags(CandidateFlags::DUP);
        assert!(matches!(
            store.insert(dup, Direction::Forward, false),
            InsertOutcome::Added(_)
        ));
        assert_eq!(store.match_count(), 2);
    }

    #[test]
    fn test_duplicate_of_anchor_text_is_added() {
        let mut store = store_with(&[]);
        let outcome = store.insert(Candidate::new("he"), Direction::Forward, false);
        assert!(matches!(outcome, InsertOutcome::Added(_)));
    }

    #[test]
    fn test_duplicate_keeps_best_score() {
        let mut store = CandidateStore::new();
        store.insert(Candidate::original("", false), Direction::Forward, false);
        store.insert(Candidate::new("w").with_score(7), Direction::Forward, true);
        let outcome = store.insert(Candidate::new("w").with_score(2), Direction::Forward, true);
        let InsertOutcome::Duplicate(id) = outcome else {
            panic!("expected duplicate");
        };
        assert_eq!(store[id].score, 2);
        store.insert(Candidate::new("w").with_score(5), Direction::Forward, true);
        assert_eq!(store[id].score, 2);
    }

    #[test]
    fn test_insert_keeps_unrelated_edges() {
        let mut store = store_with(&["a", "b", "c"]);
        let ids: Vec<_> = store.ids().collect();
        let (a, b, c) = (ids[1], ids[2], ids[3]);
        store.set_current(Some(a));
        let new = match store.insert(Candidate::new("x"), Direction::Forward, false) {
            InsertOutcome::Added(id) => id,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(store.next(a), Some(new));
        assert_eq!(store.next(new), Some(b));
        assert_eq!(store.next(b), Some(c));
        assert_eq!(store.prev(c), Some(b));
    }

    #[test]
    fn test_sequence_numbers_forward() {
        let mut store = store_with(&["a", "b", "c"]);
        store.make_cyclic();
        let ids: Vec<_> = store.ids().collect();
        store.set_current(Some(ids[2]));
        store.update_sequence_numbers(Direction::Forward);
        let numbers: Vec<_> = ids.iter().map(|&id| store[id].number).collect();
        assert_eq!(numbers, [Some(0), Some(1), Some(2), Some(3)]);
    }

    #[test]
    fn test_sequence_numbers_backward() {
        let mut store = CandidateStore::new();
        store.insert(Candidate::original("", false), Direction::Backward, false);
        store.insert(Candidate::new("near"), Direction::Backward, false);
        store.insert(Candidate::new("far"), Direction::Backward, false);
        store.make_cyclic();
        let near = store.ids().nth(1).unwrap();
        store.set_current(Some(near));
        store.update_sequence_numbers(Direction::Backward);
        let by_text = |t: &str| store.iter().find(|(_, c)| c.text == t).unwrap().1.number;
        assert_eq!(by_text("near"), Some(1));
        assert_eq!(by_text("far"), Some(2));
    }

    #[test]
    fn test_sort_pins_anchor() {
        let mut store = store_with(&["c", "a", "b"]);
        store.make_cyclic();
        let b = store.ids().nth(3).unwrap();
        store.set_current(Some(b));
        store.sort_by(Direction::Forward, |x, y| x.text.cmp(&y.text));
        assert_eq!(texts(&store), ["he", "a", "b", "c"]);
        assert!(store.is_cyclic());
        assert_eq!(store[b].text, "b");
        assert_eq!(store.current(), Some(b));

        store.sort_by(Direction::Backward, |x, y| y.text.cmp(&x.text));
        assert_eq!(texts(&store), ["c", "b", "a", "he"]);
    }

    #[test]
    fn test_sort_where_keeps_fixed_slots() {
        let mut store = store_with(&["d", "x", "a", "y", "c"]);
        store.make_cyclic();
        store.sort_where(
            Direction::Forward,
            |c| c.text != "x" && c.text != "y",
            |a, b| a.text.cmp(&b.text),
        );
        assert_eq!(texts(&store), ["he", "a", "x", "c", "y", "d"]);
    }

    #[test]
    fn test_remove_source_forward() {
        let mut store = CandidateStore::new();
        store.insert(Candidate::original("", false), Direction::Forward, false);
        for (text, src) in [("a1", 0), ("b1", 1), ("b2", 1), ("c1", 2)] {
            let mut cand = Candidate::new(text);
            cand.source = Some(src);
            store.insert(cand, Direction::Forward, false);
        }
        store.make_cyclic();
        let insert_at = store.remove_source(1, Direction::Forward).unwrap();
        assert_eq!(store[insert_at].text, "a1");
        assert_eq!(texts(&store), ["", "a1", "c1"]);

        store.set_current(Some(insert_at));
        let mut fresh = Candidate::new("b9");
        fresh.source = Some(1);
        store.insert(fresh, Direction::Forward, false);
        store.make_cyclic();
        assert_eq!(texts(&store), ["", "a1", "b9", "c1"]);
    }

    #[test]
    fn test_free_all() {
        let mut store = store_with(&["a", "b"]);
        store.free_all();
        assert!(store.is_empty());
        assert_eq!(store.first(), None);
        assert_eq!(store.ids().count(), 0);
    }
}
