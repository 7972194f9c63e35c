//! Fuzzy scoring of a candidate against the leader, and the two orderings
//! used on the candidate ring.
//!
//! A match is any case-insensitive subsequence of the text. Among all ways
//! to place the pattern in the text the best scoring one counts:
//!
//! | event                                  | points |
//! |----------------------------------------|--------|
//! | base                                   | 100    |
//! | each letter before the first match     | -5 (at most -15) |
//! | each unmatched letter                  | -1     |
//! | match directly after the previous one  | +40    |
//! | match after a separator (`_ -./\` )    | +30    |
//! | lower-to-upper camel case boundary     | +30    |
//! | match on the first letter              | +15    |

use std::cmp::Ordering;

use super::candidate::{Candidate, Direction};
use super::store::CandidateStore;

const BASE_SCORE: i32 = 100;
const SEQUENTIAL_BONUS: i32 = 40;
const SEPARATOR_BONUS: i32 = 30;
const CAMEL_BONUS: i32 = 30;
const FIRST_LETTER_BONUS: i32 = 15;
const LEADING_LETTER_PENALTY: i32 = -5;
const MAX_LEADING_LETTER_PENALTY: i32 = -15;
const UNMATCHED_LETTER_PENALTY: i32 = -1;

/// Score `text` against `pattern`. Returns 0 when `pattern` is not a
/// subsequence of `text` (or is empty); any match scores at least 1.
pub fn fuzzy_score(text: &str, pattern: &str) -> i32 {
    let text: Vec<char> = text.chars().collect();
    let pat: Vec<char> = pattern.chars().map(fold).collect();
    if pat.is_empty() || pat.len() > text.len() {
        return 0;
    }
    let folded: Vec<char> = text.iter().copied().map(fold).collect();

    // best[j]: best score with the current pattern char matched at text[j]
    let mut best: Vec<Option<i32>> = (0..text.len())
        .map(|j| {
            (folded[j] == pat[0]).then(|| {
                let leading = (LEADING_LETTER_PENALTY * j as i32).max(MAX_LEADING_LETTER_PENALTY);
                leading + position_bonus(&text, j)
            })
        })
        .collect();

    for &pc in &pat[1..] {
        let mut next = vec![None; text.len()];
        let mut running: Option<i32> = None;
        for j in 0..text.len() {
            if j > 0 {
                // best placement of the previous char strictly before j-1
                if j >= 2 {
                    running = max_opt(running, best[j - 2]);
                }
                if folded[j] == pc {
                    let gap = running;
                    let adjacent = best[j - 1].map(|s| s + SEQUENTIAL_BONUS);
                    next[j] = max_opt(gap, adjacent).map(|s| s + position_bonus(&text, j));
                }
            }
        }
        best = next;
    }

    let Some(matched) = best.into_iter().flatten().max() else {
        return 0;
    };
    let unmatched = (text.len() - pat.len()) as i32;
    (BASE_SCORE + matched + UNMATCHED_LETTER_PENALTY * unmatched).max(1)
}

fn position_bonus(text: &[char], j: usize) -> i32 {
    if j == 0 {
        return FIRST_LETTER_BONUS;
    }
    let prev = text[j - 1];
    let cur = text[j];
    let mut bonus = 0;
    if prev.is_lowercase() && cur.is_uppercase() {
        bonus += CAMEL_BONUS;
    }
    if matches!(prev, '_' | ' ' | '-' | '.' | '/' | '\\') {
        bonus += SEPARATOR_BONUS;
    }
    bonus
}

fn fold(c: char) -> char {
    let mut lower = c.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(l), None) => l,
        _ => c,
    }
}

fn max_opt(a: Option<i32>, b: Option<i32>) -> Option<i32> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, None) => x,
        (None, y) => y,
    }
}

/// Higher fuzzy score first; equal scores keep their order.
pub fn compare_fuzzy(a: &Candidate, b: &Candidate) -> Ordering {
    b.score.cmp(&a.score)
}

/// Smaller line distance first.
pub fn compare_nearest(a: &Candidate, b: &Candidate) -> Ordering {
    a.score.cmp(&b.score)
}

/// Sort by fuzzy score, keeping the anchor in place.
pub fn sort_fuzzy(store: &mut CandidateStore, dir: Direction) {
    store.sort_by(dir, compare_fuzzy);
}

/// Sort by distance from the cursor. Candidates without a distance (score
/// 0, e.g. from other buffers) keep their position.
pub fn sort_nearest(store: &mut CandidateStore, dir: Direction) {
    store.sort_where(dir, |c| c.score > 0, compare_nearest);
}
