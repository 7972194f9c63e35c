//! Leader handling: character classes used to find word boundaries, the
//! leader test, longest-common-prefix reduction and case inference.

use super::candidate::{Candidate, CandidateFlags};

/// Characters that make up a keyword.
pub fn is_keyword_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Characters allowed in an identifier.
pub fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || ('\u{c0}'..='\u{ff}').contains(&c)
}

/// Characters allowed in a file name.
pub fn is_filename_char(c: char) -> bool {
    c.is_alphanumeric() || "/.-_+,#$%~=".contains(c) || (c as u32) >= 0x100
}

pub fn is_path_sep(c: char) -> bool {
    c == '/' || (cfg!(windows) && c == '\\')
}

/// Rough character class: 0 blank, 1 punctuation, 2 word character, and a
/// distinct class per script block for CJK text so that words end where the
/// script changes.
pub fn char_class(c: char) -> u32 {
    let cp = c as u32;
    match cp {
        0x3040..=0x309f => 0x3040,
        0x30a0..=0x30ff => 0x30a0,
        0x4e00..=0x9fff | 0x3400..=0x4dbf => 0x4e00,
        0xac00..=0xd7a3 => 0xac00,
        0x3000..=0x303f | 0xff00..=0xff0f => 1,
        _ if c == ' ' || c == '\t' || c == '\0' || c == '\u{a0}' => 0,
        _ if is_keyword_char(c) => 2,
        _ if c.is_whitespace() => 0,
        _ => 1,
    }
}

/// Byte offset of the first word character at or after `from`.
pub fn find_word_start(line: &str, from: usize) -> usize {
    line[from..]
        .char_indices()
        .find(|&(_, c)| char_class(c) > 1)
        .map_or(line.len(), |(i, _)| from + i)
}

/// Byte offset just past the run of same-class characters starting at
/// `from`. Blanks are never a run.
pub fn find_word_end(line: &str, from: usize) -> usize {
    let mut chars = line[from..].char_indices();
    let Some((_, first)) = chars.next() else {
        return from;
    };
    let class = char_class(first);
    if class == 0 {
        return from;
    }
    chars
        .find(|&(_, c)| char_class(c) != class)
        .map_or(line.len(), |(i, _)| from + i)
}

/// Byte offset just past the last non-blank character.
pub fn find_line_end(line: &str) -> usize {
    line.trim_end_matches([' ', '\t']).len()
}

/// Length of the leading blanks of `line`.
pub fn leading_white(line: &str) -> usize {
    line.len() - line.trim_start_matches([' ', '\t']).len()
}

/// Largest char boundary that is `<= max`.
pub fn floor_char_boundary(s: &str, max: usize) -> usize {
    if max >= s.len() {
        return s.len();
    }
    let mut i = max;
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Smallest char boundary that is `>= min`.
pub fn ceil_char_boundary(s: &str, min: usize) -> usize {
    if min >= s.len() {
        return s.len();
    }
    let mut i = min;
    while !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

/// Whether `text` starts with `leader`, optionally ignoring case.
pub fn starts_with(text: &str, leader: &str, icase: bool) -> bool {
    if !icase {
        return text.starts_with(leader);
    }
    let mut text = text.chars();
    leader.chars().all(|l| match text.next() {
        Some(t) => t == l || lower(t) == lower(l),
        None => false,
    })
}

/// The leader test for one candidate. `strict_case` forces a case-sensitive
/// comparison even for candidates flagged case-insensitive.
pub fn candidate_matches(cand: &Candidate, leader: &str, strict_case: bool) -> bool {
    if cand.flags.contains(CandidateFlags::EQUAL) {
        return true;
    }
    starts_with(&cand.text, leader, cand.is_icase() && !strict_case)
}

/// Byte length of the part of `current` that `text` shares as a prefix.
pub fn common_prefix_len(current: &str, text: &str, icase: bool) -> usize {
    let mut other = text.chars();
    for (i, c) in current.char_indices() {
        let same = match other.next() {
            Some(o) if icase => lower(o) == lower(c),
            Some(o) => o == c,
            None => false,
        };
        if !same {
            return i;
        }
    }
    current.len()
}

/// Adjust the case of `word` to what was typed in `typed`.
///
/// If a typed letter is lower case where the word has upper case, the rest
/// of the word is lowered. Otherwise, when nothing typed is lower case and a
/// typed letter after another letter is upper case where the word is lower,
/// the rest of the word is raised. Finally the typed letters overwrite the
/// case of the shared prefix.
pub fn infer_case(typed: &str, word: &str) -> String {
    let mut out: Vec<char> = word.chars().collect();
    let typed: Vec<char> = typed.chars().collect();
    let min_len = typed.len().min(out.len());

    let mut has_lower = false;
    for i in 0..min_len {
        if typed[i].is_lowercase() {
            has_lower = true;
            if out[i].is_uppercase() {
                for c in out.iter_mut().skip(typed.len()) {
                    *c = lower(*c);
                }
                break;
            }
        }
    }

    if !has_lower {
        let mut was_letter = false;
        for i in 0..min_len {
            let c = typed[i];
            if was_letter && c.is_uppercase() && out[i].is_lowercase() {
                for c in out.iter_mut().skip(typed.len()) {
                    *c = upper(*c);
                }
                break;
            }
            was_letter = c.is_lowercase() || c.is_uppercase();
        }
    }

    for i in 0..min_len {
        let c = typed[i];
        if c.is_lowercase() {
            out[i] = lower(out[i]);
        } else if c.is_uppercase() {
            out[i] = upper(out[i]);
        }
    }

    out.into_iter().collect()
}

fn lower(c: char) -> char {
    single(c.to_lowercase(), c)
}

fn upper(c: char) -> char {
    single(c.to_uppercase(), c)
}

fn single(mut mapped: impl Iterator<Item = char>, orig: char) -> char {
    match (mapped.next(), mapped.next()) {
        (Some(c), None) => c,
        _ => orig,
    }
}
