//! Dictionary and thesaurus word files

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use globset::GlobBuilder;
use tracing::{debug, trace};

use super::super::candidate::Direction;
use super::super::leader::{find_line_end, find_word_end, find_word_start, is_keyword_char};
use super::super::mode::WordFiles;
use super::super::provider::CompiledPattern;
use super::Collector;
use crate::error::SourceError;

/// Expand the configured file names. Glob characters are only honoured in
/// the last path component.
pub fn expand_paths(files: &WordFiles) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for name in &files.paths {
        let path = Path::new(name);
        let has_glob = name.contains(['*', '?', '[', '{']);
        if files.exact || !has_glob {
            out.push(path.to_path_buf());
            continue;
        }
        let Some(file_pattern) = path.file_name().and_then(|f| f.to_str()) else {
            continue;
        };
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let matcher = match GlobBuilder::new(file_pattern)
            .literal_separator(true)
            .build()
        {
            Ok(glob) => glob.compile_matcher(),
            Err(e) => {
                debug!("invalid word file pattern {name}: {e}");
                continue;
            }
        };
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        let mut found: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .filter(|e| matcher.is_match(e.file_name()))
            .map(|e| e.path())
            .collect();
        found.sort();
        out.extend(found);
    }
    out
}

/// Scan word files for matches of `pattern`.
///
/// With `thesaurus`, every other word on a line with a match is added too.
/// In adding mode the match extends to the end of the line. Files that
/// cannot be read are skipped and reported.
pub fn scan(
    files: &WordFiles,
    pattern: &dyn CompiledPattern,
    thesaurus: bool,
    adding: bool,
    poll_frequency: u32,
    out: &mut Collector<'_>,
) -> Vec<SourceError> {
    let mut failures = Vec::new();
    for path in expand_paths(files) {
        if out.interrupted() {
            break;
        }
        let fname = path.display().to_string();
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) => {
                debug!("skipping word file {fname}: {e}");
                failures.push(SourceError::Unavailable {
                    source: fname,
                    reason: e.to_string(),
                });
                continue;
            }
        };
        trace!("scanning word file {fname}");
        let reader = BufReader::new(file);
        if let Err(e) = scan_lines(reader, &fname, pattern, thesaurus, adding, poll_frequency, out) {
            debug!("stopped reading word file {fname}: {e}");
            failures.push(SourceError::Unavailable {
                source: fname,
                reason: e.to_string(),
            });
        }
    }
    failures
}

/// Lines that are not valid UTF-8 are decoded lossily, so one bad line does
/// not hide the words after it.
fn scan_lines<R: BufRead>(
    mut reader: R,
    fname: &str,
    pattern: &dyn CompiledPattern,
    thesaurus: bool,
    adding: bool,
    poll_frequency: u32,
    out: &mut Collector<'_>,
) -> io::Result<()> {
    let mut raw = Vec::new();
    loop {
        raw.clear();
        if reader.read_until(b'\n', &mut raw)? == 0 {
            break;
        }
        let bytes = raw.strip_suffix(b"\n").unwrap_or(&raw);
        let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
        let line = String::from_utf8_lossy(bytes);
        let line = line.as_ref();
        let mut from = 0;
        while let Some(m) = pattern.find_at(line, from) {
            let end = if adding {
                m.start + find_line_end(&line[m.start..])
            } else {
                find_word_end(line, m.start)
            };
            let end = end.max(m.end);
            let mut added = out.add_word(&line[m.start..end], Some(fname), Default::default(), 0);
            if thesaurus {
                added |= add_words_in_line(line, m.start, fname, out);
            }
            if added {
                // a backward scan is honoured once only
                out.dir = Direction::Forward;
            }
            from = end.max(m.start + 1);
            while from < line.len() && !line.is_char_boundary(from) {
                from += 1;
            }
            if from >= line.len() {
                break;
            }
        }
        if out.check_keys(poll_frequency) {
            break;
        }
    }
    Ok(())
}

/// Add all words of `line` except the one starting at `skip`.
fn add_words_in_line(line: &str, skip: usize, fname: &str, out: &mut Collector<'_>) -> bool {
    let mut added = false;
    let mut pos = 0;
    loop {
        let start = find_word_start(line, pos);
        if start >= line.len() {
            break;
        }
        // multi-byte letters never split a word here
        let end = line[start..]
            .char_indices()
            .find(|&(_, c)| c.is_ascii() && !is_keyword_char(c))
            .map_or(line.len(), |(i, _)| start + i);
        if start != skip {
            added |= out.add_word(&line[start..end], Some(fname), Default::default(), 0);
        }
        pos = end.max(start + 1);
        while pos < line.len() && !line.is_char_boundary(pos) {
            pos += 1;
        }
    }
    added
}
