//! File name completion (^X^F)

use std::fs;
use std::path::PathBuf;

use globset::GlobBuilder;
use tracing::debug;

use super::super::candidate::{Candidate, CandidateFlags};
use super::Collector;

/// Split typed text into the directory part (kept verbatim, including the
/// trailing separator) and the name being completed.
fn split_typed(typed: &str) -> (&str, &str) {
    match typed.rfind('/') {
        Some(i) => typed.split_at(i + 1),
        None => ("", typed),
    }
}

fn resolve_dir(dir: &str) -> PathBuf {
    if dir.is_empty() {
        return PathBuf::from(".");
    }
    if let Some(rest) = dir.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(dir)
}

/// Add the entries of the typed directory whose names start with the typed
/// name. Directories get a trailing `/`; hidden entries only show up when
/// the typed name starts with a dot.
pub fn collect(typed: &str, ignore_case: bool, out: &mut Collector<'_>) -> usize {
    let (dir, name) = split_typed(typed);
    let matcher = match GlobBuilder::new(&format!("{}*", globset::escape(name)))
        .case_insensitive(ignore_case)
        .literal_separator(true)
        .build()
    {
        Ok(glob) => glob.compile_matcher(),
        Err(e) => {
            debug!("bad file name pattern {typed}: {e}");
            return 0;
        }
    };
    let entries = match fs::read_dir(resolve_dir(dir)) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("cannot list {dir:?}: {e}");
            return 0;
        }
    };

    let show_hidden = name.starts_with('.');
    let mut found: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let file_name = e.file_name().to_str()?.to_string();
            if file_name.starts_with('.') && !show_hidden {
                return None;
            }
            if !matcher.is_match(&file_name) {
                return None;
            }
            let is_dir = e.file_type().map(|t| t.is_dir()).unwrap_or(false);
            Some(if is_dir {
                format!("{dir}{file_name}/")
            } else {
                format!("{dir}{file_name}")
            })
        })
        .collect();
    found.sort();

    let mut flags = CandidateFlags::empty();
    flags.set(CandidateFlags::ICASE, ignore_case);
    let before = out.added;
    for text in found {
        out.add(Candidate::new(text).with_flags(flags));
    }
    out.added - before
}
