//! Sources backed by external lookups: tags, spelling, command-line grammar
//! and include-file search.

use tracing::trace;

use super::super::candidate::Candidate;
use super::super::provider::{CommandGrammar, IncludeSearch, SpellEngine, TagIndex};
use super::Collector;

/// Most tags fetched per lookup.
pub const TAG_LIMIT: usize = 300;

/// Most spelling suggestions offered.
pub const SPELL_LIMIT: usize = 25;

pub fn collect_tags(index: &dyn TagIndex, prefix: &str, out: &mut Collector<'_>) -> usize {
    let before = out.added;
    let tags = index.find_tags(prefix, out.icase, TAG_LIMIT);
    trace!(count = tags.len(), prefix, "tag lookup");
    for tag in tags {
        let mut cand = Candidate::new(tag.name).with_fname(tag.file);
        cand.kind = tag.kind;
        if out.icase {
            cand.flags |= super::super::candidate::CandidateFlags::ICASE;
        }
        out.add(cand);
    }
    out.added - before
}

pub fn collect_spell(engine: &dyn SpellEngine, word: &str, out: &mut Collector<'_>) -> usize {
    let before = out.added;
    for suggestion in engine.suggestions(word, SPELL_LIMIT) {
        out.add(Candidate::new(suggestion));
    }
    out.added - before
}

pub fn collect_cmdline(
    grammar: &dyn CommandGrammar,
    line: &str,
    prefix: &str,
    out: &mut Collector<'_>,
) -> usize {
    let before = out.added;
    for text in grammar.expand(line, prefix) {
        out.add(Candidate::new(text));
    }
    out.added - before
}

pub fn collect_includes(
    search: &dyn IncludeSearch,
    prefix: &str,
    defines: bool,
    out: &mut Collector<'_>,
) -> usize {
    let before = out.added;
    for m in search.find(prefix, out.icase, defines) {
        out.add_word(&m.text, m.fname.as_deref(), Default::default(), 0);
    }
    out.added - before
}
