use std::ops::Range;

use regex::{Regex, RegexBuilder};

use crate::completion::provider::{CompiledPattern, PatternMatcher, SearchPattern};
use crate::error::{CompletionError, Result};

/// Builds search patterns with the `regex` crate. Keyword characters are
/// word characters (`\w`).
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexMatcher;

/// A compiled search pattern.
#[derive(Debug, Clone)]
pub struct RegexPattern {
    regex: Regex,
}

impl RegexMatcher {
    /// Regex source for `pattern`.
    pub fn source(pattern: &SearchPattern) -> String {
        match pattern {
            SearchPattern::Keyword { prefix, min_tail } => {
                let tail = if *min_tail > 0 {
                    format!(r"\w{{{min_tail},}}")
                } else {
                    r"\w*".to_string()
                };
                format!("{}{}{tail}", word_start(prefix), regex::escape(prefix))
            }
            SearchPattern::Continued { text, word_start } => {
                let anchor = if *word_start { r"\b" } else { "" };
                format!("{anchor}{}", regex::escape(text))
            }
            SearchPattern::LinePrefix(text) => format!(r"^[ \t]*{}", regex::escape(text)),
        }
    }
}

/// `\b` when the prefix starts with a word character (or is empty).
fn word_start(prefix: &str) -> &'static str {
    match prefix.chars().next() {
        Some(c) if !(c.is_alphanumeric() || c == '_') => "",
        _ => r"\b",
    }
}

impl PatternMatcher for RegexMatcher {
    fn compile(&self, pattern: &SearchPattern, ignore_case: bool) -> Result<Box<dyn CompiledPattern>> {
        let source = Self::source(pattern);
        let regex = RegexBuilder::new(&source)
            .case_insensitive(ignore_case)
            .build()
            .map_err(|e| CompletionError::Generic(format!("Invalid search pattern {source}: {e}")))?;
        Ok(Box::new(RegexPattern { regex }))
    }
}

impl CompiledPattern for RegexPattern {
    fn find_at(&self, line: &str, from: usize) -> Option<Range<usize>> {
        if from > line.len() || !line.is_char_boundary(from) {
            return None;
        }
        self.regex.find_at(line, from).map(|m| m.range())
    }
}
