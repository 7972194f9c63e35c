use std::fs;
use std::path::Path;

use tracing::debug;

use crate::completion::provider::{TagIndex, TagMatch};
use crate::error::Result;

/// Tags read from a ctags file: `name<TAB>file<TAB>address[;"<TAB>kind...]`.
#[derive(Debug, Clone, Default)]
pub struct TagFile {
    tags: Vec<TagMatch>,
}

impl TagFile {
    /// Parse tag lines. Comment lines (`!_TAG_...`) and lines without a
    /// file field are skipped.
    pub fn parse(text: &str) -> Self {
        let tags = text
            .lines()
            .filter(|l| !l.starts_with("!_"))
            .filter_map(|line| {
                let mut fields = line.split('\t');
                let name = fields.next().filter(|n| !n.is_empty())?;
                let file = fields.next()?;
                // extension fields follow the `;"` marker at the end of the address
                let kind = fields
                    .skip_while(|f| !f.ends_with(";\""))
                    .nth(1)
                    .filter(|k| !k.contains(':'))
                    .map(str::to_string);
                Some(TagMatch {
                    name: name.to_string(),
                    kind,
                    file: Some(file.to_string()),
                })
            })
            .collect();
        Self { tags }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let tags = Self::parse(&text);
        debug!(path = %path.as_ref().display(), count = tags.len(), "tags loaded");
        Ok(tags)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl TagIndex for TagFile {
    fn find_tags(&self, prefix: &str, ignore_case: bool, limit: usize) -> Vec<TagMatch> {
        let folded = prefix.to_lowercase();
        self.tags
            .iter()
            .filter(|t| {
                if ignore_case {
                    t.name.to_lowercase().starts_with(&folded)
                } else {
                    t.name.starts_with(prefix)
                }
            })
            .take(limit)
            .cloned()
            .collect()
    }
}
