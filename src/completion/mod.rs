//! Insert-mode completion
//!
//! The engine collects candidates incrementally from an ordered list of
//! sources (buffers, word lists, tags, user callbacks and more) into a ring,
//! and lets the user cycle through them while the typed text narrows the
//! list. Everything outside the engine, such as text storage, pattern
//! matching, menu drawing and key input, is reached through the traits in
//! [`provider`].
//!
//! # Example
//!
//! ```rust,no_run
//! use inscomplete::backend::LineBuffer;
//! use inscomplete::completion::{parse_keys, Collaborators, CompletionEngine, Editor, Position};
//! use inscomplete::config::CompletionConfig;
//!
//! let buffer = LineBuffer::from_lines("main", &["hello help held", "he"]);
//! let editor = Editor::new(Box::new(buffer), Position::new(1, 2));
//! let mut engine =
//!     CompletionEngine::new(CompletionConfig::default(), editor, Collaborators::default())?;
//! engine.feed_keys(&parse_keys("<C-N><C-N>")?)?;
//! println!("{}", engine.editor().current_line());
//! # Ok::<(), inscomplete::error::CompletionError>(())
//! ```

pub mod candidate;
pub mod engine;
pub mod fuzzy;
pub mod info;
pub mod keys;
pub mod leader;
pub mod menu;
pub mod mode;
pub mod options;
pub mod provider;
pub mod session;
pub mod sources;
pub mod store;

#[cfg(test)]
mod tests;

pub use candidate::{Candidate, CompletionItem, Direction};
pub use engine::CompletionEngine;
pub use info::{CompleteDone, CompleteInfo, DoneReason, InfoItem};
pub use keys::{parse_keys, Key};
pub use mode::{ModeState, Submode, WordFiles};
pub use options::CompleteOptions;
pub use provider::{
    CallbackContext, CallbackReply, Collaborators, CommandGrammar, CompiledPattern, Editor,
    FindStart, FnCallback, IncludeMatch, IncludeSearch, KeySource, MenuItem, MenuRenderer,
    PatternMatcher, Position, RegisterStore, SearchPattern, SpellEngine, TagIndex, TagMatch,
    TextBuffer, UserCallback, WordListCallback,
};
pub use sources::{SourceKind, SourceSpec};
