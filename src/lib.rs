//! inscomplete library
//!
//! An incremental, multi-source insert-mode completion engine. The engine
//! collects candidates from the current buffer, other buffers, dictionaries,
//! tags, user callbacks and more, keeps them in a ring with the typed text,
//! and steps through them as keys arrive.
//!
//! # Modules
//!
//! - `completion`: the engine, its sources and the collaborator traits
//! - `backend`: default collaborator implementations
//! - `config`: configuration management
//! - `error`: error types and handling
//! - `cli`: command-line interface
//! - `repl`: interactive terminal demo
//!
//! # Example
//!
//! ```no_run
//! use inscomplete::backend::LineBuffer;
//! use inscomplete::completion::{Collaborators, CompletionEngine, Editor, Position, parse_keys};
//! use inscomplete::config::CompletionConfig;
//!
//! fn main() -> inscomplete::Result<()> {
//!     let buffer = LineBuffer::from_lines("notes", &["hello help", "he"]);
//!     let editor = Editor::new(Box::new(buffer), Position::new(1, 2));
//!     let mut engine =
//!         CompletionEngine::new(CompletionConfig::default(), editor, Collaborators::default())?;
//!
//!     engine.feed_keys(&parse_keys("<C-N>")?)?;
//!     println!("{}", engine.editor().current_line());
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod cli;
pub mod completion;
pub mod config;
pub mod error;
pub mod repl;

// Re-export commonly used types
pub use completion::{CompletionEngine, Key, parse_keys};
pub use config::Config;
pub use error::{CompletionError, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
pub fn version() -> &'static str {
    VERSION
}
