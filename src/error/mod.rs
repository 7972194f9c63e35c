//! Error handling module for the completion engine.
//!
//! Errors are split by where they originate:
//! - configuration problems (bad option values, empty dictionary)
//! - source failures that only affect one source of candidates
//! - key notation errors from the scripted driver
//!
//! # Example
//!
//! ```rust,no_run
//! use inscomplete::error::{CompletionError, ConfigError, Result};
//!
//! fn require_dictionary(paths: &[String]) -> Result<()> {
//!     if paths.is_empty() {
//!         return Err(ConfigError::EmptyOption("dictionary").into());
//!     }
//!     Ok(())
//! }
//!
//! match require_dictionary(&[]) {
//!     Err(CompletionError::Config(e)) => println!("{e}"),
//!     _ => {}
//! }
//! ```

pub mod kinds;

// Re-export commonly used types
pub use kinds::{CompletionError, ConfigError, KeyError, Result, SourceError};
