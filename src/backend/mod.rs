//! Default collaborator implementations
//!
//! The engine only talks to traits. This module provides the implementations
//! used by the command-line driver, the terminal demo and the tests:
//! - `LineBuffer`: in-memory text storage
//! - `RegexMatcher`: search patterns compiled with the `regex` crate
//! - `KeyQueue`: scripted pending input
//! - `TagFile`: a ctags file loaded into memory
//! - `StaticRegisters`: fixed register contents

mod buffer;
mod input;
mod matcher;
mod tags;

pub use buffer::LineBuffer;
pub use input::{KeyQueue, StaticRegisters};
pub use matcher::{RegexMatcher, RegexPattern};
pub use tags::TagFile;
