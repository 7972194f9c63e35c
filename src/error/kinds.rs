use std::{fmt, io, path::PathBuf};

/// Crate-wide `Result` type using [`CompletionError`] as the error.
///
/// This alias is re-exported by the parent `error` module and is intended
/// to be used throughout the crate for fallible operations.
pub type Result<T> = std::result::Result<T, CompletionError>;

/// Top-level error type for completion operations.
///
/// This type wraps more specific error kinds and provides a single
/// error type that can be used throughout the crate.
#[derive(Debug)]
pub enum CompletionError {
    /// Configuration errors (option values, config file).
    Config(ConfigError),

    /// A completion source could not deliver results.
    Source(SourceError),

    /// Key notation could not be parsed.
    Key(KeyError),

    /// Navigation ran past the collected candidates while collection was
    /// not allowed. `pending` is the number of steps still owed.
    ExhaustedDirection { pending: i32 },

    /// I/O errors.
    Io(io::Error),

    /// Generic error with a free-form message.
    Generic(String),
}

/// Configuration-specific errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file not found.
    FileNotFound(PathBuf),

    /// Invalid config format.
    InvalidFormat(String),

    /// Invalid field value.
    InvalidValue { field: String, value: String },

    /// An option required by the requested submode is empty.
    EmptyOption(&'static str),

    /// A callback name is configured but nothing is registered under it.
    MissingCallback(String),
}

/// Errors raised by a single completion source.
#[derive(Debug)]
pub enum SourceError {
    /// The source could not be read; scanning moves on to the next source.
    Unavailable { source: String, reason: String },

    /// A completion callback moved the cursor or changed the buffer.
    ExternalMutation { source: String },
}

/// Key notation errors.
#[derive(Debug)]
pub enum KeyError {
    /// `<...>` with a name that is not a known key.
    UnknownKey(String),

    /// `<` without a closing `>`.
    Unterminated(String),
}

impl CompletionError {
    /// Whether this error only affects one source and scanning may go on.
    pub fn is_source_local(&self) -> bool {
        matches!(self, CompletionError::Source(_) | CompletionError::Io(_))
    }
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for CompletionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionError::Config(e) => write!(f, "{e}"),
            CompletionError::Source(e) => write!(f, "{e}"),
            CompletionError::Key(e) => write!(f, "Key error: {e}"),
            CompletionError::ExhaustedDirection { pending } => {
                write!(f, "No more matches in this direction ({pending} pending)")
            }
            CompletionError::Io(e) => write!(f, "I/O error: {e}"),
            CompletionError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => {
                write!(f, "Config file not found: {}", path.display())
            }
            ConfigError::InvalidFormat(msg) => write!(f, "Invalid config format: {msg}"),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{value}' for field '{field}'")
            }
            ConfigError::EmptyOption(name) => write!(f, "'{name}' option is empty"),
            ConfigError::MissingCallback(name) => {
                write!(f, "Unknown completion function: {name}")
            }
        }
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Unavailable { source, reason } => {
                write!(f, "Cannot read {source}: {reason}")
            }
            SourceError::ExternalMutation { .. } => {
                write!(f, "E840: Completion function deleted text")
            }
        }
    }
}

impl fmt::Display for KeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyError::UnknownKey(name) => write!(f, "Unknown key: <{name}>"),
            KeyError::Unterminated(rest) => write!(f, "Unterminated key notation: {rest}"),
        }
    }
}

impl std::error::Error for CompletionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CompletionError::Io(e) => Some(e),
            _ => None,
        }
    }
}
impl std::error::Error for ConfigError {}
impl std::error::Error for SourceError {}
impl std::error::Error for KeyError {}

/* ========================= Conversions to CompletionError ========================= */

impl From<io::Error> for CompletionError {
    fn from(err: io::Error) -> Self {
        CompletionError::Io(err)
    }
}

impl From<ConfigError> for CompletionError {
    fn from(err: ConfigError) -> Self {
        CompletionError::Config(err)
    }
}

impl From<SourceError> for CompletionError {
    fn from(err: SourceError) -> Self {
        CompletionError::Source(err)
    }
}

impl From<KeyError> for CompletionError {
    fn from(err: KeyError) -> Self {
        CompletionError::Key(err)
    }
}

impl From<String> for CompletionError {
    fn from(msg: String) -> Self {
        CompletionError::Generic(msg)
    }
}

impl From<&str> for CompletionError {
    fn from(msg: &str) -> Self {
        CompletionError::Generic(msg.to_owned())
    }
}
