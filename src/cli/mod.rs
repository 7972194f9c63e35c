//! Command-line interface for inscomplete
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Configuration loading and overriding from flags
//! - Building an engine and its collaborators for a file
//! - Mode selection (scripted run vs interactive demo)

pub mod completion;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::backend::{LineBuffer, RegexMatcher, StaticRegisters, TagFile};
use crate::completion::{
    Collaborators, CompleteDone, CompleteInfo, CompletionEngine, Editor, Position, TextBuffer,
    WordListCallback, parse_keys,
};
use crate::config::{Config, LogLevel};
use crate::error::{ConfigError, Result};
use crate::repl::ReplEngine;

/// Insert-mode completion engine, driven from the command line
#[derive(Parser, Debug)]
#[command(
    name = "inscomplete",
    version,
    about = "Insert-mode completion engine",
    long_about = "Incremental multi-source insert-mode completion. Feed key sequences to a
buffer from a script, or try the popup menu interactively."
)]
pub struct CliArgs {
    /// File to open in the interactive demo when no subcommand is given
    #[arg(value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    pub config_file: Option<PathBuf>,

    /// Source list, e.g. ".,w,b,kwords.txt"
    #[arg(long, value_name = "LIST", global = true)]
    pub complete: Option<String>,

    /// Completion options, e.g. "menu,menuone,noinsert"
    #[arg(long, value_name = "LIST", global = true)]
    pub completeopt: Option<String>,

    /// Ignore case when matching
    #[arg(long, global = true)]
    pub ignorecase: bool,

    /// Match case when the typed text has upper case
    #[arg(long, global = true)]
    pub smartcase: bool,

    /// Adjust the case of matches to the typed text
    #[arg(long, global = true)]
    pub infercase: bool,

    /// Dictionary word file (repeatable)
    #[arg(long, value_name = "FILE", global = true)]
    pub dictionary: Vec<String>,

    /// Thesaurus file (repeatable)
    #[arg(long, value_name = "FILE", global = true)]
    pub thesaurus: Vec<String>,

    /// Disable colored output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Verbose mode (debug logging)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Very verbose mode (trace logging)
    #[arg(long = "vv", global = true)]
    pub very_verbose: bool,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Where the text comes from and what else the sources can see.
#[derive(Args, Debug, Default, Clone)]
pub struct SessionArgs {
    /// File to edit; an empty buffer when omitted
    #[arg(value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Cursor line, 1-based (default: last line)
    #[arg(long, value_name = "N")]
    pub line: Option<usize>,

    /// Cursor byte column, 0-based (default: end of line)
    #[arg(long, value_name = "N")]
    pub col: Option<usize>,

    /// Other buffer to scan (repeatable)
    #[arg(long = "buffer", value_name = "FILE")]
    pub buffers: Vec<PathBuf>,

    /// ctags file for ^X^]
    #[arg(long, value_name = "FILE")]
    pub tags: Option<PathBuf>,

    /// Register contents for ^X^R (repeatable)
    #[arg(long = "register", value_name = "TEXT")]
    pub registers: Vec<String>,

    /// Word list callback, NAME=FILE (repeatable)
    #[arg(long = "wordlist", value_name = "NAME=FILE")]
    pub wordlists: Vec<String>,
}

/// Subcommands for inscomplete
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Feed a key sequence to a buffer and print the result
    Run {
        #[command(flatten)]
        session: SessionArgs,

        /// Keys in angle-bracket notation, e.g. "<C-X><C-N>"
        #[arg(short = 'k', long, value_name = "KEYS")]
        keys: String,

        /// Print the buffer and completion state as JSON
        #[arg(long)]
        json: bool,
    },

    /// Edit a buffer interactively in the terminal
    Interactive {
        #[command(flatten)]
        session: SessionArgs,
    },

    /// Show version information
    Version,

    /// Generate shell completion script
    Completion {
        /// Shell type (bash, zsh, fish, powershell, elvish)
        #[arg(value_name = "SHELL")]
        shell: String,
    },

    /// Show configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Validate configuration file
        #[arg(long)]
        validate: bool,

        /// Write the default configuration to the config path
        #[arg(long)]
        init: bool,
    },
}

/// Result of a scripted run, as printed with `--json`.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub text: String,
    pub cursor: (usize, usize),
    pub mode_message: Option<String>,
    pub status: Option<String>,
    pub error: Option<String>,
    pub info: CompleteInfo,
    pub events: Vec<CompleteDone>,
}

/// CLI interface handler
pub struct CliInterface {
    /// Parsed command-line arguments
    args: CliArgs,

    /// Loaded configuration
    config: Config,
}

impl CliInterface {
    /// Parse the process arguments and load the configuration.
    pub fn new() -> Result<Self> {
        Self::from_args(CliArgs::parse())
    }

    pub fn from_args(args: CliArgs) -> Result<Self> {
        let config = Self::load_config(&args)?;
        Ok(Self { args, config })
    }

    /// Load configuration from file and merge with arguments
    fn load_config(args: &CliArgs) -> Result<Config> {
        let mut config = Config::load_from_file(args.config_file.as_deref())?;

        if let Err(e) = config.validate() {
            eprintln!("Warning: Configuration validation failed: {}", e);
            eprintln!("Using default configuration instead.");
            config = Config::default();
        }

        Self::apply_args_to_config(&mut config, args);
        config.validate()?;
        Ok(config)
    }

    fn apply_args_to_config(config: &mut Config, args: &CliArgs) {
        Self::apply_completion_args(config, args);

        if args.no_color {
            config.display.colors = false;
        }

        config.logging.level = if args.very_verbose {
            LogLevel::Trace
        } else if args.verbose {
            LogLevel::Debug
        } else {
            config.logging.level
        };
    }

    fn apply_completion_args(config: &mut Config, args: &CliArgs) {
        let completion = &mut config.completion;
        if let Some(complete) = &args.complete {
            completion.complete = complete.clone();
        }
        if let Some(completeopt) = &args.completeopt {
            completion.completeopt = completeopt.clone();
        }
        completion.ignorecase |= args.ignorecase;
        completion.smartcase |= args.smartcase;
        completion.infercase |= args.infercase;
        if !args.dictionary.is_empty() {
            completion.dictionary = args.dictionary.clone();
        }
        if !args.thesaurus.is_empty() {
            completion.thesaurus = args.thesaurus.clone();
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn args(&self) -> &CliArgs {
        &self.args
    }

    /// Run the selected subcommand; no subcommand starts the interactive
    /// demo on FILE, or on an empty buffer.
    pub fn execute(&self) -> Result<()> {
        match &self.args.command {
            Some(Commands::Run {
                session,
                keys,
                json,
            }) => self.run_script(session, keys, *json),
            Some(Commands::Interactive { session }) => self.run_interactive(session),
            Some(Commands::Version) => {
                self.show_version();
                Ok(())
            }
            Some(Commands::Completion { shell }) => completion::generate_completion(shell),
            Some(Commands::Config {
                show,
                validate,
                init,
            }) => self.handle_config_command(*show, *validate, *init),
            None => self.run_interactive(&SessionArgs {
                file: self.args.file.clone(),
                ..Default::default()
            }),
        }
    }

    /// Feed `keys` and print the buffer, or the whole report as JSON.
    fn run_script(&self, session: &SessionArgs, keys: &str, json: bool) -> Result<()> {
        let keys = parse_keys(keys)?;
        let mut engine = self.build_engine(session)?;
        debug!(count = keys.len(), "feeding keys");
        engine.feed_keys(&keys)?;

        let report = Self::report(&mut engine);
        if json {
            let text = serde_json::to_string_pretty(&report)
                .map_err(|e| format!("Failed to serialize report: {e}"))?;
            println!("{text}");
        } else {
            let line = report.text.lines().nth(report.cursor.0 - 1).unwrap_or_default();
            println!("{line}");
            if let Some(menu) = menu_summary(&report.info) {
                println!("{menu}");
            }
            if let Some(error) = &report.error {
                eprintln!("{error}");
            }
        }
        Ok(())
    }

    fn report(engine: &mut CompletionEngine) -> RunReport {
        let editor = engine.editor();
        let text = (0..editor.buffer.line_count())
            .filter_map(|i| editor.buffer.line(i))
            .collect::<Vec<_>>()
            .join("\n");
        let cursor = (editor.cursor.line + 1, editor.cursor.col);
        RunReport {
            text,
            cursor,
            mode_message: engine.mode_message(),
            status: engine.status_message().map(str::to_string),
            error: engine.error_message().map(str::to_string),
            info: engine.complete_info(),
            events: engine.take_events(),
        }
    }

    fn run_interactive(&self, session: &SessionArgs) -> Result<()> {
        let engine = self.build_engine(session)?;
        let mut repl = ReplEngine::new(engine, self.config.display.clone());
        repl.run()?;

        let mut engine = repl.into_engine();
        print!("{}", Self::report(&mut engine).text);
        println!();
        Ok(())
    }

    /// Engine over the session's file with the cursor placed as requested.
    pub fn build_engine(&self, session: &SessionArgs) -> Result<CompletionEngine> {
        let buffer = match &session.file {
            Some(path) => LineBuffer::from_file(path)?,
            None => LineBuffer::from_lines("[No Name]", &[""]),
        };
        let cursor = Self::cursor_for(&buffer, session.line, session.col);
        info!(name = buffer.name(), line = cursor.line, col = cursor.col, "buffer loaded");

        let mut others: Vec<Box<dyn TextBuffer>> = Vec::new();
        for path in &session.buffers {
            others.push(Box::new(LineBuffer::from_file(path)?));
        }
        let editor = Editor::new(Box::new(buffer), cursor).with_buffers(others);
        let collab = Self::collaborators(session)?;
        CompletionEngine::new(self.config.completion.clone(), editor, collab)
    }

    /// Cursor from a 1-based line and a byte column, clamped to the text.
    fn cursor_for(buffer: &LineBuffer, line: Option<usize>, col: Option<usize>) -> Position {
        let last = buffer.line_count() - 1;
        let line = line.map_or(last, |l| l.saturating_sub(1).min(last));
        let text = buffer.line(line).unwrap_or_default();
        let mut col = col.map_or(text.len(), |c| c.min(text.len()));
        while !text.is_char_boundary(col) {
            col -= 1;
        }
        Position::new(line, col)
    }

    fn collaborators(session: &SessionArgs) -> Result<Collaborators> {
        let mut collab = Collaborators::new(Box::new(RegexMatcher));
        if let Some(path) = &session.tags {
            collab.tags = Some(Box::new(TagFile::from_file(path)?));
        }
        if !session.registers.is_empty() {
            collab.registers = Some(Box::new(StaticRegisters::new(session.registers.clone())));
        }
        for spec in &session.wordlists {
            let (name, path) = parse_wordlist(spec)?;
            let text = fs::read_to_string(path)?;
            collab.register_callback(name, Box::new(WordListCallback::new(text.split_whitespace())));
        }
        Ok(collab)
    }

    fn show_version(&self) {
        println!("inscomplete version {}", env!("CARGO_PKG_VERSION"));
        println!("Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
    }

    fn handle_config_command(&self, show: bool, validate: bool, init: bool) -> Result<()> {
        if init {
            let path = self.config_path();
            Config::default().save(&path)?;
            println!("Wrote default configuration to {}", path.display());
        }
        if validate {
            self.validate_config_file()?;
        }
        if show {
            self.show_config()?;
        }
        Ok(())
    }

    fn validate_config_file(&self) -> Result<()> {
        let path = self.config_path();
        println!("Validating configuration file: {}", path.display());

        if !path.exists() {
            println!("Configuration file does not exist");
            return Ok(());
        }

        match Config::from_file(&path) {
            Ok(config) => match config.validate() {
                Ok(()) => println!("Configuration is valid"),
                Err(e) => println!("Configuration validation failed: {}", e),
            },
            Err(e) => println!("Failed to load configuration: {}", e),
        }
        Ok(())
    }

    fn show_config(&self) -> Result<()> {
        println!("Configuration file: {}", self.config_path().display());
        println!();
        println!("{}", self.config.to_toml()?);
        Ok(())
    }

    fn config_path(&self) -> PathBuf {
        self.args
            .config_file
            .clone()
            .unwrap_or_else(Config::default_path)
    }
}

/// One-line menu listing with the selected entry in brackets.
fn menu_summary(info: &CompleteInfo) -> Option<String> {
    if !info.pum_visible {
        return None;
    }
    let entries: Vec<String> = info
        .items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            if i as i64 == info.selected {
                format!("[{}]", item.word)
            } else {
                item.word.clone()
            }
        })
        .collect();
    Some(format!("{}: {}", info.mode, entries.join(" ")))
}

/// Split `NAME=FILE`.
fn parse_wordlist(spec: &str) -> Result<(&str, &Path)> {
    match spec.split_once('=') {
        Some((name, file)) if !name.is_empty() && !file.is_empty() => Ok((name, Path::new(file))),
        _ => Err(ConfigError::InvalidValue {
            field: "wordlist".into(),
            value: spec.into(),
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::CompletionItem;

    fn parse(argv: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_no_arguments() {
        let args = parse(&["inscomplete"]);
        assert!(args.command.is_none());
        assert!(!args.verbose);
    }

    #[test]
    fn test_run_arguments() {
        let args = parse(&[
            "inscomplete",
            "--completeopt",
            "menuone",
            "run",
            "notes.txt",
            "--keys",
            "<C-N>",
            "--line",
            "3",
            "--json",
        ]);
        assert_eq!(args.completeopt.as_deref(), Some("menuone"));
        match args.command {
            Some(Commands::Run {
                session,
                keys,
                json,
            }) => {
                assert_eq!(session.file, Some(PathBuf::from("notes.txt")));
                assert_eq!(session.line, Some(3));
                assert_eq!(keys, "<C-N>");
                assert!(json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_flags_override_config() {
        let args = parse(&["inscomplete", "--ignorecase", "--complete", ".", "--vv"]);
        let mut config = Config::default();
        CliInterface::apply_args_to_config(&mut config, &args);
        assert!(config.completion.ignorecase);
        assert_eq!(config.completion.complete, ".");
        assert_eq!(config.logging.level, LogLevel::Trace);
    }

    #[test]
    fn test_cursor_defaults_to_end() {
        let buffer = LineBuffer::from_lines("t", &["one", "twé"]);
        assert_eq!(CliInterface::cursor_for(&buffer, None, None), Position::new(1, 4));
        assert_eq!(CliInterface::cursor_for(&buffer, Some(1), Some(1)), Position::new(0, 1));
        // inside the two-byte character
        assert_eq!(CliInterface::cursor_for(&buffer, Some(2), Some(3)), Position::new(1, 2));
        assert_eq!(CliInterface::cursor_for(&buffer, Some(9), None), Position::new(1, 4));
    }

    #[test]
    fn test_top_level_file() {
        let args = parse(&["inscomplete", "notes.txt"]);
        assert_eq!(args.file, Some(PathBuf::from("notes.txt")));
        assert!(args.command.is_none());
    }

    #[test]
    fn test_menu_summary() {
        let mut engine = CliInterface {
            args: parse(&["inscomplete"]),
            config: Config::default(),
        }
        .build_engine(&SessionArgs::default())
        .unwrap();
        assert_eq!(menu_summary(&engine.complete_info()), None);

        engine
            .set_completion(0, vec![CompletionItem::word("ab"), CompletionItem::word("ac")])
            .unwrap();
        assert_eq!(
            menu_summary(&engine.complete_info()).as_deref(),
            Some("eval: [ab] ac")
        );
    }

    #[test]
    fn test_parse_wordlist() {
        let (name, path) = parse_wordlist("words=/tmp/w.txt").unwrap();
        assert_eq!(name, "words");
        assert_eq!(path, Path::new("/tmp/w.txt"));
        assert!(parse_wordlist("words").is_err());
        assert!(parse_wordlist("=x").is_err());
    }

    #[test]
    fn test_run_engine_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("code.rs");
        fs::write(&path, "let counter = 1;\ncou").unwrap();

        let cli = CliInterface {
            args: parse(&["inscomplete"]),
            config: Config::default(),
        };
        let session = SessionArgs {
            file: Some(path),
            ..Default::default()
        };
        let mut engine = cli.build_engine(&session).unwrap();
        engine.feed_keys(&parse_keys("<C-N>").unwrap()).unwrap();
        let report = CliInterface::report(&mut engine);
        assert_eq!(report.text, "let counter = 1;\ncounter");
        assert_eq!(report.cursor, (2, 7));
        assert_eq!(report.status.as_deref(), Some("The only match"));
    }
}
