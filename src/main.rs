//! inscomplete - insert-mode completion from the command line
//!
//! Feeds key sequences to a buffer through the completion engine, or opens
//! an interactive terminal demo of the popup menu.
//!
//! # Usage
//!
//! ```bash
//! # Complete the word before the cursor on the last line
//! inscomplete run notes.txt --keys '<C-N><C-N><C-Y>'
//!
//! # Whole-line completion with the state as JSON
//! inscomplete run src/main.rs --line 12 --keys '<C-X><C-L>' --json
//!
//! # Try it interactively
//! inscomplete interactive notes.txt --completeopt menu,menuone,noinsert
//! ```

use tracing_subscriber::EnvFilter;

use inscomplete::cli::CliInterface;
use inscomplete::error::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Parse arguments, set up logging, run the subcommand.
fn run() -> Result<()> {
    let cli = CliInterface::new()?;
    initialize_logging(&cli);
    cli.execute()
}

/// Initialize logging from the configured level. `RUST_LOG` wins when set.
///
/// Logs go to stderr so scripted output on stdout stays clean.
fn initialize_logging(cli: &CliInterface) {
    let level = cli.config().logging.level.to_tracing_level();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}
