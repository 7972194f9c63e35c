//! Shell completion scripts for the inscomplete binary

use clap::CommandFactory;
use clap_complete::{Shell, generate};
use std::io;

use crate::cli::CliArgs;
use crate::error::{ConfigError, Result};

/// Print the completion script for `shell_name` to stdout.
pub fn generate_completion(shell_name: &str) -> Result<()> {
    let shell = parse_shell(shell_name)?;
    let mut cmd = CliArgs::command();
    generate(shell, &mut cmd, "inscomplete", &mut io::stdout());
    Ok(())
}

/// Parse shell name string to Shell enum
fn parse_shell(shell_name: &str) -> Result<Shell> {
    match shell_name.to_lowercase().as_str() {
        "bash" => Ok(Shell::Bash),
        "zsh" => Ok(Shell::Zsh),
        "fish" => Ok(Shell::Fish),
        "powershell" | "pwsh" => Ok(Shell::PowerShell),
        "elvish" => Ok(Shell::Elvish),
        _ => Err(ConfigError::InvalidValue {
            field: "shell".into(),
            value: shell_name.into(),
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_shell() {
        assert!(matches!(parse_shell("bash"), Ok(Shell::Bash)));
        assert!(matches!(parse_shell("Zsh"), Ok(Shell::Zsh)));
        assert!(matches!(parse_shell("pwsh"), Ok(Shell::PowerShell)));
        assert!(parse_shell("tcsh").is_err());
    }

    #[test]
    fn test_script_mentions_subcommands() {
        let mut cmd = CliArgs::command();
        let mut out = Vec::new();
        generate(Shell::Bash, &mut cmd, "inscomplete", &mut out);
        let script = String::from_utf8(out).unwrap();
        assert!(script.contains("inscomplete"));
        assert!(script.contains("interactive"));
    }
}
