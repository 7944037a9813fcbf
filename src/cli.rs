//! CLI argument parsing for the qverse-worker binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "qverse-worker", about = "QVerse admissions backend worker")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the worker server (default if no subcommand given)
    Serve,
    /// Run database migrations and exit
    Migrate,
    /// Process one admission file from disk and exit. The annotated report
    /// overwrites the input file.
    Import {
        /// Path to the admission CSV file
        #[arg(long)]
        file: PathBuf,
        /// Free-text batch description
        #[arg(long, default_value = "")]
        description: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_migrate_command_parses() {
        let cli = Cli::parse_from(["qverse-worker", "migrate"]);
        assert!(matches!(cli.command, Some(Command::Migrate)));
    }

    #[test]
    fn test_cli_no_command_defaults_to_none() {
        let cli = Cli::parse_from(["qverse-worker"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_import_command_parses() {
        let cli = Cli::parse_from([
            "qverse-worker",
            "import",
            "--file",
            "admissions.csv",
            "--description",
            "2026 intake",
        ]);
        match cli.command {
            Some(Command::Import { file, description }) => {
                assert_eq!(file, PathBuf::from("admissions.csv"));
                assert_eq!(description, "2026 intake");
            }
            _ => panic!("expected import command"),
        }
    }
}
