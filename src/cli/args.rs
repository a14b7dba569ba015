//! CLI argument parsing using clap.
//!
//! Defines the command-line interface for memo-cli.

use clap::Parser;
use std::path::PathBuf;

/// Memo CLI - capture notes into databases and pages through the memo backend
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "memo-cli")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Backend base URL (overrides settings and MEMO_BACKEND_URL)
    #[arg(short = 'u', long)]
    pub base_url: Option<String>,

    /// Directory for local state (overrides settings)
    #[arg(short = 'd', long)]
    pub data_dir: Option<PathBuf>,

    /// Run a single line (message or /command) and exit
    #[arg(short = 'e', long, conflicts_with = "file")]
    pub execute: Option<String>,

    /// Run lines from a file (one per line) and exit
    #[arg(short = 'f', long, conflicts_with = "execute")]
    pub file: Option<PathBuf>,

    /// Output events as JSON lines (for scripting/parsing)
    #[arg(long)]
    pub json: bool,

    /// Only print replies and errors
    #[arg(long, short = 'q')]
    pub quiet: bool,

    /// Show verbose output (debug information)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_default_values() {
        let args = Args::parse_from(["memo-cli"]);
        assert!(args.base_url.is_none());
        assert!(args.data_dir.is_none());
        assert!(!args.json);
        assert!(!args.quiet);
        assert!(!args.verbose);
    }

    #[test]
    fn test_args_execute_flag() {
        let args = Args::parse_from(["memo-cli", "-e", "/targets"]);
        assert_eq!(args.execute, Some("/targets".to_string()));
    }

    #[test]
    fn test_args_overrides() {
        let args = Args::parse_from([
            "memo-cli",
            "--base-url",
            "http://10.0.0.2:8000",
            "-d",
            "/tmp/memo",
        ]);
        assert_eq!(args.base_url.as_deref(), Some("http://10.0.0.2:8000"));
        assert_eq!(args.data_dir, Some(PathBuf::from("/tmp/memo")));
    }

    #[test]
    fn test_execute_conflicts_with_file() {
        assert!(Args::try_parse_from(["memo-cli", "-e", "hi", "-f", "lines.txt"]).is_err());
    }
}
