//! CLI argument definitions using clap derive
//!
//! Defines all command-line arguments and subcommands.

use crate::ingress::ReportKind;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

/// Alert and event dispatcher
///
/// Watches host metrics, accepts external status/event/news reports, and
/// delivers deduplicated notifications to chat channels.
#[derive(Parser, Debug)]
#[command(name = "herald")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "HERALD_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the monitor loop and delivery worker
    Run(RunArgs),

    /// Validate configuration and print the effective settings
    Check,

    /// Sample tracked metrics once and show their levels
    Sample,

    /// Validate and normalize a report file without sending it
    Normalize(NormalizeArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Monitor interval in seconds (overrides config)
    #[arg(short, long)]
    pub interval: Option<u64>,

    /// Run one tick, drain the queue and exit
    #[arg(long)]
    pub once: bool,

    /// Also read newline-delimited tagged JSON reports from stdin
    #[arg(long)]
    pub stdin: bool,

    /// Origin label for metric alerts (overrides config)
    #[arg(long)]
    pub host_label: Option<String>,

    /// Disable colored notifier output
    #[arg(long)]
    pub no_color: bool,
}

/// Arguments for the normalize command
#[derive(Parser, Debug)]
pub struct NormalizeArgs {
    /// Report kind
    #[arg(short, long, value_enum)]
    pub kind: ReportKindArg,

    /// JSON file containing the report body
    pub file: PathBuf,

    /// Bearer token to check against the ingress API key
    #[arg(short, long, env = "HERALD_TOKEN")]
    pub token: Option<String>,

    /// Ingress API key (overrides config)
    #[arg(long, env = "HERALD_API_KEY")]
    pub api_key: Option<String>,
}

/// Report kind argument
#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum ReportKindArg {
    /// Server status report
    Status,
    /// General event
    Event,
    /// News item
    News,
}

impl From<ReportKindArg> for ReportKind {
    fn from(arg: ReportKindArg) -> Self {
        match arg {
            ReportKindArg::Status => ReportKind::Status,
            ReportKindArg::Event => ReportKind::Event,
            ReportKindArg::News => ReportKind::News,
        }
    }
}

/// Output format
#[derive(ValueEnum, Debug, Clone, Copy, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format for machine parsing
    Json,
    /// Compact single-line format
    Compact,
}

/// Generate shell completions and print to stdout
pub fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_check() {
        let args = Cli::try_parse_from(["herald", "check"]).unwrap();
        assert!(matches!(args.command, Commands::Check));
    }

    #[test]
    fn test_cli_parse_verbose() {
        let args = Cli::try_parse_from(["herald", "-v", "sample"]).unwrap();
        assert!(args.verbose);
    }

    #[test]
    fn test_cli_parse_config_path() {
        let args = Cli::try_parse_from(["herald", "-c", "/tmp/h.toml", "check"]).unwrap();
        assert_eq!(args.config.as_deref(), Some("/tmp/h.toml"));
    }

    #[test]
    fn test_cli_parse_run_args() {
        let args = Cli::try_parse_from(["herald", "run", "--interval", "60", "--once", "--stdin"])
            .unwrap();
        if let Commands::Run(run) = args.command {
            assert_eq!(run.interval, Some(60));
            assert!(run.once);
            assert!(run.stdin);
        } else {
            panic!("Expected Run command");
        }
    }

    #[test]
    fn test_cli_parse_normalize() {
        let args =
            Cli::try_parse_from(["herald", "normalize", "--kind", "news", "item.json"]).unwrap();
        if let Commands::Normalize(normalize) = args.command {
            assert_eq!(ReportKind::from(normalize.kind), ReportKind::News);
            assert_eq!(normalize.file, PathBuf::from("item.json"));
        } else {
            panic!("Expected Normalize command");
        }
    }

    #[test]
    fn test_cli_parse_normalize_token() {
        let args = Cli::try_parse_from([
            "herald", "normalize", "-k", "event", "--token", "s3cret", "--api-key", "s3cret",
            "event.json",
        ])
        .unwrap();
        if let Commands::Normalize(normalize) = args.command {
            assert_eq!(normalize.token.as_deref(), Some("s3cret"));
            assert_eq!(normalize.api_key.as_deref(), Some("s3cret"));
        } else {
            panic!("Expected Normalize command");
        }
    }

    #[test]
    fn test_cli_parse_run_overrides() {
        let args = Cli::try_parse_from(["herald", "run", "--host-label", "edge-1", "--no-color"])
            .unwrap();
        if let Commands::Run(run) = args.command {
            assert_eq!(run.host_label.as_deref(), Some("edge-1"));
            assert!(run.no_color);
        } else {
            panic!("Expected Run command");
        }
    }

    #[test]
    fn test_cli_normalize_rejects_unknown_kind() {
        let result = Cli::try_parse_from(["herald", "normalize", "--kind", "rss", "item.json"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parse_format() {
        let args = Cli::try_parse_from(["herald", "--format", "json", "check"]).unwrap();
        assert!(matches!(args.format, OutputFormat::Json));
    }
}
