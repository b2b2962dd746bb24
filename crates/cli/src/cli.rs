//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// brandcast - rotating broadcast dispatcher
#[derive(Parser, Debug)]
#[command(
    name = "brandcast",
    author,
    version,
    about = "Rotating broadcast dispatcher",
    long_about = "Periodically rotates through a list of message templates and delivers the\n\
                  current one, encoded as a length-prefixed frame, to every connected client.\n\n\
                  Clients connect over TCP and identify themselves with a handshake line."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "BRANDCAST_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "BRANDCAST_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the TCP host and the dispatcher
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration and template previews
    Info(InfoArgs),

    /// Print the encoded frame for a message
    Encode(EncodeArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON), created with defaults if missing
    #[arg(
        short,
        long,
        default_value = "brandcast.toml",
        env = "BRANDCAST_CONFIG"
    )]
    pub config: PathBuf,

    /// Override the listen address from configuration
    #[arg(long, env = "BRANDCAST_LISTEN")]
    pub listen: Option<String>,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "BRANDCAST_METRICS_PORT")]
    pub metrics_port: u16,

    /// Read admin commands (reload, broadcast, index <n>, status, stop) from stdin
    #[arg(long)]
    pub console: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "brandcast.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "brandcast.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `encode` command
#[derive(Parser, Debug)]
pub struct EncodeArgs {
    /// Message to encode
    pub message: String,

    /// Print the frame as hex instead of a byte list
    #[arg(long)]
    pub hex: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_defaults() {
        let cli = Cli::try_parse_from(["brandcast", "run"]).unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.config, PathBuf::from("brandcast.toml"));
                assert_eq!(args.metrics_port, 0);
                assert!(!args.console);
                assert!(args.listen.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_encode_hex() {
        let cli = Cli::try_parse_from(["brandcast", "-q", "encode", "DeepCraft", "--hex"]).unwrap();
        assert!(cli.quiet);
        match cli.command {
            Commands::Encode(args) => {
                assert_eq!(args.message, "DeepCraft");
                assert!(args.hex);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["brandcast", "-q", "-v", "info"]).is_err());
    }
}
