//! `rigpose-cli` – command line entry point for the pose visualiser backend.
//!
//! The `rigpose` binary:
//!
//! 1. Reads `~/.rigpose/config.toml` (or `--config <path>`), falling back to
//!    built-in defaults, then applies `RIGPOSE_*` environment overrides.
//! 2. Initialises structured logging (`RIGPOSE_LOG_FORMAT=json` for JSON,
//!    `OTEL_EXPORTER_OTLP_ENDPOINT` to export spans).
//! 3. Dispatches to one of the sub-commands:
//!    `serve`, `resolve`, `schema`, `init-config`, `help`.

mod commands;
mod config;

use clap::{CommandFactory, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

/// Camera/light pose resolver and API server.
#[derive(Debug, Parser)]
#[command(name = "rigpose", version, about = "Camera/light pose resolver and API server")]
struct Cli {
    /// Path to the TOML config file (default `~/.rigpose/config.toml`).
    #[arg(long, short = 'c', global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Subcommand)]
enum Command {
    /// Start the pose API (default port 8000).
    Serve,
    /// Resolve every frame once and print the poses as JSON.
    Resolve {
        /// Capture log to read instead of the configured one.
        #[arg(long, value_name = "FILE")]
        log: Option<PathBuf>,
        /// Write the JSON here instead of stdout.
        #[arg(long, short = 'o', value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Print the JSON schema of a resolved frame.
    Schema,
    /// Write the default config file.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(config::config_path);

    // Only the commands that read the capture log set up logging.
    let result = match cli.command {
        None => Cli::command()
            .print_help()
            .map_err(|e| format!("Failed to print help: {e}")),
        Some(Command::Schema) => commands::print_schema(),
        Some(Command::InitConfig { force }) => commands::init_config(&config_path, force),
        Some(Command::Serve) => {
            let _telemetry = rigpose_runtime::init_tracing("rigpose");
            config::load_effective(&config_path).and_then(commands::serve)
        }
        Some(Command::Resolve { log, out }) => {
            let _telemetry = rigpose_runtime::init_tracing("rigpose");
            config::load_effective(&config_path).and_then(|cfg| commands::resolve(cfg, log, out))
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("rigpose").chain(args.iter().copied()))
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_arguments_has_no_command() {
        assert!(parse(&[]).unwrap().command.is_none());
    }

    #[test]
    fn config_is_global() {
        let cli = parse(&["--config", "/etc/rigpose.toml", "serve"]).unwrap();
        assert_eq!(cli.command, Some(Command::Serve));
        assert_eq!(cli.config, Some(PathBuf::from("/etc/rigpose.toml")));

        let cli = parse(&["serve", "-c", "/etc/rigpose.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/rigpose.toml")));
    }

    #[test]
    fn resolve_options_in_any_order() {
        let cli = parse(&["resolve", "--out", "poses.json", "--log", "log.json"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Command::Resolve {
                log: Some(PathBuf::from("log.json")),
                out: Some(PathBuf::from("poses.json")),
            })
        );
    }

    #[test]
    fn init_config_uses_kebab_case() {
        let cli = parse(&["init-config", "--force"]).unwrap();
        assert_eq!(cli.command, Some(Command::InitConfig { force: true }));
    }

    #[test]
    fn help_subcommand_is_available() {
        assert_eq!(parse(&["help"]).unwrap_err().kind(), ErrorKind::DisplayHelp);
    }

    #[test]
    fn errors_are_reported() {
        assert_eq!(
            parse(&["launch"]).unwrap_err().kind(),
            ErrorKind::InvalidSubcommand
        );
        assert_eq!(
            parse(&["serve", "--verbose"]).unwrap_err().kind(),
            ErrorKind::UnknownArgument
        );
        assert!(parse(&["resolve", "--out"]).is_err());
    }
}
