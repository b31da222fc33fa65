//! Command-line interface for drivelog.
//!
//! This module provides the CLI structure for the `drivelog` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ConfigCommand, DriverAddArgs, DriverCommand, ListCommand, ServeCommand, SessionAddArgs,
    SessionCommand, TokenCommand,
};

/// drivelog - Keep a log of supervised driving sessions
///
/// Records driving sessions against drivers and road conditions, serves the
/// entry form backend over HTTP and summarises what has been driven.
#[derive(Debug, Parser)]
#[command(name = "drivelog")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server
    Serve(ServeCommand),

    /// List the choices of the entry form, with their tokens
    Options(ListCommand),

    /// Record or list driving sessions
    #[command(subcommand)]
    Session(SessionCommand),

    /// Manage drivers
    #[command(subcommand)]
    Driver(DriverCommand),

    /// Show distance and condition statistics
    Summary(ListCommand),

    /// Encode or decode identifier tokens
    #[command(subcommand)]
    Token(TokenCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::Category;
    use crate::logging::Verbosity;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_cli_name() {
        let cli = Cli::command();
        assert_eq!(cli.get_name(), "drivelog");
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity_flags() {
        assert_eq!(parse(&["drivelog", "summary"]).verbosity(), Verbosity::Normal);
        assert_eq!(parse(&["drivelog", "-v", "summary"]).verbosity(), Verbosity::Verbose);
        assert_eq!(parse(&["drivelog", "-vv", "summary"]).verbosity(), Verbosity::Trace);
        assert_eq!(parse(&["drivelog", "-q", "summary"]).verbosity(), Verbosity::Quiet);
        assert_eq!(parse(&["drivelog", "-q", "-v", "summary"]).verbosity(), Verbosity::Quiet);
    }

    #[test]
    fn test_parse_serve() {
        let cli = parse(&["drivelog", "serve", "--bind", "0.0.0.0:9000"]);
        match cli.command {
            Command::Serve(cmd) => assert_eq!(cmd.bind.unwrap().port(), 9000),
            other => panic!("unexpected command {other:?}"),
        }

        let cli = parse(&["drivelog", "serve"]);
        assert!(matches!(cli.command, Command::Serve(ServeCommand { bind: None })));
        assert!(Cli::try_parse_from(["drivelog", "serve", "--bind", "nowhere"]).is_err());
    }

    #[test]
    fn test_parse_session_add() {
        let cli = parse(&[
            "drivelog", "session", "add", "--date", "2024-05-01", "--start", "09:00", "--end",
            "10:00", "--mileage", "12", "--driver", "a", "--weather", "b", "--traffic", "c",
            "--road-type", "d", "--visibility", "e", "--maneuver", "f",
        ]);
        match cli.command {
            Command::Session(SessionCommand::Add(args)) => {
                assert_eq!(args.road_type, "d");
                assert_eq!(args.maneuver, "f");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_session_add_requires_every_field() {
        let result = Cli::try_parse_from(["drivelog", "session", "add", "--date", "2024-05-01"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_driver_commands() {
        let cli = parse(&["drivelog", "driver", "list", "--json"]);
        assert!(matches!(
            cli.command,
            Command::Driver(DriverCommand::List(ListCommand { json: true }))
        ));

        let cli = parse(&["drivelog", "driver", "delete", "abc_-123"]);
        match cli.command {
            Command::Driver(DriverCommand::Delete { token }) => assert_eq!(token, "abc_-123"),
            other => panic!("unexpected command {other:?}"),
        }

        let cli = parse(&[
            "drivelog",
            "driver",
            "add",
            "--name",
            "Ada",
            "--birthday",
            "1990-04-12",
            "--password",
            "secret123",
            "--confirm-password",
            "secret123",
        ]);
        assert!(matches!(cli.command, Command::Driver(DriverCommand::Add(_))));

        let cli = parse(&[
            "drivelog",
            "driver",
            "add",
            "--name",
            "Ada",
            "--birthday",
            "1990-04-12",
        ]);
        match cli.command {
            Command::Driver(DriverCommand::Add(args)) => {
                assert_eq!(args.password, None);
                assert_eq!(args.confirm_password, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_token_commands() {
        let cli = parse(&["drivelog", "token", "encode", "road_type", "3"]);
        match cli.command {
            Command::Token(TokenCommand::Encode { category, id }) => {
                assert_eq!(category, Category::RoadType);
                assert_eq!(id, 3);
            }
            other => panic!("unexpected command {other:?}"),
        }

        assert!(Cli::try_parse_from(["drivelog", "token", "encode", "planet", "3"]).is_err());
    }

    #[test]
    fn test_parse_with_config() {
        let cli = parse(&["drivelog", "-c", "/custom/config.toml", "config", "show"]);
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
        assert!(matches!(
            cli.command,
            Command::Config(ConfigCommand::Show { json: false })
        ));
    }
}
