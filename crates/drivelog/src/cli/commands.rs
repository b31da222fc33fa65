//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::category::Category;
use crate::drivers::DriverForm;
use crate::intake::SessionForm;

/// Serve command arguments.
#[derive(Debug, Args)]
pub struct ServeCommand {
    /// Address to listen on (overrides `server.bind`)
    #[arg(short, long, value_name = "ADDR")]
    pub bind: Option<SocketAddr>,
}

/// Arguments shared by the listing commands.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Session commands.
#[derive(Debug, Subcommand)]
pub enum SessionCommand {
    /// Record a driving session
    Add(SessionAddArgs),

    /// List recorded sessions, newest first
    List(ListCommand),
}

/// Fields of a new session. References are given as tokens
/// (see `drivelog options`).
#[derive(Debug, Args)]
pub struct SessionAddArgs {
    /// Session date (YYYY-MM-DD)
    #[arg(long)]
    pub date: String,

    /// Start time (HH:MM or HH:MM:SS)
    #[arg(long)]
    pub start: String,

    /// End time (HH:MM or HH:MM:SS)
    #[arg(long)]
    pub end: String,

    /// Distance driven
    #[arg(long)]
    pub mileage: String,

    /// Driver token
    #[arg(long)]
    pub driver: String,

    /// Weather token
    #[arg(long)]
    pub weather: String,

    /// Traffic token
    #[arg(long)]
    pub traffic: String,

    /// Road type token
    #[arg(long)]
    pub road_type: String,

    /// Visibility token
    #[arg(long)]
    pub visibility: String,

    /// Maneuver token
    #[arg(long)]
    pub maneuver: String,
}

impl From<SessionAddArgs> for SessionForm {
    fn from(args: SessionAddArgs) -> Self {
        Self {
            date: args.date,
            start_time: args.start,
            end_time: args.end,
            mileage: args.mileage,
            driver_id: args.driver,
            weather_id: args.weather,
            traffic_id: args.traffic,
            road_type_id: args.road_type,
            visibility_id: args.visibility,
            maneuver_id: args.maneuver,
        }
    }
}

/// Driver commands.
#[derive(Debug, Subcommand)]
pub enum DriverCommand {
    /// Add a driver
    Add(DriverAddArgs),

    /// List drivers with their tokens
    List(ListCommand),

    /// Delete a driver and all of their sessions
    Delete {
        /// Driver token
        token: String,
    },
}

/// Fields of a new driver.
#[derive(Debug, Args)]
pub struct DriverAddArgs {
    /// Unique driver name
    #[arg(long)]
    pub name: String,

    /// Birthday (YYYY-MM-DD)
    #[arg(long)]
    pub birthday: String,

    /// Password (prompted for when omitted; the flag is visible to other users)
    #[arg(long)]
    pub password: Option<String>,

    /// Password confirmation (prompted for when omitted)
    #[arg(long)]
    pub confirm_password: Option<String>,
}

impl DriverAddArgs {
    /// Build the form, asking `prompt` for any password left off the
    /// command line.
    ///
    /// # Errors
    ///
    /// Returns the prompt's error.
    pub fn into_form(
        self,
        mut prompt: impl FnMut(&str) -> io::Result<String>,
    ) -> io::Result<DriverForm> {
        let password = match self.password {
            Some(password) => password,
            None => prompt("Password: ")?,
        };
        let confirm_password = match self.confirm_password {
            Some(confirm) => confirm,
            None => prompt("Confirm password: ")?,
        };
        Ok(DriverForm {
            driver_name: self.name,
            birthday: self.birthday,
            password,
            confirm_password,
        })
    }
}

/// Token commands, for inspecting and minting tokens by hand.
#[derive(Debug, Subcommand)]
pub enum TokenCommand {
    /// Print the token for an id
    Encode {
        /// Category (driver, weather, traffic, road_type, visibility, maneuver)
        category: Category,
        /// Row id
        id: i64,
    },

    /// Print the id behind a token
    Decode {
        /// Category the token was issued for
        category: Category,
        /// The token
        token: String,
    },
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}
