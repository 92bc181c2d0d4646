//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(name = "shotwatch", version, about = "Back up new screenshots to Google Drive")]
pub struct Cli {
    /// Use alternate config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory to watch (prompted for when neither flag nor config sets it)
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Email address granted writer access to the backup folder
    #[arg(long)]
    pub email: Option<String>,

    /// Log output format, overriding `logging.format`
    #[arg(long, value_enum, global = true)]
    pub log_format: Option<LogFormat>,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Sign in with Google and store the tokens in the system keyring
    Login,
    /// Remove stored Google credentials
    Logout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Human,
    Json,
}

impl LogFormat {
    /// Maps the `logging.format` config value; anything but "json" is human
    pub fn from_config(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Human
        }
    }
}
