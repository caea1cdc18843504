use clap::Subcommand;

use super::config::ConfigArgs;
use super::cookies::CookiesArgs;
use super::run::RunArgs;
use super::status::StatusArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Import credentials, then vote until interrupted
    Run(RunArgs),

    /// Run one dry-run cycle and print what would be submitted
    Scan,

    /// Manage the credential store and session cookies
    Cookies(CookiesArgs),

    /// Query the status endpoint of a running instance
    Status(StatusArgs),

    /// Manage ballotbot configuration
    Config(ConfigArgs),

    /// Show version and environment information
    Info,
}
