use super::config::cmd_config;
use super::cookies::cmd_cookies;
use super::env::CliArgs;
use super::info::cmd_info;
use super::run::cmd_run;
use super::scan::cmd_scan;
use super::status::cmd_status;
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;
use anyhow::Result;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    match cli.command.clone() {
        Commands::Run(args) => cmd_run(args, ctx).await,
        Commands::Scan => cmd_scan(ctx).await,
        Commands::Cookies(args) => cmd_cookies(args, ctx).await,
        Commands::Status(args) => cmd_status(args, ctx).await,
        Commands::Config(args) => cmd_config(args, ctx).await,
        Commands::Info => cmd_info(ctx).await,
    }
}
