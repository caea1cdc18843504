use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use credential_gate::parse_records;
use serde::Serialize;
use tokio::fs;

use crate::cli::context::CliContext;

#[derive(Args, Clone, Debug)]
pub struct CookiesArgs {
    #[command(subcommand)]
    pub action: CookiesAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum CookiesAction {
    /// Wait for the credential store and apply its records to the browser session
    Import {
        /// Upper bound on the wait, e.g. `5m` (defaults to credentials.max_wait_ms)
        #[arg(long, value_parser = humantime::parse_duration)]
        max_wait: Option<Duration>,
    },

    /// Back up the session cookies of the ballot domain as JSON
    Export {
        /// Output file (defaults to credentials.backup_path)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Show the state of the credential store
    Status,
}

#[derive(Serialize)]
struct StoreReport {
    path: PathBuf,
    state: &'static str,
    records: usize,
}

pub async fn cmd_cookies(args: CookiesArgs, ctx: &CliContext) -> Result<()> {
    let config = ctx.config();
    match args.action {
        CookiesAction::Import { max_wait } => {
            let gate = ctx.gate()?;
            let max_wait =
                max_wait.unwrap_or(Duration::from_millis(config.credentials.max_wait_ms));
            println!(
                "Waiting up to {} for name=value lines in {}",
                humantime::format_duration(max_wait),
                gate.store_path().display()
            );
            let applied = gate
                .acquire(
                    max_wait,
                    Duration::from_millis(config.credentials.poll_interval_ms),
                )
                .await;
            if !applied {
                bail!("no credentials applied before the wait ran out");
            }
            println!("Credentials applied");
        }
        CookiesAction::Export { out } => {
            let gate = ctx.gate()?;
            let path = out.unwrap_or_else(|| config.credentials.backup_path.clone());
            let snapshot = gate
                .export(&config.site.cookie_domain, &path)
                .await
                .context("exporting session cookies")?;
            ctx.output().emit(&snapshot, |snapshot| {
                println!(
                    "Exported {} cookies for {} to {}",
                    snapshot.cookies.len(),
                    snapshot.domain,
                    path.display()
                );
            })?;
        }
        CookiesAction::Status => {
            let gate = ctx.gate()?;
            let state = gate.state().context("reading credential store")?;
            let path = gate.store_path().to_path_buf();
            let records = match fs::read_to_string(&path).await {
                Ok(content) => parse_records(&content).len(),
                Err(_) => 0,
            };
            let report = StoreReport {
                path,
                state: state.as_str(),
                records,
            };
            ctx.output().emit(&report, |report| {
                println!("Credential store: {}", report.path.display());
                println!("State: {}", report.state);
                println!("Records: {}", report.records);
            })?;
        }
    }
    Ok(())
}
