use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::cli::context::CliContext;
use crate::metrics::spawn_status_server;

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Fill the vote form but never press submit
    #[arg(long)]
    pub dry_run: bool,

    /// Do not wait for the credential store before voting
    #[arg(long)]
    pub skip_credentials: bool,
}

/// How long a stop waits for an in-flight cycle before exiting anyway.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(60);

pub async fn cmd_run(args: RunArgs, ctx: &CliContext) -> Result<()> {
    let orchestrator = ctx.orchestrator(args.dry_run)?;
    let config = ctx.config();

    if args.skip_credentials {
        info!("skipping credential import");
    } else {
        let gate = ctx.gate()?;
        let applied = gate
            .acquire(
                Duration::from_millis(config.credentials.max_wait_ms),
                Duration::from_millis(config.credentials.poll_interval_ms),
            )
            .await;
        if !applied {
            warn!(
                path = %gate.store_path().display(),
                "no new credentials applied; continuing with the current session"
            );
        }
    }

    let _status_server = spawn_status_server(ctx.status_port(), orchestrator.context());
    orchestrator.start();

    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;
    info!("interrupt received; stopping");
    orchestrator.stop();

    if timeout(DRAIN_TIMEOUT, orchestrator.wait_idle()).await.is_err() {
        warn!("in-flight cycle still running; exiting anyway");
    }

    let status = orchestrator.status();
    ctx.output().emit(&status, |status| {
        println!(
            "Stopped after {} cycles, {} votes submitted",
            status.cycles, status.vote_count
        );
    })
}
