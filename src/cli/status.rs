use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use vote_orchestrator::StatusSnapshot;

use crate::cli::context::CliContext;
use crate::metrics::status_addr;

#[derive(Args, Clone, Debug)]
pub struct StatusArgs {
    /// Address of the running instance (defaults to 127.0.0.1:<status-port>)
    #[arg(long)]
    pub addr: Option<String>,
}

pub async fn cmd_status(args: StatusArgs, ctx: &CliContext) -> Result<()> {
    let addr = match (args.addr, status_addr(ctx.status_port())) {
        (Some(addr), _) => addr,
        (None, Some(local)) => local.to_string(),
        (None, None) => bail!("status server disabled; pass --addr"),
    };
    let url = if addr.starts_with("http://") || addr.starts_with("https://") {
        format!("{}/status", addr.trim_end_matches('/'))
    } else {
        format!("http://{addr}/status")
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()?;
    let status: StatusSnapshot = client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("is ballotbot running? could not reach {url}"))?
        .error_for_status()?
        .json()
        .await
        .context("unexpected status payload")?;

    ctx.output().emit(&status, |status| {
        println!("Running: {}", if status.running { "yes" } else { "no" });
        if let Some(started) = status.started_at {
            println!("Started: {}", started.to_rfc3339());
        }
        println!("Cycles: {}", status.cycles);
        println!("Votes: {}", status.vote_count);
        match status.last_outcome {
            Some(outcome) => println!("Last outcome: {outcome}"),
            None => println!("Last outcome: n/a"),
        }
    })
}
