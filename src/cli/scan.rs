use anyhow::Result;
use serde::Serialize;
use vote_orchestrator::{CycleOutcome, StatusSnapshot};

use crate::cli::context::CliContext;

#[derive(Serialize)]
struct ScanReport {
    outcome: CycleOutcome,
    status: StatusSnapshot,
}

/// One guarded cycle with submission disabled.
pub async fn cmd_scan(ctx: &CliContext) -> Result<()> {
    let orchestrator = ctx.orchestrator(true)?;
    let outcome = orchestrator.run_cycle().await;
    let report = ScanReport {
        outcome,
        status: orchestrator.status(),
    };

    ctx.output().emit(&report, |report| {
        let summary = match report.outcome {
            CycleOutcome::Voted => "vote form filled (dry run, not submitted)",
            CycleOutcome::NotReady => "ballot page could not be reached",
            CycleOutcome::Insufficient => "fewer than two votable entries",
            CycleOutcome::DecisionUnavailable => "judge gave no usable decision",
            CycleOutcome::NoWinner => "decision matches no form option",
            CycleOutcome::SubmissionFailed => "vote form not found",
            CycleOutcome::Busy => "another cycle was running",
            CycleOutcome::Stopped => "stopped",
        };
        println!("Scan result: {} ({})", report.outcome, summary);
    })
}
