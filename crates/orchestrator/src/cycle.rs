use std::fmt;
use std::sync::Arc;

use ballotbot_core_types::Decision;
use cdp_adapter::BrowsingSurface;
use decision_oracle::DecisionAcquirer;
use page_scanner::{
    EntryExtractor, FormReconciler, ReadinessDetector, ReadinessTiming, Selectors,
    SubmissionActuator,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::OrchestratorConfig;
use crate::context::RunContext;

/// Why a cycle was asked for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trigger {
    Start,
    Watchdog,
    Continuation,
    Manual,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::Start => "start",
            Trigger::Watchdog => "watchdog",
            Trigger::Continuation => "continuation",
            Trigger::Manual => "manual",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleOutcome {
    Voted,
    NotReady,
    Insufficient,
    DecisionUnavailable,
    NoWinner,
    SubmissionFailed,
    /// Another cycle held the guard.
    Busy,
    /// The orchestrator was stopped before the cycle began.
    Stopped,
}

impl CycleOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleOutcome::Voted => "voted",
            CycleOutcome::NotReady => "not_ready",
            CycleOutcome::Insufficient => "insufficient",
            CycleOutcome::DecisionUnavailable => "decision_unavailable",
            CycleOutcome::NoWinner => "no_winner",
            CycleOutcome::SubmissionFailed => "submission_failed",
            CycleOutcome::Busy => "busy",
            CycleOutcome::Stopped => "stopped",
        }
    }

    /// Outcomes that reached the decision step go through cooldown and loop again. The others
    /// wait for the watchdog.
    pub fn continues(&self) -> bool {
        matches!(
            self,
            CycleOutcome::Voted
                | CycleOutcome::DecisionUnavailable
                | CycleOutcome::NoWinner
                | CycleOutcome::SubmissionFailed
        )
    }

    /// False for triggers that never started a cycle.
    pub fn ran(&self) -> bool {
        !matches!(self, CycleOutcome::Busy | CycleOutcome::Stopped)
    }
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The page and oracle components one cycle composes.
pub struct Components {
    pub readiness: ReadinessDetector,
    pub extractor: EntryExtractor,
    pub reconciler: FormReconciler,
    pub acquirer: DecisionAcquirer,
    pub actuator: SubmissionActuator,
}

impl Components {
    /// Wires every page component to the same browsing surface.
    pub fn over_surface(
        surface: Arc<dyn BrowsingSurface>,
        base_url: Url,
        selectors: Selectors,
        timing: ReadinessTiming,
        acquirer: DecisionAcquirer,
    ) -> Self {
        Self {
            readiness: ReadinessDetector::new(surface.clone(), base_url, timing),
            extractor: EntryExtractor::new(surface.clone(), selectors.clone()),
            reconciler: FormReconciler::new(surface.clone(), selectors.clone()),
            acquirer,
            actuator: SubmissionActuator::new(surface, selectors),
        }
    }

    /// One pass from readiness check to optional submission. Must run under the cycle guard.
    pub(crate) async fn run(
        &self,
        config: &OrchestratorConfig,
        context: &RunContext,
    ) -> CycleOutcome {
        if !self
            .readiness
            .ensure_ready(&config.vote_path, config.max_attempts)
            .await
        {
            return CycleOutcome::NotReady;
        }

        let entries = self.extractor.extract().await;
        let targets = self.reconciler.current_targets().await;
        if entries.len() < 2 {
            info!(target: "orchestrator", entries = entries.len(), "not enough entries to vote");
            return CycleOutcome::Insufficient;
        }
        let Some(matchup) = self.reconciler.reconcile(&targets, &entries) else {
            info!(target: "orchestrator", targets = targets.len(), "form offers fewer than two contenders");
            return CycleOutcome::Insufficient;
        };

        let decision = match self.acquirer.decide(&matchup.first, &matchup.second).await {
            Ok(decision) => decision,
            Err(err) => {
                warn!(target: "orchestrator", %err, "no decision this cycle");
                return CycleOutcome::DecisionUnavailable;
            }
        };
        let Decision { outcome, rationale } = decision;

        let Some(winning_id) =
            matchup.winning_id(outcome, &targets, self.reconciler.tie_sentinel())
        else {
            warn!(target: "orchestrator", %outcome, "decision maps to no form option");
            return CycleOutcome::NoWinner;
        };

        debug!(
            target: "orchestrator",
            first = matchup.first.title(),
            second = matchup.second.title(),
            winning_id,
            "submitting vote"
        );
        if !self
            .actuator
            .submit(&targets, Some(winning_id), &rationale, config.dry_run)
            .await
        {
            return CycleOutcome::SubmissionFailed;
        }

        if config.dry_run {
            info!(target: "orchestrator", winning_id, "dry run: vote prepared, not submitted");
        } else {
            let total = context.count_vote();
            info!(target: "orchestrator", winning_id, vote_count = total, "vote submitted");
        }
        CycleOutcome::Voted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_decided_cycles_continue() {
        assert!(CycleOutcome::Voted.continues());
        assert!(CycleOutcome::DecisionUnavailable.continues());
        assert!(CycleOutcome::NoWinner.continues());
        assert!(CycleOutcome::SubmissionFailed.continues());
        assert!(!CycleOutcome::NotReady.continues());
        assert!(!CycleOutcome::Insufficient.continues());
        assert!(!CycleOutcome::Busy.continues());
        assert!(!CycleOutcome::Stopped.continues());
    }
}
