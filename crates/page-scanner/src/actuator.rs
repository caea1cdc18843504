use std::sync::Arc;

use ballotbot_core_types::DecisionTarget;
use cdp_adapter::BrowsingSurface;
use serde_json::Value;
use tracing::{info, warn};

use crate::{scripts, Selectors};

pub struct SubmissionActuator {
    surface: Arc<dyn BrowsingSurface>,
    selectors: Selectors,
}

impl SubmissionActuator {
    pub fn new(surface: Arc<dyn BrowsingSurface>, selectors: Selectors) -> Self {
        Self { surface, selectors }
    }

    /// Fills the vote form and, unless `dry_run`, submits it.
    ///
    /// Returns `true` only when the submit control was found and clicked, or on a dry run that
    /// found the form. A `winning_id` missing from `targets` is refused without touching the page.
    pub async fn submit(
        &self,
        targets: &[DecisionTarget],
        winning_id: Option<&str>,
        rationale: &str,
        dry_run: bool,
    ) -> bool {
        if let Some(id) = winning_id {
            if !targets.iter().any(|target| target.selectable_id == id) {
                warn!(target: "submission", winning_id = id, "winner is not a current form option");
                return false;
            }
        }

        let script = scripts::submit_vote(&self.selectors, winning_id, rationale, dry_run);
        match self.surface.evaluate(&script).await {
            Ok(Value::Bool(true)) => {
                info!(target: "submission", ?winning_id, dry_run, "vote form submitted");
                true
            }
            Ok(other) => {
                warn!(target: "submission", result = %other, "vote form or submit control missing");
                false
            }
            Err(err) => {
                warn!(target: "submission", %err, "submission query failed");
                false
            }
        }
    }
}
