//! Everything that reads from or writes to the ballot page.
//!
//! Each component talks to the page only through [`cdp_adapter::BrowsingSurface`] and turns
//! every failure into an empty or negative result; deciding what that means is the
//! orchestrator's job.

mod actuator;
mod extractor;
mod readiness;
mod reconciler;
pub mod scripts;

use serde::{Deserialize, Serialize};

pub use actuator::SubmissionActuator;
pub use extractor::EntryExtractor;
pub use readiness::{location_matches, ReadinessDetector, ReadinessTiming};
pub use reconciler::{reconcile, EntryMatcher, FormReconciler, TitleMatcher};

/// CSS selectors describing the ballot page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Selectors {
    pub entry_container: String,
    pub entry_link: String,
    pub entry_title: String,
    pub decision_control: String,
    pub decision_label: String,
    pub tie_sentinel: String,
    pub vote_form: String,
    pub rationale_field: String,
    pub submit_control: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            entry_container: "[data-project-index]".into(),
            entry_link: r#"a[href*="github.com"]"#.into(),
            entry_title: "h1, h2, h3, .text-xl, .text-3xl".into(),
            decision_control: r#"input[type="radio"][name="vote[winning_project_id]"]"#.into(),
            decision_label: "div > span".into(),
            tie_sentinel: "tie".into(),
            vote_form: r#"form[action="/votes"]"#.into(),
            rationale_field: r#"textarea[name="vote[explanation]"]"#.into(),
            submit_control: r#"input[type="submit"], button[type="submit"]"#.into(),
        }
    }
}
