//! The scan, decide, submit loop.
//!
//! Triggers (start, watchdog tick, post-cooldown continuation, manual) funnel into one driver
//! task. A cycle only runs while it holds the cycle guard, and it keeps holding it through the
//! cooldown, so two cycles never overlap and the page always gets its reload time.

mod config;
mod context;
mod cycle;
pub mod metrics;
mod orchestrator;

pub use config::OrchestratorConfig;
pub use context::{RunContext, StatusSnapshot};
pub use cycle::{Components, CycleOutcome, Trigger};
pub use orchestrator::Orchestrator;
