use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Path of the ballot page, relative to the site base URL.
    pub vote_path: String,
    pub max_attempts: u32,
    /// Wait after a decided cycle before the next readiness check.
    pub cooldown: Duration,
    /// Period of the independent watchdog trigger.
    pub watchdog: Duration,
    /// Fill the form but never press submit. Dry-run votes are not counted.
    pub dry_run: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            vote_path: "/votes/new".to_string(),
            max_attempts: 3,
            cooldown: Duration::from_secs(5),
            watchdog: Duration::from_secs(5 * 60),
            dry_run: false,
        }
    }
}
