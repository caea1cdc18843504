use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cdp_adapter::{AdapterError, BrowsingSurface, PageScript};
use decision_oracle::{DecisionAcquirer, DocumentFetcher, OracleClient, OracleError};
use page_scanner::scripts::{DECISION_TARGETS, EXTRACT_ENTRIES, SUBMIT_VOTE};
use page_scanner::{ReadinessTiming, Selectors};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tokio::time::sleep;
use url::Url;
use vote_orchestrator::{Components, CycleOutcome, Orchestrator, OrchestratorConfig};

const VOTE_PAGE: &str = "https://vote.example.com/votes/new";

/// Ballot page double that answers every query the same way on every cycle.
struct BallotPage {
    ready: AtomicBool,
    entries: Value,
    targets: Value,
    submit_delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    evaluated: Mutex<Vec<PageScript>>,
}

impl BallotPage {
    fn new() -> Self {
        Self {
            ready: AtomicBool::new(true),
            entries: json!([
                { "index": 0, "title": "Rocket", "href": "https://github.com/acme/rocket" },
                { "index": 1, "title": "Snail", "href": "https://github.com/acme/snail" }
            ]),
            targets: json!([
                { "id": "11", "title": "Rocket" },
                { "id": "tie", "title": "Tie" },
                { "id": "22", "title": "Snail" }
            ]),
            submit_delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            evaluated: Mutex::new(Vec::new()),
        }
    }

    fn slow_submit(mut self, delay: Duration) -> Self {
        self.submit_delay = delay;
        self
    }

    async fn calls(&self, name: &str) -> Vec<PageScript> {
        self.evaluated
            .lock()
            .await
            .iter()
            .filter(|script| script.name == name)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl BrowsingSurface for BallotPage {
    async fn current_location(&self) -> Result<String, AdapterError> {
        Ok(if self.ready.load(Ordering::SeqCst) {
            VOTE_PAGE.to_string()
        } else {
            "about:blank".to_string()
        })
    }

    async fn navigate(&self, _url: &str) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn evaluate(&self, script: &PageScript) -> Result<Value, AdapterError> {
        self.evaluated.lock().await.push(script.clone());
        match script.name {
            EXTRACT_ENTRIES => Ok(self.entries.clone()),
            DECISION_TARGETS => Ok(self.targets.clone()),
            SUBMIT_VOTE => {
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_in_flight.fetch_max(now, Ordering::SeqCst);
                sleep(self.submit_delay).await;
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(Value::Bool(true))
            }
            _ => Ok(Value::Null),
        }
    }
}

struct CannedOracle {
    reply: Result<String, OracleError>,
    calls: AtomicUsize,
}

impl CannedOracle {
    fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl OracleClient for CannedOracle {
    async fn complete(&self, _prompt: &str) -> Result<String, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone()
    }
}

struct NoDocuments;

#[async_trait]
impl DocumentFetcher for NoDocuments {
    async fn fetch(&self, _reference: &Url) -> Option<String> {
        None
    }
}

const SECOND_WINS: &str = r#"{"winner":"project2","explanation":"Snail explains itself better."}"#;

fn orchestrator(
    page: Arc<BallotPage>,
    oracle: Arc<CannedOracle>,
    config: OrchestratorConfig,
) -> Orchestrator {
    let timing = ReadinessTiming {
        navigation_settle: Duration::from_secs(1),
        confirm_settle: Duration::ZERO,
        fresh_settle: Duration::ZERO,
    };
    let components = Components::over_surface(
        page,
        Url::parse("https://vote.example.com").unwrap(),
        Selectors::default(),
        timing,
        DecisionAcquirer::new(oracle, Arc::new(NoDocuments), 1000),
    );
    Orchestrator::new(components, config)
}

#[tokio::test]
async fn decided_cycle_submits_once_and_counts_the_vote() {
    let page = Arc::new(BallotPage::new());
    let orch = orchestrator(
        page.clone(),
        Arc::new(CannedOracle::replying(SECOND_WINS)),
        OrchestratorConfig::default(),
    );

    assert_eq!(orch.run_cycle().await, CycleOutcome::Voted);

    let submits = page.calls(SUBMIT_VOTE).await;
    assert_eq!(submits.len(), 1);
    assert_eq!(submits[0].args["winningId"], "22");
    assert_eq!(submits[0].args["rationale"], "Snail explains itself better.");
    assert_eq!(submits[0].args["dryRun"], false);

    let status = orch.status();
    assert_eq!(status.vote_count, 1);
    assert_eq!(status.cycles, 1);
    assert_eq!(status.last_outcome, Some(CycleOutcome::Voted));
    assert!(!status.running);
}

#[tokio::test]
async fn dry_run_fills_the_form_without_counting() {
    let page = Arc::new(BallotPage::new());
    let orch = orchestrator(
        page.clone(),
        Arc::new(CannedOracle::replying(SECOND_WINS)),
        OrchestratorConfig {
            dry_run: true,
            ..OrchestratorConfig::default()
        },
    );

    assert_eq!(orch.run_cycle().await, CycleOutcome::Voted);

    let submits = page.calls(SUBMIT_VOTE).await;
    assert_eq!(submits[0].args["dryRun"], true);
    assert_eq!(orch.status().vote_count, 0);
}

#[tokio::test(start_paused = true)]
async fn page_never_ready_skips_extraction() {
    let page = Arc::new(BallotPage::new());
    page.ready.store(false, Ordering::SeqCst);
    let oracle = Arc::new(CannedOracle::replying(SECOND_WINS));
    let orch = orchestrator(page.clone(), oracle.clone(), OrchestratorConfig::default());

    assert_eq!(orch.run_cycle().await, CycleOutcome::NotReady);

    assert!(page.evaluated.lock().await.is_empty());
    assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unknown_winner_is_never_submitted() {
    let page = Arc::new(BallotPage::new());
    let orch = orchestrator(
        page.clone(),
        Arc::new(CannedOracle::replying(r#"{"winner":"project3","explanation":"?"}"#)),
        OrchestratorConfig::default(),
    );

    assert_eq!(orch.run_cycle().await, CycleOutcome::NoWinner);
    assert!(page.calls(SUBMIT_VOTE).await.is_empty());
    assert_eq!(orch.status().vote_count, 0);
}

#[tokio::test]
async fn unusable_decision_is_never_submitted() {
    let page = Arc::new(BallotPage::new());
    let orch = orchestrator(
        page.clone(),
        Arc::new(CannedOracle::replying("both are wonderful, I refuse")),
        OrchestratorConfig::default(),
    );

    assert_eq!(orch.run_cycle().await, CycleOutcome::DecisionUnavailable);
    assert!(page.calls(SUBMIT_VOTE).await.is_empty());
}

#[tokio::test]
async fn tie_without_tie_control_is_not_submitted() {
    let mut page = BallotPage::new();
    page.targets = json!([
        { "id": "11", "title": "Rocket" },
        { "id": "22", "title": "Snail" }
    ]);
    let page = Arc::new(page);
    let orch = orchestrator(
        page.clone(),
        Arc::new(CannedOracle::replying(r#"{"winner":"tie","explanation":"even"}"#)),
        OrchestratorConfig::default(),
    );

    assert_eq!(orch.run_cycle().await, CycleOutcome::NoWinner);
    assert!(page.calls(SUBMIT_VOTE).await.is_empty());
}

#[tokio::test]
async fn single_entry_is_insufficient_and_skips_the_oracle() {
    let mut page = BallotPage::new();
    page.entries = json!([
        { "index": 0, "title": "Rocket", "href": "https://github.com/acme/rocket" }
    ]);
    let page = Arc::new(page);
    let oracle = Arc::new(CannedOracle::replying(SECOND_WINS));
    let orch = orchestrator(page.clone(), oracle.clone(), OrchestratorConfig::default());

    assert_eq!(orch.run_cycle().await, CycleOutcome::Insufficient);
    assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn watchdog_and_continuation_never_overlap_submissions() {
    let page = Arc::new(BallotPage::new().slow_submit(Duration::from_secs(10)));
    let orch = orchestrator(
        page.clone(),
        Arc::new(CannedOracle::replying(SECOND_WINS)),
        OrchestratorConfig {
            cooldown: Duration::from_secs(5),
            watchdog: Duration::from_secs(1),
            ..OrchestratorConfig::default()
        },
    );

    assert!(orch.start());
    assert!(!orch.start());
    sleep(Duration::from_secs(2)).await;
    assert_eq!(orch.run_cycle().await, CycleOutcome::Busy);

    sleep(Duration::from_secs(60)).await;
    assert!(orch.stop());

    assert_eq!(page.max_in_flight.load(Ordering::SeqCst), 1);
    assert!(page.calls(SUBMIT_VOTE).await.len() >= 3);
    assert!(orch.status().vote_count >= 3);
}

#[tokio::test(start_paused = true)]
async fn stop_lets_the_inflight_cycle_finish_without_follow_up() {
    let page = Arc::new(BallotPage::new().slow_submit(Duration::from_secs(10)));
    let orch = orchestrator(
        page.clone(),
        Arc::new(CannedOracle::replying(SECOND_WINS)),
        OrchestratorConfig::default(),
    );

    assert!(orch.start());
    sleep(Duration::from_secs(2)).await;
    assert!(orch.stop());
    assert!(!orch.status().running);

    orch.wait_idle().await;
    sleep(Duration::from_secs(600)).await;

    assert_eq!(page.calls(SUBMIT_VOTE).await.len(), 1);
    assert_eq!(orch.status().vote_count, 1);
}

#[tokio::test(start_paused = true)]
async fn watchdog_retries_after_page_was_not_ready() {
    let page = Arc::new(BallotPage::new());
    page.ready.store(false, Ordering::SeqCst);
    let orch = orchestrator(
        page.clone(),
        Arc::new(CannedOracle::replying(SECOND_WINS)),
        OrchestratorConfig {
            watchdog: Duration::from_secs(60),
            ..OrchestratorConfig::default()
        },
    );

    assert!(orch.start());
    sleep(Duration::from_secs(30)).await;
    assert_eq!(orch.status().last_outcome, Some(CycleOutcome::NotReady));
    assert_eq!(orch.status().vote_count, 0);

    page.ready.store(true, Ordering::SeqCst);
    sleep(Duration::from_secs(31)).await;
    orch.stop();

    assert!(orch.status().vote_count >= 1);
}
