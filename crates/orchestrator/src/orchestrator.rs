use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::OrchestratorConfig;
use crate::context::{RunContext, StatusSnapshot};
use crate::cycle::{Components, CycleOutcome, Trigger};
use crate::metrics;

const TRIGGER_BUFFER: usize = 16;

struct Shared {
    components: Components,
    config: OrchestratorConfig,
    context: Arc<RunContext>,
    cycle_guard: Arc<AsyncMutex<()>>,
}

impl Shared {
    async fn execute(&self, trigger: Trigger) -> CycleOutcome {
        if trigger != Trigger::Manual && !self.context.is_running() {
            debug!(target: "orchestrator", trigger = trigger.as_str(), "stopped; cycle skipped");
            self.finish(CycleOutcome::Stopped, Instant::now(), 0);
            return CycleOutcome::Stopped;
        }

        let votes_before = self.context.vote_count();
        let started = Instant::now();
        info!(target: "orchestrator", trigger = trigger.as_str(), "cycle started");
        let outcome = self.components.run(&self.config, &self.context).await;
        self.finish(outcome, started, votes_before);
        outcome
    }

    fn finish(&self, outcome: CycleOutcome, started: Instant, votes_before: u64) {
        let counted_vote = self.context.vote_count() > votes_before;
        metrics::record_cycle(outcome, started.elapsed(), counted_vote);
        self.context.record(outcome);
        info!(
            target: "orchestrator",
            outcome = outcome.as_str(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "cycle finished"
        );
    }

    fn busy(&self, trigger: Trigger) -> CycleOutcome {
        debug!(target: "orchestrator", trigger = trigger.as_str(), "cycle in flight; trigger dropped");
        metrics::record_cycle(CycleOutcome::Busy, Duration::ZERO, false);
        self.context.record(CycleOutcome::Busy);
        CycleOutcome::Busy
    }
}

struct Worker {
    cancel: CancellationToken,
    driver: JoinHandle<()>,
    watchdog: JoinHandle<()>,
}

/// Owns the run context and drives cycles from start until stop.
pub struct Orchestrator {
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
}

impl Orchestrator {
    pub fn new(components: Components, config: OrchestratorConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                components,
                config,
                context: Arc::new(RunContext::new()),
                cycle_guard: Arc::new(AsyncMutex::new(())),
            }),
            worker: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.shared.config
    }

    /// Shared handle for status reporting.
    pub fn context(&self) -> Arc<RunContext> {
        Arc::clone(&self.shared.context)
    }

    pub fn status(&self) -> StatusSnapshot {
        self.shared.context.snapshot()
    }

    /// Starts the driver and the watchdog and fires the first cycle. Returns `false` if
    /// already running. Must be called from within a tokio runtime.
    pub fn start(&self) -> bool {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return false;
        }

        let cancel = CancellationToken::new();
        let (triggers, inbox) = mpsc::channel(TRIGGER_BUFFER);
        self.shared.context.mark_started();
        metrics::set_running(true);

        let driver = tokio::spawn(drive(
            Arc::clone(&self.shared),
            inbox,
            triggers.clone(),
            cancel.clone(),
        ));
        let watchdog = tokio::spawn(watchdog(
            triggers.clone(),
            self.shared.config.watchdog,
            cancel.clone(),
        ));
        if triggers.try_send(Trigger::Start).is_err() {
            warn!(target: "orchestrator", "could not queue the initial cycle");
        }

        info!(
            target: "orchestrator",
            cooldown_ms = self.shared.config.cooldown.as_millis() as u64,
            watchdog_ms = self.shared.config.watchdog.as_millis() as u64,
            dry_run = self.shared.config.dry_run,
            "vote loop started"
        );
        *worker = Some(Worker {
            cancel,
            driver,
            watchdog,
        });
        true
    }

    /// Stops scheduling. A cycle already in flight finishes but schedules no follow-up.
    pub fn stop(&self) -> bool {
        let Some(worker) = self.worker.lock().take() else {
            return false;
        };
        self.shared.context.mark_stopped();
        metrics::set_running(false);
        worker.cancel.cancel();
        worker.watchdog.abort();
        drop(worker.driver);
        info!(
            target: "orchestrator",
            vote_count = self.shared.context.vote_count(),
            "vote loop stopped"
        );
        true
    }

    /// Runs one cycle now unless another one holds the guard.
    pub async fn run_cycle(&self) -> CycleOutcome {
        metrics::record_trigger(Trigger::Manual);
        match Arc::clone(&self.shared.cycle_guard).try_lock_owned() {
            Ok(_guard) => self.shared.execute(Trigger::Manual).await,
            Err(_) => self.shared.busy(Trigger::Manual),
        }
    }

    /// Resolves once no cycle holds the guard.
    pub async fn wait_idle(&self) {
        let _guard = self.shared.cycle_guard.lock().await;
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut().take() {
            worker.cancel.cancel();
            worker.watchdog.abort();
        }
    }
}

async fn drive(
    shared: Arc<Shared>,
    mut inbox: mpsc::Receiver<Trigger>,
    triggers: mpsc::Sender<Trigger>,
    cancel: CancellationToken,
) {
    loop {
        let trigger = tokio::select! {
            _ = cancel.cancelled() => break,
            trigger = inbox.recv() => match trigger {
                Some(trigger) => trigger,
                None => break,
            },
        };
        metrics::record_trigger(trigger);

        let guard = match Arc::clone(&shared.cycle_guard).try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                shared.busy(trigger);
                continue;
            }
        };
        tokio::spawn(cycle_task(
            Arc::clone(&shared),
            guard,
            trigger,
            triggers.clone(),
            cancel.clone(),
        ));
    }
    debug!(target: "orchestrator", "driver exited");
}

/// Runs the cycle, then spends the cooldown still holding the guard before asking for the
/// continuation.
async fn cycle_task(
    shared: Arc<Shared>,
    guard: OwnedMutexGuard<()>,
    trigger: Trigger,
    triggers: mpsc::Sender<Trigger>,
    cancel: CancellationToken,
) {
    let outcome = shared.execute(trigger).await;
    if !outcome.continues() || !shared.context.is_running() {
        return;
    }

    debug!(
        target: "orchestrator",
        cooldown_ms = shared.config.cooldown.as_millis() as u64,
        "cooling down"
    );
    tokio::select! {
        _ = cancel.cancelled() => return,
        _ = sleep(shared.config.cooldown) => {}
    }
    drop(guard);

    if shared.context.is_running() && triggers.send(Trigger::Continuation).await.is_err() {
        debug!(target: "orchestrator", "driver gone; continuation dropped");
    }
}

async fn watchdog(
    triggers: mpsc::Sender<Trigger>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if triggers.send(Trigger::Watchdog).await.is_err() {
                    break;
                }
            }
        }
    }
}
