use std::time::Duration;

use lazy_static::lazy_static;
use prometheus::{
    core::Collector, histogram_opts, Histogram, IntCounter, IntCounterVec, IntGauge, Registry,
};
use tracing::error;

use crate::cycle::{CycleOutcome, Trigger};

lazy_static! {
    static ref VOTES_TOTAL: IntCounter =
        IntCounter::new("ballotbot_votes_total", "Votes submitted").unwrap();
    static ref CYCLES_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("ballotbot_cycles_total", "Cycle outcomes"),
        &["outcome"]
    )
    .unwrap();
    static ref TRIGGERS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("ballotbot_triggers_total", "Cycle triggers received"),
        &["trigger"]
    )
    .unwrap();
    static ref CYCLE_DURATION: Histogram = Histogram::with_opts(histogram_opts!(
        "ballotbot_cycle_duration_seconds",
        "Wall time of one cycle, cooldown excluded",
        vec![1.0, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0]
    ))
    .unwrap();
    static ref RUNNING: IntGauge =
        IntGauge::new("ballotbot_running", "1 while the vote loop is started").unwrap();
}

fn register<C>(registry: &Registry, collector: C)
where
    C: Collector + Clone + Send + Sync + 'static,
{
    if let Err(err) = registry.register(Box::new(collector.clone())) {
        if !matches!(err, prometheus::Error::AlreadyReg) {
            error!(?err, "failed to register orchestrator metric");
        }
    }
}

pub fn register_metrics(registry: &Registry) {
    register(registry, VOTES_TOTAL.clone());
    register(registry, CYCLES_TOTAL.clone());
    register(registry, TRIGGERS_TOTAL.clone());
    register(registry, CYCLE_DURATION.clone());
    register(registry, RUNNING.clone());
}

pub(crate) fn record_trigger(trigger: Trigger) {
    TRIGGERS_TOTAL.with_label_values(&[trigger.as_str()]).inc();
}

pub(crate) fn record_cycle(outcome: CycleOutcome, elapsed: Duration, counted_vote: bool) {
    CYCLES_TOTAL.with_label_values(&[outcome.as_str()]).inc();
    if outcome.ran() {
        CYCLE_DURATION.observe(elapsed.as_secs_f64());
    }
    if counted_vote {
        VOTES_TOTAL.inc();
    }
}

pub(crate) fn set_running(running: bool) {
    RUNNING.set(i64::from(running));
}
