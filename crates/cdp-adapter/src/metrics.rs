use std::time::Duration;

use lazy_static::lazy_static;
use prometheus::{
    core::Collector, histogram_opts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
};
use tracing::error;

lazy_static! {
    static ref COMMANDS: IntCounterVec = IntCounterVec::new(
        Opts::new("ballotbot_cdp_commands_total", "CDP commands by method and result"),
        &["method", "result"]
    )
    .unwrap();
    static ref COMMAND_SECONDS: HistogramVec = HistogramVec::new(
        histogram_opts!(
            "ballotbot_cdp_command_seconds",
            "CDP round-trip time",
            vec![0.01, 0.05, 0.25, 1.0, 5.0, 30.0]
        ),
        &["method"]
    )
    .unwrap();
    static ref BROWSER_SESSIONS: IntCounter = IntCounter::new(
        "ballotbot_cdp_browser_sessions_total",
        "Browser connections opened, by launch or attach"
    )
    .unwrap();
    static ref PAGE_ATTACHES: IntCounter = IntCounter::new(
        "ballotbot_cdp_page_attach_total",
        "Times the ballot tab was opened or reopened"
    )
    .unwrap();
}

/// Adds the adapter's collectors to `registry`. Registering twice is harmless.
pub fn register_metrics(registry: &Registry) {
    let collectors: [Box<dyn Collector>; 4] = [
        Box::new(COMMANDS.clone()),
        Box::new(COMMAND_SECONDS.clone()),
        Box::new(BROWSER_SESSIONS.clone()),
        Box::new(PAGE_ATTACHES.clone()),
    ];
    for collector in collectors {
        match registry.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(err) => error!(target: "cdp-transport", %err, "failed to register cdp metric"),
        }
    }
}

pub(crate) fn observe_command(method: &str, elapsed: Duration, ok: bool) {
    let result = if ok { "ok" } else { "error" };
    COMMANDS.with_label_values(&[method, result]).inc();
    COMMAND_SECONDS
        .with_label_values(&[method])
        .observe(elapsed.as_secs_f64());
}

pub(crate) fn record_browser_session() {
    BROWSER_SESSIONS.inc();
}

pub(crate) fn record_attach() {
    PAGE_ATTACHES.inc();
}
