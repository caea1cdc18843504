use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::async_process::Child;
use chromiumoxide::browser::BrowserConfig;
use chromiumoxide::cdp::browser_protocol::target::SessionId;
use chromiumoxide::cdp::events::CdpEventMessage;
use chromiumoxide::conn::Connection;
use chromiumoxide::error::CdpError;
use chromiumoxide_types::{CallId, Message, MethodId};
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::CdpConfig;
use crate::error::{AdapterError, AdapterErrorKind};
use crate::metrics;
use crate::util::extract_ws_url;

/// Where a command goes: the browser endpoint or the flattened session of the ballot tab.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandTarget {
    Browser,
    Session(String),
}

/// Raw CDP command channel. `start` is idempotent.
#[async_trait]
pub trait CdpTransport: Send + Sync {
    async fn start(&self) -> Result<(), AdapterError>;
    async fn send_command(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, AdapterError>;
}

type Reply = oneshot::Sender<Result<Value, AdapterError>>;

/// A command waiting for the connection pump.
struct Call {
    target: CommandTarget,
    method: String,
    params: Value,
    reply: Reply,
}

/// Connection to the one browser the bot votes through. The browser is launched (or
/// attached to) on first use and again whenever the previous connection has died.
pub struct ChromiumTransport {
    cfg: CdpConfig,
    session: Mutex<Option<BrowserSession>>,
}

impl ChromiumTransport {
    pub fn new(cfg: CdpConfig) -> Self {
        Self {
            cfg,
            session: Mutex::new(None),
        }
    }

    fn deadline(&self) -> Duration {
        Duration::from_millis(self.cfg.default_deadline_ms)
    }

    async fn outbox(&self) -> Result<mpsc::Sender<Call>, AdapterError> {
        let mut session = self.session.lock().await;
        match session.as_ref() {
            Some(current) if current.is_healthy() => return Ok(current.outbox.clone()),
            Some(_) => warn!(target: "cdp-transport", "browser connection lost; reconnecting"),
            None => {}
        }
        // The dead session goes first so its browser process is gone before a new one starts.
        *session = None;
        let fresh = BrowserSession::open(&self.cfg).await?;
        let outbox = fresh.outbox.clone();
        *session = Some(fresh);
        Ok(outbox)
    }
}

#[async_trait]
impl CdpTransport for ChromiumTransport {
    async fn start(&self) -> Result<(), AdapterError> {
        self.outbox().await.map(|_| ())
    }

    async fn send_command(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, AdapterError> {
        let outbox = self.outbox().await?;
        let started = Instant::now();
        let result = call(&outbox, target, method, params, self.deadline()).await;
        metrics::observe_command(method, started.elapsed(), result.is_ok());
        if let Err(err) = &result {
            debug!(target: "cdp-transport", method, %err, "command failed");
        }
        result
    }
}

/// Queues one command and waits up to `deadline` for its answer.
async fn call(
    outbox: &mpsc::Sender<Call>,
    target: CommandTarget,
    method: &str,
    params: Value,
    deadline: Duration,
) -> Result<Value, AdapterError> {
    let (reply, answer) = oneshot::channel();
    outbox
        .send(Call {
            target,
            method: method.to_string(),
            params,
            reply,
        })
        .await
        .map_err(|_| {
            AdapterError::new(AdapterErrorKind::CdpIo).with_hint("browser connection is closed")
        })?;

    match timeout(deadline, answer).await {
        Ok(Ok(result)) => result,
        Ok(Err(_)) => Err(AdapterError::new(AdapterErrorKind::CdpIo)
            .with_hint(format!("connection dropped {method} before it was answered"))),
        Err(_) => Err(AdapterError::new(AdapterErrorKind::Timeout)
            .with_hint(format!("{method} got no answer within {deadline:?}"))
            .retriable(true)),
    }
}

struct BrowserSession {
    outbox: mpsc::Sender<Call>,
    healthy: Arc<AtomicBool>,
    pump: JoinHandle<()>,
    keepalive: Option<JoinHandle<()>>,
    /// Only set when this process launched the browser; an attached browser is left running.
    child: Option<Child>,
}

impl BrowserSession {
    async fn open(cfg: &CdpConfig) -> Result<Self, AdapterError> {
        let (child, ws_url) = match &cfg.websocket_url {
            Some(url) => {
                info!(target: "cdp-transport", url = %url, "attaching to running browser");
                (None, url.clone())
            }
            None => {
                let (child, url) = launch(cfg).await?;
                (Some(child), url)
            }
        };

        let conn = Connection::<CdpEventMessage>::connect(&ws_url)
            .await
            .map_err(|err| {
                AdapterError::new(AdapterErrorKind::CdpIo)
                    .with_hint(format!("connecting to {ws_url}: {err}"))
            })?;

        let (outbox, inbox) = mpsc::channel(32);
        let healthy = Arc::new(AtomicBool::new(true));
        let pump = tokio::spawn(pump(conn, inbox, Arc::clone(&healthy)));
        let keepalive = spawn_keepalive(
            outbox.clone(),
            Arc::clone(&healthy),
            Duration::from_millis(cfg.heartbeat_interval_ms),
            Duration::from_millis(cfg.default_deadline_ms),
        );
        metrics::record_browser_session();
        info!(target: "cdp-transport", url = %ws_url, "browser session ready");

        Ok(Self {
            outbox,
            healthy,
            pump,
            keepalive,
            child,
        })
    }

    fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.healthy.store(false, Ordering::Relaxed);
        self.pump.abort();
        if let Some(keepalive) = &self.keepalive {
            keepalive.abort();
        }
        let Some(mut child) = self.child.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = child.kill().await {
                        warn!(target: "cdp-transport", %err, "could not stop chromium");
                    }
                });
            }
            Err(_) => debug!(target: "cdp-transport", "no runtime left to stop chromium"),
        }
    }
}

async fn launch(cfg: &CdpConfig) -> Result<(Child, String), AdapterError> {
    let mut child = browser_config(cfg)?.launch().map_err(|err| {
        AdapterError::new(AdapterErrorKind::Internal)
            .with_hint(format!("failed to start chromium: {err}"))
    })?;
    let ws_url = extract_ws_url(&mut child, Duration::from_millis(cfg.launch_timeout_ms))
        .await
        .map_err(|err| AdapterError::new(AdapterErrorKind::CdpIo).with_hint(err.to_string()))?;
    info!(
        target: "cdp-transport",
        executable = %cfg.executable.display(),
        headless = cfg.headless,
        "chromium launched"
    );
    Ok((child, ws_url))
}

fn browser_config(cfg: &CdpConfig) -> Result<BrowserConfig, AdapterError> {
    let mut builder = BrowserConfig::builder()
        .user_data_dir(profile_dir(&cfg.user_data_dir)?)
        .request_timeout(Duration::from_millis(cfg.default_deadline_ms))
        .launch_timeout(Duration::from_millis(cfg.launch_timeout_ms))
        .args(chromium_args(cfg.headless));
    if !cfg.headless {
        builder = builder.with_head();
    }
    if cfg.no_sandbox {
        builder = builder.no_sandbox();
    }
    if !cfg.executable.as_os_str().is_empty() {
        if !cfg.executable.exists() {
            return Err(AdapterError::new(AdapterErrorKind::CdpIo)
                .with_hint(format!(
                    "chrome executable not found at {}",
                    cfg.executable.display()
                ))
                .with_data(json!({
                    "expected": cfg.executable,
                    "hint": "Set BALLOTBOT_CHROME to the full path of chrome/chromium."
                })));
        }
        builder = builder.chrome_executable(cfg.executable.clone());
    }
    builder.build().map_err(|err| {
        AdapterError::new(AdapterErrorKind::Internal).with_hint(format!("browser config: {err}"))
    })
}

/// The operator's login lives in this profile, so it is created once and reused across runs.
fn profile_dir(path: &Path) -> Result<PathBuf, AdapterError> {
    let dir = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|err| {
                AdapterError::new(AdapterErrorKind::Internal)
                    .with_hint(format!("resolving profile directory: {err}"))
            })?
            .join(path)
    };
    std::fs::create_dir_all(&dir).map_err(|err| {
        AdapterError::new(AdapterErrorKind::Internal)
            .with_hint(format!("creating profile directory {}: {err}", dir.display()))
    })?;
    Ok(dir)
}

/// Flags for a long-lived tab the operator stays logged into. Prompts that could cover the
/// ballot are suppressed and the automation banner is hidden from the site.
fn chromium_args(headless: bool) -> Vec<&'static str> {
    let mut args = vec![
        "--no-first-run",
        "--no-default-browser-check",
        "--hide-crash-restore-bubble",
        "--disable-session-crashed-bubble",
        "--disable-features=Translate",
        "--disable-blink-features=AutomationControlled",
        "--password-store=basic",
        "--lang=en-US",
    ];
    if headless {
        args.push("--window-size=1366,900");
    } else {
        args.push("--start-maximized");
    }
    args
}

/// Moves commands onto the websocket and answers from the responses. Events are dropped;
/// the bot only ever asks.
async fn pump(
    mut conn: Connection<CdpEventMessage>,
    mut inbox: mpsc::Receiver<Call>,
    healthy: Arc<AtomicBool>,
) {
    let mut pending: HashMap<CallId, Reply> = HashMap::new();
    let closed = loop {
        tokio::select! {
            Some(call) = inbox.recv() => {
                let session = match call.target {
                    CommandTarget::Browser => None,
                    CommandTarget::Session(id) => Some(SessionId::from(id)),
                };
                match conn.submit_command(MethodId::from(call.method), session, call.params) {
                    Ok(id) => {
                        pending.insert(id, call.reply);
                    }
                    Err(err) => {
                        let _ = call.reply.send(Err(connection_error(err.into())));
                    }
                }
            }
            incoming = conn.next() => match incoming {
                Some(Ok(Message::Response(response))) => {
                    if let Some(reply) = pending.remove(&response.id) {
                        let error = response.error.map(|err| (err.code, err.message));
                        let _ = reply.send(response_payload(response.result, error));
                    }
                }
                Some(Ok(Message::Event(_))) => {}
                Some(Err(err)) => break connection_error(err),
                None => {
                    break AdapterError::new(AdapterErrorKind::CdpIo)
                        .with_hint("browser closed the devtools connection")
                }
            },
        }
    };

    healthy.store(false, Ordering::Relaxed);
    warn!(target: "cdp-transport", err = %closed, pending = pending.len(), "browser connection ended");
    for (_, reply) in pending.drain() {
        let _ = reply.send(Err(closed.clone()));
    }
}

/// Turns a CDP answer into a result. "not found" errors mean the tab or its session is gone,
/// which the page treats as connection loss and answers by opening a fresh tab.
fn response_payload(
    result: Option<Value>,
    error: Option<(i64, String)>,
) -> Result<Value, AdapterError> {
    match (result, error) {
        (Some(result), _) => Ok(result),
        (None, Some((code, message))) => {
            let gone = message.to_ascii_lowercase().contains("not found");
            let kind = if gone {
                AdapterErrorKind::CdpIo
            } else {
                AdapterErrorKind::Internal
            };
            Err(AdapterError::new(kind)
                .with_hint(format!("cdp error {code}: {message}"))
                .retriable(gone))
        }
        (None, None) => {
            Err(AdapterError::new(AdapterErrorKind::Internal).with_hint("empty cdp response"))
        }
    }
}

fn connection_error(err: CdpError) -> AdapterError {
    let kind = match err {
        CdpError::Timeout => AdapterErrorKind::Timeout,
        _ => AdapterErrorKind::CdpIo,
    };
    AdapterError::new(kind)
        .with_hint(err.to_string())
        .retriable(true)
}

/// Pings the browser every `every`. The first unanswered ping marks the session dead so the
/// next command reconnects instead of waiting out its deadline.
fn spawn_keepalive(
    outbox: mpsc::Sender<Call>,
    healthy: Arc<AtomicBool>,
    every: Duration,
    deadline: Duration,
) -> Option<JoinHandle<()>> {
    if every.is_zero() {
        return None;
    }
    let wait = deadline.min(Duration::from_secs(5));

    Some(tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        while healthy.load(Ordering::Relaxed) {
            ticker.tick().await;
            let ping = call(
                &outbox,
                CommandTarget::Browser,
                "Browser.getVersion",
                json!({}),
                wait,
            )
            .await;
            if let Err(err) = ping {
                warn!(target: "cdp-transport", %err, "keepalive failed; session marked dead");
                healthy.store(false, Ordering::Relaxed);
            }
        }
    }))
}
