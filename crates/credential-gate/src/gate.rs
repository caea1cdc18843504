use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ballotbot_core_types::CredentialRecord;
use cdp_adapter::{CookieParam, SessionCookies};
use chrono::Utc;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::backup::BackupSnapshot;
use crate::store::{self, parse_records, StoreState};
use crate::GateError;

#[derive(Clone, Debug)]
pub struct GateConfig {
    pub store_path: PathBuf,
    /// Cookie domain, e.g. `.example.com`.
    pub cookie_domain: String,
    /// Origin the cookies are set for, e.g. `https://vote.example.com`.
    pub site_origin: String,
}

pub struct CredentialGate {
    cookies: Arc<dyn SessionCookies>,
    cfg: GateConfig,
}

impl CredentialGate {
    pub fn new(cookies: Arc<dyn SessionCookies>, cfg: GateConfig) -> Self {
        Self { cookies, cfg }
    }

    pub fn store_path(&self) -> &Path {
        &self.cfg.store_path
    }

    pub fn state(&self) -> Result<StoreState, GateError> {
        Ok(StoreState::classify(self.read_store()?.as_deref()))
    }

    /// Polls the store until one non-empty batch is applied or `max_wait` runs out.
    ///
    /// The first check runs immediately. A missing store is replaced by the template first.
    pub async fn acquire(&self, max_wait: Duration, poll: Duration) -> bool {
        match self.ensure_store() {
            Ok(StoreState::Absent) => info!(
                target: "credential-gate",
                path = %self.cfg.store_path.display(),
                "credential store created; paste cookies as name=value lines"
            ),
            Ok(StoreState::Applied) => info!(
                target: "credential-gate",
                "store already applied earlier; existing session credentials in use"
            ),
            Ok(state) => debug!(target: "credential-gate", state = state.as_str(), "store found"),
            Err(err) => warn!(target: "credential-gate", %err, "could not prepare credential store"),
        }

        let polling = async {
            if self.check_once().await {
                return true;
            }
            let mut ticker = interval_at(Instant::now() + poll, poll);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if self.check_once().await {
                    return true;
                }
            }
        };

        match timeout(max_wait, polling).await {
            Ok(applied) => applied,
            Err(_) => {
                warn!(
                    target: "credential-gate",
                    waited_ms = max_wait.as_millis() as u64,
                    "credential wait timed out; continuing without fresh cookies"
                );
                false
            }
        }
    }

    /// One poll. Failures are logged and count as "nothing applied".
    pub async fn check_once(&self) -> bool {
        match self.apply_pending().await {
            Ok(0) => false,
            Ok(count) => {
                info!(target: "credential-gate", count, "credentials applied");
                true
            }
            Err(err) => {
                warn!(target: "credential-gate", %err, "credential import failed");
                false
            }
        }
    }

    /// Applies every record in the store and stamps it. Returns the number of records applied.
    pub async fn apply_pending(&self) -> Result<usize, GateError> {
        let Some(content) = self.read_store()? else {
            return Ok(0);
        };
        let records = parse_records(&content);
        if records.is_empty() {
            return Ok(0);
        }

        let params: Vec<CookieParam> = records.iter().map(|r| self.cookie_param(r)).collect();
        self.cookies.set_cookies(&params).await?;
        for record in &records {
            debug!(target: "credential-gate", name = %record.name, "cookie set");
        }

        let stamped = store::render_applied(&content, Utc::now());
        fs::write(&self.cfg.store_path, stamped)
            .map_err(|err| GateError::io(&self.cfg.store_path, err))?;
        Ok(records.len())
    }

    /// Writes the current session cookies for `domain` to `path` as JSON.
    pub async fn export(&self, domain: &str, path: &Path) -> Result<BackupSnapshot, GateError> {
        let cookies = self.cookies.cookies(domain).await?;
        let snapshot = BackupSnapshot::new(domain, cookies);
        let json = serde_json::to_string_pretty(&snapshot)?;
        fs::write(path, json).map_err(|err| GateError::io(path, err))?;
        info!(
            target: "credential-gate",
            path = %path.display(),
            count = snapshot.cookies.len(),
            "cookies exported"
        );
        Ok(snapshot)
    }

    fn cookie_param(&self, record: &CredentialRecord) -> CookieParam {
        CookieParam {
            name: record.name.clone(),
            value: record.value.clone(),
            domain: Some(self.cfg.cookie_domain.clone()),
            path: Some("/".to_string()),
            url: Some(self.cfg.site_origin.clone()),
            http_only: Some(false),
            secure: Some(true),
        }
    }

    /// Creates the template when the store is missing. Returns the state found before that.
    fn ensure_store(&self) -> Result<StoreState, GateError> {
        let state = self.state()?;
        if state == StoreState::Absent {
            if let Some(parent) = self.cfg.store_path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).map_err(|err| GateError::io(parent, err))?;
                }
            }
            fs::write(&self.cfg.store_path, store::TEMPLATE)
                .map_err(|err| GateError::io(&self.cfg.store_path, err))?;
        }
        Ok(state)
    }

    fn read_store(&self) -> Result<Option<String>, GateError> {
        match fs::read_to_string(&self.cfg.store_path) {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(GateError::io(&self.cfg.store_path, err)),
        }
    }
}
