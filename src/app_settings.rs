use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use cdp_adapter::{CdpConfig, PageIdentity};
use credential_gate::GateConfig;
use decision_oracle::{FetcherConfig, OracleConfig};
use page_scanner::{ReadinessTiming, Selectors};
use serde::{Deserialize, Serialize};
use url::Url;
use vote_orchestrator::OrchestratorConfig;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub site: SiteConfig,
    pub browser: BrowserConfig,
    pub credentials: CredentialsConfig,
    pub readiness: ReadinessConfig,
    pub selectors: Selectors,
    pub oracle: OracleSettings,
    pub fetcher: FetcherSettings,
    pub orchestrator: LoopConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SiteConfig {
    pub base_url: String,
    pub vote_path: String,
    pub cookie_domain: String,
    pub user_agent: Option<String>,
    pub extra_headers: BTreeMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct BrowserConfig {
    /// Overrides `BALLOTBOT_HEADLESS`.
    pub headless: Option<bool>,
    pub executable: Option<PathBuf>,
    pub user_data_dir: Option<PathBuf>,
    /// Attach to an already running browser instead of launching one.
    pub websocket_url: Option<String>,
    #[serde(with = "humantime_serde", default)]
    pub command_deadline: Option<Duration>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct CredentialsConfig {
    pub store_path: PathBuf,
    pub backup_path: PathBuf,
    pub max_wait_ms: u64,
    pub poll_interval_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ReadinessConfig {
    pub max_attempts: u32,
    #[serde(with = "humantime_serde")]
    pub navigation_settle: Duration,
    #[serde(with = "humantime_serde")]
    pub confirm_settle: Duration,
    #[serde(with = "humantime_serde")]
    pub fresh_settle: Duration,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct OracleSettings {
    pub api_base: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub excerpt_chars: usize,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Usually left empty; `OPENAI_API_KEY` is appended at load time.
    pub api_keys: Vec<String>,
    pub json_mode: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct FetcherSettings {
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    pub user_agent: String,
    pub branches: Vec<String>,
    pub readme_files: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoopConfig {
    #[serde(with = "humantime_serde")]
    pub cooldown: Duration,
    #[serde(with = "humantime_serde")]
    pub watchdog_interval: Duration,
    pub dry_run: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct LoggingConfig {
    pub json: bool,
    /// Daily rolling log files are written here when set.
    pub directory: Option<PathBuf>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        let extra_headers = [
            (
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,image/apng,*/*;q=0.8",
            ),
            ("Accept-Language", "en-US,en;q=0.9"),
            ("Cache-Control", "max-age=0"),
            ("Sec-Fetch-Dest", "document"),
            ("Sec-Fetch-Mode", "navigate"),
            ("Sec-Fetch-Site", "none"),
            ("Sec-Fetch-User", "?1"),
            ("Upgrade-Insecure-Requests", "1"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        Self {
            base_url: "https://summer.hackclub.com".to_string(),
            vote_path: "/votes/new".to_string(),
            cookie_domain: ".hackclub.com".to_string(),
            user_agent: Some(DEFAULT_USER_AGENT.to_string()),
            extra_headers,
        }
    }
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("import-cookies.txt"),
            backup_path: PathBuf::from("ballotbot-cookies-backup.json"),
            max_wait_ms: 300_000,
            poll_interval_ms: 5_000,
        }
    }
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        let timing = ReadinessTiming::default();
        Self {
            max_attempts: 3,
            navigation_settle: timing.navigation_settle,
            confirm_settle: timing.confirm_settle,
            fresh_settle: timing.fresh_settle,
        }
    }
}

impl Default for OracleSettings {
    fn default() -> Self {
        let defaults = OracleConfig::default();
        Self {
            api_base: defaults.api_base,
            model: defaults.model,
            temperature: defaults.temperature,
            max_tokens: defaults.max_tokens,
            excerpt_chars: 1000,
            timeout: defaults.timeout,
            api_keys: Vec::new(),
            json_mode: defaults.json_mode,
        }
    }
}

impl Default for FetcherSettings {
    fn default() -> Self {
        let defaults = FetcherConfig::default();
        Self {
            timeout: defaults.timeout,
            user_agent: defaults.user_agent,
            branches: defaults.branches,
            readme_files: defaults.readme_files,
        }
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        let defaults = OrchestratorConfig::default();
        Self {
            cooldown: defaults.cooldown,
            watchdog_interval: defaults.watchdog,
            dry_run: defaults.dry_run,
        }
    }
}

impl Config {
    /// Checks what serde cannot: URLs parse and the loop timings are usable.
    pub fn validate(&self) -> Result<()> {
        let base = self.base_url()?;
        base.join(&self.site.vote_path)
            .with_context(|| format!("site.vote_path `{}` is not a path", self.site.vote_path))?;
        if !self.site.vote_path.starts_with('/') {
            bail!("site.vote_path must start with `/`");
        }
        if self.readiness.max_attempts == 0 {
            bail!("readiness.max_attempts must be at least 1");
        }
        if self.credentials.poll_interval_ms == 0 {
            bail!("credentials.poll_interval_ms must be positive");
        }
        if self.orchestrator.watchdog_interval.is_zero() {
            bail!("orchestrator.watchdog_interval must be positive");
        }
        Url::parse(&self.oracle.api_base)
            .with_context(|| format!("oracle.api_base `{}` is not a URL", self.oracle.api_base))?;
        Ok(())
    }

    pub fn base_url(&self) -> Result<Url> {
        Url::parse(&self.site.base_url)
            .with_context(|| format!("site.base_url `{}` is not a URL", self.site.base_url))
    }

    /// `https://host` of the ballot site.
    pub fn site_origin(&self) -> Result<String> {
        Ok(self.base_url()?.origin().ascii_serialization())
    }

    /// Appends keys from a comma separated `OPENAI_API_KEY` value, skipping duplicates.
    pub fn merge_api_keys(&mut self, raw: &str) {
        for key in raw.split(',').map(str::trim).filter(|k| !k.is_empty()) {
            if !self.oracle.api_keys.iter().any(|existing| existing == key) {
                self.oracle.api_keys.push(key.to_string());
            }
        }
    }

    pub fn cdp_config(&self, debug: bool) -> CdpConfig {
        let mut cfg = CdpConfig::default();
        if let Some(headless) = self.browser.headless {
            cfg.headless = headless;
        }
        if debug {
            cfg.headless = false;
        }
        if let Some(executable) = &self.browser.executable {
            cfg.executable = executable.clone();
        }
        if let Some(dir) = &self.browser.user_data_dir {
            cfg.user_data_dir = dir.clone();
        }
        if let Some(ws) = &self.browser.websocket_url {
            cfg.websocket_url = Some(ws.clone());
        }
        if let Some(deadline) = self.browser.command_deadline {
            cfg.default_deadline_ms = deadline.as_millis() as u64;
        }
        cfg
    }

    pub fn page_identity(&self) -> PageIdentity {
        PageIdentity {
            user_agent: self.site.user_agent.clone(),
            extra_headers: self.site.extra_headers.clone(),
        }
    }

    pub fn gate_config(&self) -> Result<GateConfig> {
        Ok(GateConfig {
            store_path: self.credentials.store_path.clone(),
            cookie_domain: self.site.cookie_domain.clone(),
            site_origin: self.site_origin()?,
        })
    }

    pub fn readiness_timing(&self) -> ReadinessTiming {
        ReadinessTiming {
            navigation_settle: self.readiness.navigation_settle,
            confirm_settle: self.readiness.confirm_settle,
            fresh_settle: self.readiness.fresh_settle,
        }
    }

    pub fn oracle_config(&self) -> OracleConfig {
        OracleConfig {
            api_keys: self.oracle.api_keys.clone(),
            model: self.oracle.model.clone(),
            api_base: self.oracle.api_base.clone(),
            temperature: self.oracle.temperature,
            max_tokens: self.oracle.max_tokens,
            timeout: self.oracle.timeout,
            json_mode: self.oracle.json_mode,
        }
    }

    pub fn fetcher_config(&self) -> FetcherConfig {
        FetcherConfig {
            timeout: self.fetcher.timeout,
            user_agent: self.fetcher.user_agent.clone(),
            branches: self.fetcher.branches.clone(),
            readme_files: self.fetcher.readme_files.clone(),
            ..FetcherConfig::default()
        }
    }

    pub fn orchestrator_config(&self, dry_run: bool) -> OrchestratorConfig {
        OrchestratorConfig {
            vote_path: self.site.vote_path.clone(),
            max_attempts: self.readiness.max_attempts,
            cooldown: self.orchestrator.cooldown,
            watchdog: self.orchestrator.watchdog_interval,
            dry_run: dry_run || self.orchestrator.dry_run,
        }
    }
}
