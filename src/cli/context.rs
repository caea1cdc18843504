use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use cdp_adapter::CdpPage;
use credential_gate::CredentialGate;
use decision_oracle::{DecisionAcquirer, GithubReadmeFetcher, OpenAiOracle};
use once_cell::sync::OnceCell;
use vote_orchestrator::{Components, Orchestrator};

use super::env::CliArgs;
use super::output::OutputFormat;
use crate::app_settings::Config;

/// Per-invocation state. The browser page is created on first use and shared by every
/// component that needs it.
pub struct CliContext {
    config: Arc<Config>,
    config_path: PathBuf,
    status_port: u16,
    debug: bool,
    output: OutputFormat,
    page: OnceCell<Arc<CdpPage>>,
}

impl CliContext {
    pub fn new(config: Config, config_path: PathBuf, cli: &CliArgs) -> Self {
        Self {
            config: Arc::new(config),
            config_path,
            status_port: cli.status_port,
            debug: cli.debug,
            output: cli.output,
            page: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &Config {
        self.config.as_ref()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn status_port(&self) -> u16 {
        self.status_port
    }

    pub fn output(&self) -> OutputFormat {
        self.output
    }

    pub fn page(&self) -> Arc<CdpPage> {
        self.page
            .get_or_init(|| {
                Arc::new(CdpPage::launch(
                    self.config.cdp_config(self.debug),
                    self.config.page_identity(),
                ))
            })
            .clone()
    }

    pub fn gate(&self) -> Result<CredentialGate> {
        Ok(CredentialGate::new(self.page(), self.config.gate_config()?))
    }

    pub fn orchestrator(&self, dry_run: bool) -> Result<Orchestrator> {
        let config = self.config();
        config.validate().context("invalid configuration")?;

        let oracle = OpenAiOracle::new(config.oracle_config())
            .context("set OPENAI_API_KEY or oracle.api_keys")?;
        let fetcher =
            GithubReadmeFetcher::new(config.fetcher_config()).context("building README fetcher")?;
        let acquirer = DecisionAcquirer::new(
            Arc::new(oracle),
            Arc::new(fetcher),
            config.oracle.excerpt_chars,
        );

        let components = Components::over_surface(
            self.page(),
            config.base_url()?,
            config.selectors.clone(),
            config.readiness_timing(),
            acquirer,
        );
        Ok(Orchestrator::new(
            components,
            config.orchestrator_config(dry_run),
        ))
    }
}
