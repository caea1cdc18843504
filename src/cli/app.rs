use anyhow::Result;
use clap::Parser;
use tracing::{debug, error, info, warn};

use super::context::CliContext;
use super::dispatch::dispatch;
use super::env::CliArgs;
use super::runtime::{
    apply_env_overrides, init_logging, load_config, load_local_env_overrides, LoadedConfig,
};

pub async fn run() -> Result<()> {
    let env_notes = load_local_env_overrides();
    let cli = CliArgs::parse();

    let LoadedConfig {
        mut config,
        path,
        from_file,
    } = load_config(cli.config.as_ref()).await?;
    apply_env_overrides(&mut config);

    let _log_guard = init_logging(&cli.log_level, cli.debug, &config.logging)?;
    for note in env_notes {
        debug!("{note}");
    }
    info!("Starting ballotbot v{}", env!("CARGO_PKG_VERSION"));
    if from_file {
        info!("Loaded configuration from: {}", path.display());
    } else {
        warn!("Config file not found, using defaults: {}", path.display());
    }

    let cli_context = CliContext::new(config, path, &cli);

    match dispatch(&cli, &cli_context).await {
        Ok(()) => {
            debug!("Command completed successfully");
            Ok(())
        }
        Err(err) => {
            error!("Command failed: {:#}", err);
            Err(err)
        }
    }
}
