use std::env;
use std::fs as stdfs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::app_settings::{Config, LoggingConfig};

const LOCAL_ENV: &str = "config/local.env";

/// Sets variables from `config/local.env` that are not already in the environment.
///
/// Runs before logging exists, so it reports what it did instead of logging.
pub fn load_local_env_overrides() -> Vec<String> {
    let path = Path::new(LOCAL_ENV);
    let mut notes = Vec::new();
    if !path.exists() {
        return notes;
    }

    match stdfs::read_to_string(path) {
        Ok(contents) => {
            for (idx, raw_line) in contents.lines().enumerate() {
                let line = raw_line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                let Some((key, value)) = line.split_once('=') else {
                    notes.push(format!("{LOCAL_ENV}:{}: not KEY=VALUE, skipped", idx + 1));
                    continue;
                };
                let key = key.trim();
                if key.is_empty() || env::var(key).is_ok() {
                    continue;
                }
                env::set_var(key, unescape_value(value.trim()));
            }
            notes.push(format!("loaded environment overrides from {LOCAL_ENV}"));
        }
        Err(err) => notes.push(format!("failed to read {LOCAL_ENV}: {err}")),
    }
    notes
}

/// Installs the global subscriber on stderr so stdout stays clean for command output.
///
/// The returned guard flushes the file sink and must be held until exit.
pub fn init_logging(
    level: &str,
    debug: bool,
    logging: &LoggingConfig,
) -> Result<Option<WorkerGuard>> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };
    let filter = if debug {
        EnvFilter::new(level.to_string())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()))
    };

    let (file_layer, guard) = match &logging.directory {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "ballotbot.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);
    if logging.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
            .context("installing log subscriber")?;
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()
            .context("installing log subscriber")?;
    }
    Ok(guard)
}

pub struct LoadedConfig {
    pub config: Config,
    pub path: PathBuf,
    /// False when no file existed and defaults are in use.
    pub from_file: bool,
}

/// `--config` > `./config/config.yaml` > `<config dir>/ballotbot/config.yaml`.
pub fn resolve_config_path(explicit: Option<&PathBuf>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.clone());
    }
    let local_config = PathBuf::from("config/config.yaml");
    if local_config.exists() {
        return Ok(local_config);
    }
    let mut path = dirs::config_dir().context("Failed to get config directory")?;
    path.push("ballotbot");
    path.push("config.yaml");
    Ok(path)
}

pub async fn load_config(config_path: Option<&PathBuf>) -> Result<LoadedConfig> {
    let path = resolve_config_path(config_path)?;
    if fs::try_exists(&path).await.unwrap_or(false) {
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(LoadedConfig {
            config,
            path,
            from_file: true,
        })
    } else {
        Ok(LoadedConfig {
            config: Config::default(),
            path,
            from_file: false,
        })
    }
}

/// Folds environment-only settings into the loaded config.
pub fn apply_env_overrides(config: &mut Config) {
    if let Ok(keys) = env::var("OPENAI_API_KEY") {
        config.merge_api_keys(&keys);
    }
}

fn unescape_value(value: &str) -> String {
    if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
        let inner = &value[1..value.len() - 1];
        inner
            .replace("\\\"", "\"")
            .replace("\\n", "\n")
            .replace("\\r", "\r")
            .replace("\\t", "\t")
    } else {
        value.to_string()
    }
}
