use std::path::Path;

use crate::app_settings::Config;
use crate::cli::context::CliContext;
use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use serde_json::Value as JsonValue;
use tokio::fs;

#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Print one value by dotted key, e.g. `orchestrator.cooldown`
    Get {
        /// Configuration key
        key: String,
    },

    /// Write the defaults to the configuration file
    Reset,

    /// Parse and check the configuration file
    Validate,
}

pub async fn cmd_config(args: ConfigArgs, ctx: &CliContext) -> Result<()> {
    let path = ctx.config_path().to_path_buf();
    match args.action {
        ConfigAction::Show => {
            println!("Current configuration ({}):", path.display());
            println!("{}", serde_yaml::to_string(&redacted(ctx.config()))?);
        }
        ConfigAction::Get { key } => {
            let json = serde_json::to_value(redacted(ctx.config()))?;
            let segments = split_key(&key)?;
            match get_json_value(&json, &segments) {
                Some(value) => println!("{}", serde_yaml::to_string(value)?),
                None => bail!("{} not found in configuration", key),
            }
        }
        ConfigAction::Reset => {
            save_config_file(&path, &Config::default()).await?;
            println!(
                "Configuration reset to defaults and written to {}",
                path.display()
            );
        }
        ConfigAction::Validate => {
            if fs::try_exists(&path).await? {
                let raw = fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("reading {}", path.display()))?;
                let config = serde_yaml::from_str::<Config>(&raw)
                    .with_context(|| format!("parsing {}", path.display()))?;
                config
                    .validate()
                    .with_context(|| format!("checking {}", path.display()))?;
                println!("Configuration file {} is valid", path.display());
            } else {
                Config::default().validate()?;
                println!(
                    "No configuration file at {}; defaults are valid",
                    path.display()
                );
            }
        }
    }

    Ok(())
}

/// Copy safe to print: API keys are masked.
fn redacted(config: &Config) -> Config {
    let mut copy = config.clone();
    for key in &mut copy.oracle.api_keys {
        let tail: String = key
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        *key = format!("…{tail}");
    }
    copy
}

async fn save_config_file(path: &Path, config: &Config) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    let serialized = serde_yaml::to_string(config)?;
    fs::write(path, serialized)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn split_key(key: &str) -> Result<Vec<&str>> {
    let segments: Vec<&str> = key
        .split('.')
        .filter(|segment| !segment.is_empty())
        .collect();
    if segments.is_empty() {
        bail!("configuration key cannot be empty");
    }
    Ok(segments)
}

fn get_json_value<'a>(value: &'a JsonValue, path: &[&str]) -> Option<&'a JsonValue> {
    let mut current = value;
    for segment in path {
        match current {
            JsonValue::Object(map) => {
                current = map.get(*segment)?;
            }
            _ => return None,
        }
    }
    Some(current)
}
