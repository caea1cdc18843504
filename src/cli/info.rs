use anyhow::Result;
use cdp_adapter::config::detect_chrome_executable;

use crate::cli::context::CliContext;

pub async fn cmd_info(ctx: &CliContext) -> Result<()> {
    let config = ctx.config();

    println!("ballotbot System Information");
    println!("============================");
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!("Build Date: {}", env!("BUILD_DATE"));
    println!("Git Commit: {}", env!("GIT_HASH"));
    println!();

    println!("Configuration:");
    println!("- Config File: {}", ctx.config_path().display());
    println!("- Ballot Page: {}{}", config.site.base_url, config.site.vote_path);
    println!("- Credential Store: {}", config.credentials.store_path.display());
    println!(
        "- Judge: {} via {} ({} API key(s))",
        config.oracle.model,
        config.oracle.api_base,
        config.oracle.api_keys.len()
    );
    println!(
        "- Loop: cooldown {}, watchdog every {}{}",
        humantime::format_duration(config.orchestrator.cooldown),
        humantime::format_duration(config.orchestrator.watchdog_interval),
        if config.orchestrator.dry_run { ", dry run" } else { "" }
    );
    println!();

    println!("Browser:");
    match (&config.browser.websocket_url, &config.browser.executable) {
        (Some(ws), _) => println!("- Attach to: {ws}"),
        (None, Some(path)) => println!("- Executable: {} (configured)", path.display()),
        (None, None) => match detect_chrome_executable() {
            Some(path) => println!("- Executable: {} ✓", path.display()),
            None => println!("- Executable: not found (set BALLOTBOT_CHROME)"),
        },
    }

    Ok(())
}
