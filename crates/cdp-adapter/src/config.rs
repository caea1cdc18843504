use serde::{Deserialize, Serialize};
use std::{
    env,
    path::{Path, PathBuf},
};
use which::which;

/// Configuration for launching (or attaching to) Chromium.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CdpConfig {
    pub executable: PathBuf,
    pub user_data_dir: PathBuf,
    pub headless: bool,
    pub default_deadline_ms: u64,
    pub launch_timeout_ms: u64,
    /// Attach to an already running browser instead of launching one.
    pub websocket_url: Option<String>,
    pub heartbeat_interval_ms: u64,
    pub no_sandbox: bool,
}

impl Default for CdpConfig {
    fn default() -> Self {
        Self {
            executable: detect_chrome_executable().unwrap_or_default(),
            user_data_dir: default_profile_dir(),
            headless: resolve_headless_default(),
            default_deadline_ms: 30_000,
            launch_timeout_ms: 20_000,
            websocket_url: None,
            heartbeat_interval_ms: 15_000,
            no_sandbox: env_flag("BALLOTBOT_DISABLE_SANDBOX"),
        }
    }
}

fn env_flag(key: &str) -> bool {
    env::var(key)
        .map(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

fn resolve_headless_default() -> bool {
    // "0", "false", "no", "off" mean headful
    match env::var("BALLOTBOT_HEADLESS") {
        Ok(value) => {
            let lower = value.to_ascii_lowercase();
            !matches!(lower.as_str(), "0" | "false" | "no" | "off")
        }
        Err(_) => true,
    }
}

fn default_profile_dir() -> PathBuf {
    if let Ok(path) = env::var("BALLOTBOT_CHROME_PROFILE") {
        return PathBuf::from(path);
    }
    Path::new("./.ballotbot-profile").into()
}

/// Finds a Chromium-family binary: `BALLOTBOT_CHROME`, then `PATH`, then well-known locations.
pub fn detect_chrome_executable() -> Option<PathBuf> {
    if let Ok(raw) = env::var("BALLOTBOT_CHROME") {
        let candidate = PathBuf::from(raw.trim());
        if !raw.trim().is_empty() && candidate.exists() {
            return Some(candidate);
        }
    }

    if let Some(path) = chrome_executable_names()
        .iter()
        .find_map(|name| which(name).ok())
    {
        return Some(path);
    }

    if env::var("BALLOTBOT_SKIP_OS_PATHS")
        .map(|value| !value.trim().is_empty())
        .unwrap_or(false)
    {
        return None;
    }

    os_specific_chrome_paths()
        .into_iter()
        .find(|candidate| candidate.exists())
}

pub(crate) fn chrome_executable_names() -> &'static [&'static str] {
    #[cfg(target_os = "windows")]
    {
        &["chrome.exe", "chromium.exe", "msedge.exe"]
    }

    #[cfg(not(target_os = "windows"))]
    {
        &[
            "google-chrome-stable",
            "google-chrome",
            "chromium",
            "chromium-browser",
        ]
    }
}

fn os_specific_chrome_paths() -> Vec<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"]
            .iter()
            .filter_map(|key| env::var(key).ok())
            .filter(|root| !root.trim().is_empty())
            .flat_map(|root| {
                let root = PathBuf::from(root.trim());
                [
                    root.join("Google/Chrome/Application/chrome.exe"),
                    root.join("Chromium/Application/chrome.exe"),
                    root.join("Microsoft/Edge/Application/msedge.exe"),
                ]
            })
            .collect()
    }

    #[cfg(target_os = "macos")]
    {
        vec![
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
            PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
        ]
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        vec![
            PathBuf::from("/usr/bin/google-chrome-stable"),
            PathBuf::from("/usr/bin/google-chrome"),
            PathBuf::from("/usr/bin/chromium-browser"),
            PathBuf::from("/usr/bin/chromium"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::detect_chrome_executable;
    use std::{env, fs};
    use tempfile::tempdir;

    #[test]
    fn explicit_env_path_wins() {
        let dir = tempdir().unwrap();
        let exe_path = dir.path().join("my-chrome");
        fs::write(&exe_path, b"").unwrap();

        let original = env::var("BALLOTBOT_CHROME").ok();
        env::set_var("BALLOTBOT_CHROME", exe_path.to_string_lossy().to_string());
        let detected = detect_chrome_executable();
        match original {
            Some(value) => env::set_var("BALLOTBOT_CHROME", value),
            None => env::remove_var("BALLOTBOT_CHROME"),
        }

        assert_eq!(detected, Some(exe_path));
    }
}
