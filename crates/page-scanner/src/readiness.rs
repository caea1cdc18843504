use std::sync::Arc;
use std::time::Duration;

use cdp_adapter::BrowsingSurface;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

/// Fixed settle delays. Navigation completing says nothing about the page's scripts having
/// rendered, so readiness is approximated with waits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadinessTiming {
    /// After each navigation inside the retry loop.
    pub navigation_settle: Duration,
    /// Final wait when the page was already current.
    pub confirm_settle: Duration,
    /// Final wait when this call had to navigate.
    pub fresh_settle: Duration,
}

impl Default for ReadinessTiming {
    fn default() -> Self {
        Self {
            navigation_settle: Duration::from_secs(4),
            confirm_settle: Duration::from_secs(3),
            fresh_settle: Duration::from_secs(8),
        }
    }
}

/// True when `location` is on the same host and port as `target` and its path equals the
/// target path, ignoring a trailing slash. Query and fragment are not compared.
pub fn location_matches(location: &str, target: &Url) -> bool {
    let Ok(current) = Url::parse(location) else {
        return false;
    };
    current.host_str() == target.host_str()
        && current.port_or_known_default() == target.port_or_known_default()
        && current.path().trim_end_matches('/') == target.path().trim_end_matches('/')
}

pub struct ReadinessDetector {
    surface: Arc<dyn BrowsingSurface>,
    base_url: Url,
    timing: ReadinessTiming,
}

impl ReadinessDetector {
    pub fn new(surface: Arc<dyn BrowsingSurface>, base_url: Url, timing: ReadinessTiming) -> Self {
        Self {
            surface,
            base_url,
            timing,
        }
    }

    /// Drives the page to `target_path`. `false` means "no entries this cycle".
    pub async fn ensure_ready(&self, target_path: &str, max_attempts: u32) -> bool {
        let target_url = match self.base_url.join(target_path) {
            Ok(url) => url,
            Err(err) => {
                warn!(target: "page-readiness", %err, target_path, "invalid target path");
                return false;
            }
        };

        let mut navigated = false;
        for attempt in 1..=max_attempts {
            if self.on_target(&target_url).await {
                break;
            }
            debug!(target: "page-readiness", attempt, url = %target_url, "navigating to ballot page");
            if let Err(err) = self.surface.navigate(target_url.as_str()).await {
                debug!(target: "page-readiness", attempt, %err, "navigation failed");
            }
            navigated = true;
            sleep(self.timing.navigation_settle).await;
        }

        if !self.on_target(&target_url).await {
            info!(target: "page-readiness", max_attempts, "ballot page not reached");
            return false;
        }

        let settle = if navigated {
            self.timing.fresh_settle
        } else {
            self.timing.confirm_settle
        };
        sleep(settle).await;
        true
    }

    async fn on_target(&self, target: &Url) -> bool {
        match self.surface.current_location().await {
            Ok(location) => location_matches(&location, target),
            Err(err) => {
                debug!(target: "page-readiness", %err, "could not read location");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::location_matches;
    use url::Url;

    fn ballot() -> Url {
        Url::parse("https://example.com/votes/new").unwrap()
    }

    #[test]
    fn matches_path_on_the_ballot_host() {
        assert!(location_matches("https://example.com/votes/new", &ballot()));
        assert!(location_matches("https://example.com/votes/new/?x=1", &ballot()));
        assert!(location_matches("https://example.com:443/votes/new", &ballot()));
        assert!(!location_matches("https://example.com/votes", &ballot()));
        assert!(!location_matches("https://example.com/votes/new/extra", &ballot()));
        assert!(!location_matches("about:blank", &ballot()));
        assert!(!location_matches("not a url", &ballot()));
    }

    #[test]
    fn same_path_on_another_host_is_not_the_ballot() {
        assert!(!location_matches("https://login.example.org/votes/new", &ballot()));
        assert!(!location_matches("https://example.com:8443/votes/new", &ballot()));
    }
}
