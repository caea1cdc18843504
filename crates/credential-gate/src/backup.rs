use cdp_adapter::CookieRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
}

/// On-disk backup of the session cookies for one domain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupSnapshot {
    pub timestamp: DateTime<Utc>,
    pub domain: String,
    pub cookies: Vec<BackupCookie>,
}

impl BackupSnapshot {
    pub fn new(domain: &str, cookies: Vec<CookieRecord>) -> Self {
        Self {
            timestamp: Utc::now(),
            domain: domain.to_string(),
            cookies: cookies
                .into_iter()
                .map(|c| BackupCookie {
                    name: c.name,
                    value: c.value,
                    domain: c.domain,
                    path: c.path,
                })
                .collect(),
        }
    }
}
