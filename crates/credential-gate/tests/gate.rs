use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cdp_adapter::{
    AdapterError, AdapterErrorKind, CookieParam, CookieRecord, SessionCookies,
};
use credential_gate::{CredentialGate, GateConfig, StoreState, APPLIED_MARKER};
use tokio::sync::Mutex;

/// Cookie jar keyed like a browser: (name, domain, path).
#[derive(Default)]
struct MemoryCookieJar {
    jar: Mutex<BTreeMap<(String, String, String), CookieParam>>,
    batches: AtomicUsize,
    fail: bool,
}

impl MemoryCookieJar {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    async fn snapshot(&self) -> Vec<CookieParam> {
        self.jar.lock().await.values().cloned().collect()
    }
}

#[async_trait]
impl SessionCookies for MemoryCookieJar {
    async fn set_cookies(&self, cookies: &[CookieParam]) -> Result<(), AdapterError> {
        if self.fail {
            return Err(AdapterError::new(AdapterErrorKind::CdpIo).with_hint("browser gone"));
        }
        self.batches.fetch_add(1, Ordering::SeqCst);
        let mut jar = self.jar.lock().await;
        for cookie in cookies {
            let key = (
                cookie.name.clone(),
                cookie.domain.clone().unwrap_or_default(),
                cookie.path.clone().unwrap_or_default(),
            );
            jar.insert(key, cookie.clone());
        }
        Ok(())
    }

    async fn cookies(&self, domain: &str) -> Result<Vec<CookieRecord>, AdapterError> {
        Ok(self
            .jar
            .lock()
            .await
            .values()
            .filter(|c| c.domain.as_deref().map(|d| d.trim_start_matches('.')) == Some(domain.trim_start_matches('.')))
            .map(|c| CookieRecord {
                name: c.name.clone(),
                value: c.value.clone(),
                domain: c.domain.clone().unwrap_or_default(),
                path: c.path.clone().unwrap_or_else(|| "/".into()),
                secure: c.secure.unwrap_or(false),
                http_only: c.http_only.unwrap_or(false),
            })
            .collect())
    }
}

fn gate_for(jar: Arc<MemoryCookieJar>, store: &Path) -> CredentialGate {
    CredentialGate::new(
        jar,
        GateConfig {
            store_path: store.to_path_buf(),
            cookie_domain: ".example.com".into(),
            site_origin: "https://vote.example.com".into(),
        },
    )
}

#[tokio::test]
async fn applies_record_and_stamps_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("import-cookies.txt");
    fs::write(&store, "# my cookies\nsession_id=abc123\n").unwrap();
    let jar = Arc::new(MemoryCookieJar::default());
    let gate = gate_for(jar.clone(), &store);

    assert!(gate.acquire(Duration::from_secs(10), Duration::from_secs(1)).await);

    let cookies = jar.snapshot().await;
    assert_eq!(cookies.len(), 1);
    let cookie = &cookies[0];
    assert_eq!(cookie.name, "session_id");
    assert_eq!(cookie.value, "abc123");
    assert_eq!(cookie.domain.as_deref(), Some(".example.com"));
    assert_eq!(cookie.url.as_deref(), Some("https://vote.example.com"));
    assert_eq!(cookie.path.as_deref(), Some("/"));
    assert_eq!(cookie.secure, Some(true));
    assert_eq!(cookie.http_only, Some(false));

    let rewritten = fs::read_to_string(&store).unwrap();
    assert!(rewritten.contains("# my cookies\nsession_id=abc123\n"));
    assert!(rewritten.contains(APPLIED_MARKER));
    assert_eq!(gate.state().unwrap(), StoreState::Applied);
}

#[tokio::test]
async fn value_may_contain_separator() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("import-cookies.txt");
    fs::write(&store, "token=a=b==\n").unwrap();
    let jar = Arc::new(MemoryCookieJar::default());
    let gate = gate_for(jar.clone(), &store);

    assert!(gate.check_once().await);
    assert_eq!(jar.snapshot().await[0].value, "a=b==");
}

#[tokio::test]
async fn applying_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("import-cookies.txt");
    fs::write(&store, "session_id=abc123\nuser_id=42\n").unwrap();
    let jar = Arc::new(MemoryCookieJar::default());
    let gate = gate_for(jar.clone(), &store);

    assert_eq!(gate.apply_pending().await.unwrap(), 2);
    let once = jar.snapshot().await;
    assert_eq!(gate.apply_pending().await.unwrap(), 2);
    let twice = jar.snapshot().await;

    assert_eq!(once, twice);
    assert_eq!(jar.batches.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn absent_store_gets_template_then_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("nested").join("import-cookies.txt");
    let jar = Arc::new(MemoryCookieJar::default());
    let gate = gate_for(jar.clone(), &store);

    let started = tokio::time::Instant::now();
    let applied = gate
        .acquire(Duration::from_millis(300_000), Duration::from_millis(5_000))
        .await;

    assert!(!applied);
    assert!(started.elapsed() >= Duration::from_millis(300_000));
    assert!(jar.snapshot().await.is_empty());
    assert_eq!(gate.state().unwrap(), StoreState::Template);
}

#[tokio::test(start_paused = true)]
async fn picks_up_records_added_while_polling() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("import-cookies.txt");
    let jar = Arc::new(MemoryCookieJar::default());
    let gate = Arc::new(gate_for(jar.clone(), &store));

    let waiter = {
        let gate = gate.clone();
        tokio::spawn(async move {
            gate.acquire(Duration::from_secs(300), Duration::from_secs(5))
                .await
        })
    };

    tokio::time::sleep(Duration::from_secs(12)).await;
    let mut content = fs::read_to_string(&store).unwrap();
    content.push_str("session_id=late\n");
    fs::write(&store, content).unwrap();

    assert!(waiter.await.unwrap());
    assert_eq!(jar.snapshot().await[0].value, "late");
}

#[tokio::test]
async fn session_failure_leaves_store_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("import-cookies.txt");
    fs::write(&store, "session_id=abc123\n").unwrap();
    let gate = gate_for(Arc::new(MemoryCookieJar::failing()), &store);

    assert!(!gate.check_once().await);
    assert_eq!(fs::read_to_string(&store).unwrap(), "session_id=abc123\n");
    assert_eq!(gate.state().unwrap(), StoreState::Populated);
}

#[tokio::test]
async fn export_writes_backup_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("import-cookies.txt");
    fs::write(&store, "session_id=abc123\n").unwrap();
    let backup = dir.path().join("ballotbot-cookies-backup.json");
    let jar = Arc::new(MemoryCookieJar::default());
    let gate = gate_for(jar, &store);
    gate.apply_pending().await.unwrap();

    let snapshot = gate.export("example.com", &backup).await.unwrap();

    assert_eq!(snapshot.cookies.len(), 1);
    let written: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&backup).unwrap()).unwrap();
    assert_eq!(written["domain"], "example.com");
    assert_eq!(written["cookies"][0]["name"], "session_id");
    assert_eq!(written["cookies"][0]["path"], "/");
    assert!(written["timestamp"].is_string());
}
