use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::commands::{domain_matches, CookieParam, CookieRecord, PageIdentity, PageScript};
use crate::config::CdpConfig;
use crate::error::{AdapterError, AdapterErrorKind};
use crate::metrics;
use crate::transport::{CdpTransport, ChromiumTransport, CommandTarget};
use crate::{BrowsingSurface, SessionCookies};

#[derive(Clone, Debug, PartialEq, Eq)]
struct AttachedPage {
    target_id: String,
    session_id: String,
}

/// One browser tab driven over a flattened CDP session.
///
/// The tab is opened on first use. When a command fails with a connection-level error the
/// attachment is forgotten and the next call opens a fresh tab.
pub struct CdpPage {
    transport: Arc<dyn CdpTransport>,
    identity: PageIdentity,
    attached: Mutex<Option<AttachedPage>>,
}

impl CdpPage {
    pub fn launch(cfg: CdpConfig, identity: PageIdentity) -> Self {
        Self::with_transport(Arc::new(ChromiumTransport::new(cfg)), identity)
    }

    pub fn with_transport(transport: Arc<dyn CdpTransport>, identity: PageIdentity) -> Self {
        Self {
            transport,
            identity,
            attached: Mutex::new(None),
        }
    }

    async fn attached(&self) -> Result<AttachedPage, AdapterError> {
        let mut guard = self.attached.lock().await;
        if let Some(page) = guard.as_ref() {
            return Ok(page.clone());
        }

        self.transport.start().await?;
        let page = self.open_page().await?;
        info!(target: "cdp-page", target_id = %page.target_id, "page attached");
        metrics::record_attach();
        *guard = Some(page.clone());
        Ok(page)
    }

    async fn open_page(&self) -> Result<AttachedPage, AdapterError> {
        let created = self
            .transport
            .send_command(
                CommandTarget::Browser,
                "Target.createTarget",
                json!({ "url": "about:blank" }),
            )
            .await?;
        let target_id = string_field(&created, "targetId")?;

        let attached = self
            .transport
            .send_command(
                CommandTarget::Browser,
                "Target.attachToTarget",
                json!({ "targetId": target_id, "flatten": true }),
            )
            .await?;
        let session_id = string_field(&attached, "sessionId")?;
        let session = CommandTarget::Session(session_id.clone());

        for domain in ["Page.enable", "Runtime.enable", "Network.enable"] {
            self.transport
                .send_command(session.clone(), domain, json!({}))
                .await?;
        }

        if let Some(user_agent) = &self.identity.user_agent {
            self.transport
                .send_command(
                    session.clone(),
                    "Network.setUserAgentOverride",
                    json!({ "userAgent": user_agent }),
                )
                .await?;
        }
        if !self.identity.extra_headers.is_empty() {
            self.transport
                .send_command(
                    session,
                    "Network.setExtraHTTPHeaders",
                    json!({ "headers": self.identity.extra_headers }),
                )
                .await?;
        }

        Ok(AttachedPage {
            target_id,
            session_id,
        })
    }

    async fn send_page(&self, method: &str, params: Value) -> Result<Value, AdapterError> {
        let page = self.attached().await?;
        let target = CommandTarget::Session(page.session_id.clone());
        self.forget_on_loss(&page, self.transport.send_command(target, method, params).await)
            .await
    }

    async fn send_browser(
        &self,
        page: &AttachedPage,
        method: &str,
        params: Value,
    ) -> Result<Value, AdapterError> {
        self.forget_on_loss(
            page,
            self.transport
                .send_command(CommandTarget::Browser, method, params)
                .await,
        )
        .await
    }

    async fn forget_on_loss(
        &self,
        page: &AttachedPage,
        result: Result<Value, AdapterError>,
    ) -> Result<Value, AdapterError> {
        if let Err(err) = &result {
            if err.is_connection_loss() {
                let mut guard = self.attached.lock().await;
                if guard.as_ref() == Some(page) {
                    warn!(target: "cdp-page", %err, "dropping page attachment");
                    *guard = None;
                }
            }
        }
        result
    }
}

fn string_field(value: &Value, field: &str) -> Result<String, AdapterError> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            AdapterError::new(AdapterErrorKind::Internal)
                .with_hint(format!("cdp response missing {field}"))
                .with_data(value.clone())
        })
}

#[async_trait]
impl BrowsingSurface for CdpPage {
    async fn current_location(&self) -> Result<String, AdapterError> {
        let page = self.attached().await?;
        let info = self
            .send_browser(
                &page,
                "Target.getTargetInfo",
                json!({ "targetId": page.target_id }),
            )
            .await?;
        info.get("targetInfo")
            .and_then(|target| target.get("url"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                AdapterError::new(AdapterErrorKind::Internal).with_hint("target info without url")
            })
    }

    async fn navigate(&self, url: &str) -> Result<(), AdapterError> {
        debug!(target: "cdp-page", url, "navigating");
        let response = self.send_page("Page.navigate", json!({ "url": url })).await?;
        match response.get("errorText").and_then(Value::as_str) {
            Some(error) if !error.is_empty() => Err(AdapterError::new(AdapterErrorKind::Navigation)
                .with_hint(format!("{url}: {error}"))
                .retriable(true)),
            _ => Ok(()),
        }
    }

    async fn evaluate(&self, script: &PageScript) -> Result<Value, AdapterError> {
        let expression = script.expression()?;
        let response = self
            .send_page(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "awaitPromise": true,
                    "returnByValue": true,
                    "userGesture": true,
                }),
            )
            .await?;

        if let Some(details) = response.get("exceptionDetails") {
            return Err(AdapterError::new(AdapterErrorKind::ScriptException)
                .with_hint(format!("{} raised an exception", script.name))
                .with_data(details.clone()));
        }

        Ok(response
            .get("result")
            .and_then(|res| res.get("value"))
            .cloned()
            .unwrap_or(Value::Null))
    }
}

#[async_trait]
impl SessionCookies for CdpPage {
    async fn set_cookies(&self, cookies: &[CookieParam]) -> Result<(), AdapterError> {
        if cookies.is_empty() {
            return Ok(());
        }
        self.send_page("Network.setCookies", json!({ "cookies": cookies }))
            .await
            .map(|_| ())
    }

    async fn cookies(&self, domain: &str) -> Result<Vec<CookieRecord>, AdapterError> {
        let page = self.attached().await?;
        let response = self.send_browser(&page, "Storage.getCookies", json!({})).await?;
        let all: Vec<CookieRecord> = response
            .get("cookies")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|err| {
                AdapterError::new(AdapterErrorKind::Internal)
                    .with_hint(format!("malformed cookie list: {err}"))
            })?
            .unwrap_or_default();
        Ok(all
            .into_iter()
            .filter(|cookie| domain_matches(&cookie.domain, domain))
            .collect())
    }
}
