//! Chromium DevTools Protocol browsing surface.
//!
//! The rest of the workspace only sees two narrow traits: [`BrowsingSurface`] (where am I,
//! go there, run this query and hand me JSON) and [`SessionCookies`]. [`CdpPage`] implements
//! both on top of a single attached page target, speaking raw CDP through a
//! [`transport::CdpTransport`].

pub mod commands;
pub mod config;
pub mod metrics;
pub mod page;
pub mod transport;
pub mod util;

use async_trait::async_trait;
use serde_json::Value;

pub use commands::{CookieParam, CookieRecord, PageIdentity, PageScript};
pub use config::CdpConfig;
pub use error::{AdapterError, AdapterErrorKind};
pub use page::CdpPage;

pub mod error {
    use serde::{Deserialize, Serialize};
    use std::fmt;
    use thiserror::Error;

    /// High-level error categories surfaced by the adapter.
    #[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
    pub enum AdapterErrorKind {
        #[error("command timed out")]
        Timeout,
        #[error("navigation failed")]
        Navigation,
        #[error("cdp i/o failure")]
        CdpIo,
        #[error("page script raised an exception")]
        ScriptException,
        #[error("internal error")]
        Internal,
    }

    /// Error plus the context needed to decide whether a retry is worth it.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct AdapterError {
        pub kind: AdapterErrorKind,
        pub hint: Option<String>,
        pub retriable: bool,
        pub data: Option<serde_json::Value>,
    }

    impl fmt::Display for AdapterError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.kind)?;
            if let Some(hint) = &self.hint {
                write!(f, ": {}", hint)?;
            }
            Ok(())
        }
    }

    impl std::error::Error for AdapterError {}

    impl AdapterError {
        pub fn new(kind: AdapterErrorKind) -> Self {
            Self {
                kind,
                hint: None,
                retriable: false,
                data: None,
            }
        }

        pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
            self.hint = Some(hint.into());
            self
        }

        pub fn retriable(mut self, flag: bool) -> Self {
            self.retriable = flag;
            self
        }

        pub fn with_data(mut self, data: serde_json::Value) -> Self {
            self.data = Some(data);
            self
        }

        /// True when the underlying connection or session is likely gone.
        pub fn is_connection_loss(&self) -> bool {
            matches!(self.kind, AdapterErrorKind::CdpIo)
        }
    }
}

/// Request/response view of a rendered page. Implementations never expose the DOM itself.
#[async_trait]
pub trait BrowsingSurface: Send + Sync {
    async fn current_location(&self) -> Result<String, AdapterError>;

    async fn navigate(&self, url: &str) -> Result<(), AdapterError>;

    /// Runs `script` in the page and returns its JSON-serialisable result.
    async fn evaluate(&self, script: &PageScript) -> Result<Value, AdapterError>;
}

/// Cookie store of the browsing session.
#[async_trait]
pub trait SessionCookies: Send + Sync {
    async fn set_cookies(&self, cookies: &[CookieParam]) -> Result<(), AdapterError>;

    /// Cookies whose domain falls under `domain` (leading dots ignored).
    async fn cookies(&self, domain: &str) -> Result<Vec<CookieRecord>, AdapterError>;
}
