//! Credential bootstrap: an operator pastes session cookies into a plain text file, the gate
//! notices, pushes them into the browser and stamps the file as applied.

mod backup;
mod gate;
pub mod store;

use std::path::PathBuf;

use cdp_adapter::AdapterError;
use thiserror::Error;

pub use backup::{BackupCookie, BackupSnapshot};
pub use gate::{CredentialGate, GateConfig};
pub use store::{parse_records, StoreState, APPLIED_MARKER};

#[derive(Debug, Error)]
pub enum GateError {
    #[error("credential store {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("browser session rejected cookies: {0}")]
    Session(#[from] AdapterError),
    #[error("failed to encode backup: {0}")]
    Encode(#[from] serde_json::Error),
}

impl GateError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
