use std::sync::Arc;

use ballotbot_core_types::Entry;
use cdp_adapter::BrowsingSurface;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{scripts, Selectors};

#[derive(Debug, Deserialize)]
struct RawEntry {
    index: usize,
    title: Option<String>,
    href: String,
}

pub struct EntryExtractor {
    surface: Arc<dyn BrowsingSurface>,
    selectors: Selectors,
}

impl EntryExtractor {
    pub fn new(surface: Arc<dyn BrowsingSurface>, selectors: Selectors) -> Self {
        Self { surface, selectors }
    }

    /// Point-in-time list of votable entries in document order.
    pub async fn extract(&self) -> Vec<Entry> {
        let value = match self
            .surface
            .evaluate(&scripts::extract_entries(&self.selectors))
            .await
        {
            Ok(value) => value,
            Err(err) => {
                warn!(target: "entry-extractor", %err, "entry query failed");
                return Vec::new();
            }
        };

        let raw: Vec<RawEntry> = match serde_json::from_value(value) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(target: "entry-extractor", %err, "unexpected entry query result");
                return Vec::new();
            }
        };

        let entries: Vec<Entry> = raw
            .into_iter()
            .filter_map(|raw| {
                let title = raw
                    .title
                    .filter(|title| !title.is_empty())
                    .unwrap_or_else(|| format!("Entry {}", raw.index));
                match Entry::observed(title, &raw.href) {
                    Ok(entry) => Some(entry),
                    Err(err) => {
                        debug!(target: "entry-extractor", %err, "skipping entry");
                        None
                    }
                }
            })
            .collect();

        debug!(target: "entry-extractor", count = entries.len(), "entries extracted");
        entries
    }
}
