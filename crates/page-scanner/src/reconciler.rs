use std::sync::Arc;

use ballotbot_core_types::{Contender, DecisionTarget, Entry, Matchup, TIE_TITLE, UNKNOWN_TITLE};
use cdp_adapter::BrowsingSurface;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{scripts, Selectors};

/// Joins a form target to the scraped entry describing the same candidate.
pub trait EntryMatcher: Send + Sync {
    fn find<'a>(&self, target: &DecisionTarget, entries: &'a [Entry]) -> Option<&'a Entry>;
}

/// Exact title equality. Titles that differ in any way stay unmatched.
#[derive(Clone, Copy, Debug, Default)]
pub struct TitleMatcher;

impl EntryMatcher for TitleMatcher {
    fn find<'a>(&self, target: &DecisionTarget, entries: &'a [Entry]) -> Option<&'a Entry> {
        entries.iter().find(|entry| entry.title == target.title)
    }
}

/// Picks the first two non-tie targets in form order and attaches their entries.
pub fn reconcile(
    matcher: &dyn EntryMatcher,
    targets: &[DecisionTarget],
    entries: &[Entry],
    tie_sentinel: &str,
) -> Option<Matchup> {
    let mut candidates = targets
        .iter()
        .filter(|target| !target.is_tie(tie_sentinel))
        .map(|target| Contender {
            target: target.clone(),
            entry: matcher.find(target, entries).cloned(),
        });
    let first = candidates.next()?;
    let second = candidates.next()?;
    Some(Matchup { first, second })
}

#[derive(Debug, Deserialize)]
struct RawTarget {
    id: String,
    title: Option<String>,
}

pub struct FormReconciler {
    surface: Arc<dyn BrowsingSurface>,
    selectors: Selectors,
    matcher: Arc<dyn EntryMatcher>,
}

impl FormReconciler {
    pub fn new(surface: Arc<dyn BrowsingSurface>, selectors: Selectors) -> Self {
        Self::with_matcher(surface, selectors, Arc::new(TitleMatcher))
    }

    pub fn with_matcher(
        surface: Arc<dyn BrowsingSurface>,
        selectors: Selectors,
        matcher: Arc<dyn EntryMatcher>,
    ) -> Self {
        Self {
            surface,
            selectors,
            matcher,
        }
    }

    pub fn tie_sentinel(&self) -> &str {
        &self.selectors.tie_sentinel
    }

    /// Decision targets currently exposed by the form, tie option included.
    pub async fn current_targets(&self) -> Vec<DecisionTarget> {
        let value = match self
            .surface
            .evaluate(&scripts::decision_targets(&self.selectors))
            .await
        {
            Ok(value) => value,
            Err(err) => {
                warn!(target: "form-reconciler", %err, "decision target query failed");
                return Vec::new();
            }
        };

        let raw: Vec<RawTarget> = match serde_json::from_value(value) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(target: "form-reconciler", %err, "unexpected decision target result");
                return Vec::new();
            }
        };

        let targets: Vec<DecisionTarget> = raw
            .into_iter()
            .map(|raw| {
                let title = if raw.id == self.selectors.tie_sentinel {
                    TIE_TITLE.to_string()
                } else {
                    raw.title
                        .filter(|title| !title.is_empty())
                        .unwrap_or_else(|| UNKNOWN_TITLE.to_string())
                };
                DecisionTarget::new(raw.id, title)
            })
            .collect();

        debug!(target: "form-reconciler", count = targets.len(), "decision targets read");
        targets
    }

    pub fn reconcile(&self, targets: &[DecisionTarget], entries: &[Entry]) -> Option<Matchup> {
        let matchup = reconcile(
            self.matcher.as_ref(),
            targets,
            entries,
            &self.selectors.tie_sentinel,
        )?;
        for contender in [&matchup.first, &matchup.second] {
            if contender.entry.is_none() {
                debug!(
                    target: "form-reconciler",
                    title = contender.title(),
                    "no entry with a matching title"
                );
            }
        }
        Some(matchup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(title: &str) -> Entry {
        Entry::observed(title, &format!("https://github.com/acme/{}", title.to_lowercase()))
            .unwrap()
    }

    #[test]
    fn joins_first_two_targets_and_discards_extra_entries() {
        let targets = vec![
            DecisionTarget::new("11", "A"),
            DecisionTarget::new("tie", TIE_TITLE),
            DecisionTarget::new("22", "B"),
        ];
        let entries = vec![entry("C"), entry("B"), entry("A")];

        let matchup = reconcile(&TitleMatcher, &targets, &entries, "tie").unwrap();

        assert_eq!(matchup.first.target.selectable_id, "11");
        assert_eq!(matchup.first.entry.as_ref().unwrap().title, "A");
        assert_eq!(matchup.second.target.selectable_id, "22");
        assert_eq!(matchup.second.entry.as_ref().unwrap().title, "B");
    }

    #[test]
    fn mismatched_title_stays_unmatched() {
        let targets = vec![
            DecisionTarget::new("11", "Rocket Launcher"),
            DecisionTarget::new("22", "B"),
        ];
        let entries = vec![entry("Rocket Launch"), entry("B")];

        let matchup = reconcile(&TitleMatcher, &targets, &entries, "tie").unwrap();

        assert!(matchup.first.entry.is_none());
        assert!(matchup.second.entry.is_some());
    }

    #[test]
    fn fewer_than_two_non_tie_targets_yields_nothing() {
        let targets = vec![
            DecisionTarget::new("11", "A"),
            DecisionTarget::new("tie", TIE_TITLE),
        ];
        assert!(reconcile(&TitleMatcher, &targets, &[entry("A")], "tie").is_none());
        assert!(reconcile(&TitleMatcher, &[], &[], "tie").is_none());
    }
}
