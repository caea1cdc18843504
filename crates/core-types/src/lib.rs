//! Ballot primitives shared by every ballotbot crate.
//!
//! Nothing in here talks to a browser or a network; the types only describe what the page
//! scanner observed, what the judge decided and which credentials the gate applies.

use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;
use url::Url;

/// Title reported for the reserved tie control, whatever its label says.
pub const TIE_TITLE: &str = "Tie";

/// Title reported for a decision control whose label could not be read.
pub const UNKNOWN_TITLE: &str = "Unknown";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid external reference `{href}`: {reason}")]
    InvalidReference { href: String, reason: String },
}

/// A votable candidate scraped from the rendered ballot page.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub title: String,
    pub external_ref: Url,
    pub observed_at: DateTime<Utc>,
}

impl Entry {
    /// Builds an entry observed now. Fails when `href` is not an absolute URL.
    pub fn observed(title: impl Into<String>, href: &str) -> Result<Self, CoreError> {
        let external_ref = Url::parse(href).map_err(|err| CoreError::InvalidReference {
            href: href.to_string(),
            reason: err.to_string(),
        })?;
        Ok(Self {
            title: title.into(),
            external_ref,
            observed_at: Utc::now(),
        })
    }
}

/// One selectable option of the ballot form, including the reserved tie option.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DecisionTarget {
    pub selectable_id: String,
    pub title: String,
}

impl DecisionTarget {
    pub fn new(selectable_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            selectable_id: selectable_id.into(),
            title: title.into(),
        }
    }

    pub fn is_tie(&self, tie_sentinel: &str) -> bool {
        self.selectable_id == tie_sentinel
    }
}

/// Ternary verdict of the judge, plus `Unknown` for anything it should not have said.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
    First,
    Second,
    Tie,
    Unknown,
}

impl Outcome {
    /// Maps the judge's wire label onto an outcome. Unrecognised labels become `Unknown`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "project1" | "first" | "1" => Outcome::First,
            "project2" | "second" | "2" => Outcome::Second,
            "tie" | "draw" => Outcome::Tie,
            _ => Outcome::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::First => "first",
            Outcome::Second => "second",
            Outcome::Tie => "tie",
            Outcome::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict handed from the decision oracle to the submission step.
///
/// Deliberately not `Clone`: a decision is moved into exactly one submission.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize))]
#[derive(Debug, PartialEq, Eq)]
pub struct Decision {
    pub outcome: Outcome,
    pub rationale: String,
}

impl Decision {
    pub fn new(outcome: Outcome, rationale: impl Into<String>) -> Self {
        Self {
            outcome,
            rationale: rationale.into(),
        }
    }
}

/// A `name=value` pair read from the operator-edited credential store.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CredentialRecord {
    pub name: String,
    pub value: String,
}

impl CredentialRecord {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One side of a reconciled pair: the form target and, if titles lined up, its scraped entry.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Contender {
    pub target: DecisionTarget,
    pub entry: Option<Entry>,
}

impl Contender {
    pub fn title(&self) -> &str {
        &self.target.title
    }

    pub fn external_ref(&self) -> Option<&Url> {
        self.entry.as_ref().map(|entry| &entry.external_ref)
    }
}

/// The two non-tie contenders selected for one cycle, in form order.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Matchup {
    pub first: Contender,
    pub second: Contender,
}

impl Matchup {
    /// Selectable id the page expects for a decided outcome; `None` when no control fits.
    pub fn winning_id<'a>(
        &'a self,
        outcome: Outcome,
        targets: &'a [DecisionTarget],
        tie_sentinel: &str,
    ) -> Option<&'a str> {
        match outcome {
            Outcome::First => Some(self.first.target.selectable_id.as_str()),
            Outcome::Second => Some(self.second.target.selectable_id.as_str()),
            Outcome::Tie => targets
                .iter()
                .find(|target| target.is_tie(tie_sentinel))
                .map(|target| target.selectable_id.as_str()),
            Outcome::Unknown => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contender(id: &str, title: &str) -> Contender {
        Contender {
            target: DecisionTarget::new(id, title),
            entry: None,
        }
    }

    #[test]
    fn outcome_labels_cover_wire_and_synonyms() {
        assert_eq!(Outcome::from_label("project1"), Outcome::First);
        assert_eq!(Outcome::from_label(" Project2 "), Outcome::Second);
        assert_eq!(Outcome::from_label("second"), Outcome::Second);
        assert_eq!(Outcome::from_label("TIE"), Outcome::Tie);
        assert_eq!(Outcome::from_label("project3"), Outcome::Unknown);
        assert_eq!(Outcome::from_label(""), Outcome::Unknown);
    }

    #[test]
    fn entry_rejects_relative_reference() {
        let err = Entry::observed("Rocket", "/owner/repo").unwrap_err();
        assert!(matches!(err, CoreError::InvalidReference { .. }));

        let entry = Entry::observed("Rocket", "https://github.com/owner/repo").unwrap();
        assert_eq!(entry.external_ref.host_str(), Some("github.com"));
    }

    #[test]
    fn winning_id_resolves_each_outcome() {
        let matchup = Matchup {
            first: contender("11", "A"),
            second: contender("22", "B"),
        };
        let targets = vec![
            DecisionTarget::new("11", "A"),
            DecisionTarget::new("tie", TIE_TITLE),
            DecisionTarget::new("22", "B"),
        ];

        assert_eq!(matchup.winning_id(Outcome::First, &targets, "tie"), Some("11"));
        assert_eq!(matchup.winning_id(Outcome::Second, &targets, "tie"), Some("22"));
        assert_eq!(matchup.winning_id(Outcome::Tie, &targets, "tie"), Some("tie"));
        assert_eq!(matchup.winning_id(Outcome::Unknown, &targets, "tie"), None);
        assert_eq!(matchup.winning_id(Outcome::Tie, &targets[..1], "tie"), None);
    }
}
