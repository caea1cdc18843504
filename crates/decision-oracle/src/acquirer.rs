use std::sync::Arc;

use ballotbot_core_types::{Contender, Decision, Outcome};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::client::OracleClient;
use crate::fetcher::DocumentFetcher;
use crate::json::json_object_candidates;
use crate::DecisionError;

/// Placeholder used in the prompt when an entry has no readable README.
pub const NO_DOCUMENT: &str = "No README";

#[derive(Debug, Deserialize)]
struct Verdict {
    #[serde(alias = "outcome")]
    winner: String,
    #[serde(alias = "rationale", default)]
    explanation: String,
}

/// Parses the oracle reply. When the reply is not a bare verdict, each embedded `{...}` span
/// is tried in order and the first one that reads as a verdict wins.
pub fn parse_decision(reply: &str) -> Result<Decision, DecisionError> {
    let verdict = match serde_json::from_str::<Verdict>(reply.trim()) {
        Ok(verdict) => verdict,
        Err(direct) => {
            let mut last_reason = format!("no JSON object found ({direct})");
            let mut recovered = None;
            for fragment in json_object_candidates(reply) {
                match serde_json::from_str::<Verdict>(fragment) {
                    Ok(verdict) => {
                        recovered = Some(verdict);
                        break;
                    }
                    Err(err) => last_reason = err.to_string(),
                }
            }
            recovered.ok_or_else(|| DecisionError::Format {
                reason: last_reason,
                reply: reply.to_string(),
            })?
        }
    };
    Ok(Decision::new(
        Outcome::from_label(&verdict.winner),
        verdict.explanation.trim(),
    ))
}

fn excerpt(text: Option<&str>, max_chars: usize) -> String {
    match text.map(str::trim).filter(|t| !t.is_empty()) {
        Some(text) => text.chars().take(max_chars).collect(),
        None => NO_DOCUMENT.to_string(),
    }
}

pub fn build_prompt(
    first_title: &str,
    first_doc: Option<&str>,
    second_title: &str,
    second_doc: Option<&str>,
    excerpt_chars: usize,
) -> String {
    format!(
        "You are judging a hackathon vote between two projects.\n\
         Project 1: {first_title}\n\
         README 1: {first_readme}\n\
         Project 2: {second_title}\n\
         README 2: {second_readme}\n\n\
         Compare both projects on technical merit, creativity and how well the story of \
         building them is told, then pick a winner or call it a tie. Keep the explanation \
         to two or three sentences in English.\n\n\
         Answer ONLY with JSON in this exact shape:\n\
         {{\n  \"winner\": \"project1\" | \"project2\" | \"tie\",\n  \"explanation\": \"...\"\n}}\n",
        first_readme = excerpt(first_doc, excerpt_chars),
        second_readme = excerpt(second_doc, excerpt_chars),
    )
}

pub struct DecisionAcquirer {
    oracle: Arc<dyn OracleClient>,
    fetcher: Arc<dyn DocumentFetcher>,
    excerpt_chars: usize,
}

impl DecisionAcquirer {
    pub fn new(
        oracle: Arc<dyn OracleClient>,
        fetcher: Arc<dyn DocumentFetcher>,
        excerpt_chars: usize,
    ) -> Self {
        Self {
            oracle,
            fetcher,
            excerpt_chars,
        }
    }

    async fn document(&self, contender: &Contender) -> Option<String> {
        let reference = contender.external_ref()?;
        let doc = self.fetcher.fetch(reference).await;
        if doc.is_none() {
            debug!(target: "decision-oracle", title = contender.title(), %reference, "no supporting document");
        }
        doc
    }

    /// Fetches both READMEs and asks the oracle. Missing READMEs only weaken the prompt.
    pub async fn decide(
        &self,
        first: &Contender,
        second: &Contender,
    ) -> Result<Decision, DecisionError> {
        let (first_doc, second_doc) = tokio::join!(self.document(first), self.document(second));

        let prompt = build_prompt(
            first.title(),
            first_doc.as_deref(),
            second.title(),
            second_doc.as_deref(),
            self.excerpt_chars,
        );

        let reply = self.oracle.complete(&prompt).await?;
        match parse_decision(&reply) {
            Ok(decision) => {
                info!(
                    target: "decision-oracle",
                    first = first.title(),
                    second = second.title(),
                    outcome = %decision.outcome,
                    "decision received"
                );
                Ok(decision)
            }
            Err(err) => {
                warn!(target: "decision-oracle", %err, "oracle reply unusable");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_reply_parses() {
        let decision =
            parse_decision(r#"{"winner":"project1","explanation":" Solid docs. "}"#).unwrap();
        assert_eq!(decision.outcome, Outcome::First);
        assert_eq!(decision.rationale, "Solid docs.");
    }

    #[test]
    fn aliases_are_accepted() {
        let decision = parse_decision(r#"{"outcome":"second","rationale":"r"}"#).unwrap();
        assert_eq!(decision.outcome, Outcome::Second);
    }

    #[test]
    fn unexpected_winner_becomes_unknown() {
        let decision = parse_decision(r#"{"winner":"project3","explanation":"?"}"#).unwrap();
        assert_eq!(decision.outcome, Outcome::Unknown);
    }

    #[test]
    fn verdict_followed_by_prose_is_recovered() {
        let decision = parse_decision(
            "{\"winner\":\"project2\",\"explanation\":\"Snail is better.\"}\n\nI hope this helps!",
        )
        .unwrap();
        assert_eq!(decision.outcome, Outcome::Second);
        assert_eq!(decision.rationale, "Snail is better.");
    }

    #[test]
    fn braced_words_before_the_verdict_are_skipped() {
        let decision =
            parse_decision(r#"Comparing {both} projects: {"winner":"project2","explanation":"x"}"#)
                .unwrap();
        assert_eq!(decision.outcome, Outcome::Second);
        assert_eq!(decision.rationale, "x");
    }

    #[test]
    fn object_without_winner_is_a_format_error() {
        assert!(matches!(
            parse_decision(r#"Here: {"explanation":"none"}"#),
            Err(DecisionError::Format { .. })
        ));
    }

    #[test]
    fn excerpt_counts_characters_not_bytes() {
        let text = "é".repeat(1500);
        let cut = excerpt(Some(&text), 1000);
        assert_eq!(cut.chars().count(), 1000);
        assert_eq!(excerpt(None, 1000), NO_DOCUMENT);
        assert_eq!(excerpt(Some("   "), 1000), NO_DOCUMENT);
    }

    #[test]
    fn prompt_names_both_projects() {
        let prompt = build_prompt("Rocket", Some("fast"), "Snail", None, 1000);
        assert!(prompt.contains("Project 1: Rocket\nREADME 1: fast\n"));
        assert!(prompt.contains("Project 2: Snail\nREADME 2: No README\n"));
        assert!(prompt.contains("\"winner\": \"project1\" | \"project2\" | \"tie\""));
    }
}
