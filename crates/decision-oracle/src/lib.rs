//! Judging a matchup: fetch both READMEs, ask an LLM, parse a strict verdict.

mod acquirer;
mod client;
mod fetcher;
mod json;

use thiserror::Error;

pub use acquirer::{build_prompt, parse_decision, DecisionAcquirer, NO_DOCUMENT};
pub use client::{OpenAiOracle, OracleClient, OracleConfig};
pub use fetcher::{
    clean_readme, parse_repository_url, DocumentFetcher, FetcherConfig, GithubReadmeFetcher,
    RepoRef,
};
pub use json::json_object_candidates;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("no API key configured for the decision oracle")]
    MissingKey,
    #[error("oracle request failed: {0}")]
    Request(String),
    #[error("oracle returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("{0}")]
    RateLimited(String),
    #[error("oracle response invalid: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum DecisionError {
    /// Neither the reply nor any object embedded in it parsed as a verdict.
    #[error("unusable oracle reply ({reason}): {reply}")]
    Format { reason: String, reply: String },
    #[error(transparent)]
    Oracle(#[from] OracleError),
}
