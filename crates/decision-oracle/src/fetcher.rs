use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{header, Client};
use serde::Deserialize;
use tracing::debug;
use url::Url;

/// Supporting-text source for one entry. `None` on any failure.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, reference: &Url) -> Option<String>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
    pub branch: Option<String>,
}

/// Understands `github.com/<owner>/<repo>` with optional `/tree/<branch>` or `/blob/<branch>/...`.
pub fn parse_repository_url(url: &Url) -> Option<RepoRef> {
    let host = url.host_str()?.to_ascii_lowercase();
    if host != "github.com" && host != "www.github.com" {
        return None;
    }
    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
    let owner = segments.next()?.to_string();
    let repo = segments.next()?.trim_end_matches(".git").to_string();
    if repo.is_empty() {
        return None;
    }
    let branch = match segments.next() {
        Some("tree") | Some("blob") => segments.next().map(str::to_string),
        _ => None,
    };
    Some(RepoRef {
        owner,
        repo,
        branch,
    })
}

static BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());
static HTML_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());
static MD_LINKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").unwrap());
static HEADING_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"#{4,}").unwrap());

/// Squeezes a README into prompt-friendly text.
pub fn clean_readme(content: &str) -> String {
    let cleaned = BLANK_RUNS.replace_all(content, "\n\n");
    let cleaned = HTML_TAGS.replace_all(&cleaned, "");
    let cleaned = MD_LINKS.replace_all(&cleaned, "$1 ($2)");
    let cleaned = HEADING_RUNS.replace_all(&cleaned, "###");
    cleaned.trim().to_string()
}

#[derive(Clone, Debug)]
pub struct FetcherConfig {
    pub api_base: String,
    pub raw_base: String,
    pub user_agent: String,
    pub timeout: Duration,
    /// Branches tried for raw files; the branch named in the URL is tried after the first two.
    pub branches: Vec<String>,
    pub readme_files: Vec<String>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".into(),
            raw_base: "https://raw.githubusercontent.com".into(),
            user_agent: concat!("ballotbot/", env!("CARGO_PKG_VERSION")).into(),
            timeout: Duration::from_secs(10),
            branches: vec!["main".into(), "master".into(), "develop".into()],
            readme_files: vec![
                "README.md".into(),
                "readme.md".into(),
                "README.MD".into(),
                "README.txt".into(),
                "README.rst".into(),
                "README".into(),
            ],
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReadmePayload {
    content: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
}

pub struct GithubReadmeFetcher {
    client: Client,
    config: FetcherConfig,
}

impl GithubReadmeFetcher {
    pub fn new(config: FetcherConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client, config })
    }

    fn branch_order(&self, repo: &RepoRef) -> Vec<String> {
        let mut order: Vec<String> = Vec::new();
        let mut push = |branch: &str| {
            if !order.iter().any(|b| b == branch) {
                order.push(branch.to_string());
            }
        };
        let (head, tail) = self
            .config
            .branches
            .split_at(self.config.branches.len().min(2));
        head.iter().for_each(|b| push(b.as_str()));
        if let Some(branch) = &repo.branch {
            push(branch.as_str());
        }
        tail.iter().for_each(|b| push(b.as_str()));
        order
    }

    async fn via_api(&self, repo: &RepoRef) -> Option<String> {
        let url = format!(
            "{}/repos/{}/{}/readme",
            self.config.api_base.trim_end_matches('/'),
            repo.owner,
            repo.repo
        );
        let response = self
            .client
            .get(&url)
            .header(header::ACCEPT, "application/vnd.github.v3+json")
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            debug!(target: "doc-fetcher", status = %response.status(), "readme api miss");
            return None;
        }
        let payload: ReadmePayload = response.json().await.ok()?;
        if payload.encoding.as_deref().is_some_and(|enc| enc != "base64") {
            return None;
        }
        let compact: String = payload
            .content?
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(compact)
            .ok()?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        (!text.trim().is_empty()).then_some(text)
    }

    async fn via_raw(&self, repo: &RepoRef, branch: &str) -> Option<String> {
        for file in &self.config.readme_files {
            let url = format!(
                "{}/{}/{}/{}/{}",
                self.config.raw_base.trim_end_matches('/'),
                repo.owner,
                repo.repo,
                branch,
                file
            );
            let Ok(response) = self.client.get(&url).send().await else {
                continue;
            };
            if !response.status().is_success() {
                continue;
            }
            if let Ok(text) = response.text().await {
                if !text.trim().is_empty() {
                    return Some(text);
                }
            }
        }
        None
    }
}

#[async_trait]
impl DocumentFetcher for GithubReadmeFetcher {
    async fn fetch(&self, reference: &Url) -> Option<String> {
        let Some(repo) = parse_repository_url(reference) else {
            debug!(target: "doc-fetcher", %reference, "not a repository url");
            return None;
        };

        if let Some(text) = self.via_api(&repo).await {
            return Some(clean_readme(&text));
        }
        for branch in self.branch_order(&repo) {
            if let Some(text) = self.via_raw(&repo, &branch).await {
                debug!(target: "doc-fetcher", owner = %repo.owner, repo = %repo.repo, %branch, "readme from raw");
                return Some(clean_readme(&text));
            }
        }
        debug!(target: "doc-fetcher", owner = %repo.owner, repo = %repo.repo, "no readme found");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn parses_repository_shapes() {
        assert_eq!(
            parse_repository_url(&url("https://github.com/acme/rocket.git")),
            Some(RepoRef {
                owner: "acme".into(),
                repo: "rocket".into(),
                branch: None
            })
        );
        assert_eq!(
            parse_repository_url(&url("https://github.com/acme/rocket/tree/dev")).unwrap().branch,
            Some("dev".into())
        );
        assert_eq!(
            parse_repository_url(&url("https://github.com/acme/rocket/blob/v2/src/main.rs"))
                .unwrap()
                .branch,
            Some("v2".into())
        );
        assert!(parse_repository_url(&url("https://github.com/acme")).is_none());
        assert!(parse_repository_url(&url("https://gitlab.com/acme/rocket")).is_none());
    }

    #[test]
    fn cleans_markup() {
        let raw = "# Title\n\n\n\n<p align=\"center\">Logo</p>\nSee [docs](https://x.dev).\n##### Deep\n";
        assert_eq!(
            clean_readme(raw),
            "# Title\n\nLogo\nSee docs (https://x.dev).\n### Deep"
        );
    }

    #[test]
    fn url_branch_slots_in_after_defaults() {
        let fetcher = GithubReadmeFetcher::new(FetcherConfig::default()).unwrap();
        let repo = RepoRef {
            owner: "o".into(),
            repo: "r".into(),
            branch: Some("gh-pages".into()),
        };
        assert_eq!(
            fetcher.branch_order(&repo),
            vec!["main", "master", "gh-pages", "develop"]
        );
        let main = RepoRef {
            branch: Some("main".into()),
            ..repo
        };
        assert_eq!(fetcher.branch_order(&main), vec!["main", "master", "develop"]);
    }
}
