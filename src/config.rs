//! Application configuration and environment variable parsing.
//!
//! This module handles loading configuration settings from the environment (e.g., .env file).
//! It defines the `AppConfig` struct which governs how deep the GitHub collaborator paginates,
//! how long computed DORA reports stay cached, and which repositories are kept warm.

use crate::repo_url::RepositoryRef;
use serde::Deserialize;
use std::time::Duration as StdDuration;

/// Application configuration loaded from environment variables.
#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    /// Optional GitHub Personal Access Token for higher rate limits.
    pub github_token: Option<String>,

    /// Hard limit on the number of pages fetched per list call against the GitHub API.
    pub max_github_api_pages: u32,

    /// Time to live for cached DORA reports in seconds.
    pub cache_ttl_seconds: u64,

    /// Maximum number of entries to keep in the report cache.
    pub cache_max_capacity: u64,

    /// List of popular repositories to keep warm in the cache.
    /// Expected format: comma-separated string of "owner/repo" pairs.
    /// Example: "facebook/react,rust-lang/rust"
    #[serde(default, deserialize_with = "deserialize_popular_repos")]
    pub popular_repos: Vec<RepositoryRef>,

    /// Maximum number of concurrent refreshes of popular repositories.
    #[serde(default = "default_concurrency_limit")]
    pub popular_repos_concurrency_limit: usize,

    /// Maximum number of tag commits resolved concurrently.
    #[serde(default = "default_tag_commit_concurrency")]
    pub tag_commit_concurrency: usize,

    /// Label used to select bug issues.
    #[serde(default = "default_bug_label")]
    pub bug_label: String,
}

fn default_concurrency_limit() -> usize {
    10
}

fn default_tag_commit_concurrency() -> usize {
    8
}

fn default_bug_label() -> String {
    "bug".to_string()
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    pub fn cache_ttl(&self) -> StdDuration {
        StdDuration::from_secs(self.cache_ttl_seconds)
    }
}

fn deserialize_popular_repos<'de, D>(deserializer: D) -> Result<Vec<RepositoryRef>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Ok(parse_popular_repos(&s))
}

fn parse_popular_repos(s: &str) -> Vec<RepositoryRef> {
    s.split(',')
        .filter_map(|part| {
            let parts: Vec<&str> = part.trim().split('/').collect();
            match parts.as_slice() {
                [owner, repo] if !owner.trim().is_empty() && !repo.trim().is_empty() => {
                    Some(RepositoryRef {
                        owner: owner.trim().to_string(),
                        repo: repo.trim().to_string(),
                    })
                }
                _ => {
                    tracing::warn!(entry = part, "Ignoring malformed POPULAR_REPOS entry");
                    None
                }
            }
        })
        .collect()
}
