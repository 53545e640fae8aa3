//! Resolution of GitHub repository URLs into an `owner/repo` pair.
//!
//! Parsing is strict about the host (only `github.com` is accepted) and lenient about the
//! path: empty segments are skipped, a trailing `.git` is stripped, and anything after the
//! repository name (sub-paths, query string, fragment) is ignored.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use url::Url;

const GITHUB_HOST: &str = "github.com";

/// A unique identifier for a GitHub repository.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryRef {
    /// The owner of the repository (e.g., "facebook").
    pub owner: String,
    /// The name of the repository (e.g., "react").
    pub repo: String,
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Input errors raised before any network I/O takes place.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepoUrlError {
    #[error("invalid repository URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid repository URL '{0}': hostname must be github.com")]
    InvalidHost(String),

    #[error("invalid repository URL '{0}': must contain owner and repository name")]
    InvalidPath(String),
}

/// Parses a GitHub repository URL such as `https://github.com/rust-lang/rust`.
pub fn parse(url: &str) -> Result<RepositoryRef, RepoUrlError> {
    let parsed = Url::parse(url.trim()).map_err(|e| RepoUrlError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    if parsed.host_str() != Some(GITHUB_HOST) {
        return Err(RepoUrlError::InvalidHost(url.to_string()));
    }

    let mut segments = parsed.path().split('/').filter(|s| !s.is_empty());
    let (Some(owner), Some(repo)) = (segments.next(), segments.next()) else {
        return Err(RepoUrlError::InvalidPath(url.to_string()));
    };

    let repo = repo.strip_suffix(".git").unwrap_or(repo);
    if repo.is_empty() {
        return Err(RepoUrlError::InvalidPath(url.to_string()));
    }

    Ok(RepositoryRef {
        owner: owner.to_string(),
        repo: repo.to_string(),
    })
}
