//! Raw repository activity as returned by the GitHub API, reduced to the fields the DORA
//! calculators need, and the deployment events derived from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseRecord {
    pub tag_name: String,
    pub name: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub draft: bool,
    pub prerelease: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagRecord {
    pub name: String,
    /// Author date of the tagged commit, if it could be resolved.
    pub commit_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub sha: String,
    pub message: String,
    pub author_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequestRecord {
    pub created_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueRecord {
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub labels: Vec<String>,
    pub title: String,
    pub body: String,
}

/// Everything fetched for one repository. Each list is fetched once and shared by all windows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepoActivity {
    pub releases: Vec<ReleaseRecord>,
    pub tags: Vec<TagRecord>,
    pub commits: Vec<CommitRecord>,
    pub pull_requests: Vec<PullRequestRecord>,
    pub bug_issues: Vec<IssueRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentSource {
    Release,
    Tag,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentEvent {
    pub timestamp: DateTime<Utc>,
    pub source: DeploymentSource,
}

impl DeploymentEvent {
    pub fn new(timestamp: DateTime<Utc>, source: DeploymentSource) -> Self {
        Self { timestamp, source }
    }
}

/// Builds the deployment timeline from releases and tags, sorted by time.
///
/// Releases and tags pointing at the same commit are both kept; no de-duplication is done.
/// Records without a usable timestamp contribute nothing.
pub fn deployment_events(releases: &[ReleaseRecord], tags: &[TagRecord]) -> Vec<DeploymentEvent> {
    let from_releases = releases
        .iter()
        .filter_map(|r| r.created_at)
        .map(|ts| DeploymentEvent::new(ts, DeploymentSource::Release));

    let from_tags = tags
        .iter()
        .filter_map(|t| t.commit_date)
        .map(|ts| DeploymentEvent::new(ts, DeploymentSource::Tag));

    let mut events: Vec<DeploymentEvent> = from_releases.chain(from_tags).collect();
    events.sort_by_key(|e| e.timestamp);
    events
}
