//! The GitHub side of the pipeline.
//!
//! `ActivitySource` is the seam between the DORA computation and the network: the orchestrator
//! only ever sees the five list operations, so tests can substitute an in-memory source.
//! `GitHubClient` implements it on top of octocrab's authenticated HTTP client.

use crate::config::AppConfig;
use crate::repo_url::RepositoryRef;
use crate::types::{CommitRecord, IssueRecord, PullRequestRecord, ReleaseRecord, TagRecord};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use octocrab::Octocrab;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

const PER_PAGE: u8 = 100;

/// Read access to the raw activity of a repository.
#[async_trait]
pub trait ActivitySource: Send + Sync {
    async fn list_releases(&self, repo: &RepositoryRef) -> Result<Vec<ReleaseRecord>>;

    /// Tags with the author date of the commit they point at, when it can be resolved.
    async fn list_tags(&self, repo: &RepositoryRef) -> Result<Vec<TagRecord>>;

    async fn list_commits(&self, repo: &RepositoryRef) -> Result<Vec<CommitRecord>>;

    /// Closed pull requests.
    async fn list_pull_requests(&self, repo: &RepositoryRef) -> Result<Vec<PullRequestRecord>>;

    /// Closed issues carrying the bug label.
    async fn list_bug_issues(&self, repo: &RepositoryRef) -> Result<Vec<IssueRecord>>;
}

#[derive(Debug, Deserialize)]
struct ApiRelease {
    tag_name: String,
    name: Option<String>,
    created_at: Option<String>,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    prerelease: bool,
}

#[derive(Debug, Deserialize)]
struct ApiTag {
    name: String,
    commit: Option<ApiObjectRef>,
}

#[derive(Debug, Deserialize)]
struct ApiObjectRef {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct ApiCommit {
    sha: String,
    commit: ApiCommitDetail,
}

#[derive(Debug, Deserialize)]
struct ApiCommitDetail {
    #[serde(default)]
    message: String,
    author: Option<ApiSignature>,
}

#[derive(Debug, Deserialize)]
struct ApiSignature {
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiPullRequest {
    created_at: Option<String>,
    merged_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiIssue {
    created_at: Option<String>,
    closed_at: Option<String>,
    #[serde(default)]
    labels: Vec<ApiLabel>,
    #[serde(default)]
    title: String,
    body: Option<String>,
    /// Present when the "issue" is actually a pull request.
    pull_request: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ApiLabel {
    name: String,
}

#[derive(Debug, Serialize)]
struct ListParams<'a> {
    per_page: u8,
    page: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    labels: Option<&'a str>,
}

/// Parses a GitHub timestamp, mapping anything that is not RFC 3339 to `None`.
fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

#[derive(Clone)]
pub struct GitHubClient {
    octocrab: Octocrab,
    max_pages: u32,
    tag_commit_concurrency: usize,
    bug_label: String,
}

impl GitHubClient {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let mut builder = Octocrab::builder();
        if let Some(token) = &config.github_token {
            builder = builder.personal_token(token.clone());
        }

        Ok(Self::with_octocrab(builder.build()?, config))
    }

    /// Wraps an already configured octocrab instance (e.g. one pointed at a test server).
    pub fn with_octocrab(octocrab: Octocrab, config: &AppConfig) -> Self {
        Self {
            octocrab,
            max_pages: config.max_github_api_pages.max(1),
            tag_commit_concurrency: config.tag_commit_concurrency.max(1),
            bug_label: config.bug_label.clone(),
        }
    }

    fn repo_route(repo: &RepositoryRef, suffix: &str) -> String {
        // Sanitize inputs to prevent path traversal or unintended endpoint access
        let owner = repo.owner.trim().replace("..", "");
        let name = repo.repo.trim().replace("..", "");
        format!("/repos/{owner}/{name}/{suffix}")
    }

    /// Walks a list endpoint page by page until a short page or the page limit.
    async fn fetch_pages<T: DeserializeOwned>(
        &self,
        route: &str,
        state: Option<&str>,
        labels: Option<&str>,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();

        for page in 1..=self.max_pages {
            let params = ListParams {
                per_page: PER_PAGE,
                page,
                state,
                labels,
            };
            let batch: Vec<T> = self.octocrab.get(route, Some(&params)).await?;
            let is_last = batch.len() < PER_PAGE as usize;
            items.extend(batch);

            if is_last {
                return Ok(items);
            }
        }

        tracing::warn!(
            route,
            max_pages = self.max_pages,
            "Hit max_github_api_pages before the last page. Data may be incomplete."
        );
        Ok(items)
    }

    /// Looks up the author date of a tag's commit.
    ///
    /// A commit GitHub reports as missing leaves the tag undated; any other failure aborts the
    /// fetch so a partial tag list is never reported as complete.
    async fn resolve_tag(&self, repo: &RepositoryRef, tag: ApiTag) -> Result<TagRecord> {
        let Some(commit) = tag.commit else {
            return Ok(TagRecord {
                name: tag.name,
                commit_date: None,
            });
        };

        let route = Self::repo_route(repo, &format!("commits/{}", commit.sha));
        let detail: octocrab::Result<ApiCommit> = self.octocrab.get(&route, None::<&()>).await;
        let commit_date = match detail {
            Ok(detail) => parse_timestamp(detail.commit.author.and_then(|a| a.date).as_deref()),
            Err(octocrab::Error::GitHub { source, .. })
                if source.message.to_lowercase().contains("not found") =>
            {
                tracing::debug!(repo = %repo, tag = %tag.name, "Tag commit not found");
                None
            }
            Err(e) => {
                tracing::warn!(repo = %repo, tag = %tag.name, "Could not resolve tag commit: {}", e);
                return Err(e.into());
            }
        };

        Ok(TagRecord {
            name: tag.name,
            commit_date,
        })
    }
}

#[async_trait]
impl ActivitySource for GitHubClient {
    async fn list_releases(&self, repo: &RepositoryRef) -> Result<Vec<ReleaseRecord>> {
        let releases: Vec<ApiRelease> = self
            .fetch_pages(&Self::repo_route(repo, "releases"), None, None)
            .await?;

        Ok(releases
            .into_iter()
            .map(|r| ReleaseRecord {
                created_at: parse_timestamp(r.created_at.as_deref()),
                tag_name: r.tag_name,
                name: r.name,
                draft: r.draft,
                prerelease: r.prerelease,
            })
            .collect())
    }

    async fn list_tags(&self, repo: &RepositoryRef) -> Result<Vec<TagRecord>> {
        let tags: Vec<ApiTag> = self
            .fetch_pages(&Self::repo_route(repo, "tags"), None, None)
            .await?;

        stream::iter(tags)
            .map(|tag| self.resolve_tag(repo, tag))
            .buffered(self.tag_commit_concurrency)
            .try_collect()
            .await
    }

    async fn list_commits(&self, repo: &RepositoryRef) -> Result<Vec<CommitRecord>> {
        let commits: Vec<ApiCommit> = self
            .fetch_pages(&Self::repo_route(repo, "commits"), None, None)
            .await?;

        Ok(commits
            .into_iter()
            .map(|c| CommitRecord {
                author_date: parse_timestamp(c.commit.author.and_then(|a| a.date).as_deref()),
                sha: c.sha,
                message: c.commit.message,
            })
            .collect())
    }

    async fn list_pull_requests(&self, repo: &RepositoryRef) -> Result<Vec<PullRequestRecord>> {
        let pulls: Vec<ApiPullRequest> = self
            .fetch_pages(&Self::repo_route(repo, "pulls"), Some("closed"), None)
            .await?;

        Ok(pulls
            .into_iter()
            .filter_map(|pr| {
                Some(PullRequestRecord {
                    created_at: parse_timestamp(pr.created_at.as_deref())?,
                    merged_at: parse_timestamp(pr.merged_at.as_deref()),
                })
            })
            .collect())
    }

    async fn list_bug_issues(&self, repo: &RepositoryRef) -> Result<Vec<IssueRecord>> {
        let issues: Vec<ApiIssue> = self
            .fetch_pages(
                &Self::repo_route(repo, "issues"),
                Some("closed"),
                Some(self.bug_label.as_str()),
            )
            .await?;

        Ok(issues
            .into_iter()
            .filter(|issue| issue.pull_request.is_none())
            .filter_map(|issue| {
                Some(IssueRecord {
                    created_at: parse_timestamp(issue.created_at.as_deref())?,
                    closed_at: parse_timestamp(issue.closed_at.as_deref()),
                    labels: issue.labels.into_iter().map(|l| l.name).collect(),
                    title: issue.title,
                    body: issue.body.unwrap_or_default(),
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config() -> AppConfig {
        AppConfig {
            github_token: None,
            max_github_api_pages: 3,
            cache_ttl_seconds: 60,
            cache_max_capacity: 10,
            popular_repos: vec![],
            popular_repos_concurrency_limit: 1,
            tag_commit_concurrency: 2,
            bug_label: "bug".to_string(),
        }
    }

    fn repo() -> RepositoryRef {
        RepositoryRef {
            owner: "octo".to_string(),
            repo: "widgets".to_string(),
        }
    }

    async fn client_for(server: &MockServer) -> GitHubClient {
        let octocrab = Octocrab::builder()
            .base_uri(server.uri())
            .expect("valid base uri")
            .build()
            .expect("octocrab client");
        GitHubClient::with_octocrab(octocrab, &test_config())
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(
            parse_timestamp(Some("2024-01-02T03:04:05Z")),
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap())
        );
        assert_eq!(
            parse_timestamp(Some("2024-01-02T05:04:05+02:00")),
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap())
        );
        assert_eq!(parse_timestamp(Some("yesterday")), None);
        assert_eq!(parse_timestamp(None), None);
    }

    #[test]
    fn test_repo_route_strips_traversal() {
        let sneaky = RepositoryRef {
            owner: "..".to_string(),
            repo: " widgets ".to_string(),
        };
        assert_eq!(GitHubClient::repo_route(&sneaky, "tags"), "/repos//widgets/tags");
    }

    #[tokio::test]
    async fn test_list_releases_maps_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/widgets/releases"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "tag_name": "v1.0.0",
                    "name": "First",
                    "created_at": "2024-03-01T10:00:00Z",
                    "draft": false,
                    "prerelease": true
                },
                { "tag_name": "v0.9.0", "name": null, "created_at": "garbage" }
            ])))
            .mount(&server)
            .await;

        let releases = client_for(&server).await.list_releases(&repo()).await.unwrap();

        assert_eq!(releases.len(), 2);
        assert_eq!(releases[0].tag_name, "v1.0.0");
        assert!(releases[0].prerelease);
        assert_eq!(
            releases[0].created_at,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap())
        );
        assert_eq!(releases[1].created_at, None);
    }

    #[tokio::test]
    async fn test_list_tags_resolves_commit_dates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/widgets/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "name": "v2", "commit": { "sha": "aaa" } },
                { "name": "v1", "commit": { "sha": "missing" } }
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/widgets/commits/aaa"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sha": "aaa",
                "commit": {
                    "message": "Release v2",
                    "author": { "name": "octo", "date": "2024-03-05T00:00:00Z" }
                }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/widgets/commits/missing"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(json!({ "message": "Not Found", "documentation_url": "" })),
            )
            .mount(&server)
            .await;

        let tags = client_for(&server).await.list_tags(&repo()).await.unwrap();

        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].name, "v2");
        assert_eq!(
            tags[0].commit_date,
            Some(Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap())
        );
        assert_eq!(tags[1].commit_date, None);
    }

    #[tokio::test]
    async fn test_list_tags_fails_when_commit_lookup_is_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/widgets/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "name": "v2", "commit": { "sha": "aaa" } }
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/widgets/commits/aaa"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "message": "API rate limit exceeded for 127.0.0.1.",
                "documentation_url": ""
            })))
            .mount(&server)
            .await;

        let result = client_for(&server).await.list_tags(&repo()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_list_bug_issues_filters_pull_requests() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/widgets/issues"))
            .and(query_param("state", "closed"))
            .and(query_param("labels", "bug"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "created_at": "2024-03-01T00:00:00Z",
                    "closed_at": "2024-03-03T00:00:00Z",
                    "labels": [{ "name": "bug" }],
                    "title": "Crash",
                    "body": null
                },
                {
                    "created_at": "2024-03-01T00:00:00Z",
                    "closed_at": "2024-03-02T00:00:00Z",
                    "labels": [],
                    "title": "Fix crash",
                    "body": "",
                    "pull_request": { "url": "https://api.github.com/repos/octo/widgets/pulls/7" }
                }
            ])))
            .mount(&server)
            .await;

        let issues = client_for(&server).await.list_bug_issues(&repo()).await.unwrap();

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].labels, vec!["bug".to_string()]);
        assert_eq!(issues[0].body, "");
    }

    #[tokio::test]
    async fn test_list_pull_requests_follows_pages() {
        let server = MockServer::start().await;
        let full_page: Vec<_> = (0..PER_PAGE)
            .map(|_| json!({ "created_at": "2024-03-01T00:00:00Z", "merged_at": null }))
            .collect();
        Mock::given(method("GET"))
            .and(path("/repos/octo/widgets/pulls"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(full_page)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/widgets/pulls"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "created_at": "2024-03-01T00:00:00Z", "merged_at": "2024-03-02T00:00:00Z" }
            ])))
            .mount(&server)
            .await;

        let prs = client_for(&server)
            .await
            .list_pull_requests(&repo())
            .await
            .unwrap();

        assert_eq!(prs.len(), PER_PAGE as usize + 1);
        assert!(prs.last().unwrap().merged_at.is_some());
    }

    #[tokio::test]
    async fn test_upstream_error_is_propagated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/widgets/commits"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "message": "Server Error",
                "documentation_url": ""
            })))
            .mount(&server)
            .await;

        let result = client_for(&server).await.list_commits(&repo()).await;
        assert!(result.is_err());
    }
}
