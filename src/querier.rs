//! Service layer for querying and caching DORA reports.
//!
//! This module implements `DoraQuerier`, which acts as the main entry point for retrieving
//! reports. It handles:
//! 1. Resolving repository URLs into `owner/repo` pairs.
//! 2. Checking the in-memory cache for an existing report.
//! 3. Fetching raw activity from GitHub and computing the per-window metrics on a miss.
//! 4. Proactively refreshing popular repositories in the background.

use crate::config::AppConfig;
use crate::fetcher::{self, DoraReport};
use crate::github::ActivitySource;
use crate::repo_url::{self, RepoUrlError, RepositoryRef};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration as StdDuration;

#[derive(Clone)]
pub struct DoraQuerier {
    cache: Cache<RepositoryRef, DoraReport>,
    source: Arc<dyn ActivitySource>,
    config: AppConfig,
}

impl DoraQuerier {
    /// Initializes a new DoraQuerier.
    ///
    /// This sets up the in-memory cache and starts the background refresh task for popular
    /// repositories, so it must be called from within a Tokio runtime.
    pub fn new(config: &AppConfig, source: Arc<dyn ActivitySource>) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.cache_max_capacity)
            .time_to_live(config.cache_ttl())
            .build();

        let querier = Self {
            cache,
            source,
            config: config.clone(),
        };

        if !querier.config.popular_repos.is_empty() {
            querier.start_background_refresh();
        }

        querier
    }

    /// Resolves a GitHub URL and returns its report. Only URL errors are surfaced.
    pub async fn get_by_url(&self, repository_url: &str) -> Result<DoraReport, RepoUrlError> {
        let repo = repo_url::parse(repository_url)?;
        Ok(self.get(repo).await)
    }

    /// Retrieves the report for a repository, computing it if not cached (read-through).
    pub async fn get(&self, repo: RepositoryRef) -> DoraReport {
        if let Some(report) = self.cache.get(&repo).await {
            tracing::debug!(repo = %repo, "Cache hit");
            return report;
        }

        let report = self.compute(&repo).await;
        self.store(repo, &report).await;
        report
    }

    /// Starts a background task that periodically refreshes reports for popular repositories.
    fn start_background_refresh(&self) {
        let querier = self.clone();
        let config = self.config.clone();

        tokio::spawn(async move {
            tracing::info!("Starting background refresh task for popular repositories");
            // Refresh popular repos at half their TTL to ensure they are always fresh/warm.
            let period = StdDuration::from_secs((config.cache_ttl_seconds / 2).max(1));
            let mut interval = tokio::time::interval(period);

            loop {
                interval.tick().await;
                tracing::info!("Refreshing popular repositories...");

                stream::iter(&config.popular_repos)
                    .for_each_concurrent(Some(config.popular_repos_concurrency_limit), |repo| {
                        querier.refresh_repo(repo)
                    })
                    .await;

                tracing::info!("Finished refreshing popular repositories");
            }
        });
    }

    /// Recomputes the report for a single repository and updates the cache.
    async fn refresh_repo(&self, repo: &RepositoryRef) {
        let report = self.compute(repo).await;
        if self.store(repo.clone(), &report).await {
            tracing::info!(repo = %repo, "Refreshed DORA report");
        } else {
            tracing::error!(repo = %repo, "Failed to refresh popular repo");
        }
    }

    async fn compute(&self, repo: &RepositoryRef) -> DoraReport {
        // One reference time for all three windows.
        let reference_time = Utc::now();
        fetcher::report_for_repository(self.source.as_ref(), repo, reference_time).await
    }

    /// Caches a report unless every window is empty; returns whether it was stored.
    async fn store(&self, repo: RepositoryRef, report: &DoraReport) -> bool {
        if !report.has_data() {
            return false;
        }
        self.cache.insert(repo, report.clone()).await;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CommitRecord, IssueRecord, PullRequestRecord, ReleaseRecord, TagRecord};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Counts release fetches; optionally fails them.
    #[derive(Default)]
    struct CountingSource {
        calls: AtomicUsize,
        fail: AtomicBool,
    }

    #[async_trait]
    impl ActivitySource for CountingSource {
        async fn list_releases(&self, _repo: &RepositoryRef) -> anyhow::Result<Vec<ReleaseRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                anyhow::bail!("GitHub is down");
            }
            Ok(vec![])
        }

        async fn list_tags(&self, _repo: &RepositoryRef) -> anyhow::Result<Vec<TagRecord>> {
            Ok(vec![])
        }

        async fn list_commits(&self, _repo: &RepositoryRef) -> anyhow::Result<Vec<CommitRecord>> {
            Ok(vec![])
        }

        async fn list_pull_requests(
            &self,
            _repo: &RepositoryRef,
        ) -> anyhow::Result<Vec<PullRequestRecord>> {
            Ok(vec![])
        }

        async fn list_bug_issues(&self, _repo: &RepositoryRef) -> anyhow::Result<Vec<IssueRecord>> {
            Ok(vec![])
        }
    }

    fn config() -> AppConfig {
        AppConfig {
            github_token: None,
            max_github_api_pages: 1,
            cache_ttl_seconds: 60,
            cache_max_capacity: 10,
            popular_repos: vec![],
            popular_repos_concurrency_limit: 1,
            tag_commit_concurrency: 1,
            bug_label: "bug".to_string(),
        }
    }

    #[tokio::test]
    async fn test_reports_are_cached() {
        let source = Arc::new(CountingSource::default());
        let querier = DoraQuerier::new(&config(), source.clone());

        let first = querier
            .get_by_url("https://github.com/octo/widgets")
            .await
            .unwrap();
        let second = querier
            .get_by_url("https://github.com/octo/widgets.git")
            .await
            .unwrap();

        assert!(first.has_data());
        assert_eq!(first, second);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_reports_are_not_cached() {
        let source = Arc::new(CountingSource::default());
        source.fail.store(true, Ordering::SeqCst);
        let querier = DoraQuerier::new(&config(), source.clone());
        let repo = RepositoryRef {
            owner: "octo".to_string(),
            repo: "widgets".to_string(),
        };

        assert_eq!(querier.get(repo.clone()).await, DoraReport::unavailable());

        source.fail.store(false, Ordering::SeqCst);
        assert!(querier.get(repo).await.has_data());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalid_url_is_rejected_before_fetching() {
        let source = Arc::new(CountingSource::default());
        let querier = DoraQuerier::new(&config(), source.clone());

        let err = querier
            .get_by_url("https://gitlab.com/octo/widgets")
            .await
            .unwrap_err();

        assert!(matches!(err, RepoUrlError::InvalidHost(_)));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }
}
