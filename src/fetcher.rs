use crate::github::ActivitySource;
use crate::metrics::{self, ChangeFailureRate, DeploymentFrequency, LeadTime, Mttr};
use crate::repo_url::{self, RepoUrlError, RepositoryRef};
use crate::types::{self, DeploymentEvent, RepoActivity};
use crate::window::{filter_by_window, Window};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BundleRepository {
    pub owner: String,
    pub name: String,
}

impl From<&RepositoryRef> for BundleRepository {
    fn from(repo: &RepositoryRef) -> Self {
        Self {
            owner: repo.owner.clone(),
            name: repo.repo.clone(),
        }
    }
}

/// The four DORA metrics for one repository over one window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowBundle {
    pub repository: BundleRepository,
    pub deployment_frequency: DeploymentFrequency,
    pub lead_time: LeadTime,
    pub mttr: Mttr,
    pub change_failure_rate: ChangeFailureRate,
}

/// DORA metrics for every window. A `None` window means the raw data could not be fetched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DoraReport {
    #[serde(rename = "7d")]
    pub seven_days: Option<WindowBundle>,
    #[serde(rename = "30d")]
    pub thirty_days: Option<WindowBundle>,
    #[serde(rename = "90d")]
    pub ninety_days: Option<WindowBundle>,
}

impl DoraReport {
    /// The report produced when the upstream fetch fails: every window is `None`.
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn window(&self, window: Window) -> Option<&WindowBundle> {
        match window {
            Window::SevenDays => self.seven_days.as_ref(),
            Window::ThirtyDays => self.thirty_days.as_ref(),
            Window::NinetyDays => self.ninety_days.as_ref(),
        }
    }

    fn set_window(&mut self, window: Window, bundle: WindowBundle) {
        let slot = match window {
            Window::SevenDays => &mut self.seven_days,
            Window::ThirtyDays => &mut self.thirty_days,
            Window::NinetyDays => &mut self.ninety_days,
        };
        *slot = Some(bundle);
    }

    pub fn has_data(&self) -> bool {
        Window::ALL.iter().any(|w| self.window(*w).is_some())
    }
}

/// Fetches every raw list for a repository once, concurrently. Fails if any single fetch fails.
pub async fn fetch_activity<S>(source: &S, repo: &RepositoryRef) -> Result<RepoActivity>
where
    S: ActivitySource + ?Sized,
{
    let (releases, tags, commits, pull_requests, bug_issues) = futures::try_join!(
        source.list_releases(repo),
        source.list_tags(repo),
        source.list_commits(repo),
        source.list_pull_requests(repo),
        source.list_bug_issues(repo),
    )?;

    tracing::debug!(
        repo = %repo,
        releases = releases.len(),
        tags = tags.len(),
        commits = commits.len(),
        pull_requests = pull_requests.len(),
        bug_issues = bug_issues.len(),
        "Fetched repository activity"
    );

    Ok(RepoActivity {
        releases,
        tags,
        commits,
        pull_requests,
        bug_issues,
    })
}

/// Computes the four metrics over a single window.
pub fn compute_window(
    repo: &RepositoryRef,
    activity: &RepoActivity,
    deployments: &[DeploymentEvent],
    reference_time: DateTime<Utc>,
    window: Window,
) -> WindowBundle {
    let days = window.days();
    let deployments = filter_by_window(deployments, reference_time, days);
    let pull_requests = filter_by_window(&activity.pull_requests, reference_time, days);
    let commits = filter_by_window(&activity.commits, reference_time, days);
    let bug_issues = filter_by_window(&activity.bug_issues, reference_time, days);

    WindowBundle {
        repository: BundleRepository::from(repo),
        deployment_frequency: metrics::deployment_frequency(&deployments),
        lead_time: metrics::lead_time(&pull_requests, &commits),
        mttr: metrics::mttr(&bug_issues),
        change_failure_rate: metrics::change_failure_rate(&deployments, &bug_issues),
    }
}

/// Computes every window from one fetch against one shared reference time.
pub fn compute_report(
    repo: &RepositoryRef,
    activity: &RepoActivity,
    reference_time: DateTime<Utc>,
) -> DoraReport {
    let deployments = types::deployment_events(&activity.releases, &activity.tags);

    let mut report = DoraReport::default();
    for window in Window::ALL {
        let bundle = compute_window(repo, activity, &deployments, reference_time, window);
        report.set_window(window, bundle);
    }
    report
}

/// Fetches and computes the report for an already resolved repository.
///
/// Never fails: an upstream error yields `DoraReport::unavailable()`.
pub async fn report_for_repository<S>(
    source: &S,
    repo: &RepositoryRef,
    reference_time: DateTime<Utc>,
) -> DoraReport
where
    S: ActivitySource + ?Sized,
{
    match fetch_activity(source, repo).await {
        Ok(activity) => compute_report(repo, &activity, reference_time),
        Err(e) => {
            tracing::warn!(repo = %repo, "Failed to fetch repository activity: {:#}", e);
            DoraReport::unavailable()
        }
    }
}

/// Resolves `repository_url` and computes its DORA report.
///
/// Only URL errors are returned as `Err`; once the URL parses, the call always yields a report.
pub async fn get_dora_metrics<S>(
    source: &S,
    repository_url: &str,
    reference_time: DateTime<Utc>,
) -> Result<DoraReport, RepoUrlError>
where
    S: ActivitySource + ?Sized,
{
    let repo = repo_url::parse(repository_url)?;
    Ok(report_for_repository(source, &repo, reference_time).await)
}
