use crate::types::{DeploymentEvent, IssueRecord};
use chrono::Duration;
use serde::{Serialize, Serializer};

pub const NO_RELEASES: &str = "No releases found";

/// How close (either direction, inclusive) a fix must be to a deployment to be blamed on it.
pub const PROXIMITY_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChangeFailureRate {
    Unavailable(&'static str),
    Computed {
        total_releases: usize,
        /// Deployments with at least one fix nearby, not a count of bugs.
        releases_with_bugs: usize,
        /// Percentage in `[0, 100]`.
        #[serde(serialize_with = "percent")]
        failure_rate: f64,
    },
}

fn percent<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{value:.2}%"))
}

/// Fraction of deployments with a closed bug issue within `PROXIMITY_DAYS` of them.
///
/// `bug_issues` are already selected by the bug label; each one with a close date is a fix.
pub fn change_failure_rate(
    deployments: &[DeploymentEvent],
    bug_issues: &[IssueRecord],
) -> ChangeFailureRate {
    if deployments.is_empty() {
        return ChangeFailureRate::Unavailable(NO_RELEASES);
    }

    let proximity = Duration::days(PROXIMITY_DAYS);
    let fix_times: Vec<_> = bug_issues.iter().filter_map(|issue| issue.closed_at).collect();

    let releases_with_bugs = deployments
        .iter()
        .filter(|deployment| {
            fix_times
                .iter()
                .any(|closed_at| (*closed_at - deployment.timestamp).abs() <= proximity)
        })
        .count();

    let total_releases = deployments.len();
    ChangeFailureRate::Computed {
        total_releases,
        releases_with_bugs,
        failure_rate: releases_with_bugs as f64 / total_releases as f64 * 100.0,
    }
}
