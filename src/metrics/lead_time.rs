use super::{days_between, DayStats};
use crate::types::{CommitRecord, PullRequestRecord};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

pub const NO_PULL_REQUESTS: &str = "No pull requests found";
pub const NO_VALID_LEAD_TIMES: &str = "No valid lead times found";

/// Lead time for changes.
///
/// `CommitIntervals` is only produced when no pull request yields a sample; it measures the
/// gaps between consecutive commits and is tagged with its own `method` on the wire so it is
/// never mistaken for a pull-request figure.
#[derive(Debug, Clone, PartialEq)]
pub enum LeadTime {
    Unavailable(&'static str),
    PullRequests {
        stats: DayStats,
        total_prs_analyzed: usize,
    },
    CommitIntervals {
        stats: DayStats,
        total_intervals_analyzed: usize,
    },
}

impl Serialize for LeadTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            LeadTime::Unavailable(reason) => serializer.serialize_str(reason),
            LeadTime::PullRequests {
                stats,
                total_prs_analyzed,
            } => {
                let mut map = serializer.serialize_map(Some(5))?;
                stats.serialize_entries(&mut map)?;
                map.serialize_entry("total_prs_analyzed", total_prs_analyzed)?;
                map.serialize_entry("method", "pull_requests")?;
                map.end()
            }
            LeadTime::CommitIntervals {
                stats,
                total_intervals_analyzed,
            } => {
                let mut map = serializer.serialize_map(Some(5))?;
                stats.serialize_entries(&mut map)?;
                map.serialize_entry("total_intervals_analyzed", total_intervals_analyzed)?;
                map.serialize_entry("method", "commit_intervals")?;
                map.end()
            }
        }
    }
}

pub fn lead_time(pull_requests: &[PullRequestRecord], commits: &[CommitRecord]) -> LeadTime {
    let samples: Vec<f64> = pull_requests
        .iter()
        .filter_map(|pr| {
            let merged_at = pr.merged_at?;
            // merged before created is corrupt data, not a zero lead time
            (merged_at >= pr.created_at).then(|| days_between(pr.created_at, merged_at))
        })
        .collect();

    if let Some(stats) = DayStats::from_samples(&samples) {
        return LeadTime::PullRequests {
            stats,
            total_prs_analyzed: samples.len(),
        };
    }

    if let Some(fallback) = commit_interval_lead_time(commits) {
        return fallback;
    }

    if pull_requests.is_empty() {
        LeadTime::Unavailable(NO_PULL_REQUESTS)
    } else {
        LeadTime::Unavailable(NO_VALID_LEAD_TIMES)
    }
}

fn commit_interval_lead_time(commits: &[CommitRecord]) -> Option<LeadTime> {
    let mut dates: Vec<_> = commits.iter().filter_map(|c| c.author_date).collect();
    dates.sort();

    let intervals: Vec<f64> = dates
        .windows(2)
        .map(|pair| days_between(pair[0], pair[1]))
        .collect();

    DayStats::from_samples(&intervals).map(|stats| LeadTime::CommitIntervals {
        stats,
        total_intervals_analyzed: intervals.len(),
    })
}
