use super::{days_between, DayStats};
use crate::types::IssueRecord;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

pub const NO_BUG_ISSUES: &str = "No bug issues found";
pub const NO_VALID_RESOLUTION_TIMES: &str = "No valid resolution times found";

/// Mean time to restore, measured from bug issue creation to close.
#[derive(Debug, Clone, PartialEq)]
pub enum Mttr {
    Unavailable(&'static str),
    Computed {
        stats: DayStats,
        total_bugs_analyzed: usize,
    },
}

impl Serialize for Mttr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Mttr::Unavailable(reason) => serializer.serialize_str(reason),
            Mttr::Computed {
                stats,
                total_bugs_analyzed,
            } => {
                let mut map = serializer.serialize_map(Some(4))?;
                stats.serialize_entries(&mut map)?;
                map.serialize_entry("total_bugs_analyzed", total_bugs_analyzed)?;
                map.end()
            }
        }
    }
}

pub fn mttr(bug_issues: &[IssueRecord]) -> Mttr {
    if bug_issues.is_empty() {
        return Mttr::Unavailable(NO_BUG_ISSUES);
    }

    let samples: Vec<f64> = bug_issues
        .iter()
        .filter_map(|issue| {
            let closed_at = issue.closed_at?;
            (closed_at >= issue.created_at).then(|| days_between(issue.created_at, closed_at))
        })
        .collect();

    match DayStats::from_samples(&samples) {
        Some(stats) => Mttr::Computed {
            stats,
            total_bugs_analyzed: samples.len(),
        },
        None => Mttr::Unavailable(NO_VALID_RESOLUTION_TIMES),
    }
}
