use crate::types::{CommitRecord, DeploymentEvent, IssueRecord, PullRequestRecord};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// The trailing windows every report is computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Window {
    #[serde(rename = "7d")]
    SevenDays,
    #[serde(rename = "30d")]
    ThirtyDays,
    #[serde(rename = "90d")]
    NinetyDays,
}

impl Window {
    pub const ALL: [Window; 3] = [Window::SevenDays, Window::ThirtyDays, Window::NinetyDays];

    pub fn days(self) -> i64 {
        match self {
            Window::SevenDays => 7,
            Window::ThirtyDays => 30,
            Window::NinetyDays => 90,
        }
    }
}

/// A record that can be placed on the timeline.
pub trait Timestamped {
    /// The instant used for window membership, `None` if unknown.
    fn timestamp(&self) -> Option<DateTime<Utc>>;
}

impl Timestamped for DeploymentEvent {
    fn timestamp(&self) -> Option<DateTime<Utc>> {
        Some(self.timestamp)
    }
}

impl Timestamped for PullRequestRecord {
    fn timestamp(&self) -> Option<DateTime<Utc>> {
        Some(self.created_at)
    }
}

impl Timestamped for IssueRecord {
    fn timestamp(&self) -> Option<DateTime<Utc>> {
        Some(self.created_at)
    }
}

impl Timestamped for CommitRecord {
    fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.author_date
    }
}

/// Keeps the records whose timestamp lies in `[reference_time - window_days, reference_time]`.
///
/// Records without a timestamp are dropped.
pub fn filter_by_window<T>(records: &[T], reference_time: DateTime<Utc>, window_days: i64) -> Vec<T>
where
    T: Timestamped + Clone,
{
    let window_start = reference_time - Duration::days(window_days);

    records
        .iter()
        .filter(|r| {
            r.timestamp()
                .is_some_and(|t| t >= window_start && t <= reference_time)
        })
        .cloned()
        .collect()
}
