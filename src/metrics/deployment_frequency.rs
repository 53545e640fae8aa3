use super::{days_between, two_places};
use crate::types::DeploymentEvent;
use serde::{Serialize, Serializer};

pub const NO_DEPLOYMENTS: &str = "No deployments found";
pub const SINGLE_DEPLOYMENT: &str = "N/A (single deployment)";
pub const SAME_DAY_DEPLOYMENTS: &str = "N/A (all deployments within one day)";

/// Deployments per day, or the reason a rate cannot be given.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rate {
    PerDay(f64),
    NotApplicable(&'static str),
}

impl Serialize for Rate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Rate::PerDay(value) => two_places(value, serializer),
            Rate::NotApplicable(reason) => serializer.serialize_str(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DeploymentFrequency {
    Unavailable(&'static str),
    Computed {
        total_deployments: usize,
        time_span_days: i64,
        frequency_per_day: Rate,
    },
}

pub fn deployment_frequency(events: &[DeploymentEvent]) -> DeploymentFrequency {
    let total_deployments = events.len();

    let (Some(first), Some(last)) = (
        events.iter().map(|e| e.timestamp).min(),
        events.iter().map(|e| e.timestamp).max(),
    ) else {
        return DeploymentFrequency::Unavailable(NO_DEPLOYMENTS);
    };

    if total_deployments == 1 {
        return DeploymentFrequency::Computed {
            total_deployments,
            time_span_days: 0,
            frequency_per_day: Rate::NotApplicable(SINGLE_DEPLOYMENT),
        };
    }

    let time_span_days = days_between(first, last).round() as i64;
    // Spans that round to zero days have no meaningful per-day rate.
    let frequency_per_day = if time_span_days == 0 {
        Rate::NotApplicable(SAME_DAY_DEPLOYMENTS)
    } else {
        Rate::PerDay(total_deployments as f64 / time_span_days as f64)
    };

    DeploymentFrequency::Computed {
        total_deployments,
        time_span_days,
        frequency_per_day,
    }
}
