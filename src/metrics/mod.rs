//! The four DORA calculators.
//!
//! Every calculator is a pure function over already window-filtered records. A calculator never
//! fails: when the data it needs is absent it returns an `Unavailable` variant carrying a
//! human-readable sentinel, so a repository without releases or bugs reads as "no data" rather
//! than as broken. On the wire, durations are rendered as strings with two decimal places.

pub mod change_failure;
pub mod deployment_frequency;
pub mod lead_time;
pub mod mttr;

pub use change_failure::{change_failure_rate, ChangeFailureRate};
pub use deployment_frequency::{deployment_frequency, DeploymentFrequency, Rate};
pub use lead_time::{lead_time, LeadTime};
pub use mttr::{mttr, Mttr};

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::Serializer;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Fractional days from `start` to `end`; negative if `end` precedes `start`.
pub(crate) fn days_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / MILLIS_PER_DAY
}

pub(crate) fn two_places<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{value:.2}"))
}

/// Average, minimum and maximum of a set of day-valued samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DayStats {
    pub average_days: f64,
    pub min_days: f64,
    pub max_days: f64,
}

impl DayStats {
    /// Returns `None` for an empty sample set.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let sum: f64 = samples.iter().sum();
        let min_days = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max_days = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Some(Self {
            average_days: sum / samples.len() as f64,
            min_days,
            max_days,
        })
    }

    pub(crate) fn serialize_entries<M: SerializeMap>(&self, map: &mut M) -> Result<(), M::Error> {
        map.serialize_entry("average_days", &format!("{:.2}", self.average_days))?;
        map.serialize_entry("min_days", &format!("{:.2}", self.min_days))?;
        map.serialize_entry("max_days", &format!("{:.2}", self.max_days))
    }
}
