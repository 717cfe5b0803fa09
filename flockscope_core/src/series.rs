//! Named, time-aligned metric series.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const CONNECTIVITY: &str = "C";
pub const COHESION_RADIUS: &str = "R";
pub const DEVIATION_ENERGY: &str = "E";
pub const VELOCITY_MISMATCH: &str = "K";

pub const PAIR_CLEARANCE: &str = "pair_clearance";
pub const PAIR_VIOLATIONS: &str = "pair_violations";
pub const OBSTACLE_CLEARANCE: &str = "obstacle_clearance";
pub const OBSTACLE_VIOLATIONS: &str = "obstacle_violations";

pub const CONTROL_CORRECTION: &str = "U_corr";
pub const SLACK_MAX: &str = "slack_max";
pub const ACTIVE_RATIO: &str = "active_ratio";

/// Mapping from metric name to one value per frame.
///
/// An empty set means "not applicable" (e.g. safety on a single agent).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricSet {
    series: BTreeMap<String, Vec<f64>>,
}

impl MetricSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.series.insert(name.into(), values);
    }

    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.series.get(name).map(|v| v.as_slice())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.series.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.series.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Moves every series of `other` into `self`, replacing same-named ones.
    pub fn merge(&mut self, other: MetricSet) {
        self.series.extend(other.series);
    }
}
