//! Threshold resolution.
//!
//! Each threshold is resolved from, in order:
//! 1. an explicit caller value
//! 2. the recording's algorithm parameters
//! 3. the per-algorithm fallback table
//! 4. the generic fallback
//!
//! Unusable candidates (non-finite or `<= 0`) are treated as absent and the
//! chain moves on.

use crate::error::{FlockError, Result, Warning};
use crate::recording::RecordMeta;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

pub const ALGO_FLOCKING: &str = "flocking";
pub const ALGO_FLOCKING_ALPHA: &str = "flocking-alpha";
pub const ALGO_SAFE_FLOCKING_ALPHA: &str = "safe-flocking-alpha";
pub const ALGO_FORMATION_ECBF: &str = "formation-ecbf";

/// Canonical form of an algorithm identifier (trimmed, lower-cased).
pub fn normalize_algorithm_id(id: &str) -> String {
    id.trim().to_lowercase()
}

/// The thresholds the metrics need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Threshold {
    NeighborRadius,
    DesiredDistance,
    SafeDistance,
}

impl Threshold {
    pub fn name(&self) -> &'static str {
        match self {
            Threshold::NeighborRadius => "neighbor_radius",
            Threshold::DesiredDistance => "desired_distance",
            Threshold::SafeDistance => "safe_distance",
        }
    }

    /// Algorithm-parameter keys consulted, most specific first.
    pub fn metadata_keys(&self) -> &'static [&'static str] {
        match self {
            Threshold::NeighborRadius => &["neighbor_radius"],
            Threshold::DesiredDistance => {
                &["desired_distance", "separation_radius", "neighbor_radius"]
            }
            Threshold::SafeDistance => &["agent_safe_distance", "safe_distance"],
        }
    }
}

/// One row of fallback constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FallbackTable {
    pub neighbor_radius: f64,
    pub desired_distance: f64,
    pub safe_distance: f64,
}

impl FallbackTable {
    pub fn get(&self, threshold: Threshold) -> f64 {
        match threshold {
            Threshold::NeighborRadius => self.neighbor_radius,
            Threshold::DesiredDistance => self.desired_distance,
            Threshold::SafeDistance => self.safe_distance,
        }
    }
}

/// Immutable fallback configuration handed to the resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamTables {
    /// Keyed by algorithm identifier
    pub algorithms: BTreeMap<String, FallbackTable>,
    /// Used when the algorithm is unknown
    pub generic: FallbackTable,
}

impl Default for ParamTables {
    fn default() -> Self {
        let mut algorithms = BTreeMap::new();
        algorithms.insert(
            ALGO_FLOCKING.to_string(),
            FallbackTable {
                neighbor_radius: 2.6,
                desired_distance: 0.9, // separation radius
                safe_distance: 0.9,
            },
        );
        algorithms.insert(
            ALGO_FLOCKING_ALPHA.to_string(),
            FallbackTable {
                neighbor_radius: 2.6,
                desired_distance: 1.4,
                safe_distance: 0.9,
            },
        );
        Self {
            algorithms,
            generic: FallbackTable {
                neighbor_radius: 2.6,
                desired_distance: 1.4,
                safe_distance: 0.9,
            },
        }
    }
}

impl ParamTables {
    /// Parses a JSON table; missing sections keep their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let mut tables: Self = serde_json::from_str(text)
            .map_err(|e| FlockError::malformed(format!("fallback table: {}", e)))?;
        tables.algorithms = std::mem::take(&mut tables.algorithms)
            .into_iter()
            .map(|(id, table)| (normalize_algorithm_id(&id), table))
            .collect();
        Ok(tables)
    }
}

/// Where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamSource {
    Explicit,
    Metadata(String),
    AlgorithmTable(String),
    Generic,
}

impl fmt::Display for ParamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamSource::Explicit => write!(f, "command line"),
            ParamSource::Metadata(key) => write!(f, "recording metadata '{}'", key),
            ParamSource::AlgorithmTable(id) => write!(f, "'{}' defaults", id),
            ParamSource::Generic => write!(f, "generic defaults"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub value: f64,
    pub source: ParamSource,
}

/// Caller-supplied overrides; `None` means "not given".
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Overrides {
    pub neighbor_radius: Option<f64>,
    pub desired_distance: Option<f64>,
    pub safe_distance: Option<f64>,
}

impl Overrides {
    fn get(&self, threshold: Threshold) -> Option<f64> {
        match threshold {
            Threshold::NeighborRadius => self.neighbor_radius,
            Threshold::DesiredDistance => self.desired_distance,
            Threshold::SafeDistance => self.safe_distance,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedParams {
    pub neighbor_radius: Resolved,
    pub desired_distance: Resolved,
    pub safe_distance: Resolved,
    pub warnings: Vec<Warning>,
}

/// `Some(v)` only for finite, strictly positive values.
pub fn positive_finite(value: f64) -> Option<f64> {
    (value.is_finite() && value > 0.0).then_some(value)
}

pub struct ParamResolver<'a> {
    tables: &'a ParamTables,
}

impl<'a> ParamResolver<'a> {
    pub fn new(tables: &'a ParamTables) -> Self {
        Self { tables }
    }

    /// Resolves one threshold, appending any warnings raised on the way.
    pub fn resolve(
        &self,
        threshold: Threshold,
        explicit: Option<f64>,
        meta: &RecordMeta,
        warnings: &mut Vec<Warning>,
    ) -> Result<Resolved> {
        let name = threshold.name();

        if let Some(value) = explicit {
            match positive_finite(value) {
                Some(value) => {
                    return Ok(Resolved {
                        value,
                        source: ParamSource::Explicit,
                    })
                }
                None => warnings.push(Warning::DiscardedOverride { name, value }.emit()),
            }
        }

        for key in threshold.metadata_keys() {
            let Some(&value) = meta.algorithm_params.get(*key) else {
                continue;
            };
            match positive_finite(value) {
                Some(value) => {
                    debug!("{} = {} from metadata key '{}'", name, value, key);
                    return Ok(Resolved {
                        value,
                        source: ParamSource::Metadata(key.to_string()),
                    });
                }
                None => warnings.push(
                    Warning::DiscardedMetadataParam {
                        key: key.to_string(),
                        value,
                    }
                    .emit(),
                ),
            }
        }

        let algorithm = normalize_algorithm_id(&meta.algorithm_id);
        if let Some(table) = self.tables.algorithms.get(&algorithm) {
            let value = table.get(threshold);
            let source = ParamSource::AlgorithmTable(algorithm);
            match positive_finite(value) {
                Some(value) => {
                    warnings.push(
                        Warning::FallbackUsed {
                            name,
                            value,
                            source: source.to_string(),
                        }
                        .emit(),
                    );
                    return Ok(Resolved { value, source });
                }
                None => warnings.push(
                    Warning::DiscardedTableValue {
                        name,
                        value,
                        source: source.to_string(),
                    }
                    .emit(),
                ),
            }
        }

        let value = self.tables.generic.get(threshold);
        if positive_finite(value).is_none() {
            return Err(FlockError::InvalidParameter { name, value });
        }
        warnings.push(
            Warning::FallbackUsed {
                name,
                value,
                source: ParamSource::Generic.to_string(),
            }
            .emit(),
        );
        Ok(Resolved {
            value,
            source: ParamSource::Generic,
        })
    }

    /// Resolves all three thresholds for one recording.
    pub fn resolve_all(&self, overrides: &Overrides, meta: &RecordMeta) -> Result<ResolvedParams> {
        let mut warnings = Vec::new();
        let mut resolve = |t: Threshold| self.resolve(t, overrides.get(t), meta, &mut warnings);
        let neighbor_radius = resolve(Threshold::NeighborRadius)?;
        let desired_distance = resolve(Threshold::DesiredDistance)?;
        let safe_distance = resolve(Threshold::SafeDistance)?;
        Ok(ResolvedParams {
            neighbor_radius,
            desired_distance,
            safe_distance,
            warnings,
        })
    }
}
