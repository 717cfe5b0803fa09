//! JSON exporter for analysis results.
//!
//! Writes everything `metrics` computes as one document, so series can be
//! plotted by external tools.

use flockscope_core::analysis::Analysis;
use flockscope_core::params::Resolved;
use flockscope_core::report::RecordingSummary;
use flockscope_core::{MetricSet, ObstacleScenario};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// One resolved threshold and where it came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportParam {
    pub value: f64,
    pub source: String,
}

impl From<&Resolved> for ExportParam {
    fn from(r: &Resolved) -> Self {
        Self {
            value: r.value,
            source: r.source.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportParams {
    pub neighbor_radius: ExportParam,
    pub desired_distance: ExportParam,
    pub safe_distance: ExportParam,
}

/// Complete analysis export.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsExport {
    /// File-level metadata
    pub summary: RecordingSummary,

    /// Thresholds used
    pub params: ExportParams,

    /// Obstacle scenario keyword
    pub scenario: String,

    /// Number of obstacles measured against
    pub obstacle_count: usize,

    /// 2 or 3
    pub dim: usize,

    /// Shared time axis in seconds
    pub time: Vec<f64>,

    /// Series keyed by metric name
    pub series: MetricSet,

    /// Non-fatal conditions, as displayed
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl MetricsExport {
    /// Creates an export from a finished analysis.
    pub fn new(summary: RecordingSummary, analysis: &Analysis, scenario: ObstacleScenario) -> Self {
        Self {
            summary,
            params: ExportParams {
                neighbor_radius: (&analysis.params.neighbor_radius).into(),
                desired_distance: (&analysis.params.desired_distance).into(),
                safe_distance: (&analysis.params.safe_distance).into(),
            },
            scenario: scenario.name().to_string(),
            obstacle_count: analysis.obstacle_count,
            dim: analysis.dim,
            time: analysis.time.clone(),
            series: analysis.series.clone(),
            warnings: analysis.warnings.iter().map(|w| w.to_string()).collect(),
        }
    }

    /// Adds warnings raised before analysis (e.g. while assembling).
    pub fn with_warnings<I: IntoIterator<Item = String>>(mut self, warnings: I) -> Self {
        let mut all: Vec<String> = warnings.into_iter().collect();
        all.append(&mut self.warnings);
        self.warnings = all;
        self
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
