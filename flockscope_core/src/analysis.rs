//! One-call analysis of a loaded recording.

use crate::control::compute_control;
use crate::error::{Result, Warning};
use crate::metrics::{compute_flock_metrics, FlockParams, StateLayout};
use crate::params::{Overrides, ParamResolver, ParamTables, ResolvedParams};
use crate::safety::{compute_safety, ObstacleScenario};
use crate::series::MetricSet;
use crate::tensor::Recording;
use tracing::debug;

/// Everything a caller may choose about an analysis run.
#[derive(Debug, Clone, Default)]
pub struct AnalysisConfig {
    pub overrides: Overrides,
    pub scenario: ObstacleScenario,
    pub tables: ParamTables,
}

/// Result of [`analyze`].
#[derive(Debug, Clone)]
pub struct Analysis {
    /// Time axis shared by every series
    pub time: Vec<f64>,
    pub params: ResolvedParams,
    /// 2 or 3
    pub dim: usize,
    pub obstacle_count: usize,
    /// Flocking, safety and control series
    pub series: MetricSet,
    /// Warnings from layout resolution and parameter resolution
    pub warnings: Vec<Warning>,
}

/// Resolves thresholds, picks obstacles and computes every applicable series.
pub fn analyze(recording: &Recording, config: &AnalysisConfig) -> Result<Analysis> {
    let layout = StateLayout::resolve(recording)?;
    let params =
        ParamResolver::new(&config.tables).resolve_all(&config.overrides, &recording.meta)?;

    let flock = FlockParams {
        neighbor_radius: params.neighbor_radius.value,
        desired_distance: params.desired_distance.value,
    };
    let mut series = compute_flock_metrics(recording, &layout, &flock)?;

    let obstacles = config.scenario.obstacles_for(&recording.meta.algorithm_id);
    debug!(
        "scenario '{}' for algorithm '{}': {} obstacle(s)",
        config.scenario,
        recording.meta.algorithm_id,
        obstacles.len()
    );
    series.merge(compute_safety(
        recording,
        &layout,
        params.safe_distance.value,
        &obstacles,
    )?);
    series.merge(compute_control(recording));

    let mut warnings = layout.warnings.clone();
    warnings.extend(params.warnings.iter().cloned());

    Ok(Analysis {
        time: recording.time.clone(),
        params,
        dim: layout.dim,
        obstacle_count: obstacles.len(),
        series,
        warnings,
    })
}
