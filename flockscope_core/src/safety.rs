//! Safety Series
//! =============
//!
//! Inter-agent clearance from a per-frame Gram matrix, and clearance to
//! polynomial obstacle trajectories.

use crate::error::{FlockError, Result};
use crate::metrics::StateLayout;
use crate::params::{
    normalize_algorithm_id, ALGO_FORMATION_ECBF, ALGO_SAFE_FLOCKING_ALPHA,
};
use crate::series::{
    MetricSet, OBSTACLE_CLEARANCE, OBSTACLE_VIOLATIONS, PAIR_CLEARANCE, PAIR_VIOLATIONS,
};
use crate::tensor::Recording;
use nalgebra::{DMatrix, Vector3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

// =============================================================================
// OBSTACLES
// =============================================================================

/// Obstacle centre moving on `p(t) = a2 t² + a1 t + a0`, with clearance radius `d`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObstaclePoly {
    pub a2: [f64; 3],
    pub a1: [f64; 3],
    pub a0: [f64; 3],
    pub d: f64,
}

impl ObstaclePoly {
    /// Stationary obstacle at `center`.
    pub fn fixed(center: [f64; 3], d: f64) -> Self {
        Self {
            a2: [0.0; 3],
            a1: [0.0; 3],
            a0: center,
            d,
        }
    }

    pub fn pos(&self, t: f64) -> Vector3<f64> {
        Vector3::from_fn(|i, _| self.a2[i] * t * t + self.a1[i] * t + self.a0[i])
    }

    pub fn vel(&self, t: f64) -> Vector3<f64> {
        Vector3::from_fn(|i, _| 2.0 * self.a2[i] * t + self.a1[i])
    }

    pub fn acc(&self) -> Vector3<f64> {
        Vector3::from_fn(|i, _| 2.0 * self.a2[i])
    }
}

/// The six-obstacle course: five static spheres and one on a parabolic path.
pub fn paper_obstacles() -> Vec<ObstaclePoly> {
    vec![
        ObstaclePoly::fixed([47.0, 86.0, 10.0], 5.0),
        ObstaclePoly::fixed([52.0, 78.0, 9.0], 4.0),
        ObstaclePoly::fixed([43.0, 82.0, 61.5], 5.0),
        ObstaclePoly::fixed([49.0, 75.0, 60.5], 5.5),
        // p = [95 - 0.06t, 15 + 0.001t², 100 - 0.089t]
        ObstaclePoly {
            a2: [0.0, 0.001, 0.0],
            a1: [-0.06, 0.0, -0.089],
            a0: [95.0, 15.0, 100.0],
            d: 3.0,
        },
        ObstaclePoly::fixed([69.0, 83.0, 124.5], 6.0),
    ]
}

/// Which obstacle set to measure against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObstacleScenario {
    /// Preset course only for the safety-aware controllers
    #[default]
    Auto,
    /// Always the preset course
    Paper,
    /// No obstacles
    None,
}

impl ObstacleScenario {
    pub fn all() -> Vec<ObstacleScenario> {
        vec![Self::Auto, Self::Paper, Self::None]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Paper => "paper",
            Self::None => "none",
        }
    }

    /// Obstacles for a recording produced by `algorithm_id`.
    pub fn obstacles_for(&self, algorithm_id: &str) -> Vec<ObstaclePoly> {
        match self {
            Self::Paper => paper_obstacles(),
            Self::None => Vec::new(),
            Self::Auto => {
                let id = normalize_algorithm_id(algorithm_id);
                if id == ALGO_SAFE_FLOCKING_ALPHA || id == ALGO_FORMATION_ECBF {
                    paper_obstacles()
                } else {
                    Vec::new()
                }
            }
        }
    }
}

impl fmt::Display for ObstacleScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ObstacleScenario {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "paper" => Ok(Self::Paper),
            "none" => Ok(Self::None),
            _ => Err(format!("Unknown obstacle scenario: {} (expected auto, paper or none)", s)),
        }
    }
}

// =============================================================================
// PAIRWISE CLEARANCE
// =============================================================================

/// Squared pairwise distances via the Gram matrix `G = P Pᵀ`.
///
/// Entries are clamped to ≥ 0 against round-off; the diagonal is +∞ so it
/// never wins a minimum.
pub fn squared_distances(positions: &[Vector3<f64>], dim: usize) -> DMatrix<f64> {
    let n = positions.len();
    let p = DMatrix::from_fn(n, dim, |i, k| positions[i][k]);
    let gram = &p * p.transpose();
    DMatrix::from_fn(n, n, |i, j| {
        if i == j {
            f64::INFINITY
        } else {
            (gram[(i, i)] + gram[(j, j)] - 2.0 * gram[(i, j)]).max(0.0)
        }
    })
}

/// `(sqrt(min d²) - d_safe, #pairs with d² < d_safe²)` for one frame.
pub fn frame_pair_clearance(positions: &[Vector3<f64>], dim: usize, d_safe: f64) -> (f64, usize) {
    let d2 = squared_distances(positions, dim);
    let n = positions.len();
    let limit = d_safe * d_safe;
    let mut min = f64::INFINITY;
    let mut violations = 0;
    for i in 0..n {
        for j in (i + 1)..n {
            let v = d2[(i, j)];
            min = min.min(v);
            if v < limit {
                violations += 1;
            }
        }
    }
    (min.sqrt() - d_safe, violations)
}

/// `(min over obstacles/agents of ‖x - p(t)‖ - d, #negative clearances)`.
///
/// In 2D the obstacle z coordinate is dropped.
pub fn frame_obstacle_clearance(
    positions: &[Vector3<f64>],
    dim: usize,
    obstacles: &[ObstaclePoly],
    t: f64,
) -> (f64, usize) {
    let mut min = f64::INFINITY;
    let mut violations = 0;
    for obstacle in obstacles {
        let mut center = obstacle.pos(t);
        if dim < 3 {
            center.z = 0.0;
        }
        for p in positions {
            let clearance = (p - center).norm() - obstacle.d;
            min = min.min(clearance);
            if clearance < 0.0 {
                violations += 1;
            }
        }
    }
    (min, violations)
}

/// Computes the pair series, plus the obstacle series when `obstacles` is non-empty.
///
/// Fewer than two agents yields an empty set.
pub fn compute_safety(
    recording: &Recording,
    layout: &StateLayout,
    d_safe: f64,
    obstacles: &[ObstaclePoly],
) -> Result<MetricSet> {
    if !(d_safe.is_finite() && d_safe > 0.0) {
        return Err(FlockError::InvalidParameter {
            name: "safe_distance",
            value: d_safe,
        });
    }
    let mut set = MetricSet::new();
    if recording.agent_count < 2 {
        debug!("safety skipped: {} agent(s)", recording.agent_count);
        return Ok(set);
    }

    let dim = layout.dim;
    let frames: Vec<((f64, usize), Option<(f64, usize)>)> = (0..recording.frame_count)
        .into_par_iter()
        .map(|f| {
            let pos = layout.positions(recording, f);
            let pair = frame_pair_clearance(&pos, dim, d_safe);
            let obstacle = (!obstacles.is_empty())
                .then(|| frame_obstacle_clearance(&pos, dim, obstacles, recording.time[f]));
            (pair, obstacle)
        })
        .collect();

    set.insert(PAIR_CLEARANCE, frames.iter().map(|(p, _)| p.0).collect());
    set.insert(PAIR_VIOLATIONS, frames.iter().map(|(p, _)| p.1 as f64).collect());
    if !obstacles.is_empty() {
        set.insert(
            OBSTACLE_CLEARANCE,
            frames.iter().filter_map(|(_, o)| o.map(|o| o.0)).collect(),
        );
        set.insert(
            OBSTACLE_VIOLATIONS,
            frames.iter().filter_map(|(_, o)| o.map(|o| o.1 as f64)).collect(),
        );
    }

    debug!(
        "safety series over {} frames, d_safe={}, {} obstacle(s)",
        recording.frame_count,
        d_safe,
        obstacles.len()
    );
    Ok(set)
}

// =============================================================================
// TESTS
// =============================================================================
