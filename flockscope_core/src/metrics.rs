//! Flocking Metrics
//! =================
//!
//! Per-frame diagnostics of swarm behaviour:
//! - **Connectivity C**: how close the neighbor graph is to one component
//! - **Cohesion radius R**: farthest agent from the centroid
//! - **Deviation energy E**: spread of neighbor distances around the lattice spacing
//! - **Velocity mismatch K**: mean kinetic energy relative to the group velocity
//!
//! Frames are independent, so the frame loop is a parallel map.

use crate::error::{FlockError, Result, Warning};
use crate::series::{MetricSet, COHESION_RADIUS, CONNECTIVITY, DEVIATION_ENERGY, VELOCITY_MISMATCH};
use crate::tensor::Recording;
use crate::union_find::UnionFind;
use nalgebra::Vector3;
use rayon::prelude::*;
use tracing::debug;

// =============================================================================
// STATE LAYOUT
// =============================================================================

/// Which tensor columns hold positions/velocities, and in how many dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct StateLayout {
    /// Column indices of x, y (and z in 3D)
    pub position: Vec<usize>,
    /// Column indices of vx, vy (and vz in 3D); `None` if vx/vy are absent
    pub velocity: Option<Vec<usize>>,
    /// 2 or 3
    pub dim: usize,
    pub warnings: Vec<Warning>,
}

impl StateLayout {
    /// Locates the state columns. Positions x/y are mandatory.
    ///
    /// The layout is 3D only when the recording is not flagged planar and
    /// both z and vz exist.
    pub fn resolve(recording: &Recording) -> Result<Self> {
        let idx = |name: &str| recording.field_index(name);
        let (x, y) = match (idx("x"), idx("y")) {
            (Some(x), Some(y)) => (x, y),
            _ => return Err(FlockError::missing_fields("positions x/y are not in the recording")),
        };
        let (z, vz) = (idx("z"), idx("vz"));
        let planar = recording.meta.plane2d;

        let mut warnings = Vec::new();
        if !planar && (z.is_none() || vz.is_none()) {
            warnings.push(Warning::PlanarFallback.emit());
        }

        let mut position = vec![x, y];
        let mut velocity = match (idx("vx"), idx("vy")) {
            (Some(vx), Some(vy)) => Some(vec![vx, vy]),
            _ => None,
        };
        let dim = match (planar, z, vz) {
            (false, Some(z), Some(vz)) => {
                position.push(z);
                if let Some(v) = velocity.as_mut() {
                    v.push(vz);
                }
                3
            }
            _ => 2,
        };

        Ok(Self {
            position,
            velocity,
            dim,
            warnings,
        })
    }

    /// Velocity columns, or `MissingFields` when vx/vy are absent.
    pub fn require_velocity(&self) -> Result<&[usize]> {
        self.velocity
            .as_deref()
            .ok_or_else(|| FlockError::missing_fields("velocities vx/vy are not in the recording"))
    }

    /// Positions of every agent in one frame (z = 0 in 2D).
    pub fn positions(&self, recording: &Recording, frame: usize) -> Vec<Vector3<f64>> {
        gather(recording, frame, &self.position)
    }

    pub fn velocities(&self, recording: &Recording, frame: usize) -> Result<Vec<Vector3<f64>>> {
        Ok(gather(recording, frame, self.require_velocity()?))
    }
}

fn gather(recording: &Recording, frame: usize, columns: &[usize]) -> Vec<Vector3<f64>> {
    let fields = recording.field_count();
    recording
        .frame(frame)
        .chunks_exact(fields)
        .map(|agent| {
            let mut v = Vector3::zeros();
            for (axis, &col) in columns.iter().enumerate() {
                v[axis] = f64::from(agent[col]);
            }
            v
        })
        .collect()
}

// =============================================================================
// FLOCK METRICS
// =============================================================================

/// Thresholds for the neighbor graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlockParams {
    /// Agents closer than this are neighbors
    pub neighbor_radius: f64,
    /// Target spacing of the alpha-lattice
    pub desired_distance: f64,
}

/// Raw per-frame values before series-level normalization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameFlock {
    pub connectivity: f64,
    pub cohesion_radius: f64,
    /// Σ (dist - d)² over neighbor pairs
    pub deviation_sum: f64,
    /// 0.5 Σ ‖v_i - v̄‖²
    pub kinetic_deviation: f64,
    pub components: usize,
}

fn centroid(points: &[Vector3<f64>]) -> Vector3<f64> {
    let sum = points.iter().fold(Vector3::zeros(), |acc, p| acc + p);
    sum / points.len() as f64
}

/// Computes one frame. Both slices hold one entry per agent.
pub fn frame_flock(
    positions: &[Vector3<f64>],
    velocities: &[Vector3<f64>],
    params: &FlockParams,
) -> FrameFlock {
    let n = positions.len();
    if n == 0 {
        return FrameFlock {
            connectivity: 1.0,
            cohesion_radius: 0.0,
            deviation_sum: 0.0,
            kinetic_deviation: 0.0,
            components: 0,
        };
    }

    let center = centroid(positions);
    let cohesion_radius = positions
        .iter()
        .map(|p| (p - center).norm())
        .fold(0.0, |acc: f64, d| {
            if acc.is_nan() || d.is_nan() {
                f64::NAN
            } else {
                acc.max(d)
            }
        });

    let v_center = centroid(velocities);
    let kinetic_deviation = 0.5
        * velocities
            .iter()
            .map(|v| (v - v_center).norm_squared())
            .sum::<f64>();

    let r2 = params.neighbor_radius * params.neighbor_radius;
    let mut uf = UnionFind::new(n);
    let mut deviation_sum = 0.0;
    for i in 0..n {
        for j in (i + 1)..n {
            let dist2 = (positions[i] - positions[j]).norm_squared();
            if dist2 <= r2 {
                uf.union(i, j);
                let delta = dist2.sqrt() - params.desired_distance;
                deviation_sum += delta * delta;
            }
        }
    }

    let components = uf.components();
    let connectivity = if n <= 1 {
        1.0
    } else {
        (n - components) as f64 / (n - 1) as f64
    };

    FrameFlock {
        connectivity,
        cohesion_radius,
        deviation_sum,
        kinetic_deviation,
        components,
    }
}

/// Computes `C`, `R`, `E`, `K` for every frame.
pub fn compute_flock_metrics(
    recording: &Recording,
    layout: &StateLayout,
    params: &FlockParams,
) -> Result<MetricSet> {
    let velocity = layout.require_velocity()?;
    let agent_count = recording.agent_count;
    if agent_count == 0 {
        return Err(FlockError::malformed("agent_count = 0"));
    }

    let frames: Vec<FrameFlock> = (0..recording.frame_count)
        .into_par_iter()
        .map(|f| {
            let pos = layout.positions(recording, f);
            let vel = gather(recording, f, velocity);
            frame_flock(&pos, &vel, params)
        })
        .collect();

    let d2 = params.desired_distance * params.desired_distance;
    let n = agent_count as f64;

    let mut set = MetricSet::new();
    set.insert(CONNECTIVITY, frames.iter().map(|f| f.connectivity).collect());
    set.insert(COHESION_RADIUS, frames.iter().map(|f| f.cohesion_radius).collect());
    set.insert(
        DEVIATION_ENERGY,
        frames
            .iter()
            .map(|f| if d2 > 0.0 { f.deviation_sum / d2 } else { f64::NAN })
            .collect(),
    );
    set.insert(
        VELOCITY_MISMATCH,
        frames.iter().map(|f| f.kinetic_deviation / n).collect(),
    );

    debug!(
        "flock metrics over {} frames ({}D, r={}, d={})",
        recording.frame_count, layout.dim, params.neighbor_radius, params.desired_distance
    );
    Ok(set)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{RawRecording, RecordMeta};
    use crate::tensor::assemble;
    use approx::assert_relative_eq;

    fn v(x: f64, y: f64) -> Vector3<f64> {
        Vector3::new(x, y, 0.0)
    }

    fn planar_recording(frames: &[Vec<[f32; 4]>]) -> Recording {
        let agents = frames[0].len();
        let meta = RecordMeta {
            fields: vec!["x".into(), "y".into(), "vx".into(), "vy".into()],
            agent_count: agents as u64,
            plane2d: true,
            dt: 0.1,
            ..RecordMeta::default()
        };
        let states = frames.iter().flatten().flatten().copied().collect();
        assemble(RawRecording {
            meta,
            frame_count: frames.len() as u64,
            states,
        })
        .unwrap()
    }

    #[test]
    fn test_single_agent_fully_connected() {
        let params = FlockParams {
            neighbor_radius: 1.0,
            desired_distance: 1.0,
        };
        let f = frame_flock(&[v(3.0, 4.0)], &[v(1.0, 0.0)], &params);
        assert_eq!(f.connectivity, 1.0);
        assert_eq!(f.cohesion_radius, 0.0);
        assert_eq!(f.kinetic_deviation, 0.0);
    }

    #[test]
    fn test_nan_position_poisons_cohesion_radius() {
        let params = FlockParams {
            neighbor_radius: 1.0,
            desired_distance: 1.0,
        };
        let pos = vec![v(0.0, 0.0), v(f64::NAN, 5.0), v(100.0, 0.0)];
        let vel = vec![Vector3::zeros(); 3];
        let f = frame_flock(&pos, &vel, &params);
        assert!(f.cohesion_radius.is_nan());
    }

    #[test]
    fn test_single_agent_recording_connected_every_frame() {
        let rec = planar_recording(&[
            vec![[0.0, 0.0, 1.0, 0.0]],
            vec![[5.0, 5.0, 0.0, 1.0]],
            vec![[-3.0, 2.0, 2.0, 2.0]],
        ]);
        let layout = StateLayout::resolve(&rec).unwrap();
        let params = FlockParams {
            neighbor_radius: 1.0,
            desired_distance: 1.0,
        };
        let set = compute_flock_metrics(&rec, &layout, &params).unwrap();
        assert_eq!(set.get(CONNECTIVITY).unwrap(), &[1.0, 1.0, 1.0]);
        assert_eq!(set.get(COHESION_RADIUS).unwrap(), &[0.0, 0.0, 0.0]);
        assert_eq!(set.get(VELOCITY_MISMATCH).unwrap(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_all_within_radius_is_connected() {
        let params = FlockParams {
            neighbor_radius: 10.0,
            desired_distance: 1.0,
        };
        let pos: Vec<_> = (0..5).map(|i| v(i as f64, 0.0)).collect();
        let vel = vec![Vector3::zeros(); 5];
        let f = frame_flock(&pos, &vel, &params);
        assert_eq!(f.components, 1);
        assert_eq!(f.connectivity, 1.0);
    }

    #[test]
    fn test_isolated_agents_zero_connectivity() {
        let params = FlockParams {
            neighbor_radius: 1.0,
            desired_distance: 1.0,
        };
        let pos: Vec<_> = (0..5).map(|i| v(10.0 * i as f64, 0.0)).collect();
        let vel = vec![Vector3::zeros(); 5];
        let f = frame_flock(&pos, &vel, &params);
        assert_eq!(f.components, 5);
        assert_eq!(f.connectivity, 0.0);
        assert_eq!(f.deviation_sum, 0.0);
    }

    #[test]
    fn test_partial_connectivity() {
        // two clusters of two, one singleton: components = 3, C = (5-3)/4
        let params = FlockParams {
            neighbor_radius: 1.5,
            desired_distance: 1.0,
        };
        let pos = vec![v(0.0, 0.0), v(1.0, 0.0), v(10.0, 0.0), v(11.0, 0.0), v(30.0, 0.0)];
        let vel = vec![Vector3::zeros(); 5];
        let f = frame_flock(&pos, &vel, &params);
        assert_relative_eq!(f.connectivity, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_cohesion_and_kinetic_deviation() {
        let params = FlockParams {
            neighbor_radius: 1.0,
            desired_distance: 1.0,
        };
        let pos = vec![v(-2.0, 0.0), v(2.0, 0.0)];
        let vel = vec![v(1.0, 0.0), v(-1.0, 0.0)];
        let f = frame_flock(&pos, &vel, &params);
        assert_relative_eq!(f.cohesion_radius, 2.0, epsilon = 1e-12);
        // 0.5 * (1 + 1)
        assert_relative_eq!(f.kinetic_deviation, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_deviation_energy_two_agents() {
        let rec = planar_recording(&[vec![[0.0, 0.0, 0.0, 0.0], [3.0, 0.0, 0.0, 0.0]]]);
        let layout = StateLayout::resolve(&rec).unwrap();
        let params = FlockParams {
            neighbor_radius: 5.0,
            desired_distance: 2.0,
        };
        let set = compute_flock_metrics(&rec, &layout, &params).unwrap();
        assert_relative_eq!(set.get(DEVIATION_ENERGY).unwrap()[0], 0.25, epsilon = 1e-12);
        assert_eq!(set.get(CONNECTIVITY).unwrap()[0], 1.0);
    }

    #[test]
    fn test_zero_desired_distance_gives_nan_energy() {
        let rec = planar_recording(&[vec![[0.0, 0.0, 0.0, 0.0], [1.0, 0.0, 0.0, 0.0]]]);
        let layout = StateLayout::resolve(&rec).unwrap();
        let params = FlockParams {
            neighbor_radius: 5.0,
            desired_distance: 0.0,
        };
        let set = compute_flock_metrics(&rec, &layout, &params).unwrap();
        assert!(set.get(DEVIATION_ENERGY).unwrap()[0].is_nan());
    }

    #[test]
    fn test_velocity_mismatch_divided_by_agent_count() {
        let rec = planar_recording(&[
            vec![[0.0, 0.0, 2.0, 0.0], [1.0, 0.0, 0.0, 0.0]],
            vec![[0.0, 0.0, 1.0, 1.0], [1.0, 0.0, 1.0, 1.0]],
        ]);
        let layout = StateLayout::resolve(&rec).unwrap();
        let params = FlockParams {
            neighbor_radius: 5.0,
            desired_distance: 1.0,
        };
        let set = compute_flock_metrics(&rec, &layout, &params).unwrap();
        let k = set.get(VELOCITY_MISMATCH).unwrap();
        // frame 0: mean v = (1,0); 0.5 * (1 + 1) / 2
        assert_relative_eq!(k[0], 0.5, epsilon = 1e-12);
        assert_relative_eq!(k[1], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_missing_velocity_fields() {
        let meta = RecordMeta {
            fields: vec!["x".into(), "y".into()],
            agent_count: 2,
            ..RecordMeta::default()
        };
        let rec = assemble(RawRecording {
            meta,
            frame_count: 1,
            states: vec![0.0, 0.0, 1.0, 1.0],
        })
        .unwrap();
        let layout = StateLayout::resolve(&rec).unwrap();
        let params = FlockParams {
            neighbor_radius: 1.0,
            desired_distance: 1.0,
        };
        let err = compute_flock_metrics(&rec, &layout, &params).unwrap_err();
        assert!(matches!(err, FlockError::MissingFields(_)));
    }

    #[test]
    fn test_layout_dimensionality() {
        let mut rec = planar_recording(&[vec![[0.0, 0.0, 0.0, 0.0]]]);
        let layout = StateLayout::resolve(&rec).unwrap();
        assert_eq!(layout.dim, 2);
        assert!(layout.warnings.is_empty());

        rec.meta.plane2d = false;
        let layout = StateLayout::resolve(&rec).unwrap();
        assert_eq!(layout.dim, 2);
        assert_eq!(layout.warnings, vec![Warning::PlanarFallback]);

        let meta = RecordMeta {
            agent_count: 1,
            ..RecordMeta::default()
        };
        let rec3 = assemble(RawRecording {
            meta,
            frame_count: 1,
            states: vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
        })
        .unwrap();
        let layout = StateLayout::resolve(&rec3).unwrap();
        assert_eq!(layout.dim, 3);
        assert_eq!(layout.position, vec![0, 1, 2]);
        assert_eq!(layout.velocity, Some(vec![3, 4, 5]));
        assert_eq!(layout.positions(&rec3, 0)[0], Vector3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_missing_positions() {
        let meta = RecordMeta {
            fields: vec!["vx".into(), "vy".into()],
            agent_count: 1,
            ..RecordMeta::default()
        };
        let rec = assemble(RawRecording {
            meta,
            frame_count: 1,
            states: vec![0.0, 0.0],
        })
        .unwrap();
        assert!(matches!(StateLayout::resolve(&rec), Err(FlockError::MissingFields(_))));
    }
}
