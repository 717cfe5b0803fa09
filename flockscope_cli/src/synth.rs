//! Synthetic recordings.
//!
//! Generates a deterministic noisy lattice flock and encodes it in the
//! recording format, so the shell can be exercised without a simulator:
//! - Agents start on a square lattice with the desired spacing
//! - Everyone shares a heading; velocities get seeded Gaussian noise
//! - Positions integrate the velocities between recorded frames

use crate::error::{CliError, Result};
use flockscope_core::control::CONTROL_FIELDS;
use flockscope_core::params::ALGO_FLOCKING_ALPHA;
use flockscope_core::{RecordMeta, RecordingWriter};
use nalgebra::Vector3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use std::path::Path;
use tracing::debug;

/// Parameters of a synthetic flock.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthConfig {
    /// Master seed; equal seeds give byte-identical recordings
    pub seed: u64,
    pub agents: usize,
    pub frames: usize,
    /// Simulation step (seconds)
    pub dt: f64,
    /// Steps between recorded frames
    pub stride: u64,
    /// Lattice spacing (meters)
    pub spacing: f64,
    /// Group speed (m/s)
    pub speed: f64,
    /// Velocity noise standard deviation (m/s)
    pub noise_std: f64,
    /// Record x, y, vx, vy only
    pub plane2d: bool,
    /// Also record safety-filter debug fields
    pub control: bool,
    pub algorithm_id: String,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            agents: 16,
            frames: 200,
            dt: 0.02,
            stride: 5,
            spacing: 1.4,
            speed: 1.0,
            noise_std: 0.05,
            plane2d: true,
            control: false,
            algorithm_id: ALGO_FLOCKING_ALPHA.to_string(),
        }
    }
}

/// A seeded flock that can be stepped frame by frame.
pub struct SynthFlock {
    config: SynthConfig,
    rng: ChaCha8Rng,
    noise: Normal<f64>,
    positions: Vec<Vector3<f64>>,
    velocities: Vec<Vector3<f64>>,
}

impl SynthFlock {
    pub fn new(config: SynthConfig) -> Result<Self> {
        if config.agents == 0 || config.frames == 0 {
            return Err(CliError::invalid("synthetic flock needs at least one agent and one frame"));
        }
        if !(config.dt.is_finite() && config.dt > 0.0) || config.stride == 0 {
            return Err(CliError::invalid(format!(
                "dt={} stride={} do not define a time axis",
                config.dt, config.stride
            )));
        }
        if !(config.noise_std.is_finite() && config.noise_std >= 0.0) {
            return Err(CliError::invalid(format!(
                "noise_std={} must be a non-negative standard deviation",
                config.noise_std
            )));
        }
        let noise = Normal::new(0.0, config.noise_std)
            .map_err(|e| CliError::invalid(format!("noise_std={}: {}", config.noise_std, e)))?;
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);

        let side = (config.agents as f64).sqrt().ceil().max(1.0) as usize;
        let heading: f64 = rng.gen_range(0.0..std::f64::consts::TAU);
        let base_velocity = Vector3::new(heading.cos(), heading.sin(), 0.0) * config.speed;

        let positions = (0..config.agents)
            .map(|i| {
                let z = if config.plane2d { 0.0 } else { 10.0 };
                Vector3::new(
                    (i % side) as f64 * config.spacing,
                    (i / side) as f64 * config.spacing,
                    z,
                )
            })
            .collect();
        let velocities = vec![base_velocity; config.agents];

        Ok(Self {
            config,
            rng,
            noise,
            positions,
            velocities,
        })
    }

    /// Field names in tensor order.
    pub fn fields(&self) -> Vec<String> {
        let mut fields: Vec<&str> = if self.config.plane2d {
            vec!["x", "y", "vx", "vy"]
        } else {
            vec!["x", "y", "z", "vx", "vy", "vz"]
        };
        if self.config.control {
            fields.extend(CONTROL_FIELDS);
        }
        fields.into_iter().map(String::from).collect()
    }

    pub fn meta(&self) -> RecordMeta {
        let mut meta = RecordMeta {
            version: 1,
            dt: self.config.dt,
            stride: self.config.stride,
            max_frames: self.config.frames as u64,
            model_id: "synthetic-lattice".to_string(),
            algorithm_id: self.config.algorithm_id.clone(),
            plane2d: self.config.plane2d,
            agent_count: self.config.agents as u64,
            fields: self.fields(),
            groups: vec![0; self.config.agents],
            ..RecordMeta::default()
        };
        meta.group_colors.insert(0, "#1f77b4".to_string());
        meta.algorithm_params
            .insert("neighbor_radius".to_string(), 1.2 * self.config.spacing);
        meta.algorithm_params
            .insert("desired_distance".to_string(), self.config.spacing);
        meta
    }

    /// Values of the current frame, agent-major.
    fn frame_values(&mut self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.config.agents * self.fields().len());
        let constraints = self.config.agents.saturating_sub(1) as f32;
        for i in 0..self.config.agents {
            let p = self.positions[i];
            let v = self.velocities[i];
            if self.config.plane2d {
                out.extend([p.x as f32, p.y as f32, v.x as f32, v.y as f32]);
            } else {
                out.extend([p.x, p.y, p.z, v.x, v.y, v.z].map(|c| c as f32));
            }
            if self.config.control {
                let nominal = Vector3::from_fn(|_, _| self.noise.sample(&mut self.rng));
                let correction = Vector3::from_fn(|_, _| 0.1 * self.noise.sample(&mut self.rng));
                let filtered = nominal + correction;
                let slack = self.noise.sample(&mut self.rng).abs() as f32;
                let active = if self.rng.gen_bool(0.25) { 1.0 } else { 0.0 };
                out.extend(
                    [nominal.x, nominal.y, nominal.z, filtered.x, filtered.y, filtered.z]
                        .map(|c| c as f32),
                );
                out.extend([slack, active, constraints]);
            }
        }
        out
    }

    /// Advances one recorded frame (`stride` simulation steps).
    fn step(&mut self) {
        let span = self.config.dt * self.config.stride as f64;
        for i in 0..self.config.agents {
            let mut jitter = Vector3::from_fn(|_, _| self.noise.sample(&mut self.rng));
            if self.config.plane2d {
                jitter.z = 0.0;
            }
            self.velocities[i] += jitter;
            self.positions[i] += self.velocities[i] * span;
        }
    }

    /// Generates every frame and returns the writer, ready to encode.
    pub fn generate(mut self) -> RecordingWriter {
        let mut writer =
            RecordingWriter::new(self.meta()).with_frame_count(self.config.frames as u64);
        for _ in 0..self.config.frames {
            let values = self.frame_values();
            writer.push_frame(&values);
            self.step();
        }
        debug!(
            "synthesized {} frames of {} agents (seed={})",
            self.config.frames, self.config.agents, self.config.seed
        );
        writer
    }
}

/// Encodes a synthetic recording.
pub fn synthesize(config: SynthConfig) -> Result<Vec<u8>> {
    Ok(SynthFlock::new(config)?.generate().encode())
}

/// Writes a synthetic recording to `path`, returning the byte count.
pub fn write_synthetic(config: SynthConfig, path: impl AsRef<Path>) -> Result<usize> {
    let bytes = synthesize(config)?;
    std::fs::write(path, &bytes)?;
    Ok(bytes.len())
}
