//! Tensor assembly: shape inference, reshaping and the time axis.

use crate::error::{FlockError, Result, Warning};
use crate::recording::{decode_recording, RawRecording, RecordMeta};
use std::path::Path;
use tracing::debug;

/// Field layout assumed when the recording does not declare one.
pub const DEFAULT_FIELDS: [&str; 6] = ["x", "y", "z", "vx", "vy", "vz"];

/// A decoded recording reshaped to `[frame][agent][field]`.
#[derive(Debug, Clone)]
pub struct Recording {
    pub meta: RecordMeta,
    pub frame_count: usize,
    pub agent_count: usize,
    /// Normalized field names (trimmed, lower-cased)
    pub fields: Vec<String>,
    /// Dense row-major storage, `frame_count * agent_count * fields.len()` long
    pub states: Vec<f32>,
    /// `time[f] = f * dt * stride`
    pub time: Vec<f64>,
    /// Non-fatal conditions raised while assembling
    pub warnings: Vec<Warning>,
}

impl Recording {
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Position of a (normalized) field name in the last axis.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == name)
    }

    /// Flat offset of `[frame][agent][field]`.
    #[inline]
    pub fn offset(&self, frame: usize, agent: usize, field: usize) -> usize {
        (frame * self.agent_count + agent) * self.fields.len() + field
    }

    #[inline]
    pub fn value(&self, frame: usize, agent: usize, field: usize) -> f32 {
        self.states[self.offset(frame, agent, field)]
    }

    /// All values of one frame, agent-major.
    pub fn frame(&self, frame: usize) -> &[f32] {
        let stride = self.agent_count * self.fields.len();
        &self.states[frame * stride..(frame + 1) * stride]
    }

    /// Effective timestep (after defaults were applied).
    pub fn effective_dt(&self) -> f64 {
        if self.frame_count > 1 {
            self.time[1] - self.time[0]
        } else {
            resolve_time_step(&self.meta).0 * resolve_stride(&self.meta).0 as f64
        }
    }
}

/// Reads the whole file, then decodes and assembles it.
pub fn load_recording(path: impl AsRef<Path>) -> Result<Recording> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    debug!("read {} bytes from {}", data.len(), path.display());
    let raw = decode_recording(&data)?;
    drop(data);
    assemble(raw)
}

/// Decodes bytes already in memory.
pub fn recording_from_bytes(data: &[u8]) -> Result<Recording> {
    assemble(decode_recording(data)?)
}

/// Normalizes declared field names, falling back to [`DEFAULT_FIELDS`].
pub fn resolve_fields(meta: &RecordMeta) -> Vec<String> {
    let declared: Vec<String> = meta
        .fields
        .iter()
        .map(|f| f.trim().to_lowercase())
        .filter(|f| !f.is_empty())
        .collect();
    if declared.is_empty() {
        DEFAULT_FIELDS.iter().map(|f| f.to_string()).collect()
    } else {
        declared
    }
}

/// Infers `(agent_count, frame_count)` from the metadata and buffer size.
pub fn infer_shape(
    meta: &RecordMeta,
    frame_count: usize,
    total_values: usize,
    field_count: usize,
) -> Result<(usize, usize)> {
    if field_count == 0 {
        return Err(FlockError::malformed("no fields in recording"));
    }

    let mut agent_count = usize::try_from(meta.agent_count).unwrap_or(0);
    if agent_count > 0 && !meta.groups.is_empty() && meta.groups.len() != agent_count {
        // declared count wins; the mismatch usually means a malformed writer
        debug!(
            "declared agent_count {} disagrees with {} group entries; keeping declared value",
            agent_count,
            meta.groups.len()
        );
    }
    if agent_count == 0 && !meta.groups.is_empty() {
        agent_count = meta.groups.len();
    }
    if agent_count == 0 && frame_count > 0 {
        agent_count = total_values / frame_count.saturating_mul(field_count);
    }

    let mut frame_count = frame_count;
    if frame_count == 0 && agent_count > 0 {
        frame_count = total_values / agent_count.saturating_mul(field_count);
    }

    if agent_count == 0 || frame_count == 0 {
        return Err(FlockError::UnresolvableShape {
            total_values,
            field_count,
        });
    }
    Ok((agent_count, frame_count))
}

/// Builds a [`Recording`] from decoder output.
pub fn assemble(raw: RawRecording) -> Result<Recording> {
    let RawRecording {
        meta,
        frame_count,
        mut states,
    } = raw;
    let mut warnings = Vec::new();

    let fields = resolve_fields(&meta);
    let field_count = fields.len();
    let total_values = states.len();
    let declared_frames = usize::try_from(frame_count).unwrap_or(usize::MAX);

    let (agent_count, frame_count) =
        infer_shape(&meta, declared_frames, total_values, field_count)?;

    let expected = frame_count
        .checked_mul(agent_count)
        .and_then(|n| n.checked_mul(field_count))
        .ok_or_else(|| FlockError::malformed("declared shape overflows"))?;
    if total_values < expected {
        return Err(FlockError::truncated(format!(
            "states payload has {} values, expected {}",
            total_values, expected
        )));
    }
    if total_values > expected {
        warnings.push(
            Warning::TrailingValues {
                total: total_values,
                expected,
            }
            .emit(),
        );
        states.truncate(expected);
    }

    let (dt, dt_defaulted) = resolve_time_step(&meta);
    if dt_defaulted {
        warnings.push(Warning::DefaultTimestep { recorded: meta.dt }.emit());
    }
    let (stride, stride_defaulted) = resolve_stride(&meta);
    if stride_defaulted {
        warnings.push(Warning::DefaultStride.emit());
    }
    let step = dt * stride as f64;
    let time: Vec<f64> = (0..frame_count).map(|f| f as f64 * step).collect();

    debug!(
        "assembled tensor: frames={} agents={} fields={:?} dt={} stride={}",
        frame_count, agent_count, fields, dt, stride
    );

    Ok(Recording {
        meta,
        frame_count,
        agent_count,
        fields,
        states,
        time,
        warnings,
    })
}

fn resolve_time_step(meta: &RecordMeta) -> (f64, bool) {
    if meta.dt.is_finite() && meta.dt > 0.0 {
        (meta.dt, false)
    } else {
        (1.0, true)
    }
}

fn resolve_stride(meta: &RecordMeta) -> (u64, bool) {
    if meta.stride > 0 {
        (meta.stride, false)
    } else {
        (1, true)
    }
}
