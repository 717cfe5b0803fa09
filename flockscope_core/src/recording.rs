//! Recording decoder and writer.
//!
//! A recording is one top-level message:
//!
//! ```text
//! 1: metadata     (length-delimited, RecordMeta sub-message)
//! 2: frame_count  (varint)
//! 3: states       (length-delimited, packed little-endian f32)
//! ```
//!
//! Unknown fields are skipped at every level so newer writers stay readable.

use crate::error::{FlockError, Result};
use crate::wire::{read_packed_varints, WireReader, WireWriter, WIRE_FIXED64, WIRE_LEN, WIRE_VARINT};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Recording metadata as written by the simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMeta {
    pub version: u64,
    pub created_at: String,
    /// Simulation timestep in seconds; NaN when the writer omitted it
    pub dt: f64,
    /// Number of simulation steps between recorded frames
    pub stride: u64,
    /// Informational only, never constrains the frame count
    pub max_frames: u64,
    pub model_id: String,
    pub algorithm_id: String,
    pub algorithm_params: BTreeMap<String, f64>,
    pub plane2d: bool,
    pub agent_count: u64,
    /// Raw field names, in tensor last-axis order
    pub fields: Vec<String>,
    pub group_colors: BTreeMap<u64, String>,
    pub groups: Vec<u64>,
}

impl Default for RecordMeta {
    fn default() -> Self {
        Self {
            version: 0,
            created_at: String::new(),
            dt: f64::NAN,
            stride: 1,
            max_frames: 0,
            model_id: String::new(),
            algorithm_id: String::new(),
            algorithm_params: BTreeMap::new(),
            plane2d: false,
            agent_count: 0,
            fields: Vec::new(),
            group_colors: BTreeMap::new(),
            groups: Vec::new(),
        }
    }
}

/// Output of the decoder before any shape inference.
#[derive(Debug, Clone)]
pub struct RawRecording {
    pub meta: RecordMeta,
    /// Frame count as written; zero when absent
    pub frame_count: u64,
    pub states: Vec<f32>,
}

/// Decodes a complete recording buffer.
pub fn decode_recording(data: &[u8]) -> Result<RawRecording> {
    let mut reader = WireReader::new(data);
    let mut meta_payload: Option<&[u8]> = None;
    let mut frame_count = 0u64;
    let mut states_payload: Option<&[u8]> = None;

    while let Some(tag) = reader.next_tag()? {
        match (tag.field, tag.wire_type) {
            (1, WIRE_LEN) => meta_payload = Some(reader.read_len_delimited()?),
            (2, WIRE_VARINT) => frame_count = reader.read_varint()?,
            (3, WIRE_LEN) => states_payload = Some(reader.read_len_delimited()?),
            (_, wire_type) => reader.skip(wire_type)?,
        }
    }

    let meta = match meta_payload {
        Some(payload) if !payload.is_empty() => decode_meta(payload)?,
        _ => RecordMeta::default(),
    };

    let states_payload = states_payload.ok_or(FlockError::MissingStates)?;
    if states_payload.len() % 4 != 0 {
        return Err(FlockError::MisalignedPayload(states_payload.len()));
    }
    let states: Vec<f32> = states_payload
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    debug!(
        "decoded recording: {} bytes, frame_count={}, {} state values",
        data.len(),
        frame_count,
        states.len()
    );

    Ok(RawRecording {
        meta,
        frame_count,
        states,
    })
}

/// Decodes the metadata sub-message.
pub fn decode_meta(payload: &[u8]) -> Result<RecordMeta> {
    let mut meta = RecordMeta::default();
    let mut reader = WireReader::new(payload);

    while let Some(tag) = reader.next_tag()? {
        match (tag.field, tag.wire_type) {
            (1, WIRE_VARINT) => meta.version = reader.read_varint()?,
            (2, WIRE_LEN) => meta.created_at = reader.read_string()?,
            (3, WIRE_FIXED64) => meta.dt = reader.read_f64()?,
            (4, WIRE_VARINT) => meta.stride = reader.read_varint()?,
            (5, WIRE_VARINT) => meta.max_frames = reader.read_varint()?,
            (6, WIRE_LEN) => meta.model_id = reader.read_string()?,
            (7, WIRE_LEN) => meta.algorithm_id = reader.read_string()?,
            (8, WIRE_VARINT) => meta.plane2d = reader.read_varint()? != 0,
            (9, WIRE_VARINT) => meta.agent_count = reader.read_varint()?,
            (10, WIRE_LEN) => meta.fields.push(reader.read_string()?),
            (11, WIRE_LEN) => {
                let entry = decode_group_color(reader.read_len_delimited()?)?;
                if let (Some(group), Some(color)) = entry {
                    meta.group_colors.insert(group, color);
                }
            }
            (12, WIRE_LEN) => {
                let packed = reader.read_len_delimited()?;
                meta.groups.extend(read_packed_varints(packed)?);
            }
            (13, WIRE_LEN) => {
                let entry = decode_algorithm_param(reader.read_len_delimited()?)?;
                if let (Some(key), Some(value)) = entry {
                    meta.algorithm_params.insert(key, value);
                }
            }
            (_, wire_type) => reader.skip(wire_type)?,
        }
    }

    Ok(meta)
}

fn decode_group_color(payload: &[u8]) -> Result<(Option<u64>, Option<String>)> {
    let mut group = None;
    let mut color = None;
    let mut reader = WireReader::new(payload);
    while let Some(tag) = reader.next_tag()? {
        match (tag.field, tag.wire_type) {
            (1, WIRE_VARINT) => group = Some(reader.read_varint()?),
            (2, WIRE_LEN) => color = Some(reader.read_string()?),
            (_, wire_type) => reader.skip(wire_type)?,
        }
    }
    Ok((group, color))
}

fn decode_algorithm_param(payload: &[u8]) -> Result<(Option<String>, Option<f64>)> {
    let mut key = None;
    let mut value = None;
    let mut reader = WireReader::new(payload);
    while let Some(tag) = reader.next_tag()? {
        match (tag.field, tag.wire_type) {
            (1, WIRE_LEN) => key = Some(reader.read_string()?),
            (2, WIRE_FIXED64) => value = Some(reader.read_f64()?),
            (_, wire_type) => reader.skip(wire_type)?,
        }
    }
    Ok((key, value))
}

/// Encodes recordings in the format [`decode_recording`] reads.
#[derive(Debug, Clone)]
pub struct RecordingWriter {
    meta: RecordMeta,
    frame_count: Option<u64>,
    states: Vec<f32>,
}

impl RecordingWriter {
    pub fn new(meta: RecordMeta) -> Self {
        Self {
            meta,
            frame_count: None,
            states: Vec::new(),
        }
    }

    /// Writes field 2. Leave unset to let the reader infer it.
    pub fn with_frame_count(mut self, frame_count: u64) -> Self {
        self.frame_count = Some(frame_count);
        self
    }

    /// Appends one frame (`agents * fields` values, agent-major).
    pub fn push_frame(&mut self, values: &[f32]) {
        self.states.extend_from_slice(values);
    }

    pub fn with_states(mut self, states: Vec<f32>) -> Self {
        self.states = states;
        self
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = WireWriter::new();
        out.bytes_field(1, &encode_meta(&self.meta));
        if let Some(frames) = self.frame_count {
            out.varint_field(2, frames);
        }
        let mut blob = Vec::with_capacity(self.states.len() * 4);
        for v in &self.states {
            blob.extend_from_slice(&v.to_le_bytes());
        }
        out.bytes_field(3, &blob);
        out.into_bytes()
    }
}

/// Encodes the metadata sub-message. Unset (NaN) dt is omitted.
pub fn encode_meta(meta: &RecordMeta) -> Vec<u8> {
    let mut w = WireWriter::new();
    w.varint_field(1, meta.version);
    if !meta.created_at.is_empty() {
        w.string_field(2, &meta.created_at);
    }
    if !meta.dt.is_nan() {
        w.f64_field(3, meta.dt);
    }
    w.varint_field(4, meta.stride);
    w.varint_field(5, meta.max_frames);
    if !meta.model_id.is_empty() {
        w.string_field(6, &meta.model_id);
    }
    if !meta.algorithm_id.is_empty() {
        w.string_field(7, &meta.algorithm_id);
    }
    w.varint_field(8, u64::from(meta.plane2d));
    w.varint_field(9, meta.agent_count);
    for name in &meta.fields {
        w.string_field(10, name);
    }
    for (group, color) in &meta.group_colors {
        let mut entry = WireWriter::new();
        entry.varint_field(1, *group).string_field(2, color);
        w.bytes_field(11, entry.as_bytes());
    }
    if !meta.groups.is_empty() {
        w.packed_varints_field(12, &meta.groups);
    }
    for (key, value) in &meta.algorithm_params {
        let mut entry = WireWriter::new();
        entry.string_field(1, key).f64_field(2, *value);
        w.bytes_field(13, entry.as_bytes());
    }
    w.into_bytes()
}
