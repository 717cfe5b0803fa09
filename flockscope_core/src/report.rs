//! Human-readable summaries of a recording and its resolved parameters.

use crate::axes::{axis_label, list_axes};
use crate::params::ResolvedParams;
use crate::recording::RecordMeta;
use crate::tensor::Recording;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Formats `value` with 6 significant digits, trimming trailing zeros
/// (`%.6g` semantics).
pub fn format_sig6(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    // round first, then read the exponent back so 999999.5 becomes 1e+06
    let sci = format!("{:.5e}", value);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };

    if !(-4..6).contains(&exp) {
        let mantissa = trim_zeros(mantissa);
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exp.abs())
    } else {
        let decimals = (5 - exp).max(0) as usize;
        trim_zeros(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn trim_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// Serializable snapshot of the file-level metadata.
#[derive(Debug, Clone, Serialize)]
pub struct RecordingSummary {
    pub path: String,
    pub frames: usize,
    pub agents: usize,
    pub fields: Vec<String>,
    pub dt: f64,
    pub stride: u64,
    pub effective_dt: f64,
    pub duration: f64,
    pub created_at: Option<String>,
    pub model_id: Option<String>,
    pub algorithm_id: Option<String>,
    pub algorithm_params: BTreeMap<String, f64>,
    pub plane2d: bool,
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

impl RecordingSummary {
    pub fn new(path: impl AsRef<Path>, recording: &Recording) -> Self {
        let meta: &RecordMeta = &recording.meta;
        Self {
            path: path.as_ref().display().to_string(),
            frames: recording.frame_count,
            agents: recording.agent_count,
            fields: recording.fields.clone(),
            dt: meta.dt,
            stride: meta.stride,
            effective_dt: recording.effective_dt(),
            duration: recording.time.last().copied().unwrap_or(0.0),
            created_at: non_empty(&meta.created_at),
            model_id: non_empty(&meta.model_id),
            algorithm_id: non_empty(&meta.algorithm_id),
            algorithm_params: meta.algorithm_params.clone(),
            plane2d: meta.plane2d,
        }
    }

    /// One line per property, optional ones only when set.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("File: {}", self.path),
            format!("Frames: {}", self.frames),
            format!("Agents: {}", self.agents),
            format!("Fields: {}", self.fields.join(", ")),
            format!("dt: {} s", format_sig6(self.dt)),
            format!("stride: {}", self.stride),
        ];
        if let Some(created) = &self.created_at {
            lines.push(format!("Created: {}", created));
        }
        if let Some(model) = &self.model_id {
            lines.push(format!("Model: {}", model));
        }
        if let Some(algorithm) = &self.algorithm_id {
            lines.push(format!("Algorithm: {}", algorithm));
        }
        if !self.algorithm_params.is_empty() {
            let params: Vec<String> = self
                .algorithm_params
                .iter()
                .map(|(k, v)| format!("{}={}", k, format_sig6(*v)))
                .collect();
            lines.push(format!("Algorithm params: {}", params.join(", ")));
        }
        lines.push(format!("Plane 2D: {}", if self.plane2d { "yes" } else { "no" }));
        lines
    }
}

/// Summary lines for a loaded recording.
pub fn summary_lines(path: impl AsRef<Path>, recording: &Recording) -> Vec<String> {
    RecordingSummary::new(path, recording).lines()
}

/// `name: label` for every axis the recording offers.
pub fn axes_lines(recording: &Recording) -> Vec<String> {
    list_axes(&recording.fields)
        .into_iter()
        .filter_map(|axis| axis_label(&axis).ok().map(|label| format!("{}: {}", axis, label)))
        .collect()
}

/// One line per threshold with its value and where it came from.
pub fn params_lines(params: &ResolvedParams) -> Vec<String> {
    [
        ("neighbor_radius", &params.neighbor_radius),
        ("desired_distance", &params.desired_distance),
        ("safe_distance", &params.safe_distance),
    ]
    .iter()
    .map(|(name, r)| format!("{} = {} ({})", name, format_sig6(r.value), r.source))
    .collect()
}
