//! Axis names for single-series extraction.
//!
//! `t` is always available; the other axes are the recording's own fields
//! that have a known physical label.

use crate::error::{FlockError, Result};
use crate::tensor::Recording;

/// Known axes with their labels (SI units).
pub const AXIS_LABELS: [(&str, &str); 16] = [
    ("t", "time, s"),
    ("x", "position x, m"),
    ("y", "position y, m"),
    ("z", "position z, m"),
    ("vx", "velocity vx, m/s"),
    ("vy", "velocity vy, m/s"),
    ("vz", "velocity vz, m/s"),
    ("unx", "nominal control ux, m/s^2"),
    ("uny", "nominal control uy, m/s^2"),
    ("unz", "nominal control uz, m/s^2"),
    ("ux", "filtered control ux, m/s^2"),
    ("uy", "filtered control uy, m/s^2"),
    ("uz", "filtered control uz, m/s^2"),
    ("slack", "constraint slack"),
    ("active", "active constraints"),
    ("constraints", "total constraints"),
];

pub fn normalize_axis(name: &str) -> String {
    let axis = name.trim().to_lowercase();
    if axis == "time" {
        "t".to_string()
    } else {
        axis
    }
}

pub fn axis_label(name: &str) -> Result<&'static str> {
    let axis = normalize_axis(name);
    AXIS_LABELS
        .iter()
        .find(|(key, _)| *key == axis)
        .map(|(_, label)| *label)
        .ok_or(FlockError::UnknownAxis(axis))
}

/// `t` followed by every recording field that has a label.
pub fn list_axes(fields: &[String]) -> Vec<String> {
    let mut axes = vec!["t".to_string()];
    axes.extend(
        fields
            .iter()
            .filter(|f| axis_label(f).is_ok())
            .cloned(),
    );
    axes
}

/// Extracts one agent's series for `axis`, or the time axis for `t`.
pub fn axis_series(recording: &Recording, axis: &str, agent: usize) -> Result<Vec<f64>> {
    let axis = normalize_axis(axis);
    if axis == "t" {
        return Ok(recording.time.clone());
    }
    let index = recording
        .field_index(&axis)
        .ok_or_else(|| FlockError::UnknownAxis(axis.clone()))?;
    if agent >= recording.agent_count {
        return Err(FlockError::AgentIndexOutOfRange {
            index: agent,
            agent_count: recording.agent_count,
        });
    }
    Ok((0..recording.frame_count)
        .map(|f| f64::from(recording.value(f, agent, index)))
        .collect())
}

/// The same axis for every agent, in agent order.
pub fn all_agents_series(recording: &Recording, axis: &str) -> Result<Vec<Vec<f64>>> {
    (0..recording.agent_count)
        .map(|agent| axis_series(recording, axis, agent))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{RawRecording, RecordMeta};
    use crate::tensor::assemble;

    fn xy_recording() -> Recording {
        let meta = RecordMeta {
            fields: vec!["x".into(), "y".into(), "heading".into()],
            agent_count: 2,
            dt: 0.5,
            ..RecordMeta::default()
        };
        assemble(RawRecording {
            meta,
            frame_count: 0,
            // 2 frames x 2 agents x 3 fields
            states: (0..12).map(|v| v as f32).collect(),
        })
        .unwrap()
    }

    #[test]
    fn test_normalize_axis() {
        assert_eq!(normalize_axis(" Time "), "t");
        assert_eq!(normalize_axis("VX"), "vx");
    }

    #[test]
    fn test_axis_label_unknown() {
        assert!(axis_label("x").is_ok());
        assert!(matches!(axis_label("heading"), Err(FlockError::UnknownAxis(a)) if a == "heading"));
    }

    #[test]
    fn test_list_axes_skips_unlabelled_fields() {
        let rec = xy_recording();
        assert_eq!(list_axes(&rec.fields), vec!["t", "x", "y"]);
    }

    #[test]
    fn test_axis_series() {
        let rec = xy_recording();
        assert_eq!(axis_series(&rec, "t", 0).unwrap(), vec![0.0, 0.5]);
        assert_eq!(axis_series(&rec, "x", 1).unwrap(), vec![3.0, 9.0]);
        assert_eq!(axis_series(&rec, "Y", 0).unwrap(), vec![1.0, 7.0]);
    }

    #[test]
    fn test_axis_series_errors() {
        let rec = xy_recording();
        assert!(matches!(
            axis_series(&rec, "vx", 0),
            Err(FlockError::UnknownAxis(_))
        ));
        assert!(matches!(
            axis_series(&rec, "x", 2),
            Err(FlockError::AgentIndexOutOfRange { index: 2, agent_count: 2 })
        ));
    }

    #[test]
    fn test_all_agents_series() {
        let rec = xy_recording();
        let all = all_agents_series(&rec, "x").unwrap();
        assert_eq!(all, vec![vec![0.0, 6.0], vec![3.0, 9.0]]);
    }
}
