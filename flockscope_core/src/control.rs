//! Safety-filter diagnostics.
//!
//! Recordings from the QP-filtered controllers carry the nominal input
//! `un*`, the filtered input `u*`, the slack of the relaxed constraint and
//! how many constraints were active out of how many were posed.

use crate::series::{MetricSet, ACTIVE_RATIO, CONTROL_CORRECTION, SLACK_MAX};
use crate::tensor::Recording;
use rayon::prelude::*;
use tracing::debug;

pub const CONTROL_FIELDS: [&str; 9] = [
    "unx",
    "uny",
    "unz",
    "ux",
    "uy",
    "uz",
    "slack",
    "active",
    "constraints",
];

/// Column indices of the nine control fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlLayout {
    nominal: [usize; 3],
    filtered: [usize; 3],
    slack: usize,
    active: usize,
    constraints: usize,
}

impl ControlLayout {
    /// `None` unless every control field is present.
    pub fn resolve(recording: &Recording) -> Option<Self> {
        let mut idx = [0usize; 9];
        for (slot, name) in idx.iter_mut().zip(CONTROL_FIELDS) {
            *slot = recording.field_index(name)?;
        }
        Some(Self {
            nominal: [idx[0], idx[1], idx[2]],
            filtered: [idx[3], idx[4], idx[5]],
            slack: idx[6],
            active: idx[7],
            constraints: idx[8],
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct FrameControl {
    correction: f64,
    slack_max: f64,
    active_ratio: f64,
}

fn frame_control(frame: &[f32], fields: usize, layout: &ControlLayout) -> FrameControl {
    let mut correction = 0.0;
    let mut slack_max = f64::NEG_INFINITY;
    let mut active = 0.0;
    let mut constraints = 0.0;
    let mut agents = 0usize;

    for agent in frame.chunks_exact(fields) {
        let diff2: f64 = (0..3)
            .map(|k| {
                let d = f64::from(agent[layout.filtered[k]]) - f64::from(agent[layout.nominal[k]]);
                d * d
            })
            .sum();
        correction += diff2.sqrt();
        slack_max = slack_max.max(f64::from(agent[layout.slack]));
        active += f64::from(agent[layout.active]);
        constraints += f64::from(agent[layout.constraints]);
        agents += 1;
    }

    FrameControl {
        correction: if agents > 0 { correction / agents as f64 } else { 0.0 },
        slack_max: if agents > 0 { slack_max } else { 0.0 },
        active_ratio: if constraints > 0.0 { active / constraints } else { 0.0 },
    }
}

/// Computes `U_corr`, `slack_max` and `active_ratio`.
///
/// Returns an empty set when the recording has no control fields.
pub fn compute_control(recording: &Recording) -> MetricSet {
    let mut set = MetricSet::new();
    let Some(layout) = ControlLayout::resolve(recording) else {
        debug!("no control fields; control series skipped");
        return set;
    };

    let fields = recording.field_count();
    let frames: Vec<FrameControl> = (0..recording.frame_count)
        .into_par_iter()
        .map(|f| frame_control(recording.frame(f), fields, &layout))
        .collect();

    set.insert(CONTROL_CORRECTION, frames.iter().map(|f| f.correction).collect());
    set.insert(SLACK_MAX, frames.iter().map(|f| f.slack_max).collect());
    set.insert(ACTIVE_RATIO, frames.iter().map(|f| f.active_ratio).collect());
    set
}
