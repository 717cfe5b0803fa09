//! End-to-end: write a recording, load it back and analyze it.

use approx::assert_relative_eq;
use flockscope_core::axes::{axis_series, list_axes};
use flockscope_core::params::{Overrides, ParamSource, ParamTables};
use flockscope_core::recording::{RecordMeta, RecordingWriter};
use flockscope_core::series::{
    COHESION_RADIUS, CONNECTIVITY, DEVIATION_ENERGY, OBSTACLE_CLEARANCE, PAIR_CLEARANCE,
    PAIR_VIOLATIONS, VELOCITY_MISMATCH,
};
use flockscope_core::{
    analyze, load_recording, recording_from_bytes, AnalysisConfig, FlockError, ObstacleScenario,
    Warning,
};
use std::io::Write;

/// Four agents on a unit square drifting right at 1 m/s, two frames.
fn square_flock() -> RecordingWriter {
    let mut meta = RecordMeta {
        version: 1,
        dt: 0.1,
        stride: 1,
        algorithm_id: "flocking-alpha".to_string(),
        plane2d: true,
        agent_count: 4,
        fields: vec!["x".into(), "y".into(), "vx".into(), "vy".into()],
        ..RecordMeta::default()
    };
    meta.algorithm_params.insert("neighbor_radius".into(), 1.2);
    meta.algorithm_params.insert("desired_distance".into(), 1.0);

    let mut writer = RecordingWriter::new(meta).with_frame_count(2);
    for f in 0..2 {
        let dx = 0.1 * f as f32;
        writer.push_frame(&[
            dx, 0.0, 1.0, 0.0, //
            1.0 + dx, 0.0, 1.0, 0.0, //
            dx, 1.0, 1.0, 0.0, //
            1.0 + dx, 1.0, 1.0, 0.0,
        ]);
    }
    writer
}

#[test]
fn test_square_flock_metrics() {
    let rec = recording_from_bytes(&square_flock().encode()).unwrap();
    assert!(rec.warnings.is_empty());

    let result = analyze(&rec, &AnalysisConfig::default()).unwrap();
    assert_eq!(result.params.neighbor_radius.value, 1.2);
    assert_eq!(
        result.params.neighbor_radius.source,
        ParamSource::Metadata("neighbor_radius".into())
    );

    let series = &result.series;
    // edges only along the sides (diagonal is sqrt 2 > 1.2), each exactly d
    assert_eq!(series.get(CONNECTIVITY).unwrap(), &[1.0, 1.0]);
    assert_relative_eq!(series.get(DEVIATION_ENERGY).unwrap()[0], 0.0, epsilon = 1e-9);
    assert_relative_eq!(
        series.get(COHESION_RADIUS).unwrap()[1],
        0.5f64.sqrt(),
        epsilon = 1e-6
    );
    assert_relative_eq!(series.get(VELOCITY_MISMATCH).unwrap()[0], 0.0, epsilon = 1e-12);

    // safe distance falls back to the flocking-alpha table (0.9)
    assert_relative_eq!(series.get(PAIR_CLEARANCE).unwrap()[0], 0.1, epsilon = 1e-6);
    assert_eq!(series.get(PAIR_VIOLATIONS).unwrap(), &[0.0, 0.0]);
    assert!(result
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::FallbackUsed { name: "safe_distance", .. })));
}

#[test]
fn test_series_align_with_time_axis() {
    let rec = recording_from_bytes(&square_flock().encode()).unwrap();
    let config = AnalysisConfig {
        scenario: ObstacleScenario::Paper,
        ..AnalysisConfig::default()
    };
    let result = analyze(&rec, &config).unwrap();
    assert!(result.series.contains(OBSTACLE_CLEARANCE));
    for (name, values) in result.series.iter() {
        assert_eq!(values.len(), rec.time.len(), "series {} misaligned", name);
    }
    assert_relative_eq!(rec.time[1], 0.1, epsilon = 1e-12);
}

#[test]
fn test_positions_only_recording() {
    let meta = RecordMeta {
        agent_count: 2,
        fields: vec!["x".into(), "y".into()],
        dt: 1.0,
        ..RecordMeta::default()
    };
    let bytes = RecordingWriter::new(meta)
        .with_states(vec![0.0, 0.0, 3.0, 4.0, 1.0, 1.0, 2.0, 2.0])
        .encode();
    let rec = recording_from_bytes(&bytes).unwrap();
    assert_eq!(rec.frame_count, 2);

    assert_eq!(axis_series(&rec, "x", 1).unwrap(), vec![3.0, 2.0]);
    assert_eq!(axis_series(&rec, "Time", 0).unwrap(), vec![0.0, 1.0]);
    assert_eq!(list_axes(&rec.fields), vec!["t", "x", "y"]);

    let err = analyze(&rec, &AnalysisConfig::default()).unwrap_err();
    assert!(matches!(err, FlockError::MissingFields(_)));
}

#[test]
fn test_invalid_override_falls_through() {
    let rec = recording_from_bytes(&square_flock().encode()).unwrap();
    let config = AnalysisConfig {
        overrides: Overrides {
            neighbor_radius: Some(-3.0),
            ..Overrides::default()
        },
        ..AnalysisConfig::default()
    };
    let result = analyze(&rec, &config).unwrap();
    assert_eq!(result.params.neighbor_radius.value, 1.2);
    assert!(result
        .warnings
        .contains(&Warning::DiscardedOverride { name: "neighbor_radius", value: -3.0 }));
}

#[test]
fn test_broken_generic_table_is_an_error() {
    let rec = recording_from_bytes(&square_flock().encode()).unwrap();
    let text = serde_json::json!({
        "algorithms": {},
        "generic": {"neighbor_radius": 2.0, "desired_distance": 1.0, "safe_distance": 0.0}
    });
    let tables = ParamTables::from_json(&text.to_string()).unwrap();
    let config = AnalysisConfig {
        tables,
        ..AnalysisConfig::default()
    };
    let err = analyze(&rec, &config).unwrap_err();
    assert!(matches!(err, FlockError::InvalidParameter { name: "safe_distance", .. }));
}

#[test]
fn test_load_recording_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&square_flock().encode()).unwrap();
    file.flush().unwrap();

    let rec = load_recording(file.path()).unwrap();
    assert_eq!(rec.agent_count, 4);
    assert_eq!(rec.frame_count, 2);
    assert_eq!(rec.meta.algorithm_id, "flocking-alpha");
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_recording(dir.path().join("absent.pb")).unwrap_err();
    assert!(matches!(err, FlockError::Io(_)));
}

#[test]
fn test_three_dimensional_recording() {
    let meta = RecordMeta {
        agent_count: 2,
        dt: 0.5,
        ..RecordMeta::default()
    };
    // default field layout x,y,z,vx,vy,vz
    let bytes = RecordingWriter::new(meta)
        .with_frame_count(1)
        .with_states(vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0])
        .encode();
    let rec = recording_from_bytes(&bytes).unwrap();
    let config = AnalysisConfig {
        overrides: Overrides {
            neighbor_radius: Some(3.0),
            desired_distance: Some(1.0),
            safe_distance: Some(1.0),
        },
        scenario: ObstacleScenario::None,
        ..AnalysisConfig::default()
    };
    let result = analyze(&rec, &config).unwrap();
    assert_eq!(result.dim, 3);
    assert_relative_eq!(result.series.get(PAIR_CLEARANCE).unwrap()[0], 1.0, epsilon = 1e-9);
    assert_relative_eq!(result.series.get(DEVIATION_ENERGY).unwrap()[0], 1.0, epsilon = 1e-9);
}
