//! Synthetic recordings through the full pipeline and the JSON exporter.

use approx::assert_relative_eq;
use flockscope_cli::{write_synthetic, MetricsExport, SynthConfig};
use flockscope_core::params::{ParamSource, ALGO_SAFE_FLOCKING_ALPHA};
use flockscope_core::report::RecordingSummary;
use flockscope_core::series::{
    ACTIVE_RATIO, CONNECTIVITY, CONTROL_CORRECTION, DEVIATION_ENERGY, OBSTACLE_CLEARANCE,
    SLACK_MAX,
};
use flockscope_core::{analyze, load_recording, AnalysisConfig, ObstacleScenario};

#[test]
fn test_noiseless_lattice_is_ideal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lattice.pb");
    let config = SynthConfig {
        agents: 9,
        frames: 20,
        noise_std: 0.0,
        ..SynthConfig::default()
    };
    write_synthetic(config, &path).unwrap();

    let rec = load_recording(&path).unwrap();
    let analysis = analyze(&rec, &AnalysisConfig::default()).unwrap();
    assert_eq!(
        analysis.params.neighbor_radius.source,
        ParamSource::Metadata("neighbor_radius".into())
    );
    for c in analysis.series.get(CONNECTIVITY).unwrap() {
        assert_eq!(*c, 1.0);
    }
    for e in analysis.series.get(DEVIATION_ENERGY).unwrap() {
        assert_relative_eq!(*e, 0.0, epsilon = 1e-6);
    }
}

#[test]
fn test_control_fields_produce_control_series() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("filtered.pb");
    let config = SynthConfig {
        agents: 6,
        frames: 10,
        plane2d: false,
        control: true,
        algorithm_id: ALGO_SAFE_FLOCKING_ALPHA.to_string(),
        ..SynthConfig::default()
    };
    write_synthetic(config, &path).unwrap();

    let rec = load_recording(&path).unwrap();
    let analysis = analyze(&rec, &AnalysisConfig::default()).unwrap();
    assert_eq!(analysis.dim, 3);
    assert_eq!(analysis.obstacle_count, 6);
    assert!(analysis.series.contains(OBSTACLE_CLEARANCE));
    for name in [CONTROL_CORRECTION, SLACK_MAX, ACTIVE_RATIO] {
        let values = analysis.series.get(name).unwrap();
        assert_eq!(values.len(), 10);
        assert!(values.iter().all(|v| v.is_finite() && *v >= 0.0));
    }
    assert!(analysis
        .series
        .get(ACTIVE_RATIO)
        .unwrap()
        .iter()
        .all(|r| *r <= 1.0));
}

#[test]
fn test_export_document() {
    let dir = tempfile::tempdir().unwrap();
    let rec_path = dir.path().join("flock.pb");
    let out_path = dir.path().join("flock.json");
    write_synthetic(
        SynthConfig {
            agents: 4,
            frames: 5,
            ..SynthConfig::default()
        },
        &rec_path,
    )
    .unwrap();

    let rec = load_recording(&rec_path).unwrap();
    let analysis = analyze(&rec, &AnalysisConfig::default()).unwrap();
    MetricsExport::new(
        RecordingSummary::new(&rec_path, &rec),
        &analysis,
        ObstacleScenario::Auto,
    )
    .write_to_file(&out_path)
    .unwrap();

    let text = std::fs::read_to_string(&out_path).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(doc["summary"]["agents"], 4);
    assert_eq!(doc["scenario"], "auto");
    assert_eq!(doc["time"].as_array().unwrap().len(), 5);
    assert_eq!(doc["series"]["C"].as_array().unwrap().len(), 5);
    assert!(doc["params"]["safe_distance"]["source"]
        .as_str()
        .unwrap()
        .contains("flocking-alpha"));
}
