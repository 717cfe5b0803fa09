//! Flockscope Core - Swarm Recording Decoder and Metrics Engine
//!
//! Reads binary swarm recordings and turns them into time-aligned diagnostics:
//! 1. **Decoding**: hand-rolled protobuf wire reader for the recording format
//! 2. **Assembly**: `[frame][agent][field]` tensor with shape inference and a time axis
//! 3. **Metrics**: connectivity, cohesion, deviation energy and velocity mismatch
//! 4. **Safety**: inter-agent and obstacle clearance, plus safety-filter diagnostics

pub mod error;
pub mod wire;
pub mod recording;
pub mod tensor;
pub mod axes;
pub mod params;
pub mod union_find;
pub mod series;
pub mod metrics;
pub mod safety;
pub mod control;
pub mod report;
pub mod analysis;

// Re-export key types for convenience
pub use analysis::{analyze, Analysis, AnalysisConfig};
pub use error::{FlockError, Result, Warning};
pub use metrics::{compute_flock_metrics, FlockParams, StateLayout};
pub use params::{Overrides, ParamResolver, ParamTables, ResolvedParams};
pub use recording::{decode_recording, RawRecording, RecordMeta, RecordingWriter};
pub use safety::{compute_safety, paper_obstacles, ObstaclePoly, ObstacleScenario};
pub use series::MetricSet;
pub use tensor::{assemble, load_recording, recording_from_bytes, Recording};
