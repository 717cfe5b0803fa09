//! Flockscope shell support.
//!
//! The binary is a thin layer over `flockscope_core`; what it needs beyond
//! argument parsing lives here so it can be tested directly:
//! - **exporter**: JSON documents of analysis results
//! - **synth**: seeded synthetic recordings for demos and tests

pub mod error;
pub mod exporter;
pub mod synth;

pub use error::{CliError, Result};
pub use exporter::MetricsExport;
pub use synth::{synthesize, write_synthetic, SynthConfig, SynthFlock};
