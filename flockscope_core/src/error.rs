//! Error and warning types for the Flockscope pipeline.
//!
//! Anything that would make the output numerically meaningless is a
//! [`FlockError`]; anything with a sane, disclosed default is a [`Warning`].

use std::fmt;
use thiserror::Error;

/// Fatal failures of a decode/assemble/analyze invocation.
#[derive(Debug, Error)]
pub enum FlockError {
    /// Buffer ended in the middle of a field
    #[error("Truncated input: {0}")]
    Truncated(String),

    /// Varint overflow, invalid shape or similar structural damage
    #[error("Malformed input: {0}")]
    Malformed(String),

    /// Tag carried a wire type outside {0, 1, 2, 5}
    #[error("Unsupported wire type {0}")]
    UnsupportedWireType(u8),

    /// Top-level field 3 (packed states) never appeared
    #[error("States payload missing")]
    MissingStates,

    /// State blob length is not a whole number of f32 values
    #[error("States payload length {0} is not a multiple of 4 bytes")]
    MisalignedPayload(usize),

    /// Neither agent count nor frame count could be inferred
    #[error(
        "Unable to infer agent/frame counts from {total_values} values and {field_count} fields"
    )]
    UnresolvableShape {
        total_values: usize,
        field_count: usize,
    },

    /// Required position/velocity fields absent from the recording
    #[error("Missing fields: {0}")]
    MissingFields(String),

    /// Threshold still non-positive or non-finite after the whole fallback chain
    #[error("Invalid parameter {name}: {value}")]
    InvalidParameter { name: &'static str, value: f64 },

    /// Requested axis is not recognised or not present
    #[error("Unknown axis '{0}'")]
    UnknownAxis(String),

    /// Agent index outside `0..agent_count`
    #[error("Agent index {index} out of range (0..{agent_count})")]
    AgentIndexOutOfRange { index: usize, agent_count: usize },

    /// Reading the recording file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FlockError {
    /// Creates a truncation error.
    pub fn truncated(msg: impl Into<String>) -> Self {
        Self::Truncated(msg.into())
    }

    /// Creates a malformed-input error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }

    /// Creates a missing-fields error.
    pub fn missing_fields(msg: impl Into<String>) -> Self {
        Self::MissingFields(msg.into())
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, FlockError>;

/// Non-fatal conditions. Processing continues with the stated default.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// More values than `frames * agents * fields`; the tail was dropped
    TrailingValues { total: usize, expected: usize },

    /// dt unset, non-finite or non-positive; 1.0 used instead
    DefaultTimestep { recorded: f64 },

    /// stride zero; 1 used instead
    DefaultStride,

    /// plane2d was false but z/vz are incomplete, so metrics run in 2D
    PlanarFallback,

    /// A caller-supplied threshold was not a positive finite value
    DiscardedOverride { name: &'static str, value: f64 },

    /// A metadata threshold was present but unusable
    DiscardedMetadataParam { key: String, value: f64 },

    /// An algorithm-table constant was unusable; the generic table follows
    DiscardedTableValue {
        name: &'static str,
        value: f64,
        source: String,
    },

    /// A table constant was used for a threshold
    FallbackUsed {
        name: &'static str,
        value: f64,
        source: String,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::TrailingValues { total, expected } => write!(
                f,
                "states payload has {} values, expected {}; extra values will be ignored",
                total, expected
            ),
            Warning::DefaultTimestep { recorded } => {
                write!(f, "dt missing or invalid ({}); using 1.0 s", recorded)
            }
            Warning::DefaultStride => write!(f, "stride missing; using 1"),
            Warning::PlanarFallback => {
                write!(f, "z/vz data incomplete, metrics are computed in 2D")
            }
            Warning::DiscardedOverride { name, value } => {
                write!(f, "{}={} is not a positive finite value; ignored", name, value)
            }
            Warning::DiscardedMetadataParam { key, value } => write!(
                f,
                "metadata parameter {}={} is not a positive finite value; ignored",
                key, value
            ),
            Warning::DiscardedTableValue {
                name,
                value,
                source,
            } => write!(
                f,
                "{}={} from {} is not a positive finite value; ignored",
                name, value, source
            ),
            Warning::FallbackUsed { name, value, source } => {
                write!(f, "{} not provided, using {} from {}", name, value, source)
            }
        }
    }
}

impl Warning {
    /// Logs the warning and returns it, so call sites can push in one step.
    pub(crate) fn emit(self) -> Self {
        tracing::warn!("{}", self);
        self
    }
}
