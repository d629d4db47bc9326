use thiserror::Error;

use crate::simulator::SimulatorError;

pub type Result<T> = std::result::Result<T, ReplayError>;

#[derive(Debug, Error)]
pub enum ReplayError {
    /// Malformed caller input, e.g. a pose that is not 7-dimensional.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The iteration budget ran out above the loose error threshold.
    #[error("pose unreachable: final error {error:.6}, shortfall {shortfall:?}")]
    PoseUnreachable { error: f64, shortfall: [f64; 7] },

    #[error("no gripper convention registered for dataset '{0}'")]
    UnknownDatasetConvention(String),

    #[error("dataset '{dataset}' has no camera viewpoint for episode {episode}")]
    NoViewpoint { dataset: String, episode: usize },

    #[error("no safe joint configuration has been cached yet")]
    NoSafePose,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("simulator fault: {0}")]
    Simulator(#[from] SimulatorError),
}

impl ReplayError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        ReplayError::InvalidInput(msg.into())
    }

    /// Soft failures the caller may retry or skip; everything else ends the episode.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ReplayError::PoseUnreachable { .. } | ReplayError::NoSafePose)
    }
}
