use std::path::PathBuf;

use mitosis::MitosisError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Failed to start {}: {source}", .program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} exited with status {status:?}: {stderr}", .program.display())]
    Failed {
        program: PathBuf,
        /// `None` when the process was killed by a signal
        status: Option<i32>,
        stderr: String,
    },

    #[error("Failed to stage model input: {0}")]
    Staging(#[source] std::io::Error),

    #[error("Invalid JSON from model: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid model response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Analysis(#[from] MitosisError),
}

impl From<BridgeError> for MitosisError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::Analysis(inner) => inner,
            other => MitosisError::model(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
