use std::path::PathBuf;

use strum::Display;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MitosisError {
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode image {}: {source}", .path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to encode image: {0}")]
    Encode(#[from] image::ImageError),

    #[error("Shape mismatch: {0}")]
    Shape(String),

    #[error("Model inference failed: {0}")]
    ModelInference(String),

    #[error("Shared helper error: {0}")]
    Common(#[from] histo_common::CommonError),

    #[error("Analysis task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

/// Coarse error categories callers can branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    Io,
    Shape,
    ModelInference,
    Internal,
}

impl MitosisError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub fn shape(message: impl Into<String>) -> Self {
        Self::Shape(message.into())
    }

    pub fn model(message: impl Into<String>) -> Self {
        Self::ModelInference(message.into())
    }

    /// Undecodable files count as unreadable ones
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } | Self::Image { .. } => ErrorKind::Io,
            Self::Common(histo_common::CommonError::Io(_)) => ErrorKind::Io,
            Self::Shape(_) => ErrorKind::Shape,
            Self::ModelInference(_) => ErrorKind::ModelInference,
            Self::Encode(_) | Self::Common(_) | Self::TaskJoin(_) => ErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, MitosisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(MitosisError::io("a.png", missing).kind(), ErrorKind::Io);
        assert_eq!(MitosisError::shape("3D map").kind(), ErrorKind::Shape);
        assert_eq!(MitosisError::model("crashed").kind(), ErrorKind::ModelInference);

        let common = histo_common::CommonError::UnknownClass { index: 7, expected: 2 };
        assert_eq!(MitosisError::from(common).kind(), ErrorKind::Internal);
        assert_eq!(ErrorKind::ModelInference.to_string(), "model_inference");
    }
}
