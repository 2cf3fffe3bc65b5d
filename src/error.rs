use thiserror::Error;

#[derive(Error, Debug)]
pub enum RestorationError {
    #[error("Image loading error: {0}")]
    ImageLoad(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Restoration service failed: {0}")]
    Service(String),

    #[error("Missing credentials: environment variable {0} is not set")]
    MissingCredentials(String),

    #[error("Perceptual model error: {0}")]
    Model(String),

    #[error("Dimension mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
}

impl RestorationError {
    /// True when the caller supplied something unusable, as opposed to a
    /// failure on our side or in the restoration backend.
    pub fn is_client_error(&self) -> bool {
        matches!(self, RestorationError::InvalidInput(_))
    }

    /// HTTP status class for the upload path.
    pub fn status_code(&self) -> u16 {
        match self {
            e if e.is_client_error() => 400,
            RestorationError::Service(_) | RestorationError::Transport(_) => 502,
            _ => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, RestorationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classes() {
        assert_eq!(RestorationError::InvalidInput("empty".into()).status_code(), 400);
        assert_eq!(RestorationError::Service("quota".into()).status_code(), 502);
        assert_eq!(
            RestorationError::MissingCredentials("OPENAI_API_KEY".into()).status_code(),
            500
        );
        assert!(!RestorationError::Service("down".into()).is_client_error());
    }

    #[test]
    fn test_image_codec_failure_is_server_side() {
        let err = RestorationError::from(image::ImageError::IoError(std::io::Error::other(
            "encoder failed",
        )));
        assert!(!err.is_client_error());
        assert_eq!(err.status_code(), 500);
    }
}
