use analysis_core::AnalysisError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MLError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Model not loaded")]
    ModelNotLoaded,

    #[error("Timeout")]
    Timeout,
}

pub type MLResult<T> = Result<T, MLError>;

impl MLError {
    /// Maps a failed request or body read, keeping timeouts distinct.
    pub(crate) fn from_request(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            MLError::Timeout
        } else {
            MLError::RequestFailed(err)
        }
    }
}

impl From<MLError> for AnalysisError {
    fn from(err: MLError) -> Self {
        match err {
            MLError::Timeout => AnalysisError::AdapterTimeout("ML service".to_string()),
            MLError::InvalidResponse(msg) => AnalysisError::InvalidData(msg),
            other => AnalysisError::DataUnavailable(other.to_string()),
        }
    }
}
