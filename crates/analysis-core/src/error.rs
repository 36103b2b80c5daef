use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Insufficient history: need {required} bars, have {available}")]
    InsufficientHistory { required: usize, available: usize },

    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Invalid weight configuration: {0}")]
    InvalidWeightConfiguration(String),

    #[error("Invalid volatility: {0}")]
    InvalidVolatility(f64),

    #[error("Adapter timed out: {0}")]
    AdapterTimeout(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),

    #[error("API error: {0}")]
    ApiError(String),
}
