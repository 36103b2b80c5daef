use async_trait::async_trait;

use crate::{AnalysisError, DetectedPattern, EvaluationRecord, PriceSeries, TrendForecast};

/// Source of historical bars for an instrument.
#[async_trait]
pub trait PriceSeriesProvider: Send + Sync {
    async fn fetch(&self, instrument: &str, lookback_days: u32) -> Result<PriceSeries, AnalysisError>;
}

/// Sequence-forecasting model behind the TREND adapter.
#[async_trait]
pub trait TrendPredictor: Send + Sync {
    async fn forecast(&self, series: &PriceSeries, horizon_days: u32) -> Result<TrendForecast, AnalysisError>;
}

/// Formation detector behind the PATTERN adapter.
#[async_trait]
pub trait PatternDetector: Send + Sync {
    async fn detect(&self, series: &PriceSeries) -> Result<Vec<DetectedPattern>, AnalysisError>;
}

/// Sentiment scorer behind the SENTIMENT adapter. Scores are in [-1, 1].
#[async_trait]
pub trait SentimentSource: Send + Sync {
    async fn score(&self, instrument: &str) -> Result<f64, AnalysisError>;
}

/// Write-only export of evaluation records. The engine never reads them back.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn store(&self, record: &EvaluationRecord) -> Result<(), AnalysisError>;
    fn name(&self) -> &str;
}
