use analysis_core::{AnalysisError, ModelOpinion, ModelSource, OpinionDirection, PriceSeries, SentimentSource};
use async_trait::async_trait;
use std::sync::Arc;

use crate::ModelAdapter;

/// Map a sentiment score onto an opinion: sign gives direction, magnitude gives strength.
pub fn opinion_from_score(score: f64) -> Result<ModelOpinion, AnalysisError> {
    if score.is_nan() {
        return Err(AnalysisError::InvalidData("sentiment score is NaN".into()));
    }
    let score = score.clamp(-1.0, 1.0);
    Ok(
        ModelOpinion::new(ModelSource::Sentiment, OpinionDirection::from_sign(score), score.abs())
            .with_metadata("score", score),
    )
}

/// SENTIMENT source.
pub struct SentimentAdapter {
    source: Arc<dyn SentimentSource>,
}

impl SentimentAdapter {
    pub fn new(source: Arc<dyn SentimentSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl ModelAdapter for SentimentAdapter {
    fn source(&self) -> ModelSource {
        ModelSource::Sentiment
    }

    async fn try_evaluate(&self, instrument: &str, _series: &PriceSeries) -> Result<ModelOpinion, AnalysisError> {
        let score = self.source.score(instrument).await?;
        opinion_from_score(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::series_from_closes;

    #[test]
    fn test_score_mapping() {
        let bull = opinion_from_score(0.6).unwrap();
        assert_eq!(bull.direction, OpinionDirection::Bullish);
        assert_eq!(bull.strength, 0.6);

        let bear = opinion_from_score(-0.25).unwrap();
        assert_eq!(bear.direction, OpinionDirection::Bearish);
        assert_eq!(bear.strength, 0.25);

        let flat = opinion_from_score(0.0).unwrap();
        assert_eq!(flat.direction, OpinionDirection::Neutral);
        assert_eq!(flat.strength, 0.0);
    }

    #[test]
    fn test_out_of_range_score_is_clamped() {
        let opinion = opinion_from_score(-3.0).unwrap();
        assert_eq!(opinion.direction, OpinionDirection::Bearish);
        assert_eq!(opinion.strength, 1.0);
        assert!(opinion_from_score(f64::NAN).is_err());
    }

    struct Constant(f64);

    #[async_trait]
    impl SentimentSource for Constant {
        async fn score(&self, _: &str) -> Result<f64, AnalysisError> {
            Ok(self.0)
        }
    }

    #[tokio::test]
    async fn test_nan_source_degrades() {
        let adapter = SentimentAdapter::new(Arc::new(Constant(f64::NAN)));
        let opinion = adapter.evaluate("BTC", &series_from_closes(&[100.0])).await;
        assert!(!opinion.is_available());
        assert_eq!(opinion.direction, OpinionDirection::Neutral);
    }

    #[tokio::test]
    async fn test_source_score_used() {
        let adapter = SentimentAdapter::new(Arc::new(Constant(0.45)));
        let opinion = adapter.evaluate("BTC", &series_from_closes(&[100.0])).await;
        assert_eq!(opinion.direction, OpinionDirection::Bullish);
        assert_eq!(opinion.strength, 0.45);
    }
}
