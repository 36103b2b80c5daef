use analysis_core::{
    AnalysisError, ModelOpinion, ModelSource, OpinionDirection, PriceSeries, TrendForecast, TrendPredictor,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::ModelAdapter;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendConfig {
    pub horizon_days: u32,
    /// Relative moves within ±flat_band read as flat.
    pub flat_band: f64,
    /// Relative move that maps to full strength.
    pub full_scale_move: f64,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            horizon_days: 5,
            flat_band: 0.005,
            full_scale_move: 0.05,
        }
    }
}

impl TrendConfig {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.horizon_days == 0 {
            return Err(AnalysisError::InvalidConfiguration("trend horizon must be at least one day".into()));
        }
        if !self.flat_band.is_finite() || self.flat_band < 0.0 {
            return Err(AnalysisError::InvalidConfiguration(format!(
                "trend flat band must be non-negative, got {}",
                self.flat_band
            )));
        }
        if !self.full_scale_move.is_finite() || self.full_scale_move <= 0.0 {
            return Err(AnalysisError::InvalidConfiguration(format!(
                "trend full-scale move must be positive, got {}",
                self.full_scale_move
            )));
        }
        Ok(())
    }

    /// Map a forecast against the current price onto an opinion.
    pub fn opinion(&self, current_price: f64, forecast: &TrendForecast) -> Result<ModelOpinion, AnalysisError> {
        let predicted = *forecast
            .predicted_prices
            .last()
            .ok_or_else(|| AnalysisError::DataUnavailable("trend predictor returned an empty forecast".into()))?;

        if !predicted.is_finite() || !current_price.is_finite() || current_price <= 0.0 {
            return Err(AnalysisError::InvalidData(format!(
                "cannot compare forecast {} with price {}",
                predicted, current_price
            )));
        }

        let expected_move = (predicted - current_price) / current_price;
        let opinion = if expected_move.abs() <= self.flat_band {
            ModelOpinion::neutral(ModelSource::Trend)
        } else {
            ModelOpinion::new(
                ModelSource::Trend,
                OpinionDirection::from_sign(expected_move),
                expected_move.abs() / self.full_scale_move,
            )
        };

        Ok(opinion
            .with_metadata("expected_move", expected_move)
            .with_metadata("predicted_price", predicted)
            .with_metadata("predictor_confidence", forecast.confidence)
            .with_metadata("horizon_days", self.horizon_days))
    }
}

/// TREND source: sequence-forecast direction versus the current close.
pub struct TrendAdapter {
    predictor: Arc<dyn TrendPredictor>,
    config: TrendConfig,
}

impl TrendAdapter {
    pub fn new(predictor: Arc<dyn TrendPredictor>, config: TrendConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        Ok(Self { predictor, config })
    }
}

#[async_trait]
impl ModelAdapter for TrendAdapter {
    fn source(&self) -> ModelSource {
        ModelSource::Trend
    }

    async fn try_evaluate(&self, _instrument: &str, series: &PriceSeries) -> Result<ModelOpinion, AnalysisError> {
        let current = series
            .last_close()
            .ok_or(AnalysisError::InsufficientHistory { required: 1, available: 0 })?;
        let forecast = self.predictor.forecast(series, self.config.horizon_days).await?;
        self.config.opinion(current, &forecast)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::series_from_closes;
    use approx::assert_relative_eq;

    struct FixedForecast(Vec<f64>);

    #[async_trait]
    impl TrendPredictor for FixedForecast {
        async fn forecast(&self, _: &PriceSeries, horizon_days: u32) -> Result<TrendForecast, AnalysisError> {
            assert_eq!(horizon_days, 5);
            Ok(TrendForecast {
                predicted_prices: self.0.clone(),
                confidence: 0.7,
            })
        }
    }

    fn forecast(prices: &[f64]) -> TrendForecast {
        TrendForecast {
            predicted_prices: prices.to_vec(),
            confidence: 0.5,
        }
    }

    #[test]
    fn test_upward_forecast_is_bullish() {
        let opinion = TrendConfig::default().opinion(100.0, &forecast(&[101.0, 102.0])).unwrap();
        assert_eq!(opinion.direction, OpinionDirection::Bullish);
        assert_relative_eq!(opinion.strength, 0.4, epsilon = 1e-12);
    }

    #[test]
    fn test_downward_forecast_is_bearish_and_saturates() {
        let opinion = TrendConfig::default().opinion(100.0, &forecast(&[90.0])).unwrap();
        assert_eq!(opinion.direction, OpinionDirection::Bearish);
        assert_eq!(opinion.strength, 1.0);
    }

    #[test]
    fn test_small_move_is_flat() {
        let opinion = TrendConfig::default().opinion(100.0, &forecast(&[100.4])).unwrap();
        assert_eq!(opinion.direction, OpinionDirection::Neutral);
        assert_eq!(opinion.strength, 0.0);
        assert!(opinion.is_available());
    }

    #[test]
    fn test_empty_forecast_is_an_error() {
        assert!(matches!(
            TrendConfig::default().opinion(100.0, &forecast(&[])),
            Err(AnalysisError::DataUnavailable(_))
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = TrendConfig {
            full_scale_move: 0.0,
            ..TrendConfig::default()
        };
        assert!(TrendAdapter::new(Arc::new(FixedForecast(vec![])), config).is_err());
    }

    #[tokio::test]
    async fn test_adapter_uses_last_predicted_price() {
        let adapter = TrendAdapter::new(Arc::new(FixedForecast(vec![90.0, 103.0])), TrendConfig::default()).unwrap();
        let series = series_from_closes(&[98.0, 100.0]);
        let opinion = adapter.evaluate("ETH", &series).await;
        assert_eq!(opinion.direction, OpinionDirection::Bullish);
        assert_relative_eq!(opinion.strength, 0.6, epsilon = 1e-12);
        assert_eq!(opinion.metadata["predictor_confidence"], 0.7);
    }

    #[tokio::test]
    async fn test_adapter_degrades_on_empty_forecast() {
        let adapter = TrendAdapter::new(Arc::new(FixedForecast(vec![])), TrendConfig::default()).unwrap();
        let opinion = adapter.evaluate("ETH", &series_from_closes(&[100.0])).await;
        assert!(!opinion.is_available());
        assert_eq!(opinion.strength, 0.0);
    }
}
