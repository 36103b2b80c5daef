use analysis_core::{AnalysisError, Bar, PriceSeries, TrendForecast, TrendPredictor};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{MLError, MLResult};

/// Bars sent as model input; the sequence model looks back 60 steps.
pub const DEFAULT_HISTORY_WINDOW: usize = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceData {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub vwap: Option<f64>,
}

impl From<&Bar> for PriceData {
    fn from(bar: &Bar) -> Self {
        Self {
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            vwap: bar.vwap,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectionPrediction {
    pub direction: String, // "up", "down", or "neutral"
    pub confidence: f64,
    #[serde(default)]
    pub probabilities: HashMap<String, f64>,
    pub horizon_steps: i32,
    pub predicted_prices: Vec<f64>,
}

impl DirectionPrediction {
    fn into_forecast(self) -> MLResult<TrendForecast> {
        if self.predicted_prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return Err(MLError::InvalidResponse(
                "predicted prices must be finite and positive".to_string(),
            ));
        }
        let confidence = if self.confidence.is_finite() {
            self.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Ok(TrendForecast {
            predicted_prices: self.predicted_prices,
            confidence,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
struct PredictionRequest {
    symbol: String,
    history: Vec<PriceData>,
    horizon_steps: i32,
}

#[derive(Clone)]
pub struct PricePredictorClient {
    client: reqwest::Client,
    base_url: String,
    history_window: usize,
}

impl PricePredictorClient {
    pub fn new(base_url: String, timeout: Duration) -> MLResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url,
            history_window: DEFAULT_HISTORY_WINDOW,
        })
    }

    pub fn with_history_window(mut self, history_window: usize) -> Self {
        self.history_window = history_window.max(1);
        self
    }

    /// Predict price direction for next N steps
    pub async fn predict(
        &self,
        symbol: String,
        history: Vec<PriceData>,
        horizon_steps: i32,
    ) -> MLResult<DirectionPrediction> {
        let request = PredictionRequest {
            symbol,
            history,
            horizon_steps,
        };

        let response = self
            .client
            .post(format!("{}/predict", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(MLError::from_request)?;

        if !response.status().is_success() {
            let status = response.status();
            if status == reqwest::StatusCode::SERVICE_UNAVAILABLE {
                return Err(MLError::ModelNotLoaded);
            }
            return Err(MLError::ServiceUnavailable(format!("Status: {}", status)));
        }

        let result = response
            .json::<DirectionPrediction>()
            .await
            .map_err(MLError::from_request)?;
        Ok(result)
    }

    /// Check service health
    pub async fn health(&self) -> MLResult<bool> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;

        Ok(response.status().is_success())
    }

    fn history_of(&self, series: &PriceSeries) -> Vec<PriceData> {
        let bars = series.bars();
        bars[bars.len().saturating_sub(self.history_window)..]
            .iter()
            .map(PriceData::from)
            .collect()
    }
}

#[async_trait]
impl TrendPredictor for PricePredictorClient {
    async fn forecast(&self, series: &PriceSeries, horizon_days: u32) -> Result<TrendForecast, AnalysisError> {
        let horizon = i32::try_from(horizon_days)
            .map_err(|_| AnalysisError::InvalidConfiguration(format!("horizon {} too large", horizon_days)))?;

        let prediction = self
            .predict(series.instrument().to_string(), self.history_of(series), horizon)
            .await?;

        tracing::debug!(
            instrument = series.instrument(),
            direction = %prediction.direction,
            confidence = prediction.confidence,
            steps = prediction.predicted_prices.len(),
            "price predictor responded"
        );

        Ok(prediction.into_forecast()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};

    fn series(n: usize) -> PriceSeries {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let bars = (0..n)
            .map(|i| Bar {
                timestamp: start + ChronoDuration::days(i as i64),
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.0 + i as f64,
                volume: 10.0,
                vwap: None,
            })
            .collect();
        PriceSeries::new("ETH", bars).unwrap()
    }

    #[test]
    fn test_history_is_trailing_window() {
        let client = PricePredictorClient::new("http://localhost:1".into(), Duration::from_secs(1))
            .unwrap()
            .with_history_window(5);
        let history = client.history_of(&series(20));
        assert_eq!(history.len(), 5);
        assert_eq!(history.last().unwrap().close, 119.0);
        assert_eq!(history[0].close, 115.0);
    }

    #[test]
    fn test_prediction_parses_and_converts() {
        let json = r#"{
            "direction": "up",
            "confidence": 1.4,
            "horizon_steps": 3,
            "predicted_prices": [101.0, 102.5, 104.0]
        }"#;
        let prediction: DirectionPrediction = serde_json::from_str(json).unwrap();
        let forecast = prediction.into_forecast().unwrap();
        assert_eq!(forecast.predicted_prices, vec![101.0, 102.5, 104.0]);
        assert_eq!(forecast.confidence, 1.0);
    }

    #[test]
    fn test_prediction_rejects_non_positive_prices() {
        let prediction = DirectionPrediction {
            direction: "down".into(),
            confidence: 0.6,
            probabilities: HashMap::new(),
            horizon_steps: 1,
            predicted_prices: vec![-1.0],
        };
        assert!(matches!(prediction.into_forecast(), Err(MLError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_an_error() {
        let client = PricePredictorClient::new("http://127.0.0.1:1".into(), Duration::from_millis(500)).unwrap();
        let err = client.forecast(&series(10), 5).await.unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::DataUnavailable(_) | AnalysisError::AdapterTimeout(_)
        ));
    }
}
