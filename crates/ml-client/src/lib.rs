pub mod error;
pub mod price_predictor;
pub mod sentiment;

pub use error::{MLError, MLResult};
pub use price_predictor::PricePredictorClient;
pub use sentiment::SentimentClient;

use std::time::Duration;

/// Configuration for ML services
#[derive(Debug, Clone)]
pub struct MLConfig {
    pub sentiment_url: String,
    pub price_predictor_url: String,
    pub timeout: Duration,
}

impl Default for MLConfig {
    fn default() -> Self {
        Self {
            sentiment_url: "http://localhost:8001".to_string(),
            price_predictor_url: "http://localhost:8003".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Both ML services the signal engine consumes.
#[derive(Clone)]
pub struct MLClient {
    pub sentiment: SentimentClient,
    pub price_predictor: PricePredictorClient,
}

impl MLClient {
    pub fn new(config: MLConfig) -> MLResult<Self> {
        Ok(Self {
            sentiment: SentimentClient::new(config.sentiment_url.clone(), config.timeout)?,
            price_predictor: PricePredictorClient::new(config.price_predictor_url.clone(), config.timeout)?,
        })
    }

    /// Probe every service. An unreachable service reports `false`.
    pub async fn health_check(&self) -> Vec<(&'static str, bool)> {
        let (sentiment, predictor) = tokio::join!(self.sentiment.health(), self.price_predictor.health());
        vec![
            ("sentiment", sentiment.unwrap_or(false)),
            ("price_predictor", predictor.unwrap_or(false)),
        ]
    }
}
